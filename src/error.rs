//! Error types for the bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use webview_bridge::{Bridge, Request, Result};
//!
//! async fn sign(bridge: &Bridge) -> Result<serde_json::Value> {
//!     bridge.send_raw(Request::wallet(serde_json::json!({ "value": "1000" }))).await
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Environment | [`Error::EnvironmentUnavailable`] |
//! | Connection | [`Error::ConnectionTimeout`], [`Error::Disconnected`] |
//! | Protocol | [`Error::ProtocolViolation`], [`Error::MalformedMessage`], [`Error::Protocol`] |
//! | Request | [`Error::RequestTimeout`], [`Error::Remote`] |
//! | Deferred | [`Error::Timeout`], [`Error::Disposed`] |
//! | External | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::MessageId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when bridge options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Environment Errors
    // ========================================================================
    /// A primitive the bridge depends on is missing.
    ///
    /// Inside the content this is the outward-send primitive; on the host
    /// side it is the container's code-injection handle.
    #[error("Environment unavailable: {message}")]
    EnvironmentUnavailable {
        /// What was missing.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Handshake not acknowledged in time.
    ///
    /// The connection stays disconnected and the caller may retry.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection torn down while the operation was in flight.
    #[error("Disconnected")]
    Disconnected,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The content agent rejected a protocol step.
    ///
    /// Returned for a handshake re-run without teardown, or a send issued
    /// before the dedicated channel exists.
    #[error("Protocol violation: {message}")]
    ProtocolViolation {
        /// Description reported by the content agent.
        message: String,
        /// Reserved protocol error code.
        code: i64,
    },

    /// Inbound text could not be parsed as a message.
    ///
    /// Logged and dropped by the dispatcher; never surfaced to a caller.
    #[error("Malformed message: {message}")]
    MalformedMessage {
        /// Parser diagnostic.
        message: String,
    },

    /// Local protocol limit or misuse.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol error.
        message: String,
    },

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// No matching reply arrived in time.
    ///
    /// Only the one request fails; the connection stays up.
    #[error("Request {message_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The correlation id that timed out.
        message_id: MessageId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The content explicitly reported failure.
    #[error("Remote error: {message}")]
    Remote {
        /// Error message from the content.
        message: String,
        /// Optional application error code.
        code: Option<i64>,
    },

    // ========================================================================
    // Deferred Errors
    // ========================================================================
    /// Deferred value not settled in time.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Deferred value disposed before it settled.
    #[error("Deferred disposed")]
    Disposed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an environment unavailable error.
    #[inline]
    pub fn environment_unavailable(message: impl Into<String>) -> Self {
        Self::EnvironmentUnavailable {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol violation error.
    #[inline]
    pub fn protocol_violation(message: impl Into<String>, code: i64) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
            code,
        }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed_message(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(message_id: MessageId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            message_id,
            timeout_ms,
        }
    }

    /// Creates a remote error.
    #[inline]
    pub fn remote(message: impl Into<String>, code: Option<i64>) -> Self {
        Self::Remote {
            message: message.into(),
            code,
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::Timeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. } | Self::Disconnected)
    }

    /// Returns `true` if this error was reported by the content.
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. } | Self::ProtocolViolation { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry. Retrying is left to callers.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::RequestTimeout { .. }
                | Self::ProtocolViolation { .. }
                | Self::Disconnected
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection_timeout(5000);
        assert_eq!(err.to_string(), "Connection timeout after 5000ms");
    }

    #[test]
    fn test_request_timeout_display() {
        let err = Error::request_timeout(MessageId::from("abc"), 10_000);
        assert_eq!(err.to_string(), "Request abc timed out after 10000ms");
    }

    #[test]
    fn test_remote_error_carries_code() {
        let err = Error::remote("user rejected", Some(4100));
        match err {
            Error::Remote { message, code } => {
                assert_eq!(message, "user rejected");
                assert_eq!(code, Some(4100));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::connection_timeout(5000).is_timeout());
        assert!(Error::timeout("deferred", 10).is_timeout());
        assert!(Error::request_timeout(MessageId::generate(), 10).is_timeout());
        assert!(!Error::Disconnected.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::Disconnected.is_connection_error());
        assert!(Error::connection_timeout(1000).is_connection_error());
        assert!(!Error::remote("x", None).is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::connection_timeout(1000).is_recoverable());
        assert!(Error::protocol_violation("already initialized", 4002).is_recoverable());
        assert!(!Error::config("bad").is_recoverable());
        assert!(!Error::environment_unavailable("missing").is_recoverable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
