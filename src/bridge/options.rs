//! Bridge timing, limits and agent naming.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use webview_bridge::BridgeOptions;
//!
//! let options = BridgeOptions::new()
//!     .with_connection_timeout(Duration::from_secs(3))
//!     .with_message_timeout(Duration::from_secs(30))
//!     .with_namespace("__wallet");
//!
//! options.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::AgentGlobals;

// ============================================================================
// Constants
// ============================================================================

/// Default handshake acknowledgement window.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Default per-request reply window.
pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default cap on concurrently pending requests.
pub const DEFAULT_MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// BridgeOptions
// ============================================================================

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// How long `connect()` waits for the handshake.
    pub connection_timeout: Duration,

    /// How long a request waits for its reply.
    pub message_timeout: Duration,

    /// Requests beyond this many in flight are rejected.
    pub max_pending_requests: usize,

    /// Globals shared with the content agent.
    pub globals: AgentGlobals,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            message_timeout: DEFAULT_MESSAGE_TIMEOUT,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS,
            globals: AgentGlobals::default(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeOptions {
    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the per-request timeout.
    #[inline]
    #[must_use]
    pub fn with_message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout = timeout;
        self
    }

    /// Sets the pending request cap.
    #[inline]
    #[must_use]
    pub fn with_max_pending_requests(mut self, max: usize) -> Self {
        self.max_pending_requests = max;
        self
    }

    /// Sets the agent namespace on `window`.
    #[inline]
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.globals = self.globals.with_namespace(namespace);
        self
    }

    /// Sets the outward object on `window`.
    #[inline]
    #[must_use]
    pub fn with_outward_object(mut self, outward_object: impl Into<String>) -> Self {
        self.globals = self.globals.with_outward_object(outward_object);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BridgeOptions {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a timeout or the pending cap is zero
    /// - [`Error::Config`] if an agent global is not a JavaScript identifier
    pub fn validate(&self) -> Result<()> {
        if self.connection_timeout.is_zero() {
            return Err(Error::config("Connection timeout must be greater than zero"));
        }
        if self.message_timeout.is_zero() {
            return Err(Error::config("Message timeout must be greater than zero"));
        }
        if self.max_pending_requests == 0 {
            return Err(Error::config(
                "Max pending requests must be greater than zero",
            ));
        }
        self.globals.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
