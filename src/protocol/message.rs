//! Message envelope exchanged in both directions.
//!
//! Every message crossing the bridge is the same JSON envelope:
//!
//! ```json
//! {
//!   "type": "wallet",
//!   "messageId": "550e8400-e29b-41d4-a716-446655440000",
//!   "data": { ... }
//! }
//! ```
//!
//! `messageId` is absent or `null` only on the handshake's first leg.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::MessageId;

// ============================================================================
// Constants
// ============================================================================

/// Error code reported when a send is attempted before the handshake.
pub const ERROR_CODE_NOT_INITIALIZED: i64 = 4001;

/// Error code reported when a handshake is re-run without teardown.
pub const ERROR_CODE_ALREADY_INITIALIZED: i64 = 4002;

/// Fallback text for error messages that carry no description.
const UNKNOWN_ERROR: &str = "Unknown error";

// ============================================================================
// MessageKind
// ============================================================================

/// Message type discriminator.
///
/// Serialized as the bare `type` string. Unrecognized strings decode to
/// [`MessageKind::Custom`] so applications can define their own kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    /// Dedicated channel established.
    Handshake,
    /// Wallet signing request and its reply.
    Wallet,
    /// Failure reported by the content.
    Error,
    /// Application-defined kind.
    Custom(String),
}

impl MessageKind {
    /// Returns the wire name of this kind.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Handshake => "handshake",
            Self::Wallet => "wallet",
            Self::Error => "error",
            Self::Custom(name) => name,
        }
    }

    /// Returns `true` if callers may send requests of this kind.
    ///
    /// `handshake` and `error` are reserved for the protocol itself.
    #[inline]
    #[must_use]
    pub fn is_request_kind(&self) -> bool {
        !matches!(self.as_str(), "handshake" | "error")
    }
}

impl From<String> for MessageKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "handshake" => Self::Handshake,
            "wallet" => Self::Wallet,
            "error" => Self::Error,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for MessageKind {
    #[inline]
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Message
// ============================================================================

/// The unit exchanged between host and content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message type.
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Correlation id.
    #[serde(rename = "messageId", default)]
    pub message_id: Option<MessageId>,

    /// Payload, shape determined by `kind`.
    #[serde(default)]
    pub data: Value,
}

impl Message {
    /// Creates a new message.
    #[inline]
    #[must_use]
    pub fn new(kind: MessageKind, message_id: Option<MessageId>, data: Value) -> Self {
        Self {
            kind,
            message_id,
            data,
        }
    }

    /// Parses raw inbound text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the text is not a valid envelope.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::malformed_message(e.to_string()))
    }

    /// Reads the payload of an `error` message.
    #[inline]
    #[must_use]
    pub fn error_data(&self) -> ErrorData {
        ErrorData::from_value(&self.data)
    }
}

// ============================================================================
// ErrorData
// ============================================================================

/// Payload of an `error` message.
///
/// ```json
/// { "message": "User rejected", "code": 4100 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Human-readable description.
    pub message: String,

    /// Optional error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

impl ErrorData {
    /// Extracts error details from an arbitrary payload.
    ///
    /// A bare string payload is taken as the message. Anything missing
    /// falls back to `"Unknown error"` with no code.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| value.as_str())
            .unwrap_or(UNKNOWN_ERROR)
            .to_string();
        let code = value.get("code").and_then(Value::as_i64);

        Self { message, code }
    }

    /// Converts into the crate error delivered to the waiting caller.
    ///
    /// Reserved protocol codes map to [`Error::ProtocolViolation`];
    /// everything else is an [`Error::Remote`].
    #[must_use]
    pub fn into_error(self) -> Error {
        match self.code {
            Some(code @ (ERROR_CODE_NOT_INITIALIZED | ERROR_CODE_ALREADY_INITIALIZED)) => {
                Error::protocol_violation(self.message, code)
            }
            code => Error::remote(self.message, code),
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// An outbound request before a correlation id is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Request kind.
    pub kind: MessageKind,
    /// Request payload.
    pub data: Value,
}

impl Request {
    /// Creates a new request.
    #[inline]
    #[must_use]
    pub fn new(kind: impl Into<MessageKind>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Creates a wallet request.
    #[inline]
    #[must_use]
    pub fn wallet(data: Value) -> Self {
        Self::new(MessageKind::Wallet, data)
    }

    /// Creates a request from any serializable payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn with_payload<T: Serialize>(kind: impl Into<MessageKind>, payload: &T) -> Result<Self> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trip_names() {
        assert_eq!(MessageKind::from("handshake"), MessageKind::Handshake);
        assert_eq!(MessageKind::from("wallet"), MessageKind::Wallet);
        assert_eq!(MessageKind::from("error"), MessageKind::Error);
        assert_eq!(
            MessageKind::from("ping"),
            MessageKind::Custom("ping".to_string())
        );
        assert_eq!(String::from(MessageKind::Custom("ping".into())), "ping");
    }

    #[test]
    fn test_reserved_kinds_are_not_requests() {
        assert!(!MessageKind::Handshake.is_request_kind());
        assert!(!MessageKind::Error.is_request_kind());
        assert!(MessageKind::Wallet.is_request_kind());
        assert!(MessageKind::from("ping").is_request_kind());
    }

    #[test]
    fn test_custom_spelling_of_reserved_kind_is_not_request() {
        assert!(!MessageKind::Custom("handshake".into()).is_request_kind());
        assert!(!MessageKind::Custom("error".into()).is_request_kind());
        assert!(MessageKind::Custom("wallet".into()).is_request_kind());
    }

    #[test]
    fn test_parse_response() {
        let text = r#"{
            "type": "wallet",
            "messageId": "550e8400-e29b-41d4-a716-446655440000",
            "data": {"address": "0x12", "signature": "0xab"}
        }"#;

        let message = Message::parse(text).expect("parse");
        assert_eq!(message.kind, MessageKind::Wallet);
        assert_eq!(
            message.message_id,
            Some(MessageId::from("550e8400-e29b-41d4-a716-446655440000"))
        );
        assert_eq!(message.data["signature"], "0xab");
    }

    #[test]
    fn test_parse_handshake_without_id_or_data() {
        let message = Message::parse(r#"{"type":"handshake"}"#).expect("parse");
        assert_eq!(message.kind, MessageKind::Handshake);
        assert!(message.message_id.is_none());
        assert!(message.data.is_null());

        let message = Message::parse(r#"{"type":"handshake","messageId":null}"#).expect("parse");
        assert!(message.message_id.is_none());
    }

    #[test]
    fn test_parse_malformed() {
        let err = Message::parse("not json").unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { .. }));

        let err = Message::parse(r#"{"messageId":"x"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { .. }));
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let message = Message::new(
            MessageKind::Wallet,
            Some(MessageId::from("id-1")),
            json!({"value": "1000"}),
        );
        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(
            value,
            json!({"type": "wallet", "messageId": "id-1", "data": {"value": "1000"}})
        );
    }

    #[test]
    fn test_error_data_extraction() {
        let data = ErrorData::from_value(&json!({"message": "User rejected", "code": 4100}));
        assert_eq!(data.message, "User rejected");
        assert_eq!(data.code, Some(4100));

        let data = ErrorData::from_value(&json!("plain text"));
        assert_eq!(data.message, "plain text");
        assert_eq!(data.code, None);

        let data = ErrorData::from_value(&Value::Null);
        assert_eq!(data.message, "Unknown error");
    }

    #[test]
    fn test_error_data_classification() {
        let err = ErrorData::from_value(&json!({
            "message": "MessagePort already initialized",
            "code": ERROR_CODE_ALREADY_INITIALIZED,
        }))
        .into_error();
        assert!(matches!(err, Error::ProtocolViolation { code: 4002, .. }));

        let err = ErrorData::from_value(&json!({"message": "nope", "code": 1})).into_error();
        assert!(matches!(err, Error::Remote { code: Some(1), .. }));
    }

    #[test]
    fn test_request_with_payload() {
        #[derive(Serialize)]
        struct Sign<'a> {
            address: &'a str,
            value: &'a str,
        }

        let request = Request::with_payload(
            MessageKind::Wallet,
            &Sign {
                address: "0x12",
                value: "1000",
            },
        )
        .expect("serialize");

        assert_eq!(request.kind, MessageKind::Wallet);
        assert_eq!(request.data, json!({"address": "0x12", "value": "1000"}));
    }
}
