//! Type-safe identifiers for bridge messages.
//!
//! Correlation tokens are opaque strings on the wire. Outbound ids are
//! minted as UUID v4, but inbound ids are accepted verbatim since the
//! content side is free to echo whatever it received.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Correlation token carried by the handshake leg.
const HANDSHAKE_ID: &str = "handshake";

// ============================================================================
// MessageId
// ============================================================================

/// Correlation token pairing one request with its one response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Mints a fresh, random correlation id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id used by the handshake leg.
    #[inline]
    #[must_use]
    pub fn handshake() -> Self {
        Self(HANDSHAKE_ID.to_string())
    }

    /// Returns `true` if this is the handshake id.
    #[inline]
    #[must_use]
    pub fn is_handshake(&self) -> bool {
        self.0 == HANDSHAKE_ID
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    #[inline]
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MessageId {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
