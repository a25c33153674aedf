//! Bridge protocol message types and code encoding.
//!
//! This module defines the message format for communication between
//! the host (Rust) and the embedded content (JavaScript agent).
//!
//! # Protocol Overview
//!
//! | Direction | Transport | Format |
//! |-----------|-----------|--------|
//! | Content → Host | Outward text message | JSON envelope [`Message`] |
//! | Host → Content | Injected code | Call to an agent function with literal args |
//!
//! # Message Types
//!
//! | `type` | Purpose |
//! |--------|---------|
//! | `handshake` | Dedicated channel established |
//! | `error` | Failure attributed to a `messageId` |
//! | `wallet` | Typed request/response |
//! | anything else | Application-defined request/response |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Envelope, kinds, error payload, requests |
//! | `script` | Code-literal encoding and call builders |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope and payload types.
pub mod message;

/// Code-literal encoding for injected calls.
pub mod script;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{
    ERROR_CODE_ALREADY_INITIALIZED, ERROR_CODE_NOT_INITIALIZED, ErrorData, Message, MessageKind,
    Request,
};
pub use script::{AgentGlobals, handshake_call, js_literal, send_call, teardown_call};
