//! WebView Bridge - request/response calls into embedded web content.
//!
//! The host can only reach the embedded content by asking its container to
//! execute code there, and the content can only answer with single text
//! messages. This library layers awaitable request/response calls on top
//! of that asymmetric channel.
//!
//! # Architecture
//!
//! - **Host (Rust)**: injects calls, correlates replies by `messageId`
//! - **Content (JavaScript agent)**: owns a `MessageChannel`, relays replies
//!   out as JSON text
//!
//! Key design principles:
//!
//! - Each [`Bridge`] owns its [`ConnectionRegistry`]; no global state
//! - Every request has its own deadline; nothing waits forever
//! - Dynamic values reach the content as JSON literals, never raw text
//!
//! # Quick Start
//!
//! ```ignore
//! use serde_json::{Value, json};
//! use webview_bridge::{Bridge, Request, Result};
//!
//! async fn sign(webview: WebView) -> Result<Value> {
//!     let bridge = Bridge::builder()
//!         .container(move |script: &str| webview.inject_javascript(script))
//!         .build()?;
//!
//!     // Wired to the container's load-end event.
//!     bridge.on_load_end()?;
//!
//!     bridge
//!         .send_message(Request::wallet(json!({ "value": "1000" })))
//!         .await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | Content-side agent script and install-once flag |
//! | [`bridge`] | [`Bridge`] facade, builder and options |
//! | [`deferred`] | Externally settled future with timeout |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Correlation id newtype |
//! | [`protocol`] | Message envelope and code-literal encoding |
//! | [`transport`] | Registry and connection state machine |

// ============================================================================
// Modules
// ============================================================================

/// Content-side agent.
pub mod agent;

/// Bridge facade and configuration.
///
/// Use [`Bridge::builder()`] to create a configured bridge.
pub mod bridge;

/// Externally settled future with an optional deadline.
pub mod deferred;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Bridge protocol message types.
pub mod protocol;

/// Registry and connection.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Agent types
pub use agent::{ContentLoad, build_agent_script};

// Bridge types
pub use bridge::{Bridge, BridgeBuilder, BridgeOptions};

// Deferred types
pub use deferred::{Deferred, DeferredState, Settlement};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::MessageId;

// Protocol types
pub use protocol::{AgentGlobals, ErrorData, Message, MessageKind, Request};

// Transport types
pub use transport::{Connection, ConnectionRegistry, ConnectionState, MessageListener, Outbound};
