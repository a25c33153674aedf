//! Transport layer between the host and the embedded content.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    inject_code(script)     ┌─────────────────┐
//! │  Connection     │───────────────────────────►│  Content agent  │
//! │  (Rust)         │                            │  (JavaScript)   │
//! │                 │◄───────────────────────────│                 │
//! └─────────────────┘   dispatch(json text)      └─────────────────┘
//!          ▲                                              ▲
//!          └──────────── ConnectionRegistry ──────────────┘
//!                       (container handle)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Handshake, correlation and timeouts |
//! | `registry` | Container handle and listener fan-out |

// ============================================================================
// Submodules
// ============================================================================

/// Connection state machine and request correlation.
pub mod connection;

/// Container handle and inbound listener registry.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionState};
pub use registry::{ConnectionRegistry, MessageListener, Outbound};
