//! Bridge entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bridge`] | Registry, connection and agent for one embedded content |
//! | [`BridgeBuilder`] | Fluent configuration builder |
//! | [`BridgeOptions`] | Timeouts, limits and agent naming |
//!
//! # Container Integration
//!
//! ```ignore
//! let bridge = Bridge::builder()
//!     .container(move |script: &str| webview.inject_javascript(script))
//!     .build()?;
//!
//! // From the container's event callbacks:
//! webview.on_load_end(|| bridge.on_load_end());
//! webview.on_message(|text| bridge.on_message(text));
//! webview.on_navigation(|| bridge.on_navigation());
//!
//! let signed: Value = bridge.send_message(Request::wallet(payload)).await?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for bridge configuration.
pub mod builder;

/// Bridge facade.
pub mod core;

/// Bridge timing, limits and agent naming.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BridgeBuilder;
pub use core::Bridge;
pub use options::BridgeOptions;
