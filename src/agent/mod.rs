//! Content-side agent.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`build_agent_script`] | Renders the agent for a set of globals |
//! | [`ContentLoad`] | Injects the agent once per content load |

// ============================================================================
// Submodules
// ============================================================================

/// Agent script template.
pub mod assets;

/// Load-scoped installation.
pub mod load;

// ============================================================================
// Re-exports
// ============================================================================

pub use assets::build_agent_script;
pub use load::ContentLoad;
