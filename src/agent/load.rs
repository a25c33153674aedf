//! Load-scoped agent installation.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::protocol::AgentGlobals;
use crate::transport::ConnectionRegistry;

use super::assets::build_agent_script;

// ============================================================================
// ContentLoad
// ============================================================================

/// Installs the agent at most once per content load.
#[derive(Debug)]
pub struct ContentLoad {
    script: String,
    installed: AtomicBool,
}

impl ContentLoad {
    /// Prepares the agent for `globals`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if a global name is
    /// not a JavaScript identifier.
    pub fn new(globals: &AgentGlobals) -> Result<Self> {
        globals.validate()?;
        Ok(Self {
            script: build_agent_script(globals),
            installed: AtomicBool::new(false),
        })
    }

    /// Returns `true` if the agent was injected during the current load.
    #[inline]
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    /// Injects the agent unless it already was for this load.
    ///
    /// Returns `Ok(true)` if the agent was injected, `Ok(false)` if this
    /// load already has it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnvironmentUnavailable`](crate::Error::EnvironmentUnavailable)
    /// if the registry has no container handle. The load stays uninstalled.
    pub fn install(&self, registry: &ConnectionRegistry) -> Result<bool> {
        if self
            .installed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("Agent already installed for this load");
            return Ok(false);
        }

        if let Err(e) = registry.try_inject_code(&self.script) {
            self.installed.store(false, Ordering::Release);
            warn!(error = %e, "Agent install failed");
            return Err(e);
        }

        debug!(script_len = self.script.len(), "Agent installed");
        Ok(true)
    }

    /// Marks the start of a new load.
    pub fn reset(&self) {
        self.installed.store(false, Ordering::Release);
    }

    /// Returns the rendered agent script.
    #[inline]
    #[must_use]
    pub fn script(&self) -> &str {
        &self.script
    }
}

// ============================================================================
// Tests
// ============================================================================
