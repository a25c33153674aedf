//! Builder pattern for bridge configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use webview_bridge::Bridge;
//!
//! let bridge = Bridge::builder()
//!     .message_timeout(Duration::from_secs(30))
//!     .container(|script: &str| webview.inject_javascript(script))
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::transport::Outbound;

use super::core::Bridge;
use super::options::BridgeOptions;

// ============================================================================
// BridgeBuilder
// ============================================================================

/// Builder for configuring a [`Bridge`].
///
/// Use [`Bridge::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct BridgeBuilder {
    options: BridgeOptions,
    container: Option<Arc<dyn Outbound>>,
}

impl fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("options", &self.options)
            .field("container", &self.container.is_some())
            .finish()
    }
}

// ============================================================================
// BridgeBuilder Implementation
// ============================================================================

impl BridgeBuilder {
    /// Creates a builder with default options and no container.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long `connect()` waits for the handshake.
    #[inline]
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_connection_timeout(timeout);
        self
    }

    /// Sets how long a request waits for its reply.
    #[inline]
    #[must_use]
    pub fn message_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_message_timeout(timeout);
        self
    }

    /// Sets the cap on concurrently pending requests.
    #[inline]
    #[must_use]
    pub fn max_pending_requests(mut self, max: usize) -> Self {
        self.options = self.options.with_max_pending_requests(max);
        self
    }

    /// Sets the agent namespace on `window`.
    #[inline]
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.options = self.options.with_namespace(namespace);
        self
    }

    /// Sets the outward object on `window`.
    #[inline]
    #[must_use]
    pub fn outward_object(mut self, outward_object: impl Into<String>) -> Self {
        self.options = self.options.with_outward_object(outward_object);
        self
    }

    /// Sets the container's code-injection primitive.
    ///
    /// May also be set later with [`Bridge::set_container`].
    #[must_use]
    pub fn container(mut self, container: impl Outbound + 'static) -> Self {
        self.container = Some(Arc::new(container));
        self
    }

    /// Replaces every option at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the bridge with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the options are
    /// invalid.
    pub fn build(self) -> Result<Bridge> {
        self.options.validate()?;
        Bridge::new(self.options, self.container)
    }
}

// ============================================================================
// Tests
// ============================================================================
