//! Registry brokering the container handle and inbound listeners.
//!
//! The container that owns the embedded content and the connection that
//! speaks the protocol have independent lifecycles. The registry decouples
//! them: the container plugs its code-injection primitive in whenever it
//! is ready and forwards every inbound message to [`ConnectionRegistry::dispatch`];
//! connections inject through it and register listeners on it.
//!
//! The registry is an explicit object shared by `Arc`, so independent
//! bridges (and tests) never share global state.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, trace};

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Inbound message listener.
///
/// Receives the raw text exactly as the content emitted it. Identity is
/// the `Arc` allocation: registering the same `Arc` twice has no effect.
pub type MessageListener = Arc<dyn Fn(&str) + Send + Sync>;

// ============================================================================
// Outbound
// ============================================================================

/// The container's "execute code in the content" primitive.
///
/// Delivery is fire-and-forget. Implementations may call back into
/// [`ConnectionRegistry::dispatch`] synchronously.
pub trait Outbound: Send + Sync {
    /// Executes `script` inside the embedded content.
    fn deliver(&self, script: &str);
}

impl<F> Outbound for F
where
    F: Fn(&str) + Send + Sync,
{
    fn deliver(&self, script: &str) {
        self(script);
    }
}

// ============================================================================
// ConnectionRegistry
// ============================================================================

/// Holds at most one container handle and a set of inbound listeners.
#[derive(Default)]
pub struct ConnectionRegistry {
    /// Active container handle.
    handle: RwLock<Option<Arc<dyn Outbound>>>,
    /// Registered listeners, in registration order.
    listeners: Mutex<Vec<MessageListener>>,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("has_container", &self.has_container())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

// ============================================================================
// ConnectionRegistry - Container Handle
// ============================================================================

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets or clears the container handle.
    pub fn set_container_handle(&self, handle: Option<Arc<dyn Outbound>>) {
        let attached = handle.is_some();
        *self.handle.write() = handle;
        debug!(attached, "Container handle updated");
    }

    /// Returns `true` if a container handle is set.
    #[inline]
    #[must_use]
    pub fn has_container(&self) -> bool {
        self.handle.read().is_some()
    }

    /// Injects `script` into the content.
    ///
    /// Without a container handle the call is dropped and an error is
    /// logged; it is not fatal.
    pub fn inject_code(&self, script: &str) {
        if let Err(e) = self.try_inject_code(script) {
            error!(error = %e, "Container handle not set, cannot inject code");
        }
    }

    /// Injects `script`, reporting a missing container handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnvironmentUnavailable`] if no handle is set.
    pub fn try_inject_code(&self, script: &str) -> Result<()> {
        // Clone out so delivery never runs under the lock.
        let handle = self
            .handle
            .read()
            .clone()
            .ok_or_else(|| Error::environment_unavailable("container handle not set"))?;

        trace!(script_len = script.len(), "Injecting code");
        handle.deliver(script);
        Ok(())
    }
}

// ============================================================================
// ConnectionRegistry - Listeners
// ============================================================================

impl ConnectionRegistry {
    /// Registers a listener. Adding the same listener twice has no effect.
    pub fn add_listener(&self, listener: &MessageListener) {
        let mut listeners = self.listeners.lock();
        if !listeners.iter().any(|l| same_listener(l, listener)) {
            listeners.push(Arc::clone(listener));
        }
    }

    /// Unregisters a listener. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &MessageListener) {
        self.listeners
            .lock()
            .retain(|l| !same_listener(l, listener));
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Invokes every listener with the raw inbound message.
    ///
    /// Listeners run synchronously, in registration order, against a
    /// snapshot taken before the first call. Panics are not caught.
    pub fn dispatch(&self, message: &str) {
        let listeners: Vec<MessageListener> = self.listeners.lock().clone();
        trace!(
            listeners = listeners.len(),
            message_len = message.len(),
            "Dispatching inbound message"
        );

        for listener in listeners {
            listener(message);
        }
    }

    /// Clears every listener and the container handle.
    pub fn cleanup(&self) {
        self.listeners.lock().clear();
        *self.handle.write() = None;
        debug!("Registry cleaned up");
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Compares listeners by allocation, ignoring vtable metadata.
fn same_listener(a: &MessageListener, b: &MessageListener) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener(counter: &Arc<AtomicUsize>) -> MessageListener {
        let counter = Arc::clone(counter);
        Arc::new(move |_: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_inject_without_handle_is_dropped() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.has_container());

        // Must not panic.
        registry.inject_code("true;");

        let err = registry.try_inject_code("true;").unwrap_err();
        assert!(matches!(err, Error::EnvironmentUnavailable { .. }));
    }

    #[test]
    fn test_inject_delivers_to_handle() {
        let registry = ConnectionRegistry::new();
        let delivered = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&delivered);

        let handle: Arc<dyn Outbound> = Arc::new(move |script: &str| {
            sink.lock().push(script.to_string());
        });
        registry.set_container_handle(Some(handle));

        registry.inject_code("window.a();");
        registry.inject_code("window.b();");
        assert_eq!(*delivered.lock(), vec!["window.a();", "window.b();"]);

        registry.set_container_handle(None);
        registry.inject_code("window.c();");
        assert_eq!(delivered.lock().len(), 2);
    }

    #[test]
    fn test_add_listener_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let listener = counting_listener(&counter);

        registry.add_listener(&listener);
        registry.add_listener(&listener);
        assert_eq!(registry.listener_count(), 1);

        registry.dispatch("{}");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_reaches_every_listener() {
        let registry = ConnectionRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let first = counting_listener(&counter);
        let second = counting_listener(&counter);

        registry.add_listener(&first);
        registry.add_listener(&second);
        registry.dispatch("{}");
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        registry.remove_listener(&first);
        registry.remove_listener(&first);
        registry.dispatch("{}");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_dispatch_passes_raw_text() {
        let registry = ConnectionRegistry::new();
        let seen = Arc::new(Mutex::new(None::<String>));
        let sink = Arc::clone(&seen);
        let listener: MessageListener = Arc::new(move |raw: &str| {
            *sink.lock() = Some(raw.to_string());
        });

        registry.add_listener(&listener);
        registry.dispatch(r#"{"type":"handshake"}"#);
        assert_eq!(seen.lock().as_deref(), Some(r#"{"type":"handshake"}"#));
    }

    #[test]
    fn test_listener_may_reenter_registry() {
        let registry = ConnectionRegistry::new();
        let weak = Arc::downgrade(&registry);
        let counter = Arc::new(AtomicUsize::new(0));
        let inner = counting_listener(&counter);

        let adder: MessageListener = Arc::new(move |_: &str| {
            if let Some(registry) = weak.upgrade() {
                registry.add_listener(&inner);
                registry.inject_code("true;");
            }
        });

        registry.add_listener(&adder);
        registry.dispatch("{}");
        // Snapshot excludes the listener added mid-dispatch.
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        registry.dispatch("{}");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cleanup() {
        let registry = ConnectionRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.add_listener(&counting_listener(&counter));
        let handle: Arc<dyn Outbound> = Arc::new(|_: &str| {});
        registry.set_container_handle(Some(handle));

        registry.cleanup();
        assert_eq!(registry.listener_count(), 0);
        assert!(!registry.has_container());

        registry.dispatch("{}");
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
