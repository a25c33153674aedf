//! Bridge facade tying the registry, the connection and the agent together.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::agent::ContentLoad;
use crate::error::Result;
use crate::protocol::Request;
use crate::transport::{Connection, ConnectionRegistry, ConnectionState, Outbound};

use super::builder::BridgeBuilder;
use super::options::BridgeOptions;

// ============================================================================
// Bridge
// ============================================================================

/// One embedded-content bridge.
///
/// Owns its registry and connection, so independent bridges never share
/// state. Cheap to clone; clones share state.
///
/// The container drives the `on_*` methods; callers use `connect`,
/// `send_message` and `disconnect`.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    registry: Arc<ConnectionRegistry>,
    connection: Connection,
    load: ContentLoad,
    options: BridgeOptions,
}

// ============================================================================
// Bridge - Display
// ============================================================================

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.state())
            .field("agent_installed", &self.inner.load.is_installed())
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Bridge - Construction
// ============================================================================

impl Bridge {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    pub(crate) fn new(options: BridgeOptions, container: Option<Arc<dyn Outbound>>) -> Result<Self> {
        let load = ContentLoad::new(&options.globals)?;
        let registry = ConnectionRegistry::new();
        if container.is_some() {
            registry.set_container_handle(container);
        }

        let connection = Connection::new(Arc::clone(&registry), &options);
        connection.add_message_listener();

        debug!(
            namespace = options.globals.namespace(),
            connection_timeout_ms = options.connection_timeout.as_millis() as u64,
            message_timeout_ms = options.message_timeout.as_millis() as u64,
            "Bridge created"
        );

        Ok(Self {
            inner: Arc::new(BridgeInner {
                registry,
                connection,
                load,
                options,
            }),
        })
    }
}

// ============================================================================
// Bridge - Container Hooks
// ============================================================================

impl Bridge {
    /// Attaches the container's code-injection primitive.
    pub fn set_container(&self, container: impl Outbound + 'static) {
        self.inner
            .registry
            .set_container_handle(Some(Arc::new(container)));
    }

    /// Detaches the container; later injections are dropped.
    pub fn detach_container(&self) {
        self.inner.registry.set_container_handle(None);
    }

    /// Content finished loading: installs the agent once per load.
    ///
    /// Returns `Ok(false)` if this load already has the agent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnvironmentUnavailable`](crate::Error::EnvironmentUnavailable)
    /// if no container is attached.
    pub fn on_load_end(&self) -> Result<bool> {
        self.inner.load.install(&self.inner.registry)
    }

    /// Content is navigating away: the agent and its channel are gone.
    ///
    /// Pending requests reject with [`Error::Disconnected`](crate::Error::Disconnected).
    pub fn on_navigation(&self) {
        self.inner.load.reset();
        self.inner.connection.disconnect();
    }

    /// Forwards one inbound text message from the content.
    pub fn on_message(&self, raw: &str) {
        self.inner.registry.dispatch(raw);
    }
}

// ============================================================================
// Bridge - Public API
// ============================================================================

impl Bridge {
    /// Establishes the dedicated channel.
    ///
    /// # Errors
    ///
    /// See [`Connection::connect`].
    pub async fn connect(&self) -> Result<bool> {
        self.inner.connection.connect().await
    }

    /// Sends a request and decodes the reply as `T`.
    ///
    /// # Errors
    ///
    /// See [`Connection::send_message`].
    pub async fn send_message<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        self.inner.connection.send_message(request).await
    }

    /// Sends a request and returns the raw reply payload.
    ///
    /// # Errors
    ///
    /// See [`Connection::send_raw`].
    pub async fn send_raw(&self, request: Request) -> Result<Value> {
        self.inner.connection.send_raw(request).await
    }

    /// Tears the channel down, failing every pending request.
    pub fn disconnect(&self) {
        self.inner.connection.disconnect();
    }

    /// Detaches from the container for good.
    ///
    /// Removes the listener, disconnects, and clears the registry.
    pub fn shutdown(&self) {
        self.inner.connection.remove_message_listener();
        self.inner.connection.disconnect();
        self.inner.registry.cleanup();
        info!("Bridge shut down");
    }

    /// Returns the connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Returns `true` if the dedicated channel is established.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Returns the registry shared with the container.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.inner.registry
    }

    /// Returns the options this bridge was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Weak;

    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::task::yield_now;

    use crate::error::Error;

    /// Minimal content: acknowledges handshakes and echoes requests.
    struct FakeContent {
        bridge: Mutex<Weak<BridgeInner>>,
        scripts: Mutex<Vec<String>>,
        echo: bool,
    }

    impl FakeContent {
        fn new(echo: bool) -> Arc<Self> {
            Arc::new(Self {
                bridge: Mutex::new(Weak::new()),
                scripts: Mutex::new(Vec::new()),
                echo,
            })
        }

        fn attach(self: &Arc<Self>, bridge: &Bridge) {
            *self.bridge.lock() = Arc::downgrade(&bridge.inner);
            let content = Arc::clone(self);
            bridge.set_container(move |script: &str| content.run(script));
        }

        fn run(&self, script: &str) {
            self.scripts.lock().push(script.to_string());
            let Some(inner) = self.bridge.lock().upgrade() else {
                return;
            };

            if script.contains(".handshake()") {
                inner
                    .registry
                    .dispatch(r#"{"type":"handshake","messageId":"handshake"}"#);
            } else if self.echo
                && let Some(args) = script
                    .strip_prefix("window.__webBridge.sendMessage(")
                    .and_then(|s| s.strip_suffix(");\ntrue;"))
                && let Ok(Value::Array(args)) = serde_json::from_str(&format!("[{args}]"))
            {
                let reply = json!({ "type": args[0], "messageId": args[1], "data": args[2] });
                inner.registry.dispatch(&reply.to_string());
            }
        }

        fn scripts(&self) -> Vec<String> {
            self.scripts.lock().clone()
        }
    }

    fn bridge_with(content: &Arc<FakeContent>) -> Bridge {
        let bridge = Bridge::builder().build().expect("valid bridge");
        content.attach(&bridge);
        bridge
    }

    #[tokio::test]
    async fn test_round_trip_through_bridge() {
        let content = FakeContent::new(true);
        let bridge = bridge_with(&content);

        assert!(bridge.on_load_end().expect("install"));
        let reply: Value = bridge
            .send_message(Request::wallet(json!({"value": "1000"})))
            .await
            .expect("reply");

        assert_eq!(reply, json!({"value": "1000"}));
        assert!(bridge.is_connected());

        let scripts = content.scripts();
        assert_eq!(scripts.len(), 3);
        assert!(scripts[0].starts_with("(function() {"));
        assert!(scripts[1].contains(".handshake()"));
        assert!(scripts[2].contains(".sendMessage(\"wallet\""));
    }

    #[tokio::test]
    async fn test_on_load_end_installs_once() {
        let content = FakeContent::new(false);
        let bridge = bridge_with(&content);

        assert!(bridge.on_load_end().expect("first"));
        assert!(!bridge.on_load_end().expect("second"));
        assert_eq!(content.scripts().len(), 1);
    }

    #[test]
    fn test_on_load_end_without_container() {
        let bridge = Bridge::builder().build().expect("valid bridge");
        let err = bridge.on_load_end().unwrap_err();
        assert!(matches!(err, Error::EnvironmentUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_navigation_fails_pending_and_resets_load() {
        let content = FakeContent::new(false);
        let bridge = bridge_with(&content);
        bridge.on_load_end().expect("install");

        let send = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.send_raw(Request::new("ping", Value::Null)).await }
        });
        while bridge.connection().pending_count() == 0 {
            yield_now().await;
        }

        bridge.on_navigation();
        assert!(matches!(send.await.expect("join"), Err(Error::Disconnected)));
        assert_eq!(bridge.state(), ConnectionState::Disconnected);

        // New load gets a fresh agent.
        assert!(bridge.on_load_end().expect("reinstall"));
    }

    #[tokio::test]
    async fn test_on_message_reaches_connection() {
        // No container: the handshake call is dropped, the ack comes in by hand.
        let bridge = Bridge::builder().build().expect("valid bridge");
        let connect = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.connect().await }
        });
        while bridge.state() != ConnectionState::Connecting {
            yield_now().await;
        }

        bridge.on_message(r#"{"type":"handshake","messageId":"handshake"}"#);
        assert!(connect.await.expect("join").expect("connect"));
        assert!(bridge.is_connected());
    }

    #[tokio::test]
    async fn test_shutdown_detaches_everything() {
        let content = FakeContent::new(true);
        let bridge = bridge_with(&content);
        bridge.connect().await.expect("connect");

        bridge.shutdown();
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
        assert_eq!(bridge.registry().listener_count(), 0);
        assert!(!bridge.registry().has_container());

        // Inbound traffic no longer reaches the connection.
        bridge.on_message(r#"{"type":"handshake","messageId":"handshake"}"#);
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_independent_bridges_do_not_share_state() {
        let first_content = FakeContent::new(true);
        let first = bridge_with(&first_content);
        let second = Bridge::builder().build().expect("valid bridge");

        first.connect().await.expect("connect");
        assert!(first.is_connected());
        assert!(!second.is_connected());
        assert!(!second.registry().has_container());
    }
}
