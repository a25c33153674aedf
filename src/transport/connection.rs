//! Host-side connection state machine.
//!
//! This module turns fire-and-forget code injection plus single outbound
//! text messages into awaitable request/response calls.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected --connect()--> Connecting --handshake--> Connected
//!      ^                          |                         |
//!      +------- timeout ----------+                         |
//!      +---------------------- disconnect() ----------------+
//! ```
//!
//! # Correlation
//!
//! Every request gets a fresh [`MessageId`] and a [`Deferred`] in the
//! pending table. The entry is removed exactly once: by its reply, by its
//! error, by its own timeout, or by `disconnect()`. Late replies find no
//! entry and are dropped.

// ============================================================================
// Imports
// ============================================================================

use std::mem;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::bridge::BridgeOptions;
use crate::deferred::Deferred;
use crate::error::{Error, Result};
use crate::identifiers::MessageId;
use crate::protocol::{
    AgentGlobals, ErrorData, Message, MessageKind, Request, handshake_call, send_call,
    teardown_call,
};

use super::registry::{ConnectionRegistry, MessageListener};

// ============================================================================
// Types
// ============================================================================

/// Map of correlation ids to in-flight requests.
type PendingMap = FxHashMap<MessageId, Deferred<Value>>;

/// Caller waiting on `connect()`.
type ConnectWaiter = oneshot::Sender<Result<bool>>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No dedicated channel.
    Disconnected,
    /// Handshake injected, acknowledgement pending.
    Connecting,
    /// Dedicated channel established.
    Connected,
}

/// State guarded by a single lock so transitions never interleave.
struct Lifecycle {
    state: ConnectionState,
    waiters: Vec<ConnectWaiter>,
    timer: Option<JoinHandle<()>>,
    /// Bumped per connect attempt so a stale timer cannot fire.
    attempt: u64,
}

impl Lifecycle {
    fn take_timer(&mut self) -> Option<JoinHandle<()>> {
        self.timer.take()
    }
}

// ============================================================================
// ConnectionInner
// ============================================================================

struct ConnectionInner {
    registry: Arc<ConnectionRegistry>,
    globals: AgentGlobals,
    connection_timeout: Duration,
    message_timeout: Duration,
    max_pending: usize,
    lifecycle: Mutex<Lifecycle>,
    pending: Mutex<PendingMap>,
    /// This connection's dispatch entry point, registered on the registry.
    listener: MessageListener,
}

// ============================================================================
// Connection
// ============================================================================

/// Bridge client speaking the request/response protocol.
///
/// Cheap to clone; clones share state.
///
/// # Example
///
/// ```ignore
/// let connection = Connection::new(registry, &BridgeOptions::default());
/// connection.add_message_listener();
///
/// let signed: Value = connection
///     .send_message(Request::wallet(json!({ "value": "1000" })))
///     .await?;
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a disconnected connection bound to `registry`.
    ///
    /// The connection does not listen for inbound messages until
    /// [`add_message_listener`](Self::add_message_listener) is called.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, options: &BridgeOptions) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<ConnectionInner>| {
            let weak = weak.clone();
            let listener: MessageListener = Arc::new(move |raw: &str| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_message(raw);
                }
            });

            ConnectionInner {
                registry,
                globals: options.globals.clone(),
                connection_timeout: options.connection_timeout,
                message_timeout: options.message_timeout,
                max_pending: options.max_pending_requests,
                lifecycle: Mutex::new(Lifecycle {
                    state: ConnectionState::Disconnected,
                    waiters: Vec::new(),
                    timer: None,
                    attempt: 0,
                }),
                pending: Mutex::new(PendingMap::default()),
                listener,
            }
        });

        Self { inner }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.lock().state
    }

    /// Returns `true` if the dedicated channel is established.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Starts receiving inbound messages from the registry.
    pub fn add_message_listener(&self) {
        self.inner.registry.add_listener(&self.inner.listener);
    }

    /// Stops receiving inbound messages from the registry.
    pub fn remove_message_listener(&self) {
        self.inner.registry.remove_listener(&self.inner.listener);
    }

    /// Processes one raw inbound message.
    ///
    /// Normally reached through the registry listener; exposed for
    /// containers that forward messages directly.
    pub fn handle_message(&self, raw: &str) {
        self.inner.handle_message(raw);
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Establishes the dedicated channel.
    ///
    /// Resolves `true` immediately when already connected. Concurrent
    /// callers share one in-flight handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the handshake is not acknowledged
    /// - [`Error::ProtocolViolation`] if the content refuses the handshake
    /// - [`Error::Disconnected`] if `disconnect()` runs meanwhile
    pub async fn connect(&self) -> Result<bool> {
        let (receiver, start_handshake) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                ConnectionState::Connected => return Ok(true),
                ConnectionState::Connecting => {
                    let (tx, rx) = oneshot::channel();
                    lifecycle.waiters.push(tx);
                    trace!("Joining in-flight handshake");
                    (rx, false)
                }
                ConnectionState::Disconnected => {
                    let (tx, rx) = oneshot::channel();
                    lifecycle.state = ConnectionState::Connecting;
                    lifecycle.attempt += 1;
                    lifecycle.waiters.push(tx);
                    if let Some(stale) = lifecycle.take_timer() {
                        stale.abort();
                    }
                    lifecycle.timer = Some(self.inner.arm_connect_timer(lifecycle.attempt));
                    debug!(attempt = lifecycle.attempt, "Connecting");
                    (rx, true)
                }
            }
        };

        // Outside the lock: the container may answer synchronously.
        if start_handshake {
            self.inner
                .registry
                .inject_code(&handshake_call(&self.inner.globals));
        }

        receiver.await.map_err(|_| Error::Disconnected)?
    }

    /// Tears the connection down.
    ///
    /// Every pending request rejects with [`Error::Disconnected`] and the
    /// table is cleared; so does any caller still waiting on `connect()`.
    pub fn disconnect(&self) {
        let (previous, waiters, timer) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            let previous = mem::replace(&mut lifecycle.state, ConnectionState::Disconnected);
            lifecycle.attempt += 1;
            (
                previous,
                mem::take(&mut lifecycle.waiters),
                lifecycle.take_timer(),
            )
        };

        if let Some(timer) = timer {
            timer.abort();
        }
        for waiter in waiters {
            let _ = waiter.send(Err(Error::Disconnected));
        }

        let pending: Vec<_> = self.inner.pending.lock().drain().collect();
        let count = pending.len();
        for (_, deferred) in pending {
            deferred.reject(Error::Disconnected);
        }

        if previous != ConnectionState::Disconnected {
            self.inner
                .registry
                .inject_code(&teardown_call(&self.inner.globals));
        }

        debug!(?previous, failed_requests = count, "Disconnected");
    }
}

// ============================================================================
// Connection - Requests
// ============================================================================

impl Connection {
    /// Sends a request and decodes the reply payload as `T`.
    ///
    /// # Errors
    ///
    /// Everything [`send_raw`](Self::send_raw) returns, plus
    /// [`Error::Json`] if the reply does not decode as `T`.
    pub async fn send_message<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let value = self.send_raw(request).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Sends a request and returns the raw reply payload.
    ///
    /// Connects first when needed. Single-shot: nothing is retried.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] for reserved kinds or too many pending requests
    /// - [`Error::ConnectionTimeout`] if the implicit connect fails
    /// - [`Error::RequestTimeout`] if no reply arrives in time
    /// - [`Error::Remote`] / [`Error::ProtocolViolation`] if the content
    ///   answers with an `error` message
    /// - [`Error::Disconnected`] if `disconnect()` runs meanwhile
    pub async fn send_raw(&self, request: Request) -> Result<Value> {
        if !request.kind.is_request_kind() {
            return Err(Error::protocol(format!(
                "'{}' is reserved and cannot be sent as a request",
                request.kind
            )));
        }

        if !self.is_connected() {
            self.connect().await?;
        }

        let message_id = MessageId::generate();
        let script = send_call(
            &self.inner.globals,
            &request.kind,
            &message_id,
            &request.data,
        )?;

        let settlement = {
            let mut pending = self.inner.pending.lock();
            if pending.len() >= self.inner.max_pending {
                warn!(
                    pending = pending.len(),
                    max = self.inner.max_pending,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    pending.len(),
                    self.inner.max_pending
                )));
            }

            let (deferred, settlement) = Deferred::with_timeout_hook(
                self.inner.message_timeout,
                self.inner.request_timeout_hook(message_id.clone()),
            );
            pending.insert(message_id.clone(), deferred);
            settlement
        };

        trace!(message_id = %message_id, kind = %request.kind, "Request sent");
        self.inner.registry.inject_code(&script);

        settlement.await
    }
}

// ============================================================================
// ConnectionInner - Timers
// ============================================================================

impl ConnectionInner {
    /// Spawns the handshake deadline for `attempt`.
    fn arm_connect_timer(self: &Arc<Self>, attempt: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let timeout = self.connection_timeout;

        tokio::spawn(async move {
            sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire_connect(attempt);
            }
        })
    }

    fn expire_connect(&self, attempt: u64) {
        let waiters = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != ConnectionState::Connecting || lifecycle.attempt != attempt {
                return;
            }
            lifecycle.state = ConnectionState::Disconnected;
            lifecycle.timer = None;
            mem::take(&mut lifecycle.waiters)
        };

        let timeout_ms = self.connection_timeout.as_millis() as u64;
        warn!(timeout_ms, "Handshake not acknowledged");

        for waiter in waiters {
            let _ = waiter.send(Err(Error::connection_timeout(timeout_ms)));
        }
    }

    /// Expiry for one request: drop its table entry, report the id.
    fn request_timeout_hook(
        self: &Arc<Self>,
        message_id: MessageId,
    ) -> impl FnOnce(Duration) -> Error + Send + 'static {
        let weak = Arc::downgrade(self);

        move |timeout| {
            if let Some(inner) = weak.upgrade() {
                inner.pending.lock().remove(&message_id);
            }
            let timeout_ms = timeout.as_millis() as u64;
            debug!(message_id = %message_id, timeout_ms, "Request timed out");
            Error::request_timeout(message_id, timeout_ms)
        }
    }
}

// ============================================================================
// ConnectionInner - Inbound Dispatch
// ============================================================================

impl ConnectionInner {
    fn handle_message(&self, raw: &str) {
        let message = match Message::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, raw_len = raw.len(), "Dropping malformed inbound message");
                return;
            }
        };

        trace!(kind = %message.kind, message_id = ?message.message_id, "Inbound message");

        match message.kind {
            MessageKind::Handshake => self.on_handshake(),
            MessageKind::Error => self.on_error(message),
            _ => self.on_response(message),
        }
    }

    fn on_handshake(&self) {
        let (waiters, timer) = {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.state {
                ConnectionState::Connecting => {}
                ConnectionState::Connected => {
                    trace!("Duplicate handshake ignored");
                    return;
                }
                // Ack racing a disconnect: the teardown already closed the channel.
                ConnectionState::Disconnected => {
                    debug!("Handshake while disconnected ignored");
                    return;
                }
            }
            lifecycle.state = ConnectionState::Connected;
            (mem::take(&mut lifecycle.waiters), lifecycle.take_timer())
        };

        if let Some(timer) = timer {
            timer.abort();
        }

        debug!(waiters = waiters.len(), "Connected");
        for waiter in waiters {
            let _ = waiter.send(Ok(true));
        }
    }

    fn on_error(&self, message: Message) {
        let error = message.error_data();
        let Some(message_id) = message.message_id else {
            warn!(error = %error.message, "Error without messageId dropped");
            return;
        };

        if message_id.is_handshake() {
            self.fail_handshake(error);
            return;
        }

        match self.take_pending(&message_id) {
            Some(deferred) => {
                debug!(message_id = %message_id, error = %error.message, "Request failed remotely");
                deferred.reject(error.into_error());
            }
            None => trace!(message_id = %message_id, "Error for unknown request dropped"),
        }
    }

    fn on_response(&self, message: Message) {
        let Some(message_id) = message.message_id else {
            warn!(kind = %message.kind, "Response without messageId dropped");
            return;
        };

        match self.take_pending(&message_id) {
            Some(deferred) => {
                trace!(message_id = %message_id, "Response matched");
                deferred.resolve(message.data);
            }
            None => trace!(message_id = %message_id, "Response for unknown request dropped"),
        }
    }

    /// Handshake refused by the content: fail the attempt in progress.
    fn fail_handshake(&self, error: ErrorData) {
        let (waiters, timer) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != ConnectionState::Connecting {
                debug!(error = %error.message, state = ?lifecycle.state, "Handshake error ignored");
                return;
            }
            lifecycle.state = ConnectionState::Disconnected;
            (mem::take(&mut lifecycle.waiters), lifecycle.take_timer())
        };

        if let Some(timer) = timer {
            timer.abort();
        }

        warn!(error = %error.message, code = ?error.code, "Handshake refused");
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone().into_error()));
        }
    }

    fn take_pending(&self, message_id: &MessageId) -> Option<Deferred<Value>> {
        self.pending.lock().remove(message_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
