//! Settle-once deferred values with an attached timeout.
//!
//! A [`Deferred`] is the producer half: it is resolved or rejected exactly
//! once. The matching [`Settlement`] is the awaitable consumer half.
//!
//! ```ignore
//! let (deferred, settlement) = Deferred::<u32>::with_timeout(Duration::from_secs(1));
//! deferred.resolve(7);
//! assert_eq!(settlement.await?, 7);
//! ```
//!
//! # States
//!
//! `Unresolved → Resolved` or `Unresolved → Rejected`. Terminal states are
//! sticky: later `resolve`/`reject` calls return `false` and do nothing.
//!
//! Timers run as Tokio tasks, so a deadline can only be armed from within
//! a Tokio runtime.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Produces the rejection error when a deadline passes.
///
/// Runs at most once, outside the deferred's lock, and only if the value
/// was still unresolved.
pub type TimeoutHook = Box<dyn FnOnce(Duration) -> Error + Send + 'static>;

/// Observable state of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
    /// Not settled yet.
    Unresolved,
    /// Settled with a value.
    Resolved,
    /// Settled with an error.
    Rejected,
}

/// Shared slot behind every handle.
struct Inner<T> {
    state: DeferredState,
    sender: Option<oneshot::Sender<Result<T>>>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every arm so a superseded timer never fires.
    generation: u64,
    on_timeout: Option<TimeoutHook>,
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

// ============================================================================
// Deferred
// ============================================================================

/// Producer half of a settle-once value.
///
/// Cloning yields another handle to the same slot.
pub struct Deferred<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Deferred")
            .field("state", &inner.state)
            .field("timer_armed", &inner.timer.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Deferred - Constructors
// ============================================================================

impl<T: Send + 'static> Deferred<T> {
    /// Creates a deferred value with no deadline.
    #[must_use]
    pub fn new() -> (Self, Settlement<T>) {
        Self::build(None, None)
    }

    /// Creates a deferred value that rejects with [`Error::Timeout`] if
    /// not settled within `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> (Self, Settlement<T>) {
        Self::build(Some(timeout), None)
    }

    /// Creates a deferred value whose expiry error comes from `hook`.
    #[must_use]
    pub fn with_timeout_hook(
        timeout: Duration,
        hook: impl FnOnce(Duration) -> Error + Send + 'static,
    ) -> (Self, Settlement<T>) {
        Self::build(Some(timeout), Some(Box::new(hook)))
    }

    fn build(timeout: Option<Duration>, on_timeout: Option<TimeoutHook>) -> (Self, Settlement<T>) {
        let (sender, receiver) = oneshot::channel();
        let deferred = Self {
            inner: Arc::new(Mutex::new(Inner {
                state: DeferredState::Unresolved,
                sender: Some(sender),
                timer: None,
                generation: 0,
                on_timeout,
            })),
        };

        if let Some(timeout) = timeout {
            deferred.arm(timeout);
        }

        (deferred, Settlement { receiver })
    }
}

// ============================================================================
// Deferred - Public API
// ============================================================================

impl<T: Send + 'static> Deferred<T> {
    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> DeferredState {
        self.inner.lock().state
    }

    /// Returns `true` once resolved or rejected.
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state() != DeferredState::Unresolved
    }

    /// Resolves with `value`.
    ///
    /// Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(DeferredState::Resolved, Ok(value))
    }

    /// Rejects with `error`.
    ///
    /// Returns `false` if already settled.
    pub fn reject(&self, error: Error) -> bool {
        self.settle(DeferredState::Rejected, Err(error))
    }

    /// Replaces the deadline with a fresh one starting now.
    ///
    /// State is untouched; a settled value stays settled.
    pub fn reset_timeout(&self, timeout: Duration) {
        self.arm(timeout);
    }

    /// Rejects with [`Error::Disposed`] if unresolved and cancels any timer.
    pub fn dispose(&self) {
        if !self.reject(Error::Disposed) {
            let timer = self.inner.lock().timer.take();
            if let Some(timer) = timer {
                timer.abort();
            }
        }
    }
}

// ============================================================================
// Deferred - Internals
// ============================================================================

impl<T: Send + 'static> Deferred<T> {
    fn settle(&self, state: DeferredState, outcome: Result<T>) -> bool {
        let (sender, timer) = {
            let mut inner = self.inner.lock();
            if inner.state != DeferredState::Unresolved {
                return false;
            }
            inner.state = state;
            inner.on_timeout = None;
            (inner.sender.take(), inner.timer.take())
        };

        if let Some(timer) = timer {
            timer.abort();
        }
        if let Some(sender) = sender {
            // Receiver may be gone; the settlement is still recorded.
            let _ = sender.send(outcome);
        }
        true
    }

    fn arm(&self, timeout: Duration) {
        let mut inner = self.inner.lock();
        if let Some(previous) = inner.timer.take() {
            previous.abort();
        }
        if inner.state != DeferredState::Unresolved {
            return;
        }

        inner.generation += 1;
        let generation = inner.generation;
        let weak = Arc::downgrade(&self.inner);

        inner.timer = Some(tokio::spawn(async move {
            sleep(timeout).await;
            Self::expire(&weak, generation, timeout);
        }));
    }

    fn expire(inner: &Weak<Mutex<Inner<T>>>, generation: u64, timeout: Duration) {
        let Some(inner) = inner.upgrade() else {
            return;
        };

        let (sender, hook) = {
            let mut guard = inner.lock();
            if guard.state != DeferredState::Unresolved || guard.generation != generation {
                return;
            }
            guard.state = DeferredState::Rejected;
            // Our own handle; dropping it detaches.
            guard.timer = None;
            (guard.sender.take(), guard.on_timeout.take())
        };

        let timeout_ms = timeout.as_millis() as u64;
        let error = match hook {
            Some(hook) => hook(timeout),
            None => Error::timeout("deferred", timeout_ms),
        };

        trace!(timeout_ms, "Deferred timed out");

        if let Some(sender) = sender {
            let _ = sender.send(Err(error));
        }
    }
}

// ============================================================================
// Settlement
// ============================================================================

/// Awaitable outcome of a [`Deferred`].
///
/// Yields [`Error::Disposed`] if every `Deferred` handle is dropped
/// without settling.
#[derive(Debug)]
#[must_use = "a settlement does nothing unless awaited"]
pub struct Settlement<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Future for Settlement<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver
            .poll_unpin(cx)
            .map(|received| received.unwrap_or_else(|_| Err(Error::Disposed)))
    }
}

// ============================================================================
// Tests
// ============================================================================
