//! Cancel Token: A hierarchical cancellation scope for worker threads.
//!
//! A token is canceled at most once, with a cause. Canceling a token
//! cancels every child derived from it, never the parent. Threads observe
//! cancellation either by polling [`CancelToken::is_canceled`] or by
//! selecting on [`CancelToken::done`], a receiver that never yields a value
//! and disconnects the moment the token is canceled.
//!
//! ```ignore
//! select! {
//!     send(fragments, fragment) -> res => { /* delivered */ }
//!     recv(token.done()) -> _ => return Err(token.error()),
//! }
//! ```

use crate::error::StreamError;
use crossbeam_channel::{after, bounded, select, Receiver, Sender};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

const LIVE: u8 = 0;
const CANCELED: u8 = 1;
const DEADLINE: u8 = 2;

/// Shared state behind a token and its clones.
struct Inner {
    /// One of `LIVE`, `CANCELED`, `DEADLINE`.
    state: AtomicU8,
    /// Dropped on cancel so `done_rx` disconnects.
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new() -> Self {
        let (done_tx, done_rx) = bounded(0);
        Self {
            state: AtomicU8::new(LIVE),
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
            children: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self, cause: u8) {
        if self
            .state
            .compare_exchange(LIVE, cause, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if let Ok(mut tx) = self.done_tx.lock() {
            tx.take();
        }

        let children = self
            .children
            .lock()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default();
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel(cause);
        }
    }
}

/// Cloneable handle to a cancellation scope.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Create a new root token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
        }
    }

    /// Derive a child scope that is canceled together with this one.
    pub fn child(&self) -> Self {
        let child = Self::new();
        let mut parent_canceled = None;

        if let Ok(mut children) = self.inner.children.lock() {
            match self.inner.state.load(Ordering::Acquire) {
                LIVE => {
                    children.retain(|c| c.strong_count() > 0);
                    children.push(Arc::downgrade(&child.inner));
                }
                cause => parent_canceled = Some(cause),
            }
        }

        if let Some(cause) = parent_canceled {
            child.inner.cancel(cause);
        }
        child
    }

    /// Derive a child scope that cancels itself with
    /// [`StreamError::DeadlineExceeded`] once `timeout` elapses.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child scope that expires at `deadline`.
    ///
    /// The timer thread only holds a weak reference to the scope. It exits
    /// early once the scope is canceled or every handle to it is dropped.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let child = self.child();
        let watched = Arc::downgrade(&child.inner);
        // Disconnects on cancel and when the last handle drops
        let done = child.inner.done_rx.clone();

        thread::Builder::new()
            .name("inkflow-deadline".to_string())
            .spawn(move || {
                let timer = after(deadline.saturating_duration_since(Instant::now()));
                select! {
                    recv(timer) -> _ => {
                        if let Some(inner) = watched.upgrade() {
                            inner.cancel(DEADLINE);
                        }
                    }
                    recv(done) -> _ => {}
                }
            })
            .expect("Failed to spawn deadline thread");

        child
    }

    /// Cancel this scope and all of its children.
    ///
    /// Idempotent: only the first call takes effect.
    pub fn cancel(&self) {
        self.inner.cancel(CANCELED);
    }

    /// Whether the scope has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) != LIVE
    }

    /// Receiver that disconnects when the scope is canceled.
    ///
    /// No value is ever sent on it; use it as a `select!` arm.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done_rx
    }

    /// The error describing why this scope ended.
    ///
    /// Returns [`StreamError::Canceled`] for a live scope as well, so it is
    /// only meaningful after cancellation has been observed.
    pub fn error(&self) -> StreamError {
        match self.inner.state.load(Ordering::Acquire) {
            DEADLINE => StreamError::DeadlineExceeded,
            _ => StreamError::Canceled,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::RecvTimeoutError;

    #[test]
    fn test_cancel_disconnects_done() {
        let token = CancelToken::new();
        assert_eq!(
            token.done().recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Timeout)
        );

        token.cancel();
        assert!(token.is_canceled());
        assert_eq!(
            token.done().recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Disconnected)
        );
        assert!(token.error().is_canceled());
    }

    #[test]
    fn test_cancel_propagates_to_children_only() {
        let parent = CancelToken::new();
        let child = parent.child();
        let grandchild = child.child();

        child.cancel();
        assert!(!parent.is_canceled());
        assert!(child.is_canceled());
        assert!(grandchild.is_canceled());

        parent.cancel();
        assert!(parent.is_canceled());
    }

    #[test]
    fn test_child_of_canceled_parent_starts_canceled() {
        let parent = CancelToken::new();
        parent.cancel();
        assert!(parent.child().is_canceled());
    }

    #[test]
    fn test_deadline_cancels_with_deadline_cause() {
        let token = CancelToken::new().with_timeout(Duration::from_millis(20));
        assert!(token.done().recv_timeout(Duration::from_secs(2)).is_err());
        assert!(token.is_canceled());
        assert!(matches!(token.error(), StreamError::DeadlineExceeded));
    }

    #[test]
    fn test_explicit_cancel_beats_deadline() {
        let token = CancelToken::new().with_timeout(Duration::from_secs(60));
        token.cancel();
        assert!(token.error().is_canceled());
    }

    #[test]
    fn test_dropped_deadline_scope_is_released() {
        let token = CancelToken::new().with_timeout(Duration::from_secs(60));
        let weak = Arc::downgrade(&token.inner);
        let done = token.done().clone();

        drop(token);

        assert!(weak.upgrade().is_none());
        assert_eq!(
            done.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Disconnected)
        );
    }
}
