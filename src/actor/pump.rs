//! Stream Pump: Worker thread that drains the fragment source.
//!
//! The pump reads fragments on its own thread and hands each non-empty one
//! to the render loop through a rendezvous channel, so the producer never
//! runs ahead of the consumer. It publishes exactly one outcome and closes
//! the underlying stream exactly once, whichever of end of stream, error or
//! cancellation comes first.
//!
//! ```text
//! ┌─────────────┐  Fragment (cap 0)   ┌─────────────┐
//! │ Pump Thread │ ──────────────────▶ │ Render Loop │
//! └─────────────┘                     └─────────────┘
//!        │        Result<()> (cap 1)        ▲
//!        └──────────────────────────────────┘ (via orchestrator)
//! ```

use crate::cancel::CancelToken;
use crate::client::{Closer, OpenStream};
use crate::error::{Result, StreamError};
use crate::source::{Fragment, FragmentSource};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, Scope};

/// One-shot close capability for the stream a pump reads from.
///
/// Cloned between the pump and whoever may need to tear the stream down
/// early. The registered closer runs exactly once: on the first
/// [`close`](Self::close), or immediately at [`register`](Self::register)
/// if the handle was already closed.
#[derive(Clone, Default)]
pub struct PumpHandle {
    inner: Arc<HandleInner>,
}

#[derive(Default)]
struct HandleInner {
    closed: AtomicBool,
    closer: Mutex<Option<Closer>>,
}

impl PumpHandle {
    /// Create an open handle with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the stream's closer.
    ///
    /// Runs `closer` right away if the handle is already closed.
    pub fn register(&self, closer: Closer) {
        let mut slot = self
            .inner
            .closer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.inner.closed.load(Ordering::Acquire) {
            drop(slot);
            closer();
            return;
        }
        *slot = Some(closer);
    }

    /// Close the handle. Only the first call has any effect.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let closer = self
            .inner
            .closer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(closer) = closer {
            tracing::debug!("closing stream");
            closer();
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PumpHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PumpHandle")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Receiving side of a running pump.
pub struct StreamPump {
    /// Non-empty fragments, in order. Disconnects when the pump exits.
    fragments: Receiver<Fragment>,
    /// Exactly one terminal outcome.
    outcome: Receiver<Result<()>>,
}

impl StreamPump {
    /// Spawn a pump thread inside `scope`.
    ///
    /// `open` runs on the pump thread. The pump observes `cancel` before
    /// opening and while blocked handing off a fragment.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to spawn the pump thread.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_scoped<'scope, F>(
        scope: &'scope Scope<'scope, '_>,
        open: F,
        cancel: CancelToken,
        handle: PumpHandle,
    ) -> Self
    where
        F: FnOnce() -> Result<OpenStream> + Send + 'scope,
    {
        let (fragment_tx, fragment_rx) = bounded(0);
        let (outcome_tx, outcome_rx) = bounded(1);

        thread::Builder::new()
            .name("inkflow-pump".to_string())
            .spawn_scoped(scope, move || {
                Self::run(open, &cancel, &handle, fragment_tx, &outcome_tx);
            })
            .expect("Failed to spawn pump thread");

        Self {
            fragments: fragment_rx,
            outcome: outcome_rx,
        }
    }

    /// Split into the fragment and outcome receivers.
    pub fn into_parts(self) -> (Receiver<Fragment>, Receiver<Result<()>>) {
        (self.fragments, self.outcome)
    }

    /// Block on an outcome receiver obtained from [`into_parts`](Self::into_parts).
    pub fn await_outcome(outcome: &Receiver<Result<()>>) -> Result<()> {
        // The pump always publishes before exiting
        outcome.recv().unwrap_or(Err(StreamError::Canceled))
    }

    /// Pump thread body.
    fn run<F>(
        open: F,
        cancel: &CancelToken,
        handle: &PumpHandle,
        fragment_tx: Sender<Fragment>,
        outcome_tx: &Sender<Result<()>>,
    ) where
        F: FnOnce() -> Result<OpenStream>,
    {
        tracing::debug!("pump started");
        let result = Self::drain(open, cancel, handle, &fragment_tx);
        handle.close();

        match &result {
            Ok(()) => tracing::debug!("pump finished"),
            Err(e) if e.is_canceled() => tracing::debug!("pump canceled"),
            Err(e) => tracing::warn!(error = %e, "pump failed"),
        }

        // Publish before disconnecting so the outcome is ready when the
        // reader observes end of input
        let _ = outcome_tx.send(result);
        drop(fragment_tx);
    }

    fn drain<F>(
        open: F,
        cancel: &CancelToken,
        handle: &PumpHandle,
        fragment_tx: &Sender<Fragment>,
    ) -> Result<()>
    where
        F: FnOnce() -> Result<OpenStream>,
    {
        if cancel.is_canceled() {
            return Err(cancel.error());
        }

        let OpenStream { reader, closer } = open()?;
        handle.register(closer);

        let mut source = FragmentSource::new(reader);
        loop {
            let fragment = match source.next_fragment() {
                Ok(Some(fragment)) => fragment,
                Ok(None) => return Ok(()),
                // A read failing because we tore the stream down is a cancellation
                Err(_) if cancel.is_canceled() => return Err(cancel.error()),
                Err(e) => return Err(e),
            };
            if fragment.is_empty() {
                continue;
            }

            tracing::trace!(len = fragment.text.len(), "forwarding fragment");
            select! {
                send(fragment_tx, fragment) -> sent => {
                    if sent.is_err() {
                        // Reader went away
                        return Err(StreamError::Canceled);
                    }
                }
                recv(cancel.done()) -> _ => return Err(cancel.error()),
            }
        }
    }
}
