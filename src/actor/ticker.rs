//! Ticker Actor: Dedicated thread for generating timing events.
//!
//! The render loop runs two of these while the loader is visible: one for
//! glyph animation and one for the trailing ellipsis. Ticks carry the
//! instant they fired at so consumers stay pure functions of time.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(5);

/// A tick event sent at regular intervals.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    /// Tick number (monotonically increasing).
    pub frame: u64,
    /// When the tick fired.
    pub at: Instant,
}

/// Ticker actor that generates regular timing events.
pub struct TickerActor {
    /// Handle to the ticker thread.
    handle: Option<JoinHandle<()>>,
    /// Flag to signal shutdown.
    shutdown: Arc<AtomicBool>,
    /// Receiver for tick events.
    tick_rx: Receiver<Tick>,
}

impl TickerActor {
    /// Spawn a new ticker actor with the given interval.
    ///
    /// The first tick fires one `interval` after spawning.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to spawn the ticker thread.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn(name: &str, interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        // Small buffer: a slow loop should skip ticks, not replay them
        let (tick_tx, tick_rx) = bounded(1);

        let handle = thread::Builder::new()
            .name(format!("inkflow-{name}"))
            .spawn(move || {
                Self::run_loop(&tick_tx, &shutdown_clone, interval);
            })
            .expect("Failed to spawn ticker thread");

        Self {
            handle: Some(handle),
            shutdown,
            tick_rx,
        }
    }

    /// Get a reference to the tick receiver, for use in `select!`.
    #[inline]
    pub const fn receiver(&self) -> &Receiver<Tick> {
        &self.tick_rx
    }

    /// Signal the ticker to shutdown.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Wait for the ticker thread to finish.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Tick until shut down or the receiver goes away.
    ///
    /// Missed deadlines are skipped rather than replayed: the loader only
    /// cares about the latest instant.
    fn run_loop(tick_tx: &Sender<Tick>, shutdown: &AtomicBool, interval: Duration) {
        let mut frame = 0u64;
        let mut deadline = Instant::now() + interval;

        while !shutdown.load(Ordering::Relaxed) {
            let now = Instant::now();
            if let Some(wait) = deadline.checked_duration_since(now).filter(|w| !w.is_zero()) {
                // Short slices keep shutdown responsive for long intervals
                thread::sleep(wait.min(SLEEP_SLICE));
                continue;
            }

            match tick_tx.try_send(Tick { frame, at: now }) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => break,
            }
            frame += 1;
            deadline = (deadline + interval).max(now + interval / 2);
        }
    }
}

impl Drop for TickerActor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
