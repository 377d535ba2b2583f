//! Logging: File-backed `tracing` subscriber.
//!
//! The terminal belongs to the render loop, so log lines go to a file.
//! The level comes from `INKFLOW_LOG` (an `EnvFilter` directive) and
//! defaults to `info`.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "INKFLOW_LOG";

/// Install the global subscriber, appending to `path`.
///
/// Does nothing if a subscriber is already installed.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn init_file<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;

    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_thread_names(true)
        .with_ansi(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init();
    Ok(())
}
