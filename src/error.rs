//! Error types for the streaming pipeline.
//!
//! Every stage reports a [`StreamError`]. Callers usually only care about
//! the coarse [`ErrorKind`], in particular whether the run was canceled
//! (which is not worth logging as a failure).

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Coarse classification of a [`StreamError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Opening or reading the remote stream failed.
    Transport,
    /// A payload could not be decoded.
    Decode,
    /// The run was canceled by the caller, a deadline or the interrupt key.
    Canceled,
    /// The markdown renderer rejected the accumulated text.
    Render,
    /// Writing to the terminal or the output sink failed.
    Io,
}

/// Errors produced by the client, the pump and the render loop.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The HTTP request could not be sent.
    #[error("failed to send request: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("API error (status {status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Trimmed response body.
        body: String,
    },

    /// Reading the event stream failed.
    #[error("stream error: {0}")]
    Read(#[source] std::io::Error),

    /// A `data:` payload was not a valid chunk record.
    #[error("failed to decode stream chunk {payload:?}: {source}")]
    Decode {
        /// The offending payload, verbatim.
        payload: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A non-streaming response was not valid JSON.
    #[error("failed to decode response: {0}")]
    DecodeResponse(#[source] serde_json::Error),

    /// A non-streaming response carried no choices.
    #[error("no completion choices returned")]
    NoChoices,

    /// The run was canceled.
    #[error("canceled")]
    Canceled,

    /// The caller's deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The markdown renderer failed.
    #[error("failed to render markdown: {0}")]
    Render(String),

    /// Terminal or sink I/O failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) | Self::Api { .. } | Self::Read(_) => ErrorKind::Transport,
            Self::Decode { .. } | Self::DecodeResponse(_) | Self::NoChoices => ErrorKind::Decode,
            Self::Canceled | Self::DeadlineExceeded => ErrorKind::Canceled,
            Self::Render(_) => ErrorKind::Render,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether this is an explicit cancellation (not a deadline).
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Output accumulated by a run, complete or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Concatenated fragment text as received.
    pub raw: String,
    /// Last styled rendering of `raw` (equal to `raw` in raw mode).
    pub rendered: String,
}

/// A failed run, together with whatever was received before the failure.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct StreamFailure {
    /// The authoritative error of the run.
    #[source]
    pub error: StreamError,
    /// Content accumulated before the failure.
    pub partial: Transcript,
}

impl StreamFailure {
    /// Classify the underlying error.
    pub const fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Drop the partial output and keep the error.
    pub fn into_error(self) -> StreamError {
        self.error
    }
}

impl From<StreamError> for StreamFailure {
    fn from(error: StreamError) -> Self {
        Self {
            error,
            partial: Transcript::default(),
        }
    }
}
