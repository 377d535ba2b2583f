//! Pipeline: Streams a completion and renders it as it arrives.
//!
//! ```text
//! Transport ──▶ FragmentSource ──▶ StreamPump ──▶ render loop ──▶ sink
//!                                     ▲               │
//!                                     └── cancel ─────┘ (interrupt)
//! ```
//!
//! The pump runs on a scoped thread so it can borrow the transport and the
//! request. The render loop runs on the calling thread. Cancellation flows
//! both ways: the caller's scope stops both, and an interrupt in the loop
//! cancels the reader scope and closes the stream.

use crate::actor::{PumpHandle, StreamPump};
use crate::cancel::CancelToken;
use crate::client::{ChatCompletionRequest, Client, Transport};
use crate::error::{Result, StreamFailure, Transcript};
use crate::view::{self, StreamOptions};
use std::io::Write;
use std::thread;

/// Stream `request` through `transport` and render it to `sink`.
///
/// The request is sent with `stream` forced on. Blocks until the stream
/// ends, fails or is canceled through `parent` or the interrupt key.
///
/// # Errors
///
/// Returns a [`StreamFailure`] with the content received so far. When the
/// loop was canceled and the pump also failed, the pump's error wins.
pub fn stream_markdown<T, W>(
    transport: &T,
    parent: &CancelToken,
    request: &ChatCompletionRequest,
    sink: &mut W,
    mut opts: StreamOptions,
) -> Result<Transcript, StreamFailure>
where
    T: Transport + ?Sized,
    W: Write + ?Sized,
{
    let mut request = request.clone();
    request.stream = true;

    let reader_scope = parent.child();
    let handle = PumpHandle::new();

    let callback = opts.on_interrupt.take();
    let interrupt_scope = reader_scope.clone();
    let interrupt_handle = handle.clone();
    opts.on_interrupt = Some(Box::new(move || {
        interrupt_scope.cancel();
        interrupt_handle.close();
        if let Some(callback) = callback {
            callback();
        }
    }));

    let request = &request;
    let result = thread::scope(|s| {
        let pump = StreamPump::spawn_scoped(
            s,
            move || {
                tracing::debug!(model = %request.model, "opening stream");
                transport.open(request)
            },
            reader_scope.clone(),
            handle.clone(),
        );
        let (fragments, outcome) = pump.into_parts();

        let rendered = view::render_stream(parent, &fragments, sink, opts);

        // Unblock the pump whatever the loop's exit reason
        drop(fragments);
        reader_scope.cancel();
        handle.close();
        let pumped = StreamPump::await_outcome(&outcome);

        resolve(rendered, pumped)
    });

    match &result {
        Ok(transcript) => tracing::debug!(len = transcript.raw.len(), "stream complete"),
        Err(failure) if failure.error.is_canceled() => tracing::debug!("stream canceled"),
        Err(failure) => tracing::warn!(error = %failure.error, "stream failed"),
    }
    result
}

/// Combine the loop's result with the pump's outcome.
fn resolve(
    rendered: Result<Transcript, StreamFailure>,
    pumped: Result<()>,
) -> Result<Transcript, StreamFailure> {
    match (rendered, pumped) {
        (Ok(transcript), Ok(())) => Ok(transcript),
        (Ok(partial), Err(error)) => Err(StreamFailure { error, partial }),
        (Err(mut failure), Err(error)) if failure.error.is_canceled() => {
            failure.error = error;
            Err(failure)
        }
        (Err(failure), _) => Err(failure),
    }
}

impl Client {
    /// Stream a completion and render it as markdown.
    ///
    /// See [`stream_markdown`].
    ///
    /// # Errors
    ///
    /// Returns a [`StreamFailure`] with the content received so far.
    pub fn create_chat_completion_stream_with_markdown<W: Write + ?Sized>(
        &self,
        scope: &CancelToken,
        request: &ChatCompletionRequest,
        sink: &mut W,
        opts: StreamOptions,
    ) -> Result<Transcript, StreamFailure> {
        stream_markdown(self, scope, request, sink, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, StreamError};

    fn transcript(raw: &str) -> Transcript {
        Transcript {
            raw: raw.to_string(),
            rendered: raw.to_string(),
        }
    }

    #[test]
    fn test_both_ok() {
        let result = resolve(Ok(transcript("done")), Ok(()));
        assert_eq!(result.unwrap().raw, "done");
    }

    #[test]
    fn test_pump_error_keeps_rendered_partial() {
        let failure = resolve(Ok(transcript("half")), Err(StreamError::NoChoices)).unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Decode);
        assert_eq!(failure.partial.raw, "half");
    }

    #[test]
    fn test_pump_error_beats_loop_cancel() {
        let canceled = StreamFailure {
            error: StreamError::Canceled,
            partial: transcript("seen"),
        };
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let failure = resolve(Err(canceled), Err(StreamError::Read(io))).unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Transport);
        assert_eq!(failure.partial.raw, "seen");
    }

    #[test]
    fn test_loop_error_beats_pump_error() {
        let render = StreamFailure::from(StreamError::Render("bad".into()));
        let failure = resolve(Err(render), Err(StreamError::Canceled)).unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Render);
    }

    #[test]
    fn test_deadline_is_not_overridden() {
        let deadline = StreamFailure::from(StreamError::DeadlineExceeded);
        let failure = resolve(Err(deadline), Err(StreamError::Canceled)).unwrap_err();
        assert!(matches!(failure.error, StreamError::DeadlineExceeded));
    }
}
