//! View: Turns a fragment channel into terminal output.
//!
//! [`render_stream`] picks one of three paths from [`StreamOptions`]:
//!
//! - **Raw**: each fragment goes straight to the sink, unstyled.
//! - **Interactive**: a loader, then a live markdown viewport drawn inline
//!   on the UI target; the final render lands in the sink once.
//! - **Render once**: no UI; the markdown is rendered when the stream ends.

mod model;
mod run;

pub use model::{Control, InterruptFn, Phase, RenderModel};

use crate::cancel::CancelToken;
use crate::error::{Result, StreamError, StreamFailure, Transcript};
use crate::markdown::{MarkdownRenderer, TermRenderer};
use crate::source::Fragment;
use crate::widget::LoaderConfig;
use crossbeam_channel::{select, Receiver};
use std::io::{self, IsTerminal, Write};
use std::time::Instant;

/// Where interactive frames are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiTarget {
    /// Stdout, if it is a terminal; otherwise no UI.
    #[default]
    Auto,
    /// Always draw on stdout.
    Stdout,
    /// Always draw on stderr.
    Stderr,
    /// Never draw.
    Disabled,
}

impl UiTarget {
    fn writer(self) -> Option<Box<dyn Write>> {
        match self {
            Self::Auto if io::stdout().is_terminal() => Some(Box::new(io::stdout())),
            Self::Auto | Self::Disabled => None,
            Self::Stdout => Some(Box::new(io::stdout())),
            Self::Stderr => Some(Box::new(io::stderr())),
        }
    }
}

/// Options for one streamed render.
pub struct StreamOptions {
    /// Write fragments verbatim: no loader, no styling.
    pub raw: bool,
    /// Wrap width for the built-in renderer. Zero means 120.
    pub word_wrap: usize,
    /// Called at most once when the user interrupts.
    pub on_interrupt: Option<InterruptFn>,
    /// Where interactive frames go.
    pub ui: UiTarget,
    /// Loader timing.
    pub loader: LoaderConfig,
    /// Replaces the built-in [`TermRenderer`].
    pub renderer: Option<Box<dyn MarkdownRenderer + Send>>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            raw: false,
            word_wrap: 0,
            on_interrupt: None,
            ui: UiTarget::Auto,
            loader: LoaderConfig::default(),
            renderer: None,
        }
    }
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("raw", &self.raw)
            .field("word_wrap", &self.word_wrap)
            .field("on_interrupt", &self.on_interrupt.is_some())
            .field("ui", &self.ui)
            .field("loader", &self.loader)
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

/// Consume `fragments` until they end or `scope` is canceled.
///
/// # Errors
///
/// Returns a [`StreamFailure`] carrying whatever was received when the
/// scope is canceled, the user interrupts, rendering fails or the sink
/// cannot be written.
pub fn render_stream<W: Write + ?Sized>(
    scope: &CancelToken,
    fragments: &Receiver<Fragment>,
    sink: &mut W,
    opts: StreamOptions,
) -> Result<Transcript, StreamFailure> {
    let loop_scope = scope.child();

    if opts.raw {
        tracing::debug!("rendering raw");
        return render_raw(&loop_scope, fragments, sink);
    }

    let renderer: Box<dyn MarkdownRenderer + Send> = match opts.renderer {
        Some(renderer) => renderer,
        None => Box::new(TermRenderer::new(opts.word_wrap)),
    };

    match opts.ui.writer() {
        Some(mut ui) => {
            tracing::debug!(ui = ?opts.ui, "rendering interactively");
            let mut model = RenderModel::new(
                renderer,
                loop_scope.clone(),
                opts.on_interrupt,
                opts.loader.clone(),
                Instant::now(),
            );
            let looped =
                run::run_interactive(&mut model, fragments, &loop_scope, &mut ui, &opts.loader);
            finish_live(model, looped, sink)
        }
        None => {
            tracing::debug!("rendering once at end of stream");
            let mut raw = String::new();
            if let Err(error) = forward(&loop_scope, fragments, &mut raw, |_| Ok(())) {
                return Err(failure(error, raw, String::new()));
            }
            if raw.is_empty() {
                return Ok(Transcript::default());
            }
            match renderer.render(&raw) {
                Ok(rendered) => {
                    let rendered = format!("{}\n", rendered.trim_end());
                    write_final(sink, Transcript { raw, rendered })
                }
                Err(error) => Err(failure(error, raw, String::new())),
            }
        }
    }
}

/// Settle an interactive run: any error keeps the partial transcript and
/// leaves the sink untouched.
fn finish_live<W: Write + ?Sized>(
    model: RenderModel,
    looped: Result<()>,
    sink: &mut W,
) -> Result<Transcript, StreamFailure> {
    let (error, transcript) = model.finish();
    if let Some(error) = looped.err().or(error) {
        return Err(StreamFailure {
            error,
            partial: transcript,
        });
    }
    write_final(sink, transcript)
}

fn render_raw<W: Write + ?Sized>(
    scope: &CancelToken,
    fragments: &Receiver<Fragment>,
    sink: &mut W,
) -> Result<Transcript, StreamFailure> {
    let mut raw = String::new();
    let result = forward(scope, fragments, &mut raw, |text| {
        sink.write_all(text.as_bytes())?;
        sink.flush()?;
        Ok(())
    });
    match result {
        Ok(()) => Ok(Transcript { rendered: raw.clone(), raw }),
        Err(error) => Err(failure(error, raw.clone(), raw)),
    }
}

/// Receive non-empty fragments in order, appending each to `raw`.
fn forward<F>(
    scope: &CancelToken,
    fragments: &Receiver<Fragment>,
    raw: &mut String,
    mut each: F,
) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    loop {
        select! {
            recv(fragments) -> fragment => match fragment {
                Ok(fragment) => {
                    if !fragment.is_empty() {
                        tracing::trace!(len = fragment.text.len(), "fragment");
                        raw.push_str(&fragment.text);
                        each(&fragment.text)?;
                    }
                }
                Err(_) if scope.is_canceled() => return Err(scope.error()),
                Err(_) => return Ok(()),
            },
            recv(scope.done()) -> _ => return Err(scope.error()),
        }
    }
}

fn write_final<W: Write + ?Sized>(
    sink: &mut W,
    transcript: Transcript,
) -> Result<Transcript, StreamFailure> {
    if transcript.rendered.is_empty() {
        return Ok(transcript);
    }
    let written = sink
        .write_all(transcript.rendered.as_bytes())
        .and_then(|()| sink.flush());
    match written {
        Ok(()) => Ok(transcript),
        Err(e) => Err(StreamFailure {
            error: StreamError::Io(e),
            partial: transcript,
        }),
    }
}

const fn failure(error: StreamError, raw: String, rendered: String) -> StreamFailure {
    StreamFailure {
        error,
        partial: Transcript { raw, rendered },
    }
}
