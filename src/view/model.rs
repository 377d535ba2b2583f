//! Render Model: State and transition function of the render loop.
//!
//! The model owns everything the loop shows. [`RenderModel::update`] is
//! the single dispatcher over [`Event`]; it never blocks and never does
//! I/O, so it is driven directly in tests.

use crate::actor::{Event, KeyCode, KeyModifiers};
use crate::cancel::CancelToken;
use crate::error::{StreamError, Transcript};
use crate::markdown::MarkdownRenderer;
use crate::terminal::ansi;
use crate::widget::{Loader, LoaderConfig, Viewport};
use std::time::Instant;

/// Callback invoked when the user interrupts the stream.
pub type InterruptFn = Box<dyn FnOnce() + Send>;

/// What the loop should do after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Keep running.
    Continue,
    /// Stop the loop.
    Quit,
}

/// Loop phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No content yet; the loader is shown.
    Loading,
    /// Content has arrived.
    Streaming,
}

/// State of one streaming view.
pub struct RenderModel {
    renderer: Box<dyn MarkdownRenderer>,
    /// Raw markdown received so far.
    content: String,
    /// Last successful render, trimmed and newline-terminated.
    rendered: String,
    window_width: u16,
    window_height: u16,
    viewport: Viewport,
    loader: Loader,
    phase: Phase,
    /// Set once the warmup elapsed and fragments may be fetched.
    fetching: bool,
    /// Scope of this loop; canceled on interrupt.
    scope: CancelToken,
    on_interrupt: Option<InterruptFn>,
    error: Option<StreamError>,
}

impl RenderModel {
    /// Create a model in the loading phase.
    pub fn new(
        renderer: Box<dyn MarkdownRenderer>,
        scope: CancelToken,
        on_interrupt: Option<InterruptFn>,
        loader: LoaderConfig,
        now: Instant,
    ) -> Self {
        let mut viewport = Viewport::new(0, 0);
        viewport.goto_bottom();
        Self {
            renderer,
            content: String::new(),
            rendered: String::new(),
            window_width: 0,
            window_height: 0,
            viewport,
            loader: Loader::with_config(loader, now),
            phase: Phase::Loading,
            fetching: false,
            scope,
            on_interrupt,
            error: None,
        }
    }

    /// Apply one event.
    pub fn update(&mut self, event: Event) -> Control {
        if event.is_interrupt() {
            return self.interrupt();
        }

        match event {
            Event::Fragment(text) => {
                if let Err(e) = self.append(&text) {
                    tracing::warn!(error = %e, "render failed");
                    self.error = Some(e);
                    return Control::Quit;
                }
                Control::Continue
            }
            Event::StreamEnd(error) => {
                if let Some(e) = error {
                    self.error = Some(e);
                }
                self.loader.request_stop();
                Control::Quit
            }
            Event::Warmup => {
                self.fetching = true;
                Control::Continue
            }
            Event::LoaderTick(at) => {
                if self.loader.is_active() {
                    self.loader.update(at);
                }
                Control::Continue
            }
            Event::EllipsisTick => {
                self.loader.advance_ellipsis();
                Control::Continue
            }
            Event::Resize { width, height } => {
                self.window_width = width;
                self.window_height = height;
                self.viewport
                    .set_size(usize::from(width), self.viewport.height());
                self.resize_viewport();
                self.viewport.set_content(&self.rendered);
                Control::Continue
            }
            Event::Key { code, modifiers } => {
                self.scroll(code, modifiers);
                Control::Continue
            }
        }
    }

    fn interrupt(&mut self) -> Control {
        tracing::info!("interrupted");
        self.scope.cancel();
        if let Some(callback) = self.on_interrupt.take() {
            callback();
        }
        self.error = Some(StreamError::Canceled);
        Control::Quit
    }

    fn append(&mut self, text: &str) -> crate::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if self.phase == Phase::Loading {
            tracing::debug!("first content, stopping loader");
            self.phase = Phase::Streaming;
        }
        if self.loader.is_active() {
            self.loader.request_stop();
        }

        self.content.push_str(text);
        let rendered = self.renderer.render(&self.content)?;

        self.rendered = format!("{}\n", rendered.trim_end());
        self.resize_viewport();
        self.viewport.set_content(&self.rendered);
        self.viewport.goto_bottom();
        Ok(())
    }

    /// Fit the viewport to the window, or to the content when shorter.
    fn resize_viewport(&mut self) {
        let content_height = self.content_line_count();

        let mut height = if self.window_height == 0 {
            self.viewport.height()
        } else {
            usize::from(self.window_height)
        };
        if content_height > 0 && (height == 0 || content_height < height) {
            height = content_height;
        }

        self.viewport.set_size(self.viewport.width(), height.max(1));
    }

    fn content_line_count(&self) -> usize {
        self.rendered.matches('\n').count()
    }

    fn scroll(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if modifiers.control || modifiers.alt {
            return;
        }
        let vp = &mut self.viewport;
        match code {
            KeyCode::Up | KeyCode::Char('k') => vp.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => vp.scroll_down(1),
            KeyCode::PageUp | KeyCode::Char('b') => vp.page_up(),
            KeyCode::PageDown | KeyCode::Char('f' | ' ') => vp.page_down(),
            KeyCode::Char('u') => vp.half_page_up(),
            KeyCode::Char('d') => vp.half_page_down(),
            KeyCode::Home | KeyCode::Char('g') => vp.goto_top(),
            KeyCode::End | KeyCode::Char('G') => vp.goto_bottom(),
            _ => {}
        }
    }

    /// Current frame: the loader while it is active, else the viewport.
    ///
    /// The loader line is cut to the window width so it never wraps.
    pub fn view(&mut self) -> String {
        if self.loader.is_active() {
            let line = self.loader.view();
            if self.window_width == 0 {
                return line;
            }
            ansi::truncate(&line, usize::from(self.window_width))
        } else {
            self.viewport.view()
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the warmup has elapsed.
    pub(crate) const fn is_fetching(&self) -> bool {
        self.fetching
    }

    /// Whether the loader is still shown.
    pub const fn loader_active(&self) -> bool {
        self.loader.is_active()
    }

    /// Raw markdown received so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Last rendered output.
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// The viewport.
    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Error recorded by the loop, if any.
    pub const fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    /// Tear down into the recorded error and what was produced.
    pub fn finish(self) -> (Option<StreamError>, Transcript) {
        (
            self.error,
            Transcript {
                raw: self.content,
                rendered: self.rendered,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    type Stub = fn(&str) -> Result<String>;

    fn echo(s: &str) -> Result<String> {
        Ok(format!("{s}\n\n"))
    }

    fn model(renderer: Stub) -> (RenderModel, Instant) {
        let now = Instant::now();
        let m = RenderModel::new(
            Box::new(renderer),
            CancelToken::new(),
            None,
            LoaderConfig::default(),
            now,
        );
        (m, now)
    }

    fn fragment(text: &str) -> Event {
        Event::Fragment(text.to_string())
    }

    #[test]
    fn test_hi_there() {
        let (mut m, _) = model(echo);
        assert_eq!(m.phase(), Phase::Loading);
        assert_eq!(m.update(Event::Warmup), Control::Continue);
        assert!(m.is_fetching());

        m.update(fragment("Hi"));
        assert_eq!(m.phase(), Phase::Streaming);
        m.update(fragment(" there"));
        assert_eq!(m.update(Event::StreamEnd(None)), Control::Quit);

        let (error, transcript) = m.finish();
        assert!(error.is_none());
        assert_eq!(transcript.raw, "Hi there");
        assert_eq!(transcript.rendered, "Hi there\n");
    }

    #[test]
    fn test_empty_fragment_keeps_loading() {
        let (mut m, _) = model(echo);
        m.update(fragment(""));
        assert_eq!(m.phase(), Phase::Loading);
        assert!(m.rendered().is_empty());
    }

    #[test]
    fn test_loader_stays_for_min_visibility() {
        let (mut m, t0) = model(echo);
        m.update(fragment("text"));
        assert!(m.loader_active());
        assert!(!m.view().contains("text"));

        m.update(Event::LoaderTick(t0 + Duration::from_millis(100)));
        assert!(m.loader_active());

        m.update(Event::LoaderTick(t0 + Duration::from_millis(400)));
        assert!(!m.loader_active());
        assert_eq!(m.view(), "text");
    }

    #[test]
    fn test_viewport_height_follows_content_then_window() {
        let (mut m, _) = model(echo);
        m.update(Event::Resize { width: 80, height: 3 });

        m.update(fragment("a"));
        assert_eq!(m.viewport().height(), 1);

        m.update(fragment("\nb\nc\nd\ne"));
        assert_eq!(m.viewport().line_count(), 5);
        assert_eq!(m.viewport().height(), 3);
        assert!(m.viewport().at_bottom());
    }

    #[test]
    fn test_resize_keeps_content() {
        let (mut m, _) = model(echo);
        m.update(fragment("one\ntwo"));
        let before = m.rendered().to_string();

        m.update(Event::Resize { width: 2, height: 10 });
        assert_eq!(m.rendered(), before);
        assert_eq!(m.viewport().width(), 2);
        assert_eq!(m.viewport().height(), 2);
    }

    #[test]
    fn test_scroll_keys() {
        let (mut m, _) = model(echo);
        m.update(Event::Resize { width: 80, height: 2 });
        m.update(fragment("1\n2\n3\n4\n5\n6"));
        assert_eq!(m.viewport().y_offset(), 4);

        let key = |c| Event::Key {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::NONE,
        };
        m.update(key('g'));
        assert_eq!(m.viewport().y_offset(), 0);
        m.update(key('j'));
        assert_eq!(m.viewport().y_offset(), 1);
        m.update(key('G'));
        assert_eq!(m.viewport().y_offset(), 4);
        m.update(key('k'));
        assert_eq!(m.viewport().y_offset(), 3);
    }

    #[test]
    fn test_render_error_quits() {
        fn failing(_: &str) -> Result<String> {
            Err(StreamError::Render("boom".into()))
        }
        let (mut m, _) = model(failing);
        assert_eq!(m.update(fragment("x")), Control::Quit);

        let (error, transcript) = m.finish();
        assert!(matches!(error, Some(StreamError::Render(_))));
        assert_eq!(transcript.raw, "x");
        assert!(transcript.rendered.is_empty());
    }

    #[test]
    fn test_stream_end_records_error() {
        let (mut m, _) = model(echo);
        m.update(fragment("partial"));
        m.update(Event::StreamEnd(Some(StreamError::NoChoices)));
        assert!(matches!(m.error(), Some(StreamError::NoChoices)));
    }

    #[test]
    fn test_interrupt_cancels_scope_and_calls_back_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let scope = CancelToken::new();
        let now = Instant::now();
        let mut m = RenderModel::new(
            Box::new(echo as Stub),
            scope.clone(),
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            LoaderConfig::default(),
            now,
        );

        let ctrl_c = || Event::Key {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
        };
        assert_eq!(m.update(ctrl_c()), Control::Quit);
        m.update(ctrl_c());

        assert!(scope.is_canceled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(m.error().is_some_and(StreamError::is_canceled));
    }

    #[test]
    fn test_loader_is_cut_to_narrow_window() {
        let (mut m, _) = model(echo);
        assert!(ansi::display_width(&m.view()) > 10);

        m.update(Event::Resize { width: 10, height: 5 });
        let line = m.view();
        assert!(m.loader_active());
        assert_eq!(ansi::display_width(&line), 10);
        assert!(!line.contains('\n'));
    }
}
