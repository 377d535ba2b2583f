//! Render Loop: Single-threaded event loop for the interactive view.
//!
//! The loop blocks on one multi-channel `select!` and feeds whatever is
//! ready through [`RenderModel::update`], redrawing the inline frame
//! after every event.

use super::model::{Control, RenderModel};
use crate::actor::{Event, InputActor, InputEvent, TickerActor};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::source::Fragment;
use crate::terminal::InlineFrame;
use crate::widget::LoaderConfig;
use crossbeam_channel::{after, never, select, unbounded, Receiver};
use crossterm::terminal;
use std::io::Write;
use std::time::Duration;

/// How long the input thread waits per poll before checking for shutdown.
const INPUT_POLL: Duration = Duration::from_millis(50);

/// Raw mode for the lifetime of the guard.
struct RawMode;

impl RawMode {
    fn enable() -> Option<Self> {
        match terminal::enable_raw_mode() {
            Ok(()) => Some(Self),
            Err(e) => {
                tracing::warn!(error = %e, "raw mode unavailable");
                None
            }
        }
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Run the loop against the real terminal.
pub(crate) fn run_interactive<U: Write + ?Sized>(
    model: &mut RenderModel,
    fragments: &Receiver<Fragment>,
    scope: &CancelToken,
    ui: &mut U,
    config: &LoaderConfig,
) -> Result<()> {
    let raw_mode = RawMode::enable();
    let (input_tx, input_rx) = unbounded();
    let input = InputActor::spawn(input_tx, INPUT_POLL);

    if let Ok((width, height)) = terminal::size() {
        model.update(Event::Resize { width, height });
    }

    let result = run_loop(model, fragments, scope, &input_rx, ui, config);

    input.join();
    drop(raw_mode);
    result
}

/// The event loop proper, with input supplied by the caller.
///
/// Returns when the model asks to quit. On a clean exit the frame is
/// erased; otherwise it is left on screen.
pub(crate) fn run_loop<U: Write + ?Sized>(
    model: &mut RenderModel,
    fragments: &Receiver<Fragment>,
    scope: &CancelToken,
    input: &Receiver<InputEvent>,
    ui: &mut U,
    config: &LoaderConfig,
) -> Result<()> {
    let mut frame = InlineFrame::new();
    frame.hide_cursor(ui)?;

    let result = drive(model, fragments, scope, input, ui, config, &mut frame);

    let teardown = if result.is_ok() && model.error().is_none() {
        frame.clear(ui)
    } else {
        frame.release(ui)
    };
    let shown = frame.show_cursor(ui);

    result?;
    teardown?;
    shown?;
    Ok(())
}

fn drive<U: Write + ?Sized>(
    model: &mut RenderModel,
    fragments: &Receiver<Fragment>,
    scope: &CancelToken,
    input: &Receiver<InputEvent>,
    ui: &mut U,
    config: &LoaderConfig,
    frame: &mut InlineFrame,
) -> Result<()> {
    let mut step = Some(TickerActor::spawn("loader", config.step_interval));
    let mut ellipsis = Some(TickerActor::spawn("ellipsis", config.ellipsis_interval));
    let warmup = after(config.warmup);
    let mut input = input.clone();

    frame.draw(ui, &model.view())?;

    loop {
        let fetch = if model.is_fetching() {
            fragments.clone()
        } else {
            never()
        };
        let step_rx = step
            .as_ref()
            .map_or_else(never, |t| t.receiver().clone());
        let ellipsis_rx = ellipsis
            .as_ref()
            .map_or_else(never, |t| t.receiver().clone());
        let mut input_closed = false;

        let event = select! {
            recv(warmup) -> _ => Some(Event::Warmup),
            recv(fetch) -> fragment => Some(match fragment {
                Ok(fragment) => Event::Fragment(fragment.text),
                // The pump drops its sender when it stops on cancellation
                Err(_) if scope.is_canceled() => Event::StreamEnd(Some(scope.error())),
                Err(_) => Event::StreamEnd(None),
            }),
            recv(scope.done()) -> _ => Some(Event::StreamEnd(Some(scope.error()))),
            recv(input) -> event => match event {
                Ok(event) => {
                    if let InputEvent::Error(e) = &event {
                        tracing::debug!(error = %e, "input error");
                    }
                    event.into()
                }
                Err(_) => {
                    input_closed = true;
                    None
                }
            },
            recv(step_rx) -> tick => tick.ok().map(|t| Event::LoaderTick(t.at)),
            recv(ellipsis_rx) -> _ => Some(Event::EllipsisTick),
        };

        if input_closed {
            input = never();
        }
        let Some(event) = event else {
            continue;
        };

        let control = model.update(event);
        if !model.loader_active() && step.is_some() {
            step = None;
            ellipsis = None;
        }
        if control == Control::Quit {
            return Ok(());
        }
        frame.draw(ui, &model.view())?;
    }
}
