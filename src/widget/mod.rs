//! Widgets: The two pieces of state the render loop draws.
//!
//! - [`Loader`]: the waiting animation shown before the first fragment.
//! - [`Viewport`]: a scrollable window over the rendered markdown.
//!
//! Both are plain state machines. They produce strings; the terminal
//! layer decides how those reach the screen.

mod loader;
mod viewport;

pub use loader::{Loader, LoaderChar, LoaderConfig, LoaderPhase, FILLER, GLYPHS};
pub use viewport::Viewport;
