//! Terminal primitives: output buffering, inline redraw and ANSI helpers.

pub mod ansi;
mod frame;
mod output;

pub use frame::InlineFrame;
pub use output::OutputBuffer;
