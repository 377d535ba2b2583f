//! Inline Frame: Redraws a block of lines in place below the cursor.
//!
//! Unlike a full-screen compositor the frame never touches the alternate
//! screen. Each draw moves the cursor back to the first row of the
//! previous frame, rewrites every row and erases whatever is left below,
//! so the scrollback above stays untouched.

use super::output::OutputBuffer;
use std::io::{self, Write};

/// A redrawable inline region.
pub struct InlineFrame {
    out: OutputBuffer,
    /// Rows occupied by the last draw; zero before the first one.
    lines: usize,
    /// The last view drawn.
    last_view: String,
}

impl InlineFrame {
    /// Create a frame that has not drawn anything yet.
    pub fn new() -> Self {
        Self {
            out: OutputBuffer::new(),
            lines: 0,
            last_view: String::new(),
        }
    }

    /// Rows currently occupied.
    pub const fn lines(&self) -> usize {
        self.lines
    }

    /// The last view drawn.
    pub fn last_view(&self) -> &str {
        &self.last_view
    }

    /// Replace the previous frame with `view`.
    ///
    /// `view` rows are separated by `\n`. Identical consecutive views are
    /// skipped.
    pub fn draw<W: Write + ?Sized>(&mut self, writer: &mut W, view: &str) -> io::Result<()> {
        if self.lines > 0 && view == self.last_view {
            return Ok(());
        }

        self.out.clear();
        self.out.cursor_up(self.lines.saturating_sub(1));
        self.out.carriage_return();

        let mut rows = 0;
        for (i, row) in view.split('\n').enumerate() {
            if i > 0 {
                self.out.newline();
            }
            self.out.write_str(row);
            self.out.reset_attrs();
            self.out.clear_to_line_end();
            rows += 1;
        }
        self.out.clear_below();
        self.out.flush_to(writer)?;

        self.lines = rows;
        self.last_view.clear();
        self.last_view.push_str(view);
        Ok(())
    }

    /// Hide the terminal cursor while frames are drawn.
    pub fn hide_cursor<W: Write + ?Sized>(&mut self, writer: &mut W) -> io::Result<()> {
        self.out.clear();
        self.out.cursor_hide();
        self.out.flush_to(writer)
    }

    /// Show the terminal cursor again.
    pub fn show_cursor<W: Write + ?Sized>(&mut self, writer: &mut W) -> io::Result<()> {
        self.out.clear();
        self.out.cursor_show();
        self.out.flush_to(writer)
    }

    /// Keep the frame on screen and move below it.
    ///
    /// Later draws start a new frame instead of replacing this one.
    pub fn release<W: Write + ?Sized>(&mut self, writer: &mut W) -> io::Result<()> {
        if self.lines == 0 {
            return Ok(());
        }
        self.out.clear();
        self.out.newline();
        self.out.flush_to(writer)?;
        self.lines = 0;
        self.last_view.clear();
        Ok(())
    }

    /// Erase the frame, leaving the cursor at the start of its first row.
    pub fn clear<W: Write + ?Sized>(&mut self, writer: &mut W) -> io::Result<()> {
        if self.lines == 0 {
            return Ok(());
        }

        self.out.clear();
        for i in 0..self.lines {
            self.out.carriage_return();
            self.out.clear_line();
            if i + 1 < self.lines {
                self.out.cursor_up(1);
            }
        }
        self.out.flush_to(writer)?;

        self.lines = 0;
        self.last_view.clear();
        Ok(())
    }
}

impl Default for InlineFrame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(bytes: &[u8]) -> vt100::Parser {
        let mut parser = vt100::Parser::new(10, 40, 0);
        parser.process(bytes);
        parser
    }

    #[test]
    fn test_redraw_replaces_previous_frame() {
        let mut frame = InlineFrame::new();
        let mut out = b"$ prompt\r\n".to_vec();

        frame.draw(&mut out, "loading ...").unwrap();
        frame.draw(&mut out, "first\nsecond\nthird").unwrap();
        frame.draw(&mut out, "short\nrows").unwrap();
        assert_eq!(frame.lines(), 2);

        let parser = screen(&out);
        assert_eq!(parser.screen().contents(), "$ prompt\nshort\nrows");
    }

    #[test]
    fn test_clear_erases_every_row() {
        let mut frame = InlineFrame::new();
        let mut out = b"$ prompt\r\n".to_vec();

        frame.draw(&mut out, "one\ntwo\nthree").unwrap();
        frame.clear(&mut out).unwrap();
        assert_eq!(frame.lines(), 0);

        let parser = screen(&out);
        assert_eq!(parser.screen().contents(), "$ prompt");
        assert_eq!(parser.screen().cursor_position(), (1, 0));
    }

    #[test]
    fn test_identical_view_is_skipped() {
        let mut frame = InlineFrame::new();
        let mut out = Vec::new();
        frame.draw(&mut out, "same").unwrap();
        let len = out.len();
        frame.draw(&mut out, "same").unwrap();
        assert_eq!(out.len(), len);
        assert_eq!(frame.last_view(), "same");
    }

    #[test]
    fn test_release_keeps_frame() {
        let mut frame = InlineFrame::new();
        let mut out = Vec::new();
        frame.draw(&mut out, "kept").unwrap();
        frame.release(&mut out).unwrap();
        frame.draw(&mut out, "next").unwrap();

        let parser = screen(&out);
        assert_eq!(parser.screen().contents(), "kept\nnext");
    }

    #[test]
    fn test_clear_without_draw_writes_nothing() {
        let mut frame = InlineFrame::new();
        let mut out = Vec::new();
        frame.clear(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
