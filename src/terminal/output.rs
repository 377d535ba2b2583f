//! `OutputBuffer`: Single-syscall output buffer for ANSI sequences.

use std::io::Write;

/// Pre-allocated buffer for building ANSI escape sequences.
///
/// All output for a frame is accumulated here, then flushed in a single
/// `write()` syscall to prevent terminal flickering.
pub struct OutputBuffer {
    data: Vec<u8>,
}

impl OutputBuffer {
    /// Create a new output buffer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Create a buffer sized for a typical frame (4KB).
    pub fn new() -> Self {
        Self::with_capacity(4096)
    }

    /// Clear the buffer for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Get the buffer contents.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get the buffer length.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if buffer is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write a string.
    #[inline]
    pub fn write_str(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
    }

    /// Carriage return plus line feed; raw mode does not translate `\n`.
    #[inline]
    pub fn newline(&mut self) {
        self.data.extend_from_slice(b"\r\n");
    }

    /// Move the cursor to column 0.
    #[inline]
    pub fn carriage_return(&mut self) {
        self.data.push(b'\r');
    }

    /// Move the cursor up `n` rows. No-op for zero.
    #[inline]
    pub fn cursor_up(&mut self, n: usize) {
        if n > 0 {
            // Writing to a Vec cannot fail
            let _ = write!(self.data, "\x1b[{n}A");
        }
    }

    /// Hide cursor.
    #[inline]
    pub fn cursor_hide(&mut self) {
        self.data.extend_from_slice(b"\x1b[?25l");
    }

    /// Show cursor.
    #[inline]
    pub fn cursor_show(&mut self) {
        self.data.extend_from_slice(b"\x1b[?25h");
    }

    /// Reset all attributes.
    #[inline]
    pub fn reset_attrs(&mut self) {
        self.data.extend_from_slice(b"\x1b[0m");
    }

    /// Erase the whole current line.
    #[inline]
    pub fn clear_line(&mut self) {
        self.data.extend_from_slice(b"\x1b[2K");
    }

    /// Erase from the cursor to the end of the line.
    #[inline]
    pub fn clear_to_line_end(&mut self) {
        self.data.extend_from_slice(b"\x1b[K");
    }

    /// Erase from the cursor to the end of the screen.
    #[inline]
    pub fn clear_below(&mut self) {
        self.data.extend_from_slice(b"\x1b[J");
    }

    /// Flush to a writer in a single syscall.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    pub fn flush_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.data)?;
        writer.flush()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequences() {
        let mut out = OutputBuffer::new();
        out.cursor_up(0);
        assert!(out.is_empty());

        out.cursor_up(3);
        out.carriage_return();
        out.clear_line();
        out.clear_to_line_end();
        out.clear_below();
        assert_eq!(out.as_bytes(), b"\x1b[3A\r\x1b[2K\x1b[K\x1b[J");

        out.clear();
        out.write_str("x");
        out.newline();
        let mut sink = Vec::new();
        out.flush_to(&mut sink).unwrap();
        assert_eq!(sink, b"x\r\n");
    }
}
