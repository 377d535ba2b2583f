//! Viewport: Scrollable window over rendered lines.
//!
//! Holds styled content split into lines and shows `height` of them
//! starting at a vertical offset. Lines wider than the viewport are cut,
//! escape sequences intact.

use crate::terminal::ansi;

/// A scrollable window of text lines.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    lines: Vec<String>,
    width: usize,
    height: usize,
    y_offset: usize,
}

impl Viewport {
    /// Create an empty viewport of the given size.
    pub const fn new(width: usize, height: usize) -> Self {
        Self {
            lines: Vec::new(),
            width,
            height,
            y_offset: 0,
        }
    }

    /// Replace the content.
    ///
    /// A single trailing newline terminates the last line rather than
    /// starting an empty one. The offset is clamped to the new content.
    pub fn set_content(&mut self, content: &str) {
        let content = content.strip_suffix('\n').unwrap_or(content);
        self.lines = if content.is_empty() {
            Vec::new()
        } else {
            content.split('\n').map(str::to_string).collect()
        };
        if self.y_offset > self.max_offset() {
            self.goto_bottom();
        }
    }

    /// Resize the window; content is untouched.
    pub fn set_size(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.y_offset = self.y_offset.min(self.max_offset());
    }

    /// Viewport width in columns. Zero disables truncation.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Viewport height in lines.
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Index of the first visible line.
    pub const fn y_offset(&self) -> usize {
        self.y_offset
    }

    /// Number of content lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.height)
    }

    /// Whether the last line is visible.
    pub fn at_bottom(&self) -> bool {
        self.y_offset >= self.max_offset()
    }

    /// Whether the first line is visible.
    pub const fn at_top(&self) -> bool {
        self.y_offset == 0
    }

    /// Scroll so the last line is at the bottom edge.
    pub fn goto_bottom(&mut self) {
        self.y_offset = self.max_offset();
    }

    /// Scroll to the first line.
    pub fn goto_top(&mut self) {
        self.y_offset = 0;
    }

    /// Scroll up by `n` lines.
    pub fn scroll_up(&mut self, n: usize) {
        self.y_offset = self.y_offset.saturating_sub(n);
    }

    /// Scroll down by `n` lines.
    pub fn scroll_down(&mut self, n: usize) {
        self.y_offset = (self.y_offset + n).min(self.max_offset());
    }

    /// Scroll up one page.
    pub fn page_up(&mut self) {
        self.scroll_up(self.height.max(1));
    }

    /// Scroll down one page.
    pub fn page_down(&mut self) {
        self.scroll_down(self.height.max(1));
    }

    /// Scroll up half a page.
    pub fn half_page_up(&mut self) {
        self.scroll_up((self.height / 2).max(1));
    }

    /// Scroll down half a page.
    pub fn half_page_down(&mut self) {
        self.scroll_down((self.height / 2).max(1));
    }

    /// Render the visible window: exactly `height` lines joined by `\n`.
    pub fn view(&self) -> String {
        let visible = self
            .lines
            .iter()
            .skip(self.y_offset)
            .take(self.height)
            .map(|line| {
                if self.width == 0 {
                    line.clone()
                } else {
                    ansi::truncate(line, self.width)
                }
            });

        let mut rows: Vec<String> = visible.collect();
        rows.resize(self.height, String::new());
        rows.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn test_trailing_newline_does_not_add_line() {
        let mut vp = Viewport::new(80, 10);
        vp.set_content("a\nb\n");
        assert_eq!(vp.line_count(), 2);
        vp.set_content("");
        assert_eq!(vp.line_count(), 0);
    }

    #[test]
    fn test_goto_bottom_shows_tail() {
        let mut vp = Viewport::new(80, 3);
        vp.set_content(&numbered(10));
        vp.goto_bottom();
        assert_eq!(vp.y_offset(), 7);
        assert!(vp.at_bottom());
        assert_eq!(vp.view(), "line 8\nline 9\nline 10");
    }

    #[test]
    fn test_scrolling_is_clamped() {
        let mut vp = Viewport::new(80, 4);
        vp.set_content(&numbered(10));

        vp.scroll_up(3);
        assert!(vp.at_top());

        vp.page_down();
        assert_eq!(vp.y_offset(), 4);
        vp.half_page_down();
        assert_eq!(vp.y_offset(), 6);
        vp.scroll_down(100);
        assert_eq!(vp.y_offset(), 6);

        vp.half_page_up();
        assert_eq!(vp.y_offset(), 4);
        vp.page_up();
        vp.page_up();
        assert_eq!(vp.y_offset(), 0);

        vp.goto_bottom();
        vp.goto_top();
        assert!(vp.at_top());
    }

    #[test]
    fn test_view_pads_to_height() {
        let mut vp = Viewport::new(80, 3);
        vp.set_content("only\n");
        assert_eq!(vp.view(), "only\n\n");
    }

    #[test]
    fn test_view_truncates_to_width() {
        let mut vp = Viewport::new(4, 1);
        vp.set_content("\x1b[1mheading\x1b[0m\n");
        assert_eq!(ansi::strip(&vp.view()), "head");
    }

    #[test]
    fn test_shrinking_content_clamps_offset() {
        let mut vp = Viewport::new(80, 2);
        vp.set_content(&numbered(10));
        vp.goto_bottom();
        vp.set_content(&numbered(3));
        assert_eq!(vp.y_offset(), 1);
        assert_eq!(vp.view(), "line 2\nline 3");
    }

    #[test]
    fn test_resize_keeps_content() {
        let mut vp = Viewport::new(80, 2);
        vp.set_content(&numbered(5));
        vp.goto_bottom();
        vp.set_size(40, 5);
        assert_eq!(vp.line_count(), 5);
        assert_eq!(vp.y_offset(), 0);
    }
}
