//! Word wrapping for styled spans with hanging indents.
//!
//! Text spans wrap at word boundaries and collapse runs of whitespace.
//! Verbatim spans (inline code) keep their spaces and only break when a
//! span is wider than a whole line.

use crossterm::style::{ContentStyle, StyledContent};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// The text. May contain `\n` for hard breaks.
    pub text: String,
    /// Terminal style applied to the text.
    pub style: ContentStyle,
    /// Keep whitespace as-is and avoid breaking inside.
    pub verbatim: bool,
}

impl Span {
    /// A wrappable text span.
    pub fn text(text: impl Into<String>, style: ContentStyle) -> Self {
        Self {
            text: text.into(),
            style,
            verbatim: false,
        }
    }

    /// A span that keeps its whitespace.
    pub fn verbatim(text: impl Into<String>, style: ContentStyle) -> Self {
        Self {
            text: text.into(),
            style,
            verbatim: true,
        }
    }

    /// Render to a string with escape sequences.
    pub fn styled(&self) -> String {
        StyledContent::new(self.style, self.text.as_str()).to_string()
    }
}

/// Options for wrapping spans into lines.
#[derive(Debug, Clone, Default)]
pub struct WrapOptions {
    /// Maximum display width, prefixes included. Zero disables wrapping.
    pub width: usize,
    /// Prefix of the first line, e.g. a list bullet.
    pub first_prefix: Vec<Span>,
    /// Prefix of continuation lines, e.g. alignment spaces.
    pub rest_prefix: Vec<Span>,
}

impl WrapOptions {
    /// Wrap at `width` without prefixes.
    pub const fn new(width: usize) -> Self {
        Self {
            width,
            first_prefix: Vec::new(),
            rest_prefix: Vec::new(),
        }
    }

    /// Use the same prefix on every line.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Vec<Span>) -> Self {
        self.first_prefix.clone_from(&prefix);
        self.rest_prefix = prefix;
        self
    }
}

/// A word-level unit of layout.
enum Atom<'a> {
    Word(&'a str, ContentStyle),
    Space(ContentStyle),
    Break,
}

fn atoms(spans: &[Span]) -> Vec<Atom<'_>> {
    let mut out = Vec::new();
    for span in spans {
        for (i, part) in span.text.split('\n').enumerate() {
            if i > 0 {
                out.push(Atom::Break);
            }
            if part.is_empty() {
                continue;
            }
            if span.verbatim {
                out.push(Atom::Word(part, span.style));
                continue;
            }
            if part.starts_with(char::is_whitespace) {
                out.push(Atom::Space(span.style));
            }
            let mut words = part.split_whitespace().peekable();
            while let Some(word) = words.next() {
                out.push(Atom::Word(word, span.style));
                if words.peek().is_some() {
                    out.push(Atom::Space(span.style));
                }
            }
            if !part.trim().is_empty() && part.ends_with(char::is_whitespace) {
                out.push(Atom::Space(span.style));
            }
        }
    }
    out
}

struct Lines<'a> {
    opts: &'a WrapOptions,
    lines: Vec<String>,
    current: String,
    width: usize,
    pending_space: Option<ContentStyle>,
}

impl Lines<'_> {
    fn prefix(&self) -> &[Span] {
        if self.lines.is_empty() {
            &self.opts.first_prefix
        } else {
            &self.opts.rest_prefix
        }
    }

    fn available(&self) -> usize {
        if self.opts.width == 0 {
            return usize::MAX;
        }
        let prefix: usize = self.prefix().iter().map(|s| s.text.width()).sum();
        self.opts.width.saturating_sub(prefix).max(1)
    }

    fn flush(&mut self) {
        let mut line: String = self.prefix().iter().map(Span::styled).collect();
        line.push_str(&self.current);
        self.lines.push(line);
        self.current.clear();
        self.width = 0;
        self.pending_space = None;
    }

    fn push(&mut self, text: &str, style: ContentStyle, width: usize) {
        self.current
            .push_str(&StyledContent::new(style, text).to_string());
        self.width += width;
    }

    fn word(&mut self, word: &str, style: ContentStyle) {
        let w = word.width();
        let space = usize::from(self.pending_space.is_some() && self.width > 0);

        if self.width + space + w > self.available() && self.width > 0 {
            self.flush();
        }
        if let Some(space_style) = self.pending_space.take() {
            if self.width > 0 {
                self.push(" ", space_style, 1);
            }
        }
        if self.width + w <= self.available() {
            self.push(word, style, w);
            return;
        }

        // Longer than a whole line: hard-break by grapheme
        let mut chunk = String::new();
        let mut chunk_width = 0;
        for grapheme in word.graphemes(true) {
            let gw = grapheme.width();
            if self.width + chunk_width + gw > self.available() && chunk_width > 0 {
                let taken = std::mem::take(&mut chunk);
                self.push(&taken, style, chunk_width);
                self.flush();
                chunk_width = 0;
            }
            chunk.push_str(grapheme);
            chunk_width += gw;
        }
        if !chunk.is_empty() {
            self.push(&chunk, style, chunk_width);
        }
    }
}

/// Wrap `spans` into lines, each with its prefix applied.
///
/// Always returns at least one line.
pub fn wrap_spans(spans: &[Span], opts: &WrapOptions) -> Vec<String> {
    let mut lines = Lines {
        opts,
        lines: Vec::new(),
        current: String::new(),
        width: 0,
        pending_space: None,
    };

    for atom in atoms(spans) {
        match atom {
            Atom::Word(word, style) => lines.word(word, style),
            Atom::Space(style) => {
                if lines.width > 0 {
                    lines.pending_space = Some(style);
                }
            }
            Atom::Break => lines.flush(),
        }
    }
    if !lines.current.is_empty() || lines.lines.is_empty() {
        lines.flush();
    }
    lines.lines
}
