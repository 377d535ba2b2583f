//! Markdown: Renders markdown text to styled terminal output.
//!
//! The render loop only sees the [`MarkdownRenderer`] trait: text in,
//! styled text (with ANSI escapes) or an error out. [`TermRenderer`] is the
//! built-in implementation on top of `pulldown-cmark`, with word wrapping
//! and a small color [`Theme`].
//!
//! ```rust,ignore
//! use inkflow::markdown::{MarkdownRenderer, TermRenderer};
//!
//! let renderer = TermRenderer::new(80);
//! let styled = renderer.render("# Title\n\nSome *emphasis*.")?;
//! ```

mod render;
mod wrap;

pub use wrap::{wrap_spans, Span, WrapOptions};

use crate::error::Result;
use crossterm::style::{Color, ContentStyle, Stylize};

/// Column count used when the caller leaves word wrap at zero.
pub const DEFAULT_WORD_WRAP: usize = 120;

/// Converts accumulated markdown into styled terminal text.
///
/// Implementations must be pure: rendering the same input twice yields
/// the same output. Closures of the right shape implement it too.
pub trait MarkdownRenderer {
    /// Render the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Render`](crate::StreamError::Render) if the
    /// input cannot be rendered.
    fn render(&self, markdown: &str) -> Result<String>;
}

impl<F> MarkdownRenderer for F
where
    F: Fn(&str) -> Result<String>,
{
    fn render(&self, markdown: &str) -> Result<String> {
        self(markdown)
    }
}

/// Semantic style slots the renderer asks the theme for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Level 1 heading.
    Title,
    /// Level 2 to 6 headings.
    Heading,
    /// `*emphasis*`.
    Emphasis,
    /// `**strong**`.
    Strong,
    /// `~~strikethrough~~`.
    Strikethrough,
    /// `` `inline code` ``.
    CodeInline,
    /// Fenced or indented code body.
    CodeBlock,
    /// The fence lines around a code block.
    CodeFence,
    /// Link text.
    Link,
    /// Link destination shown after the text.
    LinkUrl,
    /// Block quote text and bar.
    BlockQuote,
    /// List bullets and numbers.
    ListMarker,
    /// Horizontal rule.
    Rule,
    /// Table header cells.
    TableHeader,
    /// Table separators.
    TableBorder,
}

/// Color theme for [`TermRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    /// Colors for dark backgrounds.
    #[default]
    Dark,
    /// Colors for light backgrounds.
    Light,
    /// Attributes only where they carry meaning; no colors.
    Plain,
}

impl Theme {
    /// Pick a theme from the environment.
    ///
    /// `NO_COLOR` selects [`Theme::Plain`]. Otherwise `COLORFGBG` decides
    /// between light and dark, defaulting to dark.
    pub fn detect() -> Self {
        if std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            return Self::Plain;
        }
        std::env::var("COLORFGBG")
            .ok()
            .map_or(Self::Dark, |value| Self::from_colorfgbg(&value))
    }

    fn from_colorfgbg(value: &str) -> Self {
        // "fg;bg" or "fg;default;bg"; 7 and 15 are the light backgrounds
        match value.rsplit(';').next().and_then(|bg| bg.parse::<u8>().ok()) {
            Some(7 | 15) => Self::Light,
            _ => Self::Dark,
        }
    }

    /// Style for a role.
    pub fn style(self, role: Role) -> ContentStyle {
        let base = ContentStyle::new();
        let (accent, muted, code) = match self {
            Self::Dark => (Color::AnsiValue(39), Color::AnsiValue(244), Color::AnsiValue(203)),
            Self::Light => (Color::AnsiValue(27), Color::AnsiValue(242), Color::AnsiValue(124)),
            Self::Plain => {
                return match role {
                    Role::Title | Role::Heading | Role::Strong | Role::TableHeader => base.bold(),
                    Role::Emphasis => base.italic(),
                    Role::Strikethrough => base.crossed_out(),
                    Role::Link => base.underlined(),
                    _ => base,
                };
            }
        };

        match role {
            Role::Title => base.with(accent).bold().underlined(),
            Role::Heading => base.with(accent).bold(),
            Role::Emphasis => base.italic(),
            Role::Strong | Role::TableHeader => base.bold(),
            Role::Strikethrough => base.crossed_out(),
            Role::CodeInline => base.with(code),
            Role::CodeBlock => match self {
                Self::Light => base.with(Color::AnsiValue(238)),
                _ => base.with(Color::AnsiValue(252)),
            },
            Role::CodeFence | Role::Rule | Role::TableBorder => base.with(muted).dim(),
            Role::Link => base.with(Color::AnsiValue(37)).underlined(),
            Role::LinkUrl | Role::ListMarker => base.with(muted),
            Role::BlockQuote => base.with(muted).italic(),
        }
    }
}

/// Markdown renderer for ANSI terminals.
#[derive(Debug, Clone)]
pub struct TermRenderer {
    word_wrap: usize,
    theme: Theme,
}

impl TermRenderer {
    /// Renderer wrapping at `word_wrap` columns with the detected theme.
    ///
    /// Zero means [`DEFAULT_WORD_WRAP`].
    pub fn new(word_wrap: usize) -> Self {
        Self::with_theme(word_wrap, Theme::detect())
    }

    /// Renderer with an explicit theme.
    pub const fn with_theme(word_wrap: usize, theme: Theme) -> Self {
        let word_wrap = if word_wrap == 0 {
            DEFAULT_WORD_WRAP
        } else {
            word_wrap
        };
        Self { word_wrap, theme }
    }

    /// Effective wrap width.
    pub const fn word_wrap(&self) -> usize {
        self.word_wrap
    }

    /// The theme in use.
    pub const fn theme(&self) -> Theme {
        self.theme
    }
}

impl MarkdownRenderer for TermRenderer {
    fn render(&self, markdown: &str) -> Result<String> {
        Ok(render::render(markdown, self.word_wrap, self.theme))
    }
}
