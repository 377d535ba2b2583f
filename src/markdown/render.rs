//! `pulldown-cmark` event walker producing styled lines.

use super::wrap::{wrap_spans, Span, WrapOptions};
use super::{Role, Theme};
use crate::terminal::ansi;
use crossterm::style::{ContentStyle, StyledContent};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use unicode_width::UnicodeWidthStr;

/// Render `markdown` wrapped at `width` columns.
///
/// Returns newline-terminated lines, or an empty string for an empty
/// document.
pub(super) fn render(markdown: &str, width: usize, theme: Theme) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut writer = Writer::new(width, theme);
    for event in Parser::new_ext(markdown, options) {
        writer.event(event);
    }
    writer.finish()
}

#[derive(Debug)]
struct ListState {
    /// Next number for ordered lists.
    ordered: Option<u64>,
    /// The current item has not printed its bullet yet.
    marker_pending: bool,
}

#[derive(Debug, Default)]
struct TableBuffer {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

struct CodeBuffer {
    lang: Option<String>,
    text: String,
}

struct Writer {
    width: usize,
    theme: Theme,
    lines: Vec<String>,
    /// Inline content of the block being built.
    spans: Vec<Span>,
    roles: Vec<Role>,
    lists: Vec<ListState>,
    quote_depth: usize,
    code: Option<CodeBuffer>,
    /// Destination and first span index of each open link.
    links: Vec<(String, usize)>,
    table: Option<TableBuffer>,
    /// A blank separator goes before the next emitted line.
    pending_blank: bool,
}

impl Writer {
    fn new(width: usize, theme: Theme) -> Self {
        Self {
            width,
            theme,
            lines: Vec::new(),
            spans: Vec::new(),
            roles: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            code: None,
            links: Vec::new(),
            table: None,
            pending_blank: false,
        }
    }

    fn style(&self) -> ContentStyle {
        self.roles.iter().fold(ContentStyle::new(), |mut acc, role| {
            let s = self.theme.style(*role);
            if s.foreground_color.is_some() {
                acc.foreground_color = s.foreground_color;
            }
            acc.attributes.extend(s.attributes);
            acc
        })
    }

    fn role_style(&self, role: Role) -> ContentStyle {
        self.theme.style(role)
    }

    fn styled(&self, role: Role, text: &str) -> String {
        StyledContent::new(self.role_style(role), text).to_string()
    }

    fn quote_prefix(&self) -> Vec<Span> {
        if self.quote_depth == 0 {
            return Vec::new();
        }
        vec![Span::verbatim(
            "│ ".repeat(self.quote_depth),
            self.role_style(Role::BlockQuote),
        )]
    }

    fn emit(&mut self, line: String) {
        if self.pending_blank && !self.lines.is_empty() {
            let bar = "│ ".repeat(self.quote_depth);
            let blank = self.styled(Role::BlockQuote, bar.trim_end());
            self.lines.push(if self.quote_depth == 0 { String::new() } else { blank });
        }
        self.pending_blank = false;
        self.lines.push(line);
    }

    fn blank(&mut self) {
        self.pending_blank = true;
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline_code(&code),
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                self.spans.push(Span::verbatim(math.to_string(), self.style()));
            }
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => {
                if self.table.is_none() {
                    self.spans.push(Span::text("\n", self.style()));
                }
            }
            Event::Rule => {
                self.flush_paragraph();
                let width = if self.width == 0 { 40 } else { self.width.min(40) };
                let rule = self.styled(Role::Rule, &"─".repeat(width));
                self.emit(rule);
                self.blank();
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.spans
                    .push(Span::verbatim(marker, self.role_style(Role::ListMarker)));
            }
            Event::FootnoteReference(label) => {
                self.spans
                    .push(Span::verbatim(format!("[^{label}]"), self.role_style(Role::LinkUrl)));
            }
            // Raw HTML is not rendered
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_paragraph();
                let level = level as usize;
                self.roles.push(if level == 1 { Role::Title } else { Role::Heading });
                self.spans
                    .push(Span::verbatim(format!("{} ", "#".repeat(level)), self.style()));
            }
            Tag::CodeBlock(kind) => {
                self.flush_paragraph();
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
                self.code = Some(CodeBuffer {
                    lang,
                    text: String::new(),
                });
            }
            Tag::List(start) => {
                self.flush_paragraph();
                self.lists.push(ListState {
                    ordered: start,
                    marker_pending: false,
                });
            }
            Tag::Item => {
                self.flush_paragraph();
                if let Some(list) = self.lists.last_mut() {
                    list.marker_pending = true;
                }
            }
            Tag::BlockQuote(_) => {
                self.flush_paragraph();
                self.quote_depth += 1;
                self.roles.push(Role::BlockQuote);
            }
            Tag::Emphasis => self.roles.push(Role::Emphasis),
            Tag::Strong => self.roles.push(Role::Strong),
            Tag::Strikethrough => self.roles.push(Role::Strikethrough),
            Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => {
                self.roles.push(Role::Link);
                self.links.push((dest_url.to_string(), self.spans.len()));
            }
            Tag::Table(_) => {
                self.flush_paragraph();
                self.table = Some(TableBuffer::default());
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush_paragraph();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Heading(_) => {
                self.flush_paragraph();
                self.roles.pop();
                self.blank();
            }
            TagEnd::CodeBlock => {
                self.flush_code();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::List(_) => {
                self.flush_paragraph();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item => {
                self.flush_paragraph();
                // Empty item: still show its bullet
                if self.lists.last().is_some_and(|l| l.marker_pending) {
                    self.flush_item(Vec::new());
                }
                if let Some(ListState {
                    ordered: Some(n), ..
                }) = self.lists.last_mut()
                {
                    *n += 1;
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush_paragraph();
                self.roles.pop();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.roles.pop();
            }
            TagEnd::Link | TagEnd::Image => {
                self.roles.pop();
                self.end_link();
            }
            TagEnd::TableCell => {
                if let Some(table) = &mut self.table {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = &mut self.table {
                    table.header = std::mem::take(&mut table.row);
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = &mut self.table {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                self.flush_table();
                self.blank();
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = &mut self.code {
            code.text.push_str(text);
            return;
        }
        if let Some(table) = &mut self.table {
            table.cell.push_str(&text.replace('\n', " "));
            return;
        }
        self.spans.push(Span::text(text, self.style()));
    }

    fn inline_code(&mut self, code: &str) {
        if let Some(table) = &mut self.table {
            table.cell.push_str(code);
            return;
        }
        let mut style = self.style();
        let code_style = self.role_style(Role::CodeInline);
        if code_style.foreground_color.is_some() {
            style.foreground_color = code_style.foreground_color;
        }
        self.spans.push(Span::verbatim(code, style));
    }

    fn end_link(&mut self) {
        let Some((url, first)) = self.links.pop() else {
            return;
        };
        let text: String = self.spans[first.min(self.spans.len())..]
            .iter()
            .map(|s| s.text.as_str())
            .collect();
        if url.is_empty() || text.trim() == url || url.starts_with('#') {
            return;
        }
        if self.table.is_some() {
            return;
        }
        self.spans.push(Span::text(" ", self.style()));
        self.spans
            .push(Span::verbatim(url, self.role_style(Role::LinkUrl)));
    }

    fn list_indent(&self) -> String {
        "  ".repeat(self.lists.len().saturating_sub(1))
    }

    fn flush_paragraph(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        if self.lists.is_empty() {
            let opts = WrapOptions::new(self.width).with_prefix(self.quote_prefix());
            for line in wrap_spans(&spans, &opts) {
                self.emit(line);
            }
        } else {
            self.flush_item(spans);
        }
    }

    fn flush_item(&mut self, spans: Vec<Span>) {
        let Some(list) = self.lists.last_mut() else {
            return;
        };
        let marker = match list.ordered {
            Some(n) => format!("{n}. "),
            None => "• ".to_string(),
        };
        let show_marker = std::mem::replace(&mut list.marker_pending, false);

        let indent = self.list_indent();
        let mut first_prefix = self.quote_prefix();
        let mut rest_prefix = self.quote_prefix();
        first_prefix.push(Span::verbatim(indent.clone(), ContentStyle::new()));
        rest_prefix.push(Span::verbatim(
            format!("{indent}{}", " ".repeat(marker.width())),
            ContentStyle::new(),
        ));
        if show_marker {
            first_prefix.push(Span::verbatim(marker, self.role_style(Role::ListMarker)));
        } else {
            first_prefix = rest_prefix.clone();
        }

        let opts = WrapOptions {
            width: self.width,
            first_prefix,
            rest_prefix,
        };
        for line in wrap_spans(&spans, &opts) {
            self.emit(line);
        }
    }

    fn code_prefix(&self) -> String {
        let mut prefix: String = self.quote_prefix().iter().map(Span::styled).collect();
        if !self.lists.is_empty() {
            prefix.push_str(&"  ".repeat(self.lists.len()));
        }
        prefix
    }

    fn flush_code(&mut self) {
        let Some(code) = self.code.take() else {
            return;
        };
        let prefix = self.code_prefix();
        let fence = match &code.lang {
            Some(lang) => format!("```{lang}"),
            None => "```".to_string(),
        };

        let open = format!("{prefix}{}", self.styled(Role::CodeFence, &fence));
        self.emit(open);
        let body = code.text.trim_end_matches('\n');
        if !body.is_empty() {
            for line in body.split('\n') {
                let styled = format!("{prefix}  {}", self.styled(Role::CodeBlock, line));
                self.emit(styled);
            }
        }
        let close = format!("{prefix}{}", self.styled(Role::CodeFence, "```"));
        self.emit(close);
    }

    fn flush_table(&mut self) {
        let Some(table) = self.table.take() else {
            return;
        };
        let columns = table
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(table.header.len()))
            .max()
            .unwrap_or(0);
        if columns == 0 {
            return;
        }

        let mut widths = vec![0; columns];
        for row in std::iter::once(&table.header).chain(&table.rows) {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(ansi::display_width(cell));
            }
        }

        let prefix: String = self.quote_prefix().iter().map(Span::styled).collect();
        let border = self.role_style(Role::TableBorder);
        let separator = StyledContent::new(border, " │ ").to_string();

        let format_row = |row: &[String], style: ContentStyle| -> String {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let cell = row.get(i).map_or("", String::as_str);
                    let pad = w.saturating_sub(ansi::display_width(cell));
                    format!("{}{}", StyledContent::new(style, cell), " ".repeat(pad))
                })
                .collect();
            format!("{prefix}{}", cells.join(&separator))
        };

        if !table.header.is_empty() {
            let header = format_row(&table.header, self.role_style(Role::TableHeader));
            self.emit(header);
            let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            let rule = format!(
                "{prefix}{}",
                StyledContent::new(border, rule.join("─┼─"))
            );
            self.emit(rule);
        }
        for row in &table.rows {
            let line = format_row(row, ContentStyle::new());
            self.emit(line);
        }
    }

    fn finish(mut self) -> String {
        // Unterminated blocks are common mid-stream
        if self.code.is_some() {
            self.flush_code();
        }
        self.flush_paragraph();
        if self.table.is_some() {
            self.flush_table();
        }

        if self.lines.is_empty() {
            return String::new();
        }
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}
