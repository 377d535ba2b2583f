//! ANSI-aware text measurement.
//!
//! Styled markdown carries SGR escape sequences. Width calculations must
//! skip them, and truncation must keep them intact.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Reset all attributes.
pub const RESET: &str = "\x1b[0m";

/// Split `s` into runs of escape sequences and visible text.
///
/// Yields `(is_escape, slice)` pairs in order.
fn segments(s: &str) -> impl Iterator<Item = (bool, &str)> {
    let bytes = s.as_bytes();
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos >= bytes.len() {
            return None;
        }
        let start = pos;
        if bytes[pos] == 0x1b {
            pos += 1;
            if bytes.get(pos) == Some(&b'[') {
                pos += 1;
                // Parameters and intermediates, then one final byte
                while pos < bytes.len() && !(0x40..=0x7e).contains(&bytes[pos]) {
                    pos += 1;
                }
                pos = (pos + 1).min(bytes.len());
            }
            return Some((true, &s[start..pos]));
        }
        while pos < bytes.len() && bytes[pos] != 0x1b {
            pos += 1;
        }
        Some((false, &s[start..pos]))
    })
}

/// Display width of `s` in terminal columns, ignoring escape sequences.
pub fn display_width(s: &str) -> usize {
    segments(s)
        .filter(|(escape, _)| !escape)
        .map(|(_, text)| text.width())
        .sum()
}

/// Remove escape sequences from `s`.
pub fn strip(s: &str) -> String {
    segments(s)
        .filter(|(escape, _)| !escape)
        .map(|(_, text)| text)
        .collect()
}

/// Cut `s` to at most `width` columns.
///
/// Escape sequences are kept. If anything was cut, the result ends with a
/// reset so styles do not leak into the next line.
pub fn truncate(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut used = 0;
    let mut full = false;
    for (escape, text) in segments(s) {
        if escape {
            out.push_str(text);
            continue;
        }
        if full {
            continue;
        }
        for grapheme in text.graphemes(true) {
            let w = grapheme.width();
            if used + w > width {
                full = true;
                break;
            }
            used += w;
            out.push_str(grapheme);
        }
    }
    out.push_str(RESET);
    out
}
