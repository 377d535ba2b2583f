//! Fragment Source: Line-oriented parser for the completion event stream.
//!
//! The service emits newline-delimited events:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hi"}}]}
//!
//! : keep-alive
//! data: [DONE]
//! ```
//!
//! Blank lines and lines without the `data: ` prefix are skipped. The
//! `[DONE]` sentinel (or the end of the byte stream) ends the sequence.

use crate::client::ChatCompletionChunk;
use crate::error::{Result, StreamError};
use std::io::BufRead;

const DATA_PREFIX: &[u8] = b"data: ";
const DONE_SENTINEL: &[u8] = b"[DONE]";

/// One incremental unit of generated text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    /// The text increment. May be empty.
    pub text: String,
}

impl Fragment {
    /// Create a fragment.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Whether the fragment carries no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<&str> for Fragment {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Parses an event stream into chunk records and fragments.
pub struct FragmentSource<R> {
    reader: R,
    line: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> FragmentSource<R> {
    /// Wrap a buffered byte stream.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::with_capacity(512),
            finished: false,
        }
    }

    /// Read the next chunk record.
    ///
    /// Returns `Ok(None)` once the sentinel or the end of the byte stream is
    /// reached. After the end or an error, further calls return `Ok(None)`.
    pub fn recv(&mut self) -> Result<Option<ChatCompletionChunk>> {
        if self.finished {
            return Ok(None);
        }
        let result = self.read_record();
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    /// Read the next fragment: the first choice's delta text.
    ///
    /// Records without choices yield an empty fragment rather than an error.
    pub fn next_fragment(&mut self) -> Result<Option<Fragment>> {
        Ok(self
            .recv()?
            .map(|chunk| Fragment::new(chunk.delta_text())))
    }

    fn read_record(&mut self) -> Result<Option<ChatCompletionChunk>> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.line)
                .map_err(StreamError::Read)?;
            if read == 0 {
                return Ok(None);
            }

            let line = self.line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            if payload == DONE_SENTINEL {
                return Ok(None);
            }

            return serde_json::from_slice(payload)
                .map(Some)
                .map_err(|source| StreamError::Decode {
                    payload: String::from_utf8_lossy(payload).into_owned(),
                    source,
                });
        }
    }

    /// Consume the source, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead> Iterator for FragmentSource<R> {
    type Item = Result<Fragment>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_fragment().transpose()
    }
}
