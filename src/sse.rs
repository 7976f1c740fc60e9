//! SSE (Server-Sent Events) frame parser.
//!
//! Handles:
//! - Partial frames across TCP chunks
//! - Multi-line data fields
//! - CRLF and LF line endings
//! - Comment lines and unknown fields
//! - Buffer compaction to prevent unbounded growth

use crate::error::Error;
use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use memchr::memchr;
use smallvec::SmallVec;
use std::borrow::Cow;

/// Data value the API sends to mark the end of a generation stream.
pub const DONE: &str = "[DONE]";

/// Field names defined by the SSE wire format.
const KNOWN_FIELDS: [&str; 4] = ["event", "data", "id", "retry"];

/// A raw SSE frame: field names mapped to their accumulated values, in the
/// order the fields first appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    fields: SmallVec<[(String, String); 2]>,
}

impl Frame {
    /// Value of a field, if the frame carried it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Accumulated `data` lines, joined with `\n`.
    #[inline]
    pub fn data(&self) -> Option<&str> {
        self.get("data")
    }

    #[inline]
    pub fn event(&self) -> Option<&str> {
        self.get("event")
    }

    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.get("id")
    }

    #[inline]
    pub fn retry(&self) -> Option<&str> {
        self.get("retry")
    }

    /// All fields, including ones the wire format does not define.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
    }

    fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, existing)) if name == "data" => {
                existing.push('\n');
                existing.push_str(value);
            }
            Some((_, existing)) => {
                existing.clear();
                existing.push_str(value);
            }
            None => self.fields.push((name.to_owned(), value.to_owned())),
        }
    }

    fn has_known_field(&self) -> bool {
        self.fields
            .iter()
            .any(|(field, _)| KNOWN_FIELDS.contains(&field.as_str()))
    }
}

/// Incremental line-based SSE parser. Bytes go in with [`feed`](Self::feed),
/// complete frames come out of [`next_frame`](Self::next_frame).
pub struct SseParser {
    buffer: BytesMut,
    /// Offset of unconsumed data in buffer.
    consumed: usize,
    /// Frame being built from the lines seen since the last blank line.
    pending: Frame,
}

impl SseParser {
    /// Create a new parser with default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(8192)
    }

    /// Create a new parser with specified initial capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(cap),
            consumed: 0,
            pending: Frame::default(),
        }
    }

    /// Feed bytes into the parser.
    #[inline]
    pub fn feed(&mut self, data: &[u8]) {
        // Compact buffer if we've consumed more than half
        if self.consumed > self.buffer.len() / 2 && self.consumed > 4096 {
            self.compact();
        }
        self.buffer.extend_from_slice(data);
    }

    fn compact(&mut self) {
        if self.consumed > 0 {
            self.buffer.advance(self.consumed);
            self.consumed = 0;
        }
    }

    /// Parse buffered lines up to the next frame boundary.
    /// Returns `None` if more data is needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let start = self.consumed;
            let line_end = start + memchr(b'\n', &self.buffer[start..])?;
            self.consumed = line_end + 1;

            let line = strip_cr(&self.buffer[start..line_end]);
            if line.is_empty() {
                if let Some(frame) = self.take_frame() {
                    return Some(frame);
                }
                // Blank line after comments or nothing at all
                continue;
            }
            apply_line(&mut self.pending, line);
        }
    }

    /// Flush at end of input. A trailing line without `\n` is parsed, and a
    /// frame left open without its blank line is returned as the last frame.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = strip_cr(&self.buffer[self.consumed..]);
        if !rest.is_empty() {
            apply_line(&mut self.pending, rest);
        }
        self.buffer.clear();
        self.consumed = 0;
        self.take_frame()
    }

    fn take_frame(&mut self) -> Option<Frame> {
        let frame = std::mem::take(&mut self.pending);
        frame.has_known_field().then_some(frame)
    }

    /// Check if the data indicates end of stream (`[DONE]`).
    #[inline]
    pub fn is_done(data: &str) -> bool {
        data.trim() == DONE
    }

    /// Current buffer size.
    pub fn buffer_len(&self) -> usize {
        self.buffer.len() - self.consumed
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn apply_line(frame: &mut Frame, line: &[u8]) {
    // No colon: noise. Leading colon: comment.
    let colon = match memchr(b':', line) {
        Some(0) | None => return,
        Some(pos) => pos,
    };
    let field = &line[..colon];
    let value = &line[colon + 1..];
    let value = value.strip_prefix(b" ").unwrap_or(value);

    // Invalid sequences become U+FFFD so the payload still reaches the decoder.
    let value = String::from_utf8_lossy(value);
    if matches!(value, Cow::Owned(_)) {
        tracing::debug!(len = line.len(), "SSE line is not valid UTF-8");
    }
    frame.set(&String::from_utf8_lossy(field), &value);
}

/// Reads frames from a byte stream, pulling chunks only when the buffered
/// bytes hold no complete frame.
pub struct FrameReader<S> {
    inner: S,
    parser: SseParser,
    eof: bool,
}

impl<S> FrameReader<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            eof: false,
        }
    }
}

impl<S, E> FrameReader<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    /// Read the next frame.
    ///
    /// `Ok(None)` means the byte stream ended cleanly; a failed read is
    /// returned as [`Error::Stream`].
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        loop {
            if let Some(frame) = self.parser.next_frame() {
                return Ok(Some(frame));
            }
            if self.eof {
                return Ok(None);
            }

            match self.inner.next().await {
                Some(Ok(bytes)) => self.parser.feed(&bytes),
                Some(Err(e)) => return Err(Error::Stream(std::io::Error::other(e))),
                None => {
                    self.eof = true;
                    return Ok(self.parser.finish());
                }
            }
        }
    }
}
