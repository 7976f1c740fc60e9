//! Typed pull iteration over an SSE response body.

use crate::error::Error;
use crate::sse::{FrameReader, SseParser};
use bytes::Bytes;
use futures::Stream;
use serde::de::DeserializeOwned;
use std::pin::Pin;

/// Body of a streaming HTTP response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Where an [`SseStream`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// `advance` has not been called yet.
    NotStarted,
    /// The last `advance` produced an item.
    Positioned,
    /// The stream ended cleanly (`[DONE]` or end of body).
    Exhausted,
    /// A read or decode failure ended the stream; see [`SseStream::error`].
    Errored,
    /// `close` was called.
    Closed,
}

impl Cursor {
    /// True once no further item can be produced.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Cursor::Exhausted | Cursor::Errored | Cursor::Closed)
    }
}

/// A stream of JSON payloads of type `T`, decoded from SSE frames.
///
/// Items are pulled one at a time: call [`advance`](Self::advance), and when
/// it returns `true` read the item with [`current`](Self::current) or
/// [`take_current`](Self::take_current). Once `advance` returns `false`,
/// [`error`](Self::error) tells a clean end from a failure.
///
/// The stream owns the byte source and drops it on the first terminal
/// transition, on [`close`](Self::close), or when the stream itself is
/// dropped, whichever comes first. Bytes are only read inside `advance`.
///
/// Meant for a single consumer; every method that moves the cursor takes
/// `&mut self`.
pub struct SseStream<T, S = ByteStream> {
    reader: Option<FrameReader<S>>,
    cursor: Cursor,
    current: Option<T>,
    error: Option<Error>,
}

impl<T, S> SseStream<T, S> {
    /// Wrap an already-open byte stream whose producer signaled success.
    pub fn new(byte_stream: S) -> Self {
        Self {
            reader: Some(FrameReader::new(byte_stream)),
            cursor: Cursor::NotStarted,
            current: None,
            error: None,
        }
    }

    /// The item from the most recent successful `advance`.
    ///
    /// `None` unless the cursor is positioned on an item that has not been
    /// taken yet.
    pub fn current(&self) -> Option<&T> {
        match self.cursor {
            Cursor::Positioned => self.current.as_ref(),
            _ => None,
        }
    }

    /// Move the current item out to the caller.
    pub fn take_current(&mut self) -> Option<T> {
        match self.cursor {
            Cursor::Positioned => self.current.take(),
            _ => None,
        }
    }

    /// The failure that ended the stream, if it ended with one.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Release the byte stream and stop iteration.
    ///
    /// Safe to call any number of times, in any state. A recorded error stays
    /// readable afterwards.
    pub fn close(&mut self) {
        if self.cursor != Cursor::Closed {
            tracing::trace!(from = ?self.cursor, "closing event stream");
        }
        self.current = None;
        self.cursor = Cursor::Closed;
        self.release();
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            drop(reader);
            tracing::trace!("released event stream body");
        }
    }

    fn finish(&mut self) {
        self.cursor = Cursor::Exhausted;
        self.release();
    }

    fn fail(&mut self, error: Error) {
        tracing::warn!(%error, "event stream failed");
        self.error = Some(error);
        self.cursor = Cursor::Errored;
        self.release();
    }
}

impl<T, S, E> SseStream<T, S>
where
    T: DeserializeOwned,
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    /// Move to the next item. Returns `false` when the stream ended, failed,
    /// or was closed.
    pub async fn advance(&mut self) -> bool {
        if self.cursor.is_terminal() {
            return false;
        }
        self.current = None;

        loop {
            let Some(reader) = self.reader.as_mut() else {
                self.finish();
                return false;
            };

            let frame = match reader.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.finish();
                    return false;
                }
                Err(e) => {
                    self.fail(e);
                    return false;
                }
            };

            let data = match frame.data() {
                Some(data) if !data.trim().is_empty() => data,
                // Comments, retry hints, keep-alives
                _ => continue,
            };

            if SseParser::is_done(data) {
                tracing::trace!("event stream reached [DONE]");
                self.finish();
                return false;
            }

            match decode::<T>(data) {
                Ok(item) => {
                    self.current = Some(item);
                    self.cursor = Cursor::Positioned;
                    return true;
                }
                Err(e) => {
                    self.fail(e);
                    return false;
                }
            }
        }
    }

    /// Advance and take the item in one step.
    pub async fn next(&mut self) -> Option<T> {
        if self.advance().await {
            self.take_current()
        } else {
            None
        }
    }
}

fn decode<T: DeserializeOwned>(data: &str) -> Result<T, Error> {
    #[cfg(feature = "simd-json")]
    let decoded = {
        let mut data_bytes = data.as_bytes().to_vec();
        simd_json::from_slice(&mut data_bytes).map_err(|e| e.to_string())
    };

    #[cfg(not(feature = "simd-json"))]
    let decoded = serde_json::from_str(data).map_err(|e| e.to_string());

    decoded.map_err(|message| Error::Decode {
        payload: data.to_owned(),
        message,
    })
}
