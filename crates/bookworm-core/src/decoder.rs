//! Decoder: turns an arbitrarily chunked byte stream into complete UTF-8 lines.
//!
//! [`LineCodec`] implements [`tokio_util::codec::Decoder`], so the carry-over
//! buffer is the `BytesMut` owned by the framed reader. Each call to
//! [`Decoder::decode`] yields one batch holding every complete line currently
//! in the buffer, terminators included. An unterminated tail stays in the
//! buffer for the next read.
//!
//! A multi-byte character cut at the end of the buffer makes the *whole*
//! buffer undecodable for now: nothing is consumed and the codec waits for the
//! next chunk. On end of stream [`Decoder::decode_eof`] flushes whatever is
//! left as a final line.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Default bound on the carry-over buffer (1 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Complete lines produced by one decode step, in stream order.
pub type LineBatch = Vec<String>;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("carry-over buffer exceeded {limit} bytes without a complete line")]
    LineTooLong { limit: usize },

    #[error("invalid UTF-8 sequence at byte {offset} of the carry-over buffer")]
    InvalidUtf8 { offset: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Newline-delimited UTF-8 line decoder with a bounded carry-over buffer.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_line_bytes: usize,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineCodec {
    pub fn new(max_line_bytes: usize) -> Self {
        Self { max_line_bytes }
    }

    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Append `chunk` to `carry` and drain every complete line.
    ///
    /// This is the chunk-at-a-time form of [`Decoder::decode`], for callers
    /// that manage their own buffer instead of using `FramedRead`.
    pub fn feed(&mut self, carry: &mut BytesMut, chunk: &[u8]) -> Result<LineBatch, DecodeError> {
        carry.extend_from_slice(chunk);
        Ok(self.decode(carry)?.unwrap_or_default())
    }

    /// Take everything left in `buf` as final lines.
    ///
    /// Used when the stream ends, cleanly or not. Bytes that still do not form
    /// valid UTF-8 are replaced with U+FFFD rather than dropped.
    pub fn flush(&mut self, buf: &mut BytesMut) -> Option<LineBatch> {
        if buf.is_empty() {
            return None;
        }
        let lines = {
            let text = String::from_utf8_lossy(&buf[..]);
            if matches!(text, std::borrow::Cow::Owned(_)) {
                tracing::warn!(bytes = buf.len(), "flushing tail with an incomplete UTF-8 sequence");
            }
            text.split_inclusive('\n').map(str::to_owned).collect()
        };
        buf.clear();
        Some(lines)
    }

    fn check_bound(&self, len: usize) -> Result<(), DecodeError> {
        if len > self.max_line_bytes {
            return Err(DecodeError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }
        Ok(())
    }
}

impl Decoder for LineCodec {
    type Item = LineBatch;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<LineBatch>, DecodeError> {
        if src.is_empty() {
            return Ok(None);
        }

        let text = match std::str::from_utf8(&src[..]) {
            Ok(text) => text,
            Err(err) if err.error_len().is_none() => {
                tracing::warn!(
                    bytes = src.len(),
                    valid_up_to = err.valid_up_to(),
                    "incomplete UTF-8 sequence, waiting for more data"
                );
                // Complete lines held back with the cut character do not count
                // toward the bound; only the unterminated tail does.
                let tail_start = src[..err.valid_up_to()]
                    .iter()
                    .rposition(|&b| b == b'\n')
                    .map_or(0, |i| i + 1);
                self.check_bound(src.len() - tail_start)?;
                return Ok(None);
            }
            Err(err) => {
                return Err(DecodeError::InvalidUtf8 {
                    offset: err.valid_up_to(),
                })
            }
        };

        let Some(last_newline) = text.rfind('\n') else {
            self.check_bound(src.len())?;
            return Ok(None);
        };

        let complete = last_newline + 1;
        let lines: LineBatch = text[..complete]
            .split_inclusive('\n')
            .map(str::to_owned)
            .collect();
        src.advance(complete);

        tracing::trace!(lines = lines.len(), carry = src.len(), "decoded complete lines");
        Ok(Some(lines))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<LineBatch>, DecodeError> {
        if let Some(lines) = self.decode(buf)? {
            return Ok(Some(lines));
        }
        Ok(self.flush(buf))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
