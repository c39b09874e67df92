//! Line and server-sent-event framing for ACP streams.
//!
//! [`AcpCodec`] wraps [`tokio_util::codec::LinesCodec`] with a maximum line
//! length to prevent memory exhaustion caused by unterminated or
//! maliciously large messages from a misbehaving agent. An over-long line
//! is discarded up to its newline and decoding carries on with the next
//! one. The codec never returns the error itself, because `FramedRead`
//! ends the stream after any decoder error.
//!
//! [`SseCodec`] layers `text/event-stream` framing on top of it: the
//! `data:` lines of one event are joined into a single frame and a blank
//! line terminates the event. An event that lost a line to the cap is
//! dropped whole.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use acp_conductor::acp::codec::SseCodec;
//!
//! let frames = FramedRead::new(body_reader, SseCodec::new());
//! ```

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};
use tracing::warn;

use crate::{AppError, Result};

/// Maximum line length accepted by the ACP codec: 1 MiB.
///
/// Lines exceeding this limit on the inbound stream are discarded by
/// [`AcpCodec`], protecting the client from allocating unbounded memory for
/// a single message.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited codec for ACP streams.
///
/// Delegates line-framing to [`LinesCodec`] with a fixed
/// [`MAX_LINE_BYTES`] limit. Trailing `\r` is stripped, so CRLF streams
/// decode identically.
#[derive(Debug)]
pub struct AcpCodec {
    lines: LinesCodec,
    discarded: usize,
}

impl AcpCodec {
    /// Create a new `AcpCodec` with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_BYTES),
            discarded: 0,
        }
    }

    /// Number of over-long lines discarded since the last call.
    pub fn take_discarded(&mut self) -> usize {
        std::mem::take(&mut self.discarded)
    }

    /// `None` when `decoded` reported an over-long line that was dropped.
    fn skip_over_long(
        &mut self,
        decoded: std::result::Result<Option<String>, LinesCodecError>,
    ) -> Option<Result<Option<String>>> {
        match decoded {
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                self.discarded += 1;
                warn!(max_bytes = MAX_LINE_BYTES, "acp codec: line too long, discarding");
                None
            }
            other => Some(other.map_err(map_codec_error)),
        }
    }
}

impl Default for AcpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AcpCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // `LinesCodec` keeps discarding up to the next newline on the call
        // after it reports an over-long line.
        loop {
            let decoded = self.lines.decode(src);
            if let Some(result) = self.skip_over_long(decoded) {
                return result;
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let decoded = self.lines.decode_eof(src);
            if let Some(result) = self.skip_over_long(decoded) {
                return result;
            }
        }
    }
}

/// `text/event-stream` decoder yielding one frame per event.
///
/// Multiple `data:` lines in a single event are joined with `\n`.
/// `event:`, `id:`, `retry:` fields and `:` comments are ignored; an event
/// with no data lines (e.g. a keep-alive) yields nothing.
#[derive(Debug, Default)]
pub struct SseCodec {
    lines: AcpCodec,
    data: Vec<String>,
    truncated: bool,
}

impl SseCodec {
    /// Create a new `SseCodec`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn note_discards(&mut self) {
        if self.lines.take_discarded() > 0 {
            self.truncated = true;
        }
    }

    fn accept_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.take_event();
        }
        if let Some(rest) = line.strip_prefix("data:") {
            self.data
                .push(rest.strip_prefix(' ').unwrap_or(rest).to_owned());
        }
        None
    }

    fn take_event(&mut self) -> Option<String> {
        if std::mem::take(&mut self.truncated) {
            warn!(lines = self.data.len(), "sse codec: dropping event with an over-long line");
            self.data.clear();
            return None;
        }
        if self.data.is_empty() {
            return None;
        }
        let frame = self.data.join("\n");
        self.data.clear();
        Some(frame)
    }
}

impl Decoder for SseCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        while let Some(line) = self.lines.decode(src)? {
            self.note_discards();
            if let Some(frame) = self.accept_line(&line) {
                return Ok(Some(frame));
            }
        }
        self.note_discards();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        while let Some(line) = self.lines.decode_eof(src)? {
            self.note_discards();
            if let Some(frame) = self.accept_line(&line) {
                return Ok(Some(frame));
            }
        }
        self.note_discards();
        // A server that closes without the final blank line still
        // delivered a complete event.
        Ok(self.take_event())
    }
}

// ── Private helper ────────────────────────────────────────────────────────────

/// Map a [`LinesCodecError`] to an [`AppError`].
fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Acp(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
