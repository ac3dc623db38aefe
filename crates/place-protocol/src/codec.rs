//! Newline-delimited JSON framing.
//!
//! Each frame is one JSON document followed by `\n`. A trailing `\r` is
//! tolerated and blank lines are skipped.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()` or direct indexing
//! - Oversized frames are rejected before they are fully buffered

use std::io;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

/// Largest frame a server accepts from a client (64 KiB).
pub const MAX_CLIENT_FRAME: usize = 64 * 1024;

/// Largest frame a client accepts from the server (64 MiB).
///
/// Sized for a full BOARD snapshot of the largest supported board.
pub const MAX_SERVER_FRAME: usize = 64 * 1024 * 1024;

/// Errors produced while framing or (de)serializing messages.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame too large (max: {max} bytes)")]
    FrameTooLarge { max: usize },

    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("Malformed message: {0}")]
    Decode(String),

    #[error("Failed to encode message: {0}")]
    Encode(String),
}

impl CodecError {
    /// Returns `true` if the peer sent something we could not accept.
    ///
    /// Transport errors are not violations; the connection simply went away.
    pub fn is_protocol_violation(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Encode(_))
    }
}

/// Serializes a message into a single line (without the terminator).
pub fn encode<T: Serialize>(msg: &T) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Parses one frame into a message.
pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, CodecError> {
    serde_json::from_str(line).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Writes one message as a terminated frame and flushes.
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = encode(msg)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads newline-delimited frames from a byte stream.
///
/// Built on [`FramedRead`] with a [`LinesCodec`], which keeps partial
/// frames buffered between calls. [`FrameReader::next_line`] and
/// [`FrameReader::next_frame`] are therefore cancellation safe and can be
/// raced in `tokio::select!`.
pub struct FrameReader<R> {
    lines: FramedRead<R, LinesCodec>,
    max_frame: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Creates a reader rejecting frames longer than `max_frame` bytes.
    pub fn new(inner: R, max_frame: usize) -> Self {
        Self {
            lines: FramedRead::new(inner, LinesCodec::new_with_max_length(max_frame)),
            max_frame,
        }
    }

    /// Returns the next non-blank line, or `None` at end of stream.
    ///
    /// An unterminated final line is returned as a frame.
    pub async fn next_line(&mut self) -> Result<Option<String>, CodecError> {
        while let Some(line) = self.lines.next().await {
            let line = line.map_err(|e| frame_error(e, self.max_frame))?;
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Reads and decodes the next frame, or `None` at end of stream.
    pub async fn next_frame<T: DeserializeOwned>(&mut self) -> Result<Option<T>, CodecError> {
        match self.next_line().await? {
            Some(line) => decode(&line).map(Some),
            None => Ok(None),
        }
    }
}

/// `LinesCodec` reports undecodable bytes as `InvalidData`.
fn frame_error(err: LinesCodecError, max: usize) -> CodecError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => CodecError::FrameTooLarge { max },
        LinesCodecError::Io(e) if e.kind() == io::ErrorKind::InvalidData => CodecError::InvalidUtf8,
        LinesCodecError::Io(e) => CodecError::Io(e),
    }
}
