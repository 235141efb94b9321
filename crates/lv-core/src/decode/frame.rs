//! Length-prefixed frame reader.
//!
//! Frame layout:
//!
//! ```text
//! 0x1E | header_len: u8 | Header (protobuf) | 0x1F | Message (header.message_length bytes)
//! ```
//!
//! Frames are read lazily. The first malformed or truncated frame ends the
//! blob: everything decoded before it is kept, the rest is skipped. A read
//! failure from the underlying stream is different: it is kept on the reader
//! and the caller must fail the blob (see [`FrameReader::take_error`]).

use super::message::{Header, Message};
use lv_common::Ping;
use prost::Message as _;
use std::io::{self, Read};
use thiserror::Error;
use tracing::{debug, warn};

const RECORD_SEPARATOR: u8 = 0x1E;
const UNIT_SEPARATOR: u8 = 0x1F;

/// Messages above this size are treated as corruption.
pub const MAX_MESSAGE_BYTES: u32 = 64 * 1024 * 1024;

/// Reasons a frame could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("truncated frame")]
    Truncated,

    #[error("expected separator {expected:#04x}, found {found:#04x}")]
    BadSeparator { expected: u8, found: u8 },

    #[error("message length {0} exceeds limit")]
    MessageTooLarge(u32),

    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),
}

/// Iterator over the pings of one blob.
pub struct FrameReader<R> {
    key: String,
    reader: R,
    offset: u64,
    frames: usize,
    done: bool,
    corrupt: bool,
    error: Option<io::Error>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(key: impl Into<String>, reader: R) -> Self {
        Self {
            key: key.into(),
            reader,
            offset: 0,
            frames: 0,
            done: false,
            corrupt: false,
            error: None,
        }
    }

    /// Frames decoded so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Whether decoding stopped at a malformed frame.
    pub fn is_corrupt(&self) -> bool {
        self.corrupt
    }

    /// The read failure that stopped decoding, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    fn read_byte(&mut self) -> Result<Option<u8>, DecodeError> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                DecodeError::Truncated
            } else {
                DecodeError::Io(e)
            }
        })?;
        self.offset += len as u64;
        Ok(buf)
    }

    fn expect_byte(&mut self, expected: u8) -> Result<(), DecodeError> {
        match self.read_byte()? {
            Some(found) if found == expected => Ok(()),
            Some(found) => Err(DecodeError::BadSeparator { expected, found }),
            None => Err(DecodeError::Truncated),
        }
    }

    /// Decode the next frame. `Ok(None)` at a clean end of stream.
    fn next_frame(&mut self) -> Result<Option<Ping>, DecodeError> {
        match self.read_byte()? {
            None => return Ok(None),
            Some(RECORD_SEPARATOR) => {}
            Some(found) => {
                return Err(DecodeError::BadSeparator {
                    expected: RECORD_SEPARATOR,
                    found,
                })
            }
        }

        let header_len = self.read_byte()?.ok_or(DecodeError::Truncated)?;
        let header = Header::decode(self.read_exact(header_len as usize)?.as_slice())?;
        self.expect_byte(UNIT_SEPARATOR)?;

        if header.message_length > MAX_MESSAGE_BYTES {
            return Err(DecodeError::MessageTooLarge(header.message_length));
        }
        let body = self.read_exact(header.message_length as usize)?;
        let message = Message::decode(body.as_slice())?;
        Ok(Some(message.into_ping()))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Ping;

    fn next(&mut self) -> Option<Ping> {
        if self.done {
            return None;
        }
        let frame_start = self.offset;
        match self.next_frame() {
            Ok(Some(ping)) => {
                self.frames += 1;
                Some(ping)
            }
            Ok(None) => {
                self.done = true;
                debug!(key = %self.key, frames = self.frames, "blob decoded");
                None
            }
            Err(DecodeError::Io(e)) => {
                self.done = true;
                warn!(
                    key = %self.key,
                    offset = frame_start,
                    frames = self.frames,
                    error = %e,
                    "blob read failed"
                );
                self.error = Some(e);
                None
            }
            Err(e) => {
                self.done = true;
                self.corrupt = true;
                warn!(
                    key = %self.key,
                    offset = frame_start,
                    frames = self.frames,
                    error = %e,
                    "corrupt frame, skipping rest of blob"
                );
                None
            }
        }
    }
}

/// Frame one message.
pub fn encode_frame(message: &Message) -> Vec<u8> {
    let body = message.encode_to_vec();
    let header = Header {
        message_length: body.len() as u32,
    }
    .encode_to_vec();

    let mut frame = Vec::with_capacity(header.len() + body.len() + 3);
    frame.push(RECORD_SEPARATOR);
    frame.push(header.len() as u8);
    frame.extend_from_slice(&header);
    frame.push(UNIT_SEPARATOR);
    frame.extend_from_slice(&body);
    frame
}

/// Frame one ping.
pub fn encode_ping(ping: &Ping) -> Vec<u8> {
    encode_frame(&Message::from_ping(ping, 0))
}
