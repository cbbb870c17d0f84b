//! Line codec
//!
//! Turns the raw byte stream of a client into clean lines of text and renders
//! outbound traffic. Used with `FramedRead` / `FramedWrite` over the two
//! halves of a `TcpStream`.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::LineError;
use crate::message::Message;

/// Longest accepted line, terminator excluded
pub const MAX_LINE_LENGTH: usize = 4096;

const BACKSPACE: char = '\u{8}';

/// CRLF line codec with backspace correction
#[derive(Debug, Clone)]
pub struct ChatCodec {
    max_length: usize,
}

impl ChatCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Default for ChatCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Clean one raw line
///
/// Trims surrounding whitespace, then applies every backspace as a deletion
/// of the previous character on the same line.
pub fn clean_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut line = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c == BACKSPACE {
            line.pop();
        } else {
            line.push(c);
        }
    }
    line
}

impl Decoder for ChatCodec {
    type Item = String;
    type Error = LineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, LineError> {
        let Some(pos) = src.iter().position(|b| *b == b'\n') else {
            if src.len() > self.max_length {
                return Err(LineError::TooLong {
                    limit: self.max_length,
                });
            }
            return Ok(None);
        };

        if pos > self.max_length {
            return Err(LineError::TooLong {
                limit: self.max_length,
            });
        }

        let raw = src.split_to(pos + 1);
        Ok(Some(clean_line(&raw[..pos])))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, LineError> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                // Unterminated trailing bytes are dropped
                src.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<Message> for ChatCodec {
    type Error = LineError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), LineError> {
        dst.put_slice(msg.render().as_bytes());
        Ok(())
    }
}

/// Fixed server text, written verbatim
impl Encoder<String> for ChatCodec {
    type Error = LineError;

    fn encode(&mut self, text: String, dst: &mut BytesMut) -> Result<(), LineError> {
        dst.put_slice(text.as_bytes());
        Ok(())
    }
}
