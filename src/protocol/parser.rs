//! Incremental RESP Parser
//!
//! The parser never owns a buffer. The connection handler appends whatever
//! the socket delivered to its own `BytesMut` and asks the parser to decode
//! one frame from the front of it:
//!
//! - `Ok(Some((value, consumed)))`: a complete frame; drop `consumed` bytes
//! - `Ok(None)`: the frame is not complete yet; keep the bytes and read more
//! - `Err(ParseError)`: the bytes can never form a valid frame
//!
//! After `Ok(None)` the caller must pass the same bytes again, with anything
//! new appended. The parser remembers how far into a top-level array it got
//! and which elements it already decoded, so a large command split across
//! many reads is decoded once rather than from byte 0 on every read. Only
//! the element that was cut off is looked at again.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Invalid integer format
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a header line or inline command
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for null)
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Protocol violation (missing CRLF, etc.)
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The message exceeds maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum length of a line without CRLF (inline commands, type headers)
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// Maximum array nesting depth (prevent stack overflow)
pub const MAX_NESTING_DEPTH: usize = 32;

/// An incremental RESP protocol parser.
///
/// # Example
///
/// ```
/// use emberkv::protocol::{RespParser, RespValue};
///
/// let mut parser = RespParser::new();
///
/// // Only part of the command has arrived
/// assert!(parser.parse(b"*2\r\n$3\r\nGET\r\n$3\r\nf").unwrap().is_none());
///
/// let (value, consumed) = parser
///     .parse(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n")
///     .unwrap()
///     .unwrap();
/// assert_eq!(consumed, 22);
/// assert_eq!(
///     value,
///     RespValue::array(vec![RespValue::bulk_string("GET"), RespValue::bulk_string("foo")])
/// );
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    /// Current nesting depth (for array parsing)
    depth: usize,

    /// Top-level array still waiting for elements
    pending: Option<PartialArray>,
}

/// Progress through a top-level array whose elements have not all arrived.
#[derive(Debug)]
struct PartialArray {
    /// Elements decoded so far
    elements: Vec<RespValue>,
    /// Elements still missing
    remaining: usize,
    /// Bytes of the frame covered by the header and `elements`
    consumed: usize,
}

impl RespParser {
    pub fn new() -> Self {
        Self {
            depth: 0,
            pending: None,
        }
    }

    /// Attempts to parse one RESP frame from the front of `buf`.
    ///
    /// Any saved progress is dropped on error, so the caller can discard its
    /// buffer and start over.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.depth = 0;
        let result = self.parse_frame(buf);
        if result.is_err() {
            self.pending = None;
        }
        result
    }

    fn parse_frame(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        if let Some(partial) = self.pending.take() {
            if buf.len() >= partial.consumed {
                return self.resume_array(buf, partial);
            }
            // Buffer was replaced; start from scratch
        }

        if buf.first() != Some(&prefix::ARRAY) {
            return self.parse_value(buf);
        }

        let header = match read_line(&buf[1..])? {
            Some(line) => line,
            None => return Ok(None),
        };
        let count = parse_i64(header)?;
        let consumed = 1 + header.len() + 2;

        if count == -1 {
            return Ok(Some((RespValue::Null, consumed)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        let partial = PartialArray {
            elements: Vec::with_capacity(count.min(buf.len() / 3 + 1)),
            remaining: count,
            consumed,
        };
        self.resume_array(buf, partial)
    }

    /// Decodes as many of the array's missing elements as `buf` holds.
    fn resume_array(
        &mut self,
        buf: &[u8],
        mut partial: PartialArray,
    ) -> ParseResult<Option<(RespValue, usize)>> {
        self.depth = 1;
        while partial.remaining > 0 {
            match self.parse_value(&buf[partial.consumed..])? {
                Some((value, element_consumed)) => {
                    partial.elements.push(value);
                    partial.consumed += element_consumed;
                    partial.remaining -= 1;
                }
                None => {
                    self.pending = Some(partial);
                    return Ok(None);
                }
            }
        }
        self.depth = 0;

        Ok(Some((RespValue::Array(partial.elements), partial.consumed)))
    }

    fn parse_value(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::ProtocolError(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        match buf[0] {
            prefix::SIMPLE_STRING => self.parse_simple_string(buf),
            prefix::ERROR => self.parse_error(buf),
            prefix::INTEGER => self.parse_integer(buf),
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf),
            _ => self.parse_inline(buf),
        }
    }

    /// `+<string>\r\n`
    fn parse_simple_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        match read_line(&buf[1..])? {
            Some(line) => {
                let s = utf8(line)?;
                // +1 for prefix, +2 for CRLF
                let consumed = 1 + line.len() + 2;
                Ok(Some((RespValue::SimpleString(s.to_string()), consumed)))
            }
            None => Ok(None),
        }
    }

    /// `-<error message>\r\n`
    fn parse_error(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        match read_line(&buf[1..])? {
            Some(line) => {
                let s = utf8(line)?;
                let consumed = 1 + line.len() + 2;
                Ok(Some((RespValue::Error(s.to_string()), consumed)))
            }
            None => Ok(None),
        }
    }

    /// `:<integer>\r\n`
    fn parse_integer(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        match read_line(&buf[1..])? {
            Some(line) => {
                let n = parse_i64(line)?;
                let consumed = 1 + line.len() + 2;
                Ok(Some((RespValue::Integer(n), consumed)))
            }
            None => Ok(None),
        }
    }

    /// `$<length>\r\n<data>\r\n`
    fn parse_bulk_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let header = match read_line(&buf[1..])? {
            Some(line) => line,
            None => return Ok(None),
        };
        let length = parse_i64(header)?;
        let data_start = 1 + header.len() + 2;

        if length == -1 {
            return Ok(Some((RespValue::Null, data_start)));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let total_needed = data_start + length + 2;
        if buf.len() < total_needed {
            return Ok(None);
        }

        if &buf[data_start + length..total_needed] != CRLF {
            return Err(ParseError::ProtocolError(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
        Ok(Some((RespValue::BulkString(data), total_needed)))
    }

    /// `*<count>\r\n<elements...>`
    fn parse_array(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let header = match read_line(&buf[1..])? {
            Some(line) => line,
            None => return Ok(None),
        };
        let count = parse_i64(header)?;
        let mut consumed = 1 + header.len() + 2;

        if count == -1 {
            return Ok(Some((RespValue::Null, consumed)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        // Each element takes at least 3 bytes, so don't trust `count` for the allocation
        let mut elements = Vec::with_capacity(count.min(buf.len() / 3 + 1));

        self.depth += 1;
        for _ in 0..count {
            match self.parse_value(&buf[consumed..])? {
                Some((value, element_consumed)) => {
                    elements.push(value);
                    consumed += element_consumed;
                }
                None => return Ok(None),
            }
        }
        self.depth -= 1;

        Ok(Some((RespValue::Array(elements), consumed)))
    }

    /// A plain text line such as `SET foo bar\r\n`, as typed into telnet.
    fn parse_inline(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let line = match read_line(buf)? {
            Some(line) => line,
            None => return Ok(None),
        };

        let text = utf8(line)?;
        let elements: Vec<RespValue> = text
            .split_whitespace()
            .map(|s| RespValue::BulkString(Bytes::from(s.to_string())))
            .collect();
        if elements.is_empty() {
            return Err(ParseError::ProtocolError("empty inline command".to_string()));
        }

        Ok(Some((RespValue::Array(elements), line.len() + 2)))
    }
}

/// Returns the bytes before the first CRLF, or `None` if no CRLF has arrived.
///
/// A line longer than [`MAX_INLINE_SIZE`] is rejected even while incomplete,
/// so a client can't grow the buffer forever by never sending CRLF.
fn read_line(buf: &[u8]) -> ParseResult<Option<&[u8]>> {
    match find_crlf(buf) {
        Some(pos) if pos > MAX_INLINE_SIZE => Err(line_too_long()),
        Some(pos) => Ok(Some(&buf[..pos])),
        None if buf.len() > MAX_INLINE_SIZE => Err(line_too_long()),
        None => Ok(None),
    }
}

fn line_too_long() -> ParseError {
    ParseError::ProtocolError("too big inline request".to_string())
}

#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

fn utf8(line: &[u8]) -> ParseResult<&str> {
    std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))
}

fn parse_i64(line: &[u8]) -> ParseResult<i64> {
    let s = utf8(line)?;
    s.parse()
        .map_err(|e: ParseIntError| ParseError::InvalidInteger(format!("{:?}: {}", s, e)))
}

/// Length of the blank lines (`\r\n`, or spaces then `\r\n`) at the front
/// of `buf`.
///
/// Interactive clients send these when Enter is pressed on an empty line.
/// They are not commands and get no reply.
pub fn leading_blank_lines(buf: &[u8]) -> usize {
    let mut skipped = 0;
    loop {
        let rest = &buf[skipped..];
        let spaces = rest
            .iter()
            .take_while(|&&b| b == b' ' || b == b'\t')
            .count();
        if !rest[spaces..].starts_with(CRLF) {
            return skipped;
        }
        skipped += spaces + 2;
    }
}

/// Parses a single RESP message with a throwaway parser.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}
