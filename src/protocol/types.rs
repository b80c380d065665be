//! RESP Frames and Reply Encoding
//!
//! `RespValue` is the single frame type used on both sides of the wire:
//! the parser produces it from client bytes, and the command layer returns
//! it as a reply which is then serialized back to the client.
//!
//! ## Reply Shapes
//!
//! | Reply          | Wire format                 |
//! |----------------|-----------------------------|
//! | OK             | `+OK\r\n`                   |
//! | bulk value `s` | `$<byte length>\r\n<s>\r\n` |
//! | nil            | `$-1\r\n`                   |
//! | integer `n`    | `:<n>\r\n`                  |
//! | error `msg`    | `-ERR <msg>\r\n`            |
//!
//! Arrays (`*<count>\r\n...`) only show up as incoming commands.

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// Represents a value in the RESP protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Status line without CRLF inside. Format: `+<string>\r\n`
    SimpleString(String),

    /// Error line, written verbatim after the `-` prefix.
    Error(String),

    /// Format: `:<integer>\r\n`
    Integer(i64),

    /// Length-prefixed payload. Format: `$<length>\r\n<data>\r\n`
    BulkString(Bytes),

    /// Null bulk string (`$-1\r\n`), also produced for a null array on input.
    Null,

    /// Format: `*<count>\r\n<element1><element2>...`
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates an error reply with the message written as-is.
    ///
    /// Most callers want [`RespValue::error_reply`], which adds the `ERR` code.
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Creates a generic `ERR` reply from any displayable error.
    ///
    /// # Example
    /// ```
    /// use emberkv::protocol::types::RespValue;
    /// let reply = RespValue::error_reply("value is not an integer");
    /// assert_eq!(reply.serialize(), b"-ERR value is not an integer\r\n");
    /// ```
    pub fn error_reply(err: impl fmt::Display) -> Self {
        RespValue::Error(format!("ERR {}", err))
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a bulk string reply.
    ///
    /// # Example
    /// ```
    /// use emberkv::protocol::types::RespValue;
    /// let bulk = RespValue::bulk_string("bar");
    /// assert_eq!(bulk.serialize(), b"$3\r\nbar\r\n");
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// The `+OK` status reply
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Serializes the value to a freshly allocated buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the value into an existing buffer.
    ///
    /// The connection handler uses this to batch replies for pipelined
    /// commands into a single write.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                push_line(buf, s);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Error(s) => {
                buf.push(prefix::ERROR);
                push_line(buf, s);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                // Length is in bytes, not characters
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Null => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            RespValue::Array(values) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }
}

/// Writes status or error text, which must stay on a single line.
/// CR and LF are replaced with spaces.
fn push_line(buf: &mut Vec<u8>, text: &str) {
    buf.extend(
        text.bytes()
            .map(|b| if b == b'\r' || b == b'\n' { b' ' } else { b }),
    );
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "\"{}\"", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(data) => write!(f, "\"{}\"", String::from_utf8_lossy(data)),
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_serialize() {
        assert_eq!(RespValue::ok().serialize(), b"+OK\r\n");
    }

    #[test]
    fn test_line_breaks_in_error_and_status_text_are_flattened() {
        let value = RespValue::error_reply("unknown command 'FOO\r\n:66'");
        assert_eq!(value.serialize(), b"-ERR unknown command 'FOO  :66'\r\n");

        let value = RespValue::simple_string("a\nb\rc");
        assert_eq!(value.serialize(), b"+a b c\r\n");
    }

    #[test]
    fn test_error_reply_serialize() {
        let value = RespValue::error_reply("unknown command 'FOO'");
        assert_eq!(value.serialize(), b"-ERR unknown command 'FOO'\r\n");
    }

    #[test]
    fn test_integer_serialize() {
        assert_eq!(RespValue::integer(11).serialize(), b":11\r\n");
        assert_eq!(RespValue::integer(-1).serialize(), b":-1\r\n");
    }

    #[test]
    fn test_bulk_string_serialize() {
        let value = RespValue::bulk_string("bar");
        assert_eq!(value.serialize(), b"$3\r\nbar\r\n");
    }

    #[test]
    fn test_bulk_string_length_counts_bytes() {
        // "héllo" is 5 characters but 6 bytes
        let value = RespValue::bulk_string("h\u{e9}llo");
        assert_eq!(value.serialize(), "$6\r\nh\u{e9}llo\r\n".as_bytes());
    }

    #[test]
    fn test_empty_bulk_string_serialize() {
        assert_eq!(RespValue::bulk_string("").serialize(), b"$0\r\n\r\n");
    }

    #[test]
    fn test_null_serialize() {
        assert_eq!(RespValue::null().serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_array_serialize() {
        let value = RespValue::array(vec![
            RespValue::bulk_string("GET"),
            RespValue::bulk_string("foo"),
        ]);
        assert_eq!(value.serialize(), b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n");
    }

    #[test]
    fn test_serialize_into_appends() {
        let mut buf = Vec::new();
        RespValue::ok().serialize_into(&mut buf);
        RespValue::integer(2).serialize_into(&mut buf);
        assert_eq!(buf, b"+OK\r\n:2\r\n");
    }

    #[test]
    fn test_display() {
        let value = RespValue::array(vec![RespValue::bulk_string("SET"), RespValue::integer(1)]);
        assert_eq!(value.to_string(), "[\"SET\", (integer) 1]");
        assert_eq!(RespValue::null().to_string(), "(nil)");
    }
}
