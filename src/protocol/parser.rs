//! Incremental RESP Parser
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((value, consumed)))` - a complete frame, `consumed` bytes were used
//! - `Ok(None)` - the frame is incomplete, wait for more data
//! - `Err(ParseError)` - the bytes are not valid RESP
//!
//! The connection layer appends socket data to a buffer, drains every complete
//! frame, and keeps the incomplete tail for the next read. A `ParseError` is a
//! protocol error: the client receives an error reply and the session goes on.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// Malformed framing from a client.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Invalid integer in a length or integer line
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a header, simple string or inline command
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for nil)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for nil)
    #[error("invalid multibulk length: {0}")]
    InvalidArrayLength(i64),

    /// Structural violation (missing CRLF, empty inline line, ...)
    #[error("{0}")]
    ProtocolError(String),

    /// A well-formed frame that is not a command (not an array of bulk strings)
    #[error("expected a non-empty array of bulk strings, got {0}")]
    InvalidCommand(&'static str),

    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth
pub const MAX_NESTING_DEPTH: usize = 32;

/// An incremental RESP parser.
///
/// # Example
///
/// ```
/// use memkv::protocol::{RespParser, RespValue};
///
/// let mut parser = RespParser::new();
/// let (value, consumed) = parser
///     .parse(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n")
///     .unwrap()
///     .unwrap();
/// assert_eq!(consumed, 22);
/// assert_eq!(value.as_array().map(|a| a.len()), Some(2));
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    depth: usize,
}

impl RespParser {
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Attempts to parse one frame from the front of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.depth = 0;
        self.parse_value(buf)
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
            prefix::SIMPLE_STRING => self.parse_line(buf, |s| RespValue::SimpleString(s.to_string())),
            prefix::ERROR => self.parse_line(buf, |s| RespValue::Error(s.to_string())),
            prefix::INTEGER => self.parse_integer(buf),
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf),
            _ => self.parse_inline(buf),
        }
    }

    /// Parses a `+...` or `-...` line.
    fn parse_line(
        &mut self,
        buf: &[u8],
        build: impl FnOnce(&str) -> RespValue,
    ) -> ParseResult<Option<(RespValue, usize)>> {
        match find_crlf(&buf[1..]) {
            Some(pos) => {
                let s = utf8(&buf[1..1 + pos])?;
                Ok(Some((build(s), 1 + pos + 2)))
            }
            None => Ok(None),
        }
    }

    /// Parses an integer: `:<integer>\r\n`
    fn parse_integer(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        match read_header(buf)? {
            Some((n, consumed)) => Ok(Some((RespValue::Integer(n), consumed))),
            None => Ok(None),
        }
    }

    /// Parses a bulk string: `$<length>\r\n<data>\r\n`
    fn parse_bulk_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let (length, data_start) = match read_header(buf)? {
            Some(header) => header,
            None => return Ok(None),
        };

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

    /// Parses an array: `*<count>\r\n<elements...>`
    fn parse_array(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let (count, mut consumed) = match read_header(buf)? {
            Some(header) => header,
            None => return Ok(None),
        };

        if count == -1 {
            return Ok(Some((RespValue::Null, consumed)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        // Never trust the declared count for the allocation size.
        let mut elements = Vec::with_capacity(count.min(1024));

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

    /// Parses an inline command such as `PING\r\n` or `GET foo\r\n`.
    fn parse_inline(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let crlf_pos = match find_crlf(buf) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let line = utf8(&buf[..crlf_pos])?;
        let elements: Vec<RespValue> = line
            .split_whitespace()
            .map(|s| RespValue::BulkString(Bytes::copy_from_slice(s.as_bytes())))
            .collect();

        if elements.is_empty() {
            return Err(ParseError::ProtocolError("empty inline command".to_string()));
        }

        Ok(Some((RespValue::Array(elements), crlf_pos + 2)))
    }
}

/// Reads a `<prefix><integer>\r\n` header and returns the integer together
/// with the number of header bytes.
fn read_header(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let n: i64 = utf8(&buf[1..1 + end])?
        .parse()
        .map_err(|e: ParseIntError| ParseError::InvalidInteger(e.to_string()))?;

    Ok(Some((n, 1 + end + 2)))
}

fn utf8(bytes: &[u8]) -> ParseResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| ParseError::InvalidUtf8(e.to_string()))
}

/// Returns the position of the first `\r\n`, if any.
#[inline]
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Parses a single RESP message with a fresh parser.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_complete(input: &[u8]) -> RespValue {
        let (value, consumed) = parse_message(input).unwrap().unwrap();
        assert_eq!(consumed, input.len());
        value
    }

    #[test]
    fn test_parse_simple_string() {
        assert_eq!(parse_complete(b"+OK\r\n"), RespValue::simple_string("OK"));
    }

    #[test]
    fn test_parse_simple_string_incomplete() {
        assert_eq!(parse_message(b"+OK").unwrap(), None);
    }

    #[test]
    fn test_parse_error_line() {
        assert_eq!(
            parse_complete(b"-ERR boom\r\n"),
            RespValue::Error("ERR boom".to_string())
        );
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_complete(b":-42\r\n"), RespValue::Integer(-42));
    }

    #[test]
    fn test_parse_bulk_string() {
        assert_eq!(
            parse_complete(b"$3\r\nbar\r\n"),
            RespValue::bulk_string(Bytes::from("bar"))
        );
        assert_eq!(
            parse_complete(b"$0\r\n\r\n"),
            RespValue::bulk_string(Bytes::new())
        );
        assert_eq!(parse_complete(b"$-1\r\n"), RespValue::Null);
    }

    #[test]
    fn test_parse_bulk_string_incomplete() {
        assert_eq!(parse_message(b"$5\r\nhel").unwrap(), None);
        assert_eq!(parse_message(b"$5").unwrap(), None);
    }

    #[test]
    fn test_parse_bulk_string_bad_terminator() {
        let result = parse_message(b"$3\r\nbarXY");
        assert!(matches!(result, Err(ParseError::ProtocolError(_))));
    }

    #[test]
    fn test_parse_negative_bulk_length() {
        let result = parse_message(b"$-2\r\n");
        assert_eq!(result, Err(ParseError::InvalidBulkLength(-2)));
    }

    #[test]
    fn test_parse_command_array() {
        let value = parse_complete(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::bulk_string(Bytes::from("SET")),
                RespValue::bulk_string(Bytes::from("foo")),
                RespValue::bulk_string(Bytes::from("bar")),
            ])
        );
    }

    #[test]
    fn test_parse_array_incomplete() {
        assert_eq!(parse_message(b"*2\r\n$3\r\nGET\r\n").unwrap(), None);
        assert_eq!(parse_message(b"*2\r\n$3\r\nGET\r\n$3\r\nfo").unwrap(), None);
    }

    #[test]
    fn test_parse_huge_declared_count_is_incomplete() {
        assert_eq!(parse_message(b"*1000000000\r\n").unwrap(), None);
    }

    #[test]
    fn test_parse_nesting_limit() {
        let input = "*1\r\n".repeat(MAX_NESTING_DEPTH + 2);
        let result = parse_message(input.as_bytes());
        assert!(matches!(result, Err(ParseError::ProtocolError(_))));
    }

    #[test]
    fn test_parse_inline_command() {
        let value = parse_complete(b"SADD  colors red\r\n");
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::bulk_string(Bytes::from("SADD")),
                RespValue::bulk_string(Bytes::from("colors")),
                RespValue::bulk_string(Bytes::from("red")),
            ])
        );
    }

    #[test]
    fn test_parse_empty_inline_is_error() {
        assert!(parse_message(b"   \r\n").is_err());
    }

    #[test]
    fn test_parse_invalid_integer() {
        let result = parse_message(b"*x\r\n");
        assert!(matches!(result, Err(ParseError::InvalidInteger(_))));
    }

    #[test]
    fn test_parse_consumes_only_first_frame() {
        let input = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";
        let (_, consumed) = parse_message(input).unwrap().unwrap();
        assert_eq!(consumed, 14);
    }

    #[test]
    fn test_binary_safe_bulk_string() {
        let value = parse_complete(b"$5\r\na\r\n\0b\r\n");
        assert_eq!(value.as_bytes(), Some(&b"a\r\n\0b"[..]));
    }
}
