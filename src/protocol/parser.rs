//! Incremental Request Decoder
//!
//! Turns raw socket bytes into commands: ordered lists of byte-string tokens
//! where token 0 is the command name.
//!
//! Two framings are accepted:
//!
//! - Multibulk: `*<n>\r\n` followed by `n` bulk strings `$<len>\r\n<data>\r\n`.
//!   This is what every client library sends.
//! - Inline: a single whitespace-separated line ending in CRLF, as typed into
//!   a telnet session.
//!
//! `parse` returns:
//! - `Ok(Some((command, consumed)))` - one full command, `consumed` bytes used
//! - `Ok(None)` - the buffer holds a partial command, read more
//! - `Err(ParseError)` - the stream is malformed and cannot be resynchronized
//!
//! A partial multibulk is remembered between calls: the tokens already
//! decoded and the offset of the next one. Each byte of a large request is
//! therefore decoded and copied once, however many reads it arrives in.

use crate::protocol::types::{prefix, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while decoding a request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Length or count line is not a decimal integer
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Bulk string length is negative
    #[error("invalid bulk length: {0}")]
    InvalidBulkLength(i64),

    /// Multibulk count is negative
    #[error("invalid multibulk length: {0}")]
    InvalidArrayLength(i64),

    /// Array element is not a bulk string
    #[error("expected '$', got '{}'", char::from(*.0))]
    UnexpectedPrefix(u8),

    /// Framing violation (missing CRLF, etc.)
    #[error("{0}")]
    ProtocolError(String),

    /// The bulk payload exceeds the maximum allowed size
    #[error("bulk too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for decoding operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of tokens in one multibulk request
pub const MAX_MULTIBULK_LEN: usize = 1024 * 1024;

/// Longest accepted inline request, CRLF excluded (64 KB)
pub const MAX_INLINE_LEN: usize = 64 * 1024;

/// Longest accepted `*<n>` / `$<n>` header payload
const MAX_LENGTH_LINE: usize = 32;

/// A decoded command: name followed by its arguments.
pub type Command = Vec<Bytes>;

/// A multibulk whose tokens have not all arrived yet.
#[derive(Debug)]
struct PendingArray {
    /// Tokens still to decode
    remaining: usize,
    tokens: Command,
    /// Offset of the next token from the start of the frame
    offset: usize,
}

/// Incremental RESP request decoder.
///
/// Between a call that returned `Ok(None)` and the next call, the caller may
/// only append to the buffer; the front of the frame must stay in place.
///
/// # Example
///
/// ```
/// use nimbuskv::protocol::RespParser;
///
/// let mut parser = RespParser::new();
/// assert!(parser.parse(b"*2\r\n$3\r\nGET\r\n").unwrap().is_none());
///
/// let (command, consumed) = parser
///     .parse(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n")
///     .unwrap()
///     .unwrap();
/// assert_eq!(command, vec!["GET", "foo"]);
/// assert_eq!(consumed, 22);
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    pending: Option<PendingArray>,
}

impl RespParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to decode one command from the front of `buf`.
    ///
    /// After an error the partial state is discarded.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
        if self.pending.is_some() {
            return self.parse_multibulk(buf);
        }

        match buf.first() {
            None => Ok(None),
            Some(&prefix::ARRAY) => self.parse_multibulk(buf),
            Some(_) => parse_inline(buf),
        }
    }

    /// `*<count>\r\n` then `count` bulk strings.
    fn parse_multibulk(&mut self, buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
        let mut pending = match self.pending.take() {
            Some(pending) => pending,
            None => {
                let (count, consumed) = match read_length_line(buf)? {
                    Some(header) => header,
                    None => return Ok(None),
                };

                // A null or empty multibulk carries no command.
                if count <= 0 {
                    if count < -1 {
                        return Err(ParseError::InvalidArrayLength(count));
                    }
                    return Ok(Some((Vec::new(), consumed)));
                }

                let count = count as usize;
                if count > MAX_MULTIBULK_LEN {
                    return Err(ParseError::ProtocolError(format!(
                        "invalid multibulk length: {}",
                        count
                    )));
                }

                PendingArray {
                    remaining: count,
                    // Cap the up-front allocation; a lying header should not reserve gigabytes.
                    tokens: Vec::with_capacity(count.min(64)),
                    offset: consumed,
                }
            }
        };

        while pending.remaining > 0 {
            let Some(rest) = buf.get(pending.offset..) else {
                return Err(ParseError::ProtocolError(
                    "buffer shrank under a partial command".to_string(),
                ));
            };
            match parse_bulk(rest)? {
                Some((token, used)) => {
                    pending.tokens.push(token);
                    pending.offset += used;
                    pending.remaining -= 1;
                }
                None => {
                    self.pending = Some(pending);
                    return Ok(None);
                }
            }
        }

        Ok(Some((pending.tokens, pending.offset)))
    }

    /// Tokens of the partial multibulk decoded so far.
    pub fn pending_tokens(&self) -> usize {
        self.pending.as_ref().map_or(0, |p| p.tokens.len())
    }
}

/// `$<length>\r\n<data>\r\n`
fn parse_bulk(buf: &[u8]) -> ParseResult<Option<(Bytes, usize)>> {
    match buf.first() {
        None => return Ok(None),
        Some(&prefix::BULK_STRING) => {}
        Some(&other) => return Err(ParseError::UnexpectedPrefix(other)),
    }

    let (length, data_start) = match read_length_line(buf)? {
        Some(header) => header,
        None => return Ok(None),
    };

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

    let total = data_start + length + CRLF.len();
    if buf.len() < total {
        return Ok(None);
    }

    if &buf[data_start + length..total] != CRLF {
        return Err(ParseError::ProtocolError(
            "bulk string missing trailing CRLF".to_string(),
        ));
    }

    let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
    Ok(Some((data, total)))
}

/// A plain text line split on ASCII whitespace.
fn parse_inline(buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
    let window = &buf[..buf.len().min(MAX_INLINE_LEN + CRLF.len())];
    let end = match find_crlf(window) {
        Some(pos) => pos,
        None if buf.len() > MAX_INLINE_LEN => {
            return Err(ParseError::ProtocolError(
                "too big inline request".to_string(),
            ))
        }
        None => return Ok(None),
    };

    let tokens = buf[..end]
        .split(|b| b.is_ascii_whitespace())
        .filter(|part| !part.is_empty())
        .map(Bytes::copy_from_slice)
        .collect();

    Ok(Some((tokens, end + CRLF.len())))
}

/// Reads a `<prefix><integer>\r\n` header line.
///
/// Returns the integer and the number of bytes the line occupies.
fn read_length_line(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let limit = 1 + MAX_LENGTH_LINE + CRLF.len();
    let end = match find_crlf(&buf[1..buf.len().min(limit)]) {
        Some(pos) => pos + 1,
        None if buf.len() >= limit => {
            return Err(ParseError::ProtocolError(
                "length header too long".to_string(),
            ))
        }
        None => return Ok(None),
    };

    let digits = std::str::from_utf8(&buf[1..end])
        .map_err(|_| ParseError::InvalidInteger(String::from_utf8_lossy(&buf[1..end]).into()))?;
    let n = digits
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidInteger(digits.to_string()))?;

    Ok(Some((n, end + CRLF.len())))
}

/// Position of the first `\r\n`, pointing at the `\r`.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Decodes one command with a throwaway parser.
pub fn parse_command(buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
    RespParser::new().parse(buf)
}
