//! Reply Values and the Response Encoder
//!
//! Every command produces exactly one [`RespValue`]. The encoder turns it into
//! the RESP reply grammar, byte for byte:
//!
//! | Reply          | Wire form                      |
//! |----------------|--------------------------------|
//! | Simple status  | `+OK\r\n`                      |
//! | Error          | `-<message>\r\n`               |
//! | Integer        | `:<n>\r\n`                     |
//! | Bulk           | `$<len>\r\n<payload>\r\n`      |
//! | Nil            | `$-1\r\n`                      |
//! | Array          | `*<k>\r\n<element>...`         |

use bytes::{BufMut, Bytes, BytesMut};

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

/// A reply produced by the command engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Status line without binary payload, e.g. `OK` or a type name.
    SimpleString(String),

    /// Error line. The message already carries its `ERR`/`WRONGTYPE` prefix.
    Error(String),

    /// 64-bit signed integer.
    Integer(i64),

    /// Binary-safe, length-prefixed payload.
    BulkString(Bytes),

    /// Missing value, encoded as the null bulk string.
    Null,

    /// Sequence of replies.
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a bulk reply.
    ///
    /// # Example
    /// ```
    /// use nimbuskv::protocol::RespValue;
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

    /// Builds an array of bulk replies from stored elements.
    pub fn bulk_array(items: impl IntoIterator<Item = Bytes>) -> Self {
        RespValue::Array(items.into_iter().map(RespValue::BulkString).collect())
    }

    /// `+OK`
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Maps an optional stored value to a bulk reply or nil.
    pub fn optional_bulk(value: Option<Bytes>) -> Self {
        match value {
            Some(v) => RespValue::BulkString(v),
            None => RespValue::Null,
        }
    }

    /// Encodes the reply into a fresh buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.to_vec()
    }

    /// Appends the wire encoding of this reply to `buf`.
    ///
    /// Sessions call this once per reply of a batch so the whole batch ends
    /// up in a single buffer and a single write.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => put_line(buf, prefix::SIMPLE_STRING, s.as_bytes()),
            RespValue::Error(s) => put_line(buf, prefix::ERROR, s.as_bytes()),
            RespValue::Integer(n) => put_line(buf, prefix::INTEGER, n.to_string().as_bytes()),
            RespValue::BulkString(data) => {
                put_line(buf, prefix::BULK_STRING, data.len().to_string().as_bytes());
                buf.reserve(data.len() + CRLF.len());
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            RespValue::Null => put_line(buf, prefix::BULK_STRING, b"-1"),
            RespValue::Array(values) => {
                put_line(buf, prefix::ARRAY, values.len().to_string().as_bytes());
                for value in values {
                    value.encode(buf);
                }
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }
}

#[inline]
fn put_line(buf: &mut BytesMut, prefix: u8, body: &[u8]) {
    buf.reserve(1 + body.len() + CRLF.len());
    buf.put_u8(prefix);
    buf.put_slice(body);
    buf.put_slice(CRLF);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_serialize() {
        assert_eq!(RespValue::ok().serialize(), b"+OK\r\n");
    }

    #[test]
    fn test_error_serialize() {
        let value = RespValue::error("ERR syntax error");
        assert_eq!(value.serialize(), b"-ERR syntax error\r\n");
    }

    #[test]
    fn test_integer_serialize() {
        assert_eq!(RespValue::integer(1000).serialize(), b":1000\r\n");
        assert_eq!(RespValue::integer(-42).serialize(), b":-42\r\n");
    }

    #[test]
    fn test_bulk_string_serialize() {
        assert_eq!(RespValue::bulk_string("bar").serialize(), b"$3\r\nbar\r\n");
    }

    #[test]
    fn test_empty_bulk_is_not_nil() {
        assert_eq!(RespValue::bulk_string("").serialize(), b"$0\r\n\r\n");
        assert_eq!(RespValue::null().serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_binary_bulk_serialize() {
        let value = RespValue::bulk_string(Bytes::from_static(b"a\r\n\x00b"));
        assert_eq!(value.serialize(), b"$5\r\na\r\n\x00b\r\n");
    }

    #[test]
    fn test_bulk_array_serialize() {
        let value = RespValue::bulk_array(vec![Bytes::from("b")]);
        assert_eq!(value.serialize(), b"*1\r\n$1\r\nb\r\n");

        let empty = RespValue::bulk_array(Vec::new());
        assert_eq!(empty.serialize(), b"*0\r\n");
    }

    #[test]
    fn test_encode_appends() {
        let mut buf = BytesMut::new();
        RespValue::ok().encode(&mut buf);
        RespValue::integer(2).encode(&mut buf);
        RespValue::null().encode(&mut buf);
        assert_eq!(&buf[..], b"+OK\r\n:2\r\n$-1\r\n");
    }

    #[test]
    fn test_optional_bulk() {
        assert_eq!(RespValue::optional_bulk(None), RespValue::Null);
        assert_eq!(
            RespValue::optional_bulk(Some(Bytes::from("x"))),
            RespValue::bulk_string("x")
        );
    }
}
