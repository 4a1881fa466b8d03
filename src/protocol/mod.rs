//! RESP Wire Format
//!
//! - `parser`: decodes request bytes into commands (`Vec<Bytes>`)
//! - `types`: the `RespValue` reply type and its encoder
//!
//! ## Example
//!
//! ```
//! use nimbuskv::protocol::{parse_command, RespValue};
//!
//! let (command, _) = parse_command(b"*1\r\n$4\r\nPING\r\n").unwrap().unwrap();
//! assert_eq!(command, vec!["PING"]);
//!
//! let reply = RespValue::bulk_string("PONG");
//! assert_eq!(reply.serialize(), b"$4\r\nPONG\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_command, Command, ParseError, ParseResult, RespParser};
pub use types::RespValue;
