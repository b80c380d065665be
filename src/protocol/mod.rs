//! RESP Protocol
//!
//! - `types`: the `RespValue` frame and its wire serialization (the reply encoder)
//! - `parser`: incremental decoder for client input
//!
//! ## Example
//!
//! ```
//! use emberkv::protocol::{parse_message, RespValue};
//!
//! let data = b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n";
//! let (value, consumed) = parse_message(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//! assert!(matches!(value, RespValue::Array(_)));
//!
//! assert_eq!(RespValue::bulk_string("bar").serialize(), b"$3\r\nbar\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
