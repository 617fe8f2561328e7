//! RESP Protocol Implementation
//!
//! The subset of the Redis Serialization Protocol memkv speaks:
//!
//! - `parser`: incremental decoding of client frames (multibulk and inline)
//! - `command`: the positional [`Command`] view the dispatcher works on
//! - `types`: the [`RespValue`] replies and their serialization
//!
//! ```
//! use memkv::protocol::{parse_message, Command};
//!
//! let (frame, _) = parse_message(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").unwrap().unwrap();
//! let command = Command::from_frame(frame).unwrap();
//! assert_eq!(command.name(), "GET");
//! ```

pub mod command;
pub mod parser;
pub mod types;

pub use command::Command;
pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
