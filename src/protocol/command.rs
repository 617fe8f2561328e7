//! Parsed client commands.

use crate::protocol::parser::ParseError;
use crate::protocol::types::RespValue;
use bytes::Bytes;
use std::fmt;

/// One command as handed to the dispatcher: the argument list (index 0 is
/// the command name) plus the pipeline marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
    is_last: bool,
}

impl Command {
    /// Builds a command from raw arguments. `args` must not be empty.
    pub fn new(args: Vec<Bytes>) -> Self {
        debug_assert!(!args.is_empty(), "a command needs at least its name");
        Self {
            args,
            is_last: true,
        }
    }

    /// Converts a decoded frame into a command.
    ///
    /// Only a non-empty array of bulk strings is a command; any other frame
    /// is a protocol error.
    pub fn from_frame(frame: RespValue) -> Result<Self, ParseError> {
        let items = match frame {
            RespValue::Array(items) if !items.is_empty() => items,
            RespValue::Array(_) => return Err(ParseError::InvalidCommand("an empty array")),
            RespValue::Null => return Err(ParseError::InvalidCommand("a nil value")),
            RespValue::SimpleString(_) => {
                return Err(ParseError::InvalidCommand("a simple string"))
            }
            RespValue::Error(_) => return Err(ParseError::InvalidCommand("an error")),
            RespValue::Integer(_) => return Err(ParseError::InvalidCommand("an integer")),
            RespValue::BulkString(_) => {
                return Err(ParseError::InvalidCommand("a bare bulk string"))
            }
        };

        let args = items
            .into_iter()
            .map(|item| match item {
                RespValue::BulkString(b) => Ok(b),
                _ => Err(ParseError::InvalidCommand("a non-bulk array element")),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(args))
    }

    /// Sets the marker telling the connection to flush after this command.
    pub fn with_last(mut self, is_last: bool) -> Self {
        self.is_last = is_last;
        self
    }

    /// True when no further complete command is buffered behind this one.
    pub fn is_last(&self) -> bool {
        self.is_last
    }

    /// The command name, uppercased.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.args[0]).to_ascii_uppercase()
    }

    /// Returns the argument at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.arg_count()`; handlers check arity first.
    pub fn arg(&self, index: usize) -> &Bytes {
        &self.args[index]
    }

    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.args.get(index)
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Arguments from `start` to the end.
    pub fn args_from(&self, start: usize) -> &[Bytes] {
        self.args.get(start..).unwrap_or(&[])
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(&String::from_utf8_lossy(arg))?;
        }
        Ok(())
    }
}
