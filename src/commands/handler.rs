//! Command Handler Module
//!
//! Maps a parsed [`Command`] onto the storage engine and shapes the reply.
//!
//! ## Supported Commands
//!
//! ### Keys
//! - `PING [message]` - Test connection
//! - `DEL key` - Delete a key of any type (1 if it existed)
//! - `EXISTS key` - 1 if the key exists
//! - `TYPE key` - "string", "list", "set" or "none"
//! - `KEYS [pattern]` - Keys matching a LIKE pattern (`%`, `_`)
//! - `FLUSHALL` - Remove every key
//!
//! ### Blobs
//! - `SET key value` - Store a blob
//! - `GET key` - Fetch a blob (nil if absent or not a blob)
//! - `INCRBY key delta` - Add to a decimal counter
//!
//! ### Lists
//! - `RPUSH key value` - Append at the tail
//! - `LREM key value` - Remove every occurrence
//! - `LRANGE key start stop` - Inclusive range, negative indices allowed
//!
//! ### Sets
//! - `SADD key member` / `SREM key member`
//! - `SMEMBERS key` / `SCARD key`
//! - `SUNION key key [key ...]`
//! - `SINTER key key [key ...]` / `SINTERCARD key key [key ...]`
//! - `SWITHMEMBER member` - Keys of every set containing the member
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  lookup()   │───>│ check arity │───>│  execute()  │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      StorageEngine          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::{Command, RespValue};
use crate::storage::{StorageEngine, StorageError, MATCH_ALL};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// A failed command. The connection replies with it and then closes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    /// A numeric argument (INCRBY delta, LRANGE index) did not parse
    #[error("value is not an integer or out of range")]
    InvalidInteger,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CommandError {
    /// The error reply sent to the client.
    pub fn to_reply(&self) -> RespValue {
        RespValue::error(format!("ERR {}", self))
    }
}

/// Every command the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Ping,
    Set,
    Get,
    IncrBy,
    Del,
    FlushAll,
    Keys,
    Exists,
    Type,
    RPush,
    LRem,
    LRange,
    SAdd,
    SRem,
    SMembers,
    SUnion,
    SInter,
    SInterCard,
    SWithMember,
    SCard,
}

impl CommandKind {
    pub const ALL: [CommandKind; 20] = [
        CommandKind::Ping,
        CommandKind::Set,
        CommandKind::Get,
        CommandKind::IncrBy,
        CommandKind::Del,
        CommandKind::FlushAll,
        CommandKind::Keys,
        CommandKind::Exists,
        CommandKind::Type,
        CommandKind::RPush,
        CommandKind::LRem,
        CommandKind::LRange,
        CommandKind::SAdd,
        CommandKind::SRem,
        CommandKind::SMembers,
        CommandKind::SUnion,
        CommandKind::SInter,
        CommandKind::SInterCard,
        CommandKind::SWithMember,
        CommandKind::SCard,
    ];

    /// Finds the command for a name, ignoring ASCII case.
    pub fn lookup(name: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().as_bytes().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Ping => "PING",
            CommandKind::Set => "SET",
            CommandKind::Get => "GET",
            CommandKind::IncrBy => "INCRBY",
            CommandKind::Del => "DEL",
            CommandKind::FlushAll => "FLUSHALL",
            CommandKind::Keys => "KEYS",
            CommandKind::Exists => "EXISTS",
            CommandKind::Type => "TYPE",
            CommandKind::RPush => "RPUSH",
            CommandKind::LRem => "LREM",
            CommandKind::LRange => "LRANGE",
            CommandKind::SAdd => "SADD",
            CommandKind::SRem => "SREM",
            CommandKind::SMembers => "SMEMBERS",
            CommandKind::SUnion => "SUNION",
            CommandKind::SInter => "SINTER",
            CommandKind::SInterCard => "SINTERCARD",
            CommandKind::SWithMember => "SWITHMEMBER",
            CommandKind::SCard => "SCARD",
        }
    }

    /// Allowed argument counts, command name included: `(min, max)`.
    fn arity(self) -> (usize, Option<usize>) {
        match self {
            CommandKind::Ping | CommandKind::Keys => (1, Some(2)),
            CommandKind::FlushAll => (1, Some(1)),
            CommandKind::Get
            | CommandKind::Del
            | CommandKind::Exists
            | CommandKind::Type
            | CommandKind::SMembers
            | CommandKind::SWithMember
            | CommandKind::SCard => (2, Some(2)),
            CommandKind::Set
            | CommandKind::IncrBy
            | CommandKind::RPush
            | CommandKind::LRem
            | CommandKind::SAdd
            | CommandKind::SRem => (3, Some(3)),
            CommandKind::LRange => (4, Some(4)),
            CommandKind::SUnion | CommandKind::SInter | CommandKind::SInterCard => (3, None),
        }
    }

    fn check_arity(self, command: &Command) -> Result<(), CommandError> {
        let (min, max) = self.arity();
        let count = command.arg_count();
        if count < min || max.is_some_and(|max| count > max) {
            return Err(CommandError::WrongArity(self.name()));
        }
        Ok(())
    }
}

/// Executes commands against the shared storage engine.
///
/// Cheap to clone; every connection gets its own copy.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// The reply for a name that matches no [`CommandKind`].
    pub fn unsupported(command: &Command) -> RespValue {
        RespValue::error(format!("ERR unsupported command '{}'", command.name()))
    }

    /// Runs one command and returns the reply to send.
    ///
    /// An `Err` is an application-level failure: the caller reports it and
    /// ends the session.
    pub fn execute(&self, kind: CommandKind, command: &Command) -> Result<RespValue, CommandError> {
        kind.check_arity(command)?;

        match kind {
            CommandKind::Ping => Ok(self.cmd_ping(command)),
            CommandKind::Set => self.cmd_set(command),
            CommandKind::Get => self.cmd_get(command),
            CommandKind::IncrBy => self.cmd_incrby(command),
            CommandKind::Del => self.cmd_del(command),
            CommandKind::FlushAll => self.cmd_flushall(),
            CommandKind::Keys => self.cmd_keys(command),
            CommandKind::Exists => self.cmd_exists(command),
            CommandKind::Type => self.cmd_type(command),
            CommandKind::RPush => self.cmd_rpush(command),
            CommandKind::LRem => self.cmd_lrem(command),
            CommandKind::LRange => self.cmd_lrange(command),
            CommandKind::SAdd => self.cmd_sadd(command),
            CommandKind::SRem => self.cmd_srem(command),
            CommandKind::SMembers => self.cmd_smembers(command),
            CommandKind::SUnion => self.cmd_sunion(command),
            CommandKind::SInter => self.cmd_sinter(command),
            CommandKind::SInterCard => self.cmd_sintercard(command),
            CommandKind::SWithMember => self.cmd_swithmember(command),
            CommandKind::SCard => self.cmd_scard(command),
        }
    }

    // ========================================================================
    // Key commands
    // ========================================================================

    /// PING [message]
    fn cmd_ping(&self, command: &Command) -> RespValue {
        match command.get(1) {
            Some(message) => RespValue::bulk_string(message.clone()),
            None => RespValue::pong(),
        }
    }

    /// DEL key
    fn cmd_del(&self, command: &Command) -> Result<RespValue, CommandError> {
        let existed = self.storage.key_delete(command.arg(1))?;
        Ok(RespValue::boolean(existed))
    }

    /// EXISTS key
    fn cmd_exists(&self, command: &Command) -> Result<RespValue, CommandError> {
        let exists = self.storage.key_exists(command.arg(1))?;
        Ok(RespValue::boolean(exists))
    }

    /// TYPE key
    fn cmd_type(&self, command: &Command) -> Result<RespValue, CommandError> {
        let type_name = self.storage.key_type(command.arg(1))?;
        Ok(RespValue::simple_string(type_name.unwrap_or("none")))
    }

    /// KEYS [pattern]
    ///
    /// A missing or empty pattern lists every key.
    fn cmd_keys(&self, command: &Command) -> Result<RespValue, CommandError> {
        let pattern: &[u8] = match command.get(1) {
            Some(pattern) if !pattern.is_empty() => &pattern[..],
            _ => MATCH_ALL,
        };
        Ok(RespValue::bulk_array(self.storage.keys(pattern)?))
    }

    /// FLUSHALL
    fn cmd_flushall(&self) -> Result<RespValue, CommandError> {
        self.storage.flush_all()?;
        Ok(RespValue::ok())
    }

    // ========================================================================
    // Blob commands
    // ========================================================================

    /// SET key value
    fn cmd_set(&self, command: &Command) -> Result<RespValue, CommandError> {
        self.storage
            .blob_set(command.arg(1).clone(), command.arg(2).clone())?;
        Ok(RespValue::ok())
    }

    /// GET key
    fn cmd_get(&self, command: &Command) -> Result<RespValue, CommandError> {
        let value = self.storage.blob_get(command.arg(1))?;
        Ok(RespValue::optional_bulk(value))
    }

    /// INCRBY key delta
    fn cmd_incrby(&self, command: &Command) -> Result<RespValue, CommandError> {
        let delta = parse_integer(command.arg(2))?;
        let value = self.storage.incr_by(command.arg(1), delta)?;
        Ok(RespValue::integer(value))
    }

    // ========================================================================
    // List commands
    // ========================================================================

    /// RPUSH key value
    fn cmd_rpush(&self, command: &Command) -> Result<RespValue, CommandError> {
        self.storage
            .list_append(command.arg(1).clone(), command.arg(2).clone())?;
        Ok(RespValue::ok())
    }

    /// LREM key value
    fn cmd_lrem(&self, command: &Command) -> Result<RespValue, CommandError> {
        let removed = self.storage.list_remove(command.arg(1), command.arg(2))?;
        Ok(RespValue::integer(removed as i64))
    }

    /// LRANGE key start stop
    fn cmd_lrange(&self, command: &Command) -> Result<RespValue, CommandError> {
        let key = command.arg(1);
        let start = parse_integer(command.arg(2))?;
        let stop = parse_integer(command.arg(3))?;

        let elements = if start == 0 && stop == -1 {
            self.storage.list_get(key)?
        } else {
            self.storage.list_range(key, start, stop)?
        };
        Ok(RespValue::bulk_array(elements))
    }

    // ========================================================================
    // Set commands
    // ========================================================================

    /// SADD key member
    fn cmd_sadd(&self, command: &Command) -> Result<RespValue, CommandError> {
        self.storage
            .set_add(command.arg(1).clone(), command.arg(2).clone())?;
        Ok(RespValue::ok())
    }

    /// SREM key member
    fn cmd_srem(&self, command: &Command) -> Result<RespValue, CommandError> {
        let removed = self.storage.set_remove(command.arg(1), command.arg(2))?;
        Ok(RespValue::boolean(removed))
    }

    /// SMEMBERS key
    fn cmd_smembers(&self, command: &Command) -> Result<RespValue, CommandError> {
        Ok(RespValue::bulk_array(self.storage.set_get(command.arg(1))?))
    }

    /// SCARD key
    fn cmd_scard(&self, command: &Command) -> Result<RespValue, CommandError> {
        let size = self.storage.set_cardinality(command.arg(1))?;
        Ok(RespValue::integer(size as i64))
    }

    /// SUNION key key [key ...]
    fn cmd_sunion(&self, command: &Command) -> Result<RespValue, CommandError> {
        let members = self.storage.set_union(command.args_from(1))?;
        Ok(RespValue::bulk_array(members))
    }

    /// SINTER key key [key ...]
    fn cmd_sinter(&self, command: &Command) -> Result<RespValue, CommandError> {
        let members = self.storage.set_intersect(command.args_from(1))?;
        Ok(RespValue::bulk_array(members))
    }

    /// SINTERCARD key key [key ...]
    fn cmd_sintercard(&self, command: &Command) -> Result<RespValue, CommandError> {
        let size = self
            .storage
            .set_intersect_cardinality(command.args_from(1))?;
        Ok(RespValue::integer(size as i64))
    }

    /// SWITHMEMBER member
    fn cmd_swithmember(&self, command: &Command) -> Result<RespValue, CommandError> {
        let keys = self.storage.sets_with_member(command.arg(1))?;
        Ok(RespValue::bulk_array(keys))
    }
}

/// Parses a base-10 signed 64-bit integer argument.
fn parse_integer(arg: &Bytes) -> Result<i64, CommandError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::InvalidInteger)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_handler() -> CommandHandler {
        let storage = Arc::new(StorageEngine::new());
        CommandHandler::new(storage)
    }

    fn make_command(args: &[&str]) -> Command {
        Command::new(args.iter().map(|s| Bytes::from(s.to_string())).collect())
    }

    /// Looks the command up and executes it, panicking on unknown names.
    fn run(handler: &CommandHandler, args: &[&str]) -> Result<RespValue, CommandError> {
        let command = make_command(args);
        let kind = CommandKind::lookup(command.arg(0)).expect("known command");
        handler.execute(kind, &command)
    }

    fn ok(handler: &CommandHandler, args: &[&str]) -> RespValue {
        run(handler, args).unwrap()
    }

    fn bulks(values: &[&str]) -> RespValue {
        RespValue::bulk_array(values.iter().map(|s| Bytes::from(s.to_string())))
    }

    /// Sorts an array reply so unordered results compare deterministically.
    fn sorted(reply: RespValue) -> RespValue {
        match reply {
            RespValue::Array(mut items) => {
                items.sort_by(|a, b| a.as_bytes().cmp(&b.as_bytes()));
                RespValue::Array(items)
            }
            other => other,
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(CommandKind::lookup(b"sintercard"), Some(CommandKind::SInterCard));
        assert_eq!(CommandKind::lookup(b"IncrBy"), Some(CommandKind::IncrBy));
        assert_eq!(CommandKind::lookup(b"HSET"), None);
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::lookup(kind.name().as_bytes()), Some(kind));
        }
    }

    #[test]
    fn test_unsupported_reply() {
        let reply = CommandHandler::unsupported(&make_command(&["hset", "h", "f", "v"]));
        assert_eq!(reply, RespValue::error("ERR unsupported command 'HSET'"));
    }

    #[test]
    fn test_ping() {
        let handler = create_handler();

        assert_eq!(ok(&handler, &["PING"]), RespValue::pong());
        assert_eq!(
            ok(&handler, &["PING", "hello"]),
            RespValue::bulk_string(Bytes::from("hello"))
        );
    }

    #[test]
    fn test_set_get() {
        let handler = create_handler();

        assert_eq!(ok(&handler, &["SET", "foo", "bar"]), RespValue::ok());
        assert_eq!(
            ok(&handler, &["GET", "foo"]),
            RespValue::bulk_string(Bytes::from("bar"))
        );
    }

    #[test]
    fn test_get_nonexistent() {
        let handler = create_handler();
        assert_eq!(ok(&handler, &["GET", "nonexistent"]), RespValue::null());
    }

    #[test]
    fn test_del() {
        let handler = create_handler();

        ok(&handler, &["SET", "key", "value"]);
        assert_eq!(
            ok(&handler, &["GET", "key"]),
            RespValue::bulk_string(Bytes::from("value"))
        );
        assert_eq!(ok(&handler, &["DEL", "key"]), RespValue::integer(1));
        assert_eq!(ok(&handler, &["GET", "key"]), RespValue::null());
        assert_eq!(ok(&handler, &["DEL", "key"]), RespValue::integer(0));
    }

    #[test]
    fn test_exists() {
        let handler = create_handler();

        assert_eq!(ok(&handler, &["EXISTS", "key"]), RespValue::integer(0));
        ok(&handler, &["SET", "key", "value"]);
        assert_eq!(ok(&handler, &["EXISTS", "key"]), RespValue::integer(1));
    }

    #[test]
    fn test_type() {
        let handler = create_handler();

        ok(&handler, &["SET", "b", "v"]);
        ok(&handler, &["RPUSH", "l", "v"]);
        ok(&handler, &["SADD", "s", "v"]);

        assert_eq!(ok(&handler, &["TYPE", "b"]), RespValue::simple_string("string"));
        assert_eq!(ok(&handler, &["TYPE", "l"]), RespValue::simple_string("list"));
        assert_eq!(ok(&handler, &["TYPE", "s"]), RespValue::simple_string("set"));
        assert_eq!(ok(&handler, &["TYPE", "x"]), RespValue::simple_string("none"));
    }

    #[test]
    fn test_flushall() {
        let handler = create_handler();

        ok(&handler, &["SET", "key", "value"]);
        ok(&handler, &["RPUSH", "list", "a"]);
        ok(&handler, &["SADD", "set", "m"]);

        assert_eq!(ok(&handler, &["FLUSHALL"]), RespValue::ok());
        assert_eq!(ok(&handler, &["GET", "key"]), RespValue::null());
        assert_eq!(ok(&handler, &["LRANGE", "list", "0", "-1"]), bulks(&[]));
        assert_eq!(ok(&handler, &["SCARD", "set"]), RespValue::integer(0));
        assert_eq!(ok(&handler, &["SWITHMEMBER", "m"]), bulks(&[]));
    }

    #[test]
    fn test_keys() {
        let handler = create_handler();

        ok(&handler, &["SET", "key", "value"]);
        ok(&handler, &["SET", "foo", "bar"]);

        assert_eq!(sorted(ok(&handler, &["KEYS", ""])), bulks(&["foo", "key"]));
        assert_eq!(sorted(ok(&handler, &["KEYS"])), bulks(&["foo", "key"]));
        assert_eq!(ok(&handler, &["KEYS", "f%"]), bulks(&["foo"]));
        assert_eq!(ok(&handler, &["KEYS", "k_y"]), bulks(&["key"]));
    }

    #[test]
    fn test_incrby_sequence() {
        let handler = create_handler();

        assert_eq!(ok(&handler, &["INCRBY", "n", "0"]), RespValue::integer(0));
        assert_eq!(
            ok(&handler, &["GET", "n"]),
            RespValue::bulk_string(Bytes::from("0"))
        );
        assert_eq!(ok(&handler, &["INCRBY", "n", "1"]), RespValue::integer(1));
        assert_eq!(ok(&handler, &["INCRBY", "n", "10"]), RespValue::integer(11));
        assert_eq!(ok(&handler, &["INCRBY", "n", "-5"]), RespValue::integer(6));
    }

    #[test]
    fn test_incrby_errors() {
        let handler = create_handler();

        assert_eq!(
            run(&handler, &["INCRBY", "n", "ten"]),
            Err(CommandError::InvalidInteger)
        );

        ok(&handler, &["SET", "word", "hello"]);
        let err = run(&handler, &["INCRBY", "word", "1"]).unwrap_err();
        assert_eq!(err, CommandError::Storage(StorageError::NotAnInteger));
        assert_eq!(
            err.to_reply(),
            RespValue::error("ERR value is not an integer or out of range")
        );
    }

    #[test]
    fn test_rpush_lrange() {
        let handler = create_handler();

        assert_eq!(ok(&handler, &["RPUSH", "foo", "bar"]), RespValue::ok());
        assert_eq!(ok(&handler, &["RPUSH", "foo", "baz"]), RespValue::ok());
        assert_eq!(
            ok(&handler, &["LRANGE", "foo", "0", "-1"]),
            bulks(&["bar", "baz"])
        );
        assert_eq!(ok(&handler, &["LRANGE", "foo", "0", "0"]), bulks(&["bar"]));
        assert_eq!(
            ok(&handler, &["LRANGE", "foo", "0", "99"]),
            bulks(&["bar", "baz"])
        );

        ok(&handler, &["RPUSH", "foo", "baz"]);
        assert_eq!(
            ok(&handler, &["LRANGE", "foo", "0", "-1"]),
            bulks(&["bar", "baz", "baz"])
        );
    }

    #[test]
    fn test_lrange_bad_index() {
        let handler = create_handler();
        assert_eq!(
            run(&handler, &["LRANGE", "foo", "zero", "-1"]),
            Err(CommandError::InvalidInteger)
        );
    }

    #[test]
    fn test_lrem() {
        let handler = create_handler();

        ok(&handler, &["RPUSH", "k", "bar"]);
        ok(&handler, &["RPUSH", "k", "baz"]);

        assert_eq!(ok(&handler, &["LREM", "k", "bar"]), RespValue::integer(1));
        assert_eq!(ok(&handler, &["LRANGE", "k", "0", "-1"]), bulks(&["baz"]));

        ok(&handler, &["RPUSH", "k", "baz"]);
        assert_eq!(ok(&handler, &["LREM", "k", "baz"]), RespValue::integer(2));
        assert_eq!(ok(&handler, &["LRANGE", "k", "0", "-1"]), bulks(&[]));
    }

    #[test]
    fn test_sadd_srem_scard() {
        let handler = create_handler();

        assert_eq!(ok(&handler, &["SADD", "s", "m"]), RespValue::ok());
        assert_eq!(ok(&handler, &["SADD", "s", "m"]), RespValue::ok());
        assert_eq!(ok(&handler, &["SCARD", "s"]), RespValue::integer(1));

        assert_eq!(ok(&handler, &["SREM", "s", "other"]), RespValue::integer(0));
        assert_eq!(ok(&handler, &["SMEMBERS", "s"]), bulks(&["m"]));

        assert_eq!(ok(&handler, &["SREM", "s", "m"]), RespValue::integer(1));
        assert_eq!(ok(&handler, &["SMEMBERS", "s"]), bulks(&[]));
    }

    #[test]
    fn test_set_algebra() {
        let handler = create_handler();

        ok(&handler, &["SADD", "s1", "a"]);
        ok(&handler, &["SADD", "s2", "b"]);
        ok(&handler, &["SADD", "s3", "c"]);

        assert_eq!(ok(&handler, &["SINTER", "s1", "s2", "s3"]), bulks(&[]));
        assert_eq!(
            ok(&handler, &["SINTERCARD", "s1", "s2", "s3"]),
            RespValue::integer(0)
        );
        assert_eq!(
            sorted(ok(&handler, &["SUNION", "s1", "s2", "s3"])),
            bulks(&["a", "b", "c"])
        );

        for key in ["s1", "s2", "s3"] {
            ok(&handler, &["SADD", key, "shared"]);
        }

        assert_eq!(ok(&handler, &["SINTER", "s1", "s2", "s3"]), bulks(&["shared"]));
        assert_eq!(
            ok(&handler, &["SINTERCARD", "s1", "s2", "s3"]),
            RespValue::integer(1)
        );
        assert_eq!(
            sorted(ok(&handler, &["SUNION", "s1", "s2", "s3"])),
            bulks(&["a", "b", "c", "shared"])
        );
        assert_eq!(
            sorted(ok(&handler, &["SUNION", "s1", "missing"])),
            sorted(ok(&handler, &["SUNION", "s1", "s1"]))
        );
    }

    #[test]
    fn test_swithmember() {
        let handler = create_handler();

        ok(&handler, &["SADD", "colors", "red"]);
        ok(&handler, &["SADD", "fruits", "red"]);

        assert_eq!(
            sorted(ok(&handler, &["SWITHMEMBER", "red"])),
            bulks(&["colors", "fruits"])
        );

        ok(&handler, &["SREM", "colors", "red"]);
        assert_eq!(ok(&handler, &["SWITHMEMBER", "red"]), bulks(&["fruits"]));

        ok(&handler, &["DEL", "fruits"]);
        assert_eq!(ok(&handler, &["SWITHMEMBER", "red"]), bulks(&[]));
    }

    #[test]
    fn test_get_on_set_is_nil() {
        let handler = create_handler();

        ok(&handler, &["SADD", "s", "m"]);
        assert_eq!(ok(&handler, &["GET", "s"]), RespValue::null());
    }

    #[test]
    fn test_wrong_arity() {
        let handler = create_handler();

        assert_eq!(
            run(&handler, &["GET"]),
            Err(CommandError::WrongArity("GET"))
        );
        assert_eq!(
            run(&handler, &["SET", "k"]),
            Err(CommandError::WrongArity("SET"))
        );
        assert_eq!(
            run(&handler, &["FLUSHALL", "ASYNC"]),
            Err(CommandError::WrongArity("FLUSHALL"))
        );
        assert_eq!(
            run(&handler, &["SINTER", "only-one"]),
            Err(CommandError::WrongArity("SINTER"))
        );
        assert_eq!(
            CommandError::WrongArity("GET").to_reply(),
            RespValue::error("ERR wrong number of arguments for 'GET' command")
        );
    }

    #[test]
    fn test_unsupported_name_with_crlf_is_one_frame() {
        let command = Command::new(vec![Bytes::from_static(b"FOO\r\n+INJECTED")]);
        let wire = CommandHandler::unsupported(&command).serialize();

        let (frame, consumed) = crate::protocol::parse_message(&wire).unwrap().unwrap();
        assert_eq!(consumed, wire.len());
        assert!(frame.is_error());
    }
}
