//! # memkv - An In-Memory, Redis-Compatible Key/Value Server
//!
//! memkv speaks the Redis wire protocol (RESP) and stores three kinds of
//! values under binary keys: blobs (which double as decimal counters),
//! append-only lists, and sets. A reverse index from set member to the sets
//! containing it answers "which sets contain X?" without scanning.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                memkv                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │                     ┌─────────────┐   ┌─────────────────────────────┐   │
//! │                     │    RESP     │   │        StorageEngine        │   │
//! │                     │   Parser    │   │  RwLock<entries + index>    │   │
//! │                     └─────────────┘   └─────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### Keys & Blobs
//! - `PING [message]`, `DEL key`, `EXISTS key`, `TYPE key`, `KEYS [pattern]`
//! - `SET key value`, `GET key`, `INCRBY key delta`, `FLUSHALL`
//!
//! ### Lists
//! - `RPUSH key value`, `LRANGE key start stop`, `LREM key value`
//!
//! ### Sets
//! - `SADD key member`, `SREM key member`, `SMEMBERS key`, `SCARD key`
//! - `SUNION key key [key ...]`, `SINTER key key [key ...]`
//! - `SINTERCARD key key [key ...]`, `SWITHMEMBER member`
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP parser, reply types and decoded commands
//! - [`storage`]: the typed keyspace and the member index
//! - [`commands`]: command lookup, arity checks and dispatch
//! - [`connection`]: per-client read/dispatch/write loop
//! - [`config`]: environment and command-line settings

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::{CommandHandler, CommandKind};
pub use config::{Config, ConfigError, Startup};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Command, ParseError, RespParser, RespValue};
pub use storage::StorageEngine;

/// The default port memkv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host memkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of memkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
