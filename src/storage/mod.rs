//! Storage Engine Module
//!
//! The keyspace shared by every connection: blobs (which double as decimal
//! counters), append-only lists, and sets with a member -> keys reverse index.
//!
//! ## Features
//!
//! - **One lock, one snapshot**: the typed entries and the reverse index sit
//!   behind a single `RwLock`, so multi-key reads and `flush_all` are atomic
//! - **No type errors**: reading a key of the wrong type yields "absent"
//! - **LIKE patterns**: `keys` matches with `%` and `_`
//!
//! ## Example
//!
//! ```
//! use memkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.blob_set(Bytes::from("name"), Bytes::from("memkv")).unwrap();
//! assert_eq!(engine.blob_get(b"name").unwrap(), Some(Bytes::from("memkv")));
//!
//! assert_eq!(engine.incr_by(&Bytes::from("hits"), 5).unwrap(), 5);
//! ```

pub mod engine;
pub mod pattern;

pub use engine::{StorageEngine, StorageError, StorageResult, Value};
pub use pattern::{KeyPattern, MATCH_ALL};
