//! Connection Handler Module
//!
//! Manages individual client connections. Each client is served by its own
//! async task; every task shares the same storage engine and statistics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │              (main.rs, semaphore-bounded)                   │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept() + permit
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Decode batch │───>│ Execute cmd │     │
//! │  └─────────────┘    └──────────────┘    └──────┬──────┘     │
//! │                                                │            │
//! │                                                ▼            │
//! │                               ┌──────────────────────────┐  │
//! │                               │ Buffer reply, flush after│  │
//! │                               │ the last of the batch    │  │
//! │                               └──────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use memkv::connection::{handle_connection, ConnectionStats};
//! use memkv::commands::CommandHandler;
//! use memkv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(storage);
//!
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler, stats, None));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
