//! Connection Handler Module
//!
//! Each client gets its own task running a read-dispatch-write loop.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects, handler task spawned
//!        │
//!        ▼
//! 2. ┌──────────────────────────────────────────┐
//!    │  Read bytes into the buffer              │
//!    │  Decode every complete command (batch)   │
//!    │  For each command:                       │
//!    │     look up ── unknown ──> error reply   │
//!    │     execute ── failed ──> reply, close   │
//!    │     buffer the reply                     │
//!    │     last of batch? ──> flush             │
//!    └──────────────────────────────────────────┘
//!        │
//!        ▼
//! 3. Peer closes / I/O error / command error: task ends
//! ```
//!
//! ## Error Policy
//!
//! | Failure              | Reply         | Connection |
//! |----------------------|---------------|------------|
//! | malformed framing    | `-ERR ...`    | stays open |
//! | unsupported command  | `-ERR ...`    | stays open |
//! | command failure      | `-ERR ...`    | closed     |
//! | transport / EOF      | none          | closed     |
//!
//! ## Pipelining
//!
//! Replies go into a `BufWriter`. The last command decoded from the bytes
//! available so far carries the `is_last` marker, and the writer is flushed
//! only after that command, so a pipeline of N commands is answered with a
//! single write.

use crate::commands::{CommandError, CommandHandler, CommandKind};
use crate::protocol::parser::find_crlf;
use crate::protocol::{Command, ParseError, RespParser, RespValue};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Unparsed input allowed to pile up: one maximal bulk string plus framing.
const MAX_BUFFER_SIZE: usize = crate::protocol::parser::MAX_BULK_SIZE + 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Commands that failed and closed their connection
    pub command_errors: AtomicU64,
    /// Malformed frames answered with a protocol error
    pub protocol_errors: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_failed(&self) {
        self.command_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the byte stream so the loop runs the same over TCP and over
/// in-memory streams in tests.
pub struct ConnectionHandler<S> {
    /// The client stream, with replies buffered until flushed
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes read but not yet decoded
    buffer: BytesMut,

    command_handler: CommandHandler,

    parser: RespParser,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Drop the client after this long without any incoming bytes
    idle_timeout: Option<Duration>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler and counts the connection as open.
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser: RespParser::new(),
            stats,
            idle_timeout: None,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Runs the connection loop until the client leaves or the session ends.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(ConnectionError::ClientDisconnected) => {
                debug!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(ConnectionError::Command(_)) => {
                debug!(client = %self.addr, "Connection closed after command error")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The read-dispatch-write loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let batch = self.decode_batch();
            let count = batch.len();

            for (i, frame) in batch.into_iter().enumerate() {
                match frame {
                    Ok(command) => {
                        let is_last = command.is_last();
                        self.process(command).await?;
                        if is_last {
                            self.flush().await?;
                        }
                    }
                    Err(e) => {
                        self.stats.protocol_error();
                        warn!(client = %self.addr, error = %e, "Protocol error");
                        let reply = RespValue::error(format!("ERR Protocol error: {}", e));
                        self.write_reply(&reply).await?;
                        if i + 1 == count {
                            self.flush().await?;
                        }
                    }
                }
            }

            self.read_more_data().await?;
        }
    }

    /// Decodes every complete command currently buffered.
    ///
    /// The final entry is the last of the batch; an `Ok` there carries the
    /// marker. A framing error is reported in place and decoding carries on
    /// after the offending line, so commands pipelined behind it still run.
    fn decode_batch(&mut self) -> Vec<Result<Command, ParseError>> {
        let mut batch = Vec::new();

        while !self.buffer.is_empty() {
            match self.parser.parse(&self.buffer) {
                Ok(Some((frame, consumed))) => {
                    self.buffer.advance(consumed);
                    batch.push(Command::from_frame(frame));
                }
                Ok(None) => {
                    trace!(
                        client = %self.addr,
                        buffered = self.buffer.len(),
                        "Incomplete command, need more data"
                    );
                    break;
                }
                Err(e) => {
                    batch.push(Err(e));
                    self.skip_malformed();
                }
            }
        }

        let count = batch.len();
        batch
            .into_iter()
            .enumerate()
            .map(|(i, frame)| frame.map(|command| command.with_last(i + 1 == count)))
            .collect()
    }

    /// Drops the line the decoder rejected, then any further lines that still
    /// cannot start a frame (the rest of a broken header block). Without a
    /// line terminator in sight the whole buffer goes.
    fn skip_malformed(&mut self) {
        loop {
            match find_crlf(&self.buffer) {
                Some(pos) => self.buffer.advance(pos + 2),
                None => {
                    self.buffer.clear();
                    return;
                }
            }
            if self.parser.parse(&self.buffer).is_ok() {
                return;
            }
        }
    }

    /// Looks up and executes one command, buffering its reply.
    ///
    /// A failed command is reported and flushed, then ends the session.
    async fn process(&mut self, command: Command) -> Result<(), ConnectionError> {
        self.stats.command_processed();
        trace!(client = %self.addr, command = %command.name(), "Executing command");

        let kind = match CommandKind::lookup(command.arg(0)) {
            Some(kind) => kind,
            None => {
                debug!(client = %self.addr, command = %command.name(), "Unsupported command");
                return self.write_reply(&CommandHandler::unsupported(&command)).await;
            }
        };

        match self.command_handler.execute(kind, &command) {
            Ok(reply) => self.write_reply(&reply).await,
            Err(e) => {
                self.stats.command_failed();
                warn!(
                    client = %self.addr,
                    command = %command,
                    error = %e,
                    "Command failed, closing connection"
                );
                self.write_reply(&e.to_reply()).await?;
                self.flush().await?;
                Err(ConnectionError::Command(e))
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            warn!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let read = self.stream.get_mut().read_buf(&mut self.buffer);
        let n = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ConnectionError::IdleTimeout(limit))??,
            None => read.await?,
        };

        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Buffers a reply; nothing reaches the network until [`Self::flush`].
    async fn write_reply(&mut self, reply: &RespValue) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stats.bytes_written(bytes.len());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ConnectionError> {
        self.stream.flush().await?;
        trace!(client = %self.addr, "Flushed replies");
        Ok(())
    }
}

/// Reasons a connection ends.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A command failed; its error was sent before closing
    #[error("command failed: {0}")]
    Command(#[from] CommandError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial command)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,

    #[error("no data received for {0:?}")]
    IdleTimeout(Duration),
}

/// Handles a client TCP connection to completion.
///
/// # Arguments
///
/// * `stream` - The TCP stream for this connection
/// * `addr` - The client's socket address
/// * `command_handler` - The command handler for executing commands
/// * `stats` - Shared connection statistics
/// * `idle_timeout` - Optional limit on time spent waiting for input
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    idle_timeout: Option<Duration>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(client = %addr, error = %e, "Could not disable Nagle's algorithm");
    }

    let handler = ConnectionHandler::new(stream, addr, command_handler, stats)
        .with_idle_timeout(idle_timeout);

    // Outcomes are logged by `run`.
    let _ = handler.run().await;
}
