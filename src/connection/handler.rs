//! Connection Handler
//!
//! Each client gets its own handler task that runs in a loop, reading
//! commands and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects, ConnectionHandler spawned
//!        │
//!        ▼
//! 2. ┌──────────────────────────────────────┐
//!    │  Decode every complete frame in the  │
//!    │  buffer, execute it, queue the reply │
//!    └──────────────────┬───────────────────┘
//!                       ▼
//!    ┌──────────────────────────────────────┐
//!    │  Flush queued replies                │
//!    └──────────────────┬───────────────────┘
//!                       ▼
//!    ┌──────────────────────────────────────┐
//!    │  Read more bytes (EOF ends the loop) │
//!    └──────────────────┬───────────────────┘
//!                       └──> back to 2
//! 3. Client disconnects / error, handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream: a read may carry half a command, or several. Bytes are
//! accumulated in a `BytesMut`; a complete frame is split off the front and
//! anything after it stays for the next round. Replies go through a
//! `BufWriter` and are flushed once no complete frame is left, so pipelined
//! commands are answered in order with a single write.

use crate::commands::{command_args, CommandHandler};
use crate::protocol::parser::{leading_blank_lines, MAX_BULK_SIZE, MAX_INLINE_SIZE};
use crate::protocol::{RespParser, RespValue};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Largest amount of unparsed input kept for one client: one maximal bulk
/// string plus room for its header.
const MAX_BUFFER_SIZE: usize = MAX_BULK_SIZE + MAX_INLINE_SIZE;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Server-wide connection counters
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
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

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the transport so tests can drive it with an in-memory
/// stream; the server uses `TcpStream`.
pub struct ConnectionHandler<S> {
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes received but not yet decoded
    buffer: BytesMut,

    command_handler: CommandHandler,

    parser: RespParser,

    stats: Arc<ConnectionStats>,

    /// Scratch space for encoding one reply
    reply: Vec<u8>,

    /// Commands executed on this connection
    commands: u64,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
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
            reply: Vec::with_capacity(64),
            commands: 0,
        }
    }

    /// Serves the client until it disconnects or the transport fails.
    ///
    /// Always ends with an error describing why the connection closed;
    /// `ClientDisconnected` is the normal case.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, commands = self.commands, "Client disconnected"),
            Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.addr, commands = self.commands, "Client disconnected")
            }
            Err(ConnectionError::UnexpectedEof) => info!(
                client = %self.addr,
                commands = self.commands,
                discarded = self.buffer.len(),
                "Client disconnected with a partial command buffered"
            ),
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                info!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The decode-execute-reply loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(response) = self.next_response() {
                self.queue_response(&response).await?;
            }

            if !self.stream.buffer().is_empty() {
                self.stream.flush().await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Decodes and executes the next complete frame in the buffer.
    ///
    /// Returns `None` once the buffer holds no complete frame.
    fn next_response(&mut self) -> Option<RespValue> {
        let blank = leading_blank_lines(&self.buffer);
        if blank > 0 {
            trace!(client = %self.addr, bytes = blank, "Skipped blank lines");
            self.buffer.advance(blank);
        }

        if self.buffer.is_empty() {
            return None;
        }

        match self.parser.parse(&self.buffer) {
            Ok(Some((frame, consumed))) => {
                self.buffer.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed frame"
                );
                Some(self.execute(frame))
            }
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete command, need more data"
                );
                None
            }
            Err(e) => {
                // There is no way to find where the bad frame ends, so drop
                // everything buffered and start fresh with the next read.
                warn!(client = %self.addr, error = %e, discarded = self.buffer.len(), "Parse error");
                self.buffer.clear();
                Some(RespValue::error_reply(e))
            }
        }
    }

    fn execute(&mut self, frame: RespValue) -> RespValue {
        let args = match command_args(frame) {
            Ok(args) => args,
            Err(e) => {
                debug!(client = %self.addr, error = %e, "Rejected frame");
                return e.into();
            }
        };

        info!(client = %self.addr, command = ?args, "=>");

        let response = self.command_handler.execute(&args);
        self.stats.command_processed();
        self.commands += 1;
        response
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            warn!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            let response = RespValue::error_reply(ConnectionError::BufferFull);
            self.queue_response(&response).await?;
            self.stream.flush().await?;
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Encodes a reply into the write buffer. Nothing is sent until the
    /// next flush.
    async fn queue_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        self.reply.clear();
        response.serialize_into(&mut self.reply);
        self.stream.write_all(&self.reply).await?;
        self.stats.bytes_written(self.reply.len());
        trace!(
            client = %self.addr,
            bytes = self.reply.len(),
            "Queued response"
        );
        Ok(())
    }
}

/// Reasons a connection ends.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Client closed the stream in the middle of a command
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Creates a `ConnectionHandler` and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        debug!(client = %addr, reason = %e, "Connection closed");
    }
}
