//! Client Session
//!
//! Each accepted connection runs one session task:
//!
//! ```text
//!    ┌──────────────────────────────────────┐
//!    │  read whatever the socket has        │
//!    │              │                       │
//!    │              ▼                       │
//!    │  decode every complete command       │
//!    │              │                       │
//!    │              ▼                       │
//!    │  one batch -> executor               │
//!    │              │                       │
//!    │              ▼                       │
//!    │  encode all replies, one write+flush │
//!    │              │                       │
//!    │              ▼                       │
//!    │         [loop back]                  │
//!    └──────────────────────────────────────┘
//! ```
//!
//! Bytes of a partial command stay in the buffer until the rest arrives.
//! A protocol error gets a final `-ERR Protocol error: ...` reply and closes
//! the connection.

use crate::commands::{ExecutorClosed, ExecutorHandle};
use crate::protocol::{Command, ParseError, RespParser, RespValue};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Upper bound on buffered bytes that do not yet form a complete command.
const MAX_BUFFER_SIZE: usize = 1024 * 1024 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Counters shared by every session.
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

    pub fn commands_processed(&self, count: usize) {
        self.commands_processed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Peer closed the stream in the middle of a command
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Buffer size limit exceeded")]
    BufferFull,

    #[error(transparent)]
    ExecutorClosed(#[from] ExecutorClosed),
}

/// Commands decoded from one read, plus the error that stopped decoding.
struct Decoded {
    commands: Vec<Command>,
    error: Option<ParseError>,
}

/// One client session over any byte stream.
pub struct ConnectionHandler<S> {
    stream: BufWriter<S>,

    /// Peer address, for logging
    addr: SocketAddr,

    /// Bytes read but not yet decoded
    buffer: BytesMut,

    /// Encoded replies for the current batch
    out: BytesMut,

    executor: ExecutorHandle,
    parser: RespParser,
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        addr: SocketAddr,
        executor: ExecutorHandle,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            out: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            executor,
            parser: RespParser::new(),
            stats,
        }
    }

    /// Serves the client until it disconnects or an error ends the session.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        while self.read_more_data().await? {
            let Decoded { commands, error } = self.drain_commands();

            if !commands.is_empty() {
                let count = commands.len();
                let replies = self.executor.execute_batch(commands).await?;
                self.stats.commands_processed(count);
                for reply in &replies {
                    reply.encode(&mut self.out);
                }
            }

            if let Some(e) = error {
                warn!(client = %self.addr, error = %e, "Protocol error");
                RespValue::error(format!("ERR Protocol error: {}", e)).encode(&mut self.out);
                self.flush_replies().await?;
                return Err(e.into());
            }

            self.flush_replies().await?;
        }

        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(ConnectionError::UnexpectedEof)
        }
    }

    /// Decodes every complete command at the front of the buffer.
    ///
    /// Empty commands (blank inline lines, `*0`, `*-1`) are consumed and
    /// skipped.
    fn drain_commands(&mut self) -> Decoded {
        let mut commands = Vec::new();

        loop {
            match self.parser.parse(&self.buffer) {
                Ok(Some((command, consumed))) => {
                    let _ = self.buffer.split_to(consumed);
                    if !command.is_empty() {
                        commands.push(command);
                    }
                }
                Ok(None) => {
                    trace!(
                        client = %self.addr,
                        decoded = commands.len(),
                        buffered = self.buffer.len(),
                        "Decoded commands"
                    );
                    return Decoded {
                        commands,
                        error: None,
                    };
                }
                Err(e) => {
                    self.buffer.clear();
                    return Decoded {
                        commands,
                        error: Some(e),
                    };
                }
            }
        }
    }

    /// Reads more data into the buffer. Returns `false` at end of stream.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Ok(false);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");
        Ok(true)
    }

    /// Writes every pending reply with a single write and flush.
    async fn flush_replies(&mut self) -> Result<(), ConnectionError> {
        if self.out.is_empty() {
            return Ok(());
        }

        let pending = self.out.split();
        self.stream.write_all(&pending).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(pending.len());
        trace!(client = %self.addr, bytes = pending.len(), "Sent replies");
        Ok(())
    }
}

/// Runs a session for an accepted TCP connection.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    executor: ExecutorHandle,
    stats: Arc<ConnectionStats>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
    }

    let handler = ConnectionHandler::new(stream, addr, executor, stats);
    if let Err(e) = handler.run().await {
        debug!(client = %addr, error = %e, "Connection ended with error");
    }
}
