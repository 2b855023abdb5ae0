// ============================================
// File: crates/sealwire-transport/src/driver.rs
// ============================================
//! # Secure Stream Driver
//!
//! ## Creation Reason
//! `Connection` never performs I/O. `SecureStream` pumps one connection
//! over one `ByteStream`: it writes every `Emit`, reads when the engine
//! needs more data, and surfaces application data and aborts.
//!
//! ## Main Logical Flow
//! ```text
//! connect/accept
//!   └─ start() ──► write emits
//!        loop: read ──► feed() ──► write emits
//!                   until Complete / Abort / EOF
//! send:  Connection::send ──► write_all
//! recv:  buffered plaintext, else read ──► feed()
//! close: close_notify ──► shutdown
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Emitted bytes are written before an `Abort` is returned, so the
//!   peer receives the fatal alert
//! - Application data can arrive in the same read that completes the
//!   handshake; it is buffered, not dropped
//! - The handshake is bounded by a timeout; the stream is left as is
//!   when it fires
//!
//! ## Last Modified
//! v0.1.0 - Initial driver

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

use sealwire_common::ConnectionId;
use sealwire_core::config::{ConnectionConfig, MAX_FRAGMENT_SIZE};
use sealwire_core::connection::{Action, Connection, Negotiated, Role};

use crate::error::{Result, TransportError};
use crate::stream::ByteStream;

// ============================================
// Constants
// ============================================

/// Default bound on the whole handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Read buffer size: one full protected record.
const READ_BUFFER_SIZE: usize = MAX_FRAGMENT_SIZE + 512;

// ============================================
// StreamStats
// ============================================

/// Application bytes moved by one stream.
#[derive(Debug, Default)]
pub struct StreamStats {
    /// Plaintext bytes received.
    pub bytes_rx: AtomicU64,
    /// Plaintext bytes sent.
    pub bytes_tx: AtomicU64,
}

impl StreamStats {
    fn record_rx(&self, bytes: usize) {
        self.bytes_rx.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_tx(&self, bytes: usize) {
        self.bytes_tx.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// `(bytes_rx, bytes_tx)` at this instant.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.bytes_rx.load(Ordering::Relaxed),
            self.bytes_tx.load(Ordering::Relaxed),
        )
    }
}

// ============================================
// SecureStream
// ============================================

/// An established connection bound to a byte stream.
///
/// # Example
/// ```
/// use sealwire_core::config::ConnectionConfig;
/// use sealwire_transport::{MemoryPipe, SecureStream};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (client_io, server_io) = MemoryPipe::pair();
/// let server = tokio::spawn(SecureStream::accept(server_io, ConnectionConfig::default()));
/// let mut client = SecureStream::connect(client_io, ConnectionConfig::default()).await?;
/// let mut server = server.await??;
///
/// client.send(b"ping").await?;
/// assert_eq!(server.recv().await?.as_deref(), Some(&b"ping"[..]));
/// # Ok(())
/// # }
/// ```
pub struct SecureStream<S: ByteStream> {
    stream: S,
    connection: Connection,
    read_buf: Vec<u8>,
    plaintext: BytesMut,
    peer_closed: bool,
    stats: Arc<StreamStats>,
}

impl<S: ByteStream> SecureStream<S> {
    // ========================================
    // Handshake
    // ========================================

    /// Runs the initiator handshake over `stream`.
    ///
    /// # Errors
    /// - `Protocol` if the handshake aborts
    /// - `Timeout` after [`DEFAULT_HANDSHAKE_TIMEOUT`]
    /// - `Closed` / `Io` if the stream fails
    pub async fn connect(stream: S, config: ConnectionConfig) -> Result<Self> {
        Self::handshake(stream, Connection::initiator(config)?, DEFAULT_HANDSHAKE_TIMEOUT).await
    }

    /// Runs the responder handshake over `stream`.
    ///
    /// # Errors
    /// See [`SecureStream::connect`].
    pub async fn accept(stream: S, config: ConnectionConfig) -> Result<Self> {
        Self::handshake(stream, Connection::responder(config)?, DEFAULT_HANDSHAKE_TIMEOUT).await
    }

    /// Runs the handshake for `role` with an explicit timeout.
    ///
    /// # Errors
    /// See [`SecureStream::connect`].
    pub async fn handshake_with_timeout(
        stream: S,
        role: Role,
        config: ConnectionConfig,
        timeout: Duration,
    ) -> Result<Self> {
        Self::handshake(stream, Connection::new(role, config)?, timeout).await
    }

    async fn handshake(stream: S, connection: Connection, timeout: Duration) -> Result<Self> {
        let mut this = Self {
            stream,
            connection,
            read_buf: vec![0u8; READ_BUFFER_SIZE],
            plaintext: BytesMut::new(),
            peer_closed: false,
            stats: Arc::new(StreamStats::default()),
        };

        let role = this.connection.role();
        match tokio::time::timeout(timeout, this.drive_handshake()).await {
            Ok(Ok(())) => {
                info!(
                    conn = %this.connection.id().short(),
                    %role,
                    version = ?this.connection.negotiated().version,
                    suite = ?this.connection.negotiated().cipher_suite,
                    "Secure stream established"
                );
                Ok(this)
            }
            Ok(Err(e)) => {
                debug!(conn = %this.connection.id().short(), %role, error = %e, "Handshake failed");
                Err(e)
            }
            Err(_) => Err(TransportError::timeout(format!("{role} handshake"))),
        }
    }

    async fn drive_handshake(&mut self) -> Result<()> {
        let actions = self.connection.start()?;
        if self.apply(actions).await? {
            return Ok(());
        }

        loop {
            let n = self.stream.read(&mut self.read_buf).await?;
            let actions = if n == 0 {
                self.connection.on_end_of_stream()
            } else {
                self.connection.feed(&self.read_buf[..n])?
            };
            if self.apply(actions).await? {
                return Ok(());
            }
            if self.peer_closed {
                return Err(TransportError::Closed);
            }
        }
    }

    /// Carries out `actions`. Returns `true` once the handshake completed.
    async fn apply(&mut self, actions: Vec<Action>) -> Result<bool> {
        let mut complete = false;
        for action in actions {
            match action {
                Action::Emit(bytes) => self.stream.write_all(&bytes).await?,
                Action::Complete => complete = true,
                Action::ApplicationData(data) => {
                    self.stats.record_rx(data.len());
                    self.plaintext.extend_from_slice(&data);
                }
                Action::Closed => self.peer_closed = true,
                Action::Abort(e) => return Err(e.into()),
                Action::NeedMoreData => {}
            }
        }
        Ok(complete)
    }

    // ========================================
    // Application Data
    // ========================================

    /// Sends `data` as one or more protected records.
    ///
    /// # Errors
    /// `Protocol(InvalidState)` once closed, or a stream error.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let records = self.connection.send(data)?;
        self.stream.write_all(&records).await?;
        self.stats.record_tx(data.len());
        Ok(())
    }

    /// Receives the next chunk of application data. Returns `None` once
    /// the peer closed, by `close_notify` or by end of stream.
    ///
    /// # Errors
    /// `Protocol` if a record fails authentication or the peer aborts.
    pub async fn recv(&mut self) -> Result<Option<Bytes>> {
        loop {
            if !self.plaintext.is_empty() {
                return Ok(Some(self.plaintext.split().freeze()));
            }
            if self.peer_closed || self.connection.phase().is_terminal() {
                return Ok(None);
            }

            let n = self.stream.read(&mut self.read_buf).await?;
            let actions = if n == 0 {
                self.connection.on_end_of_stream()
            } else {
                self.connection.feed(&self.read_buf[..n])?
            };
            self.apply(actions).await?;
        }
    }

    /// Sends `close_notify` and shuts down the write side.
    ///
    /// # Errors
    /// `Protocol(InvalidState)` if already closed, or a stream error.
    pub async fn close(&mut self) -> Result<()> {
        let notify = self.connection.close()?;
        self.stream.write_all(&notify).await?;
        self.stream.shutdown().await?;
        debug!(conn = %self.connection.id().short(), "Secure stream closed");
        Ok(())
    }

    // ========================================
    // Accessors
    // ========================================

    /// Connection identifier.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// The underlying engine state.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Parameters agreed in the handshake.
    #[must_use]
    pub fn negotiated(&self) -> &Negotiated {
        self.connection.negotiated()
    }

    /// Byte counters shared with any registry holding this stream.
    #[must_use]
    pub fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }

    /// Returns `true` once the peer sent `close_notify` or EOF.
    #[must_use]
    pub fn is_peer_closed(&self) -> bool {
        self.peer_closed
    }
}

impl<S: ByteStream> std::fmt::Debug for SecureStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureStream")
            .field("connection", &self.connection)
            .field("buffered_plaintext", &self.plaintext.len())
            .field("peer_closed", &self.peer_closed)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryPipe;
    use sealwire_core::CoreError;

    async fn connected() -> (SecureStream<MemoryPipe>, SecureStream<MemoryPipe>) {
        let (client_io, server_io) = MemoryPipe::pair();
        let server = tokio::spawn(SecureStream::accept(server_io, ConnectionConfig::default()));
        let client = SecureStream::connect(client_io, ConnectionConfig::default())
            .await
            .unwrap();
        (client, server.await.unwrap().unwrap())
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (mut client, mut server) = connected().await;

        client.send(b"ping").await.unwrap();
        assert_eq!(server.recv().await.unwrap().unwrap(), Bytes::from_static(b"ping"));

        server.send(b"pong").await.unwrap();
        assert_eq!(client.recv().await.unwrap().unwrap(), Bytes::from_static(b"pong"));

        assert_eq!(client.stats().snapshot(), (4, 4));
        assert_eq!(client.id(), client.connection().id());
    }

    #[tokio::test]
    async fn test_close_is_seen_as_none() {
        let (mut client, mut server) = connected().await;
        client.close().await.unwrap();

        assert!(server.recv().await.unwrap().is_none());
        assert!(server.is_peer_closed());
        assert!(matches!(
            client.send(b"after").await,
            Err(TransportError::Protocol(CoreError::InvalidState { .. }))
        ));
    }

    #[tokio::test]
    async fn test_eof_after_handshake_is_clean() {
        let (client, mut server) = connected().await;
        drop(client);
        assert!(server.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_during_handshake_fails() {
        let (client_io, server_io) = MemoryPipe::pair();
        drop(server_io);
        let err = SecureStream::connect(client_io, ConnectionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Protocol(CoreError::UnexpectedEndOfStream { .. }) | TransportError::Closed
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout() {
        let (_client_io, server_io) = MemoryPipe::pair();
        let err = SecureStream::handshake_with_timeout(
            server_io,
            Role::Responder,
            ConnectionConfig::default(),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
    }
}
