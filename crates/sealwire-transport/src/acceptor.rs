// ============================================
// File: crates/sealwire-transport/src/acceptor.rs
// ============================================
//! # Acceptor and Connection Registry
//!
//! ## Creation Reason
//! A responder serving many peers needs to know which connections are
//! live. `Acceptor` runs responder handshakes and registers each
//! established stream until it is dropped.
//!
//! ## Main Functionality
//! - `ConnectionRegistry`: bounded map of live connections
//! - `Acceptor`: handshake + registration
//! - `AcceptedStream`: `SecureStream` that deregisters on drop
//!
//! ## ⚠️ Important Note for Next Developer
//! - Entries live in a `DashMap` for concurrent access
//! - The limit is checked before the handshake and again on insert;
//!   concurrent accepts can still race to the last slot, and the loser
//!   is sent close_notify and gets `ConnectionLimitReached`
//! - Entries hold only negotiated parameters and counters, never keys
//!
//! ## Last Modified
//! v0.1.0 - Initial acceptor

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use sealwire_common::ConnectionId;
use sealwire_core::config::ConnectionConfig;
use sealwire_core::connection::Negotiated;

use crate::driver::{SecureStream, StreamStats};
use crate::error::{Result, TransportError};
use crate::stream::ByteStream;

/// Default maximum number of live connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

// ============================================
// ConnectionInfo
// ============================================

/// Registry entry for one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Parameters agreed in the handshake.
    pub negotiated: Negotiated,
    /// When the handshake completed.
    pub established_at: Instant,
    stats: Arc<StreamStats>,
}

impl ConnectionInfo {
    /// Time since the handshake completed.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.established_at.elapsed()
    }

    /// `(bytes_rx, bytes_tx)` so far.
    #[must_use]
    pub fn traffic(&self) -> (u64, u64) {
        self.stats.snapshot()
    }
}

// ============================================
// ConnectionRegistry
// ============================================

/// Bounded map of live connections.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionInfo>,
    max_connections: usize,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            max_connections,
        }
    }

    /// Registers an established stream.
    ///
    /// # Errors
    /// `ConnectionLimitReached` if the registry is full.
    pub fn register<S: ByteStream>(&self, stream: &SecureStream<S>) -> Result<ConnectionInfo> {
        let info = ConnectionInfo {
            id: stream.id(),
            negotiated: stream.negotiated().clone(),
            established_at: Instant::now(),
            stats: stream.stats(),
        };

        if self.connections.len() >= self.max_connections {
            return Err(TransportError::ConnectionLimitReached {
                limit: self.max_connections,
            });
        }
        self.connections.insert(info.id, info.clone());

        info!(
            conn = %info.id.short(),
            alpn = ?info.negotiated.alpn,
            server_name = ?info.negotiated.server_name,
            "Connection registered"
        );
        Ok(info)
    }

    /// Removes a connection.
    pub fn remove(&self, id: &ConnectionId) -> Option<ConnectionInfo> {
        let removed = self.connections.remove(id).map(|(_, info)| info);
        if let Some(info) = &removed {
            let (bytes_rx, bytes_tx) = info.traffic();
            info!(conn = %id.short(), bytes_rx, bytes_tx, "Connection removed");
        }
        removed
    }

    /// Looks up a connection.
    #[must_use]
    pub fn get(&self, id: &ConnectionId) -> Option<ConnectionInfo> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    /// Looks up a connection.
    ///
    /// # Errors
    /// `ConnectionNotFound` if `id` is not live.
    pub fn get_or_error(&self, id: &ConnectionId) -> Result<ConnectionInfo> {
        self.get(id).ok_or(TransportError::ConnectionNotFound(*id))
    }

    /// Number of live connections.
    #[must_use]
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if no connection is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Returns `true` if no slot is free.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count() >= self.max_connections
    }

    /// Snapshot of every live connection.
    #[must_use]
    pub fn all(&self) -> Vec<ConnectionInfo> {
        self.connections.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS)
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.count())
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

// ============================================
// Acceptor
// ============================================

/// Runs responder handshakes and tracks the resulting connections.
#[derive(Debug, Clone)]
pub struct Acceptor {
    config: ConnectionConfig,
    registry: Arc<ConnectionRegistry>,
}

impl Acceptor {
    /// Creates an acceptor with the default connection limit.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_registry(config, Arc::new(ConnectionRegistry::default()))
    }

    /// Creates an acceptor that registers into `registry`.
    #[must_use]
    pub fn with_registry(config: ConnectionConfig, registry: Arc<ConnectionRegistry>) -> Self {
        Self { config, registry }
    }

    /// The shared registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Completes a responder handshake on `stream` and registers it.
    ///
    /// A connection that loses the race for the last slot is closed with
    /// close_notify before the error is returned.
    ///
    /// # Errors
    /// - `ConnectionLimitReached` if the registry is full
    /// - Any handshake error from [`SecureStream::accept`]
    pub async fn accept<S: ByteStream>(&self, stream: S) -> Result<AcceptedStream<S>> {
        if self.registry.is_full() {
            debug!("Rejecting connection: registry full");
            return Err(TransportError::ConnectionLimitReached {
                limit: self.registry.max_connections,
            });
        }

        let mut stream = SecureStream::accept(stream, self.config.clone()).await?;
        if let Err(e) = self.registry.register(&stream) {
            warn!(conn = %stream.id().short(), error = %e, "Registry full after handshake, closing");
            if let Err(close_err) = stream.close().await {
                debug!(error = %close_err, "Close after rejected registration failed");
            }
            return Err(e);
        }
        Ok(AcceptedStream {
            stream,
            registry: Arc::clone(&self.registry),
        })
    }
}

// ============================================
// AcceptedStream
// ============================================

/// A registered `SecureStream`; leaves the registry when dropped.
pub struct AcceptedStream<S: ByteStream> {
    stream: SecureStream<S>,
    registry: Arc<ConnectionRegistry>,
}

impl<S: ByteStream> Deref for AcceptedStream<S> {
    type Target = SecureStream<S>;

    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

impl<S: ByteStream> DerefMut for AcceptedStream<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.stream
    }
}

impl<S: ByteStream> Drop for AcceptedStream<S> {
    fn drop(&mut self) {
        self.registry.remove(&self.stream.id());
    }
}

impl<S: ByteStream> std::fmt::Debug for AcceptedStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceptedStream")
            .field("stream", &self.stream)
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

    async fn accept_one(acceptor: &Acceptor) -> (SecureStream<MemoryPipe>, AcceptedStream<MemoryPipe>) {
        let (client_io, server_io) = MemoryPipe::pair();
        let client = tokio::spawn(SecureStream::connect(client_io, ConnectionConfig::default()));
        let server = acceptor.accept(server_io).await.unwrap();
        (client.await.unwrap().unwrap(), server)
    }

    #[tokio::test]
    async fn test_register_and_drop() {
        let acceptor = Acceptor::new(ConnectionConfig::default());
        let (_client, server) = accept_one(&acceptor).await;

        let id = server.id();
        assert_eq!(acceptor.registry().count(), 1);
        assert!(acceptor.registry().get_or_error(&id).is_ok());

        drop(server);
        assert!(acceptor.registry().is_empty());
        assert!(matches!(
            acceptor.registry().get_or_error(&id),
            Err(TransportError::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_traffic_visible_in_registry() {
        let acceptor = Acceptor::new(ConnectionConfig::default());
        let (mut client, mut server) = accept_one(&acceptor).await;

        client.send(b"hello").await.unwrap();
        server.recv().await.unwrap();
        server.send(b"hi").await.unwrap();

        let info = acceptor.registry().get(&server.id()).unwrap();
        assert_eq!(info.traffic(), (5, 2));
        assert!(info.negotiated.cipher_suite.is_some());
    }

    #[tokio::test]
    async fn test_limit_enforced() {
        let registry = Arc::new(ConnectionRegistry::new(1));
        let acceptor = Acceptor::with_registry(ConnectionConfig::default(), Arc::clone(&registry));
        let (_client, _server) = accept_one(&acceptor).await;
        assert!(registry.is_full());

        let (_other_client, other_server) = MemoryPipe::pair();
        assert!(matches!(
            acceptor.accept(other_server).await,
            Err(TransportError::ConnectionLimitReached { limit: 1 })
        ));
    }

    #[tokio::test]
    async fn test_late_rejection_closes_peer() {
        let acceptor = Acceptor::with_registry(ConnectionConfig::default(), Arc::new(ConnectionRegistry::new(1)));

        // Passes the early check while the registry is still empty
        let (late_client_io, late_server_io) = MemoryPipe::pair();
        let pending = tokio::spawn({
            let acceptor = acceptor.clone();
            async move { acceptor.accept(late_server_io).await }
        });
        tokio::task::yield_now().await;

        let (_client, _server) = accept_one(&acceptor).await;
        assert!(acceptor.registry().is_full());

        let mut late_client = SecureStream::connect(late_client_io, ConnectionConfig::default())
            .await
            .unwrap();
        assert!(matches!(
            pending.await.unwrap(),
            Err(TransportError::ConnectionLimitReached { limit: 1 })
        ));
        assert!(late_client.recv().await.unwrap().is_none());
        assert_eq!(acceptor.registry().count(), 1);
    }
}
