// ============================================
// File: crates/sealwire-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Errors from driving a connection over a byte stream: I/O failures,
//! protocol failures reported by the engine, and registry limits.
//!
//! ## Main Functionality
//! - `TransportError`: Primary error enum for transport operations
//! - Conversion from `CoreError`, `Io` with context
//! - Classification of retryable vs protocol errors
//!
//! ## ⚠️ Important Note for Next Developer
//! - A `Protocol` error means the connection is aborted; the fatal alert
//!   has already been written to the stream when one applies
//! - `Closed` is the normal outcome of using a stream after close
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;

use thiserror::Error;

use sealwire_common::ConnectionId;
use sealwire_core::CoreError;

// ============================================
// Result Type Alias
// ============================================

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Errors from stream I/O and connection driving.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Stream Errors
    // ========================================

    /// I/O error from the underlying stream.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The stream or connection is already closed.
    #[error("Stream closed")]
    Closed,

    /// Operation timed out.
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// What operation timed out
        operation: String,
    },

    // ========================================
    // Protocol Errors
    // ========================================

    /// The engine aborted or rejected the operation.
    #[error("Protocol error: {0}")]
    Protocol(#[from] CoreError),

    // ========================================
    // Registry Errors
    // ========================================

    /// Too many live connections.
    #[error("Connection limit reached: {limit}")]
    ConnectionLimitReached {
        /// Configured maximum
        limit: usize,
    },

    /// No live connection with this id.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if the engine rejected the peer's traffic.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// The engine error, if this is a protocol failure.
    #[must_use]
    pub const fn as_core(&self) -> Option<&CoreError> {
        match self {
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================
// Tests
// ============================================
