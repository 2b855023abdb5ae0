// ============================================
// File: crates/sealwire-core/src/connection/action.rs
// ============================================
//! # Connection Actions
//!
//! ## Creation Reason
//! The engine performs no I/O. Each call returns the list of things the
//! caller must do or know about, in order.
//!
//! ## Ordering
//! At most one `Emit` per call, always first; it carries every byte the
//! call produced (a whole flight, or a fatal alert before `Abort`).
//!
//! ## Last Modified
//! v0.1.0 - Initial action set

use bytes::Bytes;

use crate::error::CoreError;

/// Outcome of driving a connection.
#[derive(Debug)]
pub enum Action {
    /// Bytes to write to the peer.
    Emit(Bytes),
    /// Nothing else to do until more bytes arrive.
    NeedMoreData,
    /// The handshake finished; the connection is `Connected`.
    Complete,
    /// Decrypted application payload of one record.
    ApplicationData(Bytes),
    /// The connection closed cleanly.
    Closed,
    /// The connection failed and is now `Aborted`.
    Abort(CoreError),
}

impl Action {
    /// Returns the bytes of an `Emit`.
    #[must_use]
    pub fn as_emit(&self) -> Option<&Bytes> {
        match self {
            Self::Emit(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns `true` for `Closed` and `Abort`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Abort(_))
    }
}
