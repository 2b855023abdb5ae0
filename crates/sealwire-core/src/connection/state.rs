// ============================================
// File: crates/sealwire-core/src/connection/state.rs
// ============================================
//! # Connection State Types
//!
//! ## Creation Reason
//! Role, handshake phase and negotiated parameters of a connection,
//! kept apart from the machine that drives them.
//!
//! ## Phase Graph
//! ```text
//! Init ─┬─ Initiator ─► ClientHelloSent ─► ServerHelloReceived ─┐
//!       └─ Responder ─► WaitingClientHello ─► ServerHelloSent ──┤
//!                                                               ▼
//!                        KeyExchangePending ─► HandshakeVerified ─► Connected ─► Closed
//!
//!                        (any non-terminal phase) ─► Aborted
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial state types

use std::fmt;

use bytes::Bytes;

use crate::protocol::suites::{CipherSuite, NamedGroup};
use crate::protocol::version::ProtocolVersion;

// ============================================
// Role
// ============================================

/// Which side of the handshake this connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Sends the ClientHello.
    Initiator,
    /// Answers with the ServerHello.
    Responder,
}

impl Role {
    /// The opposite role.
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Self::Initiator => Self::Responder,
            Self::Responder => Self::Initiator,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiator => f.write_str("initiator"),
            Self::Responder => f.write_str("responder"),
        }
    }
}

// ============================================
// HandshakePhase
// ============================================

/// Position in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakePhase {
    /// Created, not started.
    Init,
    /// Initiator sent its ClientHello.
    ClientHelloSent,
    /// Responder waits for a ClientHello.
    WaitingClientHello,
    /// Responder answered with its ServerHello.
    ServerHelloSent,
    /// Initiator accepted the ServerHello.
    ServerHelloReceived,
    /// Handshake keys installed; waiting for the peer's authentication.
    KeyExchangePending,
    /// The peer's Finished verified.
    HandshakeVerified,
    /// Application keys installed in both directions.
    Connected,
    /// Cleanly closed.
    Closed,
    /// Failed; no further traffic.
    Aborted,
}

impl HandshakePhase {
    /// Returns `true` for `Closed` and `Aborted`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Aborted)
    }

    /// Returns `true` while the handshake is running.
    #[must_use]
    pub const fn is_handshaking(self) -> bool {
        !matches!(self, Self::Init | Self::Connected | Self::Closed | Self::Aborted)
    }
}

impl fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================
// Negotiated
// ============================================

/// Parameters agreed during the handshake. Fields fill in as the
/// hellos are processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Negotiated {
    /// Protocol version.
    pub version: Option<ProtocolVersion>,
    /// Cipher suite.
    pub cipher_suite: Option<CipherSuite>,
    /// Key-exchange group.
    pub group: Option<NamedGroup>,
    /// ALPN protocol, if both sides configured one in common.
    pub alpn: Option<String>,
    /// Host name the initiator asked for.
    pub server_name: Option<String>,
    /// Responder public key from its Certificate.
    pub peer_public_key: Option<Bytes>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_classification() {
        assert!(HandshakePhase::Aborted.is_terminal());
        assert!(HandshakePhase::Closed.is_terminal());
        assert!(!HandshakePhase::Connected.is_terminal());
        assert!(HandshakePhase::KeyExchangePending.is_handshaking());
        assert!(!HandshakePhase::Init.is_handshaking());
        assert_eq!(HandshakePhase::WaitingClientHello.to_string(), "WaitingClientHello");
    }

    #[test]
    fn test_role_peer() {
        assert_eq!(Role::Initiator.peer(), Role::Responder);
        assert_eq!(Role::Responder.to_string(), "responder");
    }
}
