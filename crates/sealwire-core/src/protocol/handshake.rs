// ============================================
// File: crates/sealwire-core/src/protocol/handshake.rs
// ============================================
//! # Handshake Message Framing
//!
//! ## Wire Format
//! ```text
//! ┌────────────┬────────────────────┬──────────────────┐
//! │ type (1)   │ length (3, BE)     │ payload          │
//! └────────────┴────────────────────┴──────────────────┘
//! ```
//!
//! Handshake messages travel inside Handshake records and may be split
//! across several of them; `decode_handshake` reports
//! `IncompleteHandshake` until the whole body is buffered.
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake framing

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FramingError, Result};
use crate::protocol::codec::{put_u24, MAX_U24};

/// Size of the handshake header.
pub const HANDSHAKE_HEADER_SIZE: usize = 4;

// ============================================
// HandshakeType
// ============================================

/// Handshake message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandshakeType {
    /// Initiator's opening message.
    ClientHello = 1,
    /// Responder's parameter selection.
    ServerHello = 2,
    /// Responder's public key blob.
    Certificate = 11,
    /// Legacy key exchange message (never valid here).
    ServerKeyExchange = 12,
    /// Legacy client-auth request (never valid here).
    CertificateRequest = 13,
    /// Legacy end of server flight (never valid here).
    ServerHelloDone = 14,
    /// Signature over the transcript.
    CertificateVerify = 15,
    /// Legacy client key exchange (never valid here).
    ClientKeyExchange = 16,
    /// MAC over the transcript.
    Finished = 20,
}

impl HandshakeType {
    /// Parses a handshake type byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            1 => Self::ClientHello,
            2 => Self::ServerHello,
            11 => Self::Certificate,
            12 => Self::ServerKeyExchange,
            13 => Self::CertificateRequest,
            14 => Self::ServerHelloDone,
            15 => Self::CertificateVerify,
            16 => Self::ClientKeyExchange,
            20 => Self::Finished,
            _ => return None,
        })
    }

    /// Wire value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for HandshakeType {
    type Error = FramingError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_byte(value).ok_or(FramingError::UnknownHandshakeType(value))
    }
}

impl fmt::Display for HandshakeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================
// HandshakeMessage
// ============================================

/// A framed handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeMessage {
    /// Message type.
    pub msg_type: HandshakeType,
    /// Body without the header.
    pub payload: Bytes,
}

/// Frames `payload` as a handshake message.
///
/// # Errors
/// `HandshakeTooLarge` if the payload does not fit in 24 bits.
pub fn encode_handshake(msg_type: HandshakeType, payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MAX_U24 {
        return Err(FramingError::HandshakeTooLarge {
            len: payload.len(),
            max: MAX_U24,
        }
        .into());
    }
    let mut buf = BytesMut::with_capacity(HANDSHAKE_HEADER_SIZE + payload.len());
    buf.put_u8(msg_type.as_byte());
    put_u24(&mut buf, payload.len(), "handshake length")?;
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Decodes one handshake message from the front of `buf`.
///
/// Returns the message and the number of bytes consumed.
///
/// # Errors
/// - `IncompleteHandshake` if the header or body is not fully buffered
/// - `UnknownHandshakeType` for an unrecognised type byte
pub fn decode_handshake(buf: &[u8]) -> Result<(HandshakeMessage, usize)> {
    if buf.len() < HANDSHAKE_HEADER_SIZE {
        return Err(FramingError::IncompleteHandshake {
            needed: HANDSHAKE_HEADER_SIZE,
            available: buf.len(),
        }
        .into());
    }

    let msg_type = HandshakeType::try_from(buf[0])?;
    let len = peek_body_len(buf);
    let total = HANDSHAKE_HEADER_SIZE + len;
    if buf.len() < total {
        return Err(FramingError::IncompleteHandshake {
            needed: total,
            available: buf.len(),
        }
        .into());
    }

    let msg = HandshakeMessage {
        msg_type,
        payload: Bytes::copy_from_slice(&buf[HANDSHAKE_HEADER_SIZE..total]),
    };
    Ok((msg, total))
}

/// Declared body length of a buffered header. `buf` must hold at least
/// `HANDSHAKE_HEADER_SIZE` bytes.
#[must_use]
pub fn peek_body_len(buf: &[u8]) -> usize {
    (usize::from(buf[1]) << 16) | (usize::from(buf[2]) << 8) | usize::from(buf[3])
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_encode_layout() {
        let bytes = encode_handshake(HandshakeType::Finished, &[0xaa; 3]).unwrap();
        assert_eq!(&bytes[..], &[20, 0, 0, 3, 0xaa, 0xaa, 0xaa]);
    }

    #[test]
    fn test_decode_roundtrip() {
        let bytes = encode_handshake(HandshakeType::ClientHello, b"hello").unwrap();
        let (msg, consumed) = decode_handshake(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(msg.msg_type, HandshakeType::ClientHello);
        assert_eq!(&msg.payload[..], b"hello");
    }

    #[test]
    fn test_partial_body_is_incomplete() {
        let bytes = encode_handshake(HandshakeType::ServerHello, &[0u8; 40]).unwrap();
        for cut in 0..bytes.len() {
            let err = decode_handshake(&bytes[..cut]).unwrap_err();
            assert!(
                matches!(err, CoreError::Framing(FramingError::IncompleteHandshake { .. })),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_unknown_type() {
        let err = decode_handshake(&[99, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, CoreError::Framing(FramingError::UnknownHandshakeType(99))));
    }
}
