// ============================================
// File: crates/sealwire-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines the error types of the wire codec, key exchange, key schedule
//! and connection state machine.
//!
//! ## Main Functionality
//! - `FramingError`: record/handshake/extension decoding failures
//! - `CoreError`: primary error enum for engine operations
//! - `CoreError::to_alert`: alert description sent to the peer on abort
//!
//! ## Error Categories
//! 1. **Framing Errors**: `IncompleteRecord`/`IncompleteHandshake` are
//!    resumable (wait for more bytes); every other framing error is fatal
//! 2. **Crypto Errors**: invalid peer key, failed verification, AEAD failure
//! 3. **Negotiation Errors**: version, cipher, group, parameters
//! 4. **State Errors**: message ordering and caller misuse
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - `InvalidState` and `Config` are caller errors; they do not abort a connection
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::fmt;

use thiserror::Error;

use sealwire_common::error::CommonError;

use crate::alert::AlertDescription;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// FramingError
// ============================================

/// Decoding failures of the wire codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Fewer bytes than a complete record; wait for more.
    #[error("Incomplete record: need {needed} bytes, have {available}")]
    IncompleteRecord {
        /// Bytes required for the record
        needed: usize,
        /// Bytes currently buffered
        available: usize,
    },

    /// Fewer bytes than a complete handshake message; wait for more.
    #[error("Incomplete handshake message: need {needed} bytes, have {available}")]
    IncompleteHandshake {
        /// Bytes required for the message
        needed: usize,
        /// Bytes currently buffered
        available: usize,
    },

    /// Record payload over the allowed size.
    #[error("Record too large: {len} bytes exceeds {max}")]
    RecordTooLarge {
        /// Payload length
        len: usize,
        /// Limit that applied
        max: usize,
    },

    /// Handshake body over the allowed size.
    #[error("Handshake message too large: {len} bytes exceeds {max}")]
    HandshakeTooLarge {
        /// Body length
        len: usize,
        /// Limit that applied
        max: usize,
    },

    /// Record content type byte not recognised.
    #[error("Unknown content type: {0}")]
    UnknownContentType(u8),

    /// Handshake type byte not recognised.
    #[error("Unknown handshake type: {0}")]
    UnknownHandshakeType(u8),

    /// Extension length runs past the end of the extension block.
    #[error("Truncated extension 0x{extension_type:04x}: declared {declared} bytes, {remaining} remaining")]
    TruncatedExtension {
        /// Extension type being decoded
        extension_type: u16,
        /// Declared data length
        declared: usize,
        /// Bytes left in the block
        remaining: usize,
    },

    /// Any other structural problem.
    #[error("Malformed {context}: {reason}")]
    Malformed {
        /// What was being decoded
        context: &'static str,
        /// What's wrong with it
        reason: String,
    },
}

impl FramingError {
    /// Creates a `Malformed` error.
    pub fn malformed(context: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            context,
            reason: reason.into(),
        }
    }

    /// Creates a `Malformed` error for a field cut short.
    #[must_use]
    pub fn truncated(context: &'static str, needed: usize, remaining: usize) -> Self {
        Self::Malformed {
            context,
            reason: format!("need {needed} bytes, {remaining} remaining"),
        }
    }

    /// Returns `true` if more input may complete the frame.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::IncompleteRecord { .. } | Self::IncompleteHandshake { .. }
        )
    }
}

// ============================================
// CoreError
// ============================================

/// Core error types for the handshake engine.
///
/// # Security Note
/// Messages are safe to log: they describe what failed, never the bytes
/// involved.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Framing Errors
    // ========================================

    /// Wire decoding failed.
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Peer public value out of range or degenerate.
    #[error("Invalid peer public key: {reason}")]
    InvalidPeerPublicKey {
        /// What check failed
        reason: String,
    },

    /// Finished or CertificateVerify did not verify.
    #[error("Handshake verification failed: {reason}")]
    HandshakeVerificationFailed {
        /// Which check failed
        reason: String,
    },

    /// AEAD open failed on a protected record.
    #[error("Record authentication failed")]
    AuthenticationFailure,

    /// Failed to generate a key pair.
    #[error("Key generation failed: {context}")]
    KeyGeneration {
        /// What key was being generated
        context: String,
    },

    /// Key derivation failed.
    #[error("Key derivation failed: {reason}")]
    KeyDerivation {
        /// Why derivation failed
        reason: String,
    },

    /// Record sealing failed.
    #[error("Encryption failed: {context}")]
    Encryption {
        /// What was being encrypted
        context: String,
    },

    /// The signing callback failed.
    #[error("Failed to create signature: {reason}")]
    SignatureCreation {
        /// Why signing failed
        reason: String,
    },

    // ========================================
    // Negotiation Errors
    // ========================================

    /// No protocol version in common.
    #[error("Unsupported protocol version: 0x{got:04x}")]
    ProtocolVersion {
        /// Version offered or selected by the peer
        got: u16,
    },

    /// No acceptable parameter in common.
    #[error("Negotiation failed: no common {what}")]
    NegotiationFailed {
        /// Parameter class (cipher suite, group, ...)
        what: &'static str,
    },

    /// No ALPN protocol in common.
    #[error("No application protocol in common")]
    NoApplicationProtocol,

    /// A required extension is absent.
    #[error("Missing extension: {name}")]
    MissingExtension {
        /// Extension name
        name: &'static str,
    },

    /// A field contradicts what was offered or is out of range.
    #[error("Illegal parameter: {reason}")]
    IllegalParameter {
        /// What was wrong
        reason: String,
    },

    // ========================================
    // State Errors
    // ========================================

    /// Message type not valid for the current phase.
    #[error("Unexpected {message} in phase {phase}")]
    OutOfOrderMessage {
        /// Phase when the message arrived
        phase: String,
        /// Message kind received
        message: String,
    },

    /// The peer sent a fatal alert.
    #[error("Peer sent fatal alert: {description}")]
    PeerAlert {
        /// Alert description
        description: AlertDescription,
    },

    /// The stream ended before the handshake completed.
    #[error("Unexpected end of stream in phase {phase}")]
    UnexpectedEndOfStream {
        /// Phase when the stream ended
        phase: String,
    },

    /// Operation not valid in current state.
    #[error("Invalid state for operation: {operation} requires {required_state}")]
    InvalidState {
        /// What operation was attempted
        operation: String,
        /// What state was required
        required_state: String,
    },

    /// Configuration rejected.
    #[error("Invalid configuration: {field} - {reason}")]
    Config {
        /// Offending field
        field: String,
        /// Why it's invalid
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `InvalidPeerPublicKey` error.
    pub fn invalid_peer_key(reason: impl Into<String>) -> Self {
        Self::InvalidPeerPublicKey {
            reason: reason.into(),
        }
    }

    /// Creates a `HandshakeVerificationFailed` error.
    pub fn verification_failed(reason: impl Into<String>) -> Self {
        Self::HandshakeVerificationFailed {
            reason: reason.into(),
        }
    }

    /// Creates a `KeyGeneration` error.
    pub fn key_generation(context: impl Into<String>) -> Self {
        Self::KeyGeneration {
            context: context.into(),
        }
    }

    /// Creates a `SignatureCreation` error.
    pub fn signature_creation(reason: impl Into<String>) -> Self {
        Self::SignatureCreation {
            reason: reason.into(),
        }
    }

    /// Creates a `KeyDerivation` error.
    pub fn key_derivation(reason: impl Into<String>) -> Self {
        Self::KeyDerivation {
            reason: reason.into(),
        }
    }

    /// Creates an `IllegalParameter` error.
    pub fn illegal_parameter(reason: impl Into<String>) -> Self {
        Self::IllegalParameter {
            reason: reason.into(),
        }
    }

    /// Creates an `OutOfOrderMessage` error.
    pub fn out_of_order(phase: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::OutOfOrderMessage {
            phase: phase.to_string(),
            message: message.to_string(),
        }
    }

    /// Creates an `InvalidState` error.
    pub fn invalid_state(operation: impl Into<String>, required_state: impl Into<String>) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            required_state: required_state.into(),
        }
    }

    /// Creates a `Config` error.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if the operation can resume once more bytes arrive.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Framing(f) if f.is_incomplete())
    }

    /// Returns `true` if this error moves a connection to `Aborted`.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_retryable() && !matches!(self, Self::InvalidState { .. } | Self::Config { .. })
    }

    /// Returns `true` if this is a cryptographic error.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPeerPublicKey { .. }
                | Self::HandshakeVerificationFailed { .. }
                | Self::AuthenticationFailure
                | Self::KeyGeneration { .. }
                | Self::KeyDerivation { .. }
                | Self::Encryption { .. }
                | Self::SignatureCreation { .. }
        )
    }

    /// Returns `true` if this error might indicate tampering.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::InvalidPeerPublicKey { .. }
                | Self::HandshakeVerificationFailed { .. }
                | Self::AuthenticationFailure
        )
    }

    /// Alert description reported to the peer when this error aborts a
    /// connection. `None` when no alert should be sent.
    #[must_use]
    pub const fn to_alert(&self) -> Option<AlertDescription> {
        let description = match self {
            Self::Framing(FramingError::RecordTooLarge { .. }) => AlertDescription::RecordOverflow,
            Self::Framing(
                FramingError::UnknownContentType(_) | FramingError::UnknownHandshakeType(_),
            ) => AlertDescription::UnexpectedMessage,
            Self::Framing(_) => AlertDescription::DecodeError,
            Self::InvalidPeerPublicKey { .. } | Self::IllegalParameter { .. } => {
                AlertDescription::IllegalParameter
            }
            Self::HandshakeVerificationFailed { .. } => AlertDescription::DecryptError,
            Self::AuthenticationFailure => AlertDescription::BadRecordMac,
            Self::ProtocolVersion { .. } => AlertDescription::ProtocolVersion,
            Self::NegotiationFailed { .. } => AlertDescription::HandshakeFailure,
            Self::NoApplicationProtocol => AlertDescription::NoApplicationProtocol,
            Self::MissingExtension { .. } => AlertDescription::MissingExtension,
            Self::OutOfOrderMessage { .. } => AlertDescription::UnexpectedMessage,
            Self::KeyGeneration { .. }
            | Self::KeyDerivation { .. }
            | Self::Encryption { .. }
            | Self::SignatureCreation { .. }
            | Self::Common(_) => AlertDescription::InternalError,
            Self::PeerAlert { .. }
            | Self::UnexpectedEndOfStream { .. }
            | Self::InvalidState { .. }
            | Self::Config { .. } => return None,
        };
        Some(description)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_is_retryable() {
        let err: CoreError = FramingError::IncompleteRecord {
            needed: 7,
            available: 3,
        }
        .into();
        assert!(err.is_retryable());
        assert!(!err.is_fatal());

        let err: CoreError = FramingError::TruncatedExtension {
            extension_type: 0,
            declared: 10,
            remaining: 2,
        }
        .into();
        assert!(!err.is_retryable());
        assert!(err.is_fatal());
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::AuthenticationFailure.is_crypto_error());
        assert!(CoreError::AuthenticationFailure.is_suspicious());
        assert!(!CoreError::invalid_state("send", "Connected").is_fatal());
        assert!(CoreError::out_of_order("WaitingClientHello", "Finished").is_fatal());
    }

    #[test]
    fn test_alert_mapping() {
        assert_eq!(
            CoreError::AuthenticationFailure.to_alert(),
            Some(AlertDescription::BadRecordMac)
        );
        assert_eq!(
            CoreError::out_of_order("a", "b").to_alert(),
            Some(AlertDescription::UnexpectedMessage)
        );
        assert_eq!(
            CoreError::NegotiationFailed { what: "cipher suite" }.to_alert(),
            Some(AlertDescription::HandshakeFailure)
        );
        assert_eq!(
            CoreError::PeerAlert {
                description: AlertDescription::HandshakeFailure
            }
            .to_alert(),
            None
        );
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::out_of_order("WaitingClientHello", "Finished");
        assert_eq!(
            err.to_string(),
            "Unexpected Finished in phase WaitingClientHello"
        );
        let err = CoreError::ProtocolVersion { got: 0x0302 };
        assert!(err.to_string().contains("0x0302"));
    }

    #[test]
    fn test_common_error_conversion() {
        let common = CommonError::invalid_input("field", "bad value");
        let core: CoreError = common.into();
        assert!(matches!(core, CoreError::Common(_)));
    }
}
