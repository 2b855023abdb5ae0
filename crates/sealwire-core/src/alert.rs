// ============================================
// File: crates/sealwire-core/src/alert.rs
// ============================================
//! # Alert Channel
//!
//! ## Creation Reason
//! Peers report closure and fatal conditions to each other with two-byte
//! alert records. This module defines the level/description codes and
//! their wire form.
//!
//! ## Main Functionality
//! - `AlertLevel`: Warning (1) / Fatal (2)
//! - `AlertDescription`: description codes shared with TLS
//! - `Alert`: `level(1) | description(1)` encode/decode
//!
//! ## ⚠️ Important Note for Next Developer
//! - `close_notify` is always sent at warning level
//! - Unknown description codes are a decode error, not a silent ignore
//!
//! ## Last Modified
//! v0.1.0 - Initial alert definitions

use std::fmt;

use crate::error::{FramingError, Result};

/// Size of an encoded alert.
pub const ALERT_SIZE: usize = 2;

// ============================================
// AlertLevel
// ============================================

/// Severity carried in the first alert byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlertLevel {
    /// Informational; the connection may continue.
    Warning = 1,
    /// The sender has aborted the connection.
    Fatal = 2,
}

impl AlertLevel {
    /// Parses the level byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Warning),
            2 => Some(Self::Fatal),
            _ => None,
        }
    }
}

// ============================================
// AlertDescription
// ============================================

/// Alert description codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlertDescription {
    /// Orderly shutdown.
    CloseNotify = 0,
    /// A message arrived that is not valid in the current phase.
    UnexpectedMessage = 10,
    /// Record failed authentication.
    BadRecordMac = 20,
    /// Record longer than the negotiated limit.
    RecordOverflow = 22,
    /// No acceptable set of parameters.
    HandshakeFailure = 40,
    /// The certificate blob was unusable.
    BadCertificate = 42,
    /// A field was out of range or inconsistent.
    IllegalParameter = 47,
    /// A message could not be decoded.
    DecodeError = 50,
    /// A handshake cryptographic check failed.
    DecryptError = 51,
    /// Protocol version not supported.
    ProtocolVersion = 70,
    /// Parameters below the configured minimum.
    InsufficientSecurity = 71,
    /// Local failure unrelated to the peer.
    InternalError = 80,
    /// The user aborted the handshake.
    UserCanceled = 90,
    /// A required extension was absent.
    MissingExtension = 109,
    /// An extension was not expected here.
    UnsupportedExtension = 110,
    /// No ALPN protocol in common.
    NoApplicationProtocol = 120,
}

impl AlertDescription {
    /// Parses a description byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::CloseNotify,
            10 => Self::UnexpectedMessage,
            20 => Self::BadRecordMac,
            22 => Self::RecordOverflow,
            40 => Self::HandshakeFailure,
            42 => Self::BadCertificate,
            47 => Self::IllegalParameter,
            50 => Self::DecodeError,
            51 => Self::DecryptError,
            70 => Self::ProtocolVersion,
            71 => Self::InsufficientSecurity,
            80 => Self::InternalError,
            90 => Self::UserCanceled,
            109 => Self::MissingExtension,
            110 => Self::UnsupportedExtension,
            120 => Self::NoApplicationProtocol,
            _ => return None,
        })
    }

    /// Wire value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CloseNotify => "close_notify",
            Self::UnexpectedMessage => "unexpected_message",
            Self::BadRecordMac => "bad_record_mac",
            Self::RecordOverflow => "record_overflow",
            Self::HandshakeFailure => "handshake_failure",
            Self::BadCertificate => "bad_certificate",
            Self::IllegalParameter => "illegal_parameter",
            Self::DecodeError => "decode_error",
            Self::DecryptError => "decrypt_error",
            Self::ProtocolVersion => "protocol_version",
            Self::InsufficientSecurity => "insufficient_security",
            Self::InternalError => "internal_error",
            Self::UserCanceled => "user_canceled",
            Self::MissingExtension => "missing_extension",
            Self::UnsupportedExtension => "unsupported_extension",
            Self::NoApplicationProtocol => "no_application_protocol",
        };
        f.write_str(name)
    }
}

// ============================================
// Alert
// ============================================

/// A decoded alert record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    /// Severity.
    pub level: AlertLevel,
    /// What happened.
    pub description: AlertDescription,
}

impl Alert {
    /// Warning-level `close_notify`.
    #[must_use]
    pub const fn close_notify() -> Self {
        Self {
            level: AlertLevel::Warning,
            description: AlertDescription::CloseNotify,
        }
    }

    /// Fatal alert with the given description.
    #[must_use]
    pub const fn fatal(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Fatal,
            description,
        }
    }

    /// Returns `true` for fatal alerts.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.level == AlertLevel::Fatal
    }

    /// Returns `true` for `close_notify`.
    #[must_use]
    pub fn is_close_notify(&self) -> bool {
        self.description == AlertDescription::CloseNotify
    }

    /// Two-byte wire form.
    #[must_use]
    pub const fn encode(&self) -> [u8; ALERT_SIZE] {
        [self.level as u8, self.description as u8]
    }

    /// Parses an alert record payload.
    ///
    /// # Errors
    /// `Framing(Malformed)` if the payload is not exactly two bytes or
    /// carries unknown codes.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let [level, description] = payload else {
            return Err(FramingError::malformed(
                "alert",
                format!("expected {ALERT_SIZE} bytes, got {}", payload.len()),
            )
            .into());
        };

        let level = AlertLevel::from_byte(*level)
            .ok_or_else(|| FramingError::malformed("alert", format!("unknown level {level}")))?;
        let description = AlertDescription::from_byte(*description).ok_or_else(|| {
            FramingError::malformed("alert", format!("unknown description {description}"))
        })?;

        Ok(Self { level, description })
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            AlertLevel::Warning => "warning",
            AlertLevel::Fatal => "fatal",
        };
        write!(f, "{level} {}", self.description)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_close_notify_encoding() {
        assert_eq!(Alert::close_notify().encode(), [1, 0]);
        assert!(Alert::close_notify().is_close_notify());
        assert!(!Alert::close_notify().is_fatal());
    }

    #[test]
    fn test_decode_fatal() {
        let alert = Alert::decode(&[2, 40]).unwrap();
        assert!(alert.is_fatal());
        assert_eq!(alert.description, AlertDescription::HandshakeFailure);
        assert_eq!(alert.to_string(), "fatal handshake_failure");
    }

    #[test]
    fn test_decode_wrong_length() {
        assert!(matches!(
            Alert::decode(&[2]),
            Err(CoreError::Framing(FramingError::Malformed { .. }))
        ));
        assert!(Alert::decode(&[2, 40, 0]).is_err());
    }

    #[test]
    fn test_decode_unknown_codes() {
        assert!(Alert::decode(&[3, 0]).is_err());
        assert!(Alert::decode(&[2, 255]).is_err());
    }

    #[test]
    fn test_description_codes_roundtrip() {
        for code in 0..=u8::MAX {
            if let Some(desc) = AlertDescription::from_byte(code) {
                assert_eq!(desc.as_byte(), code);
            }
        }
    }
}
