// ============================================
// File: crates/sealwire-core/src/protocol/record.rs
// ============================================
//! # Record Framing
//!
//! ## Creation Reason
//! The record is the outermost unit on the byte stream and the unit of
//! encryption. This module frames and unframes records; it knows nothing
//! about keys.
//!
//! ## Wire Format
//! ```text
//! ┌──────────────┬───────────────────┬──────────────────┬─────────────┐
//! │ type (1)     │ version (2, BE)   │ length (2, BE)   │ payload     │
//! └──────────────┴───────────────────┴──────────────────┴─────────────┘
//! ```
//!
//! ## Main Functionality
//! - `ContentType`: Handshake / ApplicationData / Alert / ChangeCipherSpec
//! - `Record`: decoded record
//! - `encode_record` / `decode_record`
//!
//! ## ⚠️ Important Note for Next Developer
//! - A short buffer is `IncompleteRecord`, which callers must treat as
//!   "wait for more bytes", never as a failure
//! - The header bytes are the AEAD associated data; keep `encode_header` exact
//!
//! ## Last Modified
//! v0.1.0 - Initial record framing

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FramingError, Result};
use crate::protocol::version::ProtocolVersion;

// ============================================
// Constants
// ============================================

/// Size of the record header.
pub const RECORD_HEADER_SIZE: usize = 5;

/// Largest payload a 16-bit length can declare.
pub const MAX_RECORD_PAYLOAD: usize = u16::MAX as usize;

// ============================================
// ContentType
// ============================================

/// Record content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    /// Legacy middlebox compatibility record, payload `[0x01]`.
    ChangeCipherSpec = 20,
    /// Two-byte alert.
    Alert = 21,
    /// Handshake message bytes.
    Handshake = 22,
    /// Application payload.
    ApplicationData = 23,
}

impl ContentType {
    /// Parses a content type byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            20 => Some(Self::ChangeCipherSpec),
            21 => Some(Self::Alert),
            22 => Some(Self::Handshake),
            23 => Some(Self::ApplicationData),
            _ => None,
        }
    }

    /// Wire value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ContentType {
    type Error = FramingError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_byte(value).ok_or(FramingError::UnknownContentType(value))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================
// Record
// ============================================

/// A framed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Content type.
    pub content_type: ContentType,
    /// Version from the header.
    pub version: ProtocolVersion,
    /// Payload, ciphertext when protection is active.
    pub payload: Bytes,
}

impl Record {
    /// Creates a record.
    pub fn new(content_type: ContentType, version: ProtocolVersion, payload: impl Into<Bytes>) -> Self {
        Self {
            content_type,
            version,
            payload: payload.into(),
        }
    }

    /// Header bytes for this record.
    ///
    /// # Errors
    /// `RecordTooLarge` if the payload exceeds 65535 bytes.
    pub fn header(&self) -> Result<[u8; RECORD_HEADER_SIZE]> {
        encode_header(self.content_type, self.version, self.payload.len())
    }

    /// Full wire form.
    ///
    /// # Errors
    /// `RecordTooLarge` if the payload exceeds 65535 bytes.
    pub fn encode(&self) -> Result<Bytes> {
        encode_record(self.content_type, self.version, &self.payload)
    }
}

// ============================================
// Encoding / Decoding
// ============================================

/// Builds a record header for a payload of `len` bytes.
///
/// # Errors
/// `RecordTooLarge` if `len` exceeds 65535.
pub fn encode_header(
    content_type: ContentType,
    version: ProtocolVersion,
    len: usize,
) -> Result<[u8; RECORD_HEADER_SIZE]> {
    let len = u16::try_from(len).map_err(|_| FramingError::RecordTooLarge {
        len,
        max: MAX_RECORD_PAYLOAD,
    })?;
    let [v0, v1] = version.as_u16().to_be_bytes();
    let [l0, l1] = len.to_be_bytes();
    Ok([content_type.as_byte(), v0, v1, l0, l1])
}

/// Frames `payload` as a record.
///
/// # Errors
/// `RecordTooLarge` if the payload exceeds 65535 bytes.
///
/// # Example
/// ```
/// use sealwire_core::protocol::{encode_record, ContentType, ProtocolVersion};
///
/// let bytes = encode_record(ContentType::ApplicationData, ProtocolVersion(0x0304), b"hi").unwrap();
/// assert_eq!(&bytes[..], &[0x17, 0x03, 0x04, 0x00, 0x02, 0x68, 0x69]);
/// ```
pub fn encode_record(content_type: ContentType, version: ProtocolVersion, payload: &[u8]) -> Result<Bytes> {
    let header = encode_header(content_type, version, payload.len())?;
    let mut buf = BytesMut::with_capacity(RECORD_HEADER_SIZE + payload.len());
    buf.put_slice(&header);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Decodes one record from the front of `buf`.
///
/// Returns the record and the number of bytes consumed.
///
/// # Errors
/// - `IncompleteRecord` if the header or payload is not fully buffered
/// - `UnknownContentType` for an unrecognised type byte
pub fn decode_record(buf: &[u8]) -> Result<(Record, usize)> {
    if buf.len() < RECORD_HEADER_SIZE {
        return Err(FramingError::IncompleteRecord {
            needed: RECORD_HEADER_SIZE,
            available: buf.len(),
        }
        .into());
    }

    let content_type = ContentType::try_from(buf[0])?;
    let version = ProtocolVersion(u16::from_be_bytes([buf[1], buf[2]]));
    let len = usize::from(u16::from_be_bytes([buf[3], buf[4]]));

    let total = RECORD_HEADER_SIZE + len;
    if buf.len() < total {
        return Err(FramingError::IncompleteRecord {
            needed: total,
            available: buf.len(),
        }
        .into());
    }

    let record = Record::new(
        content_type,
        version,
        Bytes::copy_from_slice(&buf[RECORD_HEADER_SIZE..total]),
    );
    Ok((record, total))
}

/// Declared total size of the record at the front of `buf`, if the header
/// is buffered.
#[must_use]
pub fn peek_record_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < RECORD_HEADER_SIZE {
        return None;
    }
    Some(RECORD_HEADER_SIZE + usize::from(u16::from_be_bytes([buf[3], buf[4]])))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_application_data_vector() {
        let bytes = encode_record(ContentType::ApplicationData, ProtocolVersion(0x0304), b"hi").unwrap();
        assert_eq!(hex::encode(&bytes), "17030400026869");
    }

    #[test]
    fn test_decode_consumes_exactly_one_record() {
        let mut wire = encode_record(ContentType::Handshake, ProtocolVersion::TLS13, b"abc")
            .unwrap()
            .to_vec();
        wire.extend_from_slice(&[0x15, 0x03]);

        let (record, consumed) = decode_record(&wire).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(record.content_type, ContentType::Handshake);
        assert_eq!(&record.payload[..], b"abc");
    }

    #[test]
    fn test_short_header_is_incomplete() {
        let err = decode_record(&[0x17, 0x03]).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_short_payload_is_incomplete() {
        let err = decode_record(&[0x17, 0x03, 0x04, 0x00, 0x05, 1, 2]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Framing(FramingError::IncompleteRecord { needed: 10, available: 7 })
        ));
    }

    #[test]
    fn test_unknown_content_type_is_fatal() {
        let err = decode_record(&[0x63, 0x03, 0x04, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, CoreError::Framing(FramingError::UnknownContentType(0x63))));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = vec![0u8; MAX_RECORD_PAYLOAD + 1];
        let err = encode_record(ContentType::ApplicationData, ProtocolVersion::TLS13, &payload).unwrap_err();
        assert!(matches!(err, CoreError::Framing(FramingError::RecordTooLarge { .. })));
    }

    #[test]
    fn test_peek_record_len() {
        assert_eq!(peek_record_len(&[0x17, 0x03, 0x04, 0x01, 0x00]), Some(261));
        assert_eq!(peek_record_len(&[0x17]), None);
    }
}
