// ============================================
// File: crates/sealwire-core/src/connection/record_layer.rs
// ============================================
//! # Record Layer
//!
//! ## Creation Reason
//! Sits between raw bytes and the state machine: buffers partial records,
//! removes and applies record protection, and fragments outgoing data.
//!
//! ## Main Logical Flow
//! 1. `push_inbound` appends received bytes
//! 2. `next_record` yields complete records, opened with the read keys if
//!    installed (ChangeCipherSpec is never protected)
//! 3. `write_record` splits a payload at the fragment size and seals each
//!    piece with the write keys if installed
//!
//! ## ⚠️ Important Note for Next Developer
//! - Records are opened lazily, so keys installed while processing one
//!   record apply to the next one already in the buffer
//! - An incomplete record leaves the buffer untouched
//!
//! ## Last Modified
//! v0.1.0 - Initial record layer

use bytes::{Bytes, BytesMut};

use crate::config::MAX_FRAGMENT_SIZE;
use crate::crypto::aead::RecordProtection;
use crate::crypto::AEAD_TAG_SIZE;
use crate::error::{FramingError, Result};
use crate::protocol::record::{decode_record, encode_record, ContentType, Record, RECORD_HEADER_SIZE};
use crate::protocol::version::ProtocolVersion;

/// Largest protected payload accepted from the peer.
const MAX_CIPHERTEXT_SIZE: usize = MAX_FRAGMENT_SIZE + AEAD_TAG_SIZE + 256;

/// Record buffering and protection for one connection.
#[derive(Debug)]
pub struct RecordLayer {
    inbox: BytesMut,
    read: Option<RecordProtection>,
    write: Option<RecordProtection>,
    version: ProtocolVersion,
    max_fragment_size: usize,
}

impl RecordLayer {
    /// Creates an unprotected record layer.
    #[must_use]
    pub fn new(version: ProtocolVersion, max_fragment_size: usize) -> Self {
        Self {
            inbox: BytesMut::new(),
            read: None,
            write: None,
            version,
            max_fragment_size: max_fragment_size.clamp(1, MAX_FRAGMENT_SIZE),
        }
    }

    /// Version written in outgoing record headers.
    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    /// Installs read protection; the sequence number restarts.
    pub fn install_read(&mut self, protection: RecordProtection) {
        self.read = Some(protection);
    }

    /// Installs write protection; the sequence number restarts.
    pub fn install_write(&mut self, protection: RecordProtection) {
        self.write = Some(protection);
    }

    /// Returns `true` once incoming records are protected.
    #[must_use]
    pub fn is_read_protected(&self) -> bool {
        self.read.is_some()
    }

    /// Returns `true` once outgoing records are protected.
    #[must_use]
    pub fn is_write_protected(&self) -> bool {
        self.write.is_some()
    }

    /// Bytes received but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.inbox.len()
    }

    /// Appends received bytes.
    pub fn push_inbound(&mut self, data: &[u8]) {
        self.inbox.extend_from_slice(data);
    }

    /// Takes the next complete record, opened if read keys are installed.
    /// Returns `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    /// - `Framing` for an unknown content type, a bad header version or an
    ///   oversized record
    /// - `AuthenticationFailure` if a protected record does not open
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let (record, consumed) = match decode_record(&self.inbox) {
            Ok(decoded) => decoded,
            Err(e) if e.is_retryable() => return Ok(None),
            Err(e) => return Err(e),
        };

        if !record.version.is_known() {
            return Err(FramingError::malformed(
                "record",
                format!("unknown record version 0x{:04x}", record.version.as_u16()),
            )
            .into());
        }

        let protected = self.read.is_some() && record.content_type != ContentType::ChangeCipherSpec;
        let limit = if protected {
            MAX_CIPHERTEXT_SIZE
        } else {
            MAX_FRAGMENT_SIZE
        };
        if record.payload.len() > limit {
            return Err(FramingError::RecordTooLarge {
                len: record.payload.len(),
                max: limit,
            }
            .into());
        }

        let header = self.inbox.split_to(consumed);
        let record = match (&mut self.read, protected) {
            (Some(read), true) => {
                let plaintext = read.open_record(&header[..RECORD_HEADER_SIZE], &record.payload)?;
                if plaintext.len() > MAX_FRAGMENT_SIZE {
                    return Err(FramingError::RecordTooLarge {
                        len: plaintext.len(),
                        max: MAX_FRAGMENT_SIZE,
                    }
                    .into());
                }
                Record::new(record.content_type, record.version, plaintext)
            }
            _ => record,
        };
        Ok(Some(record))
    }

    /// Encodes `payload` as one or more records of `content_type`.
    ///
    /// # Errors
    /// `Encryption` if the write sequence number is exhausted.
    pub fn write_record(&mut self, content_type: ContentType, payload: &[u8]) -> Result<Bytes> {
        let mut out = BytesMut::new();
        let mut remaining = payload;
        loop {
            let take = remaining.len().min(self.max_fragment_size);
            let (fragment, rest) = remaining.split_at(take);
            let record = match &mut self.write {
                Some(write) => write.seal_record(content_type, self.version, fragment)?,
                None => encode_record(content_type, self.version, fragment)?,
            };
            out.extend_from_slice(&record);
            remaining = rest;
            if remaining.is_empty() {
                break;
            }
        }
        Ok(out.freeze())
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aead::cipher_for_suite;
    use crate::error::CoreError;
    use crate::protocol::suites::CipherSuite;
    use sealwire_common::SecretBytes;

    fn protection() -> RecordProtection {
        let cipher = cipher_for_suite(CipherSuite::TLS_CHACHA20_POLY1305_SHA256).unwrap();
        RecordProtection::new(cipher, SecretBytes::new(vec![1; 32]), SecretBytes::new(vec![2; 12])).unwrap()
    }

    #[test]
    fn test_partial_then_complete() {
        let mut tx = RecordLayer::new(ProtocolVersion::TLS13, MAX_FRAGMENT_SIZE);
        let mut rx = RecordLayer::new(ProtocolVersion::TLS13, MAX_FRAGMENT_SIZE);
        let bytes = tx.write_record(ContentType::Handshake, b"hello").unwrap();

        rx.push_inbound(&bytes[..3]);
        assert!(rx.next_record().unwrap().is_none());
        assert_eq!(rx.buffered(), 3);

        rx.push_inbound(&bytes[3..]);
        let record = rx.next_record().unwrap().unwrap();
        assert_eq!(record.content_type, ContentType::Handshake);
        assert_eq!(&record.payload[..], b"hello");
        assert_eq!(rx.buffered(), 0);
    }

    #[test]
    fn test_fragmentation() {
        let mut tx = RecordLayer::new(ProtocolVersion::TLS13, 4);
        let bytes = tx.write_record(ContentType::ApplicationData, b"0123456789").unwrap();
        assert_eq!(bytes.len(), 3 * RECORD_HEADER_SIZE + 10);

        let mut rx = RecordLayer::new(ProtocolVersion::TLS13, 4);
        rx.push_inbound(&bytes);
        let mut joined = Vec::new();
        while let Some(record) = rx.next_record().unwrap() {
            joined.extend_from_slice(&record.payload);
        }
        assert_eq!(joined, b"0123456789");
    }

    #[test]
    fn test_empty_payload_is_one_record() {
        let mut tx = RecordLayer::new(ProtocolVersion::TLS13, 16);
        let bytes = tx.write_record(ContentType::ApplicationData, b"").unwrap();
        assert_eq!(bytes.len(), RECORD_HEADER_SIZE);
    }

    #[test]
    fn test_protected_roundtrip() {
        let mut tx = RecordLayer::new(ProtocolVersion::TLS13, MAX_FRAGMENT_SIZE);
        let mut rx = RecordLayer::new(ProtocolVersion::TLS13, MAX_FRAGMENT_SIZE);
        tx.install_write(protection());
        rx.install_read(protection());

        let bytes = tx.write_record(ContentType::ApplicationData, b"secret").unwrap();
        assert!(!bytes.windows(6).any(|w| w == b"secret"));

        rx.push_inbound(&bytes);
        let record = rx.next_record().unwrap().unwrap();
        assert_eq!(&record.payload[..], b"secret");
    }

    #[test]
    fn test_tampered_record_fails() {
        let mut tx = RecordLayer::new(ProtocolVersion::TLS13, MAX_FRAGMENT_SIZE);
        let mut rx = RecordLayer::new(ProtocolVersion::TLS13, MAX_FRAGMENT_SIZE);
        tx.install_write(protection());
        rx.install_read(protection());

        let mut bytes = tx.write_record(ContentType::ApplicationData, b"data").unwrap().to_vec();
        bytes[RECORD_HEADER_SIZE] ^= 0x80;
        rx.push_inbound(&bytes);
        assert!(matches!(rx.next_record(), Err(CoreError::AuthenticationFailure)));
    }

    #[test]
    fn test_change_cipher_spec_is_not_opened() {
        let mut rx = RecordLayer::new(ProtocolVersion::TLS13, MAX_FRAGMENT_SIZE);
        rx.install_read(protection());
        rx.push_inbound(&[20, 3, 3, 0, 1, 1]);
        let record = rx.next_record().unwrap().unwrap();
        assert_eq!(record.content_type, ContentType::ChangeCipherSpec);
        assert_eq!(&record.payload[..], &[1]);
    }

    #[test]
    fn test_rejects_bad_version_and_oversize() {
        let mut rx = RecordLayer::new(ProtocolVersion::TLS13, MAX_FRAGMENT_SIZE);
        rx.push_inbound(&[22, 0x7f, 0x00, 0, 1, 0]);
        assert!(matches!(rx.next_record(), Err(CoreError::Framing(FramingError::Malformed { .. }))));

        let mut rx = RecordLayer::new(ProtocolVersion::TLS13, MAX_FRAGMENT_SIZE);
        let big = encode_record(ContentType::ApplicationData, ProtocolVersion::TLS13, &vec![0; MAX_FRAGMENT_SIZE + 1])
            .unwrap();
        rx.push_inbound(&big);
        assert!(matches!(
            rx.next_record(),
            Err(CoreError::Framing(FramingError::RecordTooLarge { .. }))
        ));
    }
}
