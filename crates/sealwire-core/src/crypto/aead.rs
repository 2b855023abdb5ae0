// ============================================
// File: crates/sealwire-core/src/crypto/aead.rs
// ============================================
//! # Record Protection
//!
//! ## Creation Reason
//! Once traffic keys are installed, every record payload is sealed with
//! the negotiated AEAD. This module provides the cipher abstraction and
//! the per-direction state (key, IV, sequence number).
//!
//! ## Main Functionality
//! - `AeadCipher`: trait over AEAD primitives
//! - `ChaCha20Poly1305Cipher`, `Aes128GcmCipher`: implementations
//! - `cipher_for_suite`: suite code → implementation
//! - `RecordProtection`: seals/opens whole records for one direction
//!
//! ## Nonce Construction
//! ```text
//! nonce = iv XOR (0x00000000 || seq as u64 big-endian)
//! aad   = type(1) | version(2) | ciphertext_len(2)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Each (key, nonce) pair is used once: the sequence number only grows
//!   and a wrapped counter is an error
//! - A failed open returns `AuthenticationFailure` and no plaintext
//!
//! ## Last Modified
//! v0.1.0 - Initial record protection

use std::fmt;

use aes_gcm::Aes128Gcm;
use bytes::{BufMut, Bytes, BytesMut};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};

use sealwire_common::SecretBytes;

use crate::error::{CoreError, Result};
use crate::protocol::record::{encode_header, ContentType, MAX_RECORD_PAYLOAD};
use crate::protocol::suites::CipherSuite;
use crate::protocol::version::ProtocolVersion;

use super::{AEAD_IV_SIZE, AEAD_TAG_SIZE};

// ============================================
// AeadCipher Trait
// ============================================

/// AEAD primitive used to protect records.
///
/// # Purpose
/// Keeps the connection independent of the concrete cipher so suites can
/// be added without touching the state machine.
pub trait AeadCipher: Send + Sync {
    /// Algorithm name for logs.
    fn name(&self) -> &'static str;

    /// Required key length in bytes.
    fn key_len(&self) -> usize;

    /// Encrypts and authenticates `plaintext`, returning ciphertext || tag.
    ///
    /// # Errors
    /// `Encryption` if the key is the wrong size.
    fn seal(&self, key: &[u8], nonce: &[u8; AEAD_IV_SIZE], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>>;

    /// Verifies and decrypts ciphertext || tag.
    ///
    /// # Errors
    /// `AuthenticationFailure` if the tag does not verify.
    fn open(&self, key: &[u8], nonce: &[u8; AEAD_IV_SIZE], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>>;
}

/// ChaCha20-Poly1305 (RFC 8439).
#[derive(Debug, Default, Clone, Copy)]
pub struct ChaCha20Poly1305Cipher;

impl AeadCipher for ChaCha20Poly1305Cipher {
    fn name(&self) -> &'static str {
        "ChaCha20-Poly1305"
    }

    fn key_len(&self) -> usize {
        32
    }

    fn seal(&self, key: &[u8], nonce: &[u8; AEAD_IV_SIZE], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| CoreError::Encryption {
            context: "Failed to create ChaCha20-Poly1305 cipher".into(),
        })?;
        cipher
            .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
            .map_err(|_| CoreError::Encryption {
                context: "ChaCha20-Poly1305 encryption failed".into(),
            })
    }

    fn open(&self, key: &[u8], nonce: &[u8; AEAD_IV_SIZE], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| CoreError::AuthenticationFailure)?;
        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map_err(|_| CoreError::AuthenticationFailure)
    }
}

/// AES-128-GCM.
#[derive(Debug, Default, Clone, Copy)]
pub struct Aes128GcmCipher;

impl AeadCipher for Aes128GcmCipher {
    fn name(&self) -> &'static str {
        "AES-128-GCM"
    }

    fn key_len(&self) -> usize {
        16
    }

    fn seal(&self, key: &[u8], nonce: &[u8; AEAD_IV_SIZE], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes128Gcm::new_from_slice(key).map_err(|_| CoreError::Encryption {
            context: "Failed to create AES-128-GCM cipher".into(),
        })?;
        cipher
            .encrypt(aes_gcm::Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
            .map_err(|_| CoreError::Encryption {
                context: "AES-128-GCM encryption failed".into(),
            })
    }

    fn open(&self, key: &[u8], nonce: &[u8; AEAD_IV_SIZE], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes128Gcm::new_from_slice(key).map_err(|_| CoreError::AuthenticationFailure)?;
        cipher
            .decrypt(aes_gcm::Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map_err(|_| CoreError::AuthenticationFailure)
    }
}

/// AEAD implementation for a negotiated suite, if this engine has one.
#[must_use]
pub fn cipher_for_suite(suite: CipherSuite) -> Option<Box<dyn AeadCipher>> {
    match suite {
        CipherSuite::TLS_CHACHA20_POLY1305_SHA256 => Some(Box::new(ChaCha20Poly1305Cipher)),
        CipherSuite::TLS_AES_128_GCM_SHA256 => Some(Box::new(Aes128GcmCipher)),
        _ => None,
    }
}

// ============================================
// RecordProtection
// ============================================

/// Protection state for one direction of a connection.
pub struct RecordProtection {
    cipher: Box<dyn AeadCipher>,
    key: SecretBytes,
    iv: SecretBytes,
    sequence: u64,
}

impl RecordProtection {
    /// Installs fresh keys; the sequence number starts at zero.
    ///
    /// # Errors
    /// `KeyDerivation` if the key or IV has the wrong length.
    pub fn new(cipher: Box<dyn AeadCipher>, key: SecretBytes, iv: SecretBytes) -> Result<Self> {
        if key.len() != cipher.key_len() {
            return Err(CoreError::key_derivation(format!(
                "{} key must be {} bytes, got {}",
                cipher.name(),
                cipher.key_len(),
                key.len()
            )));
        }
        if iv.len() != AEAD_IV_SIZE {
            return Err(CoreError::key_derivation(format!(
                "traffic IV must be {AEAD_IV_SIZE} bytes, got {}",
                iv.len()
            )));
        }
        Ok(Self {
            cipher,
            key,
            iv,
            sequence: 0,
        })
    }

    /// Sequence number of the next record.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Bytes added to each sealed record payload.
    #[must_use]
    pub fn overhead(&self) -> usize {
        AEAD_TAG_SIZE
    }

    /// Per-record nonce for the current sequence number.
    #[must_use]
    pub fn nonce(&self) -> [u8; AEAD_IV_SIZE] {
        let mut nonce = [0u8; AEAD_IV_SIZE];
        nonce.copy_from_slice(self.iv.expose());
        for (n, s) in nonce[AEAD_IV_SIZE - 8..].iter_mut().zip(self.sequence.to_be_bytes()) {
            *n ^= s;
        }
        nonce
    }

    /// Seals `plaintext` into a complete record (header included).
    ///
    /// # Errors
    /// - `Framing(RecordTooLarge)` if the sealed payload exceeds 65535 bytes
    /// - `Encryption` if the sequence number is exhausted
    pub fn seal_record(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        plaintext: &[u8],
    ) -> Result<Bytes> {
        let next = self.next_sequence()?;
        let sealed_len = plaintext.len() + AEAD_TAG_SIZE;
        let header = encode_header(content_type, version, sealed_len)?;
        let ciphertext = self.cipher.seal(self.key.expose(), &self.nonce(), plaintext, &header)?;
        self.sequence = next;

        let mut out = BytesMut::with_capacity(header.len() + ciphertext.len());
        out.put_slice(&header);
        out.put_slice(&ciphertext);
        Ok(out.freeze())
    }

    /// Opens a record payload; `header` is the record header as received.
    ///
    /// # Errors
    /// `AuthenticationFailure` if the payload was modified, the header
    /// does not match, or the wrong keys are installed.
    pub fn open_record(&mut self, header: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < AEAD_TAG_SIZE || ciphertext.len() > MAX_RECORD_PAYLOAD {
            return Err(CoreError::AuthenticationFailure);
        }
        let next = self.next_sequence()?;
        let plaintext = self.cipher.open(self.key.expose(), &self.nonce(), ciphertext, header)?;
        self.sequence = next;
        Ok(plaintext)
    }

    fn next_sequence(&self) -> Result<u64> {
        self.sequence.checked_add(1).ok_or_else(|| CoreError::Encryption {
            context: "record sequence number exhausted".into(),
        })
    }
}

impl fmt::Debug for RecordProtection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordProtection")
            .field("cipher", &self.cipher.name())
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::record::RECORD_HEADER_SIZE;

    fn protection(suite: CipherSuite) -> RecordProtection {
        let cipher = cipher_for_suite(suite).unwrap();
        let key = SecretBytes::new(vec![0x42; cipher.key_len()]);
        RecordProtection::new(cipher, key, SecretBytes::new(vec![0x07; AEAD_IV_SIZE])).unwrap()
    }

    #[test]
    fn test_seal_open_both_suites() {
        for suite in [
            CipherSuite::TLS_CHACHA20_POLY1305_SHA256,
            CipherSuite::TLS_AES_128_GCM_SHA256,
        ] {
            let mut tx = protection(suite);
            let mut rx = protection(suite);

            let record = tx
                .seal_record(ContentType::ApplicationData, ProtocolVersion::TLS13, b"ping")
                .unwrap();
            assert_eq!(record.len(), RECORD_HEADER_SIZE + 4 + AEAD_TAG_SIZE);
            assert_eq!(&record[3..5], &[0, 20]);

            let (header, body) = record.split_at(RECORD_HEADER_SIZE);
            assert_eq!(rx.open_record(header, body).unwrap(), b"ping");
            assert_eq!(tx.sequence(), 1);
            assert_eq!(rx.sequence(), 1);
        }
    }

    #[test]
    fn test_bit_flip_fails() {
        let mut tx = protection(CipherSuite::TLS_CHACHA20_POLY1305_SHA256);
        let record = tx
            .seal_record(ContentType::ApplicationData, ProtocolVersion::TLS13, b"payload")
            .unwrap();

        for i in RECORD_HEADER_SIZE..record.len() {
            let mut tampered = record.to_vec();
            tampered[i] ^= 0x01;
            let mut rx = protection(CipherSuite::TLS_CHACHA20_POLY1305_SHA256);
            let (header, body) = tampered.split_at(RECORD_HEADER_SIZE);
            assert!(matches!(rx.open_record(header, body), Err(CoreError::AuthenticationFailure)));
            assert_eq!(rx.sequence(), 0);
        }
    }

    #[test]
    fn test_header_is_authenticated() {
        let mut tx = protection(CipherSuite::TLS_AES_128_GCM_SHA256);
        let mut rx = protection(CipherSuite::TLS_AES_128_GCM_SHA256);
        let record = tx
            .seal_record(ContentType::ApplicationData, ProtocolVersion::TLS13, b"x")
            .unwrap();

        let mut header = record[..RECORD_HEADER_SIZE].to_vec();
        header[0] = ContentType::Handshake.as_byte();
        assert!(rx.open_record(&header, &record[RECORD_HEADER_SIZE..]).is_err());
    }

    #[test]
    fn test_nonce_changes_with_sequence() {
        let mut tx = protection(CipherSuite::TLS_CHACHA20_POLY1305_SHA256);
        let first = tx.nonce();
        assert_eq!(first, [0x07; AEAD_IV_SIZE]);

        tx.seal_record(ContentType::ApplicationData, ProtocolVersion::TLS13, b"a")
            .unwrap();
        let second = tx.nonce();
        assert_eq!(second[AEAD_IV_SIZE - 1], 0x07 ^ 0x01);
        assert_eq!(second[..AEAD_IV_SIZE - 1], first[..AEAD_IV_SIZE - 1]);
    }

    #[test]
    fn test_out_of_sequence_fails() {
        let mut tx = protection(CipherSuite::TLS_CHACHA20_POLY1305_SHA256);
        let mut rx = protection(CipherSuite::TLS_CHACHA20_POLY1305_SHA256);
        let _skipped = tx
            .seal_record(ContentType::ApplicationData, ProtocolVersion::TLS13, b"one")
            .unwrap();
        let second = tx
            .seal_record(ContentType::ApplicationData, ProtocolVersion::TLS13, b"two")
            .unwrap();

        let (header, body) = second.split_at(RECORD_HEADER_SIZE);
        assert!(rx.open_record(header, body).is_err());
    }

    #[test]
    fn test_rejects_wrong_key_length() {
        let result = RecordProtection::new(
            Box::new(Aes128GcmCipher),
            SecretBytes::new(vec![0; 32]),
            SecretBytes::new(vec![0; AEAD_IV_SIZE]),
        );
        assert!(matches!(result, Err(CoreError::KeyDerivation { .. })));
    }

    #[test]
    fn test_unimplemented_suite() {
        assert!(cipher_for_suite(CipherSuite::TLS_AES_256_GCM_SHA384).is_none());
    }
}
