// ============================================
// File: crates/sealwire-core/src/crypto/transcript.rs
// ============================================
//! # Handshake Transcript
//!
//! ## Creation Reason
//! Every secret after the hellos is bound to the exact handshake bytes
//! exchanged so far. The transcript keeps those bytes in order and a
//! running SHA-256 so a snapshot hash is cheap at any point.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Append the full encoded message (4-byte header included), in wire order
//! - Records, alerts and application data never enter the transcript
//!
//! ## Last Modified
//! v0.1.0 - Initial transcript

use bytes::Bytes;
use sha2::{Digest, Sha256};

use super::HASH_SIZE;

/// Ordered list of handshake messages with a running hash.
#[derive(Clone, Default)]
pub struct Transcript {
    messages: Vec<Bytes>,
    hasher: Sha256,
}

impl Transcript {
    /// Creates an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one encoded handshake message.
    pub fn append(&mut self, message: impl Into<Bytes>) {
        let message = message.into();
        self.hasher.update(&message);
        self.messages.push(message);
    }

    /// Hash of everything appended so far.
    #[must_use]
    pub fn current_hash(&self) -> [u8; HASH_SIZE] {
        self.hasher.clone().finalize().into()
    }

    /// Messages in arrival order.
    #[must_use]
    pub fn messages(&self) -> &[Bytes] {
        &self.messages
    }

    /// Number of messages appended.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` before the first message.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("messages", &self.messages.len())
            .field("hash", &hex::encode(&self.current_hash()[..8]))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::{empty_hash, sha256};

    #[test]
    fn test_empty_transcript_hash() {
        assert_eq!(Transcript::new().current_hash(), empty_hash());
    }

    #[test]
    fn test_hash_is_over_concatenation() {
        let mut t = Transcript::new();
        t.append(Bytes::from_static(b"\x01\x00\x00\x01a"));
        t.append(b"\x02\x00\x00\x01b".to_vec());

        assert_eq!(t.len(), 2);
        assert_eq!(t.current_hash(), sha256(b"\x01\x00\x00\x01a\x02\x00\x00\x01b"));
    }

    #[test]
    fn test_snapshot_does_not_consume() {
        let mut t = Transcript::new();
        t.append(Bytes::from_static(b"first"));
        let snapshot = t.current_hash();
        assert_eq!(t.current_hash(), snapshot);

        t.append(Bytes::from_static(b"second"));
        assert_ne!(t.current_hash(), snapshot);
    }
}
