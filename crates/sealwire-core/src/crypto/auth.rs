// ============================================
// File: crates/sealwire-core/src/crypto/auth.rs
// ============================================
//! # Handshake Authentication
//!
//! ## Creation Reason
//! The responder may prove possession of a long-term key by signing the
//! transcript (Certificate + CertificateVerify). Signing and checking are
//! collaborator traits so deployments can plug in their own trust model.
//!
//! ## Main Functionality
//! - `HandshakeSigner` / `HandshakeVerifier`: collaborator traits
//! - `Ed25519Signer`: signs with a local Ed25519 key
//! - `Ed25519Verifier`: accepts any valid Ed25519 signature
//! - `PinnedKeyVerifier`: also requires a specific public key
//! - `signature_context`: bytes actually signed
//!
//! ## Signed Content
//! ```text
//! 0x20 * 64 | "TLS 1.3, server CertificateVerify" | 0x00 | transcript_hash
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Verification uses `verify_strict` (rejects malleable signatures)
//! - Pinned key comparison is constant time
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake authentication

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroize;

use crate::error::{CoreError, Result};
use crate::protocol::messages::SCHEME_ED25519;

use super::{ED25519_PUBLIC_KEY_SIZE, ED25519_SIGNATURE_SIZE};

/// Context string bound into every CertificateVerify signature.
pub const SERVER_SIGNATURE_CONTEXT: &[u8] = b"TLS 1.3, server CertificateVerify";

/// Bytes covered by the CertificateVerify signature.
#[must_use]
pub fn signature_context(transcript_hash: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + SERVER_SIGNATURE_CONTEXT.len() + 1 + transcript_hash.len());
    out.extend_from_slice(&[0x20; 64]);
    out.extend_from_slice(SERVER_SIGNATURE_CONTEXT);
    out.push(0x00);
    out.extend_from_slice(transcript_hash);
    out
}

// ============================================
// Collaborator Traits
// ============================================

/// Produces the responder's transcript signature.
pub trait HandshakeSigner: Send + Sync {
    /// Signature scheme code sent in CertificateVerify.
    fn scheme(&self) -> u16;

    /// Public key carried in the Certificate message.
    fn public_key(&self) -> Vec<u8>;

    /// Signs `data`.
    ///
    /// # Errors
    /// `SignatureCreation` if the backing key is unavailable.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Decides whether the peer's signature is acceptable.
pub trait HandshakeVerifier: Send + Sync {
    /// Returns `true` if `signature` over `data` is valid for
    /// `public_key` under `scheme` and the key is trusted.
    fn verify(&self, scheme: u16, data: &[u8], signature: &[u8], public_key: &[u8]) -> bool;
}

// ============================================
// Ed25519Signer
// ============================================

/// Ed25519 long-term signing key.
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Generates a new random key.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds a signer from a 32-byte seed.
    ///
    /// # Errors
    /// `KeyGeneration` if `bytes` is not 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(CoreError::key_generation(format!(
                "Invalid Ed25519 key size: expected 32, got {}",
                bytes.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(bytes);
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self { signing_key })
    }

    /// Raw public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; ED25519_PUBLIC_KEY_SIZE] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Public key as standard base64, the form used for pinning.
    #[must_use]
    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.public_key_bytes())
    }
}

impl HandshakeSigner for Ed25519Signer {
    fn scheme(&self) -> u16 {
        SCHEME_ED25519
    }

    fn public_key(&self) -> Vec<u8> {
        self.public_key_bytes().to_vec()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(self.signing_key.sign(data).to_bytes().to_vec())
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

// ============================================
// Verifiers
// ============================================

fn verify_ed25519(scheme: u16, data: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    if scheme != SCHEME_ED25519 {
        debug!(scheme, "Unsupported signature scheme");
        return false;
    }
    let Ok(key_bytes) = <[u8; ED25519_PUBLIC_KEY_SIZE]>::try_from(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; ED25519_SIGNATURE_SIZE]>::try_from(signature) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    key.verify_strict(data, &Signature::from_bytes(&sig_bytes)).is_ok()
}

/// Accepts any valid Ed25519 signature, whatever the key.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl HandshakeVerifier for Ed25519Verifier {
    fn verify(&self, scheme: u16, data: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        verify_ed25519(scheme, data, signature, public_key)
    }
}

/// Accepts Ed25519 signatures from one pinned public key only.
#[derive(Clone)]
pub struct PinnedKeyVerifier {
    pinned: [u8; ED25519_PUBLIC_KEY_SIZE],
}

impl PinnedKeyVerifier {
    /// Pins a raw 32-byte public key.
    ///
    /// # Errors
    /// `Config` if the key is not a valid Ed25519 point.
    pub fn new(public_key: &[u8]) -> Result<Self> {
        let pinned: [u8; ED25519_PUBLIC_KEY_SIZE] = public_key.try_into().map_err(|_| {
            CoreError::config(
                "auth.pinned_server_key",
                format!("expected {ED25519_PUBLIC_KEY_SIZE} bytes, got {}", public_key.len()),
            )
        })?;
        VerifyingKey::from_bytes(&pinned)
            .map_err(|_| CoreError::config("auth.pinned_server_key", "not a valid Ed25519 public key"))?;
        Ok(Self { pinned })
    }

    /// Pins a key given as standard base64.
    ///
    /// # Errors
    /// `Config` if the string is not base64 or not a valid key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| CoreError::config("auth.pinned_server_key", format!("invalid base64: {e}")))?;
        Self::new(&raw)
    }
}

impl HandshakeVerifier for PinnedKeyVerifier {
    fn verify(&self, scheme: u16, data: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        if !bool::from(self.pinned.as_slice().ct_eq(public_key)) {
            debug!("Peer public key does not match pinned key");
            return false;
        }
        verify_ed25519(scheme, data, signature, public_key)
    }
}

impl fmt::Debug for PinnedKeyVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedKeyVerifier")
            .field("pinned", &hex::encode(self.pinned))
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_layout() {
        let ctx = signature_context(&[0xAB; 32]);
        assert_eq!(ctx.len(), 64 + SERVER_SIGNATURE_CONTEXT.len() + 1 + 32);
        assert!(ctx[..64].iter().all(|&b| b == 0x20));
        assert_eq!(ctx[64 + SERVER_SIGNATURE_CONTEXT.len()], 0x00);
    }

    #[test]
    fn test_sign_verify() {
        let signer = Ed25519Signer::generate();
        let data = signature_context(&[1u8; 32]);
        let sig = signer.sign(&data).unwrap();

        assert!(Ed25519Verifier.verify(SCHEME_ED25519, &data, &sig, &signer.public_key()));
        assert!(!Ed25519Verifier.verify(SCHEME_ED25519, b"other", &sig, &signer.public_key()));
        assert!(!Ed25519Verifier.verify(0x0403, &data, &sig, &signer.public_key()));
        assert!(!Ed25519Verifier.verify(SCHEME_ED25519, &data, &sig[..63], &signer.public_key()));
    }

    #[test]
    fn test_pinned_key() {
        let signer = Ed25519Signer::generate();
        let other = Ed25519Signer::generate();
        let pinned = PinnedKeyVerifier::from_base64(&signer.public_key_base64()).unwrap();

        let data = b"transcript";
        let good = signer.sign(data).unwrap();
        let bad = other.sign(data).unwrap();

        assert!(pinned.verify(SCHEME_ED25519, data, &good, &signer.public_key()));
        assert!(!pinned.verify(SCHEME_ED25519, data, &bad, &other.public_key()));
    }

    #[test]
    fn test_pinned_key_rejects_garbage() {
        assert!(PinnedKeyVerifier::from_base64("not base64!").is_err());
        assert!(PinnedKeyVerifier::new(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_signer_from_bytes() {
        let a = Ed25519Signer::from_bytes(&[9u8; 32]).unwrap();
        let b = Ed25519Signer::from_bytes(&[9u8; 32]).unwrap();
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());
        assert!(Ed25519Signer::from_bytes(&[9u8; 16]).is_err());
    }

    #[test]
    fn test_debug_shows_public_only() {
        let signer = Ed25519Signer::from_bytes(&[5u8; 32]).unwrap();
        let debug = format!("{signer:?}");
        assert!(debug.contains(&hex::encode(signer.public_key_bytes())));
        assert!(!debug.contains(&hex::encode([5u8; 32])));
    }
}
