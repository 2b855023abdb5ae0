// ============================================
// File: crates/sealwire-core/src/crypto/kdf.rs
// ============================================
//! # Key Derivation Functions
//!
//! ## Creation Reason
//! HKDF-SHA256 building blocks for the key schedule: extract, expand over
//! a structured label, transcript-bound secret derivation, and the
//! traffic key split.
//!
//! ## Main Functionality
//! - `extract`: HKDF-Extract (absent salt = 32 zero bytes)
//! - `expand_label`: HKDF-Expand over `HkdfLabel`
//! - `derive_secret`: `expand_label(secret, label, transcript_hash, 32)`
//! - `derive_traffic_keys`: four purpose-separated outputs
//! - `finished_mac` / `verify_finished_mac`: HMAC-SHA256 over a transcript hash
//!
//! ## HkdfLabel
//! ```text
//! length (2) | label_len (1) | "tls13 " + label | context_len (1) | context
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every output is a `SecretBytes`; never copy into a plain `Vec`
//! - MAC comparison goes through `Mac::verify_slice` (constant time)
//!
//! ## Last Modified
//! v0.1.0 - Initial key derivation

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use sealwire_common::SecretBytes;

use crate::error::{CoreError, Result};

use super::{AEAD_IV_SIZE, HASH_SIZE};

type HmacSha256 = Hmac<Sha256>;

/// Prefix of every expanded label.
pub const LABEL_PREFIX: &[u8] = b"tls13 ";

// ============================================
// Hash Helpers
// ============================================

/// SHA-256 of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; HASH_SIZE] {
    Sha256::digest(data).into()
}

/// SHA-256 of the empty string, the context of "derived" steps.
#[must_use]
pub fn empty_hash() -> [u8; HASH_SIZE] {
    sha256(&[])
}

// ============================================
// HKDF
// ============================================

/// HKDF-Extract. `None` salt means 32 zero bytes.
#[must_use]
pub fn extract(salt: Option<&[u8]>, ikm: &[u8]) -> SecretBytes {
    let zero_salt = [0u8; HASH_SIZE];
    let (prk, _) = Hkdf::<Sha256>::extract(Some(salt.unwrap_or(&zero_salt)), ikm);
    let mut prk: [u8; HASH_SIZE] = prk.into();
    let out = SecretBytes::from_slice(&prk);
    prk.zeroize();
    out
}

/// Builds the `HkdfLabel` info structure.
///
/// # Errors
/// `KeyDerivation` if the label or context is longer than 255 bytes or
/// the length does not fit in 16 bits.
pub fn hkdf_label(label: &str, context: &[u8], length: usize) -> Result<Vec<u8>> {
    let full_label_len = LABEL_PREFIX.len() + label.len();
    let full_label_len =
        u8::try_from(full_label_len).map_err(|_| CoreError::key_derivation(format!("label '{label}' too long")))?;
    let context_len =
        u8::try_from(context.len()).map_err(|_| CoreError::key_derivation("context longer than 255 bytes"))?;
    let length = u16::try_from(length).map_err(|_| CoreError::key_derivation("output length exceeds 65535"))?;

    let mut info = Vec::with_capacity(4 + usize::from(full_label_len) + context.len());
    info.extend_from_slice(&length.to_be_bytes());
    info.push(full_label_len);
    info.extend_from_slice(LABEL_PREFIX);
    info.extend_from_slice(label.as_bytes());
    info.push(context_len);
    info.extend_from_slice(context);
    Ok(info)
}

/// HKDF-Expand of `secret` over the labelled info.
///
/// # Errors
/// `KeyDerivation` if `secret` is not a valid PRK or `length` exceeds
/// 255 hash outputs.
pub fn expand_label(secret: &SecretBytes, label: &str, context: &[u8], length: usize) -> Result<SecretBytes> {
    let hk = Hkdf::<Sha256>::from_prk(secret.expose())
        .map_err(|_| CoreError::key_derivation("pseudo-random key shorter than hash length"))?;
    let info = hkdf_label(label, context, length)?;

    let mut okm = SecretBytes::zeroed(length);
    hk.expand(&info, okm.expose_mut())
        .map_err(|_| CoreError::key_derivation(format!("HKDF expansion failed for {length} bytes")))?;
    Ok(okm)
}

/// Hash-length secret bound to a transcript hash.
///
/// # Errors
/// See [`expand_label`].
pub fn derive_secret(secret: &SecretBytes, label: &str, transcript_hash: &[u8]) -> Result<SecretBytes> {
    expand_label(secret, label, transcript_hash, HASH_SIZE)
}

// ============================================
// Traffic Keys
// ============================================

/// Keys and IVs for both directions.
#[derive(Debug, Clone)]
pub struct TrafficKeys {
    /// Initiator-to-responder AEAD key.
    pub client_key: SecretBytes,
    /// Responder-to-initiator AEAD key.
    pub server_key: SecretBytes,
    /// Initiator-to-responder nonce base.
    pub client_iv: SecretBytes,
    /// Responder-to-initiator nonce base.
    pub server_iv: SecretBytes,
}

/// Derives the four traffic outputs from `secret`, each under its own
/// label and bound to `transcript_hash`.
///
/// # Errors
/// See [`expand_label`].
pub fn derive_traffic_keys(secret: &SecretBytes, transcript_hash: &[u8], key_len: usize) -> Result<TrafficKeys> {
    Ok(TrafficKeys {
        client_key: expand_label(secret, "c key", transcript_hash, key_len)?,
        server_key: expand_label(secret, "s key", transcript_hash, key_len)?,
        client_iv: expand_label(secret, "c iv", transcript_hash, AEAD_IV_SIZE)?,
        server_iv: expand_label(secret, "s iv", transcript_hash, AEAD_IV_SIZE)?,
    })
}

// ============================================
// Finished MAC
// ============================================

/// HMAC-SHA256 of a transcript hash under a finished key.
///
/// # Errors
/// `KeyDerivation` if the key is rejected by HMAC (never for 32-byte keys).
pub fn finished_mac(finished_key: &SecretBytes, transcript_hash: &[u8]) -> Result<[u8; HASH_SIZE]> {
    let mut mac = HmacSha256::new_from_slice(finished_key.expose())
        .map_err(|_| CoreError::key_derivation("invalid finished key"))?;
    mac.update(transcript_hash);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time check of received verify data.
///
/// # Errors
/// `HandshakeVerificationFailed` if the MAC does not match.
pub fn verify_finished_mac(finished_key: &SecretBytes, transcript_hash: &[u8], received: &[u8]) -> Result<()> {
    let mut mac = HmacSha256::new_from_slice(finished_key.expose())
        .map_err(|_| CoreError::key_derivation("invalid finished key"))?;
    mac.update(transcript_hash);
    mac.verify_slice(received)
        .map_err(|_| CoreError::verification_failed("Finished verify data mismatch"))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_hash_vector() {
        assert_eq!(
            hex::encode(empty_hash()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_rfc8448_early_secret() {
        // Early secret of a handshake without PSK.
        let early = extract(None, &[0u8; 32]);
        assert_eq!(
            hex::encode(early.expose()),
            "33ad0a1c607ec03b09e6cd9893680ce210adf300aa1f2660e1b22e10f170f92a"
        );
    }

    #[test]
    fn test_rfc8448_derived_secret() {
        let early = extract(None, &[0u8; 32]);
        let derived = derive_secret(&early, "derived", &empty_hash()).unwrap();
        assert_eq!(
            hex::encode(derived.expose()),
            "6f2615a108c702c5678f54fc9dbab69716c076189c48250cebeac3576c3611ba"
        );
    }

    #[test]
    fn test_hkdf_label_layout() {
        let info = hkdf_label("key", &[], 16).unwrap();
        assert_eq!(hex::encode(&info), "001009746c733133206b657900");
    }

    #[test]
    fn test_hkdf_label_limits() {
        assert!(hkdf_label(&"x".repeat(250), &[], 16).is_err());
        assert!(hkdf_label("key", &[0u8; 256], 16).is_err());
    }

    #[test]
    fn test_traffic_keys_are_distinct() {
        let secret = extract(None, b"input keying material");
        let keys = derive_traffic_keys(&secret, &sha256(b"transcript"), 32).unwrap();

        assert_eq!(keys.client_key.len(), 32);
        assert_eq!(keys.client_iv.len(), AEAD_IV_SIZE);
        assert_ne!(keys.client_key, keys.server_key);
        assert_ne!(keys.client_iv, keys.server_iv);
    }

    #[test]
    fn test_traffic_keys_bound_to_transcript() {
        let secret = extract(None, b"ikm");
        let a = derive_traffic_keys(&secret, &sha256(b"one"), 16).unwrap();
        let b = derive_traffic_keys(&secret, &sha256(b"two"), 16).unwrap();
        let c = derive_traffic_keys(&secret, &sha256(b"one"), 16).unwrap();
        assert_ne!(a.client_key, b.client_key);
        assert_eq!(a.client_key, c.client_key);
    }

    #[test]
    fn test_finished_mac_verify() {
        let key = SecretBytes::new(vec![0x0b; 32]);
        let hash = sha256(b"messages");
        let tag = finished_mac(&key, &hash).unwrap();

        assert!(verify_finished_mac(&key, &hash, &tag).is_ok());

        let mut bad = tag;
        bad[0] ^= 1;
        assert!(matches!(
            verify_finished_mac(&key, &hash, &bad),
            Err(CoreError::HandshakeVerificationFailed { .. })
        ));
    }

    #[test]
    fn test_expand_rejects_short_prk() {
        let short = SecretBytes::new(vec![1u8; 8]);
        assert!(expand_label(&short, "c key", &[], 32).is_err());
    }
}
