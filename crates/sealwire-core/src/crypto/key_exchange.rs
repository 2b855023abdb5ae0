// ============================================
// File: crates/sealwire-core/src/crypto/key_exchange.rs
// ============================================
//! # Ephemeral Key Exchange
//!
//! ## Creation Reason
//! Each connection agrees on a fresh shared secret. Two group families
//! are supported: finite-field Diffie-Hellman over an explicit prime
//! (modular exponentiation) and X25519.
//!
//! ## Main Functionality
//! - `GroupParams`: finite-field `(prime, generator)` or X25519
//! - `KeyPair`: private scalar + encoded public value
//! - `generate_keypair` / `KeyPair::from_private`
//! - `compute_shared_secret` with peer-value validation
//! - `mod_pow`: square-and-multiply over `BigUint`
//!
//! ## Main Logical Flow
//! 1. Draw a private scalar uniformly from `[1, p-2]` (rejection sampling)
//! 2. `public = g^private mod p`, big-endian, left-padded to the prime size
//! 3. Validate the peer value (`2 <= peer <= p-2`), then `peer^private mod p`
//! 4. Reject a degenerate result of 1
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private scalars never appear in `Debug` and are zeroized on drop
//! - An invalid peer value is always an error, never silently replaced
//! - X25519 outputs that are all zero (small-order peer) are rejected
//!
//! ## Last Modified
//! v0.1.0 - Initial key exchange implementation

use std::fmt;

use num_bigint::BigUint;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::trace;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use sealwire_common::SecretBytes;

use crate::error::{CoreError, Result};
use crate::protocol::suites::NamedGroup;

use super::X25519_KEY_SIZE;

// ============================================
// Constants
// ============================================

/// RFC 3526 group 15 prime (3072 bits), generator 2.
const MODP3072_PRIME: [u8; 384] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xC9, 0x0F, 0xDA, 0xA2,
    0x21, 0x68, 0xC2, 0x34, 0xC4, 0xC6, 0x62, 0x8B, 0x80, 0xDC, 0x1C, 0xD1,
    0x29, 0x02, 0x4E, 0x08, 0x8A, 0x67, 0xCC, 0x74, 0x02, 0x0B, 0xBE, 0xA6,
    0x3B, 0x13, 0x9B, 0x22, 0x51, 0x4A, 0x08, 0x79, 0x8E, 0x34, 0x04, 0xDD,
    0xEF, 0x95, 0x19, 0xB3, 0xCD, 0x3A, 0x43, 0x1B, 0x30, 0x2B, 0x0A, 0x6D,
    0xF2, 0x5F, 0x14, 0x37, 0x4F, 0xE1, 0x35, 0x6D, 0x6D, 0x51, 0xC2, 0x45,
    0xE4, 0x85, 0xB5, 0x76, 0x62, 0x5E, 0x7E, 0xC6, 0xF4, 0x4C, 0x42, 0xE9,
    0xA6, 0x37, 0xED, 0x6B, 0x0B, 0xFF, 0x5C, 0xB6, 0xF4, 0x06, 0xB7, 0xED,
    0xEE, 0x38, 0x6B, 0xFB, 0x5A, 0x89, 0x9F, 0xA5, 0xAE, 0x9F, 0x24, 0x11,
    0x7C, 0x4B, 0x1F, 0xE6, 0x49, 0x28, 0x66, 0x51, 0xEC, 0xE4, 0x5B, 0x3D,
    0xC2, 0x00, 0x7C, 0xB8, 0xA1, 0x63, 0xBF, 0x05, 0x98, 0xDA, 0x48, 0x36,
    0x1C, 0x55, 0xD3, 0x9A, 0x69, 0x16, 0x3F, 0xA8, 0xFD, 0x24, 0xCF, 0x5F,
    0x83, 0x65, 0x5D, 0x23, 0xDC, 0xA3, 0xAD, 0x96, 0x1C, 0x62, 0xF3, 0x56,
    0x20, 0x85, 0x52, 0xBB, 0x9E, 0xD5, 0x29, 0x07, 0x70, 0x96, 0x96, 0x6D,
    0x67, 0x0C, 0x35, 0x4E, 0x4A, 0xBC, 0x98, 0x04, 0xF1, 0x74, 0x6C, 0x08,
    0xCA, 0x18, 0x21, 0x7C, 0x32, 0x90, 0x5E, 0x46, 0x2E, 0x36, 0xCE, 0x3B,
    0xE3, 0x9E, 0x77, 0x2C, 0x18, 0x0E, 0x86, 0x03, 0x9B, 0x27, 0x83, 0xA2,
    0xEC, 0x07, 0xA2, 0x8F, 0xB5, 0xC5, 0x5D, 0xF0, 0x6F, 0x4C, 0x52, 0xC9,
    0xDE, 0x2B, 0xCB, 0xF6, 0x95, 0x58, 0x17, 0x18, 0x39, 0x95, 0x49, 0x7C,
    0xEA, 0x95, 0x6A, 0xE5, 0x15, 0xD2, 0x26, 0x18, 0x98, 0xFA, 0x05, 0x10,
    0x15, 0x72, 0x8E, 0x5A, 0x8A, 0xAA, 0xC4, 0x2D, 0xAD, 0x33, 0x17, 0x0D,
    0x04, 0x50, 0x7A, 0x33, 0xA8, 0x55, 0x21, 0xAB, 0xDF, 0x1C, 0xBA, 0x64,
    0xEC, 0xFB, 0x85, 0x04, 0x58, 0xDB, 0xEF, 0x0A, 0x8A, 0xEA, 0x71, 0x57,
    0x5D, 0x06, 0x0C, 0x7D, 0xB3, 0x97, 0x0F, 0x85, 0xA6, 0xE1, 0xE4, 0xC7,
    0xAB, 0xF5, 0xAE, 0x8C, 0xDB, 0x09, 0x33, 0xD7, 0x1E, 0x8C, 0x94, 0xE0,
    0x4A, 0x25, 0x61, 0x9D, 0xCE, 0xE3, 0xD2, 0x26, 0x1A, 0xD2, 0xEE, 0x6B,
    0xF1, 0x2F, 0xFA, 0x06, 0xD9, 0x8A, 0x08, 0x64, 0xD8, 0x76, 0x02, 0x73,
    0x3E, 0xC8, 0x6A, 0x64, 0x52, 0x1F, 0x2B, 0x18, 0x17, 0x7B, 0x20, 0x0C,
    0xBB, 0xE1, 0x17, 0x57, 0x7A, 0x61, 0x5D, 0x6C, 0x77, 0x09, 0x88, 0xC0,
    0xBA, 0xD9, 0x46, 0xE2, 0x08, 0xE2, 0x4F, 0xA0, 0x74, 0xE5, 0xAB, 0x31,
    0x43, 0xDB, 0x5B, 0xFC, 0xE0, 0xFD, 0x10, 0x8E, 0x4B, 0x82, 0xD1, 0x20,
    0xA9, 0x3A, 0xD2, 0xCA, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

const MODP3072_GENERATOR: u32 = 2;

/// Resampling bound for finite-field key generation.
const MAX_KEYGEN_ATTEMPTS: usize = 64;

// ============================================
// GroupParams
// ============================================

/// Parameters of a finite-field group.
#[derive(Clone, PartialEq, Eq)]
pub struct FiniteFieldGroup {
    prime: BigUint,
    generator: BigUint,
    prime_len: usize,
}

impl FiniteFieldGroup {
    /// Creates a group from an explicit prime and generator.
    ///
    /// # Errors
    /// `Config` if `prime < 5` or the generator is outside `[2, p-2]`.
    pub fn new(prime: BigUint, generator: BigUint) -> Result<Self> {
        let five = BigUint::from(5u32);
        if prime < five {
            return Err(CoreError::config("prime", "must be at least 5"));
        }
        let two = BigUint::from(2u32);
        if generator < two || generator > &prime - &two {
            return Err(CoreError::config("generator", "must be in [2, p-2]"));
        }
        let prime_len = usize::try_from(prime.bits().div_ceil(8))
            .map_err(|_| CoreError::config("prime", "too large"))?;
        Ok(Self {
            prime,
            generator,
            prime_len,
        })
    }

    /// The prime modulus.
    #[must_use]
    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    /// The generator.
    #[must_use]
    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    /// Encoded size of group elements.
    #[must_use]
    pub fn element_len(&self) -> usize {
        self.prime_len
    }

    /// Returns `true` if `value` is in `[2, p-2]`.
    #[must_use]
    pub fn is_valid_public(&self, value: &BigUint) -> bool {
        let two = BigUint::from(2u32);
        *value >= two && *value <= &self.prime - &two
    }

    fn encode(&self, value: &BigUint) -> Vec<u8> {
        let raw = value.to_bytes_be();
        let mut out = vec![0u8; self.prime_len.saturating_sub(raw.len())];
        out.extend_from_slice(&raw);
        out
    }
}

impl fmt::Debug for FiniteFieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiniteFieldGroup")
            .field("bits", &self.prime.bits())
            .field("generator", &self.generator)
            .finish()
    }
}

/// Group a key pair lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupParams {
    /// Multiplicative group modulo a prime.
    FiniteField(FiniteFieldGroup),
    /// Curve25519 Montgomery ladder.
    X25519,
}

impl GroupParams {
    /// Explicit finite-field parameters.
    ///
    /// # Errors
    /// See [`FiniteFieldGroup::new`].
    pub fn finite_field(prime: BigUint, generator: BigUint) -> Result<Self> {
        FiniteFieldGroup::new(prime, generator).map(Self::FiniteField)
    }

    /// RFC 3526 3072-bit MODP group.
    #[must_use]
    pub fn modp3072() -> Self {
        let prime = BigUint::from_bytes_be(&MODP3072_PRIME);
        Self::FiniteField(FiniteFieldGroup {
            prime,
            generator: BigUint::from(MODP3072_GENERATOR),
            prime_len: MODP3072_PRIME.len(),
        })
    }

    /// Parameters for a negotiated group code, if implemented.
    #[must_use]
    pub fn for_named_group(group: NamedGroup) -> Option<Self> {
        match group {
            NamedGroup::X25519 => Some(Self::X25519),
            NamedGroup::MODP3072 => Some(Self::modp3072()),
            _ => None,
        }
    }

    /// Encoded size of a public value.
    #[must_use]
    pub fn public_len(&self) -> usize {
        match self {
            Self::FiniteField(ff) => ff.element_len(),
            Self::X25519 => X25519_KEY_SIZE,
        }
    }
}

// ============================================
// KeyPair
// ============================================

/// Private half of a key pair. Both variants wipe themselves on drop.
enum PrivateScalar {
    /// Big-endian exponent bytes.
    FiniteField(Zeroizing<Vec<u8>>),
    X25519(StaticSecret),
}

/// Ephemeral key pair.
pub struct KeyPair {
    group: GroupParams,
    private: PrivateScalar,
    public: Vec<u8>,
}

impl KeyPair {
    /// Builds a key pair from a known private scalar (big-endian for
    /// finite-field groups, 32 raw bytes for X25519).
    ///
    /// # Errors
    /// `KeyGeneration` if the scalar is out of range or the wrong size.
    pub fn from_private(group: &GroupParams, private: &[u8]) -> Result<Self> {
        match group {
            GroupParams::FiniteField(ff) => {
                let x = BigUint::from_bytes_be(private);
                let upper = ff.prime() - 2u32;
                if x < BigUint::from(1u32) || x > upper {
                    return Err(CoreError::key_generation("finite-field private scalar out of [1, p-2]"));
                }
                Ok(Self::from_ff_scalar(ff, x))
            }
            GroupParams::X25519 => {
                let bytes: [u8; X25519_KEY_SIZE] = private
                    .try_into()
                    .map_err(|_| CoreError::key_generation("X25519 private key must be 32 bytes"))?;
                let secret = StaticSecret::from(bytes);
                let public = X25519PublicKey::from(&secret).as_bytes().to_vec();
                Ok(Self {
                    group: GroupParams::X25519,
                    private: PrivateScalar::X25519(secret),
                    public,
                })
            }
        }
    }

    fn from_ff_scalar(ff: &FiniteFieldGroup, x: BigUint) -> Self {
        let public = mod_pow(ff.generator(), &x, ff.prime());
        Self {
            group: GroupParams::FiniteField(ff.clone()),
            public: ff.encode(&public),
            private: PrivateScalar::FiniteField(Zeroizing::new(x.to_bytes_be())),
        }
    }

    /// Encoded public value.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public
    }

    /// Group of this key pair.
    #[must_use]
    pub fn group(&self) -> &GroupParams {
        &self.group
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix_len = self.public.len().min(8);
        f.debug_struct("KeyPair")
            .field("group", &self.group)
            .field("public", &format_args!("{}...", hex::encode(&self.public[..prefix_len])))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

// ============================================
// Operations
// ============================================

/// Generates a fresh key pair from the OS random generator.
///
/// Finite-field publics are always in `[2, p-2]`, the range
/// [`compute_shared_secret`] accepts from a peer.
///
/// # Errors
/// `KeyGeneration` if the group is too small to sample from.
pub fn generate_keypair(group: &GroupParams) -> Result<KeyPair> {
    match group {
        GroupParams::FiniteField(ff) => {
            // Publics of 1 or p-1 would be refused by the peer
            for _ in 0..MAX_KEYGEN_ATTEMPTS {
                let keypair = KeyPair::from_ff_scalar(ff, sample_private_scalar(ff)?);
                if ff.is_valid_public(&BigUint::from_bytes_be(keypair.public_key())) {
                    trace!(bits = ff.prime().bits(), "Generated finite-field key pair");
                    return Ok(keypair);
                }
            }
            Err(CoreError::key_generation("generator yields no valid public value"))
        }
        GroupParams::X25519 => {
            let secret = StaticSecret::random_from_rng(OsRng);
            let public = X25519PublicKey::from(&secret).as_bytes().to_vec();
            trace!("Generated X25519 key pair");
            Ok(KeyPair {
                group: GroupParams::X25519,
                private: PrivateScalar::X25519(secret),
                public,
            })
        }
    }
}

/// Computes the shared secret with a peer's public value.
///
/// # Errors
/// - `InvalidPeerPublicKey` if the peer value is malformed, out of range,
///   or yields a degenerate secret
/// - `IllegalParameter` if `group` is not the key pair's group
pub fn compute_shared_secret(keypair: &KeyPair, peer_public: &[u8], group: &GroupParams) -> Result<SecretBytes> {
    if keypair.group() != group {
        return Err(CoreError::illegal_parameter("peer key share is for a different group"));
    }

    match (&keypair.private, group) {
        (PrivateScalar::FiniteField(x), GroupParams::FiniteField(ff)) => {
            if peer_public.len() != ff.element_len() {
                return Err(CoreError::invalid_peer_key(format!(
                    "expected {} bytes, got {}",
                    ff.element_len(),
                    peer_public.len()
                )));
            }
            let peer = BigUint::from_bytes_be(peer_public);
            if !ff.is_valid_public(&peer) {
                return Err(CoreError::invalid_peer_key("value outside [2, p-2]"));
            }

            let shared = mod_pow(&peer, &BigUint::from_bytes_be(x), ff.prime());
            if shared == BigUint::from(1u32) {
                return Err(CoreError::invalid_peer_key("degenerate shared secret"));
            }
            Ok(SecretBytes::new(ff.encode(&shared)))
        }
        (PrivateScalar::X25519(secret), GroupParams::X25519) => {
            let peer: [u8; X25519_KEY_SIZE] = peer_public.try_into().map_err(|_| {
                CoreError::invalid_peer_key(format!("expected {X25519_KEY_SIZE} bytes, got {}", peer_public.len()))
            })?;
            let shared = secret.diffie_hellman(&X25519PublicKey::from(peer));
            if !shared.was_contributory() {
                return Err(CoreError::invalid_peer_key("non-contributory X25519 output"));
            }
            Ok(SecretBytes::from_slice(shared.as_bytes()))
        }
        _ => Err(CoreError::illegal_parameter("key pair does not match its group")),
    }
}

/// `base^exp mod modulus` by left-to-right binary square-and-multiply.
#[must_use]
pub fn mod_pow(base: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint {
    let one = BigUint::from(1u32);
    if *modulus == one {
        return BigUint::from(0u32);
    }

    let base = base % modulus;
    let mut result = one;
    let exp_bytes = Zeroizing::new(exp.to_bytes_be());
    for byte in exp_bytes.iter() {
        for bit in (0..8).rev() {
            result = &result * &result % modulus;
            if (byte >> bit) & 1 == 1 {
                result = &result * &base % modulus;
            }
        }
    }
    result
}

/// Uniform scalar in `[1, p-2]` by rejection sampling.
fn sample_private_scalar(ff: &FiniteFieldGroup) -> Result<BigUint> {
    let upper = ff.prime() - 2u32;
    let bits = upper.bits();
    if bits == 0 {
        return Err(CoreError::key_generation("group too small"));
    }
    let len = usize::try_from(bits.div_ceil(8)).map_err(|_| CoreError::key_generation("group too large"))?;
    let excess_bits = len * 8 - usize::try_from(bits).unwrap_or(len * 8);
    let top_mask = 0xFFu8 >> excess_bits;

    let mut buf = Zeroizing::new(vec![0u8; len]);
    let one = BigUint::from(1u32);
    loop {
        OsRng.fill_bytes(&mut buf);
        buf[0] &= top_mask;
        let candidate = BigUint::from_bytes_be(&buf);
        if candidate >= one && candidate <= upper {
            return Ok(candidate);
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_group() -> GroupParams {
        GroupParams::finite_field(BigUint::from(23u32), BigUint::from(5u32)).unwrap()
    }

    #[test]
    fn test_toy_group_vector() {
        let group = toy_group();
        let alice = KeyPair::from_private(&group, &[6]).unwrap();
        let bob = KeyPair::from_private(&group, &[15]).unwrap();

        assert_eq!(alice.public_key(), &[8]);
        assert_eq!(bob.public_key(), &[19]);

        let s1 = compute_shared_secret(&alice, bob.public_key(), &group).unwrap();
        let s2 = compute_shared_secret(&bob, alice.public_key(), &group).unwrap();
        assert_eq!(s1.expose(), &[2]);
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_mod_pow_matches_builtin() {
        let p = BigUint::from(1_000_000_007u64);
        let b = BigUint::from(123_456_789u64);
        let e = BigUint::from(987_654_321u64);
        assert_eq!(mod_pow(&b, &e, &p), b.modpow(&e, &p));
        assert_eq!(mod_pow(&b, &BigUint::from(0u32), &p), BigUint::from(1u32));
    }

    #[test]
    fn test_peer_value_range_checks() {
        let group = toy_group();
        let kp = KeyPair::from_private(&group, &[6]).unwrap();
        for bad in [0u8, 1, 22, 23, 200] {
            let result = compute_shared_secret(&kp, &[bad], &group);
            assert!(
                matches!(result, Err(CoreError::InvalidPeerPublicKey { .. })),
                "peer value {bad} accepted"
            );
        }
        assert!(matches!(
            compute_shared_secret(&kp, &[0, 8], &group),
            Err(CoreError::InvalidPeerPublicKey { .. })
        ));
    }

    #[test]
    fn test_from_private_range() {
        let group = toy_group();
        assert!(KeyPair::from_private(&group, &[0]).is_err());
        assert!(KeyPair::from_private(&group, &[22]).is_err());
        assert!(KeyPair::from_private(&group, &[21]).is_ok());
    }

    #[test]
    fn test_generated_publics_in_range() {
        let group = toy_group();
        for _ in 0..200 {
            let kp = generate_keypair(&group).unwrap();
            let public = kp.public_key()[0];
            assert!((2..=21).contains(&public), "public {public} outside [2, p-2]");
        }
    }

    #[test]
    fn test_generated_pairs_always_agree() {
        let group = toy_group();
        for _ in 0..500 {
            let a = generate_keypair(&group).unwrap();
            let b = generate_keypair(&group).unwrap();
            let s1 = compute_shared_secret(&a, b.public_key(), &group).unwrap();
            let s2 = compute_shared_secret(&b, a.public_key(), &group).unwrap();
            assert_eq!(s1, s2);
        }
    }

    #[test]
    fn test_x25519_agreement() {
        let a = generate_keypair(&GroupParams::X25519).unwrap();
        let b = generate_keypair(&GroupParams::X25519).unwrap();
        assert_eq!(a.public_key().len(), 32);

        let s1 = compute_shared_secret(&a, b.public_key(), &GroupParams::X25519).unwrap();
        let s2 = compute_shared_secret(&b, a.public_key(), &GroupParams::X25519).unwrap();
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_x25519_rejects_small_order_and_bad_length() {
        let a = generate_keypair(&GroupParams::X25519).unwrap();
        assert!(matches!(
            compute_shared_secret(&a, &[0u8; 32], &GroupParams::X25519),
            Err(CoreError::InvalidPeerPublicKey { .. })
        ));
        assert!(matches!(
            compute_shared_secret(&a, &[9u8; 31], &GroupParams::X25519),
            Err(CoreError::InvalidPeerPublicKey { .. })
        ));
    }

    #[test]
    fn test_group_mismatch() {
        let a = generate_keypair(&GroupParams::X25519).unwrap();
        assert!(compute_shared_secret(&a, &[5], &toy_group()).is_err());
    }

    #[test]
    fn test_modp3072_agreement() {
        let group = GroupParams::modp3072();
        let a = generate_keypair(&group).unwrap();
        let b = generate_keypair(&group).unwrap();
        assert_eq!(a.public_key().len(), 384);

        let s1 = compute_shared_secret(&a, b.public_key(), &group).unwrap();
        let s2 = compute_shared_secret(&b, a.public_key(), &group).unwrap();
        assert_eq!(s1.len(), 384);
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_debug_redacts_private() {
        let kp = KeyPair::from_private(&toy_group(), &[6]).unwrap();
        let debug = format!("{kp:?}");
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_invalid_group_params() {
        assert!(GroupParams::finite_field(BigUint::from(3u32), BigUint::from(2u32)).is_err());
        assert!(GroupParams::finite_field(BigUint::from(23u32), BigUint::from(1u32)).is_err());
        assert!(GroupParams::finite_field(BigUint::from(23u32), BigUint::from(22u32)).is_err());
    }
}
