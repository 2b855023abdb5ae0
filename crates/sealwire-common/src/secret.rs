// ============================================
// File: crates/sealwire-common/src/secret.rs
// ============================================
//! # Secret Byte Buffers
//!
//! ## Creation Reason
//! Every intermediate secret in the handshake (shared secrets, HKDF
//! outputs, traffic keys, IVs, finished keys) needs the same treatment:
//! owned, never printed, compared in constant time and wiped when the
//! owner goes away.
//!
//! ## Main Functionality
//! - `SecretBytes`: variable-length, zeroize-on-drop byte buffer
//!
//! ## ⚠️ Important Note for Next Developer
//! - Do not add `Display` or a transparent `Debug`
//! - `expose()` is the only way to read the bytes; keep call sites short-lived
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Owned secret key material, wiped from memory on drop.
///
/// # Example
/// ```
/// use sealwire_common::SecretBytes;
///
/// let key = SecretBytes::new(vec![7u8; 32]);
/// assert_eq!(key.len(), 32);
/// assert_eq!(format!("{key:?}"), "SecretBytes([REDACTED; 32])");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    /// Takes ownership of `bytes`.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Copies `bytes` into a new secret buffer.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Buffer of `len` zero bytes.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self(vec![0u8; len])
    }

    /// Read access to the secret bytes.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Mutable access, used by KDF outputs that fill the buffer in place.
    pub fn expose_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Constant-time equality against raw bytes.
    #[must_use]
    pub fn ct_eq_bytes(&self, other: &[u8]) -> bool {
        self.0.len() == other.len() && bool::from(self.0.as_slice().ct_eq(other))
    }
}

impl PartialEq for SecretBytes {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq_bytes(&other.0)
    }
}

impl Eq for SecretBytes {}

impl From<Vec<u8>> for SecretBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {}])", self.0.len())
    }
}

// ============================================
// Tests
// ============================================
