// ============================================
// File: crates/sealwire-core/src/protocol/suites.rs
// ============================================
//! # Cipher Suites and Named Groups
//!
//! ## Creation Reason
//! Hellos carry 16-bit codes for cipher suites and key-exchange groups.
//! Both are open-ended on the wire, so they are newtypes with named
//! constants rather than closed enums: an unknown code from the peer is
//! simply not selected.
//!
//! ## Main Functionality
//! - `CipherSuite`: AEAD + hash pairing; only SHA-256 suites are usable
//! - `NamedGroup`: key-exchange group codes, including the private-use
//!   `MODP3072` finite-field group
//! - Config names for both (serde as strings)
//!
//! ## Last Modified
//! v0.1.0 - Initial suite definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

// ============================================
// CipherSuite
// ============================================

/// Cipher suite code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    /// AES-128-GCM with SHA-256.
    pub const TLS_AES_128_GCM_SHA256: Self = Self(0x1301);
    /// AES-256-GCM with SHA-384 (recognised, not implemented).
    pub const TLS_AES_256_GCM_SHA384: Self = Self(0x1302);
    /// ChaCha20-Poly1305 with SHA-256.
    pub const TLS_CHACHA20_POLY1305_SHA256: Self = Self(0x1303);
    /// Legacy ECDHE-RSA AES-128-GCM (recognised, not implemented).
    pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0xC02F);
    /// Legacy ECDHE-RSA AES-256-GCM (recognised, not implemented).
    pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0xC030);

    const NAMES: [(Self, &'static str); 5] = [
        (Self::TLS_AES_128_GCM_SHA256, "TLS_AES_128_GCM_SHA256"),
        (Self::TLS_AES_256_GCM_SHA384, "TLS_AES_256_GCM_SHA384"),
        (Self::TLS_CHACHA20_POLY1305_SHA256, "TLS_CHACHA20_POLY1305_SHA256"),
        (
            Self::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        ),
        (
            Self::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        ),
    ];

    /// Wire value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Registered name, if known.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        Self::NAMES.iter().find(|(s, _)| *s == self).map(|(_, n)| *n)
    }

    /// Returns `true` if this engine has an AEAD for the suite.
    #[must_use]
    pub fn is_implemented(self) -> bool {
        self == Self::TLS_AES_128_GCM_SHA256 || self == Self::TLS_CHACHA20_POLY1305_SHA256
    }
}

impl fmt::Debug for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "CipherSuite(0x{:04x})", self.0),
        }
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for CipherSuite {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == s)
            .map(|(suite, _)| *suite)
            .ok_or_else(|| CoreError::config("cipher_suites", format!("unknown cipher suite '{s}'")))
    }
}

// ============================================
// NamedGroup
// ============================================

/// Key-exchange group code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamedGroup(pub u16);

impl NamedGroup {
    /// NIST P-256 (recognised, not implemented).
    pub const SECP256R1: Self = Self(0x0017);
    /// NIST P-384 (recognised, not implemented).
    pub const SECP384R1: Self = Self(0x0018);
    /// Curve25519 Diffie-Hellman.
    pub const X25519: Self = Self(0x001D);
    /// 3072-bit MODP group 15 (RFC 3526), carried on a private-use code.
    pub const MODP3072: Self = Self(0x01FC);

    const NAMES: [(Self, &'static str); 4] = [
        (Self::SECP256R1, "secp256r1"),
        (Self::SECP384R1, "secp384r1"),
        (Self::X25519, "x25519"),
        (Self::MODP3072, "modp3072"),
    ];

    /// Wire value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Registered name, if known.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        Self::NAMES.iter().find(|(g, _)| *g == self).map(|(_, n)| *n)
    }

    /// Returns `true` if key exchange is implemented for the group.
    #[must_use]
    pub fn is_implemented(self) -> bool {
        self == Self::X25519 || self == Self::MODP3072
    }
}

impl fmt::Debug for NamedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "NamedGroup(0x{:04x})", self.0),
        }
    }
}

impl fmt::Display for NamedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for NamedGroup {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == s)
            .map(|(group, _)| *group)
            .ok_or_else(|| CoreError::config("groups", format!("unknown group '{s}'")))
    }
}

// ============================================
// Serde (config names)
// ============================================

macro_rules! serde_by_name {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self.name() {
                    Some(name) => serializer.serialize_str(name),
                    None => serializer.serialize_u16(self.0),
                }
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

serde_by_name!(CipherSuite);
serde_by_name!(NamedGroup);

// ============================================
// Tests
// ============================================
