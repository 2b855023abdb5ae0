// ============================================
// File: crates/sealwire-core/src/protocol/version.rs
// ============================================
//! # Protocol Version
//!
//! ## Creation Reason
//! Both hellos and every record header carry a 16-bit version. This module
//! wraps it and implements the negotiation rule.
//!
//! ## Main Functionality
//! - `ProtocolVersion`: `u16` newtype with the two known versions
//! - `negotiate`: picks the version the responder answers with
//!
//! ## ⚠️ Important Note for Next Developer
//! - Values outside 0x0301..=0x0304 are rejected in record headers
//! - Config files use the dotted form ("1.2", "1.3")
//!
//! ## Last Modified
//! v0.1.0 - Initial version handling

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};

// ============================================
// ProtocolVersion
// ============================================

/// Wire protocol version.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    /// Version 1.2 (0x0303).
    pub const TLS12: Self = Self(0x0303);

    /// Version 1.3 (0x0304).
    pub const TLS13: Self = Self(0x0304);

    /// Lowest value accepted in a record header.
    const RECORD_MIN: u16 = 0x0301;

    /// Wire value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns `true` if this value may appear in a record header.
    #[must_use]
    pub const fn is_known(self) -> bool {
        self.0 >= Self::RECORD_MIN && self.0 <= Self::TLS13.0
    }

    /// Chooses the version to answer `offered` with, given our inclusive
    /// range `[min, max]`.
    ///
    /// # Errors
    /// `ProtocolVersion` if the result would fall below `min`.
    pub fn negotiate(offered: Self, min: Self, max: Self) -> Result<Self> {
        let chosen = offered.min(max);
        if chosen < min {
            return Err(CoreError::ProtocolVersion { got: offered.0 });
        }
        Ok(chosen)
    }
}

impl fmt::Debug for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtocolVersion(0x{:04x})", self.0)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::TLS12 => f.write_str("1.2"),
            Self::TLS13 => f.write_str("1.3"),
            Self(other) => write!(f, "0x{other:04x}"),
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1.2" => Ok(Self::TLS12),
            "1.3" => Ok(Self::TLS13),
            other => Err(CoreError::config(
                "protocol version",
                format!("unknown version '{other}', expected \"1.2\" or \"1.3\""),
            )),
        }
    }
}

impl From<u16> for ProtocolVersion {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

impl From<ProtocolVersion> for u16 {
    fn from(v: ProtocolVersion) -> Self {
        v.0
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================
// Tests
// ============================================
