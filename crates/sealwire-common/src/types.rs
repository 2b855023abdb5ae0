// ============================================
// File: crates/sealwire-common/src/types.rs
// ============================================
//! # Shared Type Definitions
//!
//! ## Creation Reason
//! Connections need a stable identifier for log correlation and for the
//! acceptor's registry. It is never sent on the wire.
//!
//! ## Main Functionality
//! - `ConnectionId`: 16 random bytes, hex `Display`/`FromStr`, serde as a hex string
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CommonError;

// ============================================
// Constants
// ============================================

/// Size of a `ConnectionId` in bytes.
pub const CONNECTION_ID_SIZE: usize = 16;

// ============================================
// ConnectionId
// ============================================

/// Local identifier of one connection.
///
/// # Example
/// ```
/// use sealwire_common::types::ConnectionId;
///
/// let id = ConnectionId::generate();
/// let parsed: ConnectionId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId([u8; CONNECTION_ID_SIZE]);

impl ConnectionId {
    /// Generates a new random identifier.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = [0u8; CONNECTION_ID_SIZE];
        rand::thread_rng().fill_bytes(&mut id);
        Self(id)
    }

    /// Builds an identifier from exactly 16 bytes.
    ///
    /// # Errors
    /// `InvalidLength` if `bytes` is not 16 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CommonError> {
        let id: [u8; CONNECTION_ID_SIZE] = bytes
            .try_into()
            .map_err(|_| CommonError::invalid_length(CONNECTION_ID_SIZE, bytes.len()))?;
        Ok(Self(id))
    }

    /// Raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; CONNECTION_ID_SIZE] {
        &self.0
    }

    /// Short form used in log lines (first 4 bytes).
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({}...)", self.short())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ConnectionId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)
            .map_err(|e| CommonError::invalid_input("connection_id", e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ConnectionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique() {
        assert_ne!(ConnectionId::generate(), ConnectionId::generate());
    }

    #[test]
    fn test_display_roundtrip() {
        let id = ConnectionId::from_bytes(&[0xab; 16]).unwrap();
        assert_eq!(id.to_string(), "ab".repeat(16));
        assert_eq!(id.to_string().parse::<ConnectionId>().unwrap(), id);
        assert_eq!(format!("{id:?}"), "ConnectionId(abababab...)");
    }

    #[test]
    fn test_from_bytes_wrong_length() {
        assert!(matches!(
            ConnectionId::from_bytes(&[1, 2, 3]),
            Err(CommonError::InvalidLength { expected: 16, actual: 3 })
        ));
        assert!("zz".parse::<ConnectionId>().is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let id = ConnectionId::from_bytes(&[0x01; 16]).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(16)));
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
