// ============================================
// File: crates/sealwire-core/src/lib.rs
// ============================================
//! # SealWire Core - Handshake and Record Engine
//!
//! ## Creation Reason
//! Implements the secure transport protocol without touching a socket:
//! wire codecs, key exchange, key schedule, record protection and the
//! connection state machine.
//!
//! ## Main Functionality
//! - [`protocol`]: records, handshake messages and extensions on the wire
//! - [`crypto`]: X25519 / finite-field exchange, HKDF schedule, AEAD, signatures
//! - [`connection`]: `Connection` state machine and record layer
//! - [`alert`]: alert codes and encoding
//! - [`config`]: TOML engine configuration and runtime collaborators
//! - [`error`]: `CoreError` and its alert mapping
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              sealwire-transport                     │
//! │                    │                                │
//! │                    ▼                                │
//! │              sealwire-core  ◄── You are here        │
//! │                    │                                │
//! │                    ▼                                │
//! │             sealwire-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - No I/O and no async in this crate
//! - Key material lives in `SecretBytes` and is never logged
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alert;
pub mod config;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod protocol;

// Re-export commonly used items at crate root
pub use alert::{Alert, AlertDescription, AlertLevel};
pub use config::{ConnectionConfig, EngineConfig};
pub use connection::{Action, Connection, HandshakePhase, Negotiated, Role};
pub use error::{CoreError, FramingError, Result};
