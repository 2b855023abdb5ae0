// ============================================
// File: crates/sealwire-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Everything key-bearing in the handshake engine lives here, built on
//! RustCrypto and dalek primitives.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`key_exchange`]: finite-field DH and X25519 ephemeral key pairs
//! - [`kdf`]: HKDF-SHA256 extract/expand-label and Finished MACs
//! - [`key_schedule`]: staged secrets (early, handshake, master)
//! - [`transcript`]: ordered handshake bytes and their running hash
//! - [`aead`]: per-direction record protection
//! - [`auth`]: pluggable signing and verification of the transcript
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │   ephemeral DH ──► shared secret                            │
//! │                        │                                    │
//! │   0 ──► Early ──derived──► Handshake ──derived──► Master    │
//! │                               │                    │        │
//! │                     H(CH..SH) ▼          H(CH..SF) ▼        │
//! │                   handshake traffic   application traffic   │
//! │                   + finished keys                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Secret material is `SecretBytes` (zeroized on drop, redacted Debug)
//! - NEVER roll your own primitives; only composition lives here
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod aead;
pub mod auth;
pub mod kdf;
pub mod key_exchange;
pub mod key_schedule;
pub mod transcript;

pub use aead::{AeadCipher, RecordProtection};
pub use auth::{Ed25519Signer, Ed25519Verifier, HandshakeSigner, HandshakeVerifier, PinnedKeyVerifier};
pub use kdf::TrafficKeys;
pub use key_exchange::{compute_shared_secret, generate_keypair, GroupParams, KeyPair};
pub use key_schedule::{KeySchedule, ScheduleStage};
pub use transcript::Transcript;

// ============================================
// Constants
// ============================================

/// Size of an X25519 scalar or public key in bytes.
pub const X25519_KEY_SIZE: usize = 32;

/// Size of a SHA-256 output in bytes.
pub const HASH_SIZE: usize = 32;

/// Size of an AEAD nonce (and traffic IV) in bytes.
pub const AEAD_IV_SIZE: usize = 12;

/// Size of an AEAD authentication tag in bytes.
pub const AEAD_TAG_SIZE: usize = 16;

/// Size of an Ed25519 public key in bytes.
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of an Ed25519 signature in bytes.
pub const ED25519_SIGNATURE_SIZE: usize = 64;
