// ============================================
// File: crates/sealwire-core/src/protocol/mod.rs
// ============================================
//! # Wire Protocol
//!
//! ## Creation Reason
//! Pure, stateless encoding and decoding of everything that crosses the
//! wire. Nothing in here holds keys or connection state.
//!
//! ## Main Functionality
//! - [`record`]: record framing (outermost layer)
//! - [`handshake`]: handshake message framing
//! - [`extensions`]: hello extensions and their typed bodies
//! - [`messages`]: ClientHello, ServerHello, Certificate, CertificateVerify, Finished
//! - [`version`], [`suites`]: version, cipher suite and group codes
//! - [`codec`]: shared integer/length-prefix primitives
//!
//! ## Layering
//! ```text
//! ┌──────────────────────── Record ─────────────────────────┐
//! │ type | version | length | payload                        │
//! │                           └─ Handshake message(s)        │
//! │                              type | len24 | body         │
//! │                                            └─ Hello/...  │
//! │                                               └─ Extensions
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol implementation

pub mod codec;
pub mod extensions;
pub mod handshake;
pub mod messages;
pub mod record;
pub mod suites;
pub mod version;

pub use codec::WireMessage;
pub use extensions::{extension_type, Extension, KeyShareEntry};
pub use handshake::{decode_handshake, encode_handshake, HandshakeMessage, HandshakeType};
pub use messages::{Certificate, CertificateVerify, ClientHello, Finished, ServerHello};
pub use record::{decode_record, encode_record, ContentType, Record, RECORD_HEADER_SIZE};
pub use suites::{CipherSuite, NamedGroup};
pub use version::ProtocolVersion;
