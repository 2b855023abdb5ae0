// ============================================
// File: crates/sealwire-transport/src/lib.rs
// ============================================
//! # SealWire Transport - Async Stream Drivers
//!
//! ## Creation Reason
//! `sealwire-core` is sans-I/O. This crate moves its bytes over real
//! and in-memory streams with tokio.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`stream`]: `ByteStream` trait, `MemoryPipe`, `IoStream` adapter
//! - [`driver`]: `SecureStream`, one connection pumped over one stream
//! - [`acceptor`]: responder handshakes plus a live-connection registry
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              sealwire-transport  ◄── You are here   │
//! │                    │                                │
//! │                    ▼                                │
//! │              sealwire-core                          │
//! │                    │                                │
//! │                    ▼                                │
//! │             sealwire-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! application ──send──► SecureStream ──records──► ByteStream ──► peer
//! application ◄─recv─── SecureStream ◄─records─── ByteStream ◄── peer
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - One `SecureStream` per task; it is not shared
//! - All protocol decisions stay in `sealwire-core`
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod acceptor;
pub mod driver;
pub mod error;
pub mod stream;

// Re-export commonly used items at crate root
pub use acceptor::{AcceptedStream, Acceptor, ConnectionInfo, ConnectionRegistry};
pub use driver::{SecureStream, StreamStats};
pub use error::{Result, TransportError};
pub use stream::{ByteStream, IoStream, MemoryPipe};
