// ============================================
// File: crates/sealwire-common/src/lib.rs
// ============================================
//! # SealWire Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Types and helpers shared by the protocol engine and the transport
//! drivers.
//!
//! ## Main Functionality
//! - [`error`]: Common error type and result alias
//! - [`secret`]: `SecretBytes`, the zeroizing buffer used for all key material
//! - [`types`]: `ConnectionId`
//! - [`logging`]: `tracing-subscriber` initialisation
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              sealwire-transport                     │
//! │                    │                                │
//! │                    ▼                                │
//! │              sealwire-core                          │
//! │                    │                                │
//! │                    ▼                                │
//! │             sealwire-common  ◄── You are here       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Leaf crate: no internal dependencies
//! - Anything holding key material must zeroize on drop
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod logging;
pub mod secret;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use secret::SecretBytes;
pub use types::ConnectionId;
