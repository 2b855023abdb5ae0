// ============================================
// File: crates/sealwire-core/src/connection/mod.rs
// ============================================
//! # Connection Engine
//!
//! ## Creation Reason
//! Everything stateful about one connection: the record layer, the
//! handshake state machine and the hooks it reports through.
//!
//! ## Main Functionality
//! - [`machine`]: `Connection`, the sans-I/O state machine
//! - [`record_layer`]: buffering, fragmentation and record protection
//! - [`state`]: roles, phases and negotiated parameters
//! - [`action`]: what the caller must do after each call
//! - [`observer`]: phase, alert and error notifications
//!
//! ## Last Modified
//! v0.1.0 - Initial connection engine

pub mod action;
pub mod machine;
pub mod observer;
pub mod record_layer;
pub mod state;

pub use action::Action;
pub use machine::Connection;
pub use observer::{AlertDirection, ConnectionObserver, TracingObserver};
pub use record_layer::RecordLayer;
pub use state::{HandshakePhase, Negotiated, Role};
