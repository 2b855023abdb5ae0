// ============================================
// File: crates/sealwire-core/src/connection/observer.rs
// ============================================
//! # Connection Observer
//!
//! ## Creation Reason
//! Phase changes, alerts and failures are reported to a pluggable
//! observer instead of being printed. The default observer turns them
//! into structured `tracing` events.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Observers are called synchronously from inside `feed`; keep them cheap
//! - Never pass key material to an observer
//!
//! ## Last Modified
//! v0.1.0 - Initial observer

use tracing::{debug, info, warn};

use sealwire_common::ConnectionId;

use crate::alert::Alert;
use crate::error::CoreError;

use super::state::{HandshakePhase, Role};

/// Direction of an alert relative to this connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDirection {
    /// We sent it.
    Sent,
    /// The peer sent it.
    Received,
}

/// Receives connection events.
pub trait ConnectionObserver: Send + Sync {
    /// Called after every phase transition.
    fn on_phase_change(&self, id: ConnectionId, role: Role, from: HandshakePhase, to: HandshakePhase);

    /// Called for every alert sent or received.
    fn on_alert(&self, id: ConnectionId, role: Role, alert: Alert, direction: AlertDirection);

    /// Called once when a connection aborts.
    fn on_error(&self, id: ConnectionId, role: Role, error: &CoreError);
}

/// Default observer: structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ConnectionObserver for TracingObserver {
    fn on_phase_change(&self, id: ConnectionId, role: Role, from: HandshakePhase, to: HandshakePhase) {
        if to == HandshakePhase::Connected {
            info!(conn = %id.short(), %role, "Handshake complete");
        }
        debug!(conn = %id.short(), %role, %from, %to, "Phase transition");
    }

    fn on_alert(&self, id: ConnectionId, role: Role, alert: Alert, direction: AlertDirection) {
        if alert.is_fatal() {
            warn!(conn = %id.short(), %role, ?direction, %alert, "Fatal alert");
        } else {
            debug!(conn = %id.short(), %role, ?direction, %alert, "Alert");
        }
    }

    fn on_error(&self, id: ConnectionId, role: Role, error: &CoreError) {
        if error.is_suspicious() {
            warn!(conn = %id.short(), %role, error = %error, "Connection aborted (possible tampering)");
        } else {
            warn!(conn = %id.short(), %role, error = %error, "Connection aborted");
        }
    }
}
