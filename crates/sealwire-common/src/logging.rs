// ============================================
// File: crates/sealwire-common/src/logging.rs
// ============================================
//! # Logging Setup
//!
//! Installs a `tracing-subscriber` fmt layer filtered by `RUST_LOG`,
//! falling back to the configured level. Library code only emits
//! `tracing` events; callers decide whether to install a subscriber.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber.
///
/// Returns `false` if a subscriber was already installed (tests call this
/// repeatedly).
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .is_ok()
}

/// Test-friendly variant writing through the libtest capture.
pub fn try_init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .try_init();
}
