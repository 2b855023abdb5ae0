// ============================================
// File: crates/sealwire-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Validation errors for the shared types, independent of the wire
//! protocol and of the transport layer.
//!
//! ## Main Functionality
//! - `CommonError`: base error enum wrapped by `CoreError`
//! - `Result<T>`: alias over `CommonError`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Messages are logged verbatim; never format secret bytes into them
//! - Higher crates wrap this type with `#[from]`, keep variants generic
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

// ============================================
// CommonError
// ============================================

/// Errors shared by every SealWire crate.
///
/// # Example
/// ```
/// use sealwire_common::error::{CommonError, Result};
///
/// fn check_random(random: &[u8]) -> Result<()> {
///     if random.len() != 32 {
///         return Err(CommonError::invalid_length(32, random.len()));
///     }
///     Ok(())
/// }
///
/// assert!(check_random(&[0u8; 31]).is_err());
/// ```
#[derive(Error, Debug)]
pub enum CommonError {
    // ========================================
    // Validation Errors
    // ========================================

    /// Invalid input data provided.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the field or parameter
        field: String,
        /// Description of what's wrong
        reason: String,
    },

    /// Data length doesn't match expected size.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length received
        actual: usize,
    },
}

impl CommonError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidLength` error.
    #[must_use]
    pub const fn invalid_length(expected: usize, actual: usize) -> Self {
        Self::InvalidLength { expected, actual }
    }
}

// ============================================
// Tests
// ============================================
