//! # Error Module
//!
//! Domain errors raised by the pure types in this crate.

use thiserror::Error;

/// Core domain errors.
///
/// These never involve storage; the business layer maps them onto its own
/// discriminated taxonomy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    // === Validation errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid term: {0} days")]
    InvalidTerm(i64),

    #[error("Invalid wallet address: {0}")]
    InvalidWalletAddress(String),

    // === State machine errors ===
    #[error("Illegal loan transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether this is an input validation failure
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidAmount(_)
                | CoreError::InvalidTerm(_)
                | CoreError::InvalidWalletAddress(_)
        )
    }
}
