//! Business layer errors
//!
//! One discriminated taxonomy for every service. Callers branch on the
//! variant (or the `is_*` predicates), never on message text.

use thiserror::Error;
use veilcredit_core::CoreError;
use veilcredit_persistence::PersistenceError;

/// Business operation errors
#[derive(Debug, Error)]
pub enum BusinessError {
    // === Lookup errors ===
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // === Permission errors ===
    #[error("Operation not permitted for {role}: {operation}")]
    Permission { role: String, operation: String },

    // === State errors ===
    #[error("{entity} {id} is {actual}, expected {expected}")]
    InvalidState {
        entity: String,
        id: String,
        expected: String,
        actual: String,
    },

    // === Validation errors ===
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No credit score for user {0}")]
    NoScore(String),

    // === Wrapped errors ===
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result type alias for business operations
pub type BusinessResult<T> = Result<T, BusinessError>;

impl BusinessError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// `role` is "unknown" for callers with no registered identity.
    pub fn permission(role: &str, operation: &str) -> Self {
        Self::Permission {
            role: role.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn invalid_state(entity: &str, id: &str, expected: &str, actual: &str) -> Self {
        Self::InvalidState {
            entity: entity.to_string(),
            id: id.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
            || matches!(self, Self::Persistence(e) if e.is_not_found())
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Permission { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_no_score(&self) -> bool {
        matches!(self, Self::NoScore(_))
    }
}

impl From<CoreError> for BusinessError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTransition { from, to } => Self::InvalidState {
                entity: "Loan".to_string(),
                id: String::new(),
                expected: format!("a state that can move to {}", to),
                actual: from,
            },
            other => Self::Validation(other.to_string()),
        }
    }
}
