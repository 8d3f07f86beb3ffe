//! # Persistence Errors
//!
//! Error types for the persistence layer, wrapping sqlx and serde errors.

use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    // === Database errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    // === Conversion errors ===
    #[error("Metadata serialization error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Invalid enum value: {field} = {value}")]
    InvalidEnumValue { field: String, value: String },

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

/// Result type alias for PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl PersistenceError {
    /// Build a NotFound error
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_enum(field: &str, value: &str) -> Self {
        Self::InvalidEnumValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Whether the record was missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// UNIQUE constraint violations (e.g. a wallet registered twice)
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = PersistenceError::not_found("Loan", "LOAN-1");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Record not found: Loan with id LOAN-1");
    }

    #[test]
    fn test_invalid_enum_error() {
        let err = PersistenceError::invalid_enum("loans.status", "lost");
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("loans.status = lost"));
    }
}
