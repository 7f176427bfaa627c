//! Storage error types
//!
//! Defines all errors that can occur in the storage layer.

use crate::db::DatabaseError;
use thiserror::Error;

/// Errors that can occur in an event store
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying database failed
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Params could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Store cannot be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(DatabaseError::Sqlite(err))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Failure to persist one consumed event
#[derive(Error, Debug)]
#[error("Failed to persist event: {0}")]
pub struct PersistenceError(#[from] pub StorageError);

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "Storage unavailable: connection refused");

        let err = PersistenceError::from(err);
        assert_eq!(
            err.to_string(),
            "Failed to persist event: Storage unavailable: connection refused"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let storage_err: StorageError = json_err.into();
        assert!(matches!(storage_err, StorageError::Serialization(_)));
    }
}
