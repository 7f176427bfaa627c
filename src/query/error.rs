//! Query error types
//!
//! Errors that can occur while retrieving events.

use thiserror::Error;

/// Errors that can occur during query execution
#[derive(Error, Debug)]
pub enum QueryError {
    /// Storage layer error (unreachable store, failed read)
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
