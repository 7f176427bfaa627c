//! Queue error types

use crate::db::DatabaseError;
use thiserror::Error;

use super::MessageId;

/// Errors that can occur in the queue or its broker
#[derive(Error, Debug)]
pub enum QueueError {
    /// Underlying database failed
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Event could not be encoded as a message
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Broker cannot be reached
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    /// Ack or reject for a message that is not currently delivered
    #[error("Message {0} is not in flight")]
    NotInFlight(MessageId),

    #[error("Queue {0} is already consuming")]
    AlreadyConsuming(String),

    #[error("Queue {0} is not consuming, start consuming before adding consumers")]
    NotConsuming(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<rusqlite::Error> for QueueError {
    fn from(err: rusqlite::Error) -> Self {
        QueueError::Database(DatabaseError::Sqlite(err))
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
