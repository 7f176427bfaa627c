//! Eventflow Event Storage
//!
//! Persistence for accepted events:
//!
//! - **EventStore**: the storage seam (insert + filtered read)
//! - **sqlite**: durable store on a SQLite file
//! - **memory**: in-process store, also used as a test double
//! - **writer**: the consumer-side write path
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Consumer → EventWriter → EventStore::insert (id assigned here)
//!
//! Read Path:
//!   QueryEngine → FindQuery → EventStore::find → ordered, paginated rows
//! ```
//!
//! Stored events are immutable: there is no update or delete path.

mod error;
mod memory;
mod sqlite;
mod writer;

pub use error::{PersistenceError, StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use writer::EventWriter;

use crate::event::{Event, StoredEvent};
use crate::query::FindQuery;
use async_trait::async_trait;

/// A queryable collection of stored events
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert one event, assigning it a new unique identifier
    async fn insert(&self, event: &Event) -> StorageResult<StoredEvent>;

    /// Events matching the condition, ascending by timestamp (ties in
    /// insertion order), after skipping `offset`, at most `limit`
    async fn find(&self, query: &FindQuery) -> StorageResult<Vec<StoredEvent>>;

    /// Check that the store is reachable
    async fn ping(&self) -> StorageResult<()>;
}
