//! Event Store Writer
//!
//! The consumer-side write path: one accepted event in, one stored event out.
//! Plain insert, no deduplication or upsert.

use super::{EventStore, PersistenceError};
use crate::event::{Event, StoredEvent};
use std::sync::Arc;

#[derive(Clone)]
pub struct EventWriter {
    store: Arc<dyn EventStore>,
}

impl EventWriter {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Persist one event; the store assigns its identifier
    pub async fn persist(&self, event: &Event) -> Result<StoredEvent, PersistenceError> {
        let stored = self.store.insert(event).await?;

        tracing::debug!(
            event_id = %stored.id,
            event_type = %stored.event_type,
            timestamp = stored.timestamp,
            "Event persisted"
        );

        Ok(stored)
    }
}
