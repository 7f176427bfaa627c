//! In-memory event store
//!
//! Keeps events in insertion order and evaluates the condition tree
//! directly. Availability can be toggled to simulate a storage outage.

use super::{EventStore, StorageError, StorageResult};
use crate::event::{Event, StoredEvent};
use crate::query::FindQuery;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

pub struct MemoryStore {
    events: RwLock<Vec<StoredEvent>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("memory store is offline".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert(&self, event: &Event) -> StorageResult<StoredEvent> {
        self.check_available()?;

        let stored = event.clone().into_stored(Uuid::new_v4().to_string());
        self.events
            .write()
            .map_err(|e| StorageError::Lock(format!("Failed to acquire events lock: {}", e)))?
            .push(stored.clone());

        Ok(stored)
    }

    async fn find(&self, query: &FindQuery) -> StorageResult<Vec<StoredEvent>> {
        self.check_available()?;

        let events = self
            .events
            .read()
            .map_err(|e| StorageError::Lock(format!("Failed to acquire events lock: {}", e)))?;

        let mut matching: Vec<&StoredEvent> = events
            .iter()
            .filter(|event| query.condition.matches(event))
            .collect();
        // Stable sort keeps insertion order for equal timestamps
        matching.sort_by_key(|event| event.timestamp);

        Ok(matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> StorageResult<()> {
        self.check_available()
    }
}
