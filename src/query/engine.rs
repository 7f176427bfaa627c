//! Query Engine
//!
//! Executes an [`EventsQuery`] against the event store: composes the
//! condition tree as of the current time and issues one paginated read.

use crate::event::StoredEvent;
use crate::query::error::QueryResult;
use crate::query::filter::EventsQuery;
use crate::storage::EventStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// Runs retrieval queries against an injected store
pub struct QueryEngine {
    store: Arc<dyn EventStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Execute a query, ascending by timestamp
    pub async fn execute(&self, query: &EventsQuery) -> QueryResult<Vec<StoredEvent>> {
        self.execute_at(query, Utc::now().timestamp()).await
    }

    /// Execute a query with an explicit "now" (unix seconds) for interval windows
    pub async fn execute_at(&self, query: &EventsQuery, now: i64) -> QueryResult<Vec<StoredEvent>> {
        let start = Instant::now();
        let find = query.compose(now);

        let events = self.store.find(&find).await?;

        tracing::debug!(
            event_type = %query.event_type,
            limit = find.limit,
            offset = find.offset,
            rows = events.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Events query executed"
        );

        Ok(events)
    }
}
