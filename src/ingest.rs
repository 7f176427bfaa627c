//! Event Producer
//!
//! The ingestion-side half of the pipeline: validate a payload and publish
//! it to the queue. A returned event has been appended to the queue; it has
//! not necessarily been stored yet.

use crate::event::{Event, EventPayload, ValidationError};
use crate::queue::{Queue, QueueError};
use thiserror::Error;

/// Why a payload was not accepted
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("event has not been processed")]
    NotProcessed(#[source] QueueError),
}

#[derive(Clone)]
pub struct Producer {
    queue: Queue,
}

impl Producer {
    pub fn new(queue: Queue) -> Self {
        Self { queue }
    }

    /// Validate and publish one payload
    ///
    /// Validation failures never reach the queue. A publish failure is not
    /// retried.
    pub async fn accept(&self, payload: EventPayload) -> Result<Event, IngestError> {
        let event = Event::try_from(payload)?;

        if let Err(e) = self.queue.publish(&event).await {
            tracing::warn!(
                queue = %self.queue.name(),
                event_type = %event.event_type(),
                error = %e,
                "Failed to publish event"
            );
            return Err(IngestError::NotProcessed(e));
        }

        tracing::debug!(
            event_type = %event.event_type(),
            timestamp = event.timestamp(),
            "Event accepted"
        );
        Ok(event)
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }
}
