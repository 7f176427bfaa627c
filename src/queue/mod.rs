//! Eventflow Durable Queue
//!
//! At-least-once delivery between the ingestion endpoint and the consumer
//! pool:
//!
//! - **Broker**: storage seam for messages (ready / unacked / rejected lists)
//! - **Queue**: a named channel over a broker; publish, start consuming,
//!   register competing consumers
//! - **Delivery**: one in-flight message, must be acked or rejected
//! - **memory**: in-process broker, also used as a test double
//! - **sqlite**: durable broker, shareable between processes
//!
//! # Message lifecycle
//!
//! ```text
//! publish ──► ready ──reserve──► unacked ──ack──► (removed)
//!               ▲                  │
//!               ├──reject(requeue)─┤
//!               ├──redelivery timeout (handler died or hung)
//!               │                  │
//!   return_rejected ◄── rejected ◄─┘ reject(no requeue) / max deliveries
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use eventflow::queue::{MemoryBroker, Queue, QueueOptions};
//! use std::{sync::Arc, time::Duration};
//!
//! let queue = Queue::open("events", Arc::new(MemoryBroker::new()), QueueOptions::default());
//! queue.publish(&event).await?;
//! queue.start_consuming(20, Duration::from_millis(500))?;
//! queue.add_consumer("consumer-0", Arc::new(my_consumer))?;
//! ```

mod channel;
mod error;
mod memory;
mod sqlite;

pub use channel::{Consumer, Delivery, Queue, QueueOptions, RejectOutcome};
pub use error::{QueueError, QueueResult};
pub use memory::MemoryBroker;
pub use sqlite::SqliteBroker;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Name of the channel events travel on
pub const EVENTS_QUEUE: &str = "events";

/// Broker-assigned message identifier
pub type MessageId = i64;

/// A message handed out by [`Broker::reserve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub payload: String,
    /// How many times this message has been reserved, including this one
    pub deliveries: u32,
}

/// Message counts of one named queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub ready: u64,
    pub unacked: u64,
    pub rejected: u64,
}

/// Message storage behind a [`Queue`]
///
/// Implementations must be safe for concurrent publishers and consumers.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Append a message to the ready list
    async fn push(&self, queue: &str, payload: &str) -> QueueResult<()>;

    /// Move up to `max` ready messages to the unacked list and return them
    async fn reserve(&self, queue: &str, max: usize) -> QueueResult<Vec<Message>>;

    /// Remove an unacked message permanently
    async fn ack(&self, queue: &str, id: MessageId) -> QueueResult<()>;

    /// Return an unacked message to the ready list, or to the rejected list
    async fn reject(&self, queue: &str, id: MessageId, requeue: bool) -> QueueResult<()>;

    /// Return unacked messages reserved at least `older_than` ago to ready
    async fn requeue_expired(&self, queue: &str, older_than: Duration) -> QueueResult<usize>;

    /// Move up to `max` rejected messages back to ready
    async fn return_rejected(&self, queue: &str, max: usize) -> QueueResult<usize>;

    async fn stats(&self, queue: &str) -> QueueResult<QueueStats>;

    /// Check that the broker is reachable
    async fn ping(&self) -> QueueResult<()>;
}
