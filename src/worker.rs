//! Consumer Pool
//!
//! A fixed number of symmetric consumers draining the events queue into
//! the event store. Per delivery:
//!
//! ```text
//! decode ──fail──► reject, no requeue (poisoned message, dead-lettered)
//!   │
//! persist ─fail──► reject, requeue (redelivered, storage may recover)
//!   │
//!  ack
//! ```
//!
//! The pool starts once and runs until the process ends; failures never
//! travel back to the producer.

use crate::event::Event;
use crate::queue::{Consumer, Delivery, Queue, QueueResult, RejectOutcome};
use crate::storage::EventWriter;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Pool sizing and flow control
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent consumers
    pub consumers: usize,
    /// Maximum unacknowledged deliveries held by this process
    pub unacked_limit: usize,
    /// How often an idle queue is polled
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            consumers: 2,
            unacked_limit: 20,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Delivery outcomes across all consumers of a pool
#[derive(Debug, Default)]
pub struct PoolStats {
    acked: AtomicU64,
    requeued: AtomicU64,
    dead_lettered: AtomicU64,
}

/// Point-in-time copy of [`PoolStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStatsSnapshot {
    pub acked: u64,
    pub requeued: u64,
    pub dead_lettered: u64,
}

impl PoolStats {
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            acked: self.acked.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }

    fn record_reject(&self, outcome: RejectOutcome) {
        match outcome {
            RejectOutcome::Requeued => self.requeued.fetch_add(1, Ordering::Relaxed),
            RejectOutcome::DeadLettered => self.dead_lettered.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Decodes one delivery and hands it to the writer
pub struct EventConsumer {
    name: String,
    writer: EventWriter,
    stats: Arc<PoolStats>,
}

impl EventConsumer {
    pub fn new(name: impl Into<String>, writer: EventWriter, stats: Arc<PoolStats>) -> Self {
        Self {
            name: name.into(),
            writer,
            stats,
        }
    }

    async fn reject(&self, delivery: Delivery, requeue: bool) {
        let id = delivery.id();
        match delivery.reject(requeue).await {
            Ok(outcome) => self.stats.record_reject(outcome),
            Err(e) => tracing::warn!(
                consumer = %self.name,
                message_id = id,
                error = %e,
                "Failed to reject message"
            ),
        }
    }
}

#[async_trait]
impl Consumer for EventConsumer {
    async fn consume(&self, delivery: Delivery) {
        let event: Event = match serde_json::from_str(delivery.payload()) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    consumer = %self.name,
                    message_id = delivery.id(),
                    error = %e,
                    "Event decode error, dropping message"
                );
                self.reject(delivery, false).await;
                return;
            }
        };

        if let Err(e) = self.writer.persist(&event).await {
            tracing::warn!(
                consumer = %self.name,
                message_id = delivery.id(),
                deliveries = delivery.deliveries(),
                error = %e,
                "Create record error, message will be redelivered"
            );
            self.reject(delivery, true).await;
            return;
        }

        let id = delivery.id();
        match delivery.ack().await {
            Ok(()) => {
                self.stats.acked.fetch_add(1, Ordering::Relaxed);
            }
            // The event is stored; the message will come back and be stored again
            Err(e) => tracing::warn!(
                consumer = %self.name,
                message_id = id,
                error = %e,
                "Failed to ack message"
            ),
        }
    }
}

/// Fixed-size set of consumers on one queue connection
pub struct ConsumerPool {
    queue: Queue,
    writer: EventWriter,
    config: PoolConfig,
    stats: Arc<PoolStats>,
}

impl ConsumerPool {
    pub fn new(queue: Queue, writer: EventWriter, config: PoolConfig) -> Self {
        Self {
            queue,
            writer,
            config,
            stats: Arc::new(PoolStats::default()),
        }
    }

    /// Start consuming and register all consumers
    pub fn start(&self) -> QueueResult<()> {
        self.queue
            .start_consuming(self.config.unacked_limit, self.config.poll_interval)?;

        let consumers = self.config.consumers.max(1);
        for i in 0..consumers {
            let name = format!("consumer-{}", i);
            let consumer = EventConsumer::new(name.clone(), self.writer.clone(), Arc::clone(&self.stats));
            self.queue.add_consumer(name, Arc::new(consumer))?;
        }

        tracing::info!(
            queue = %self.queue.name(),
            consumers,
            unacked_limit = self.config.unacked_limit,
            "Consumer pool started"
        );
        Ok(())
    }

    /// Stop all consumers; unsettled deliveries return after the redelivery timeout
    pub fn stop(&self) -> QueueResult<()> {
        self.queue.stop_consuming()
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }
}
