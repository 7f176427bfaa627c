//! Named queue over a broker
//!
//! `start_consuming` spawns one fetch task per process that reserves
//! messages from the broker and feeds them into a bounded channel. Every
//! delivery carries a semaphore permit, so at most `unacked_limit`
//! deliveries are held by this process at any time. Consumers registered
//! with `add_consumer` compete for deliveries on that channel.
//!
//! Messages are only reserved for consumers that are waiting, so a
//! delivery never sits in the channel while its redelivery clock runs.

use super::{Broker, Message, MessageId, QueueError, QueueResult, QueueStats};
use crate::event::Event;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// Broker policy for in-flight and rejected messages
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Unacked messages older than this are returned to ready
    ///
    /// The clock starts when a waiting consumer is handed the message, so
    /// this must exceed the slowest expected `consume` call.
    pub redelivery_timeout: Duration,
    /// Requeued rejects beyond this many deliveries go to the rejected
    /// list instead (0 = unlimited)
    pub max_deliveries: u32,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            redelivery_timeout: Duration::from_secs(60),
            max_deliveries: 10,
        }
    }
}

/// Handler for deliveries
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Handle one delivery; it must be acked or rejected
    async fn consume(&self, delivery: Delivery);
}

/// What a reject did with the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectOutcome {
    Requeued,
    DeadLettered,
}

/// One in-flight message
pub struct Delivery {
    message: Message,
    broker: Arc<dyn Broker>,
    queue: Arc<str>,
    max_deliveries: u32,
    // Released when the delivery is settled or dropped
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("queue", &self.queue)
            .field("id", &self.message.id)
            .field("deliveries", &self.message.deliveries)
            .finish()
    }
}

impl Delivery {
    pub fn id(&self) -> MessageId {
        self.message.id
    }

    pub fn payload(&self) -> &str {
        &self.message.payload
    }

    /// Number of times this message has been delivered, including now
    pub fn deliveries(&self) -> u32 {
        self.message.deliveries
    }

    /// Remove the message permanently
    pub async fn ack(self) -> QueueResult<()> {
        self.broker.ack(&self.queue, self.message.id).await
    }

    /// Give the message back
    ///
    /// With `requeue` it becomes ready again unless it already used up
    /// `max_deliveries`; otherwise it goes to the rejected list.
    pub async fn reject(self, requeue: bool) -> QueueResult<RejectOutcome> {
        let exhausted =
            self.max_deliveries > 0 && self.message.deliveries >= self.max_deliveries;
        let requeue = requeue && !exhausted;

        self.broker
            .reject(&self.queue, self.message.id, requeue)
            .await?;

        if requeue {
            Ok(RejectOutcome::Requeued)
        } else {
            if exhausted {
                tracing::warn!(
                    queue = %self.queue,
                    message_id = self.message.id,
                    deliveries = self.message.deliveries,
                    "Message exceeded max deliveries, moved to rejected list"
                );
            }
            Ok(RejectOutcome::DeadLettered)
        }
    }
}

struct Consuming {
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Delivery>>>,
    // One permit per consumer waiting for a delivery
    idle: Arc<Semaphore>,
    tasks: Vec<JoinHandle<()>>,
}

struct QueueInner {
    name: Arc<str>,
    broker: Arc<dyn Broker>,
    options: QueueOptions,
    consuming: Mutex<Option<Consuming>>,
}

/// A named channel on a broker, cheap to clone
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

impl Queue {
    pub fn open(name: impl Into<String>, broker: Arc<dyn Broker>, options: QueueOptions) -> Self {
        let name: String = name.into();
        Self {
            inner: Arc::new(QueueInner {
                name: Arc::from(name),
                broker,
                options,
                consuming: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Serialize an accepted event and append it to the queue
    ///
    /// Single attempt; a broker failure is returned to the caller as is.
    pub async fn publish(&self, event: &Event) -> QueueResult<()> {
        let payload = serde_json::to_string(event)?;
        self.publish_payload(&payload).await
    }

    /// Append a raw payload
    pub async fn publish_payload(&self, payload: &str) -> QueueResult<()> {
        self.inner.broker.push(&self.inner.name, payload).await
    }

    /// Start fetching messages for this process
    ///
    /// At most `unacked_limit` deliveries are outstanding at once; when the
    /// queue is idle the broker is polled every `poll_interval`.
    pub fn start_consuming(&self, unacked_limit: usize, poll_interval: Duration) -> QueueResult<()> {
        let mut consuming = self.lock_consuming()?;
        if consuming.is_some() {
            return Err(QueueError::AlreadyConsuming(self.name().to_string()));
        }

        let unacked_limit = unacked_limit.max(1);
        let (tx, rx) = mpsc::channel(unacked_limit);
        let permits = Arc::new(Semaphore::new(unacked_limit));
        let idle = Arc::new(Semaphore::new(0));

        let fetcher = tokio::spawn(fetch_loop(
            Arc::clone(&self.inner.broker),
            Arc::clone(&self.inner.name),
            self.inner.options.clone(),
            permits,
            Arc::clone(&idle),
            tx,
            poll_interval,
        ));

        tracing::info!(
            queue = %self.inner.name,
            unacked_limit,
            poll_interval_ms = poll_interval.as_millis() as u64,
            "Queue consuming started"
        );

        *consuming = Some(Consuming {
            receiver: Arc::new(tokio::sync::Mutex::new(rx)),
            idle,
            tasks: vec![fetcher],
        });
        Ok(())
    }

    /// Register a consumer; consumers on one queue receive disjoint messages
    pub fn add_consumer(&self, name: impl Into<String>, consumer: Arc<dyn Consumer>) -> QueueResult<()> {
        let mut consuming = self.lock_consuming()?;
        let consuming = consuming
            .as_mut()
            .ok_or_else(|| QueueError::NotConsuming(self.name().to_string()))?;

        let name = name.into();
        let receiver = Arc::clone(&consuming.receiver);
        let idle = Arc::clone(&consuming.idle);
        let queue = Arc::clone(&self.inner.name);

        tracing::info!(queue = %queue, consumer = %name, "Consumer added");

        consuming.tasks.push(tokio::spawn(async move {
            loop {
                idle.add_permits(1);
                let next = { receiver.lock().await.recv().await };
                match next {
                    Some(delivery) => consumer.consume(delivery).await,
                    None => break,
                }
            }
            tracing::debug!(queue = %queue, consumer = %name, "Consumer stopped");
        }));
        Ok(())
    }

    /// Abort the fetch task and all consumers
    ///
    /// Deliveries not yet settled stay unacked in the broker and come back
    /// after the redelivery timeout.
    pub fn stop_consuming(&self) -> QueueResult<()> {
        if let Some(consuming) = self.lock_consuming()?.take() {
            for task in consuming.tasks {
                task.abort();
            }
            tracing::info!(queue = %self.inner.name, "Queue consuming stopped");
        }
        Ok(())
    }

    pub async fn stats(&self) -> QueueResult<QueueStats> {
        self.inner.broker.stats(&self.inner.name).await
    }

    /// Move up to `max` dead-lettered messages back to ready
    pub async fn return_rejected(&self, max: usize) -> QueueResult<usize> {
        let returned = self.inner.broker.return_rejected(&self.inner.name, max).await?;
        tracing::info!(queue = %self.inner.name, returned, "Returned rejected messages");
        Ok(returned)
    }

    pub async fn ping(&self) -> QueueResult<()> {
        self.inner.broker.ping().await
    }

    fn lock_consuming(&self) -> QueueResult<std::sync::MutexGuard<'_, Option<Consuming>>> {
        self.inner
            .consuming
            .lock()
            .map_err(|e| QueueError::Lock(format!("Failed to acquire consuming lock: {}", e)))
    }
}

async fn fetch_loop(
    broker: Arc<dyn Broker>,
    queue: Arc<str>,
    options: QueueOptions,
    permits: Arc<Semaphore>,
    idle: Arc<Semaphore>,
    tx: mpsc::Sender<Delivery>,
    poll_interval: Duration,
) {
    loop {
        match broker.requeue_expired(&queue, options.redelivery_timeout).await {
            Ok(0) => {}
            Ok(n) => tracing::warn!(queue = %queue, count = n, "Requeued expired deliveries"),
            Err(e) => tracing::warn!(queue = %queue, error = %e, "Failed to requeue expired deliveries"),
        }

        let wanted = permits.available_permits().min(idle.available_permits());
        let mut fetched = 0;

        if wanted > 0 {
            match broker.reserve(&queue, wanted).await {
                Ok(messages) => {
                    fetched = messages.len();
                    for message in messages {
                        let permit = match Arc::clone(&permits).acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => return,
                        };
                        // Claims one waiting consumer
                        match idle.acquire().await {
                            Ok(waiting) => waiting.forget(),
                            Err(_) => return,
                        }
                        let delivery = Delivery {
                            message,
                            broker: Arc::clone(&broker),
                            queue: Arc::clone(&queue),
                            max_deliveries: options.max_deliveries,
                            _permit: permit,
                        };
                        if tx.send(delivery).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => tracing::warn!(queue = %queue, error = %e, "Failed to fetch messages"),
            }
        }

        if fetched == 0 {
            tokio::time::sleep(poll_interval).await;
        }
    }
}
