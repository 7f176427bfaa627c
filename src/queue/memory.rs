//! In-memory broker
//!
//! Single-process broker with the same ready / unacked / rejected lists as
//! the durable one. Availability can be toggled to simulate a broker
//! outage.

use super::{Broker, Message, MessageId, QueueError, QueueResult, QueueStats};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Lists {
    ready: VecDeque<Message>,
    unacked: HashMap<MessageId, (Message, Instant)>,
    rejected: VecDeque<Message>,
}

#[derive(Default)]
struct State {
    next_id: MessageId,
    queues: HashMap<String, Lists>,
}

pub struct MemoryBroker {
    state: Mutex<State>,
    available: AtomicBool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the broker going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, State>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("memory broker is offline".to_string()));
        }
        self.state
            .lock()
            .map_err(|e| QueueError::Lock(format!("Failed to acquire broker lock: {}", e)))
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn push(&self, queue: &str, payload: &str) -> QueueResult<()> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let id = state.next_id;
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .ready
            .push_back(Message {
                id,
                payload: payload.to_string(),
                deliveries: 0,
            });
        Ok(())
    }

    async fn reserve(&self, queue: &str, max: usize) -> QueueResult<Vec<Message>> {
        let mut state = self.lock()?;
        let Some(lists) = state.queues.get_mut(queue) else {
            return Ok(Vec::new());
        };

        let mut reserved = Vec::new();
        while reserved.len() < max {
            let Some(mut message) = lists.ready.pop_front() else {
                break;
            };
            message.deliveries += 1;
            lists
                .unacked
                .insert(message.id, (message.clone(), Instant::now()));
            reserved.push(message);
        }
        Ok(reserved)
    }

    async fn ack(&self, queue: &str, id: MessageId) -> QueueResult<()> {
        let mut state = self.lock()?;
        state
            .queues
            .get_mut(queue)
            .and_then(|lists| lists.unacked.remove(&id))
            .map(|_| ())
            .ok_or(QueueError::NotInFlight(id))
    }

    async fn reject(&self, queue: &str, id: MessageId, requeue: bool) -> QueueResult<()> {
        let mut state = self.lock()?;
        let lists = state
            .queues
            .get_mut(queue)
            .ok_or(QueueError::NotInFlight(id))?;
        let (message, _) = lists
            .unacked
            .remove(&id)
            .ok_or(QueueError::NotInFlight(id))?;

        if requeue {
            lists.ready.push_back(message);
        } else {
            lists.rejected.push_back(message);
        }
        Ok(())
    }

    async fn requeue_expired(&self, queue: &str, older_than: Duration) -> QueueResult<usize> {
        let mut state = self.lock()?;
        let Some(lists) = state.queues.get_mut(queue) else {
            return Ok(0);
        };

        let mut expired: Vec<MessageId> = lists
            .unacked
            .iter()
            .filter(|(_, (_, reserved_at))| reserved_at.elapsed() >= older_than)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_unstable();

        for id in &expired {
            if let Some((message, _)) = lists.unacked.remove(id) {
                lists.ready.push_back(message);
            }
        }
        Ok(expired.len())
    }

    async fn return_rejected(&self, queue: &str, max: usize) -> QueueResult<usize> {
        let mut state = self.lock()?;
        let Some(lists) = state.queues.get_mut(queue) else {
            return Ok(0);
        };

        let count = max.min(lists.rejected.len());
        let returned: Vec<Message> = lists.rejected.drain(..count).collect();
        lists.ready.extend(returned);
        Ok(count)
    }

    async fn stats(&self, queue: &str) -> QueueResult<QueueStats> {
        let state = self.lock()?;
        Ok(state
            .queues
            .get(queue)
            .map(|lists| QueueStats {
                ready: lists.ready.len() as u64,
                unacked: lists.unacked.len() as u64,
                rejected: lists.rejected.len() as u64,
            })
            .unwrap_or_default())
    }

    async fn ping(&self) -> QueueResult<()> {
        self.lock().map(|_| ())
    }
}
