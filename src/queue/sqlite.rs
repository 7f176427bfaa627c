//! Durable SQLite broker
//!
//! All messages of all named queues live in one table; a message's list is
//! its `state` column. Reservation runs in an IMMEDIATE transaction so
//! several consuming processes on the same file never reserve the same
//! message twice.

use super::{Broker, Message, MessageId, QueueError, QueueResult, QueueStats};
use crate::db::Database;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS queue_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        queue TEXT NOT NULL,
        payload TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'ready',
        deliveries INTEGER NOT NULL DEFAULT 0,
        reserved_at INTEGER,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_queue_messages_state ON queue_messages(queue, state, id);
";

const READY: &str = "ready";
const UNACKED: &str = "unacked";
const REJECTED: &str = "rejected";

pub struct SqliteBroker {
    db: Database,
}

impl SqliteBroker {
    /// Open the broker at `path`, creating the schema if needed
    pub fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        let db = Database::open(path)?;
        Self::with_database(db)
    }

    pub fn with_database(db: Database) -> QueueResult<Self> {
        db.with_conn(|conn| conn.execute_batch(SCHEMA))?;
        Ok(Self { db })
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl Broker for SqliteBroker {
    async fn push(&self, queue: &str, payload: &str) -> QueueResult<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO queue_messages (queue, payload, state, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![queue, payload, READY, now_millis()],
            )
        })?;
        Ok(())
    }

    async fn reserve(&self, queue: &str, max: usize) -> QueueResult<Vec<Message>> {
        if max == 0 {
            return Ok(Vec::new());
        }

        let messages = self.db.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let messages = {
                let mut select = tx.prepare_cached(
                    "SELECT id, payload, deliveries FROM queue_messages
                     WHERE queue = ?1 AND state = ?2
                     ORDER BY id
                     LIMIT ?3",
                )?;
                let rows = select
                    .query_map(params![queue, READY, max as i64], |row| {
                        Ok(Message {
                            id: row.get(0)?,
                            payload: row.get(1)?,
                            deliveries: row.get::<_, u32>(2)? + 1,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                let mut update = tx.prepare_cached(
                    "UPDATE queue_messages SET state = ?1, deliveries = ?2, reserved_at = ?3 WHERE id = ?4",
                )?;
                let reserved_at = now_millis();
                for message in &rows {
                    update.execute(params![UNACKED, message.deliveries, reserved_at, message.id])?;
                }
                rows
            };
            tx.commit()?;
            Ok(messages)
        })?;

        Ok(messages)
    }

    async fn ack(&self, queue: &str, id: MessageId) -> QueueResult<()> {
        let deleted = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM queue_messages WHERE id = ?1 AND queue = ?2 AND state = ?3",
                params![id, queue, UNACKED],
            )
        })?;

        if deleted == 0 {
            return Err(QueueError::NotInFlight(id));
        }
        Ok(())
    }

    async fn reject(&self, queue: &str, id: MessageId, requeue: bool) -> QueueResult<()> {
        let target = if requeue { READY } else { REJECTED };
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE queue_messages SET state = ?1, reserved_at = NULL
                 WHERE id = ?2 AND queue = ?3 AND state = ?4",
                params![target, id, queue, UNACKED],
            )
        })?;

        if updated == 0 {
            return Err(QueueError::NotInFlight(id));
        }
        Ok(())
    }

    async fn requeue_expired(&self, queue: &str, older_than: Duration) -> QueueResult<usize> {
        let cutoff = now_millis() - older_than.as_millis() as i64;
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE queue_messages SET state = ?1, reserved_at = NULL
                 WHERE queue = ?2 AND state = ?3 AND reserved_at <= ?4",
                params![READY, queue, UNACKED, cutoff],
            )
        })?;
        Ok(updated)
    }

    async fn return_rejected(&self, queue: &str, max: usize) -> QueueResult<usize> {
        let updated = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE queue_messages SET state = ?1
                 WHERE id IN (
                     SELECT id FROM queue_messages
                     WHERE queue = ?2 AND state = ?3
                     ORDER BY id
                     LIMIT ?4
                 )",
                params![READY, queue, REJECTED, max as i64],
            )
        })?;
        Ok(updated)
    }

    async fn stats(&self, queue: &str) -> QueueResult<QueueStats> {
        let counts: Vec<(String, i64)> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT state, COUNT(*) FROM queue_messages WHERE queue = ?1 GROUP BY state",
            )?;
            let rows = stmt
                .query_map(params![queue], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut stats = QueueStats::default();
        for (state, count) in counts {
            let count = count as u64;
            match state.as_str() {
                READY => stats.ready = count,
                UNACKED => stats.unacked = count,
                REJECTED => stats.rejected = count,
                other => tracing::warn!(state = %other, "Unknown message state"),
            }
        }
        Ok(stats)
    }

    async fn ping(&self) -> QueueResult<()> {
        Ok(self.db.ping()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_lifecycle() {
        let dir = tempdir().unwrap();
        let broker = SqliteBroker::open(dir.path().join("queue.db")).unwrap();

        broker.push("events", "a").await.unwrap();
        broker.push("events", "b").await.unwrap();
        broker.push("events", "c").await.unwrap();

        let messages = broker.reserve("events", 2).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].payload, "a");
        assert_eq!(messages[0].deliveries, 1);

        broker.ack("events", messages[0].id).await.unwrap();
        broker.reject("events", messages[1].id, false).await.unwrap();

        let stats = broker.stats("events").await.unwrap();
        assert_eq!(stats, QueueStats { ready: 1, unacked: 0, rejected: 1 });

        assert_eq!(broker.return_rejected("events", 10).await.unwrap(), 1);
        let messages = broker.reserve("events", 10).await.unwrap();
        let payloads: Vec<&str> = messages.iter().map(|m| m.payload.as_str()).collect();
        assert_eq!(payloads, vec!["b", "c"]);
        assert_eq!(messages[0].deliveries, 2);
    }

    #[tokio::test]
    async fn test_settle_requires_in_flight() {
        let dir = tempdir().unwrap();
        let broker = SqliteBroker::open(dir.path().join("queue.db")).unwrap();
        broker.push("events", "a").await.unwrap();

        assert!(matches!(broker.ack("events", 1).await, Err(QueueError::NotInFlight(1))));
        assert!(matches!(
            broker.reject("events", 1, true).await,
            Err(QueueError::NotInFlight(1))
        ));
    }

    #[tokio::test]
    async fn test_requeue_expired() {
        let dir = tempdir().unwrap();
        let broker = SqliteBroker::open(dir.path().join("queue.db")).unwrap();
        broker.push("events", "a").await.unwrap();
        broker.reserve("events", 1).await.unwrap();

        assert_eq!(
            broker.requeue_expired("events", Duration::from_secs(60)).await.unwrap(),
            0
        );
        assert_eq!(broker.requeue_expired("events", Duration::ZERO).await.unwrap(), 1);
        assert_eq!(broker.stats("events").await.unwrap().ready, 1);
    }

    #[tokio::test]
    async fn test_messages_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.db");

        {
            let broker = SqliteBroker::open(&path).unwrap();
            broker.push("events", "a").await.unwrap();
        }

        let broker = SqliteBroker::open(&path).unwrap();
        assert_eq!(broker.stats("events").await.unwrap().ready, 1);
    }

    #[tokio::test]
    async fn test_two_handles_never_share_a_message() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let first = SqliteBroker::open(&path).unwrap();
        let second = SqliteBroker::open(&path).unwrap();

        for i in 0..10 {
            first.push("events", &i.to_string()).await.unwrap();
        }

        let a = first.reserve("events", 6).await.unwrap();
        let b = second.reserve("events", 6).await.unwrap();
        assert_eq!(a.len() + b.len(), 10);
        assert!(a.iter().all(|m| b.iter().all(|n| n.id != m.id)));
    }
}
