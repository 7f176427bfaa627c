//! SQLite event store
//!
//! One `events` table; params are kept as a JSON document. Queries render
//! the condition tree into a parameterized WHERE clause and order by
//! `(timestamp, rowid)` so that pagination is deterministic.

use super::{EventStore, StorageResult};
use crate::db::Database;
use crate::event::{Event, Params, StoredEvent};
use crate::query::{Condition, FindQuery, Value};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, types::Value as SqlValue};
use std::path::Path;
use uuid::Uuid;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS events (
        id TEXT PRIMARY KEY,
        event_type TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        params TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
    CREATE INDEX IF NOT EXISTS idx_events_type_timestamp ON events(event_type, timestamp);
";

pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the store at `path`, creating the schema if needed
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::open(path)?;
        Self::with_database(db)
    }

    /// Use an already opened database
    pub fn with_database(db: Database) -> StorageResult<Self> {
        db.with_conn(|conn| conn.execute_batch(SCHEMA))?;
        Ok(Self { db })
    }
}

/// Render a condition as SQL, pushing bound values in order
fn render(condition: &Condition, values: &mut Vec<SqlValue>) -> String {
    match condition {
        Condition::Compare { field, op, value } => {
            values.push(match value {
                Value::Text(s) => SqlValue::Text(s.clone()),
                Value::Int(n) => SqlValue::Integer(*n),
            });
            format!("{} {} ?", field.column(), op.as_sql())
        }
        Condition::And(parts) if parts.is_empty() => "1".to_string(),
        Condition::And(parts) => {
            let rendered: Vec<String> = parts
                .iter()
                .map(|part| format!("({})", render(part, values)))
                .collect();
            rendered.join(" AND ")
        }
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn insert(&self, event: &Event) -> StorageResult<StoredEvent> {
        let id = Uuid::new_v4().to_string();
        let params_json = serde_json::to_string(event.params())?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (id, event_type, timestamp, params) VALUES (?1, ?2, ?3, ?4)",
                params![id, event.event_type(), event.timestamp(), params_json],
            )
        })?;

        Ok(event.clone().into_stored(id))
    }

    async fn find(&self, query: &FindQuery) -> StorageResult<Vec<StoredEvent>> {
        let mut values = Vec::new();
        let where_clause = render(&query.condition, &mut values);
        values.push(SqlValue::Integer(query.limit.min(i64::MAX as u64) as i64));
        values.push(SqlValue::Integer(query.offset.min(i64::MAX as u64) as i64));

        let sql = format!(
            "SELECT id, event_type, timestamp, params FROM events
             WHERE {}
             ORDER BY timestamp ASC, rowid ASC
             LIMIT ? OFFSET ?",
            where_clause
        );

        let rows: Vec<(String, String, i64, String)> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(id, event_type, timestamp, params_json)| -> StorageResult<StoredEvent> {
                let params: Params = serde_json::from_str(&params_json)?;
                Ok(StoredEvent {
                    id,
                    event_type,
                    timestamp,
                    params,
                })
            })
            .collect()
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(self.db.ping()?)
    }
}
