//! # Eventflow
//!
//! Event ingestion service: accepts application events over HTTP, hands
//! them to a durable queue and persists them asynchronously into a
//! queryable store.
//!
//! ```text
//! POST /api/v1/events ─► Producer ─► Queue ─► ConsumerPool ─► EventWriter ─► EventStore
//!                                                                              │
//! GET  /api/v1/events ─► QueryEngine ◄─────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`event`]: payload, accepted event and stored event types
//! - [`queue`]: at-least-once queue with memory and SQLite brokers
//! - [`worker`]: consumer pool draining the queue
//! - [`storage`]: event store trait, backends and writer
//! - [`query`]: filter composition and query execution
//! - [`ingest`]: validation and publish
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eventflow::{
//!     EventPayload, EventWriter, MemoryBroker, MemoryStore, PoolConfig, Producer, Queue,
//!     QueueOptions, ConsumerPool,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queue = Queue::open("events", Arc::new(MemoryBroker::new()), QueueOptions::default());
//!     let store = Arc::new(MemoryStore::new());
//!
//!     let pool = ConsumerPool::new(queue.clone(), EventWriter::new(store), PoolConfig::default());
//!     pool.start()?;
//!
//!     let producer = Producer::new(queue);
//!     producer
//!         .accept(EventPayload {
//!             event_type: "login".to_string(),
//!             timestamp: 1_700_000_000,
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod event;
pub mod ingest;
pub mod query;
pub mod queue;
pub mod storage;
pub mod worker;

// Re-export top-level types for convenience
pub use event::{Event, EventPayload, Params, StoredEvent, ValidationError};

pub use ingest::{IngestError, Producer};

pub use queue::{
    Broker, Consumer, Delivery, MemoryBroker, Queue, QueueError, QueueOptions, QueueResult,
    QueueStats, RejectOutcome, SqliteBroker,
};

pub use storage::{
    EventStore, EventWriter, MemoryStore, PersistenceError, SqliteStore, StorageError,
    StorageResult,
};

pub use query::{EventsQuery, QueryEngine, QueryError};

pub use worker::{ConsumerPool, EventConsumer, PoolConfig, PoolStatsSnapshot};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{Backend, Config, ConfigError, Environment};
