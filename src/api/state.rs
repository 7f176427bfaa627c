//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::ingest::Producer;
use crate::query::QueryEngine;
use crate::queue::Queue;
use crate::storage::EventStore;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Validates and publishes incoming events
    pub producer: Producer,
    /// Runs retrieval queries
    pub engine: Arc<QueryEngine>,
    /// Store handle, pinged by the readiness probe
    pub store: Arc<dyn EventStore>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Wire the producer and query engine from one queue and one store
    pub fn new(queue: Queue, store: Arc<dyn EventStore>, config: ApiConfig) -> Self {
        Self {
            producer: Producer::new(queue),
            engine: Arc::new(QueryEngine::new(Arc::clone(&store))),
            store,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    pub fn queue(&self) -> &Queue {
        self.producer.queue()
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Allowed CORS origins, empty allows any
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
            max_body_size: 1024 * 1024,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
