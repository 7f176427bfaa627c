//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `EVENTFLOW_*` environment variable
//! overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::queue::QueueOptions;
use crate::worker::PoolConfig;

/// Runtime environment, selects logging defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Where queue messages or stored events live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// SQLite file, durable and shareable between processes
    Sqlite,
    /// Process memory, lost on exit
    Memory,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "memory" => Ok(Backend::Memory),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub consumers: ConsumersConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1 MB
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// Durable queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,

    #[serde(default = "default_queue_path")]
    pub path: String,

    #[serde(default = "default_queue_name")]
    pub name: String,

    /// Maximum unacknowledged deliveries per consuming process
    #[serde(default = "default_unacked_limit")]
    pub unacked_limit: usize,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Unacked deliveries older than this are redelivered
    #[serde(default = "default_redelivery_timeout")]
    pub redelivery_timeout_secs: u64,

    /// Deliveries before a requeued message is dead-lettered (0 = unlimited)
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,
}

fn default_backend() -> Backend {
    Backend::Sqlite
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("eventflow"))
        .unwrap_or_else(|| PathBuf::from("./eventflow_data"))
}

fn default_queue_path() -> String {
    data_dir().join("queue.db").to_string_lossy().to_string()
}

fn default_queue_name() -> String {
    crate::queue::EVENTS_QUEUE.to_string()
}

fn default_unacked_limit() -> usize {
    20
}

fn default_poll_interval() -> u64 {
    500
}

fn default_redelivery_timeout() -> u64 {
    60
}

fn default_max_deliveries() -> u32 {
    10
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_queue_path(),
            name: default_queue_name(),
            unacked_limit: default_unacked_limit(),
            poll_interval_ms: default_poll_interval(),
            redelivery_timeout_secs: default_redelivery_timeout(),
            max_deliveries: default_max_deliveries(),
        }
    }
}

impl QueueConfig {
    pub fn options(&self) -> QueueOptions {
        QueueOptions {
            redelivery_timeout: Duration::from_secs(self.redelivery_timeout_secs),
            max_deliveries: self.max_deliveries,
        }
    }
}

/// Event store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,

    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    data_dir().join("events.db").to_string_lossy().to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_storage_path(),
        }
    }
}

/// Consumer pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumersConfig {
    #[serde(default = "default_consumer_count")]
    pub count: usize,
}

fn default_consumer_count() -> usize {
    2
}

impl Default for ConsumersConfig {
    fn default() -> Self {
        Self {
            count: default_consumer_count(),
        }
    }
}

/// Logging configuration
///
/// Unset values follow the environment: development logs `debug` in the
/// pretty format, production logs `info` as JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,

    /// "pretty" or "json"
    pub format: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("eventflow").join("config.toml")),
            Some(PathBuf::from("/etc/eventflow/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// An explicit path must load; otherwise search the default locations
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_with_env(path),
            None => Ok(Self::load_default()),
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(env) = lookup("EVENTFLOW_ENV") {
            match env.parse() {
                Ok(env) => self.environment = env,
                Err(e) => tracing::warn!("Ignoring EVENTFLOW_ENV: {}", e),
            }
        }

        // API overrides
        if let Some(host) = lookup("EVENTFLOW_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("EVENTFLOW_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Queue overrides
        if let Some(backend) = lookup("EVENTFLOW_QUEUE_BACKEND") {
            match backend.parse() {
                Ok(b) => self.queue.backend = b,
                Err(e) => tracing::warn!("Ignoring EVENTFLOW_QUEUE_BACKEND: {}", e),
            }
        }
        if let Some(path) = lookup("EVENTFLOW_QUEUE_PATH") {
            self.queue.path = path;
        }
        if let Some(limit) = lookup("EVENTFLOW_UNACKED_LIMIT") {
            if let Ok(l) = limit.parse() {
                self.queue.unacked_limit = l;
            }
        }
        if let Some(interval) = lookup("EVENTFLOW_POLL_INTERVAL_MS") {
            if let Ok(i) = interval.parse() {
                self.queue.poll_interval_ms = i;
            }
        }

        // Storage overrides
        if let Some(backend) = lookup("EVENTFLOW_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(b) => self.storage.backend = b,
                Err(e) => tracing::warn!("Ignoring EVENTFLOW_STORAGE_BACKEND: {}", e),
            }
        }
        if let Some(path) = lookup("EVENTFLOW_STORAGE_PATH") {
            self.storage.path = path;
        }

        // Consumers: unparseable counts as zero, which falls back to one
        if let Some(count) = lookup("EVENTFLOW_CONSUMERS") {
            self.consumers.count = count.trim().parse().unwrap_or(0);
        }

        // Logging overrides
        if let Some(level) = lookup("EVENTFLOW_LOG_LEVEL") {
            self.logging.level = Some(level);
        }
        if let Some(format) = lookup("EVENTFLOW_LOG_FORMAT") {
            self.logging.format = Some(format);
        }
    }

    /// Number of consumers to run, never zero
    pub fn consumer_count(&self) -> usize {
        self.consumers.count.max(1)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            consumers: self.consumer_count(),
            unacked_limit: self.queue.unacked_limit,
            poll_interval: Duration::from_millis(self.queue.poll_interval_ms),
        }
    }

    pub fn api_config(&self) -> crate::api::ApiConfig {
        crate::api::ApiConfig {
            host: self.api.host.clone(),
            port: self.api.port,
            cors_origins: self.api.cors_origins.clone(),
            max_body_size: self.api.max_body_size,
        }
    }

    /// Effective log level filter
    pub fn log_level(&self) -> String {
        self.logging.level.clone().unwrap_or_else(|| {
            match self.environment {
                Environment::Development => "debug",
                Environment::Production => "info",
            }
            .to_string()
        })
    }

    /// Whether logs are written as JSON lines
    pub fn log_json(&self) -> bool {
        match self.logging.format.as_deref() {
            Some(format) => format.eq_ignore_ascii_case("json"),
            None => self.environment == Environment::Production,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Eventflow Configuration
#
# Environment variables override these settings:
# - EVENTFLOW_ENV
# - EVENTFLOW_API_HOST
# - EVENTFLOW_API_PORT
# - EVENTFLOW_QUEUE_BACKEND
# - EVENTFLOW_QUEUE_PATH
# - EVENTFLOW_STORAGE_BACKEND
# - EVENTFLOW_STORAGE_PATH
# - EVENTFLOW_CONSUMERS
# - EVENTFLOW_UNACKED_LIMIT
# - EVENTFLOW_POLL_INTERVAL_MS
# - EVENTFLOW_LOG_LEVEL
# - EVENTFLOW_LOG_FORMAT

# development or production
environment = "development"

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8080

# Allowed CORS origins (empty allows any)
cors_origins = []

# Maximum request body size (bytes)
max_body_size = 1048576

[queue]
# sqlite (durable, shared between web and worker processes) or memory
backend = "sqlite"
# Defaults to queue.db in the local data directory
# path = "/var/lib/eventflow/queue.db"

# Channel events are published on
name = "events"

# Maximum unacknowledged deliveries per worker process
unacked_limit = 20

# How often an idle queue is polled (ms)
poll_interval_ms = 500

# Unacknowledged deliveries are redelivered after this many seconds
redelivery_timeout_secs = 60

# Requeued messages are dead-lettered after this many deliveries (0 = never)
max_deliveries = 10

[storage]
# sqlite or memory
backend = "sqlite"
# Defaults to events.db in the local data directory
# path = "/var/lib/eventflow/events.db"

[consumers]
# Number of concurrent consumers per worker process
count = 2

[logging]
# Log level: trace, debug, info, warn, error
# Defaults to debug in development and info in production
# level = "info"

# Log format: pretty or json
# Defaults to pretty in development and json in production
# format = "json"
"#
    .to_string()
}
