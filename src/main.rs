//! Eventflow
//!
//! Command-line entry point:
//! - `web`: HTTP API (ingestion + retrieval)
//! - `worker`: consumer pool draining the queue into the store
//! - `standalone`: both in one process
//! - `stats` / `return-rejected`: queue maintenance
//! - `config`: print or write the default config file

use anyhow::Context;
use clap::{Parser, Subcommand};
use eventflow::api::{self, AppState};
use eventflow::config::{generate_default_config, Backend, Config};
use eventflow::queue::{Broker, MemoryBroker, Queue, SqliteBroker};
use eventflow::storage::{EventStore, EventWriter, MemoryStore, SqliteStore};
use eventflow::worker::ConsumerPool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "eventflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Event ingestion service with a durable queue and a queryable store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Web,

    /// Run the consumer pool
    Worker,

    /// Run the HTTP API and the consumer pool in one process
    Standalone,

    /// Print queue depth as JSON
    Stats,

    /// Move dead-lettered messages back to the ready list
    ReturnRejected {
        /// Maximum number of messages to move
        #[arg(long, default_value = "1000")]
        max: usize,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_ref());
    }

    let config = Config::resolve(cli.config.as_deref())?;
    init_tracing(&config);

    tracing::info!(
        environment = ?config.environment,
        "Eventflow v{}",
        env!("CARGO_PKG_VERSION")
    );

    match cli.command {
        Commands::Web => run_web(&config).await,
        Commands::Worker => run_worker(&config).await,
        Commands::Standalone => run_standalone(&config).await,
        Commands::Stats => {
            let queue = open_queue(&config)?;
            let stats = queue.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Commands::ReturnRejected { max } => {
            let queue = open_queue(&config)?;
            let returned = queue.return_rejected(max).await?;
            println!("Returned {} message(s) to {}", returned, queue.name());
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn init_tracing(config: &Config) {
    let level = config.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("eventflow={},tower_http={}", level, level)));

    let json = config.log_json();
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .init();
}

fn write_default_config(output: Option<&PathBuf>) -> anyhow::Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write config to {:?}", path))?;
            println!("Config written to {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn open_queue(config: &Config) -> anyhow::Result<Queue> {
    let broker: Arc<dyn Broker> = match config.queue.backend {
        Backend::Sqlite => {
            tracing::info!(path = %config.queue.path, "Opening SQLite queue");
            let broker = SqliteBroker::open(&config.queue.path)
                .with_context(|| format!("Failed to open queue at {}", config.queue.path))?;
            Arc::new(broker)
        }
        Backend::Memory => {
            tracing::warn!("Using in-memory queue, messages are not shared or persisted");
            Arc::new(MemoryBroker::new())
        }
    };

    Ok(Queue::open(
        config.queue.name.clone(),
        broker,
        config.queue.options(),
    ))
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn EventStore>> {
    let store: Arc<dyn EventStore> = match config.storage.backend {
        Backend::Sqlite => {
            tracing::info!(path = %config.storage.path, "Opening SQLite event store");
            let store = SqliteStore::open(&config.storage.path)
                .with_context(|| format!("Failed to open event store at {}", config.storage.path))?;
            Arc::new(store)
        }
        Backend::Memory => {
            tracing::warn!("Using in-memory event store, events are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

fn start_pool(config: &Config, queue: Queue, store: Arc<dyn EventStore>) -> anyhow::Result<ConsumerPool> {
    let pool = ConsumerPool::new(queue, EventWriter::new(store), config.pool_config());
    pool.start().context("Failed to start consumer pool")?;
    Ok(pool)
}

fn stop_pool(pool: &ConsumerPool) -> anyhow::Result<()> {
    pool.stop()?;
    let stats = pool.stats();
    tracing::info!(
        acked = stats.acked,
        requeued = stats.requeued,
        dead_lettered = stats.dead_lettered,
        "Consumer pool stopped"
    );
    Ok(())
}

async fn run_web(config: &Config) -> anyhow::Result<()> {
    let queue = open_queue(config)?;
    let store = open_store(config)?;

    let api_config = config.api_config();
    api::serve(AppState::new(queue, store, api_config.clone()), &api_config).await?;
    Ok(())
}

async fn run_worker(config: &Config) -> anyhow::Result<()> {
    let queue = open_queue(config)?;
    let store = open_store(config)?;

    let pool = start_pool(config, queue, store)?;
    api::shutdown_signal().await;
    stop_pool(&pool)
}

async fn run_standalone(config: &Config) -> anyhow::Result<()> {
    let queue = open_queue(config)?;
    let store = open_store(config)?;

    let pool = start_pool(config, queue.clone(), Arc::clone(&store))?;

    let api_config = config.api_config();
    let served = api::serve(AppState::new(queue, store, api_config.clone()), &api_config).await;

    stop_pool(&pool)?;
    served?;
    Ok(())
}
