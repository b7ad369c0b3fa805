//! rawread server
//!
//! Serves raw reads over HTTP and WebSocket from the in-memory store.
//!
//! Run with: cargo run --bin rawread -- --config config.toml
//!
//! Without `--config` the default locations are searched (see
//! `rawread::config::default_paths`) and `RAWREAD_*` environment variables
//! apply on top. `RUST_LOG` overrides the configured log level.

use clap::Parser;
use rawread::api::{serve, AppState};
use rawread::config::{Config, LoggingConfig};
use rawread::storage::MemoryStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "rawread")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Raw read server for a time-series store")]
struct Args {
    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_tracing(&config.logging);

    tracing::info!("Starting rawread v{}", env!("CARGO_PKG_VERSION"));

    let store_config = config.storage.store_config();
    let store = match &config.storage.seed_file {
        Some(path) => MemoryStore::from_seed_file(store_config, Path::new(path))?,
        None => {
            tracing::info!("No seed file configured, starting with an empty store");
            MemoryStore::new(store_config)
        }
    };
    let databases = store.databases()?;
    let series = store.series_count()?;
    tracing::info!(databases = ?databases, series, "Store ready");

    let state = AppState::new(Arc::new(store), config.api.clone());
    serve(state, &config.api).await?;

    tracing::info!("rawread stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("rawread={},tower_http=info", config.level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
