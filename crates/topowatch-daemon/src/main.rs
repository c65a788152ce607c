//! Topowatch daemon.
//!
//! Hosts the authoritative topology graph and serves it to observer
//! clients over `WebSocket`, with a thin REST surface for writers.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `topowatch-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Seed the in-memory graph store
//! 4. Start the sync server and keepalive loop
//! 5. Run until Ctrl-C

mod error;
mod seed;

use std::path::Path;
use std::sync::Arc;

use topowatch_core::{LoggingConfig, TopologyConfig};
use topowatch_server::startup::spawn_server;
use topowatch_server::state::AppState;
use topowatch_store::MemoryGraphStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::DaemonError;

const CONFIG_PATH: &str = "topowatch-config.yaml";

/// Application entry point for the daemon.
///
/// # Errors
///
/// Returns an error if configuration, seeding, or server startup fails.
#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    // 1. Load configuration. Logging is not up yet, so failures surface
    //    through the returned error.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        host = config.server.host,
        port = config.server.port,
        ping_interval_secs = config.sync.ping_interval_secs,
        session_queue_capacity = config.sync.session_queue_capacity,
        "topowatch-daemon starting"
    );

    // 3. Seed the store before any client can attach.
    let mut store = MemoryGraphStore::new();
    let summary = seed::seed_store(&mut store, &config.seed)?;
    info!(nodes = summary.nodes, edges = summary.edges, "Graph store ready");

    // 4. Start the server.
    let state = Arc::new(AppState::new(Box::new(store), config.sync.clone()));
    let handles = spawn_server(&config.server, state)?;

    // 5. Run until interrupted.
    tokio::signal::ctrl_c().await.map_err(DaemonError::Signal)?;
    info!("Shutdown signal received");
    handles.abort();

    info!("topowatch-daemon shutdown complete");
    Ok(())
}

/// Load `topowatch-config.yaml` from the working directory.
///
/// A missing file yields the defaults, with env overrides still applied.
fn load_config() -> Result<TopologyConfig, DaemonError> {
    let path = Path::new(CONFIG_PATH);
    let config = if path.exists() {
        TopologyConfig::from_file(path)?
    } else {
        TopologyConfig::parse("")?
    };
    Ok(config)
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
