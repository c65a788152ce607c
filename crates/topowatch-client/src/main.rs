//! `topowatch-watch`: follow a Topowatch session from the terminal.
//!
//! Connects to the server named by `TOPOWATCH_URL`, mirrors the graph
//! of `TOPOWATCH_SESSION`, and logs a line every time the connection
//! state or the graph changes. Stops on `Ctrl-C`.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use topowatch_client::{ClientConfig, DisplayGraph, SyncClient, ViewFilter};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = ClientConfig::from_env()?;
    info!(
        url = %config.session_url(),
        resync_interval_ms = config.resync_interval.as_millis(),
        ping_interval_ms = config.ping_interval.as_millis(),
        max_reconnect_attempts = config.reconnect.max_attempts,
        strategy = ?config.reconnect.strategy,
        "configuration loaded"
    );

    let handle = SyncClient::spawn(config)?;
    let mut views = handle.subscribe();
    let filter = ViewFilter::default();

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    error!("sync task ended");
                    break;
                }
                let view = views.borrow_and_update().clone();
                let display_graph = DisplayGraph::derive(&view.graph, &filter);
                info!(
                    status = ?view.status.indicator(),
                    nodes = display_graph.nodes.len(),
                    edges = display_graph.edges.len(),
                    last_updated = ?view.last_updated,
                    error = view.error.as_deref().unwrap_or(""),
                    "view"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
