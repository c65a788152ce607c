//! Server startup helper for embedding in the daemon.
//!
//! Provides [`spawn_server`] which launches the HTTP + `WebSocket`
//! server and the keepalive loop on background Tokio tasks.
//!
//! # Usage
//!
//! ```rust,ignore
//! use topowatch_server::startup::spawn_server;
//!
//! let handles = spawn_server(&config.server, state)?;
//! // ... wait for shutdown ...
//! handles.abort();
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;

use topowatch_core::ServerSection;

use crate::keepalive::spawn_keepalive;
use crate::server::{ServerError, start_server};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Handles to the background tasks started by [`spawn_server`].
#[derive(Debug)]
pub struct ServerHandles {
    /// The HTTP + `WebSocket` server.
    pub server: JoinHandle<()>,
    /// The keepalive ping loop.
    pub keepalive: JoinHandle<()>,
}

impl ServerHandles {
    /// Stop both tasks.
    pub fn abort(&self) {
        self.server.abort();
        self.keepalive.abort();
    }
}

/// Spawn the server and keepalive loop on background Tokio tasks.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured address cannot
/// be parsed. This is checked before anything is spawned; bind
/// failures are logged from the server task.
pub fn spawn_server(
    config: &ServerSection,
    state: Arc<AppState>,
) -> Result<ServerHandles, StartupError> {
    let addr_str = format!("{}:{}", config.host, config.port);
    let _: std::net::SocketAddr = addr_str.parse().map_err(|e| {
        StartupError::Server(ServerError::Bind(format!("invalid address {addr_str}: {e}")))
    })?;

    let keepalive = spawn_keepalive(Arc::clone(&state.hub), state.sync.ping_interval());

    let config = config.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = start_server(&config, state).await {
            tracing::error!(error = %e, "Topowatch server exited with error");
        }
    });

    tracing::info!(address = %addr_str, "Topowatch server spawned on background task");

    Ok(ServerHandles { server, keepalive })
}
