//! Shared application state for the Topowatch server.
//!
//! [`AppState`] bundles the session hub, the mutation pipeline that
//! owns the graph store, and the keepalive/queue settings the socket
//! handlers need.

use std::sync::Arc;

use topowatch_core::SyncConfig;
use topowatch_store::GraphStore;

use crate::hub::SessionHub;
use crate::pipeline::MutationPipeline;

/// Shared state handed to every Axum handler via [`axum::extract::State`].
pub struct AppState {
    /// Registry of connected sessions.
    pub hub: Arc<SessionHub>,
    /// The only path through which the graph is mutated.
    pub pipeline: MutationPipeline,
    /// Keepalive and per-connection queue settings.
    pub sync: SyncConfig,
}

impl AppState {
    /// Build state around a store.
    pub fn new(store: Box<dyn GraphStore>, sync: SyncConfig) -> Self {
        let hub = Arc::new(SessionHub::new());
        let pipeline = MutationPipeline::new(store, Arc::clone(&hub));
        Self {
            hub,
            pipeline,
            sync,
        }
    }

    /// Outbound queue depth for one connection.
    ///
    /// Never below two so the `connection_established` and `graph_state`
    /// frames of a new connection always fit.
    pub fn queue_capacity(&self) -> usize {
        self.sync.session_queue_capacity.max(2)
    }
}
