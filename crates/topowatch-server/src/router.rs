//! Axum router construction for the Topowatch server.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// See [`handlers`] for the REST table. The session socket lives at
/// `GET /ws/{session_id}`.
///
/// CORS is configured to allow any origin so a dashboard served from
/// another host can connect.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route("/ws/{session_id}", get(ws::ws_session))
        // Graph reads
        .route("/network/graph", get(handlers::get_graph))
        .route("/network/stats", get(handlers::get_stats))
        .route("/network/connections", get(handlers::get_connections))
        // Nodes
        .route(
            "/network/nodes",
            get(handlers::list_nodes).post(handlers::create_node),
        )
        .route(
            "/network/nodes/{id}",
            get(handlers::get_node)
                .put(handlers::update_node)
                .delete(handlers::delete_node),
        )
        // Edges
        .route(
            "/network/edges",
            get(handlers::list_edges).post(handlers::create_edge),
        )
        .route(
            "/network/edges/{id}",
            get(handlers::get_edge)
                .put(handlers::update_edge)
                .delete(handlers::delete_edge),
        )
        // Ingestion
        .route("/network/bulk-update", post(handlers::bulk_update))
        .route(
            "/network/device-update/{device_id}",
            post(handlers::device_update),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
