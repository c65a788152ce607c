//! REST API endpoint handlers for the Topowatch server.
//!
//! Reads go straight to the store through the pipeline; every write is
//! a pipeline command tagged with its origin, so REST mutations reach
//! connected sessions exactly like device reports and bulk batches do.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/network/graph` | Full graph snapshot |
//! | `GET` | `/network/nodes` | List nodes |
//! | `POST` | `/network/nodes` | Create a node |
//! | `GET` | `/network/nodes/{id}` | Single node |
//! | `PUT` | `/network/nodes/{id}` | Partial node update |
//! | `DELETE` | `/network/nodes/{id}` | Delete node and its edges |
//! | `GET` | `/network/edges` | List edges |
//! | `POST` | `/network/edges` | Create an edge |
//! | `GET` | `/network/edges/{id}` | Single edge |
//! | `PUT` | `/network/edges/{id}` | Partial edge update |
//! | `DELETE` | `/network/edges/{id}` | Delete an edge |
//! | `GET` | `/network/stats` | Totals and per-status counts |
//! | `GET` | `/network/connections` | Connected sessions |
//! | `POST` | `/network/bulk-update` | Apply a batch from a discovery scan |
//! | `POST` | `/network/device-update/{device_id}` | Device self-report |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use topowatch_types::{
    BulkUpdateRequest, DeviceReport, EdgeDraft, EdgeId, EdgePatch, NodeDraft, NodeId, NodePatch,
};

use crate::error::ApiError;
use crate::pipeline::MutationOrigin;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Return the full committed graph.
pub async fn get_graph(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.pipeline.snapshot().await)
}

/// List all nodes.
pub async fn list_nodes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let nodes = state.pipeline.snapshot().await.nodes;
    Json(serde_json::json!({
        "count": nodes.len(),
        "nodes": nodes,
    }))
}

/// Return a single node.
pub async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let node = state
        .pipeline
        .node(&NodeId::from(id.as_str()))
        .await
        .ok_or_else(|| ApiError::NotFound(format!("node {id}")))?;
    Ok(Json(node))
}

/// List all edges.
pub async fn list_edges(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let edges = state.pipeline.snapshot().await.edges;
    Json(serde_json::json!({
        "count": edges.len(),
        "edges": edges,
    }))
}

/// Return a single edge.
pub async fn get_edge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let edge = state
        .pipeline
        .edge(&EdgeId::from(id.as_str()))
        .await
        .ok_or_else(|| ApiError::NotFound(format!("edge {id}")))?;
    Ok(Json(edge))
}

/// Totals and per-status counts.
pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.pipeline.stats().await)
}

/// Number of connected sockets and distinct sessions.
pub async fn get_connections(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "connections": state.hub.connection_count().await,
        "sessions": state.hub.session_count().await,
    }))
}

// ---------------------------------------------------------------------------
// Node writes
// ---------------------------------------------------------------------------

/// Create a node.
pub async fn create_node(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<NodeDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let node = state
        .pipeline
        .create_node(draft, &MutationOrigin::Api)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "node": node })),
    ))
}

/// Apply a partial update to a node.
pub async fn update_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<NodePatch>,
) -> Result<impl IntoResponse, ApiError> {
    let node = state
        .pipeline
        .update_node(&NodeId::from(id), patch, &MutationOrigin::Api)
        .await?;
    Ok(Json(serde_json::json!({ "success": true, "node": node })))
}

/// Delete a node and every edge touching it.
pub async fn delete_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removal = state
        .pipeline
        .delete_node(&NodeId::from(id), &MutationOrigin::Api)
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "node_id": removal.node.id,
        "removed_edges": removal.edges.len(),
    })))
}

// ---------------------------------------------------------------------------
// Edge writes
// ---------------------------------------------------------------------------

/// Create an edge between two existing nodes.
pub async fn create_edge(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<EdgeDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let edge = state
        .pipeline
        .create_edge(draft, &MutationOrigin::Api)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "edge": edge })),
    ))
}

/// Apply a partial update to an edge.
pub async fn update_edge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<EdgePatch>,
) -> Result<impl IntoResponse, ApiError> {
    let edge = state
        .pipeline
        .update_edge(&EdgeId::from(id), patch, &MutationOrigin::Api)
        .await?;
    Ok(Json(serde_json::json!({ "success": true, "edge": edge })))
}

/// Delete an edge.
pub async fn delete_edge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let edge = state
        .pipeline
        .delete_edge(&EdgeId::from(id), &MutationOrigin::Api)
        .await?;
    Ok(Json(serde_json::json!({ "success": true, "edge_id": edge.id })))
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Apply a batch of node and edge changes. Failed items are reported
/// per item; the rest of the batch still commits.
pub async fn bulk_update(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkUpdateRequest>,
) -> impl IntoResponse {
    let outcome = state.pipeline.apply_bulk(request).await;
    let failures = outcome.failures();
    Json(serde_json::json!({
        "success": failures == 0,
        "message": format!(
            "Processed {} node updates and {} edge updates ({failures} failed)",
            outcome.nodes.len(),
            outcome.edges.len(),
        ),
        "results": outcome,
    }))
}

/// A device reporting its own state.
pub async fn device_update(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    Json(report): Json<DeviceReport>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.pipeline.report_device(&device_id, report).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "action": outcome.action,
        "node": outcome.node,
    })))
}
