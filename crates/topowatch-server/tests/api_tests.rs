//! Integration tests for the REST endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. This validates handler logic and routing
//! without needing a live network connection.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use topowatch_core::SyncConfig;
use topowatch_server::router::build_router;
use topowatch_server::state::AppState;
use topowatch_server::{ChannelSink, ConnectionId, MutationOrigin};
use topowatch_store::MemoryGraphStore;
use topowatch_types::{Layer, NodeDraft, NodeStatus, NodeType, Position, ServerMessage};

fn make_test_state() -> Arc<AppState> {
    Arc::new(AppState::new(
        Box::new(MemoryGraphStore::new()),
        SyncConfig::default(),
    ))
}

async fn seed_node(state: &AppState, name: &str) -> String {
    let draft = NodeDraft {
        name: name.to_owned(),
        node_type: NodeType::Router,
        ip_address: Some("10.0.0.1".to_owned()),
        status: NodeStatus::Online,
        layer: Layer::Network,
        position: Position::default(),
        metadata: topowatch_types::Metadata::new(),
    };
    let node = state
        .pipeline
        .create_node(draft, &MutationOrigin::Api)
        .await
        .unwrap();
    node.id.into_inner()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_root_is_not_routed() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_graph() {
    let state = make_test_state();
    seed_node(&state, "core").await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/network/graph").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["nodes"][0]["name"], "core");
    assert_eq!(json["edges"], json!([]));
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_create_node_returns_created() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(json_request(
            "POST",
            "/network/nodes",
            &json!({ "name": "sw1", "type": "switch", "metadata": { "rack": "", "vlan": 10 } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["node"]["type"], "switch");
    assert_eq!(json["node"]["status"], "unknown");
    assert_eq!(json["node"]["metadata"], json!({ "vlan": 10 }));
}

#[tokio::test]
async fn test_create_node_with_blank_name_is_bad_request() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(json_request(
            "POST",
            "/network/nodes",
            &json!({ "name": "  ", "type": "switch" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_update_node_partial() {
    let state = make_test_state();
    let id = seed_node(&state, "core").await;
    let router = build_router(state);

    let response = router
        .oneshot(json_request(
            "PUT",
            &format!("/network/nodes/{id}"),
            &json!({ "status": "warning" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["node"]["status"], "warning");
    assert_eq!(json["node"]["name"], "core");
}

#[tokio::test]
async fn test_update_missing_node_is_not_found() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(json_request(
            "PUT",
            "/network/nodes/nope",
            &json!({ "status": "warning" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_edge_with_missing_endpoint_is_bad_request() {
    let state = make_test_state();
    let id = seed_node(&state, "core").await;
    let router = build_router(state);

    let response = router
        .oneshot(json_request(
            "POST",
            "/network/edges",
            &json!({ "source": id, "target": "ghost" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_node_reports_removed_edges() {
    let state = make_test_state();
    let a = seed_node(&state, "a").await;
    let b = seed_node(&state, "b").await;
    let router = build_router(Arc::clone(&state));

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/network/edges",
            &json!({ "source": a, "target": b, "bandwidth": "1Gbps" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .clone()
        .oneshot(
            Request::delete(format!("/network/nodes/{a}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed_edges"], 1);

    let response = router
        .oneshot(Request::get("/network/edges").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_stats_counts_by_status() {
    let state = make_test_state();
    seed_node(&state, "a").await;
    seed_node(&state, "b").await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/network/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["total_nodes"], 2);
    assert_eq!(json["node_status_counts"]["online"], 2);
}

#[tokio::test]
async fn test_bulk_update_reports_per_item() {
    let router = build_router(make_test_state());

    let response = router
        .oneshot(json_request(
            "POST",
            "/network/bulk-update",
            &json!({
                "nodes": [
                    { "name": "scan-1", "type": "host" },
                    { "id": "missing", "status": "offline" }
                ],
                "source": "nmap"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["results"]["nodes"][0]["action"], "created");
    assert_eq!(json["results"]["nodes"][1]["action"], "failed");
}

#[tokio::test]
async fn test_device_update_creates_then_updates() {
    let router = build_router(make_test_state());

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/network/device-update/ap-7",
            &json!({ "metadata": { "clients": 12 } }),
        ))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["action"], "created");
    assert_eq!(json["node"]["name"], "Device ap-7");
    assert_eq!(json["node"]["metadata"]["device_id"], "ap-7");

    let response = router
        .oneshot(json_request(
            "POST",
            "/network/device-update/ap-7",
            &json!({ "status": "offline" }),
        ))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["action"], "updated");
    assert_eq!(json["node"]["status"], "offline");
    assert_eq!(json["node"]["metadata"]["clients"], 12);
}

#[tokio::test]
async fn test_rest_mutation_reaches_sessions() {
    let state = make_test_state();
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    state
        .pipeline
        .attach("s1", ConnectionId::new(), Box::new(ChannelSink::new(tx)))
        .await
        .unwrap();
    // connection_established + graph_state
    rx.recv().await.unwrap();
    rx.recv().await.unwrap();

    let router = build_router(Arc::clone(&state));
    router
        .oneshot(json_request(
            "POST",
            "/network/nodes",
            &json!({ "name": "fw", "type": "firewall" }),
        ))
        .await
        .unwrap();

    let frame = rx.recv().await.unwrap();
    match serde_json::from_str::<ServerMessage>(&frame).unwrap() {
        ServerMessage::GraphUpdate(update) => {
            assert_eq!(update.source, "api");
            assert_eq!(update.entity_data["name"], "fw");
        }
        other => panic!("expected graph_update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connections_endpoint() {
    let state = make_test_state();
    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    state
        .pipeline
        .attach("s1", ConnectionId::new(), Box::new(ChannelSink::new(tx)))
        .await
        .unwrap();
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/network/connections").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["connections"], 1);
    assert_eq!(json["sessions"], 1);
}
