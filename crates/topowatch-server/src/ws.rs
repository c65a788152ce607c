//! `WebSocket` handler for session connections.
//!
//! Clients connect to `GET /ws/{session_id}`. The handler:
//!
//! 1. Attaches the connection through the pipeline, which queues
//!    `connection_established` and `graph_state` before any delta.
//! 2. Forwards every frame the hub queues for the connection.
//! 3. Answers client `ping` with `pong`, replies to `request_graph_state`
//!    on this connection only, and ignores malformed frames.
//!
//! When the hub drops the connection (failed send), the outbound queue
//! closes and the socket is closed with it.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use topowatch_types::{ClientMessage, ServerMessage};

use crate::hub::{ChannelSink, ConnectionId, Frame};
use crate::state::AppState;

/// Upgrade an HTTP request to a session `WebSocket`.
///
/// # Route
///
/// `GET /ws/{session_id}`
pub async fn ws_session(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, session_id, state))
}

/// Drive one connection until either side goes away.
async fn handle_ws(mut socket: WebSocket, session_id: String, state: Arc<AppState>) {
    let connection = ConnectionId::new();
    let (tx, mut rx) = mpsc::channel::<Frame>(state.queue_capacity());

    if let Err(e) = state
        .pipeline
        .attach(&session_id, connection, Box::new(ChannelSink::new(tx)))
        .await
    {
        warn!(session_id, %connection, error = %e, "failed to attach session");
        return;
    }

    loop {
        tokio::select! {
            // Frames queued by the hub for this connection.
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    debug!(session_id, %connection, "connection dropped from registry");
                    break;
                };
                if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                    debug!(session_id, %connection, "client disconnected (send failed)");
                    break;
                }
            }
            // Client control frames.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&state, &session_id, connection, text.as_str()).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(session_id, %connection, "client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(session_id, %connection, "client closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(session_id, %connection, error = %e, "websocket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.unregister(&session_id, connection).await;
    info!(session_id, %connection, "session detached");
}

/// Handle one text frame from the client.
async fn handle_client_frame(
    state: &AppState,
    session_id: &str,
    connection: ConnectionId,
    text: &str,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(session_id, %connection, error = %e, "ignoring malformed client frame");
            return;
        }
    };

    match message {
        ClientMessage::RequestGraphState => {
            if let Err(e) = state.pipeline.resync(session_id, connection).await {
                warn!(session_id, %connection, error = %e, "failed to resend graph state");
            }
        }
        ClientMessage::Ping { .. } => {
            let pong = ServerMessage::Pong {
                timestamp: Some(Utc::now()),
            };
            if let Err(e) = state.hub.send_to(session_id, connection, &pong).await {
                warn!(session_id, %connection, error = %e, "failed to queue pong");
            }
        }
        ClientMessage::Pong { .. } => {
            debug!(session_id, %connection, "pong received");
        }
    }
}
