//! Session Registry & Broadcast Hub.
//!
//! The hub tracks every connected socket, grouped by session id, and
//! pushes serialized frames to them. Each connection is represented by a
//! [`SessionSink`] with a non-blocking `send(frame) -> Result` contract:
//!
//! - Delivery is at-most-once per send attempt. A sink that fails (queue
//!   full or transport gone) is removed from the registry; nothing is
//!   retransmitted. Clients heal through periodic resync.
//! - One sink failing never blocks or fails delivery to the others.
//! - Frames handed to one sink arrive in the order they were sent.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use topowatch_types::ServerMessage;

/// A serialized text frame shared by every recipient of a broadcast.
pub type Frame = Arc<str>;

/// Unique identifier for one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new random connection identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a frame could not be handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The connection's outbound queue is full; the reader is too slow.
    #[error("session queue is full")]
    Full,
    /// The connection's writer task has gone away.
    #[error("session transport closed")]
    Closed,
}

/// One writable subscriber.
pub trait SessionSink: Send + Sync {
    /// Hand a frame to the subscriber without waiting.
    fn send(&self, frame: Frame) -> Result<(), SinkError>;
}

/// [`SessionSink`] backed by a bounded channel drained by the socket task.
///
/// Dropping the sink closes the channel, which ends the socket task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Frame>,
}

impl ChannelSink {
    /// Wrap the sending half of a connection's outbound queue.
    pub const fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx }
    }
}

impl SessionSink for ChannelSink {
    fn send(&self, frame: Frame) -> Result<(), SinkError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Connections the frame was handed to.
    pub delivered: usize,
    /// Connections that failed and were removed.
    pub dropped: usize,
}

/// Errors from targeted sends.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The connection is not (or no longer) registered.
    #[error("connection {connection} is not registered under session {session_id}")]
    UnknownConnection {
        /// Session the caller expected.
        session_id: String,
        /// The missing connection.
        connection: ConnectionId,
    },
    /// The sink rejected the frame; the connection has been removed.
    #[error("send to {connection} failed: {source}")]
    Send {
        /// The failed connection.
        connection: ConnectionId,
        /// Why it failed.
        source: SinkError,
    },
    /// The message could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

type SessionMap = BTreeMap<String, BTreeMap<ConnectionId, Box<dyn SessionSink>>>;

/// Registry of connected sessions and the fan-out path to them.
#[derive(Default)]
pub struct SessionHub {
    sessions: RwLock<SessionMap>,
}

impl SessionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize a message into a shareable frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be encoded as JSON.
    pub fn encode(message: &ServerMessage) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(message).map(Frame::from)
    }

    /// Add a connection under `session_id`.
    pub async fn register(
        &self,
        session_id: &str,
        connection: ConnectionId,
        sink: Box<dyn SessionSink>,
    ) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_owned())
            .or_default()
            .insert(connection, sink);
        debug!(session_id, %connection, "connection registered");
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub async fn unregister(&self, session_id: &str, connection: ConnectionId) -> bool {
        let mut sessions = self.sessions.write().await;
        remove_connection(&mut sessions, session_id, connection)
    }

    /// Push a message to every registered connection.
    ///
    /// Connections whose sink fails are removed before this returns.
    pub async fn broadcast(&self, message: &ServerMessage) -> BroadcastReport {
        match Self::encode(message) {
            Ok(frame) => self.broadcast_frame(&frame).await,
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "failed to encode broadcast frame");
                BroadcastReport::default()
            }
        }
    }

    /// Push an already-encoded frame to every registered connection.
    pub async fn broadcast_frame(&self, frame: &Frame) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut failed: Vec<(String, ConnectionId)> = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (session_id, connections) in sessions.iter() {
                for (connection, sink) in connections {
                    match sink.send(Arc::clone(frame)) {
                        Ok(()) => report.delivered = report.delivered.saturating_add(1),
                        Err(e) => {
                            warn!(session_id, %connection, error = %e, "dropping session after failed send");
                            failed.push((session_id.clone(), *connection));
                        }
                    }
                }
            }
        }
        if !failed.is_empty() {
            let mut sessions = self.sessions.write().await;
            for (session_id, connection) in &failed {
                if remove_connection(&mut sessions, session_id, *connection) {
                    report.dropped = report.dropped.saturating_add(1);
                }
            }
        }
        report
    }

    /// Push a message to one connection.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownConnection`] if the connection is not
    /// registered, or [`HubError::Send`] if its sink failed (in which
    /// case it has been removed).
    pub async fn send_to(
        &self,
        session_id: &str,
        connection: ConnectionId,
        message: &ServerMessage,
    ) -> Result<(), HubError> {
        let frame = Self::encode(message)?;
        let result = {
            let sessions = self.sessions.read().await;
            let sink = sessions
                .get(session_id)
                .and_then(|connections| connections.get(&connection))
                .ok_or_else(|| HubError::UnknownConnection {
                    session_id: session_id.to_owned(),
                    connection,
                })?;
            sink.send(frame)
        };
        if let Err(source) = result {
            self.unregister(session_id, connection).await;
            return Err(HubError::Send { connection, source });
        }
        Ok(())
    }

    /// Total number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.values().map(BTreeMap::len).sum()
    }

    /// Number of sessions with at least one connection.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn remove_connection(sessions: &mut SessionMap, session_id: &str, connection: ConnectionId) -> bool {
    let Some(connections) = sessions.get_mut(session_id) else {
        return false;
    };
    let removed = connections.remove(&connection).is_some();
    if connections.is_empty() {
        sessions.remove(session_id);
    }
    if removed {
        debug!(session_id, %connection, "connection unregistered");
    }
    removed
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Sink that records frames or always fails.
    #[derive(Clone, Default)]
    struct RecordingSink {
        frames: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl SessionSink for RecordingSink {
        fn send(&self, frame: Frame) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Closed);
            }
            self.frames.lock().unwrap().push(frame.to_string());
            Ok(())
        }
    }

    fn ping() -> ServerMessage {
        ServerMessage::Ping { timestamp: None }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection_in_every_session() {
        let hub = SessionHub::new();
        let a = RecordingSink::default();
        let b = RecordingSink::default();
        let c = RecordingSink::default();
        hub.register("s1", ConnectionId::new(), Box::new(a.clone())).await;
        hub.register("s1", ConnectionId::new(), Box::new(b.clone())).await;
        hub.register("s2", ConnectionId::new(), Box::new(c.clone())).await;

        let report = hub.broadcast(&ping()).await;
        assert_eq!(report, BroadcastReport { delivered: 3, dropped: 0 });
        for sink in [&a, &b, &c] {
            assert_eq!(sink.frames.lock().unwrap().len(), 1);
        }
        assert_eq!(hub.connection_count().await, 3);
        assert_eq!(hub.session_count().await, 2);
    }

    #[tokio::test]
    async fn failing_sink_is_dropped_without_affecting_others() {
        let hub = SessionHub::new();
        let healthy = RecordingSink::default();
        let broken = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        hub.register("s1", ConnectionId::new(), Box::new(healthy.clone())).await;
        hub.register("s2", ConnectionId::new(), Box::new(broken)).await;

        let report = hub.broadcast(&ping()).await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert_eq!(hub.session_count().await, 1);

        // The next broadcast only sees the healthy connection.
        let report = hub.broadcast(&ping()).await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 0 });
        assert_eq!(healthy.frames.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn full_channel_counts_as_failure() {
        let hub = SessionHub::new();
        let (tx, _rx) = mpsc::channel(1);
        hub.register("s1", ConnectionId::new(), Box::new(ChannelSink::new(tx))).await;
        assert_eq!(hub.broadcast(&ping()).await.delivered, 1);
        let report = hub.broadcast(&ping()).await;
        assert_eq!(report.dropped, 1);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn frames_keep_send_order_per_connection() {
        let hub = SessionHub::new();
        let (tx, mut rx) = mpsc::channel(8);
        let id = ConnectionId::new();
        hub.register("s1", id, Box::new(ChannelSink::new(tx))).await;
        hub.broadcast(&ping()).await;
        hub.send_to("s1", id, &ServerMessage::Pong { timestamp: None }).await.unwrap();
        hub.broadcast(&ping()).await;
        let kinds: Vec<String> = (0..3)
            .map(|_| {
                let frame = rx.try_recv().unwrap();
                let msg: ServerMessage = serde_json::from_str(&frame).unwrap();
                msg.kind().to_owned()
            })
            .collect();
        assert_eq!(kinds, ["ping", "pong", "ping"]);
    }

    #[tokio::test]
    async fn send_to_unknown_connection_is_an_error() {
        let hub = SessionHub::new();
        let err = hub.send_to("nope", ConnectionId::new(), &ping()).await.unwrap_err();
        assert!(matches!(err, HubError::UnknownConnection { .. }));
    }

    #[tokio::test]
    async fn unregister_removes_empty_sessions() {
        let hub = SessionHub::new();
        let id = ConnectionId::new();
        hub.register("s1", id, Box::new(RecordingSink::default())).await;
        assert!(hub.unregister("s1", id).await);
        assert!(!hub.unregister("s1", id).await);
        assert_eq!(hub.session_count().await, 0);
    }
}
