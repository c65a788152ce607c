//! Error types for the sync client.
//!
//! Uses `thiserror` for typed errors that surface through the connection
//! driver. Stale references (a delta naming an entity the mirror does
//! not hold) are deliberately absent: the reducer absorbs them.

/// Errors that can occur while mirroring a graph.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The transport failed to open or closed unexpectedly.
    #[error("connection error: {0}")]
    Connection(String),

    /// An inbound frame could not be parsed. The frame is dropped and
    /// the connection kept.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Reconnect attempts exceeded the configured cap.
    #[error("reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted {
        /// Number of reconnect attempts made.
        attempts: u32,
    },

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
