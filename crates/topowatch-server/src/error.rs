//! Error types for the Topowatch server.
//!
//! [`ApiError`] unifies all failure modes of the REST surface into a
//! single enum that can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.
//! [`PipelineError`] is what the Mutation Pipeline reports to any caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use topowatch_store::StoreError;

use crate::hub::HubError;

/// Errors raised by the Mutation Pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The store rejected the commit; nothing was broadcast.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The command was incomplete or contradictory.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The initial frames for a new connection could not be delivered.
    #[error("delivery failed: {0}")]
    Delivery(#[from] HubError),
}

/// Errors that can occur in the HTTP API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request body or path was rejected.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Store(e @ (StoreError::NodeNotFound(_) | StoreError::EdgeNotFound(_))) => {
                Self::NotFound(e.to_string())
            }
            PipelineError::Store(e) => Self::InvalidRequest(e.to_string()),
            PipelineError::InvalidCommand(msg) => Self::InvalidRequest(msg),
            PipelineError::Delivery(e) => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Serialization(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
            }
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
