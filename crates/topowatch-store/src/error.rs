//! Error types for the `topowatch-store` crate.
//!
//! All fallible store operations return [`StoreError`]. A failed commit
//! leaves the store unchanged.

use topowatch_types::{EdgeId, NodeId};

/// Errors that can occur while committing to the Graph Store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A node was not found.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// An edge was not found.
    #[error("edge not found: {0}")]
    EdgeNotFound(EdgeId),

    /// An edge endpoint does not resolve to a stored node.
    #[error("edge endpoint {node} does not exist")]
    DanglingEndpoint {
        /// The missing endpoint.
        node: NodeId,
    },

    /// A field value is outside its allowed range.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
