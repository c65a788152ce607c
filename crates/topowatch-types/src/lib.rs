//! Shared type definitions for the Topowatch topology sync protocol.
//!
//! This crate is the single source of truth for the data model and the
//! wire protocol spoken between the sync server and its observers.
//! Entity types flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifier wrappers
//! - [`enums`] -- Device, link, and envelope enumerations
//! - [`structs`] -- `Node`, `Edge`, and the `GraphState` snapshot
//! - [`messages`] -- Server and client protocol frames
//! - [`commands`] -- Drafts and patches accepted by the mutation pipeline
//! - [`metadata`] -- Open metadata maps and recursive empty-value stripping

pub mod commands;
pub mod enums;
pub mod ids;
pub mod messages;
pub mod metadata;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use commands::{
    BulkEdgeItem, BulkNodeItem, BulkUpdateRequest, DEFAULT_BULK_SOURCE, DeviceReport, EdgeDraft,
    EdgePatch, NodeDraft, NodePatch,
};
pub use enums::{EntityType, Layer, LinkStatus, LinkType, NodeStatus, NodeType, UpdateType};
pub use ids::{EdgeId, NodeId};
pub use messages::{ClientMessage, Entity, GraphUpdate, ServerMessage};
pub use metadata::{Metadata, is_empty_value, strip_empty, strip_empty_map};
pub use structs::{Edge, GraphState, Node, Position};
