//! Core entity structs: devices, links, and the full-state snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Layer, LinkStatus, LinkType, NodeStatus, NodeType};
use crate::ids::{EdgeId, NodeId};
use crate::metadata::Metadata;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Canvas coordinates of a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// A device in the topology graph.
///
/// `last_updated` is the Graph Store commit time of the current value,
/// never the time a client received it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Node {
    /// Stable unique identifier.
    pub id: NodeId,
    /// Display label.
    pub name: String,
    /// Device role.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Management address, if known.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Operational health.
    #[serde(default)]
    pub status: NodeStatus,
    /// OSI layer the device is drawn on.
    #[serde(default)]
    pub layer: Layer,
    /// Canvas coordinates.
    #[serde(default)]
    pub position: Position,
    /// Open vendor/model/telemetry metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Store commit time of this value.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Node {
    /// Return the value of `metadata.device_id` if it is a string.
    ///
    /// Self-reporting devices are matched to their node through this key.
    pub fn device_id(&self) -> Option<&str> {
        self.metadata.get("device_id").and_then(serde_json::Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// A link between two devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Edge {
    /// Stable unique identifier.
    pub id: EdgeId,
    /// Node the link starts at.
    pub source: NodeId,
    /// Node the link ends at.
    pub target: NodeId,
    /// Link medium.
    #[serde(rename = "type", default)]
    pub edge_type: LinkType,
    /// Nominal bandwidth, free-form (e.g. `1Gbps`).
    #[serde(default)]
    pub bandwidth: Option<String>,
    /// Utilization percentage in `0..=100`.
    #[serde(default)]
    pub utilization: f64,
    /// Operational state.
    #[serde(default)]
    pub status: LinkStatus,
    /// Open metadata (subnet, VLAN, interfaces).
    #[serde(default)]
    pub metadata: Metadata,
    /// Store commit time of this value.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Edge {
    /// Return `true` if either endpoint is `node`.
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The complete graph as read from the store at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GraphState {
    /// Every node.
    pub nodes: Vec<Node>,
    /// Every edge.
    pub edges: Vec<Edge>,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}
