//! Mutation commands accepted by the Mutation Pipeline.
//!
//! Drafts describe an entity to create; patches describe a partial
//! update where absent fields keep their stored value. Both shapes are
//! also what a client builds when it constructs an outbound update
//! payload, so they skip `None` fields when serialized.

use serde::{Deserialize, Serialize};

use crate::enums::{Layer, LinkStatus, LinkType, NodeStatus, NodeType};
use crate::ids::{EdgeId, NodeId};
use crate::metadata::{Metadata, strip_empty_map};
use crate::structs::{Edge, Node, Position};

/// Default origin tag for bulk batches that do not name one.
pub const DEFAULT_BULK_SOURCE: &str = "external_device";

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A node to be created. The store assigns `id` and `last_updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDraft {
    /// Display label.
    pub name: String,
    /// Device role.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Management address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Initial health.
    #[serde(default)]
    pub status: NodeStatus,
    /// Initial layer.
    #[serde(default)]
    pub layer: Layer,
    /// Initial canvas position.
    #[serde(default)]
    pub position: Position,
    /// Initial metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// A partial node update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    /// New display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New device role.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    /// New management address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// New health.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    /// New layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
    /// New canvas position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Replacement metadata map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl NodeDraft {
    /// Strip empty metadata values recursively.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.metadata = strip_empty_map(self.metadata);
        self
    }
}

impl NodePatch {
    /// Strip empty metadata values recursively.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.metadata = self.metadata.map(strip_empty_map);
        self
    }

    /// Promote the patch to a draft if it names both `name` and `type`.
    pub fn into_draft(self) -> Option<NodeDraft> {
        Some(NodeDraft {
            name: self.name?,
            node_type: self.node_type?,
            ip_address: self.ip_address,
            status: self.status.unwrap_or_default(),
            layer: self.layer.unwrap_or_default(),
            position: self.position.unwrap_or_default(),
            metadata: self.metadata.unwrap_or_default(),
        })
    }

    /// Overwrite the fields of `node` that this patch names.
    pub fn apply(self, node: &mut Node) {
        if let Some(name) = self.name {
            node.name = name;
        }
        if let Some(node_type) = self.node_type {
            node.node_type = node_type;
        }
        if let Some(ip) = self.ip_address {
            node.ip_address = Some(ip);
        }
        if let Some(status) = self.status {
            node.status = status;
        }
        if let Some(layer) = self.layer {
            node.layer = layer;
        }
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(metadata) = self.metadata {
            node.metadata = strip_empty_map(metadata);
        }
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// An edge to be created. Both endpoints must already exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDraft {
    /// Node the link starts at.
    pub source: NodeId,
    /// Node the link ends at.
    pub target: NodeId,
    /// Link medium.
    #[serde(rename = "type", default)]
    pub edge_type: LinkType,
    /// Nominal bandwidth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
    /// Utilization percentage.
    #[serde(default)]
    pub utilization: f64,
    /// Initial state.
    #[serde(default)]
    pub status: LinkStatus,
    /// Initial metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// A partial edge update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgePatch {
    /// New start node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<NodeId>,
    /// New end node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<NodeId>,
    /// New medium.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<LinkType>,
    /// New bandwidth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
    /// New utilization percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
    /// New state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LinkStatus>,
    /// Replacement metadata map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl EdgeDraft {
    /// Strip empty metadata values recursively.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.metadata = strip_empty_map(self.metadata);
        self
    }
}

impl EdgePatch {
    /// Strip empty metadata values recursively.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.metadata = self.metadata.map(strip_empty_map);
        self
    }

    /// Promote the patch to a draft if it names both endpoints.
    pub fn into_draft(self) -> Option<EdgeDraft> {
        Some(EdgeDraft {
            source: self.source?,
            target: self.target?,
            edge_type: self.edge_type.unwrap_or_default(),
            bandwidth: self.bandwidth,
            utilization: self.utilization.unwrap_or(0.0),
            status: self.status.unwrap_or_default(),
            metadata: self.metadata.unwrap_or_default(),
        })
    }

    /// Overwrite the fields of `edge` that this patch names.
    pub fn apply(self, edge: &mut Edge) {
        if let Some(source) = self.source {
            edge.source = source;
        }
        if let Some(target) = self.target {
            edge.target = target;
        }
        if let Some(edge_type) = self.edge_type {
            edge.edge_type = edge_type;
        }
        if let Some(bandwidth) = self.bandwidth {
            edge.bandwidth = Some(bandwidth);
        }
        if let Some(utilization) = self.utilization {
            edge.utilization = utilization;
        }
        if let Some(status) = self.status {
            edge.status = status;
        }
        if let Some(metadata) = self.metadata {
            edge.metadata = strip_empty_map(metadata);
        }
    }
}

// ---------------------------------------------------------------------------
// Batch and self-report
// ---------------------------------------------------------------------------

/// One node entry of a bulk batch. With an `id` it is an update,
/// without one it is a create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkNodeItem {
    /// Existing node to update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    /// Fields to set.
    #[serde(flatten)]
    pub patch: NodePatch,
}

/// One edge entry of a bulk batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkEdgeItem {
    /// Existing edge to update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EdgeId>,
    /// Fields to set.
    #[serde(flatten)]
    pub patch: EdgePatch,
}

/// A batch of changes pushed by a discovery scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdateRequest {
    /// Node creates and updates, applied in order.
    #[serde(default)]
    pub nodes: Vec<BulkNodeItem>,
    /// Edge creates and updates, applied after the nodes.
    #[serde(default)]
    pub edges: Vec<BulkEdgeItem>,
    /// Origin tag stamped on every resulting update.
    #[serde(default = "default_bulk_source")]
    pub source: String,
}

fn default_bulk_source() -> String {
    DEFAULT_BULK_SOURCE.to_owned()
}

/// A single device reporting its own state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceReport {
    /// Display label (defaults to `Device <id>` on first report).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Device role (defaults to `endpoint` on first report).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    /// Management address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Health (defaults to `online`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    /// Layer (defaults to `network`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
    /// Telemetry metadata; `device_id` is always added.
    #[serde(default)]
    pub metadata: Metadata,
}
