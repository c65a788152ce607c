//! Adapter / field-filtering layer.
//!
//! Maps between the wire shape of an entity (open `metadata` map) and a
//! display shape with named fields for the well-known metadata keys.
//! Keys that are not lifted stay in `extra` so nothing is lost.
//!
//! Empty values (null, blank strings, empty arrays, empty objects) are
//! stripped recursively on the way in (hydration) and on the way out
//! (building update payloads).
//!
//! A lifted key must also have the expected JSON type; a `cpu` of
//! `"high"` stays in `extra` rather than being dropped.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use topowatch_types::{
    Edge, EdgeId, EdgePatch, Layer, LinkStatus, LinkType, Metadata, Node, NodeId, NodePatch,
    NodeStatus, NodeType, Position, strip_empty_map,
};

use crate::mirror::GraphMirror;

// ---------------------------------------------------------------------------
// Display shapes
// ---------------------------------------------------------------------------

/// A device as shown to users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayNode {
    /// Node id.
    pub id: NodeId,
    /// Display label.
    pub label: String,
    /// Device role.
    pub node_type: NodeType,
    /// Management address.
    pub ip_address: Option<String>,
    /// Health.
    pub status: NodeStatus,
    /// Layer.
    pub layer: Layer,
    /// Canvas position.
    pub position: Position,
    /// `metadata.vendor`.
    pub vendor: Option<String>,
    /// `metadata.model`.
    pub model: Option<String>,
    /// `metadata.version`.
    pub version: Option<String>,
    /// `metadata.location`.
    pub location: Option<String>,
    /// `metadata.ports`.
    pub ports: Option<u64>,
    /// `metadata.uptime`.
    pub uptime: Option<String>,
    /// `metadata.cpu` (percent).
    pub cpu: Option<f64>,
    /// `metadata.memory` (percent).
    pub memory: Option<f64>,
    /// Remaining non-empty metadata.
    pub extra: Metadata,
    /// Store commit time.
    pub last_updated: Option<DateTime<Utc>>,
}

/// A link as shown to users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayEdge {
    /// Edge id.
    pub id: EdgeId,
    /// Start node.
    pub source: NodeId,
    /// End node.
    pub target: NodeId,
    /// Medium.
    pub link_type: LinkType,
    /// Nominal bandwidth.
    pub bandwidth: Option<String>,
    /// Utilization percentage.
    pub utilization: f64,
    /// State.
    pub status: LinkStatus,
    /// `metadata.interface`.
    pub interface: Option<String>,
    /// `metadata.vlan`, rendered as text.
    pub vlan: Option<String>,
    /// `metadata.subnet`.
    pub subnet: Option<String>,
    /// Remaining non-empty metadata.
    pub extra: Metadata,
    /// Store commit time.
    pub last_updated: Option<DateTime<Utc>>,
}

impl DisplayNode {
    /// Hydrate from the wire shape.
    pub fn from_node(node: &Node) -> Self {
        let mut meta = strip_empty_map(node.metadata.clone());
        Self {
            id: node.id.clone(),
            label: node.name.clone(),
            node_type: node.node_type,
            ip_address: node.ip_address.clone().filter(|ip| !ip.trim().is_empty()),
            status: node.status,
            layer: node.layer,
            position: node.position,
            vendor: take_string(&mut meta, "vendor"),
            model: take_string(&mut meta, "model"),
            version: take_string(&mut meta, "version"),
            location: take_string(&mut meta, "location"),
            ports: take_u64(&mut meta, "ports"),
            uptime: take_string(&mut meta, "uptime"),
            cpu: take_f64(&mut meta, "cpu"),
            memory: take_f64(&mut meta, "memory"),
            extra: meta,
            last_updated: node.last_updated,
        }
    }

    /// Fold named fields back into one stripped metadata map.
    pub fn outbound_metadata(&self) -> Metadata {
        let mut meta = self.extra.clone();
        put(&mut meta, "vendor", self.vendor.clone().map(Value::from));
        put(&mut meta, "model", self.model.clone().map(Value::from));
        put(&mut meta, "version", self.version.clone().map(Value::from));
        put(&mut meta, "location", self.location.clone().map(Value::from));
        put(&mut meta, "ports", self.ports.map(Value::from));
        put(&mut meta, "uptime", self.uptime.clone().map(Value::from));
        put(&mut meta, "cpu", self.cpu.map(Value::from));
        put(&mut meta, "memory", self.memory.map(Value::from));
        strip_empty_map(meta)
    }

    /// Build the update payload that would store this display value.
    pub fn to_patch(&self) -> NodePatch {
        NodePatch {
            name: non_blank(&self.label),
            node_type: Some(self.node_type),
            ip_address: self.ip_address.as_deref().and_then(non_blank),
            status: Some(self.status),
            layer: Some(self.layer),
            position: Some(self.position),
            metadata: Some(self.outbound_metadata()),
        }
    }
}

impl DisplayEdge {
    /// Hydrate from the wire shape.
    pub fn from_edge(edge: &Edge) -> Self {
        let mut meta = strip_empty_map(edge.metadata.clone());
        Self {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            link_type: edge.edge_type,
            bandwidth: edge.bandwidth.as_deref().and_then(non_blank),
            utilization: edge.utilization,
            status: edge.status,
            interface: take_string(&mut meta, "interface"),
            vlan: take_label(&mut meta, "vlan"),
            subnet: take_string(&mut meta, "subnet"),
            extra: meta,
            last_updated: edge.last_updated,
        }
    }

    /// Fold named fields back into one stripped metadata map.
    pub fn outbound_metadata(&self) -> Metadata {
        let mut meta = self.extra.clone();
        put(&mut meta, "interface", self.interface.clone().map(Value::from));
        put(&mut meta, "vlan", self.vlan.clone().map(Value::from));
        put(&mut meta, "subnet", self.subnet.clone().map(Value::from));
        strip_empty_map(meta)
    }

    /// Build the update payload that would store this display value.
    pub fn to_patch(&self) -> EdgePatch {
        EdgePatch {
            source: Some(self.source.clone()),
            target: Some(self.target.clone()),
            edge_type: Some(self.link_type),
            bandwidth: self.bandwidth.as_deref().and_then(non_blank),
            utilization: Some(self.utilization),
            status: Some(self.status),
            metadata: Some(self.outbound_metadata()),
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn take_string(meta: &mut Metadata, key: &str) -> Option<String> {
    match meta.get(key) {
        Some(Value::String(_)) => match meta.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Lift a string or a number, rendering numbers as text.
fn take_label(meta: &mut Metadata, key: &str) -> Option<String> {
    if let Some(Value::Number(n)) = meta.get(key) {
        let label = n.to_string();
        meta.remove(key);
        return Some(label);
    }
    take_string(meta, key)
}

fn take_u64(meta: &mut Metadata, key: &str) -> Option<u64> {
    let value = meta.get(key).and_then(Value::as_u64)?;
    meta.remove(key);
    Some(value)
}

fn take_f64(meta: &mut Metadata, key: &str) -> Option<f64> {
    let value = meta.get(key).and_then(Value::as_f64)?;
    meta.remove(key);
    Some(value)
}

fn put(meta: &mut Metadata, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        meta.insert(key.to_owned(), value);
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Restricts which nodes are shown. Empty sets mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    /// Layers to show.
    pub layers: BTreeSet<Layer>,
    /// Device roles to show.
    pub node_types: BTreeSet<NodeType>,
    /// Health states to show.
    pub statuses: BTreeSet<NodeStatus>,
}

impl ViewFilter {
    /// Whether `node` passes.
    pub fn admits(&self, node: &Node) -> bool {
        (self.layers.is_empty() || self.layers.contains(&node.layer))
            && (self.node_types.is_empty() || self.node_types.contains(&node.node_type))
            && (self.statuses.is_empty() || self.statuses.contains(&node.status))
    }
}

/// A read-only display graph derived from the mirror.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayGraph {
    /// Visible nodes.
    pub nodes: Vec<DisplayNode>,
    /// Edges whose endpoints are both visible.
    pub edges: Vec<DisplayEdge>,
}

impl DisplayGraph {
    /// Derive a view of `mirror` under `filter`.
    pub fn derive(mirror: &GraphMirror, filter: &ViewFilter) -> Self {
        let visible: BTreeSet<&NodeId> = mirror
            .nodes()
            .filter(|n| filter.admits(n))
            .map(|n| &n.id)
            .collect();
        let nodes = mirror
            .nodes()
            .filter(|n| visible.contains(&n.id))
            .map(DisplayNode::from_node)
            .collect();
        let edges = mirror
            .edges()
            .filter(|e| visible.contains(&e.source) && visible.contains(&e.target))
            .map(DisplayEdge::from_edge)
            .collect();
        Self { nodes, edges }
    }
}
