//! The Graph Store seam.
//!
//! The store is the authoritative record of nodes and edges. The sync
//! layer never mutates entities itself: it asks the store to commit and
//! relays whatever the store reports as committed. Concurrent writers
//! are serialized by the caller, so the last commit for an id wins.

use std::collections::BTreeMap;

use serde::Serialize;
use topowatch_types::{
    Edge, EdgeDraft, EdgeId, EdgePatch, GraphState, LinkStatus, Node, NodeDraft, NodeId,
    NodePatch, NodeStatus,
};

use crate::error::StoreError;

/// Everything removed by a node deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRemoval {
    /// The node as it was last committed.
    pub node: Node,
    /// Every edge that referenced the node, as last committed.
    pub edges: Vec<Edge>,
}

/// Totals and per-status counts over the whole graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Number of nodes.
    pub total_nodes: usize,
    /// Number of edges.
    pub total_edges: usize,
    /// Nodes per status.
    pub node_status_counts: BTreeMap<NodeStatus, usize>,
    /// Edges per status.
    pub edge_status_counts: BTreeMap<LinkStatus, usize>,
}

/// Authoritative, committed node/edge records.
///
/// Commit methods stamp `last_updated` with the commit time and return
/// the committed value. Implementations must leave state untouched when
/// they return an error.
pub trait GraphStore: Send + Sync {
    /// Read the full graph.
    fn snapshot(&self) -> GraphState;

    /// Look up a node.
    fn node(&self, id: &NodeId) -> Option<Node>;

    /// Look up an edge.
    fn edge(&self, id: &EdgeId) -> Option<Edge>;

    /// Find the node whose `metadata.device_id` equals `device_id`.
    fn find_by_device(&self, device_id: &str) -> Option<Node>;

    /// Aggregate counts.
    fn stats(&self) -> GraphStats;

    /// Commit a new node.
    fn create_node(&mut self, draft: NodeDraft) -> Result<Node, StoreError>;

    /// Commit a partial update to an existing node.
    fn update_node(&mut self, id: &NodeId, patch: NodePatch) -> Result<Node, StoreError>;

    /// Remove a node and every edge touching it.
    fn delete_node(&mut self, id: &NodeId) -> Result<NodeRemoval, StoreError>;

    /// Commit a new edge between two existing nodes.
    fn create_edge(&mut self, draft: EdgeDraft) -> Result<Edge, StoreError>;

    /// Commit a partial update to an existing edge.
    fn update_edge(&mut self, id: &EdgeId, patch: EdgePatch) -> Result<Edge, StoreError>;

    /// Remove an edge.
    fn delete_edge(&mut self, id: &EdgeId) -> Result<Edge, StoreError>;
}
