//! In-memory Graph Store.
//!
//! [`MemoryGraphStore`] keeps nodes and edges in ordered maps plus an
//! incidence index (`node -> edges touching it`) so node deletion can
//! cascade without scanning every edge.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use topowatch_types::{
    Edge, EdgeDraft, EdgeId, EdgePatch, GraphState, Node, NodeDraft, NodeId, NodePatch,
};
use tracing::debug;

use crate::error::StoreError;
use crate::store::{GraphStats, GraphStore, NodeRemoval};

/// Graph Store backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraphStore {
    /// All nodes indexed by identifier.
    nodes: BTreeMap<NodeId, Node>,
    /// All edges indexed by identifier.
    edges: BTreeMap<EdgeId, Edge>,
    /// Incidence: node -> edges whose source or target is the node.
    incident: BTreeMap<NodeId, BTreeSet<EdgeId>>,
}

impl MemoryGraphStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            incident: BTreeMap::new(),
        }
    }

    /// Return the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn index_edge(&mut self, edge: &Edge) {
        self.incident.entry(edge.source.clone()).or_default().insert(edge.id.clone());
        self.incident.entry(edge.target.clone()).or_default().insert(edge.id.clone());
    }

    fn unindex_edge(&mut self, edge: &Edge) {
        for endpoint in [&edge.source, &edge.target] {
            if let Some(set) = self.incident.get_mut(endpoint) {
                set.remove(&edge.id);
            }
        }
    }

    fn require_node(&self, id: &NodeId) -> Result<(), StoreError> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(StoreError::DanglingEndpoint { node: id.clone() })
        }
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::Validation {
            field: "name",
            reason: "must not be blank".to_owned(),
        });
    }
    Ok(())
}

fn validate_utilization(value: f64) -> Result<(), StoreError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(StoreError::Validation {
            field: "utilization",
            reason: format!("{value} is outside 0..=100"),
        });
    }
    Ok(())
}

impl GraphStore for MemoryGraphStore {
    fn snapshot(&self) -> GraphState {
        GraphState {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
            timestamp: Utc::now(),
        }
    }

    fn node(&self, id: &NodeId) -> Option<Node> {
        self.nodes.get(id).cloned()
    }

    fn edge(&self, id: &EdgeId) -> Option<Edge> {
        self.edges.get(id).cloned()
    }

    fn find_by_device(&self, device_id: &str) -> Option<Node> {
        self.nodes
            .values()
            .find(|node| node.device_id() == Some(device_id))
            .cloned()
    }

    fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            ..GraphStats::default()
        };
        for node in self.nodes.values() {
            let count = stats.node_status_counts.entry(node.status).or_insert(0);
            *count = count.saturating_add(1);
        }
        for edge in self.edges.values() {
            let count = stats.edge_status_counts.entry(edge.status).or_insert(0);
            *count = count.saturating_add(1);
        }
        stats
    }

    fn create_node(&mut self, draft: NodeDraft) -> Result<Node, StoreError> {
        let draft = draft.normalized();
        validate_name(&draft.name)?;
        let node = Node {
            id: NodeId::generate(),
            name: draft.name,
            node_type: draft.node_type,
            ip_address: draft.ip_address,
            status: draft.status,
            layer: draft.layer,
            position: draft.position,
            metadata: draft.metadata,
            last_updated: Some(Utc::now()),
        };
        debug!(node_id = %node.id, name = node.name, "node committed");
        self.nodes.insert(node.id.clone(), node.clone());
        self.incident.entry(node.id.clone()).or_default();
        Ok(node)
    }

    fn update_node(&mut self, id: &NodeId, patch: NodePatch) -> Result<Node, StoreError> {
        let mut node = self
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
        patch.apply(&mut node);
        validate_name(&node.name)?;
        node.last_updated = Some(Utc::now());
        self.nodes.insert(id.clone(), node.clone());
        Ok(node)
    }

    fn delete_node(&mut self, id: &NodeId) -> Result<NodeRemoval, StoreError> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
        let edge_ids = self.incident.remove(id).unwrap_or_default();
        let mut edges = Vec::with_capacity(edge_ids.len());
        for edge_id in edge_ids {
            if let Some(edge) = self.edges.remove(&edge_id) {
                self.unindex_edge(&edge);
                edges.push(edge);
            }
        }
        debug!(node_id = %id, cascaded_edges = edges.len(), "node removed");
        Ok(NodeRemoval { node, edges })
    }

    fn create_edge(&mut self, draft: EdgeDraft) -> Result<Edge, StoreError> {
        let draft = draft.normalized();
        self.require_node(&draft.source)?;
        self.require_node(&draft.target)?;
        validate_utilization(draft.utilization)?;
        let edge = Edge {
            id: EdgeId::generate(),
            source: draft.source,
            target: draft.target,
            edge_type: draft.edge_type,
            bandwidth: draft.bandwidth,
            utilization: draft.utilization,
            status: draft.status,
            metadata: draft.metadata,
            last_updated: Some(Utc::now()),
        };
        self.index_edge(&edge);
        self.edges.insert(edge.id.clone(), edge.clone());
        Ok(edge)
    }

    fn update_edge(&mut self, id: &EdgeId, patch: EdgePatch) -> Result<Edge, StoreError> {
        let previous = self
            .edges
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::EdgeNotFound(id.clone()))?;
        let mut edge = previous.clone();
        patch.apply(&mut edge);
        self.require_node(&edge.source)?;
        self.require_node(&edge.target)?;
        validate_utilization(edge.utilization)?;
        edge.last_updated = Some(Utc::now());
        self.unindex_edge(&previous);
        self.index_edge(&edge);
        self.edges.insert(id.clone(), edge.clone());
        Ok(edge)
    }

    fn delete_edge(&mut self, id: &EdgeId) -> Result<Edge, StoreError> {
        let edge = self
            .edges
            .remove(id)
            .ok_or_else(|| StoreError::EdgeNotFound(id.clone()))?;
        self.unindex_edge(&edge);
        Ok(edge)
    }
}
