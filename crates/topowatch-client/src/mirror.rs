//! The local mirror of the server's graph.
//!
//! [`GraphMirror`] is owned by exactly one [`SyncState`](crate::state::SyncState)
//! and is only mutated through [`GraphMirror::apply_snapshot`] and
//! [`GraphMirror::apply_update`]. Everything else reads it.
//!
//! Application rules:
//!
//! | Message | Effect |
//! |---------|--------|
//! | `graph_state` | replace everything |
//! | created | insert unless the id is present (duplicate is a no-op) |
//! | updated | replace if present, otherwise no-op until the next resync |
//! | deleted node | remove it and every edge touching it |
//! | deleted edge | remove it |
//!
//! The mirror never holds an edge whose endpoints are missing. Edges that
//! would dangle (in a snapshot, a create, or an update) are left out and
//! reappear once a later snapshot carries their endpoints.
//!
//! Updates are applied in arrival order. An update carrying an older
//! timestamp than the value it replaces still wins.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use topowatch_types::{
    Edge, EdgeId, Entity, EntityType, GraphState, GraphUpdate, Node, NodeId, UpdateType,
};

/// What applying one message did to the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A snapshot replaced the whole mirror.
    Snapshot {
        /// Nodes now held.
        nodes: usize,
        /// Edges now held.
        edges: usize,
    },
    /// A new entity was inserted.
    Inserted,
    /// An entity was replaced.
    Replaced,
    /// An entity was removed, plus `cascaded` edges touching it.
    Removed {
        /// Edges removed because they touched a removed node.
        cascaded: usize,
    },
    /// A create named an id that is already present.
    Duplicate,
    /// The delta referenced state the mirror does not hold. Healed by
    /// the next resync.
    Ignored,
    /// `entity_data` could not be read as the declared entity type.
    Malformed,
}

impl Applied {
    /// Whether the mirror changed.
    pub const fn changed(self) -> bool {
        matches!(
            self,
            Self::Snapshot { .. } | Self::Inserted | Self::Replaced | Self::Removed { .. }
        )
    }
}

/// Local copy of nodes and edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphMirror {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    snapshot_at: Option<DateTime<Utc>>,
}

impl GraphMirror {
    /// An empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Look up a node.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Look up an edge.
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Server timestamp of the last snapshot applied.
    pub const fn snapshot_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot_at
    }

    /// Whether every edge's endpoints are present.
    pub fn is_consistent(&self) -> bool {
        self.edges.values().all(|e| self.has_endpoints(e))
    }

    /// Replace everything with `state`.
    pub fn apply_snapshot(&mut self, state: GraphState) -> Applied {
        self.nodes = state.nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        let mut dangling = 0_usize;
        let mut edges = BTreeMap::new();
        for edge in state.edges {
            if self.has_endpoints(&edge) {
                edges.insert(edge.id.clone(), edge);
            } else {
                dangling = dangling.saturating_add(1);
            }
        }
        if dangling > 0 {
            debug!(dangling, "snapshot edges without endpoints left out");
        }
        self.edges = edges;
        self.snapshot_at = Some(state.timestamp);
        Applied::Snapshot {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
        }
    }

    /// Apply one delta.
    pub fn apply_update(&mut self, update: &GraphUpdate) -> Applied {
        let outcome = match update.update_type {
            UpdateType::Deleted => self.apply_delete(update),
            UpdateType::Created | UpdateType::Updated => match update.entity() {
                Ok(Entity::Node(node)) => self.upsert_node(update.update_type, node),
                Ok(Entity::Edge(edge)) => self.upsert_edge(update.update_type, edge),
                Err(e) => {
                    debug!(entity_type = %update.entity_type, error = %e, "unreadable entity_data");
                    Applied::Malformed
                }
            },
        };
        if matches!(outcome, Applied::Ignored | Applied::Duplicate) {
            debug!(
                update_type = %update.update_type,
                entity_type = %update.entity_type,
                id = update.entity_id().unwrap_or_default(),
                outcome = ?outcome,
                "delta absorbed without change"
            );
        }
        outcome
    }

    fn upsert_node(&mut self, update_type: UpdateType, node: Node) -> Applied {
        let present = self.nodes.contains_key(&node.id);
        match (update_type, present) {
            (UpdateType::Created, true) => Applied::Duplicate,
            (UpdateType::Updated, false) => Applied::Ignored,
            (_, present) => {
                self.nodes.insert(node.id.clone(), node);
                if present { Applied::Replaced } else { Applied::Inserted }
            }
        }
    }

    fn upsert_edge(&mut self, update_type: UpdateType, edge: Edge) -> Applied {
        let present = self.edges.contains_key(&edge.id);
        match (update_type, present) {
            (UpdateType::Created, true) => Applied::Duplicate,
            (UpdateType::Updated, false) => Applied::Ignored,
            _ if !self.has_endpoints(&edge) => Applied::Ignored,
            (_, present) => {
                self.edges.insert(edge.id.clone(), edge);
                if present { Applied::Replaced } else { Applied::Inserted }
            }
        }
    }

    fn apply_delete(&mut self, update: &GraphUpdate) -> Applied {
        let Some(id) = update.entity_id() else {
            return Applied::Malformed;
        };
        match update.entity_type {
            EntityType::Node => self.remove_node(&NodeId::from(id)),
            EntityType::Edge => {
                if self.edges.remove(&EdgeId::from(id)).is_some() {
                    Applied::Removed { cascaded: 0 }
                } else {
                    Applied::Ignored
                }
            }
        }
    }

    /// Remove a node and cascade to every edge touching it, whether or
    /// not explicit edge deletions ever arrive.
    fn remove_node(&mut self, id: &NodeId) -> Applied {
        let before = self.edges.len();
        self.edges.retain(|_, edge| !edge.touches(id));
        let cascaded = before.saturating_sub(self.edges.len());
        if self.nodes.remove(id).is_some() || cascaded > 0 {
            Applied::Removed { cascaded }
        } else {
            Applied::Ignored
        }
    }

    fn has_endpoints(&self, edge: &Edge) -> bool {
        self.nodes.contains_key(&edge.source) && self.nodes.contains_key(&edge.target)
    }
}
