//! Demo topology seeding.
//!
//! Loads the `seed` section of the config into an empty store before the
//! server accepts connections, so seeding produces no deltas. Each device
//! carries its config name in `metadata.device_id`, which lets devices
//! that later self-report land on their seeded node.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info};

use topowatch_core::SeedConfig;
use topowatch_store::GraphStore;
use topowatch_types::{EdgeDraft, LinkStatus, Metadata, NodeDraft, NodeId, NodeStatus, Position};

use crate::error::DaemonError;

/// What a seeding pass committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Nodes created.
    pub nodes: usize,
    /// Edges created.
    pub edges: usize,
}

/// Commit every seeded device and link to `store`.
///
/// Does nothing when seeding is disabled.
///
/// # Errors
///
/// Returns [`DaemonError::UnknownSeedDevice`] if a link references a
/// device name that is not seeded, or [`DaemonError::Seed`] if the store
/// rejects an entity.
pub fn seed_store(store: &mut dyn GraphStore, seed: &SeedConfig) -> Result<SeedSummary, DaemonError> {
    let mut summary = SeedSummary::default();
    if !seed.enabled {
        info!("Seeding disabled");
        return Ok(summary);
    }

    let mut ids: BTreeMap<&str, NodeId> = BTreeMap::new();
    for device in &seed.devices {
        let mut metadata = Metadata::new();
        metadata.insert("device_id".to_owned(), Value::String(device.name.clone()));
        let node = store.create_node(NodeDraft {
            name: device.name.clone(),
            node_type: device.node_type,
            ip_address: device.ip_address.clone(),
            status: NodeStatus::Online,
            layer: device.layer,
            position: Position::default(),
            metadata,
        })?;
        debug!(node_id = %node.id, name = device.name, "Seeded device");
        ids.insert(device.name.as_str(), node.id);
        summary.nodes = summary.nodes.saturating_add(1);
    }

    for link in &seed.links {
        let (Some(source), Some(target)) = (
            ids.get(link.source.as_str()),
            ids.get(link.target.as_str()),
        ) else {
            return Err(DaemonError::UnknownSeedDevice {
                source_name: link.source.clone(),
                target_name: link.target.clone(),
            });
        };
        let mut metadata = Metadata::new();
        if let Some(subnet) = &link.subnet {
            metadata.insert("subnet".to_owned(), Value::String(subnet.clone()));
        }
        let edge = store.create_edge(EdgeDraft {
            source: source.clone(),
            target: target.clone(),
            edge_type: link.link_type,
            bandwidth: link.bandwidth.clone(),
            utilization: 0.0,
            status: LinkStatus::Active,
            metadata,
        })?;
        debug!(edge_id = %edge.id, source = link.source, target = link.target, "Seeded link");
        summary.edges = summary.edges.saturating_add(1);
    }

    info!(nodes = summary.nodes, edges = summary.edges, "Seed topology committed");
    Ok(summary)
}
