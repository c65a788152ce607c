//! Enumeration types for the topology data model and the sync protocol.
//!
//! All enums serialize as lowercase `snake_case` strings on the wire.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// The role a device plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NodeType {
    /// Layer-3 packet forwarder.
    Router,
    /// Layer-2 frame forwarder.
    Switch,
    /// Policy enforcement point.
    Firewall,
    /// Service host.
    Server,
    /// Generic network endpoint (self-reporting devices default to this).
    Endpoint,
    /// End-user workstation.
    Client,
    /// Any other addressable host.
    Host,
}

/// Operational health of a device.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NodeStatus {
    /// Reachable and healthy.
    Online,
    /// Unreachable.
    Offline,
    /// Reachable but degraded.
    Warning,
    /// Reporting a fault.
    Error,
    /// No status has been reported yet.
    #[default]
    Unknown,
}

/// OSI layer a device is drawn on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Layer {
    /// Layer 1.
    Physical,
    /// Layer 2.
    Datalink,
    /// Layer 3.
    #[default]
    Network,
    /// Layer 4.
    Transport,
    /// Layer 7.
    Application,
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Physical or logical medium of a link.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LinkType {
    /// Copper ethernet.
    #[default]
    Ethernet,
    /// Optical fiber.
    Fiber,
    /// Radio link.
    Wireless,
    /// Tunnelled link.
    Vpn,
}

/// Operational state of a link.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LinkStatus {
    /// Carrying traffic.
    Active,
    /// Administratively or physically down.
    Inactive,
    /// Reporting errors.
    Error,
    /// No status has been reported yet.
    #[default]
    Unknown,
}

// ---------------------------------------------------------------------------
// Delta envelope
// ---------------------------------------------------------------------------

/// What happened to the entity carried by a `graph_update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum UpdateType {
    /// The entity was committed for the first time.
    Created,
    /// An existing entity was replaced by a newer committed value.
    Updated,
    /// The entity was removed from the store.
    Deleted,
}

/// Which collection the entity carried by a `graph_update` belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EntityType {
    /// A device.
    Node,
    /// A link between two devices.
    Edge,
}

impl core::fmt::Display for UpdateType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        })
    }
}

impl core::fmt::Display for EntityType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Node => "node",
            Self::Edge => "edge",
        })
    }
}
