//! Protocol messages exchanged over a session socket.
//!
//! Every frame is a JSON object discriminated by its `type` field.
//!
//! | Direction | `type` | Payload |
//! |-----------|--------|---------|
//! | server -> client | `connection_established` | `session_id`, `timestamp` |
//! | server -> client | `graph_state` | `nodes`, `edges`, `timestamp` |
//! | server -> client | `graph_update` | `update_type`, `entity_type`, `entity_data`, `source`, `timestamp` |
//! | both | `ping` / `pong` | optional `timestamp` |
//! | client -> server | `request_graph_state` | none |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{EntityType, UpdateType};
use crate::structs::{Edge, GraphState, Node};

/// A single delta envelope describing one entity's creation, update,
/// or deletion.
///
/// `entity_data` stays an open JSON value on the wire so that one
/// malformed entity cannot poison the envelope; use [`GraphUpdate::entity`]
/// to obtain the typed entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GraphUpdate {
    /// What happened.
    pub update_type: UpdateType,
    /// Which collection.
    pub entity_type: EntityType,
    /// The committed entity (the last committed value for deletions).
    pub entity_data: serde_json::Value,
    /// Origin tag of the mutation (`api`, `device_<id>`, batch source).
    pub source: String,
    /// Store commit time.
    pub timestamp: DateTime<Utc>,
}

/// A typed view of [`GraphUpdate::entity_data`].
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// A device.
    Node(Node),
    /// A link.
    Edge(Edge),
}

impl GraphUpdate {
    /// Build an envelope carrying a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be serialized.
    pub fn for_node(
        update_type: UpdateType,
        node: &Node,
        source: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            update_type,
            entity_type: EntityType::Node,
            entity_data: serde_json::to_value(node)?,
            source: source.to_owned(),
            timestamp,
        })
    }

    /// Build an envelope carrying an edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge cannot be serialized.
    pub fn for_edge(
        update_type: UpdateType,
        edge: &Edge,
        source: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            update_type,
            entity_type: EntityType::Edge,
            entity_data: serde_json::to_value(edge)?,
            source: source.to_owned(),
            timestamp,
        })
    }

    /// Parse `entity_data` according to `entity_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match the entity shape.
    pub fn entity(&self) -> Result<Entity, serde_json::Error> {
        match self.entity_type {
            EntityType::Node => Node::deserialize(&self.entity_data).map(Entity::Node),
            EntityType::Edge => Edge::deserialize(&self.entity_data).map(Entity::Edge),
        }
    }

    /// The entity id, read without parsing the rest of the payload.
    ///
    /// Deletions only need the id, so a deletion with a truncated
    /// payload is still applicable.
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_data.get("id").and_then(serde_json::Value::as_str)
    }
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame on every new connection.
    ConnectionEstablished {
        /// The session the connection was registered under.
        session_id: String,
        /// Server time of registration.
        timestamp: DateTime<Utc>,
    },
    /// Full snapshot; always supersedes local state.
    GraphState(GraphState),
    /// One committed change.
    GraphUpdate(GraphUpdate),
    /// Liveness probe.
    Ping {
        /// Sender time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Liveness answer.
    Pong {
        /// Sender time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
}

/// Control frames sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for a fresh `graph_state` on this connection.
    RequestGraphState,
    /// Liveness probe; answered with a `pong`.
    Ping {
        /// Sender time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Liveness answer to a server `ping`.
    Pong {
        /// Sender time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
}

impl ServerMessage {
    /// Short name used in log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::GraphState(_) => "graph_state",
            Self::GraphUpdate(_) => "graph_update",
            Self::Ping { .. } => "ping",
            Self::Pong { .. } => "pong",
        }
    }
}
