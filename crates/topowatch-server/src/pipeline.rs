//! Mutation Pipeline.
//!
//! Every change to the graph flows through [`MutationPipeline`]:
//!
//! 1. The command is normalized (empty metadata stripped).
//! 2. The store commits it, or rejects it and nothing is emitted.
//! 3. Each committed entity is wrapped in one [`GraphUpdate`] tagged with
//!    the mutation's origin and handed to the [`SessionHub`].
//!
//! The store sits behind a single async mutex, and broadcasting happens
//! before the mutex is released. The mutex therefore acts as the commit
//! sequencer: every connection receives deltas in commit order, and a
//! newly attached connection receives its snapshot strictly before any
//! delta committed after it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use topowatch_store::{GraphStats, GraphStore, NodeRemoval};
use topowatch_types::{
    BulkEdgeItem, BulkNodeItem, BulkUpdateRequest, DeviceReport, Edge, EdgeDraft, EdgeId,
    EdgePatch, GraphState, GraphUpdate, Layer, Node, NodeDraft, NodeId, NodePatch, NodeStatus,
    NodeType, ServerMessage, UpdateType,
};

use crate::error::PipelineError;
use crate::hub::{ConnectionId, HubError, SessionHub, SessionSink};

/// Who asked for a mutation. Rendered into [`GraphUpdate::source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOrigin {
    /// The REST API (`api`).
    Api,
    /// A device reporting itself (`device_<id>`).
    Device(String),
    /// A bulk batch, tagged with the batch's own source label.
    Batch(String),
}

impl MutationOrigin {
    /// The origin tag carried on the wire.
    pub fn tag(&self) -> String {
        match self {
            Self::Api => "api".to_owned(),
            Self::Device(id) => format!("device_{id}"),
            Self::Batch(source) => source.clone(),
        }
    }
}

/// Whether a device report created a node or updated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAction {
    /// No node carried the device id; one was created.
    Created,
    /// The matching node was updated.
    Updated,
}

/// Result of a device self-report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceOutcome {
    /// What happened.
    pub action: DeviceAction,
    /// The committed node.
    pub node: Node,
}

/// Per-item result of a bulk batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    /// A new entity was committed.
    Created,
    /// An existing entity was updated.
    Updated,
    /// The item was rejected; the rest of the batch still ran.
    Failed,
}

/// Outcome of one bulk item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkItemResult {
    /// What happened.
    pub action: BulkAction,
    /// The affected entity, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Why the item failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkItemResult {
    fn ok(action: BulkAction, id: String) -> Self {
        Self {
            action,
            id: Some(id),
            error: None,
        }
    }

    fn failed(id: Option<String>, error: impl ToString) -> Self {
        Self {
            action: BulkAction::Failed,
            id,
            error: Some(error.to_string()),
        }
    }
}

/// Outcome of a whole bulk batch, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    /// One entry per node item.
    pub nodes: Vec<BulkItemResult>,
    /// One entry per edge item.
    pub edges: Vec<BulkItemResult>,
}

impl BulkOutcome {
    /// Number of items that failed.
    pub fn failures(&self) -> usize {
        self.nodes
            .iter()
            .chain(&self.edges)
            .filter(|r| r.action == BulkAction::Failed)
            .count()
    }
}

/// Serializes commits and fans committed changes out to every session.
pub struct MutationPipeline {
    store: Mutex<Box<dyn GraphStore>>,
    hub: Arc<SessionHub>,
}

impl MutationPipeline {
    /// Wrap a store and the hub that receives its updates.
    pub fn new(store: Box<dyn GraphStore>, hub: Arc<SessionHub>) -> Self {
        Self {
            store: Mutex::new(store),
            hub,
        }
    }

    /// The hub updates are broadcast to.
    pub const fn hub(&self) -> &Arc<SessionHub> {
        &self.hub
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Current committed graph.
    pub async fn snapshot(&self) -> GraphState {
        self.store.lock().await.snapshot()
    }

    /// Look up a node.
    pub async fn node(&self, id: &NodeId) -> Option<Node> {
        self.store.lock().await.node(id)
    }

    /// Look up an edge.
    pub async fn edge(&self, id: &EdgeId) -> Option<Edge> {
        self.store.lock().await.edge(id)
    }

    /// Aggregate counts.
    pub async fn stats(&self) -> GraphStats {
        self.store.lock().await.stats()
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Register a new connection.
    ///
    /// Queues `connection_established` and a full `graph_state` on the
    /// sink, then adds it to the hub, all while holding the commit lock.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Delivery`] if the sink rejects either of
    /// the initial frames; the connection is not registered.
    pub async fn attach(
        &self,
        session_id: &str,
        connection: ConnectionId,
        sink: Box<dyn SessionSink>,
    ) -> Result<(), PipelineError> {
        let store = self.store.lock().await;
        let established = ServerMessage::ConnectionEstablished {
            session_id: session_id.to_owned(),
            timestamp: Utc::now(),
        };
        let state = ServerMessage::GraphState(store.snapshot());
        for message in [&established, &state] {
            let frame = SessionHub::encode(message).map_err(HubError::from)?;
            sink.send(frame)
                .map_err(|source| HubError::Send { connection, source })?;
        }
        self.hub.register(session_id, connection, sink).await;
        drop(store);
        info!(session_id, %connection, "session attached");
        Ok(())
    }

    /// Answer a `request_graph_state` on the requesting connection only.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Delivery`] if the connection is gone or
    /// its queue rejects the frame.
    pub async fn resync(
        &self,
        session_id: &str,
        connection: ConnectionId,
    ) -> Result<(), PipelineError> {
        let store = self.store.lock().await;
        let state = ServerMessage::GraphState(store.snapshot());
        self.hub.send_to(session_id, connection, &state).await?;
        drop(store);
        debug!(session_id, %connection, "graph state resent");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Node commands
    // -----------------------------------------------------------------------

    /// Create a node.
    ///
    /// # Errors
    ///
    /// Returns the store's rejection; nothing is broadcast.
    pub async fn create_node(
        &self,
        draft: NodeDraft,
        origin: &MutationOrigin,
    ) -> Result<Node, PipelineError> {
        let mut store = self.store.lock().await;
        let node = store.create_node(draft.normalized())?;
        self.publish_node(UpdateType::Created, &node, origin).await;
        Ok(node)
    }

    /// Apply a partial update to a node.
    ///
    /// # Errors
    ///
    /// Returns the store's rejection; nothing is broadcast.
    pub async fn update_node(
        &self,
        id: &NodeId,
        patch: NodePatch,
        origin: &MutationOrigin,
    ) -> Result<Node, PipelineError> {
        let mut store = self.store.lock().await;
        let node = store.update_node(id, patch.normalized())?;
        self.publish_node(UpdateType::Updated, &node, origin).await;
        Ok(node)
    }

    /// Delete a node and every edge touching it.
    ///
    /// Edge deletions are broadcast first, then the node deletion, so a
    /// client applying them in order never holds a dangling edge.
    ///
    /// # Errors
    ///
    /// Returns the store's rejection; nothing is broadcast.
    pub async fn delete_node(
        &self,
        id: &NodeId,
        origin: &MutationOrigin,
    ) -> Result<NodeRemoval, PipelineError> {
        let mut store = self.store.lock().await;
        let removal = store.delete_node(id)?;
        for edge in &removal.edges {
            self.publish_edge(UpdateType::Deleted, edge, origin).await;
        }
        self.publish_node(UpdateType::Deleted, &removal.node, origin).await;
        Ok(removal)
    }

    // -----------------------------------------------------------------------
    // Edge commands
    // -----------------------------------------------------------------------

    /// Create an edge.
    ///
    /// # Errors
    ///
    /// Returns the store's rejection; nothing is broadcast.
    pub async fn create_edge(
        &self,
        draft: EdgeDraft,
        origin: &MutationOrigin,
    ) -> Result<Edge, PipelineError> {
        let mut store = self.store.lock().await;
        let edge = store.create_edge(draft.normalized())?;
        self.publish_edge(UpdateType::Created, &edge, origin).await;
        Ok(edge)
    }

    /// Apply a partial update to an edge.
    ///
    /// # Errors
    ///
    /// Returns the store's rejection; nothing is broadcast.
    pub async fn update_edge(
        &self,
        id: &EdgeId,
        patch: EdgePatch,
        origin: &MutationOrigin,
    ) -> Result<Edge, PipelineError> {
        let mut store = self.store.lock().await;
        let edge = store.update_edge(id, patch.normalized())?;
        self.publish_edge(UpdateType::Updated, &edge, origin).await;
        Ok(edge)
    }

    /// Delete an edge.
    ///
    /// # Errors
    ///
    /// Returns the store's rejection; nothing is broadcast.
    pub async fn delete_edge(
        &self,
        id: &EdgeId,
        origin: &MutationOrigin,
    ) -> Result<Edge, PipelineError> {
        let mut store = self.store.lock().await;
        let edge = store.delete_edge(id)?;
        self.publish_edge(UpdateType::Deleted, &edge, origin).await;
        Ok(edge)
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Create or update the node whose `metadata.device_id` matches.
    ///
    /// A first report fills in `Device <id>`, `endpoint`, `online`, and
    /// `network` for anything it leaves out. Later reports only change
    /// the fields they name, except that status falls back to `online`.
    /// Reported metadata is merged over the stored map.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidCommand`] for a blank device id,
    /// or the store's rejection.
    pub async fn report_device(
        &self,
        device_id: &str,
        report: DeviceReport,
    ) -> Result<DeviceOutcome, PipelineError> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(PipelineError::InvalidCommand(
                "device id must not be empty".to_owned(),
            ));
        }
        let origin = MutationOrigin::Device(device_id.to_owned());
        let mut store = self.store.lock().await;

        if let Some(existing) = store.find_by_device(device_id) {
            let mut metadata = existing.metadata.clone();
            metadata.extend(report.metadata);
            metadata.insert("device_id".to_owned(), Value::from(device_id));
            let patch = NodePatch {
                name: report.name,
                node_type: report.node_type,
                ip_address: report.ip_address,
                status: Some(report.status.unwrap_or(NodeStatus::Online)),
                layer: report.layer,
                position: None,
                metadata: Some(metadata),
            };
            let node = store.update_node(&existing.id, patch.normalized())?;
            self.publish_node(UpdateType::Updated, &node, &origin).await;
            return Ok(DeviceOutcome {
                action: DeviceAction::Updated,
                node,
            });
        }

        let mut metadata = report.metadata;
        metadata.insert("device_id".to_owned(), Value::from(device_id));
        let draft = NodeDraft {
            name: report.name.unwrap_or_else(|| format!("Device {device_id}")),
            node_type: report.node_type.unwrap_or(NodeType::Endpoint),
            ip_address: report.ip_address,
            status: report.status.unwrap_or(NodeStatus::Online),
            layer: report.layer.unwrap_or(Layer::Network),
            position: topowatch_types::Position::default(),
            metadata,
        };
        let node = store.create_node(draft.normalized())?;
        self.publish_node(UpdateType::Created, &node, &origin).await;
        Ok(DeviceOutcome {
            action: DeviceAction::Created,
            node,
        })
    }

    /// Apply a batch: nodes first, then edges, each in request order.
    ///
    /// Items carrying an `id` are updates; the rest are creates. A failed
    /// item is recorded and the batch continues.
    pub async fn apply_bulk(&self, request: BulkUpdateRequest) -> BulkOutcome {
        let origin = MutationOrigin::Batch(request.source);
        let mut outcome = BulkOutcome::default();
        let mut store = self.store.lock().await;

        for item in request.nodes {
            let result = self.apply_bulk_node(store.as_mut(), item, &origin).await;
            outcome.nodes.push(result);
        }
        for item in request.edges {
            let result = self.apply_bulk_edge(store.as_mut(), item, &origin).await;
            outcome.edges.push(result);
        }
        drop(store);

        let failures = outcome.failures();
        if failures > 0 {
            warn!(source = %origin.tag(), failures, "bulk batch had failed items");
        }
        outcome
    }

    async fn apply_bulk_node(
        &self,
        store: &mut dyn GraphStore,
        item: BulkNodeItem,
        origin: &MutationOrigin,
    ) -> BulkItemResult {
        let patch = item.patch.normalized();
        match item.id {
            Some(id) => match store.update_node(&id, patch) {
                Ok(node) => {
                    self.publish_node(UpdateType::Updated, &node, origin).await;
                    BulkItemResult::ok(BulkAction::Updated, node.id.into_inner())
                }
                Err(e) => BulkItemResult::failed(Some(id.into_inner()), e),
            },
            None => {
                let Some(draft) = patch.into_draft() else {
                    return BulkItemResult::failed(None, "node create needs name and type");
                };
                match store.create_node(draft) {
                    Ok(node) => {
                        self.publish_node(UpdateType::Created, &node, origin).await;
                        BulkItemResult::ok(BulkAction::Created, node.id.into_inner())
                    }
                    Err(e) => BulkItemResult::failed(None, e),
                }
            }
        }
    }

    async fn apply_bulk_edge(
        &self,
        store: &mut dyn GraphStore,
        item: BulkEdgeItem,
        origin: &MutationOrigin,
    ) -> BulkItemResult {
        let patch = item.patch.normalized();
        match item.id {
            Some(id) => match store.update_edge(&id, patch) {
                Ok(edge) => {
                    self.publish_edge(UpdateType::Updated, &edge, origin).await;
                    BulkItemResult::ok(BulkAction::Updated, edge.id.into_inner())
                }
                Err(e) => BulkItemResult::failed(Some(id.into_inner()), e),
            },
            None => {
                let Some(draft) = patch.into_draft() else {
                    return BulkItemResult::failed(None, "edge create needs source and target");
                };
                match store.create_edge(draft) {
                    Ok(edge) => {
                        self.publish_edge(UpdateType::Created, &edge, origin).await;
                        BulkItemResult::ok(BulkAction::Created, edge.id.into_inner())
                    }
                    Err(e) => BulkItemResult::failed(None, e),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    async fn publish_node(&self, update_type: UpdateType, node: &Node, origin: &MutationOrigin) {
        let timestamp = commit_time(update_type, node.last_updated);
        match GraphUpdate::for_node(update_type, node, &origin.tag(), timestamp) {
            Ok(update) => self.publish(update).await,
            Err(e) => warn!(node_id = %node.id, error = %e, "failed to encode node update"),
        }
    }

    async fn publish_edge(&self, update_type: UpdateType, edge: &Edge, origin: &MutationOrigin) {
        let timestamp = commit_time(update_type, edge.last_updated);
        match GraphUpdate::for_edge(update_type, edge, &origin.tag(), timestamp) {
            Ok(update) => self.publish(update).await,
            Err(e) => warn!(edge_id = %edge.id, error = %e, "failed to encode edge update"),
        }
    }

    async fn publish(&self, update: GraphUpdate) {
        let update_type = update.update_type;
        let entity_type = update.entity_type;
        let report = self.hub.broadcast(&ServerMessage::GraphUpdate(update)).await;
        debug!(
            %update_type,
            %entity_type,
            delivered = report.delivered,
            dropped = report.dropped,
            "graph update broadcast"
        );
    }
}

/// Creations and updates carry the store's commit stamp; deletions
/// carry the time of removal.
fn commit_time(update_type: UpdateType, stamped: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match (update_type, stamped) {
        (UpdateType::Deleted, _) | (_, None) => Utc::now(),
        (_, Some(at)) => at,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use serde_json::json;
    use topowatch_store::{MemoryGraphStore, StoreError};
    use topowatch_types::{EntityType, LinkStatus};

    use super::*;
    use crate::hub::{Frame, SinkError};

    #[derive(Clone, Default)]
    struct Capture {
        frames: Arc<StdMutex<Vec<ServerMessage>>>,
    }

    impl SessionSink for Capture {
        fn send(&self, frame: Frame) -> Result<(), SinkError> {
            let msg = serde_json::from_str(&frame).unwrap();
            self.frames.lock().unwrap().push(msg);
            Ok(())
        }
    }

    impl Capture {
        fn updates(&self) -> Vec<GraphUpdate> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .filter_map(|m| match m {
                    ServerMessage::GraphUpdate(u) => Some(u.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    async fn attached() -> (MutationPipeline, Capture) {
        let hub = Arc::new(SessionHub::new());
        let pipeline = MutationPipeline::new(Box::new(MemoryGraphStore::new()), hub);
        let capture = Capture::default();
        pipeline
            .attach("s1", ConnectionId::new(), Box::new(capture.clone()))
            .await
            .unwrap();
        (pipeline, capture)
    }

    fn draft(name: &str) -> NodeDraft {
        NodeDraft {
            name: name.to_owned(),
            node_type: NodeType::Switch,
            ip_address: None,
            status: NodeStatus::Online,
            layer: Layer::Datalink,
            position: topowatch_types::Position::default(),
            metadata: topowatch_types::Metadata::new(),
        }
    }

    fn link(source: &NodeId, target: &NodeId) -> EdgeDraft {
        EdgeDraft {
            source: source.clone(),
            target: target.clone(),
            edge_type: topowatch_types::LinkType::Ethernet,
            bandwidth: Some("1Gbps".to_owned()),
            utilization: 0.0,
            status: LinkStatus::Active,
            metadata: topowatch_types::Metadata::new(),
        }
    }

    #[tokio::test]
    async fn attach_sends_established_then_snapshot() {
        let hub = Arc::new(SessionHub::new());
        let pipeline = MutationPipeline::new(Box::new(MemoryGraphStore::new()), hub);
        pipeline.create_node(draft("sw1"), &MutationOrigin::Api).await.unwrap();

        let capture = Capture::default();
        pipeline
            .attach("s1", ConnectionId::new(), Box::new(capture.clone()))
            .await
            .unwrap();
        let frames = capture.frames.lock().unwrap().clone();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].kind(), "connection_established");
        match &frames[1] {
            ServerMessage::GraphState(state) => assert_eq!(state.nodes.len(), 1),
            other => panic!("expected graph_state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn commit_emits_one_update_with_origin() {
        let (pipeline, capture) = attached().await;
        let node = pipeline.create_node(draft("sw1"), &MutationOrigin::Api).await.unwrap();

        let updates = capture.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_type, UpdateType::Created);
        assert_eq!(updates[0].entity_type, EntityType::Node);
        assert_eq!(updates[0].source, "api");
        assert_eq!(updates[0].entity_id(), Some(node.id.as_str()));
        assert_eq!(Some(updates[0].timestamp), node.last_updated);
    }

    #[tokio::test]
    async fn rejected_commit_emits_nothing() {
        let (pipeline, capture) = attached().await;
        let err = pipeline
            .update_node(&NodeId::from("ghost"), NodePatch::default(), &MutationOrigin::Api)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::NodeNotFound(_))));
        assert!(capture.updates().is_empty());
    }

    #[tokio::test]
    async fn node_delete_emits_edge_deletions_first() {
        let (pipeline, capture) = attached().await;
        let api = MutationOrigin::Api;
        let a = pipeline.create_node(draft("a"), &api).await.unwrap();
        let b = pipeline.create_node(draft("b"), &api).await.unwrap();
        let c = pipeline.create_node(draft("c"), &api).await.unwrap();
        pipeline.create_edge(link(&a.id, &b.id), &api).await.unwrap();
        pipeline.create_edge(link(&c.id, &a.id), &api).await.unwrap();

        let removal = pipeline.delete_node(&a.id, &api).await.unwrap();
        assert_eq!(removal.edges.len(), 2);

        let deletions: Vec<EntityType> = capture
            .updates()
            .into_iter()
            .filter(|u| u.update_type == UpdateType::Deleted)
            .map(|u| u.entity_type)
            .collect();
        assert_eq!(deletions, [EntityType::Edge, EntityType::Edge, EntityType::Node]);
    }

    #[tokio::test]
    async fn partial_update_keeps_unnamed_fields() {
        let (pipeline, _capture) = attached().await;
        let node = pipeline.create_node(draft("sw1"), &MutationOrigin::Api).await.unwrap();
        let patch = NodePatch {
            status: Some(NodeStatus::Warning),
            ..NodePatch::default()
        };
        let updated = pipeline.update_node(&node.id, patch, &MutationOrigin::Api).await.unwrap();
        assert_eq!(updated.status, NodeStatus::Warning);
        assert_eq!(updated.name, "sw1");
        assert_eq!(updated.layer, Layer::Datalink);
    }

    #[tokio::test]
    async fn device_report_creates_then_updates() {
        let (pipeline, capture) = attached().await;
        let first = pipeline
            .report_device("dev-42", DeviceReport::default())
            .await
            .unwrap();
        assert_eq!(first.action, DeviceAction::Created);
        assert_eq!(first.node.name, "Device dev-42");
        assert_eq!(first.node.node_type, NodeType::Endpoint);
        assert_eq!(first.node.status, NodeStatus::Online);
        assert_eq!(first.node.layer, Layer::Network);
        assert_eq!(first.node.device_id(), Some("dev-42"));

        let mut report = DeviceReport {
            status: Some(NodeStatus::Warning),
            ..DeviceReport::default()
        };
        report.metadata.insert("cpu".to_owned(), json!(91));
        let second = pipeline.report_device("dev-42", report).await.unwrap();
        assert_eq!(second.action, DeviceAction::Updated);
        assert_eq!(second.node.id, first.node.id);
        assert_eq!(second.node.name, "Device dev-42");
        assert_eq!(second.node.status, NodeStatus::Warning);
        assert_eq!(second.node.metadata.get("cpu"), Some(&json!(91)));
        assert_eq!(second.node.device_id(), Some("dev-42"));

        let sources: Vec<String> = capture.updates().into_iter().map(|u| u.source).collect();
        assert_eq!(sources, ["device_dev-42", "device_dev-42"]);
    }

    #[tokio::test]
    async fn blank_device_id_is_rejected() {
        let (pipeline, _capture) = attached().await;
        let err = pipeline
            .report_device("  ", DeviceReport::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCommand(_)));
    }

    #[tokio::test]
    async fn bulk_continues_past_failed_items() {
        let (pipeline, capture) = attached().await;
        let existing = pipeline.create_node(draft("core"), &MutationOrigin::Api).await.unwrap();

        let request: BulkUpdateRequest = serde_json::from_value(json!({
            "nodes": [
                { "name": "edge-1", "type": "router" },
                { "name": "no-type" },
                { "id": existing.id.as_str(), "status": "offline" },
                { "id": "missing", "status": "offline" }
            ],
            "source": "scanner"
        }))
        .unwrap();
        let outcome = pipeline.apply_bulk(request).await;

        let actions: Vec<BulkAction> = outcome.nodes.iter().map(|r| r.action).collect();
        assert_eq!(
            actions,
            [BulkAction::Created, BulkAction::Failed, BulkAction::Updated, BulkAction::Failed]
        );
        assert_eq!(outcome.failures(), 2);

        let updates = capture.updates();
        assert_eq!(updates.len(), 3);
        assert!(updates[1..].iter().all(|u| u.source == "scanner"));
    }

    #[tokio::test]
    async fn bulk_without_source_uses_default_tag() {
        let (pipeline, capture) = attached().await;
        let request: BulkUpdateRequest =
            serde_json::from_value(json!({ "nodes": [{ "name": "x", "type": "host" }] })).unwrap();
        pipeline.apply_bulk(request).await;
        assert_eq!(capture.updates()[0].source, "external_device");
    }

    #[tokio::test]
    async fn resync_reaches_only_the_requester() {
        let hub = Arc::new(SessionHub::new());
        let pipeline = MutationPipeline::new(Box::new(MemoryGraphStore::new()), hub);
        let asker = Capture::default();
        let other = Capture::default();
        let asker_id = ConnectionId::new();
        pipeline.attach("s1", asker_id, Box::new(asker.clone())).await.unwrap();
        pipeline.attach("s1", ConnectionId::new(), Box::new(other.clone())).await.unwrap();

        pipeline.resync("s1", asker_id).await.unwrap();
        assert_eq!(asker.frames.lock().unwrap().len(), 3);
        assert_eq!(other.frames.lock().unwrap().len(), 2);
    }
}
