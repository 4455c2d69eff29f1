// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene persistence.
//!
//! [`Graph::serialize`] turns the scene into plain records. [`Graph::deserialize`]
//! reconciles a live graph against such a document: nodes and edges whose ids
//! match are updated in place (the same in-memory objects survive), unknown
//! records are created and live objects without a record are removed. Undo,
//! redo and live reload all go through this path.

use crate::edge::{Edge, EdgeId, EdgeType, Endpoint};
use crate::graph::Graph;
use crate::node::{Content, InstanceId, Node, NodeError, NodeId, NodeType, OpCode, GENERIC_OP_CODE};
use crate::socket::{Socket, SocketDirection, SocketId, SocketPosition, SocketType};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Result type for scene persistence
pub type SceneResult<T> = Result<T, SceneError>;

/// Error loading or reconciling a scene
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The file exists but does not hold JSON
    #[error("{filename} is not a valid JSON file")]
    InvalidFile {
        /// File name without directories
        filename: String,
    },

    /// Reading or writing failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document is JSON but not a scene
    #[error("Malformed scene: {0}")]
    Malformed(String),
}

/// Persisted socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketRecord {
    /// Socket ID
    pub id: SocketId,
    /// Index within its direction
    #[serde(default)]
    pub index: usize,
    /// Whether several edges may attach
    #[serde(default)]
    pub multi_edges: bool,
    /// Placement on the node
    #[serde(default)]
    pub position: Option<SocketPosition>,
    /// Type tag
    #[serde(default)]
    pub socket_type: SocketType,
    /// Optional label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SocketRecord {
    /// Ordering key: placement first, then index
    fn sort_key(&self, direction: SocketDirection) -> usize {
        let position = self.position.unwrap_or_else(|| SocketPosition::default_for(direction));
        self.index + usize::from(u8::from(position)) * 10000
    }
}

impl From<&Socket> for SocketRecord {
    fn from(socket: &Socket) -> Self {
        Self {
            id: socket.id,
            index: socket.index,
            multi_edges: socket.multi_edges,
            position: Some(socket.position),
            socket_type: socket.socket_type.clone(),
            label: socket.label.clone(),
        }
    }
}

/// Persisted node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node ID
    pub id: NodeId,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Type of the node, absent for generic nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_code: Option<OpCode>,
    /// Horizontal position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_x: Option<f64>,
    /// Vertical position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_y: Option<f64>,
    /// Position as a pair, accepted on input
    #[serde(default, skip_serializing)]
    pub pos: Option<[f64; 2]>,
    /// Input sockets
    #[serde(default)]
    pub inputs: Vec<SocketRecord>,
    /// Output sockets
    #[serde(default)]
    pub outputs: Vec<SocketRecord>,
    /// Node-specific fields
    #[serde(default)]
    pub content: Content,
}

impl NodeRecord {
    /// Position from `pos_x`/`pos_y`, else `pos`, else the origin
    pub fn position(&self) -> [f64; 2] {
        match (self.pos_x, self.pos_y, self.pos) {
            (Some(x), Some(y), _) => [x, y],
            (_, _, Some(pos)) => pos,
            (x, y, None) => [x.unwrap_or(0.0), y.unwrap_or(0.0)],
        }
    }

    /// Set the position, in `pos_x`/`pos_y` form
    pub fn set_position(&mut self, position: [f64; 2]) {
        self.pos_x = Some(position[0]);
        self.pos_y = Some(position[1]);
        self.pos = None;
    }
}

/// Persisted edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Edge ID
    pub id: EdgeId,
    /// Drawing style
    #[serde(default)]
    pub edge_type: EdgeType,
    /// Socket the edge starts from
    #[serde(default)]
    pub start: Option<SocketId>,
    /// Socket the edge ends at
    #[serde(default)]
    pub end: Option<SocketId>,
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            id: edge.id,
            edge_type: edge.edge_type,
            start: Some(edge.start.socket),
            end: Some(edge.end.socket),
        }
    }
}

/// Persisted scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    /// Scene ID
    pub id: u64,
    /// Scene width
    pub scene_width: i64,
    /// Scene height
    pub scene_height: i64,
    /// Nodes in list order
    pub nodes: Vec<NodeRecord>,
    /// Edges in list order
    pub edges: Vec<EdgeRecord>,
}

/// Scene document before its records are parsed
#[derive(Debug, Deserialize)]
struct RawScene {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    scene_width: Option<i64>,
    #[serde(default)]
    scene_height: Option<i64>,
    #[serde(default)]
    nodes: Vec<JsonValue>,
    #[serde(default)]
    edges: Vec<JsonValue>,
}

/// Kind of record that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Node record
    Node,
    /// Edge record
    Edge,
}

/// A record that could not be applied
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    /// Node or edge
    pub kind: RecordKind,
    /// ID named by the record, if readable
    pub id: Option<u64>,
    /// What went wrong
    pub reason: String,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RecordKind::Node => "node",
            RecordKind::Edge => "edge",
        };
        match self.id {
            Some(id) => write!(f, "{kind} {id}: {}", self.reason),
            None => write!(f, "{kind}: {}", self.reason),
        }
    }
}

/// Outcome of [`Graph::deserialize`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Live nodes updated in place
    pub nodes_reused: usize,
    /// Nodes created from records
    pub nodes_created: usize,
    /// Live nodes without a record
    pub nodes_removed: usize,
    /// Live edges updated in place
    pub edges_reused: usize,
    /// Edges created from records
    pub edges_created: usize,
    /// Live edges without a usable record
    pub edges_removed: usize,
    /// Records skipped
    pub failures: Vec<RecordFailure>,
}

impl ReconcileReport {
    /// Every record was applied
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Records added by [`Graph::insert_records`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inserted {
    /// New nodes, in record order
    pub nodes: Vec<NodeId>,
    /// New edges, in record order
    pub edges: Vec<EdgeId>,
    /// Records skipped
    pub failures: Vec<RecordFailure>,
}

/// Translation from persisted socket ids to live ones, built fresh for every call
#[derive(Debug, Default)]
pub(crate) struct IdMap {
    sockets: HashMap<SocketId, SocketId>,
}

fn type_op_code(node_type: &NodeType) -> Option<OpCode> {
    (node_type.op_code != GENERIC_OP_CODE).then_some(node_type.op_code)
}

fn failure(kind: RecordKind, id: Option<u64>, reason: impl Into<String>) -> RecordFailure {
    let failure = RecordFailure {
        kind,
        id,
        reason: reason.into(),
    };
    tracing::warn!("skipping {failure}");
    failure
}

impl Node {
    /// Persisted form of this node
    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            id: self.id,
            title: self.title.clone(),
            op_code: self.op_code,
            pos_x: Some(self.position[0]),
            pos_y: Some(self.position[1]),
            pos: None,
            inputs: self.inputs.iter().map(SocketRecord::from).collect(),
            outputs: self.outputs.iter().map(SocketRecord::from).collect(),
            content: self.content(),
        }
    }

    /// Overwrite this node from a record.
    ///
    /// Content is applied first; when the node rejects it nothing else
    /// changes. A record of another type swaps the behavior.
    pub(crate) fn apply_record(
        &mut self,
        record: &NodeRecord,
        node_type: &NodeType,
        restore_id: bool,
        ids: &mut IdMap,
    ) -> Result<(), NodeError> {
        let op_code = type_op_code(node_type);
        if op_code == self.op_code {
            self.behavior.apply_content(&record.content)?;
        } else {
            let mut behavior = (node_type.behavior)();
            behavior.apply_content(&record.content)?;
            tracing::debug!(node = %record.id, "node type changed to {}", node_type.name);
            self.behavior = behavior;
            self.op_code = op_code;
        }

        self.id = if restore_id { record.id } else { NodeId::new() };
        if !record.title.is_empty() {
            self.title.clone_from(&record.title);
        }
        self.position = record.position();

        let inputs = std::mem::take(&mut self.inputs);
        self.inputs = reconcile_sockets(inputs, &record.inputs, SocketDirection::Input, self.id, restore_id, ids);
        let outputs = std::mem::take(&mut self.outputs);
        self.outputs = reconcile_sockets(outputs, &record.outputs, SocketDirection::Output, self.id, restore_id, ids);

        self.values = vec![Value::Absent; self.outputs.len()];
        self.dirty = true;
        self.behavior.on_deserialized(&record.content);
        Ok(())
    }
}

/// Reuse the live sockets of one side when the record has as many, else
/// build new ones. Attached edge lists are cleared either way.
fn reconcile_sockets(
    existing: Vec<Socket>,
    records: &[SocketRecord],
    direction: SocketDirection,
    node: NodeId,
    restore_id: bool,
    ids: &mut IdMap,
) -> Vec<Socket> {
    let mut ordered: Vec<&SocketRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.sort_key(direction));

    let mut sockets = if existing.len() == ordered.len() {
        existing
    } else {
        if !existing.is_empty() {
            tracing::debug!(node = %node, "socket count changed, recreating {direction:?} sockets");
        }
        ordered
            .iter()
            .map(|r| Socket::new(node, r.index, direction, r.socket_type.clone()))
            .collect()
    };

    for (index, (socket, record)) in sockets.iter_mut().zip(ordered).enumerate() {
        socket.detach_all();
        socket.id = if restore_id { record.id } else { SocketId::new() };
        ids.sockets.insert(record.id, socket.id);
        socket.node = node;
        socket.index = index;
        socket.direction = direction;
        socket.position = record.position.unwrap_or_else(|| SocketPosition::default_for(direction));
        socket.socket_type = record.socket_type.clone();
        socket.multi_edges = record.multi_edges;
        if record.label.is_some() {
            socket.label.clone_from(&record.label);
        }
    }
    sockets
}

impl Graph {
    /// Persisted form of the whole scene.
    ///
    /// Nodes and edges keep list order; a repeated id is written once.
    pub fn serialize(&self) -> SceneRecord {
        let mut seen_nodes = HashSet::new();
        let nodes = self
            .nodes
            .iter()
            .filter(|n| seen_nodes.insert(n.id()))
            .map(Node::to_record)
            .collect();
        let mut seen_edges = HashSet::new();
        let edges = self
            .edges
            .iter()
            .filter(|e| seen_edges.insert(e.id))
            .map(EdgeRecord::from)
            .collect();
        SceneRecord {
            id: self.id,
            scene_width: self.scene_width,
            scene_height: self.scene_height,
            nodes,
            edges,
        }
    }

    /// The scene as a JSON document
    pub fn to_json(&self) -> SceneResult<JsonValue> {
        Ok(serde_json::to_value(self.serialize())?)
    }

    /// Reconcile this graph in place against a scene document, restoring ids
    pub fn deserialize(&mut self, data: &JsonValue) -> SceneResult<ReconcileReport> {
        self.deserialize_with(data, true)
    }

    /// Reconcile this graph against a scene document.
    ///
    /// With `restore_id` false every record becomes a new object with fresh
    /// ids and all live objects are dropped.
    pub fn deserialize_with(&mut self, data: &JsonValue, restore_id: bool) -> SceneResult<ReconcileReport> {
        let raw = RawScene::deserialize(data).map_err(|e| SceneError::Malformed(e.to_string()))?;
        let scene_id = match raw.id {
            Some(id) => Some(id),
            None if restore_id => return Err(SceneError::Malformed("missing scene id".to_string())),
            None => None,
        };

        let mut report = ReconcileReport::default();
        let node_records = raw
            .nodes
            .iter()
            .map(|value| {
                NodeRecord::deserialize(value).map_err(|e| failure(RecordKind::Node, record_id(value), e.to_string()))
            })
            .collect::<Vec<_>>();
        let edge_records = raw
            .edges
            .iter()
            .map(|value| {
                EdgeRecord::deserialize(value).map_err(|e| failure(RecordKind::Edge, record_id(value), e.to_string()))
            })
            .collect::<Vec<_>>();

        if restore_id {
            if let Some(id) = scene_id {
                self.id = id;
            }
        }
        if let Some(width) = raw.scene_width {
            self.scene_width = width;
        }
        if let Some(height) = raw.scene_height {
            self.scene_height = height;
        }

        let mut ids = IdMap::default();
        let kept = self.reconcile_nodes(node_records, restore_id, &mut ids, &mut report);

        let stale: Vec<InstanceId> = self
            .nodes
            .iter()
            .map(Node::instance)
            .filter(|instance| !kept.contains(instance))
            .collect();
        for instance in stale {
            if let Some(node) = self.remove_node_silent(instance) {
                tracing::debug!(node = %node.id(), "removed node without record");
                report.nodes_removed += 1;
            }
        }

        self.reconcile_edges(edge_records, restore_id, &ids, &mut report);

        for node in &mut self.nodes {
            node.dirty = true;
        }
        tracing::info!(
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            failures = report.failures.len(),
            "scene reconciled"
        );
        Ok(report)
    }

    /// Apply node records; returns the instances that have a record
    fn reconcile_nodes(
        &mut self,
        records: Vec<Result<NodeRecord, RecordFailure>>,
        restore_id: bool,
        ids: &mut IdMap,
        report: &mut ReconcileReport,
    ) -> Vec<InstanceId> {
        let registry = Arc::clone(self.registry());
        let mut kept: Vec<InstanceId> = Vec::new();

        for staged in records {
            let record = match staged {
                Ok(record) => record,
                Err(failed) => {
                    if restore_id {
                        if let Some(node) = failed.id.and_then(|id| self.unclaimed_node(NodeId(id), &kept)) {
                            kept.push(node.instance());
                        }
                    }
                    report.failures.push(failed);
                    continue;
                }
            };

            let node_type = registry.resolve(self.select_op_code(&record));
            let live = if restore_id {
                self.unclaimed_node(record.id, &kept).map(Node::instance)
            } else {
                None
            };

            match live {
                Some(instance) => {
                    let Some(node) = self.nodes.iter_mut().find(|n| n.instance() == instance) else {
                        continue;
                    };
                    match node.apply_record(&record, node_type, restore_id, ids) {
                        Ok(()) => report.nodes_reused += 1,
                        Err(err) => report.failures.push(failure(RecordKind::Node, Some(record.id.0), err.to_string())),
                    }
                    kept.push(instance);
                }
                None => {
                    let mut node = Node::new(node_type);
                    match node.apply_record(&record, node_type, restore_id, ids) {
                        Ok(()) => {
                            kept.push(node.instance());
                            self.nodes.push(node);
                            report.nodes_created += 1;
                        }
                        Err(err) => report.failures.push(failure(RecordKind::Node, Some(record.id.0), err.to_string())),
                    }
                }
            }
        }
        kept
    }

    /// First live node with this id that no record has claimed yet
    fn unclaimed_node(&self, node_id: NodeId, claimed: &[InstanceId]) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.id() == node_id && !claimed.contains(&n.instance()))
    }

    fn reconcile_edges(
        &mut self,
        records: Vec<Result<EdgeRecord, RecordFailure>>,
        restore_id: bool,
        ids: &IdMap,
        report: &mut ReconcileReport,
    ) {
        let mut remaining: Vec<Option<Edge>> = std::mem::take(&mut self.edges).into_iter().map(Some).collect();
        let mut take_live = |edge_id: EdgeId| {
            remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|e| e.id == edge_id))
                .and_then(Option::take)
        };
        let mut edges = Vec::new();

        for staged in records {
            let resolved = staged.and_then(|record| {
                let start = record.start.and_then(|s| self.resolve_socket(s, ids, restore_id));
                let end = record.end.and_then(|s| self.resolve_socket(s, ids, restore_id));
                match (start, end) {
                    (Some(start), Some(end)) => Ok((record, start, end)),
                    _ => Err(failure(
                        RecordKind::Edge,
                        Some(record.id.0),
                        "edge references an unknown socket",
                    )),
                }
            });

            match resolved {
                Ok((record, start, end)) => {
                    let live = if restore_id { take_live(record.id) } else { None };
                    match live {
                        Some(mut edge) => {
                            edge.start = start;
                            edge.end = end;
                            edge.edge_type = record.edge_type;
                            edges.push(edge);
                            report.edges_reused += 1;
                        }
                        None => {
                            let mut edge = Edge::new(start, end).with_type(record.edge_type);
                            if restore_id {
                                edge.id = record.id;
                            }
                            edges.push(edge);
                            report.edges_created += 1;
                        }
                    }
                }
                Err(failed) => {
                    if restore_id {
                        if let Some(edge) = failed.id.and_then(|id| take_live(EdgeId(id))) {
                            edges.push(edge);
                        }
                    }
                    report.failures.push(failed);
                }
            }
        }

        report.edges_removed += remaining.iter().flatten().count();
        self.edges = edges;
        self.drop_dangling_edges(report);
        self.reattach_edges();
    }

    /// Live endpoint for a persisted socket id
    fn resolve_socket(&self, persisted: SocketId, ids: &IdMap, restore_id: bool) -> Option<Endpoint> {
        let socket_id = match ids.sockets.get(&persisted) {
            Some(id) => *id,
            None if restore_id => persisted,
            None => return None,
        };
        self.socket(socket_id).map(|s| Endpoint::new(s.node, s.id))
    }

    /// Remove edges whose sockets no longer exist
    fn drop_dangling_edges(&mut self, report: &mut ReconcileReport) {
        let before = self.edges.len();
        let nodes = &self.nodes;
        let exists = |endpoint: Endpoint| {
            nodes
                .iter()
                .any(|n| n.id() == endpoint.node && n.socket(endpoint.socket).is_some())
        };
        self.edges.retain(|edge| {
            let keep = exists(edge.start) && exists(edge.end);
            if !keep {
                tracing::warn!(edge = edge.id.0, "dropping edge with a missing socket");
            }
            keep
        });
        report.edges_removed += before - self.edges.len();
    }

    /// Rebuild every socket's edge list from the edge list
    fn reattach_edges(&mut self) {
        for node in &mut self.nodes {
            for socket in node.inputs.iter_mut().chain(node.outputs.iter_mut()) {
                socket.detach_all();
            }
        }
        let edges: Vec<(EdgeId, Endpoint, Endpoint)> = self.edges.iter().map(|e| (e.id, e.start, e.end)).collect();
        for (edge_id, start, end) in edges {
            for endpoint in [start, end] {
                if let Some(socket) = self
                    .nodes
                    .iter_mut()
                    .find(|n| n.id() == endpoint.node)
                    .and_then(|n| n.socket_mut(endpoint.socket))
                {
                    socket.attach(edge_id);
                }
            }
        }
    }

    /// Add copies of the given records under fresh ids.
    ///
    /// Edges are kept only when both of their sockets belong to inserted
    /// nodes. Existing nodes and edges are untouched.
    pub fn insert_records(&mut self, nodes: &[NodeRecord], edges: &[EdgeRecord]) -> Inserted {
        let registry = Arc::clone(self.registry());
        let mut ids = IdMap::default();
        let mut inserted = Inserted::default();

        for record in nodes {
            let node_type = registry.resolve(self.select_op_code(record));
            let mut node = Node::new(node_type);
            match node.apply_record(record, node_type, false, &mut ids) {
                Ok(()) => inserted.nodes.push(self.add_node(node)),
                Err(err) => inserted
                    .failures
                    .push(failure(RecordKind::Node, Some(record.id.0), err.to_string())),
            }
        }

        for record in edges {
            let start = record.start.and_then(|s| self.resolve_socket(s, &ids, false));
            let end = record.end.and_then(|s| self.resolve_socket(s, &ids, false));
            let (Some(start), Some(end)) = (start, end) else {
                inserted.failures.push(failure(
                    RecordKind::Edge,
                    Some(record.id.0),
                    "edge leaves the inserted nodes",
                ));
                continue;
            };
            match self.add_edge(Edge::new(start, end).with_type(record.edge_type)) {
                Ok(edge_id) => inserted.edges.push(edge_id),
                Err(err) => inserted
                    .failures
                    .push(failure(RecordKind::Edge, Some(record.id.0), err.to_string())),
            }
        }

        tracing::debug!(nodes = inserted.nodes.len(), edges = inserted.edges.len(), "inserted records");
        inserted
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Write the scene as pretty JSON and remember the file name
    pub fn save_to_file(&mut self, path: impl AsRef<Path>) -> SceneResult<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(&self.serialize())?;
        std::fs::write(path, text)?;
        self.set_filename(path);
        self.set_modified(false);
        tracing::info!("saved scene to {}", path.display());
        Ok(())
    }

    /// Read a scene file and reconcile this graph against it.
    ///
    /// A file that is not JSON leaves the graph untouched.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> SceneResult<ReconcileReport> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let data: JsonValue = serde_json::from_slice(&bytes).map_err(|err| {
            let filename = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            tracing::debug!("{filename}: {err}");
            SceneError::InvalidFile { filename }
        })?;
        let report = self.deserialize(&data)?;
        self.set_filename(path);
        self.set_modified(false);
        tracing::info!("loaded scene from {}", path.display());
        Ok(report)
    }
}

fn record_id(value: &JsonValue) -> Option<u64> {
    value.get("id").and_then(JsonValue::as_u64)
}
