// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph (scene) data structure containing nodes and edges.

use crate::edge::{Edge, EdgeId, Endpoint};
use crate::node::{Content, InstanceId, Node, NodeId, NodeRegistry, OpCode};
use crate::serialization::NodeRecord;
use crate::socket::{Socket, SocketId};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default scene extent in both directions
pub const DEFAULT_SCENE_SIZE: i64 = 64000;

/// Picks the op code for a node record during deserialization
pub type NodeClassSelector = Box<dyn Fn(&NodeRecord) -> Option<OpCode>>;

/// Nodes and edges picked by the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Selected nodes
    pub nodes: Vec<NodeId>,
    /// Selected edges
    pub edges: Vec<EdgeId>,
}

impl Selection {
    /// Selection of the given nodes only
    pub fn of_nodes(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
            edges: Vec::new(),
        }
    }

    /// Is the node selected
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains(&node_id)
    }

    /// Is the edge selected
    pub fn contains_edge(&self, edge_id: EdgeId) -> bool {
        self.edges.contains(&edge_id)
    }

    /// Nothing selected
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// A node graph
pub struct Graph {
    /// Scene identifier
    pub(crate) id: u64,
    /// Scene width in pixels
    pub scene_width: i64,
    /// Scene height in pixels
    pub scene_height: i64,
    /// Nodes in insertion order; a `Vec` rather than a map because a loaded
    /// scene may hold several nodes with the same id
    pub(crate) nodes: Vec<Node>,
    /// Edges in insertion order
    pub(crate) edges: Vec<Edge>,
    modified: bool,
    filename: Option<PathBuf>,
    registry: Arc<NodeRegistry>,
    node_class_selector: Option<NodeClassSelector>,
    modified_listeners: Vec<Box<dyn FnMut()>>,
}

impl Graph {
    /// Create a new empty graph that only knows the generic node type
    pub fn new() -> Self {
        Self::with_registry(Arc::new(NodeRegistry::new()))
    }

    /// Create a new empty graph resolving node types through `registry`
    pub fn with_registry(registry: Arc<NodeRegistry>) -> Self {
        Self {
            id: crate::id::mint(),
            scene_width: DEFAULT_SCENE_SIZE,
            scene_height: DEFAULT_SCENE_SIZE,
            nodes: Vec::new(),
            edges: Vec::new(),
            modified: false,
            filename: None,
            registry,
            node_class_selector: None,
            modified_listeners: Vec::new(),
        }
    }

    /// Scene identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Node types known to this graph
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Override how node records pick their type.
    ///
    /// Without a selector the record's own `op_code` is used.
    pub fn set_node_class_selector(&mut self, selector: impl Fn(&NodeRecord) -> Option<OpCode> + 'static) {
        self.node_class_selector = Some(Box::new(selector));
    }

    pub(crate) fn select_op_code(&self, record: &NodeRecord) -> Option<OpCode> {
        match &self.node_class_selector {
            Some(selector) => selector(record),
            None => record.op_code,
        }
    }

    // ------------------------------------------------------------------
    // Modified state
    // ------------------------------------------------------------------

    /// Has the graph been modified since the last load/save
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Set the modified flag; listeners run when it turns on
    pub fn set_modified(&mut self, value: bool) {
        let was = self.modified;
        self.modified = value;
        if !was && value {
            for listener in &mut self.modified_listeners {
                listener();
            }
        }
    }

    /// Register a callback for the modified flag turning on
    pub fn add_modified_listener(&mut self, callback: impl FnMut() + 'static) {
        self.modified_listeners.push(Box::new(callback));
    }

    /// File this graph was last loaded from or saved to
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub(crate) fn set_filename(&mut self, filename: &Path) {
        self.filename = Some(filename.to_path_buf());
    }

    /// File name without directories, or "New Graph"
    pub fn user_friendly_filename(&self) -> String {
        let name = self
            .filename
            .as_ref()
            .and_then(|p| p.file_name())
            .map_or_else(|| "New Graph".to_string(), |n| n.to_string_lossy().into_owned());
        if self.modified {
            format!("{name}*")
        } else {
            name
        }
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.push(node);
        id
    }

    /// Create a node of a registered type and add it
    pub fn create_node(&mut self, op_code: OpCode) -> Option<NodeId> {
        let node = self.registry.create_node(op_code)?;
        Some(self.add_node(node))
    }

    /// Remove a node and its edges.
    ///
    /// Nodes on the other side of removed edges are notified as if the user
    /// had disconnected them.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let position = self.node_position(node_id)?;
        let attached = self.edges_of_node(position);
        for edge_id in attached {
            self.remove_edge_notify(edge_id, Some(node_id));
        }
        let position = self.node_position(node_id)?;
        Some(self.nodes.remove(position))
    }

    /// Remove a node and its edges without notifying anyone
    pub(crate) fn remove_node_silent(&mut self, instance: InstanceId) -> Option<Node> {
        let position = self.nodes.iter().position(|n| n.instance() == instance)?;
        for edge_id in self.edges_of_node(position) {
            self.detach_edge(edge_id);
        }
        Some(self.nodes.remove(position))
    }

    fn edges_of_node(&self, position: usize) -> Vec<EdgeId> {
        let mut attached = Vec::new();
        for socket in self.nodes[position].sockets() {
            for edge_id in socket.edges() {
                if !attached.contains(edge_id) {
                    attached.push(*edge_id);
                }
            }
        }
        attached
    }

    pub(crate) fn node_position(&self, node_id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == node_id)
    }

    /// Get a node by ID (the first one, should the list hold duplicates)
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(Node::id).collect()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Replace node-specific content and re-evaluate the node.
    ///
    /// Content the node rejects leaves it invalid with the error as message.
    pub fn set_content(&mut self, node_id: NodeId, content: &Content) -> Option<Vec<Value>> {
        let node = self.node_mut(node_id)?;
        if let Err(err) = node.behavior.apply_content(content) {
            tracing::debug!(node = %node_id, "content rejected: {err}");
            node.invalid = true;
            node.message = Some(err.to_string());
            let placeholders = node.placeholders();
            self.mark_descendants_dirty(node_id, true);
            return Some(placeholders);
        }
        self.on_input_changed(node_id).ok()
    }

    /// Set one content field and re-evaluate the node
    pub fn set_content_value(
        &mut self,
        node_id: NodeId,
        key: &str,
        value: serde_json::Value,
    ) -> Option<Vec<Value>> {
        let mut content = self.node(node_id)?.content();
        content.insert(key.to_string(), value);
        self.set_content(node_id, &content)
    }

    // ------------------------------------------------------------------
    // Sockets
    // ------------------------------------------------------------------

    /// Find a socket anywhere in the graph
    pub fn socket(&self, socket_id: SocketId) -> Option<&Socket> {
        self.nodes.iter().find_map(|n| n.socket(socket_id))
    }

    fn socket_mut(&mut self, endpoint: Endpoint) -> Option<&mut Socket> {
        self.node_mut(endpoint.node)?.socket_mut(endpoint.socket)
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Add an edge as given and attach it to both sockets.
    ///
    /// Performs no editor policy checks beyond endpoint existence; see
    /// [`Graph::connect`] for the checked variant.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId, ConnectionError> {
        for endpoint in [edge.start, edge.end] {
            let node = self
                .node(endpoint.node)
                .ok_or(ConnectionError::NodeNotFound(endpoint.node))?;
            if node.socket(endpoint.socket).is_none() {
                return Err(ConnectionError::SocketNotFound(endpoint.socket));
            }
        }
        let id = edge.id;
        for endpoint in [edge.start, edge.end] {
            if let Some(socket) = self.socket_mut(endpoint) {
                socket.attach(id);
            }
        }
        self.edges.push(edge);
        Ok(id)
    }

    /// Connect two sockets, enforcing the editor's connection rules.
    ///
    /// The node on the input side is re-evaluated.
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_socket: SocketId,
        to_node: NodeId,
        to_socket: SocketId,
    ) -> Result<EdgeId, ConnectionError> {
        // Validate nodes exist
        let source_node = self.node(from_node).ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self.node(to_node).ok_or(ConnectionError::NodeNotFound(to_node))?;

        // Validate sockets exist
        let source_socket = source_node
            .socket(from_socket)
            .ok_or(ConnectionError::SocketNotFound(from_socket))?;
        let target_socket = target_node
            .socket(to_socket)
            .ok_or(ConnectionError::SocketNotFound(to_socket))?;

        if !source_socket.can_connect(target_socket) {
            return Err(ConnectionError::IncompatibleSockets);
        }

        // Prevent self-loops
        if from_node == to_node {
            return Err(ConnectionError::SelfLoop);
        }

        for socket in [source_socket, target_socket] {
            if !socket.multi_edges && socket.has_edges() {
                return Err(ConnectionError::SocketAlreadyConnected(socket.id));
            }
        }

        let input_side = if target_socket.is_input() { to_node } else { from_node };
        let edge = Edge::new(
            Endpoint::new(from_node, from_socket),
            Endpoint::new(to_node, to_socket),
        );
        let id = self.add_edge(edge)?;
        tracing::debug!(edge = id.0, "connected {from_node} -> {to_node}");
        if let Err(err) = self.on_input_changed(input_side) {
            tracing::error!("re-evaluation after connect failed: {err}");
        }
        Ok(id)
    }

    /// Connect output `from_index` of one node to input `to_index` of another
    pub fn connect_by_index(
        &mut self,
        from_node: NodeId,
        from_index: usize,
        to_node: NodeId,
        to_index: usize,
    ) -> Result<EdgeId, ConnectionError> {
        let from_socket = self
            .node(from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?
            .output(from_index)
            .ok_or(ConnectionError::SocketIndexOutOfRange(from_index))?
            .id;
        let to_socket = self
            .node(to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?
            .input(to_index)
            .ok_or(ConnectionError::SocketIndexOutOfRange(to_index))?
            .id;
        self.connect(from_node, from_socket, to_node, to_socket)
    }

    /// Remove an edge; nodes that lose an input are re-evaluated
    pub fn remove_edge(&mut self, edge_id: EdgeId) -> Option<Edge> {
        self.remove_edge_notify(edge_id, None)
    }

    fn remove_edge_notify(&mut self, edge_id: EdgeId, skip: Option<NodeId>) -> Option<Edge> {
        let edge = self.detach_edge(edge_id)?;
        for endpoint in [edge.start, edge.end] {
            if Some(endpoint.node) == skip {
                continue;
            }
            let is_input = self
                .node(endpoint.node)
                .and_then(|n| n.socket(endpoint.socket))
                .is_some_and(Socket::is_input);
            if is_input {
                if let Err(err) = self.on_input_changed(endpoint.node) {
                    tracing::error!("re-evaluation after edge removal failed: {err}");
                }
            }
        }
        Some(edge)
    }

    /// Remove an edge from the list and from both sockets, without notifications
    pub(crate) fn detach_edge(&mut self, edge_id: EdgeId) -> Option<Edge> {
        let position = self.edges.iter().position(|e| e.id == edge_id)?;
        let edge = self.edges.remove(position);
        for endpoint in [edge.start, edge.end] {
            if let Some(socket) = self.socket_mut(endpoint) {
                socket.detach(edge_id);
            }
        }
        Some(edge)
    }

    /// Get an edge by ID
    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == edge_id)
    }

    /// Get all edges
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Get edges involving a node
    pub fn edges_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.involves_node(node_id))
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Nodes connected to this node's outputs, in socket then edge order
    pub fn children(&self, node_id: NodeId) -> Vec<NodeId> {
        self.neighbors(node_id, |node| node.outputs())
    }

    /// Nodes connected to this node's inputs, in socket then edge order
    pub fn parents(&self, node_id: NodeId) -> Vec<NodeId> {
        self.neighbors(node_id, |node| node.inputs())
    }

    fn neighbors(&self, node_id: NodeId, side: impl Fn(&Node) -> &[Socket]) -> Vec<NodeId> {
        let mut found = Vec::new();
        let Some(node) = self.node(node_id) else {
            return found;
        };
        for socket in side(node) {
            for edge_id in socket.edges() {
                let other = self.edge(*edge_id).and_then(|e| e.other_end(socket.id));
                if let Some(other) = other {
                    if !found.contains(&other.node) {
                        found.push(other.node);
                    }
                }
            }
        }
        found
    }

    /// Selection of the given nodes plus every edge running between them
    pub fn selection_of(&self, nodes: impl IntoIterator<Item = NodeId>) -> Selection {
        let mut selection = Selection::of_nodes(nodes);
        selection.edges = self
            .edges
            .iter()
            .filter(|e| selection.contains_node(e.start.node) && selection.contains_node(e.end.node))
            .map(|e| e.id)
            .collect();
        selection
    }

    /// Remove every node, and with them every edge
    pub fn clear(&mut self) {
        while let Some(node) = self.nodes.first() {
            let instance = node.instance();
            self.remove_node_silent(instance);
        }
        self.edges.clear();
        self.modified = false;
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("scene_width", &self.scene_width)
            .field("scene_height", &self.scene_height)
            .field("nodes", &self.nodes)
            .field("edges", &self.edges)
            .field("modified", &self.modified)
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// Error when creating an edge
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Socket not found
    #[error("Socket not found: {0:?}")]
    SocketNotFound(SocketId),

    /// No socket at this index
    #[error("No socket at index {0}")]
    SocketIndexOutOfRange(usize),

    /// Incompatible socket types or directions
    #[error("Incompatible sockets")]
    IncompatibleSockets,

    /// Socket already holds its only edge
    #[error("Socket already connected: {0:?}")]
    SocketAlreadyConnected(SocketId),

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,
}
