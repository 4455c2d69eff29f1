// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge definitions for the graph.

use crate::node::NodeId;
use crate::socket::SocketId;
use serde::{Deserialize, Serialize};

/// Unique identifier for an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

impl EdgeId {
    /// Create a new random edge ID
    pub fn new() -> Self {
        Self(crate::id::mint())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

/// How the edge path is drawn, persisted as `1..=3`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EdgeType {
    /// Straight line
    Direct = 1,
    /// Cubic curve
    #[default]
    Bezier = 2,
    /// Axis-aligned segments
    Square = 3,
}

impl From<EdgeType> for u8 {
    fn from(edge_type: EdgeType) -> Self {
        edge_type as u8
    }
}

impl TryFrom<u8> for EdgeType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Direct),
            2 => Ok(Self::Bezier),
            3 => Ok(Self::Square),
            other => Err(format!("invalid edge type: {other}")),
        }
    }
}

/// One end of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Node owning the socket
    pub node: NodeId,
    /// The socket itself
    pub socket: SocketId,
}

impl Endpoint {
    /// Create an endpoint
    pub fn new(node: NodeId, socket: SocketId) -> Self {
        Self { node, socket }
    }
}

/// A connection between two sockets
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Unique edge ID
    pub id: EdgeId,
    /// Start endpoint (usually an output socket)
    pub start: Endpoint,
    /// End endpoint (usually an input socket)
    pub end: Endpoint,
    /// Path style
    pub edge_type: EdgeType,
}

impl Edge {
    /// Create a new edge
    pub fn new(start: Endpoint, end: Endpoint) -> Self {
        Self {
            id: EdgeId::new(),
            start,
            end,
            edge_type: EdgeType::default(),
        }
    }

    /// Set the path style
    pub fn with_type(mut self, edge_type: EdgeType) -> Self {
        self.edge_type = edge_type;
        self
    }

    /// Check if this edge involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.start.node == node_id || self.end.node == node_id
    }

    /// Check if this edge involves a specific socket
    pub fn involves_socket(&self, socket_id: SocketId) -> bool {
        self.start.socket == socket_id || self.end.socket == socket_id
    }

    /// The endpoint opposite to `socket_id`, if the edge touches it
    pub fn other_end(&self, socket_id: SocketId) -> Option<Endpoint> {
        if self.start.socket == socket_id {
            Some(self.end)
        } else if self.end.socket == socket_id {
            Some(self.start)
        } else {
            None
        }
    }
}
