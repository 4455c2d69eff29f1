// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions for node inputs/outputs.

use crate::edge::EdgeId;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// Unique identifier for a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(pub u64);

impl SocketId {
    /// Create a new random socket ID
    pub fn new() -> Self {
        Self(crate::id::mint())
    }
}

impl Default for SocketId {
    fn default() -> Self {
        Self::new()
    }
}

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketDirection {
    /// Input socket
    Input,
    /// Output socket
    Output,
}

/// Where a socket sits on its node.
///
/// Persisted as the integers `1..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SocketPosition {
    /// Left edge, top
    LeftTop = 1,
    /// Left edge, vertically centered
    LeftCenter = 2,
    /// Left edge, bottom
    LeftBottom = 3,
    /// Right edge, top
    RightTop = 4,
    /// Right edge, vertically centered
    RightCenter = 5,
    /// Right edge, bottom
    RightBottom = 6,
}

impl SocketPosition {
    /// Default position for sockets of a direction
    pub fn default_for(direction: SocketDirection) -> Self {
        match direction {
            SocketDirection::Input => Self::LeftCenter,
            SocketDirection::Output => Self::RightCenter,
        }
    }
}

impl From<SocketPosition> for u8 {
    fn from(position: SocketPosition) -> Self {
        position as u8
    }
}

impl TryFrom<u8> for SocketPosition {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::LeftTop),
            2 => Ok(Self::LeftCenter),
            3 => Ok(Self::LeftBottom),
            4 => Ok(Self::RightTop),
            5 => Ok(Self::RightCenter),
            6 => Ok(Self::RightBottom),
            other => Err(format!("invalid socket position: {other}")),
        }
    }
}

/// Type tag of a socket, an integer or a name.
///
/// Used for coloring and for compatibility checks when connecting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SocketType {
    /// Numeric tag
    Index(i64),
    /// Named tag
    Named(String),
}

impl Default for SocketType {
    fn default() -> Self {
        Self::Index(1)
    }
}

/// Palette used for numeric socket tags
const SOCKET_COLORS: [[u8; 3]; 6] = [
    [255, 119, 0],
    [82, 226, 32],
    [0, 86, 166],
    [168, 109, 177],
    [181, 71, 71],
    [219, 226, 32],
];

impl SocketType {
    /// Get the color for this socket type (for UI)
    pub fn color(&self) -> [u8; 3] {
        match self {
            Self::Index(index) => {
                let slot = usize::try_from(index.rem_euclid(SOCKET_COLORS.len() as i64)).unwrap_or(0);
                SOCKET_COLORS[slot]
            }
            Self::Named(_) => [136, 136, 136],
        }
    }

    /// Check if this type can connect to another type.
    ///
    /// Numeric tags are display hints and always connect; named tags must
    /// match unless one side is `"any"`.
    pub fn can_connect_to(&self, other: &SocketType) -> bool {
        match (self, other) {
            (Self::Named(a), Self::Named(b)) => a == b || a == "any" || b == "any",
            _ => true,
        }
    }
}

/// Declaration of a socket on a node type
#[derive(Debug, Clone, PartialEq)]
pub struct SocketSpec {
    /// Type tag
    pub socket_type: SocketType,
    /// Optional label drawn next to the socket
    pub label: Option<String>,
}

impl SocketSpec {
    /// Create a socket declaration with a numeric type tag
    pub fn new(tag: i64) -> Self {
        Self {
            socket_type: SocketType::Index(tag),
            label: None,
        }
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A socket on a node
#[derive(Debug, Clone, PartialEq)]
pub struct Socket {
    /// Unique socket ID
    pub id: SocketId,
    /// Owning node
    pub node: NodeId,
    /// Position within the owning node's list for this direction
    pub index: usize,
    /// Socket direction
    pub direction: SocketDirection,
    /// Placement on the node
    pub position: SocketPosition,
    /// Type tag
    pub socket_type: SocketType,
    /// Whether multiple edges may attach
    pub multi_edges: bool,
    /// Optional label
    pub label: Option<String>,
    /// Attached edges, in attachment order
    edges: Vec<EdgeId>,
}

impl Socket {
    /// Create a new socket
    pub fn new(
        node: NodeId,
        index: usize,
        direction: SocketDirection,
        socket_type: SocketType,
    ) -> Self {
        Self {
            id: SocketId::new(),
            node,
            index,
            direction,
            position: SocketPosition::default_for(direction),
            socket_type,
            multi_edges: direction == SocketDirection::Output,
            label: None,
            edges: Vec::new(),
        }
    }

    /// Create a socket from a node type declaration
    pub fn from_spec(node: NodeId, index: usize, direction: SocketDirection, spec: &SocketSpec) -> Self {
        let mut socket = Self::new(node, index, direction, spec.socket_type.clone());
        socket.label = spec.label.clone();
        socket
    }

    /// Is this an input socket
    pub fn is_input(&self) -> bool {
        self.direction == SocketDirection::Input
    }

    /// Is this an output socket
    pub fn is_output(&self) -> bool {
        self.direction == SocketDirection::Output
    }

    /// Attached edges, in attachment order
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Whether any edge is attached
    pub fn has_edges(&self) -> bool {
        !self.edges.is_empty()
    }

    pub(crate) fn attach(&mut self, edge: EdgeId) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub(crate) fn detach(&mut self, edge: EdgeId) {
        self.edges.retain(|e| *e != edge);
    }

    pub(crate) fn detach_all(&mut self) -> Vec<EdgeId> {
        std::mem::take(&mut self.edges)
    }

    /// Check if a connection to another socket is valid
    pub fn can_connect(&self, other: &Socket) -> bool {
        // Must be opposite directions
        if self.direction == other.direction {
            return false;
        }

        self.socket_type.can_connect_to(&other.socket_type)
    }
}
