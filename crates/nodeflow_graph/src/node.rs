// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::socket::{Socket, SocketDirection, SocketId, SocketSpec};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Node-specific persisted fields (the `content` object of a node record)
pub type Content = Map<String, serde_json::Value>;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(crate::id::mint())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer discriminator of a node type in persisted data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpCode(pub u32);

/// Identity of one in-memory node object.
///
/// Unlike [`NodeId`], which is persisted and can be restored onto another
/// object, an instance ID is never reused within the process. Reconciliation
/// keeps it when it updates a node in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Input nodes (constants, parameters)
    Input,
    /// Output nodes (result, preview)
    Output,
    /// Math operations
    Math,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Error raised by a node operation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NodeError {
    /// Division by zero
    #[error("Division by zero!")]
    DivisionByZero,

    /// Integer overflow
    #[error("Arithmetic overflow")]
    Overflow,

    /// Bad user input or malformed content
    #[error("{0}")]
    InvalidInput(String),

    /// The node cannot evaluate
    #[error("{0}")]
    Unsupported(String),
}

/// Result of a node operation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// One value, broadcast to every output
    Single(Value),
    /// One value per output, assigned positionally
    PerOutput(Vec<Value>),
}

impl Outcome {
    /// Spread this outcome over `output_count` outputs.
    ///
    /// A per-output list of the wrong length yields absent values everywhere.
    pub fn into_values(self, output_count: usize) -> Vec<Value> {
        match self {
            Self::Single(value) => vec![value; output_count],
            Self::PerOutput(values) if values.len() == output_count => values,
            Self::PerOutput(values) => {
                tracing::warn!(
                    produced = values.len(),
                    expected = output_count,
                    "operation result does not match output count"
                );
                vec![Value::Absent; output_count]
            }
        }
    }
}

/// Node-specific logic and content
pub trait NodeBehavior: fmt::Debug {
    /// Apply the operation to the resolved input values
    fn evaluate(&mut self, inputs: &[Value]) -> Result<Outcome, NodeError>;

    /// Persisted node-specific fields
    fn content(&self) -> Content {
        Content::new()
    }

    /// Overwrite node-specific fields from persisted data
    fn apply_content(&mut self, _content: &Content) -> Result<(), NodeError> {
        Ok(())
    }

    /// Hook run after the owning node was deserialized
    fn on_deserialized(&mut self, _content: &Content) {}

    /// Text a host can show inside the node body
    fn display(&self) -> Option<String> {
        None
    }
}

/// Creates the behavior of a fresh node
pub type BehaviorFactory = fn() -> Box<dyn NodeBehavior>;

/// Node type definition
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Operation code used in persisted data
    pub op_code: OpCode,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Default input sockets
    pub inputs: Vec<SocketSpec>,
    /// Default output sockets
    pub outputs: Vec<SocketSpec>,
    /// Behavior constructor
    pub behavior: BehaviorFactory,
}

/// Behavior of nodes whose type is unknown to the registry.
///
/// Keeps the persisted content untouched so it survives a save.
#[derive(Debug, Default)]
pub struct GenericBehavior {
    content: Content,
}

impl NodeBehavior for GenericBehavior {
    fn evaluate(&mut self, _inputs: &[Value]) -> Result<Outcome, NodeError> {
        Err(NodeError::Unsupported("Node has no operation".to_string()))
    }

    fn content(&self) -> Content {
        self.content.clone()
    }

    fn apply_content(&mut self, content: &Content) -> Result<(), NodeError> {
        self.content = content.clone();
        Ok(())
    }
}

fn generic_behavior() -> Box<dyn NodeBehavior> {
    Box::<GenericBehavior>::default()
}

/// Op code of the fallback node type
pub const GENERIC_OP_CODE: OpCode = OpCode(0);

/// The fallback node type used when a record names no known op code
pub fn generic_node_type() -> NodeType {
    NodeType {
        op_code: GENERIC_OP_CODE,
        name: "Node".to_string(),
        category: NodeCategory::Custom,
        description: "Generic node without an operation".to_string(),
        inputs: Vec::new(),
        outputs: Vec::new(),
        behavior: generic_behavior,
    }
}

/// A node instance in the graph
#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    instance: InstanceId,
    pub(crate) op_code: Option<OpCode>,
    /// Display name (can be customized)
    pub title: String,
    /// Position in the graph UI
    pub position: [f64; 2],
    pub(crate) inputs: Vec<Socket>,
    pub(crate) outputs: Vec<Socket>,
    pub(crate) dirty: bool,
    pub(crate) invalid: bool,
    pub(crate) values: Vec<Value>,
    pub(crate) message: Option<String>,
    pub(crate) behavior: Box<dyn NodeBehavior>,
}

impl Node {
    /// Create a new node from a type definition.
    ///
    /// Nodes start dirty so the first `eval` computes them.
    pub fn new(node_type: &NodeType) -> Self {
        let id = NodeId::new();
        let inputs = node_type
            .inputs
            .iter()
            .enumerate()
            .map(|(i, spec)| Socket::from_spec(id, i, SocketDirection::Input, spec))
            .collect();
        let outputs: Vec<Socket> = node_type
            .outputs
            .iter()
            .enumerate()
            .map(|(i, spec)| Socket::from_spec(id, i, SocketDirection::Output, spec))
            .collect();
        let op_code = (node_type.op_code != GENERIC_OP_CODE).then_some(node_type.op_code);

        Self {
            id,
            instance: InstanceId::next(),
            op_code,
            title: node_type.name.clone(),
            position: [0.0, 0.0],
            values: vec![Value::Absent; outputs.len()],
            inputs,
            outputs,
            dirty: true,
            invalid: false,
            message: None,
            behavior: (node_type.behavior)(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = [x, y];
        self
    }

    /// Replace node-specific content before the node is added to a graph
    pub fn with_content(mut self, content: &Content) -> Result<Self, NodeError> {
        self.behavior.apply_content(content)?;
        Ok(self)
    }

    /// Node ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// In-memory object identity
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Operation code, `None` for generic nodes
    pub fn op_code(&self) -> Option<OpCode> {
        self.op_code
    }

    /// Input sockets in declared order
    pub fn inputs(&self) -> &[Socket] {
        &self.inputs
    }

    /// Output sockets in declared order
    pub fn outputs(&self) -> &[Socket] {
        &self.outputs
    }

    /// Get an input socket by index
    pub fn input(&self, index: usize) -> Option<&Socket> {
        self.inputs.get(index)
    }

    /// Get an output socket by index
    pub fn output(&self, index: usize) -> Option<&Socket> {
        self.outputs.get(index)
    }

    /// Sockets of one direction
    pub fn sockets_in(&self, direction: SocketDirection) -> &[Socket] {
        match direction {
            SocketDirection::Input => &self.inputs,
            SocketDirection::Output => &self.outputs,
        }
    }

    /// Get a socket by ID
    pub fn socket(&self, socket_id: SocketId) -> Option<&Socket> {
        self.sockets().find(|s| s.id == socket_id)
    }

    pub(crate) fn socket_mut(&mut self, socket_id: SocketId) -> Option<&mut Socket> {
        self.inputs
            .iter_mut()
            .chain(self.outputs.iter_mut())
            .find(|s| s.id == socket_id)
    }

    /// Get all sockets
    pub fn sockets(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Output value must be recomputed before use
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Last evaluation failed or an input was unavailable
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Cached output values, one per output socket
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Status message explaining the current state (tooltip text)
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Node-specific behavior
    pub fn behavior(&self) -> &dyn NodeBehavior {
        self.behavior.as_ref()
    }

    /// Node-specific content as persisted
    pub fn content(&self) -> Content {
        self.behavior.content()
    }

    pub(crate) fn placeholders(&self) -> Vec<Value> {
        vec![Value::Absent; self.outputs.len()]
    }
}

/// Registry of available node types, keyed by op code
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    /// Registered node types by op code
    types: IndexMap<OpCode, NodeType>,
    /// Type used when a record's op code is missing or unknown
    fallback: NodeType,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
            fallback: generic_node_type(),
        }
    }

    /// Register a node type, replacing any type with the same op code
    pub fn register(&mut self, node_type: NodeType) {
        if let Some(previous) = self.types.insert(node_type.op_code, node_type) {
            tracing::warn!(op_code = previous.op_code.0, "replaced registered node type {}", previous.name);
        }
    }

    /// Get a node type by op code
    pub fn get(&self, op_code: OpCode) -> Option<&NodeType> {
        self.types.get(&op_code)
    }

    /// Resolve an optional op code to a node type, falling back to the generic type
    pub fn resolve(&self, op_code: Option<OpCode>) -> &NodeType {
        match op_code.and_then(|op| self.types.get(&op)) {
            Some(node_type) => node_type,
            None => {
                if let Some(op) = op_code {
                    tracing::warn!(op_code = op.0, "unknown op code, using generic node");
                }
                &self.fallback
            }
        }
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a node from an op code
    pub fn create_node(&self, op_code: OpCode) -> Option<Node> {
        self.get(op_code).map(Node::new)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Constant;

    impl NodeBehavior for Constant {
        fn evaluate(&mut self, _inputs: &[Value]) -> Result<Outcome, NodeError> {
            Ok(Outcome::Single(Value::Scalar(1)))
        }
    }

    fn constant() -> Box<dyn NodeBehavior> {
        Box::new(Constant)
    }

    fn constant_type() -> NodeType {
        NodeType {
            op_code: OpCode(9),
            name: "Constant".to_string(),
            category: NodeCategory::Input,
            description: "Always one".to_string(),
            inputs: vec![SocketSpec::new(1)],
            outputs: vec![SocketSpec::new(2), SocketSpec::new(2).with_label("copy")],
            behavior: constant,
        }
    }

    #[test]
    fn test_new_node_is_dirty_with_placeholders() {
        let node = Node::new(&constant_type());
        assert!(node.is_dirty());
        assert!(!node.is_invalid());
        assert_eq!(node.values(), &[Value::Absent, Value::Absent]);
        assert_eq!(node.op_code(), Some(OpCode(9)));
        assert_eq!(node.output(1).and_then(|s| s.label.as_deref()), Some("copy"));
    }

    #[test]
    fn test_sockets_belong_to_node() {
        let node = Node::new(&constant_type());
        for (i, socket) in node.outputs().iter().enumerate() {
            assert_eq!(socket.node, node.id());
            assert_eq!(socket.index, i);
        }
        let input_id = node.inputs()[0].id;
        assert!(node.socket(input_id).is_some_and(Socket::is_input));
    }

    #[test]
    fn test_instances_are_unique() {
        let a = Node::new(&constant_type());
        let b = Node::new(&constant_type());
        assert_ne!(a.instance(), b.instance());
    }

    #[test]
    fn test_outcome_spreading() {
        assert_eq!(
            Outcome::Single(Value::Scalar(4)).into_values(3),
            vec![Value::Scalar(4); 3]
        );
        assert_eq!(
            Outcome::PerOutput(vec![Value::Scalar(1), Value::Scalar(2)]).into_values(2),
            vec![Value::Scalar(1), Value::Scalar(2)]
        );
        assert_eq!(
            Outcome::PerOutput(vec![Value::Scalar(1)]).into_values(2),
            vec![Value::Absent, Value::Absent]
        );
    }

    #[test]
    fn test_registry_resolution() {
        let mut registry = NodeRegistry::new();
        registry.register(constant_type());

        assert_eq!(registry.resolve(Some(OpCode(9))).name, "Constant");
        assert_eq!(registry.resolve(Some(OpCode(99))).name, "Node");
        assert_eq!(registry.resolve(None).op_code, GENERIC_OP_CODE);
        assert_eq!(registry.types_in_category(NodeCategory::Input).count(), 1);
        assert!(registry.create_node(OpCode(9)).is_some());
        assert!(registry.create_node(OpCode(10)).is_none());
    }

    #[test]
    fn test_generic_behavior_keeps_content() {
        let mut generic = GenericBehavior::default();
        let mut content = Content::new();
        content.insert("note".to_string(), serde_json::json!("keep me"));
        generic.apply_content(&content).unwrap();
        assert_eq!(generic.content(), content);
        assert!(generic.evaluate(&[]).is_err());
    }
}
