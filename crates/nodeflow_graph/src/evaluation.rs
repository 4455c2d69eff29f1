// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation: memoized pull evaluation, dirty/invalid propagation.
//!
//! A node is recomputed only when it is dirty or invalid. Recomputing pulls
//! every upstream node (recursively), applies the node's operation and, on
//! success, pushes forward by evaluating its children. Failures never escape:
//! they turn into the node's `invalid` flag plus a message.

use crate::edge::Endpoint;
use crate::graph::Graph;
use crate::node::NodeId;
use crate::socket::{SocketDirection, SocketId};
use crate::value::{extract_output, Value};

/// Message for a node with an unconnected input
pub const MSG_CONNECT_INPUTS: &str = "Connect all inputs";
/// Message for a node whose upstream produced no value
pub const MSG_INVALID_INPUTS: &str = "Invalid input values";
/// Message for a node that took part in a cycle
pub const MSG_CYCLE: &str = "Cycle detected";

/// Error during evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// A node was reached again while it was still being evaluated
    #[error("Cycle detected at node {0}")]
    CycleDetected(NodeId),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Socket not found
    #[error("Socket not found: {0:?}")]
    SocketNotFound(SocketId),
}

/// Which flag a cascade sets
#[derive(Debug, Clone, Copy)]
enum Flag {
    Dirty,
    Invalid,
}

/// State of one top-level `eval` call
#[derive(Debug, Default)]
struct EvalSession {
    /// Nodes currently pulling their inputs, outermost first
    stack: Vec<NodeId>,
}

impl EvalSession {
    fn is_active(&self, node_id: NodeId) -> bool {
        self.stack.contains(&node_id)
    }
}

/// Why a node ended up invalid
#[derive(Debug)]
struct Failure {
    message: String,
}

impl Failure {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Graph {
    /// Current output values of a node, recomputing only if needed.
    ///
    /// Errors are reported only for a node that does not exist; evaluation
    /// failures are recorded on the node (`is_invalid` and `message`) and
    /// yield absent values.
    pub fn eval(&mut self, node_id: NodeId) -> Result<Vec<Value>, EvaluationError> {
        let mut session = EvalSession::default();
        match self.eval_node(node_id, &mut session) {
            Err(EvaluationError::CycleDetected(at)) => {
                // The root is never on a fresh session's stack
                tracing::error!(node = %at, "cycle escaped evaluation");
                let node = self.node_mut(node_id).ok_or(EvaluationError::NodeNotFound(node_id))?;
                node.invalid = true;
                node.message = Some(MSG_CYCLE.to_string());
                Ok(node.placeholders())
            }
            other => other,
        }
    }

    /// Evaluate every node in list order
    pub fn eval_all(&mut self) {
        for node_id in self.node_ids() {
            if let Err(err) = self.eval(node_id) {
                tracing::error!("evaluation of {node_id} failed: {err}");
            }
        }
    }

    /// Evaluate every sink node (a node without outputs)
    pub fn eval_outputs(&mut self) {
        let sinks: Vec<NodeId> = self
            .nodes()
            .filter(|n| n.outputs().is_empty())
            .map(|n| n.id())
            .collect();
        for node_id in sinks {
            if let Err(err) = self.eval(node_id) {
                tracing::error!("evaluation of {node_id} failed: {err}");
            }
        }
    }

    /// React to a changed input: mark the node dirty and evaluate it
    pub fn on_input_changed(&mut self, node_id: NodeId) -> Result<Vec<Value>, EvaluationError> {
        tracing::debug!(node = %node_id, "input changed");
        self.set_dirty(node_id, true);
        self.eval(node_id)
    }

    fn eval_node(&mut self, node_id: NodeId, session: &mut EvalSession) -> Result<Vec<Value>, EvaluationError> {
        let node = self.node(node_id).ok_or(EvaluationError::NodeNotFound(node_id))?;
        if !node.is_dirty() && !node.is_invalid() {
            tracing::trace!(node = %node_id, "returning cached values");
            return Ok(node.values.clone());
        }
        if session.is_active(node_id) {
            return Err(EvaluationError::CycleDetected(node_id));
        }

        tracing::debug!(node = %node_id, title = %node.title, "evaluating");
        session.stack.push(node_id);
        let result = self.evaluate_body(node_id, session);
        session.stack.pop();

        let node = self.node_mut(node_id).ok_or(EvaluationError::NodeNotFound(node_id))?;
        match result {
            Ok(values) => {
                node.values = values.clone();
                node.dirty = false;
                node.invalid = false;
                node.message = None;

                self.mark_descendants_dirty(node_id, true);
                for child in self.children(node_id) {
                    if session.is_active(child) {
                        continue;
                    }
                    if let Err(err) = self.eval_node(child, session) {
                        tracing::warn!(node = %child, "child evaluation failed: {err}");
                    }
                }
                Ok(values)
            }
            Err(failure) => {
                tracing::debug!(node = %node_id, "invalid: {}", failure.message);
                node.invalid = true;
                node.message = Some(failure.message);
                node.values = node.placeholders();
                let placeholders = node.values.clone();
                self.mark_descendants_dirty(node_id, true);
                Ok(placeholders)
            }
        }
    }

    /// Resolve inputs, pull upstream values and apply the operation
    fn evaluate_body(&mut self, node_id: NodeId, session: &mut EvalSession) -> Result<Vec<Value>, Failure> {
        let upstream = self.upstream_endpoints(node_id)?;

        let mut inputs = Vec::with_capacity(upstream.len());
        for endpoint in upstream {
            let Some(endpoint) = endpoint else {
                return Err(Failure::new(MSG_CONNECT_INPUTS));
            };
            let values = match self.eval_node(endpoint.node, session) {
                Ok(values) => values,
                Err(EvaluationError::CycleDetected(at)) => {
                    tracing::warn!(node = %node_id, "cycle through {at}");
                    return Err(Failure::new(MSG_CYCLE));
                }
                Err(err) => {
                    tracing::error!(node = %node_id, "unexpected evaluation fault: {err}");
                    return Err(Failure::new(err.to_string()));
                }
            };
            let index = self.output_index(endpoint);
            let value = values.get(index).cloned().unwrap_or_default();
            if value.is_absent() {
                return Err(Failure::new(MSG_INVALID_INPUTS));
            }
            inputs.push(value);
        }

        let node = self
            .node_mut(node_id)
            .ok_or_else(|| Failure::new(EvaluationError::NodeNotFound(node_id).to_string()))?;
        let output_count = node.outputs.len();
        match node.behavior.evaluate(&inputs) {
            Ok(outcome) => Ok(outcome.into_values(output_count)),
            Err(err) => Err(Failure::new(err.to_string())),
        }
    }

    /// Upstream endpoint of every input socket: the other end of the first
    /// attached edge, or `None` when the input is unconnected.
    fn upstream_endpoints(&self, node_id: NodeId) -> Result<Vec<Option<Endpoint>>, Failure> {
        let node = self
            .node(node_id)
            .ok_or_else(|| Failure::new(EvaluationError::NodeNotFound(node_id).to_string()))?;
        let mut upstream = Vec::with_capacity(node.inputs.len());
        for socket in &node.inputs {
            let endpoint = match socket.edges().first() {
                None => None,
                Some(edge_id) => {
                    let other = self.edge(*edge_id).and_then(|e| e.other_end(socket.id));
                    if other.is_none() {
                        tracing::error!(node = %node_id, edge = edge_id.0, "socket references a missing edge");
                    }
                    other
                }
            };
            upstream.push(endpoint);
        }
        Ok(upstream)
    }

    /// Index of the output socket an upstream endpoint names
    fn output_index(&self, endpoint: Endpoint) -> usize {
        self.node(endpoint.node)
            .and_then(|n| n.socket(endpoint.socket))
            .filter(|s| s.is_output())
            .map_or(0, |s| s.index)
    }

    /// Value a node feeds into an edge: its output at the edge's socket,
    /// with tagging removed.
    pub fn value_at(&self, endpoint: Endpoint) -> Value {
        let index = self.output_index(endpoint);
        self.node(endpoint.node)
            .map(|n| extract_output(n.values(), index))
            .unwrap_or_default()
    }

    /// Index of the first socket of `direction` on `node_id` that has an
    /// edge leading to `neighbor`.
    ///
    /// Falls back to `0` when no socket matches.
    pub fn resolve_socket_index(&self, node_id: NodeId, direction: SocketDirection, neighbor: NodeId) -> usize {
        let Some(node) = self.node(node_id) else {
            return 0;
        };
        for socket in node.sockets_in(direction) {
            for edge_id in socket.edges() {
                let other = self.edge(*edge_id).and_then(|e| e.other_end(socket.id));
                if other.is_some_and(|o| o.node == neighbor) {
                    return socket.index;
                }
            }
        }
        tracing::debug!(node = %node_id, neighbor = %neighbor, "no socket leads to neighbor, using index 0");
        0
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    /// Set the dirty flag of one node without cascading
    pub fn set_dirty(&mut self, node_id: NodeId, value: bool) {
        if let Some(node) = self.node_mut(node_id) {
            node.dirty = value;
        }
    }

    /// Set the invalid flag of one node without cascading
    pub fn set_invalid(&mut self, node_id: NodeId, value: bool) {
        if let Some(node) = self.node_mut(node_id) {
            node.invalid = value;
        }
    }

    /// Mark a node dirty together with everything downstream of it
    pub fn mark_dirty(&mut self, node_id: NodeId) {
        self.set_dirty(node_id, true);
        self.mark_descendants_dirty(node_id, true);
    }

    /// Set the dirty flag on the direct children only
    pub fn mark_children_dirty(&mut self, node_id: NodeId, value: bool) {
        for child in self.children(node_id) {
            self.set_dirty(child, value);
        }
    }

    /// Set the dirty flag on every node reachable through outputs
    pub fn mark_descendants_dirty(&mut self, node_id: NodeId, value: bool) {
        let mut path = vec![node_id];
        self.cascade(node_id, Flag::Dirty, value, &mut path);
    }

    /// Set the invalid flag on every node reachable through outputs
    pub fn mark_descendants_invalid(&mut self, node_id: NodeId, value: bool) {
        let mut path = vec![node_id];
        self.cascade(node_id, Flag::Invalid, value, &mut path);
    }

    /// Depth-first walk that revisits shared descendants but never re-enters
    /// the current path.
    fn cascade(&mut self, node_id: NodeId, flag: Flag, value: bool, path: &mut Vec<NodeId>) {
        for child in self.children(node_id) {
            if path.contains(&child) {
                tracing::warn!(node = %child, "cycle while marking descendants");
                continue;
            }
            match flag {
                Flag::Dirty => self.set_dirty(child, value),
                Flag::Invalid => self.set_invalid(child, value),
            }
            path.push(child);
            self.cascade(child, flag, value, path);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::graphs::calculator::{
        self, OP_NODE_ADD, OP_NODE_DIV, OP_NODE_INPUT, OP_NODE_MUL, OP_NODE_OUTPUT, OP_NODE_SUB,
    };
    use crate::node::{NodeBehavior, NodeCategory, NodeError, NodeRegistry, NodeType, OpCode, Outcome};
    use crate::socket::SocketSpec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn calc_graph() -> Graph {
        Graph::with_registry(Arc::new(calculator::create_calculator_registry()))
    }

    fn input(graph: &mut Graph, value: i64) -> NodeId {
        let id = graph.create_node(OP_NODE_INPUT).unwrap();
        graph.set_content_value(id, "value", serde_json::json!(value.to_string()));
        id
    }

    fn binary(graph: &mut Graph, op: OpCode, a: NodeId, b: NodeId) -> NodeId {
        let id = graph.create_node(op).unwrap();
        graph.connect_by_index(a, 0, id, 0).unwrap();
        graph.connect_by_index(b, 0, id, 1).unwrap();
        id
    }

    static COUNTED_CALLS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct Counted;

    impl NodeBehavior for Counted {
        fn evaluate(&mut self, inputs: &[Value]) -> Result<Outcome, NodeError> {
            COUNTED_CALLS.fetch_add(1, Ordering::SeqCst);
            let v = inputs.first().and_then(Value::as_scalar).unwrap_or(0);
            Ok(Outcome::Single(Value::Scalar(v + 1)))
        }
    }

    fn counted() -> Box<dyn NodeBehavior> {
        Box::new(Counted)
    }

    #[test]
    fn test_memoization_skips_operation() {
        let mut registry = calculator::create_calculator_registry();
        registry.register(NodeType {
            op_code: OpCode(100),
            name: "Counted".to_string(),
            category: NodeCategory::Custom,
            description: String::new(),
            inputs: vec![SocketSpec::new(1)],
            outputs: vec![SocketSpec::new(1)],
            behavior: counted,
        });
        let mut graph = Graph::with_registry(Arc::new(registry));
        let a = input(&mut graph, 5);
        let c = graph.create_node(OpCode(100)).unwrap();
        graph.connect_by_index(a, 0, c, 0).unwrap();

        let before = COUNTED_CALLS.load(Ordering::SeqCst);
        let first = graph.eval(c).unwrap();
        let after_first = COUNTED_CALLS.load(Ordering::SeqCst);
        let second = graph.eval(c).unwrap();
        let after_second = COUNTED_CALLS.load(Ordering::SeqCst);

        assert_eq!(first, vec![Value::Scalar(6)]);
        assert_eq!(first, second);
        assert!(after_first >= before);
        assert_eq!(after_first, after_second);
        assert!(!graph.node(c).unwrap().is_dirty());
    }

    #[test]
    fn test_add_evaluates() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 3);
        let b = input(&mut graph, 4);
        let add = binary(&mut graph, OP_NODE_ADD, a, b);

        assert_eq!(graph.eval(add).unwrap(), vec![Value::Scalar(7)]);
        let node = graph.node(add).unwrap();
        assert!(!node.is_dirty());
        assert!(!node.is_invalid());
        assert_eq!(node.message(), None);
    }

    #[test]
    fn test_sub_and_mul() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 9);
        let b = input(&mut graph, 4);
        let sub = binary(&mut graph, OP_NODE_SUB, a, b);
        let mul = binary(&mut graph, OP_NODE_MUL, a, b);
        assert_eq!(graph.eval(sub).unwrap(), vec![Value::Scalar(5)]);
        assert_eq!(graph.eval(mul).unwrap(), vec![Value::Scalar(36)]);
    }

    #[test]
    fn test_divide_yields_quotient_and_remainder() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 7);
        let b = input(&mut graph, 2);
        let div = binary(&mut graph, OP_NODE_DIV, a, b);

        let values = graph.eval(div).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].as_scalar(), Some(3));
        assert_eq!(values[1].as_scalar(), Some(1));
        assert_eq!(values[0].tag(), Some("quotient"));
        assert_eq!(values[1].tag(), Some("remainder"));
    }

    #[test]
    fn test_division_by_zero_marks_invalid() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 10);
        let b = input(&mut graph, 0);
        let div = binary(&mut graph, OP_NODE_DIV, a, b);

        let values = graph.eval(div).unwrap();
        assert_eq!(values, vec![Value::Absent, Value::Absent]);
        let node = graph.node(div).unwrap();
        assert!(node.is_invalid());
        assert!(node.message().unwrap().contains("Division by zero"));
    }

    #[test]
    fn test_disconnected_input_marks_invalid() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 1);
        let div = graph.create_node(OP_NODE_DIV).unwrap();
        graph.connect_by_index(a, 0, div, 0).unwrap();

        let values = graph.eval(div).unwrap();
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(Value::is_absent));
        let node = graph.node(div).unwrap();
        assert!(node.is_invalid());
        assert_eq!(node.message(), Some(MSG_CONNECT_INPUTS));
    }

    #[test]
    fn test_invalid_upstream_propagates() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 10);
        let b = input(&mut graph, 0);
        let div = binary(&mut graph, OP_NODE_DIV, a, b);
        let out = graph.create_node(OP_NODE_OUTPUT).unwrap();
        graph.connect_by_index(div, 0, out, 0).unwrap();

        graph.eval(out).unwrap();
        let out_node = graph.node(out).unwrap();
        assert!(out_node.is_invalid());
        assert_eq!(out_node.message(), Some(MSG_INVALID_INPUTS));
    }

    #[test]
    fn test_output_reads_the_connected_socket() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 7);
        let b = input(&mut graph, 2);
        let div = binary(&mut graph, OP_NODE_DIV, a, b);
        let q = graph.create_node(OP_NODE_OUTPUT).unwrap();
        let r = graph.create_node(OP_NODE_OUTPUT).unwrap();
        graph.connect_by_index(div, 0, q, 0).unwrap();
        graph.connect_by_index(div, 1, r, 0).unwrap();

        graph.eval(q).unwrap();
        graph.eval(r).unwrap();
        assert_eq!(graph.node(q).unwrap().behavior().display().as_deref(), Some("3 (quotient)"));
        assert_eq!(graph.node(r).unwrap().behavior().display().as_deref(), Some("1 (remainder)"));
    }

    #[test]
    fn test_input_change_reevaluates_downstream_eagerly() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 3);
        let b = input(&mut graph, 4);
        let add = binary(&mut graph, OP_NODE_ADD, a, b);
        graph.eval(add).unwrap();

        graph.set_content_value(a, "value", serde_json::json!("10"));
        let node = graph.node(add).unwrap();
        assert!(!node.is_dirty());
        assert_eq!(node.values(), &[Value::Scalar(14)]);
    }

    #[test]
    fn test_bad_input_text_invalidates() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 3);
        graph.set_content_value(a, "value", serde_json::json!("three"));
        let node = graph.node(a).unwrap();
        assert!(node.is_invalid());
        assert_eq!(node.message(), Some("Invalid input value"));
    }

    fn chain(graph: &mut Graph) -> (NodeId, NodeId, NodeId) {
        let a = input(graph, 1);
        let b = input(graph, 1);
        let add = binary(graph, OP_NODE_ADD, a, b);
        let out = graph.create_node(OP_NODE_OUTPUT).unwrap();
        graph.connect_by_index(add, 0, out, 0).unwrap();
        graph.eval(out).unwrap();
        (a, add, out)
    }

    #[test]
    fn test_dirty_propagates_along_chain() {
        let mut graph = calc_graph();
        let (a, add, out) = chain(&mut graph);
        assert!(!graph.node(out).unwrap().is_dirty());

        graph.mark_dirty(a);
        assert!(graph.node(a).unwrap().is_dirty());
        assert!(graph.node(add).unwrap().is_dirty());
        assert!(graph.node(out).unwrap().is_dirty());
    }

    #[test]
    fn test_dirty_propagates_fan_out_and_diamond() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 2);
        let left = binary(&mut graph, OP_NODE_ADD, a, a);
        let right = binary(&mut graph, OP_NODE_MUL, a, a);
        let join = binary(&mut graph, OP_NODE_SUB, left, right);
        let out = graph.create_node(OP_NODE_OUTPUT).unwrap();
        graph.connect_by_index(join, 0, out, 0).unwrap();

        assert_eq!(graph.eval(join).unwrap(), vec![Value::Scalar(0)]);
        for id in [left, right, join, out] {
            assert!(!graph.node(id).unwrap().is_dirty());
        }

        graph.mark_dirty(a);
        for id in [left, right, join, out] {
            assert!(graph.node(id).unwrap().is_dirty());
        }
    }

    #[test]
    fn test_set_dirty_does_not_cascade() {
        let mut graph = calc_graph();
        let (a, add, _) = chain(&mut graph);
        graph.set_dirty(a, true);
        assert!(!graph.node(add).unwrap().is_dirty());

        graph.mark_children_dirty(a, true);
        assert!(graph.node(add).unwrap().is_dirty());
    }

    #[test]
    fn test_mark_descendants_invalid() {
        let mut graph = calc_graph();
        let (a, add, out) = chain(&mut graph);
        graph.mark_descendants_invalid(a, true);
        assert!(graph.node(add).unwrap().is_invalid());
        assert!(graph.node(out).unwrap().is_invalid());
        assert!(!graph.node(a).unwrap().is_invalid());
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut graph = calc_graph();
        let seed = input(&mut graph, 1);
        let x = graph.create_node(OP_NODE_ADD).unwrap();
        let y = graph.create_node(OP_NODE_ADD).unwrap();
        graph.connect_by_index(seed, 0, x, 0).unwrap();
        graph.connect_by_index(seed, 0, y, 0).unwrap();
        graph.connect_by_index(x, 0, y, 1).unwrap();
        graph.connect_by_index(y, 0, x, 1).unwrap();

        graph.mark_dirty(seed);
        let values = graph.eval(x).unwrap();
        assert_eq!(values, vec![Value::Absent]);
        assert!(graph.node(x).unwrap().is_invalid());
        assert!(graph.node(y).unwrap().is_invalid());
        let messages = [graph.node(x).unwrap().message(), graph.node(y).unwrap().message()];
        assert!(messages.contains(&Some(MSG_CYCLE)));
    }

    #[test]
    fn test_resolve_socket_index() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 7);
        let b = input(&mut graph, 2);
        let div = binary(&mut graph, OP_NODE_DIV, a, b);
        let out = graph.create_node(OP_NODE_OUTPUT).unwrap();
        graph.connect_by_index(div, 1, out, 0).unwrap();

        assert_eq!(graph.resolve_socket_index(div, SocketDirection::Output, out), 1);
        assert_eq!(graph.resolve_socket_index(div, SocketDirection::Input, b), 1);
        // no edge leads there
        assert_eq!(graph.resolve_socket_index(div, SocketDirection::Output, a), 0);
    }

    #[test]
    fn test_value_at_unwraps_tag() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 7);
        let b = input(&mut graph, 2);
        let div = binary(&mut graph, OP_NODE_DIV, a, b);
        graph.eval(div).unwrap();

        let remainder = graph.node(div).unwrap().outputs()[1].id;
        assert_eq!(graph.value_at(Endpoint::new(div, remainder)), Value::Scalar(1));
    }

    #[test]
    fn test_eval_missing_node_is_error() {
        let mut graph = calc_graph();
        assert_eq!(
            graph.eval(NodeId(42)),
            Err(EvaluationError::NodeNotFound(NodeId(42)))
        );
    }

    #[test]
    fn test_dangling_edge_is_contained() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 1);
        let out = graph.create_node(OP_NODE_OUTPUT).unwrap();
        let a_socket = graph.node(a).unwrap().outputs()[0].id;
        let out_socket = graph.node(out).unwrap().inputs()[0].id;
        graph
            .add_edge(Edge::new(Endpoint::new(a, a_socket), Endpoint::new(out, out_socket)))
            .unwrap();
        // drop the upstream node behind the graph's back
        let position = graph.node_position(a).unwrap();
        graph.nodes.remove(position);

        let values = graph.eval(out).unwrap();
        assert!(values.is_empty());
        assert!(graph.node(out).unwrap().is_invalid());
    }

    #[test]
    fn test_first_edge_into_an_input_wins() {
        let mut graph = calc_graph();
        let a = input(&mut graph, 1);
        let b = input(&mut graph, 2);
        let out = graph.create_node(OP_NODE_OUTPUT).unwrap();
        let out_socket = graph.node(out).unwrap().inputs()[0].id;
        let edge_from = |graph: &mut Graph, from: NodeId| {
            let socket = graph.node(from).unwrap().outputs()[0].id;
            graph
                .add_edge(Edge::new(Endpoint::new(from, socket), Endpoint::new(out, out_socket)))
                .unwrap()
        };
        let first = edge_from(&mut graph, a);
        edge_from(&mut graph, b);
        assert_eq!(graph.node(out).unwrap().inputs()[0].edges().len(), 2);

        graph.eval(out).unwrap();
        let node = graph.node(out).unwrap();
        assert!(!node.is_invalid());
        assert_eq!(node.behavior().display().as_deref(), Some("1"));

        graph.remove_edge(first).unwrap();
        let node = graph.node(out).unwrap();
        assert!(!node.is_invalid());
        assert_eq!(node.behavior().display().as_deref(), Some("2"));
    }

    #[test]
    fn test_generic_node_is_invalid() {
        let mut graph = Graph::with_registry(Arc::new(NodeRegistry::new()));
        let node = crate::node::Node::new(&crate::node::generic_node_type());
        let id = graph.add_node(node);
        graph.eval(id).unwrap();
        assert!(graph.node(id).unwrap().is_invalid());
    }

    #[test]
    fn test_eval_outputs_evaluates_sinks() {
        let mut graph = calc_graph();
        let (_, add, out) = chain(&mut graph);
        graph.mark_dirty(add);
        graph.eval_outputs();
        assert!(!graph.node(out).unwrap().is_dirty());
        assert!(!graph.node(add).unwrap().is_dirty());
    }
}
