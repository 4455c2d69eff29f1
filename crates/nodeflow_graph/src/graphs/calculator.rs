// SPDX-License-Identifier: MIT OR Apache-2.0
//! Calculator graph.
//!
//! Integer arithmetic over text inputs: Input, Output, Add, Subtract,
//! Multiply, Divide (quotient and remainder) and the constant Check source.

use crate::graph::{ConnectionError, Graph};
use crate::node::{BehaviorFactory, Content, Node, NodeBehavior, NodeCategory, NodeError, NodeId, NodeRegistry, NodeType, OpCode, Outcome};
use crate::socket::SocketSpec;
use crate::value::Value;
use std::sync::Arc;

/// Text input
pub const OP_NODE_INPUT: OpCode = OpCode(1);
/// Result display
pub const OP_NODE_OUTPUT: OpCode = OpCode(2);
/// Addition
pub const OP_NODE_ADD: OpCode = OpCode(3);
/// Subtraction
pub const OP_NODE_SUB: OpCode = OpCode(4);
/// Multiplication
pub const OP_NODE_MUL: OpCode = OpCode(5);
/// Floor division with remainder
pub const OP_NODE_DIV: OpCode = OpCode(6);
/// Constant zero on four outputs
pub const OP_NODE_CHECK: OpCode = OpCode(7);

/// Content key holding the input text
pub const VALUE_KEY: &str = "value";

/// Holds the user-entered text of an Input node
#[derive(Debug)]
pub struct InputBehavior {
    text: String,
}

impl Default for InputBehavior {
    fn default() -> Self {
        Self { text: "1".to_string() }
    }
}

impl InputBehavior {
    /// Current text
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl NodeBehavior for InputBehavior {
    fn evaluate(&mut self, _inputs: &[Value]) -> Result<Outcome, NodeError> {
        let value = self
            .text
            .trim()
            .parse::<i64>()
            .map_err(|_| NodeError::InvalidInput("Invalid input value".to_string()))?;
        Ok(Outcome::Single(Value::Scalar(value)))
    }

    fn content(&self) -> Content {
        let mut content = Content::new();
        content.insert(VALUE_KEY.to_string(), serde_json::Value::String(self.text.clone()));
        content
    }

    fn apply_content(&mut self, content: &Content) -> Result<(), NodeError> {
        match content.get(VALUE_KEY) {
            None => Ok(()),
            Some(serde_json::Value::String(text)) => {
                self.text.clone_from(text);
                Ok(())
            }
            Some(serde_json::Value::Number(number)) => {
                self.text = number.to_string();
                Ok(())
            }
            Some(other) => Err(NodeError::InvalidInput(format!("Unexpected input content: {other}"))),
        }
    }

    fn display(&self) -> Option<String> {
        Some(self.text.clone())
    }
}

/// Shows the value arriving at its single input
#[derive(Debug, Default)]
pub struct OutputBehavior {
    shown: Value,
}

impl NodeBehavior for OutputBehavior {
    fn evaluate(&mut self, inputs: &[Value]) -> Result<Outcome, NodeError> {
        self.shown = inputs.first().cloned().unwrap_or_default();
        Ok(Outcome::PerOutput(Vec::new()))
    }

    fn display(&self) -> Option<String> {
        (!self.shown.is_absent()).then(|| self.shown.to_string())
    }
}

/// Source emitting zero on every output
#[derive(Debug, Default)]
pub struct CheckBehavior;

impl NodeBehavior for CheckBehavior {
    fn evaluate(&mut self, _inputs: &[Value]) -> Result<Outcome, NodeError> {
        Ok(Outcome::Single(Value::Scalar(0)))
    }
}

/// Binary integer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    /// a + b
    Add,
    /// a - b
    Sub,
    /// a * b
    Mul,
    /// floor(a / b) and the matching remainder
    Div,
}

impl Arithmetic {
    /// Apply the operation with overflow checks
    pub fn apply(self, a: i64, b: i64) -> Result<Outcome, NodeError> {
        let scalar = |v: Option<i64>| v.map(|v| Outcome::Single(Value::Scalar(v))).ok_or(NodeError::Overflow);
        match self {
            Self::Add => scalar(a.checked_add(b)),
            Self::Sub => scalar(a.checked_sub(b)),
            Self::Mul => scalar(a.checked_mul(b)),
            Self::Div => {
                let (quotient, remainder) = floor_div_mod(a, b)?;
                Ok(Outcome::PerOutput(vec![
                    Value::tagged(Value::Scalar(quotient), "quotient"),
                    Value::tagged(Value::Scalar(remainder), "remainder"),
                ]))
            }
        }
    }
}

/// Division rounding toward negative infinity; the remainder takes the
/// sign of the divisor.
pub fn floor_div_mod(a: i64, b: i64) -> Result<(i64, i64), NodeError> {
    if b == 0 {
        return Err(NodeError::DivisionByZero);
    }
    let mut quotient = a.checked_div(b).ok_or(NodeError::Overflow)?;
    let mut remainder = a.checked_rem(b).ok_or(NodeError::Overflow)?;
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        quotient -= 1;
        remainder += b;
    }
    Ok((quotient, remainder))
}

/// Behavior shared by the two-input math nodes
#[derive(Debug)]
pub struct ArithmeticBehavior {
    op: Arithmetic,
}

impl ArithmeticBehavior {
    /// Behavior applying `op`
    pub fn new(op: Arithmetic) -> Self {
        Self { op }
    }
}

impl NodeBehavior for ArithmeticBehavior {
    fn evaluate(&mut self, inputs: &[Value]) -> Result<Outcome, NodeError> {
        let [a, b] = inputs else {
            return Err(NodeError::InvalidInput("Connect all inputs".to_string()));
        };
        match (a.as_scalar(), b.as_scalar()) {
            (Some(a), Some(b)) => self.op.apply(a, b),
            _ => Err(NodeError::InvalidInput("Invalid input values".to_string())),
        }
    }
}

fn input_behavior() -> Box<dyn NodeBehavior> {
    Box::<InputBehavior>::default()
}

fn output_behavior() -> Box<dyn NodeBehavior> {
    Box::<OutputBehavior>::default()
}

fn check_behavior() -> Box<dyn NodeBehavior> {
    Box::new(CheckBehavior)
}

fn add_behavior() -> Box<dyn NodeBehavior> {
    Box::new(ArithmeticBehavior::new(Arithmetic::Add))
}

fn sub_behavior() -> Box<dyn NodeBehavior> {
    Box::new(ArithmeticBehavior::new(Arithmetic::Sub))
}

fn mul_behavior() -> Box<dyn NodeBehavior> {
    Box::new(ArithmeticBehavior::new(Arithmetic::Mul))
}

fn div_behavior() -> Box<dyn NodeBehavior> {
    Box::new(ArithmeticBehavior::new(Arithmetic::Div))
}

fn binary_type(op_code: OpCode, name: &str, description: &str, behavior: BehaviorFactory) -> NodeType {
    NodeType {
        op_code,
        name: name.to_string(),
        category: NodeCategory::Math,
        description: description.to_string(),
        inputs: vec![SocketSpec::new(2), SocketSpec::new(2)],
        outputs: vec![SocketSpec::new(1)],
        behavior,
    }
}

/// Create the calculator node registry
pub fn create_calculator_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(NodeType {
        op_code: OP_NODE_INPUT,
        name: "Input".to_string(),
        category: NodeCategory::Input,
        description: "Integer typed by the user".to_string(),
        inputs: vec![],
        outputs: vec![SocketSpec::new(3).with_label("o")],
        behavior: input_behavior,
    });

    registry.register(NodeType {
        op_code: OP_NODE_OUTPUT,
        name: "Output".to_string(),
        category: NodeCategory::Output,
        description: "Shows the incoming value".to_string(),
        inputs: vec![SocketSpec::new(1)],
        outputs: vec![],
        behavior: output_behavior,
    });

    registry.register(binary_type(OP_NODE_ADD, "Add", "Sum of two integers", add_behavior));
    registry.register(binary_type(OP_NODE_SUB, "Subtract", "Difference of two integers", sub_behavior));
    registry.register(binary_type(OP_NODE_MUL, "Multiply", "Product of two integers", mul_behavior));

    let mut divide = binary_type(OP_NODE_DIV, "Divide and Mod", "Floor quotient and remainder", div_behavior);
    divide.inputs = vec![SocketSpec::new(2).with_label("a"), SocketSpec::new(2).with_label("b")];
    divide.outputs = vec![SocketSpec::new(1).with_label("q"), SocketSpec::new(1).with_label("r")];
    registry.register(divide);

    registry.register(NodeType {
        op_code: OP_NODE_CHECK,
        name: "Check".to_string(),
        category: NodeCategory::Input,
        description: "Constant zero on four outputs".to_string(),
        inputs: vec![],
        outputs: vec![SocketSpec::new(1); 4],
        behavior: check_behavior,
    });

    registry
}

/// Graph backed by a fresh calculator registry
pub fn calculator_graph() -> Graph {
    Graph::with_registry(Arc::new(create_calculator_registry()))
}

/// Small sample scene: `(7 / 2)` into two outputs plus `7 + 2` into a third.
///
/// Returns the graph and the ids of its output nodes.
pub fn demo_graph() -> Result<(Graph, Vec<NodeId>), ConnectionError> {
    let mut graph = calculator_graph();
    let registry = Arc::clone(graph.registry());
    let mut place = |op: OpCode, x: f64, y: f64| {
        let node = Node::new(registry.resolve(Some(op))).with_position(x, y);
        graph.add_node(node)
    };

    let a = place(OP_NODE_INPUT, -300.0, -100.0);
    let b = place(OP_NODE_INPUT, -300.0, 100.0);
    let div = place(OP_NODE_DIV, 0.0, -100.0);
    let add = place(OP_NODE_ADD, 0.0, 150.0);
    let quotient = place(OP_NODE_OUTPUT, 300.0, -150.0);
    let remainder = place(OP_NODE_OUTPUT, 300.0, -50.0);
    let sum = place(OP_NODE_OUTPUT, 300.0, 150.0);

    graph.set_content_value(a, VALUE_KEY, serde_json::json!("7"));
    graph.set_content_value(b, VALUE_KEY, serde_json::json!("2"));

    graph.connect_by_index(a, 0, div, 0)?;
    graph.connect_by_index(b, 0, div, 1)?;
    graph.connect_by_index(a, 0, add, 0)?;
    graph.connect_by_index(b, 0, add, 1)?;
    graph.connect_by_index(div, 0, quotient, 0)?;
    graph.connect_by_index(div, 1, remainder, 0)?;
    graph.connect_by_index(add, 0, sum, 0)?;

    Ok((graph, vec![quotient, remainder, sum]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_division_matches_rounding_down() {
        assert_eq!(floor_div_mod(7, 2).unwrap(), (3, 1));
        assert_eq!(floor_div_mod(-7, 2).unwrap(), (-4, 1));
        assert_eq!(floor_div_mod(7, -2).unwrap(), (-4, -1));
        assert_eq!(floor_div_mod(-7, -2).unwrap(), (3, -1));
        assert_eq!(floor_div_mod(6, 3).unwrap(), (2, 0));
        assert_eq!(floor_div_mod(1, 0), Err(NodeError::DivisionByZero));
        assert_eq!(floor_div_mod(i64::MIN, -1), Err(NodeError::Overflow));
    }

    #[test]
    fn test_arithmetic_overflow_is_an_error() {
        assert_eq!(Arithmetic::Add.apply(i64::MAX, 1), Err(NodeError::Overflow));
        assert_eq!(Arithmetic::Mul.apply(3, 4), Ok(Outcome::Single(Value::Scalar(12))));
    }

    #[test]
    fn test_input_content() {
        let mut input = InputBehavior::default();
        assert_eq!(input.text(), "1");
        assert_eq!(input.evaluate(&[]), Ok(Outcome::Single(Value::Scalar(1))));

        let mut content = Content::new();
        content.insert(VALUE_KEY.to_string(), serde_json::json!(" 42 "));
        input.apply_content(&content).unwrap();
        assert_eq!(input.evaluate(&[]), Ok(Outcome::Single(Value::Scalar(42))));
        assert_eq!(input.content()[VALUE_KEY], serde_json::json!(" 42 "));

        content.insert(VALUE_KEY.to_string(), serde_json::json!("x"));
        input.apply_content(&content).unwrap();
        assert!(input.evaluate(&[]).is_err());

        content.insert(VALUE_KEY.to_string(), serde_json::json!([1]));
        assert!(input.apply_content(&content).is_err());
    }

    #[test]
    fn test_registry_socket_layout() {
        let registry = create_calculator_registry();
        assert_eq!(registry.types().count(), 7);

        let input = registry.get(OP_NODE_INPUT).unwrap();
        assert!(input.inputs.is_empty());
        assert_eq!(input.outputs.len(), 1);

        let div = registry.get(OP_NODE_DIV).unwrap();
        assert_eq!(div.outputs.len(), 2);
        assert_eq!(div.outputs[1].label.as_deref(), Some("r"));

        let output = registry.get(OP_NODE_OUTPUT).unwrap();
        assert_eq!(output.inputs.len(), 1);
        assert!(output.outputs.is_empty());
    }

    #[test]
    fn test_check_feeds_zero_on_every_output() {
        let mut graph = calculator_graph();
        let check = graph.create_node(OP_NODE_CHECK).unwrap();
        assert!(graph.node(check).unwrap().inputs().is_empty());
        assert_eq!(graph.node(check).unwrap().outputs().len(), 4);
        assert_eq!(graph.eval(check).unwrap(), vec![Value::Scalar(0); 4]);

        let add = graph.create_node(OP_NODE_ADD).unwrap();
        graph.connect_by_index(check, 0, add, 0).unwrap();
        graph.connect_by_index(check, 3, add, 1).unwrap();
        assert_eq!(graph.eval(add).unwrap(), vec![Value::Scalar(0)]);
        assert!(!graph.node(add).unwrap().is_invalid());
    }

    #[test]
    fn test_demo_graph_evaluates() {
        let (mut graph, outputs) = demo_graph().unwrap();
        graph.eval_all();
        let shown: Vec<_> = outputs
            .iter()
            .map(|id| graph.node(*id).unwrap().behavior().display())
            .collect();
        assert_eq!(
            shown,
            vec![
                Some("3 (quotient)".to_string()),
                Some("1 (remainder)".to_string()),
                Some("9".to_string()),
            ]
        );
        assert!(graph.nodes().all(|n| !n.is_invalid()));
    }
}
