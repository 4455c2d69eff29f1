// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph engine for nodeflow.
//!
//! This crate provides the model behind a visual node editor:
//! - Typed input/output sockets and the edges between them
//! - Memoized evaluation with dirty/invalid propagation
//! - Scene serialization that reconciles a live graph in place
//! - Undo/redo history and clipboard built on that serialization
//!
//! ## Architecture
//!
//! A [`Graph`] owns its nodes and edges. Node behavior is pluggable through
//! [`NodeBehavior`], and node types are looked up by integer op code in a
//! [`NodeRegistry`]. The [`graphs::calculator`] module ships a small integer
//! calculator registry that exercises the whole engine.

mod id;

pub mod socket;
pub mod edge;
pub mod value;
pub mod node;
pub mod graph;
pub mod evaluation;
pub mod serialization;
pub mod history;
pub mod clipboard;
pub mod graphs;

pub use socket::{Socket, SocketDirection, SocketId, SocketPosition, SocketType};
pub use edge::{Edge, EdgeId, EdgeType, Endpoint};
pub use value::{extract_output, Value};
pub use node::{Content, Node, NodeBehavior, NodeError, NodeId, NodeRegistry, NodeType, OpCode, Outcome};
pub use graph::{ConnectionError, Graph, Selection};
pub use evaluation::EvaluationError;
pub use serialization::{ReconcileReport, SceneError, SceneRecord};
pub use history::{History, HistoryError};
pub use clipboard::{Clipboard, ClipboardData, ClipboardError};
