// SPDX-License-Identifier: MIT OR Apache-2.0
//! Copy, cut and paste of scene fragments.

use crate::graph::{Graph, Selection};
use crate::history::{History, HistoryError};
use crate::node::{Node, NodeId};
use crate::serialization::{EdgeRecord, NodeRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// History description stored by [`cut`]
pub const CUT_STAMP: &str = "Cut out elements from scene";
/// History description stored by [`paste`]
pub const PASTE_STAMP: &str = "Pasted elements in scene";

/// Clipboard errors
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// Clipboard text is not clipboard data
    #[error("Invalid clipboard data: {0}")]
    Json(#[from] serde_json::Error),

    /// Recording the edit failed
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Nothing was copied yet
    #[error("Clipboard is empty")]
    Empty,
}

/// Result type for clipboard operations
pub type Result<T> = std::result::Result<T, ClipboardError>;

/// A copied scene fragment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipboardData {
    /// Copied nodes
    pub nodes: Vec<NodeRecord>,
    /// Copied edges, all between copied nodes
    pub edges: Vec<EdgeRecord>,
}

impl ClipboardData {
    /// Text form for the system clipboard
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse text taken from the system clipboard
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Nothing copied
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-left corner of the copied nodes
    pub fn bbox_min(&self) -> Option<[f64; 2]> {
        self.nodes.iter().map(NodeRecord::position).reduce(|min, pos| {
            [min[0].min(pos[0]), min[1].min(pos[1])]
        })
    }
}

/// Copy the selected nodes and the selected edges between them
pub fn serialize_selected(graph: &Graph, selection: &Selection) -> ClipboardData {
    let mut seen = HashSet::new();
    let nodes: Vec<NodeRecord> = graph
        .nodes()
        .filter(|n| selection.contains_node(n.id()) && seen.insert(n.id()))
        .map(Node::to_record)
        .collect();

    let sockets: HashSet<_> = nodes
        .iter()
        .flat_map(|n| n.inputs.iter().chain(n.outputs.iter()))
        .map(|s| s.id)
        .collect();
    let edges = graph
        .edges()
        .filter(|e| selection.contains_edge(e.id))
        .filter(|e| {
            let inside = sockets.contains(&e.start.socket) && sockets.contains(&e.end.socket);
            if !inside {
                tracing::debug!(edge = e.id.0, "edge leaves the selection, not copied");
            }
            inside
        })
        .map(EdgeRecord::from)
        .collect();

    ClipboardData { nodes, edges }
}

/// Copy the selection, then remove it from the scene
pub fn cut(graph: &mut Graph, history: &mut History, selection: &Selection) -> Result<ClipboardData> {
    let data = serialize_selected(graph, selection);
    for edge_id in &selection.edges {
        graph.remove_edge(*edge_id);
    }
    for node_id in &selection.nodes {
        graph.remove_node(*node_id);
    }
    history.store(graph, CUT_STAMP, Selection::default(), true)?;
    Ok(data)
}

/// Insert a copy of `data` with its top-left corner at `cursor`.
///
/// Returns the ids of the new nodes.
pub fn paste(graph: &mut Graph, history: &mut History, data: &ClipboardData, cursor: [f64; 2]) -> Result<Vec<NodeId>> {
    let Some(min) = data.bbox_min() else {
        return Ok(Vec::new());
    };
    let nodes: Vec<NodeRecord> = data
        .nodes
        .iter()
        .map(|record| {
            let mut record = record.clone();
            let [x, y] = record.position();
            record.set_position([cursor[0] + x - min[0], cursor[1] + y - min[1]]);
            record
        })
        .collect();

    let inserted = graph.insert_records(&nodes, &data.edges);
    if !inserted.failures.is_empty() {
        tracing::warn!("paste skipped {} records", inserted.failures.len());
    }
    let selection = Selection {
        nodes: inserted.nodes.clone(),
        edges: inserted.edges,
    };
    history.store(graph, PASTE_STAMP, selection, true)?;
    Ok(inserted.nodes)
}

/// In-process clipboard holding the last copied fragment as text
#[derive(Debug, Default)]
pub struct Clipboard {
    text: Option<String>,
}

impl Clipboard {
    /// Create an empty clipboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the selection
    pub fn copy(&mut self, graph: &Graph, selection: &Selection) -> Result<()> {
        self.text = Some(serialize_selected(graph, selection).to_json_string()?);
        Ok(())
    }

    /// Copy the selection and remove it from the scene
    pub fn cut(&mut self, graph: &mut Graph, history: &mut History, selection: &Selection) -> Result<()> {
        let data = cut(graph, history, selection)?;
        self.text = Some(data.to_json_string()?);
        Ok(())
    }

    /// Paste the last copied fragment at `cursor`
    pub fn paste(&self, graph: &mut Graph, history: &mut History, cursor: [f64; 2]) -> Result<Vec<NodeId>> {
        let text = self.text.as_deref().ok_or(ClipboardError::Empty)?;
        let data = ClipboardData::from_json_str(text)?;
        paste(graph, history, &data, cursor)
    }

    /// Raw clipboard text, if anything was copied
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::calculator::{self, OP_NODE_ADD, OP_NODE_INPUT, OP_NODE_OUTPUT, VALUE_KEY};
    use crate::value::Value;
    use serde_json::json;

    struct Scene {
        graph: Graph,
        history: History,
        a: NodeId,
        b: NodeId,
        add: NodeId,
        out: NodeId,
    }

    fn scene() -> Scene {
        let mut graph = calculator::calculator_graph();
        let registry = std::sync::Arc::clone(graph.registry());
        let mut place = |op, x, y| graph.add_node(Node::new(registry.resolve(Some(op))).with_position(x, y));
        let a = place(OP_NODE_INPUT, 100.0, 50.0);
        let b = place(OP_NODE_INPUT, 100.0, 150.0);
        let add = place(OP_NODE_ADD, 300.0, 100.0);
        let out = place(OP_NODE_OUTPUT, 500.0, 100.0);
        graph.set_content_value(a, VALUE_KEY, json!("3"));
        graph.set_content_value(b, VALUE_KEY, json!("4"));
        graph.connect_by_index(a, 0, add, 0).unwrap();
        graph.connect_by_index(b, 0, add, 1).unwrap();
        graph.connect_by_index(add, 0, out, 0).unwrap();
        let mut history = History::new();
        history.store_initial(&mut graph).unwrap();
        Scene { graph, history, a, b, add, out }
    }

    #[test]
    fn test_copy_keeps_only_internal_edges() {
        let s = scene();
        let selection = s.graph.selection_of([s.a, s.add]);
        let data = serialize_selected(&s.graph, &selection);
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.edges.len(), 1);
        assert_eq!(data.bbox_min(), Some([100.0, 50.0]));

        // an explicitly selected edge that leaves the selection is dropped
        let mut selection = Selection::of_nodes([s.a]);
        selection.edges = s.graph.edges().map(|e| e.id).collect();
        assert!(serialize_selected(&s.graph, &selection).edges.is_empty());
    }

    #[test]
    fn test_paste_offsets_to_cursor_with_fresh_ids() {
        let mut s = scene();
        let data = serialize_selected(&s.graph, &s.graph.selection_of([s.a, s.b, s.add]));
        let pasted = paste(&mut s.graph, &mut s.history, &data, [1000.0, 1000.0]).unwrap();

        assert_eq!(pasted.len(), 3);
        assert!(pasted.iter().all(|id| ![s.a, s.b, s.add].contains(id)));
        assert_eq!(s.graph.node(pasted[0]).unwrap().position, [1000.0, 1000.0]);
        assert_eq!(s.graph.node(pasted[1]).unwrap().position, [1000.0, 1100.0]);
        assert_eq!(s.graph.node(pasted[2]).unwrap().position, [1200.0, 1050.0]);
        assert_eq!(s.graph.parents(pasted[2]), vec![pasted[0], pasted[1]]);
        assert_eq!(s.graph.eval(pasted[2]).unwrap(), vec![Value::Scalar(7)]);

        assert_eq!(s.history.undo_description(), Some(PASTE_STAMP));
        assert!(s.graph.is_modified());
    }

    #[test]
    fn test_cut_removes_selection_and_can_be_undone() {
        let mut s = scene();
        let selection = s.graph.selection_of([s.add]);
        let data = cut(&mut s.graph, &mut s.history, &selection).unwrap();
        assert_eq!(data.nodes.len(), 1);
        assert!(s.graph.node(s.add).is_none());
        assert_eq!(s.graph.edge_count(), 0);
        assert!(s.graph.node(s.out).unwrap().is_invalid());
        assert_eq!(s.history.undo_description(), Some(CUT_STAMP));

        s.history.undo(&mut s.graph).unwrap();
        assert!(s.graph.node(s.add).is_some());
        assert_eq!(s.graph.edge_count(), 3);
    }

    #[test]
    fn test_clipboard_text_round_trip() {
        let mut s = scene();
        let mut clipboard = Clipboard::new();
        assert!(matches!(
            clipboard.paste(&mut s.graph, &mut s.history, [0.0, 0.0]),
            Err(ClipboardError::Empty)
        ));

        clipboard.copy(&s.graph, &s.graph.selection_of([s.a, s.b])).unwrap();
        let text = clipboard.text().unwrap();
        assert_eq!(ClipboardData::from_json_str(text).unwrap().nodes.len(), 2);

        let pasted = clipboard.paste(&mut s.graph, &mut s.history, [0.0, 0.0]).unwrap();
        assert_eq!(pasted.len(), 2);
        assert_eq!(s.graph.node_count(), 6);
        assert!(ClipboardData::from_json_str("[1, 2]").is_err());
    }

    #[test]
    fn test_paste_nothing_is_noop() {
        let mut s = scene();
        let pasted = paste(&mut s.graph, &mut s.history, &ClipboardData::default(), [0.0, 0.0]).unwrap();
        assert!(pasted.is_empty());
        assert!(!s.history.can_undo());
    }
}
