// SPDX-License-Identifier: MIT OR Apache-2.0
//! An open scene: the live graph, its history and the file backing it.

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use nodeflow_graph::clipboard;
use nodeflow_graph::graphs::calculator::{self, OP_NODE_INPUT, VALUE_KEY};
use nodeflow_graph::{Graph, History, NodeId, ReconcileReport, SceneError, Selection};
use std::path::{Path, PathBuf};

/// History description used when the user edits an input value
pub const SET_INPUT_STAMP: &str = "Set input value";

/// History description used when the file changed on disk
pub const RELOAD_STAMP: &str = "Reloaded from disk";

/// A scene being edited
pub struct Session {
    graph: Graph,
    history: History,
    path: PathBuf,
}

impl Session {
    /// Load a scene file into a fresh calculator graph
    pub fn open(path: impl Into<PathBuf>, config: &AppConfig) -> Result<Self> {
        let path = path.into();
        let mut graph = calculator::calculator_graph();
        let report = graph.load_from_file(&path)?;
        log_report(&report);
        Self::start(graph, path, config)
    }

    /// Write the demo scene to `path` and open it
    pub fn create_demo(path: impl Into<PathBuf>, config: &AppConfig) -> Result<Self> {
        let path = path.into();
        let (mut graph, _) = calculator::demo_graph()?;
        graph.save_to_file(&path)?;
        Self::start(graph, path, config)
    }

    fn start(mut graph: Graph, path: PathBuf, config: &AppConfig) -> Result<Self> {
        let mut history = History::with_max_depth(config.history_depth);
        history.store_initial(&mut graph)?;
        if config.evaluate_on_load {
            graph.eval_all();
        }
        Ok(Self { graph, history, path })
    }

    /// The live graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The undo/redo history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// File backing this session
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Change the text of an input node, record it and save
    pub fn set_input(&mut self, node_id: NodeId, text: &str) -> Result<()> {
        let node = self.graph.node(node_id).ok_or(AppError::UnknownNode(node_id.0))?;
        if node.op_code() != Some(OP_NODE_INPUT) {
            return Err(AppError::NotEditable(node_id.0));
        }
        self.graph
            .set_content_value(node_id, VALUE_KEY, serde_json::Value::String(text.to_string()));
        self.graph.eval_all();

        let selection = self.graph.selection_of([node_id]);
        self.history.store(&mut self.graph, SET_INPUT_STAMP, selection, true)?;
        self.save()
    }

    /// Copy nodes (and the edges between them) and paste them at `cursor`.
    ///
    /// Returns the ids of the pasted nodes.
    pub fn duplicate(&mut self, nodes: &[NodeId], cursor: [f64; 2]) -> Result<Vec<NodeId>> {
        if let Some(missing) = nodes.iter().find(|id| self.graph.node(**id).is_none()) {
            return Err(AppError::UnknownNode(missing.0));
        }
        let selection = self.graph.selection_of(nodes.iter().copied());
        let data = clipboard::serialize_selected(&self.graph, &selection);
        let pasted = clipboard::paste(&mut self.graph, &mut self.history, &data, cursor)?;
        self.graph.eval_all();
        self.save()?;
        Ok(pasted)
    }

    /// Reconcile the graph with the file on disk.
    ///
    /// A file that is not valid JSON (typically caught mid-write) is ignored
    /// and the current graph is kept.
    pub fn reload(&mut self) -> Result<()> {
        let report = match self.graph.load_from_file(&self.path) {
            Ok(report) => report,
            Err(err @ SceneError::InvalidFile { .. }) => {
                tracing::warn!("{err}; keeping the current scene");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        log_report(&report);
        self.history.store(&mut self.graph, RELOAD_STAMP, Selection::default(), false)?;
        self.graph.eval_all();
        Ok(())
    }

    /// Write the scene back to its file
    pub fn save(&mut self) -> Result<()> {
        self.graph.save_to_file(&self.path)?;
        Ok(())
    }

    /// One line per node: id, title, state, shown value and status message
    pub fn report(&self) -> Vec<String> {
        self.graph
            .nodes()
            .map(|node| {
                let state = if node.is_invalid() {
                    "invalid"
                } else if node.is_dirty() {
                    "dirty"
                } else {
                    "ok"
                };
                let shown = node.behavior().display().unwrap_or_else(|| {
                    let values: Vec<String> = node.values().iter().map(ToString::to_string).collect();
                    values.join(", ")
                });
                let mut line = format!("{:>20}  {:<16} {:<8} {}", node.id().0, node.title, state, shown);
                if let Some(message) = node.message() {
                    line.push_str("  # ");
                    line.push_str(message);
                }
                line
            })
            .collect()
    }
}

fn log_report(report: &ReconcileReport) {
    tracing::debug!(
        nodes_reused = report.nodes_reused,
        nodes_created = report.nodes_created,
        nodes_removed = report.nodes_removed,
        edges_reused = report.edges_reused,
        edges_created = report.edges_created,
        edges_removed = report.edges_removed,
        "scene reconciled"
    );
    for failure in &report.failures {
        tracing::warn!("skipped {failure}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_graph::graphs::calculator::OP_NODE_OUTPUT;
    use nodeflow_graph::Value;

    fn demo_session() -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::create_demo(dir.path().join("demo.json"), &AppConfig::default()).unwrap();
        (dir, session)
    }

    fn output_values(session: &Session) -> Vec<String> {
        session
            .graph()
            .nodes()
            .filter(|n| n.op_code() == Some(OP_NODE_OUTPUT))
            .filter_map(|n| n.behavior().display())
            .collect()
    }

    fn first_input(session: &Session) -> NodeId {
        session
            .graph()
            .nodes()
            .find(|n| n.op_code() == Some(OP_NODE_INPUT))
            .unwrap()
            .id()
    }

    #[test]
    fn test_demo_is_saved_and_evaluated() {
        let (dir, session) = demo_session();
        assert!(dir.path().join("demo.json").exists());
        assert_eq!(session.graph().node_count(), 7);
        let mut shown = output_values(&session);
        shown.sort();
        assert_eq!(shown, vec!["1 (remainder)", "3 (quotient)", "9"]);
        assert!(!session.history().can_undo());
    }

    #[test]
    fn test_open_reads_saved_scene() {
        let (dir, _) = demo_session();
        let session = Session::open(dir.path().join("demo.json"), &AppConfig::default()).unwrap();
        assert_eq!(session.graph().node_count(), 7);
        assert!(session.graph().nodes().all(|n| !n.is_dirty()));
    }

    #[test]
    fn test_open_without_evaluation_leaves_nodes_dirty() {
        let (dir, _) = demo_session();
        let config = AppConfig {
            evaluate_on_load: false,
            ..AppConfig::default()
        };
        let session = Session::open(dir.path().join("demo.json"), &config).unwrap();
        assert!(session.graph().nodes().all(|n| n.is_dirty()));
    }

    #[test]
    fn test_set_input_updates_outputs_and_file() {
        let (dir, mut session) = demo_session();
        let a = first_input(&session);
        session.set_input(a, "9").unwrap();

        let mut shown = output_values(&session);
        shown.sort();
        assert_eq!(shown, vec!["1 (remainder)", "11", "4 (quotient)"]);
        assert_eq!(session.history().undo_description(), Some(SET_INPUT_STAMP));

        let reopened = Session::open(dir.path().join("demo.json"), &AppConfig::default()).unwrap();
        let node = reopened.graph().node(a).unwrap();
        assert_eq!(node.content()[VALUE_KEY], serde_json::json!("9"));
    }

    #[test]
    fn test_set_input_rejects_other_nodes() {
        let (_dir, mut session) = demo_session();
        let output = session
            .graph()
            .nodes()
            .find(|n| n.op_code() == Some(OP_NODE_OUTPUT))
            .unwrap()
            .id();
        assert!(matches!(session.set_input(output, "1"), Err(AppError::NotEditable(_))));
        assert!(matches!(session.set_input(NodeId(1), "1"), Err(AppError::UnknownNode(1))));
    }

    #[test]
    fn test_duplicate_copies_nodes() {
        let (_dir, mut session) = demo_session();
        let a = first_input(&session);
        let pasted = session.duplicate(&[a], [50.0, 50.0]).unwrap();
        assert_eq!(pasted.len(), 1);
        assert_ne!(pasted[0], a);
        assert_eq!(session.graph().node_count(), 8);

        let copy = session.graph().node(pasted[0]).unwrap();
        assert_eq!(copy.content()[VALUE_KEY], serde_json::json!("7"));
        assert_eq!(copy.position, [50.0, 50.0]);
        assert_eq!(copy.values(), &[Value::Scalar(7)]);
    }

    #[test]
    fn test_reload_keeps_instances_and_ignores_garbage() {
        let (dir, mut session) = demo_session();
        let path = dir.path().join("demo.json");
        let a = first_input(&session);
        let instance = session.graph().node(a).unwrap().instance();

        // Another program rewrites the file with a new input value
        let mut other = Session::open(&path, &AppConfig::default()).unwrap();
        other.set_input(a, "11").unwrap();

        session.reload().unwrap();
        assert_eq!(session.graph().node(a).unwrap().instance(), instance);
        let mut shown = output_values(&session);
        shown.sort();
        assert_eq!(shown, vec!["1 (remainder)", "13", "5 (quotient)"]);

        std::fs::write(&path, "{ half written").unwrap();
        session.reload().unwrap();
        assert_eq!(session.graph().node_count(), 7);
        assert_eq!(session.graph().node(a).unwrap().instance(), instance);
    }

    #[test]
    fn test_report_lists_every_node() {
        let (_dir, session) = demo_session();
        let report = session.report();
        assert_eq!(report.len(), 7);
        assert!(report.iter().any(|line| line.contains("3 (quotient)")));
        assert!(report.iter().all(|line| line.contains(" ok ")));
    }
}
