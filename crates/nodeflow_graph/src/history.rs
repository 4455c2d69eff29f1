// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history of scene snapshots.
//!
//! Every stamp holds a full serialized scene. Restoring a stamp reconciles
//! the live graph against it, so nodes that exist on both sides keep their
//! identity across undo and redo.

use crate::graph::{Graph, Selection};
use crate::serialization::SceneError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Default undo history depth
pub const MAX_HISTORY: usize = 32;

/// Description of the stamp stored when a scene is first shown
pub const INITIAL_STAMP: &str = "Initial History Stamp";

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Restoring a snapshot failed
    #[error("Restore failed: {0}")]
    Scene(#[from] SceneError),

    /// Snapshot encoding failed
    #[error("Snapshot error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Serialized scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Scene as JSON bytes
    pub data: Vec<u8>,
    /// Timestamp when snapshot was taken
    pub timestamp: u64,
    /// Size in bytes
    pub size: usize,
}

impl StateSnapshot {
    /// Create a new state snapshot
    pub fn new(data: Vec<u8>) -> Self {
        let size = data.len();
        Self {
            data,
            timestamp: now(),
            size,
        }
    }

    /// Capture the current scene
    pub fn capture(graph: &Graph) -> Result<Self> {
        Ok(Self::new(serde_json::to_vec(&graph.serialize())?))
    }

    /// Decode the scene document
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.data)?)
    }
}

/// A named point in the history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStamp {
    /// Human-readable description
    pub description: String,
    /// Scene at this point
    pub snapshot: StateSnapshot,
    /// Selection at this point
    pub selection: Selection,
    /// Timestamp
    pub timestamp: u64,
}

/// History statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Stamps in the undo stack
    pub undo_count: usize,
    /// Stamps in the redo stack
    pub redo_count: usize,
    /// Total memory used by history (bytes)
    pub memory_used: usize,
    /// Maximum history depth
    pub max_depth: usize,
}

type RestoredListener = Box<dyn FnMut(&mut Graph, &HistoryStamp)>;

/// Undo/redo history manager.
///
/// The top of the undo stack always mirrors the current scene, so undoing
/// needs at least two stamps.
pub struct History {
    /// Undo stack
    undo_stack: VecDeque<HistoryStamp>,
    /// Redo stack
    redo_stack: VecDeque<HistoryStamp>,
    /// Maximum history depth
    max_depth: usize,
    /// Total memory used
    memory_used: usize,
    restored_listeners: Vec<RestoredListener>,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
            memory_used: 0,
            restored_listeners: Vec::new(),
        }
    }

    /// Register a callback run after a stamp was restored
    pub fn add_restored_listener(&mut self, callback: impl FnMut(&mut Graph, &HistoryStamp) + 'static) {
        self.restored_listeners.push(Box::new(callback));
    }

    /// Record the current scene.
    ///
    /// Clears the redo stack; the oldest stamps fall off past the depth limit.
    pub fn store(&mut self, graph: &mut Graph, description: &str, selection: Selection, set_modified: bool) -> Result<()> {
        if set_modified {
            graph.set_modified(true);
        }
        let stamp = HistoryStamp {
            description: description.to_string(),
            snapshot: StateSnapshot::capture(graph)?,
            selection,
            timestamp: now(),
        };
        tracing::debug!(size = stamp.snapshot.size, "history stamp: {description}");

        for dropped in self.redo_stack.drain(..) {
            self.memory_used = self.memory_used.saturating_sub(dropped.snapshot.size);
        }
        self.memory_used += stamp.snapshot.size;
        self.undo_stack.push_back(stamp);

        // Enforce history limit
        while self.undo_stack.len() > self.max_depth {
            if let Some(old) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(old.snapshot.size);
            }
        }
        Ok(())
    }

    /// Record the freshly loaded or created scene
    pub fn store_initial(&mut self, graph: &mut Graph) -> Result<()> {
        self.store(graph, INITIAL_STAMP, Selection::default(), false)
    }

    /// Step back one stamp and restore the scene before it.
    ///
    /// Returns the selection saved with the restored stamp.
    pub fn undo(&mut self, graph: &mut Graph) -> Result<Selection> {
        if self.undo_stack.len() < 2 {
            return Err(HistoryError::NothingToUndo);
        }
        let undone = self.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)?;
        tracing::info!("undo: {}", undone.description);
        self.redo_stack.push_back(undone);
        self.restore_top(graph)
    }

    /// Re-apply the last undone stamp
    pub fn redo(&mut self, graph: &mut Graph) -> Result<Selection> {
        let stamp = self.redo_stack.pop_back().ok_or(HistoryError::NothingToRedo)?;
        tracing::info!("redo: {}", stamp.description);
        self.undo_stack.push_back(stamp);
        self.restore_top(graph)
    }

    fn restore_top(&mut self, graph: &mut Graph) -> Result<Selection> {
        let stamp = self.undo_stack.back().ok_or(HistoryError::NothingToUndo)?;
        let data = stamp.snapshot.to_json()?;
        let report = graph.deserialize(&data)?;
        if !report.is_clean() {
            tracing::warn!("history restore skipped {} records", report.failures.len());
        }
        graph.set_modified(true);
        for listener in &mut self.restored_listeners {
            listener(graph, stamp);
        }
        Ok(stamp.selection.clone())
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.memory_used = 0;
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            memory_used: self.memory_used,
            max_depth: self.max_depth,
        }
    }

    /// Description of the stamp the next undo reverts
    pub fn undo_description(&self) -> Option<&str> {
        if self.can_undo() {
            self.undo_stack.back().map(|s| s.description.as_str())
        } else {
            None
        }
    }

    /// Description of the stamp the next redo re-applies
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|s| s.description.as_str())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("undo_stack", &self.undo_stack.len())
            .field("redo_stack", &self.redo_stack.len())
            .field("max_depth", &self.max_depth)
            .field("memory_used", &self.memory_used)
            .finish_non_exhaustive()
    }
}
