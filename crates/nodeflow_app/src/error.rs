// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application errors.

use crate::config::ConfigError;
use nodeflow_graph::{ClipboardError, ConnectionError, HistoryError, SceneError};
use thiserror::Error;

/// Errors surfaced by the `nodeflow` commands
#[derive(Debug, Error)]
pub enum AppError {
    /// Scene could not be loaded or saved
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// History bookkeeping failed
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Copy or paste failed
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    /// Building a scene failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Bad configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The file watcher could not be set up
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// No node with this id in the scene
    #[error("No node {0} in the scene")]
    UnknownNode(u64),

    /// Node does not hold an editable value
    #[error("Node {0} has no editable value")]
    NotEditable(u64),
}

/// Result type for application commands
pub type Result<T> = std::result::Result<T, AppError>;
