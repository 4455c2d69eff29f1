// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application configuration.
//!
//! Stored as RON next to the scenes (`nodeflow.ron`). Every field has a
//! default, so a partial or missing file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "nodeflow.ron";

/// Log directives used when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "nodeflow_graph=info,nodeflow_app=info";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON for this configuration
    #[error("Invalid configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Encoding failed
    #[error("Could not encode configuration: {0}")]
    Encode(#[from] ron::Error),
}

/// Host settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Undo stamps kept per session
    pub history_depth: usize,
    /// Quiet period before a changed scene file is reloaded
    pub watch_debounce_ms: u64,
    /// `tracing` filter directives
    pub log_filter: String,
    /// Evaluate every node right after loading
    pub evaluate_on_load: bool,
    /// Where duplicated nodes are placed
    pub paste_cursor: [f64; 2],
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history_depth: nodeflow_graph::history::MAX_HISTORY,
            watch_debounce_ms: 250,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            evaluate_on_load: true,
            paste_cursor: [0.0, 0.0],
        }
    }
}

impl AppConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }

    /// Load the given file, or `nodeflow.ron` from the working directory
    /// when it exists, or fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                if local.is_file() {
                    Self::load(&local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Debounce period as a duration
    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}
