// SPDX-License-Identifier: MIT OR Apache-2.0
//! File system watcher for scene files.
//!
//! Provides debounced events for the scene files being edited so the host can
//! reconcile the live graph whenever another program rewrites them.

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq)]
pub enum FileEvent {
    /// A watched file was written or replaced
    Modified(PathBuf),
    /// A watched file was deleted
    Deleted(PathBuf),
    /// An error occurred
    Error(String),
}

/// Configuration for the file watcher
#[derive(Debug, Clone)]
pub struct FileWatcherConfig {
    /// Debounce duration for events
    pub debounce_duration: Duration,
    /// File extensions to watch (empty = watch all)
    pub extensions: HashSet<String>,
}

impl Default for FileWatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(250),
            extensions: HashSet::new(),
        }
    }
}

impl FileWatcherConfig {
    /// Watch JSON scene files, debounced by `debounce_duration`
    pub fn for_scenes(debounce_duration: Duration) -> Self {
        let mut extensions = HashSet::new();
        extensions.insert("json".to_string());
        Self {
            debounce_duration,
            extensions,
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        self.extensions.is_empty()
            || path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| self.extensions.contains(&e.to_lowercase()))
    }
}

/// Whether an event path names a watched file.
///
/// Event paths come back absolute; the file may already be gone, so the
/// parent directory is compared instead of the file itself.
fn same_file(watched: &Path, event: &Path) -> bool {
    if watched == event {
        return true;
    }
    if watched.file_name() != event.file_name() {
        return false;
    }
    match (watched.parent(), event.parent().map(std::fs::canonicalize)) {
        (Some(dir), Some(Ok(event_dir))) => dir == event_dir,
        _ => false,
    }
}

/// Watches individual scene files
pub struct FileWatcher {
    /// The underlying debounced watcher
    watcher: Debouncer<RecommendedWatcher, RecommendedCache>,
    /// Receiver for file events
    event_rx: Receiver<FileEvent>,
    /// Watched files, canonicalized
    watched_files: Arc<RwLock<HashSet<PathBuf>>>,
}

impl FileWatcher {
    /// Create a new file watcher with the given configuration
    pub fn new(config: FileWatcherConfig) -> Result<Self, notify::Error> {
        let (event_tx, event_rx) = mpsc::channel();
        let watched_files: Arc<RwLock<HashSet<PathBuf>>> = Arc::new(RwLock::new(HashSet::new()));
        let watched = Arc::clone(&watched_files);
        let debounce = config.debounce_duration;

        // Create the debounced watcher
        let watcher = new_debouncer(debounce, None, move |result: DebounceEventResult| match result {
            Ok(events) => {
                for event in events {
                    let paths: Vec<PathBuf> = event
                        .paths
                        .iter()
                        .filter(|p| config.accepts(p))
                        .filter(|p| watched.read().iter().any(|w| same_file(w, p)))
                        .cloned()
                        .collect();

                    for path in paths {
                        let file_event = match event.kind {
                            EventKind::Create(_) | EventKind::Modify(_) => FileEvent::Modified(path),
                            EventKind::Remove(_) => FileEvent::Deleted(path),
                            EventKind::Any | EventKind::Access(_) | EventKind::Other => continue,
                        };
                        let _ = event_tx.send(file_event);
                    }
                }
            }
            Err(errors) => {
                for error in errors {
                    let _ = event_tx.send(FileEvent::Error(error.to_string()));
                }
            }
        })?;

        Ok(Self {
            watcher,
            event_rx,
            watched_files,
        })
    }

    /// Watch one file for changes
    pub fn watch_file(&mut self, path: impl AsRef<Path>) -> Result<(), notify::Error> {
        let path = std::fs::canonicalize(path.as_ref())?;
        let dir = path
            .parent()
            .ok_or_else(|| notify::Error::path_not_found().add_path(path.clone()))?;

        self.watcher.watch(dir, RecursiveMode::NonRecursive)?;
        self.watched_files.write().insert(path.clone());
        tracing::info!("Watching {} for changes", path.display());
        Ok(())
    }

    /// Poll for pending file events (non-blocking)
    pub fn poll_events(&self) -> Vec<FileEvent> {
        let mut events = Vec::new();
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("File watcher channel disconnected");
                    break;
                }
            }
        }
        events
    }

    /// Wait up to `timeout` for events, then drain whatever else is queued
    pub fn wait_events(&self, timeout: Duration) -> Vec<FileEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(first) => {
                let mut events = vec![first];
                events.extend(self.poll_events());
                events
            }
            Err(RecvTimeoutError::Timeout) => Vec::new(),
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("File watcher channel disconnected");
                Vec::new()
            }
        }
    }
}
