//! Watches the output directory and batches bursts of changes.
//!
//! A bundler writes many files per build. Changes arriving within the
//! debounce window are delivered to the pipeline as one batch.

use crate::error::{Result, ServeError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Recursive watcher over one directory.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
    rx: mpsc::Receiver<FileChange>,
    debounce: Duration,
}

impl FileWatcher {
    /// Watch `root`, skipping paths matching `ignore_patterns`
    /// (`*.ext` suffixes or directory names) and hidden files.
    pub fn new(root: PathBuf, ignore_patterns: Vec<String>, debounce: Duration) -> Result<Self> {
        if !root.is_dir() {
            return Err(ServeError::DirectoryNotFound(root));
        }

        let (tx, rx) = mpsc::channel(256);
        let watch_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("File watcher error: {}", e);
                    return;
                }
            };

            for path in &event.paths {
                if should_ignore(path, &watch_root, &ignore_patterns) {
                    continue;
                }

                let change = match event.kind {
                    EventKind::Create(_) => FileChange::Created(path.clone()),
                    EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                if tx.blocking_send(change).is_err() {
                    return;
                }
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok(Self {
            _watcher: watcher,
            root,
            rx,
            debounce,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Wait for the next burst of changes. `None` once the watcher is gone.
    ///
    /// Repeated changes to one path within a burst are collapsed into the last.
    pub async fn next_batch(&mut self) -> Option<Vec<FileChange>> {
        let first = self.rx.recv().await?;
        let mut batch = vec![first];

        loop {
            match tokio::time::timeout(self.debounce, self.rx.recv()).await {
                Ok(Some(change)) => {
                    batch.retain(|c| c.path() != change.path());
                    batch.push(change);
                }
                Ok(None) | Err(_) => break,
            }
        }

        Some(batch)
    }
}

/// Whether a changed path is of no interest.
fn should_ignore(path: &Path, root: &Path, ignore_patterns: &[String]) -> bool {
    let Ok(rel_path) = path.strip_prefix(root) else {
        return true;
    };

    let path_str = rel_path.to_string_lossy();

    for pattern in ignore_patterns {
        if let Some(suffix) = pattern.strip_prefix('*') {
            if path_str.ends_with(suffix) {
                return true;
            }
        } else if rel_path
            .components()
            .any(|c| c.as_os_str() == pattern.as_str())
        {
            return true;
        }
    }

    rel_path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}
