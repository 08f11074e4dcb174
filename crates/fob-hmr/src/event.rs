//! Build lifecycle events consumed by the reporter.

use crate::graph::{BundleGraph, ChangedAssets};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// One event from the build pipeline. Consumed once, never stored.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    /// Watch mode started; services should come up.
    WatchStart,
    /// Watch mode ended; services should go down.
    WatchEnd,
    /// A (re)build started.
    BuildStart,
    /// Progress inside a running build.
    BuildProgress(ProgressPhase),
    /// A build finished and its bundles are written.
    BuildSuccess {
        graph: Arc<dyn BundleGraph>,
        changed_assets: ChangedAssets,
        build_time: Duration,
    },
    /// A build failed.
    BuildFailure { diagnostics: Vec<Diagnostic> },
}

impl BuildEvent {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            BuildEvent::WatchStart => "watchStart",
            BuildEvent::WatchEnd => "watchEnd",
            BuildEvent::BuildStart => "buildStart",
            BuildEvent::BuildProgress(_) => "buildProgress",
            BuildEvent::BuildSuccess { .. } => "buildSuccess",
            BuildEvent::BuildFailure { .. } => "buildFailure",
        }
    }
}

/// Phase of a build in progress.
///
/// Only [`ProgressPhase::Bundled`] carries a graph: that is the point at which
/// the bundle graph for the rebuild is final.
#[derive(Debug, Clone)]
pub enum ProgressPhase {
    Resolving { dependency: String },
    Transforming { file_path: PathBuf },
    Bundling,
    Bundled {
        changed_assets: ChangedAssets,
        graph: Arc<dyn BundleGraph>,
    },
    Packaging { bundle: String },
    Optimizing { bundle: String },
}

/// What an update channel is told when assets should be re-applied.
#[derive(Debug, Clone, Copy)]
pub struct UpdateEvent<'a> {
    pub changed_assets: &'a ChangedAssets,
    pub graph: &'a dyn BundleGraph,
}

impl<'a> UpdateEvent<'a> {
    pub fn new(changed_assets: &'a ChangedAssets, graph: &'a dyn BundleGraph) -> Self {
        Self {
            changed_assets,
            graph,
        }
    }
}

/// A build-time diagnostic. Forwarded verbatim, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_frame: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_file(mut self, file_path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}
