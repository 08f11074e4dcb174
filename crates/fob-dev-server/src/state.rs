//! Shared state for the development server.
//!
//! The reporter-facing [`crate::DevServer`] writes build status here and the
//! HTTP handlers read it. Status lives in a `tokio::sync::watch` channel so
//! a request arriving mid-build can wait for the outcome instead of serving
//! stale output.

use crate::hmr::HmrHub;
use fob_hmr::{BundleGraph, Diagnostic, ServerOptions};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Build status tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// No build has been performed yet
    NotStarted,
    /// Build is currently in progress
    InProgress { started_at: Instant },
    /// Build completed successfully
    Success { finished_at: Instant },
    /// Build failed
    Failed { diagnostics: Vec<Diagnostic> },
}

impl BuildStatus {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, BuildStatus::InProgress { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success { .. })
    }

    pub fn diagnostics(&self) -> Option<&[Diagnostic]> {
        match self {
            BuildStatus::Failed { diagnostics } => Some(diagnostics),
            _ => None,
        }
    }
}

/// Shared development server state.
pub struct ServerState {
    options: ServerOptions,
    status: watch::Sender<BuildStatus>,
    graph: RwLock<Option<Arc<dyn BundleGraph>>>,
    hub: HmrHub,
}

/// Shared state handle for passing around the application.
pub type SharedState = Arc<ServerState>;

impl ServerState {
    pub fn new(options: ServerOptions, hub: HmrHub) -> Self {
        let (status, _) = watch::channel(BuildStatus::NotStarted);
        Self {
            options,
            status,
            graph: RwLock::new(None),
            hub,
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn hub(&self) -> &HmrHub {
        &self.hub
    }

    pub fn start_build(&self) {
        self.status.send_replace(BuildStatus::InProgress {
            started_at: Instant::now(),
        });
    }

    pub fn complete_build(&self, graph: Arc<dyn BundleGraph>) {
        *self.graph.write() = Some(graph);
        self.status.send_replace(BuildStatus::Success {
            finished_at: Instant::now(),
        });
    }

    pub fn fail_build(&self, diagnostics: Vec<Diagnostic>) {
        self.status
            .send_replace(BuildStatus::Failed { diagnostics });
    }

    /// Release requests waiting on a build that will never finish.
    pub fn abandon_build(&self) {
        self.status.send_if_modified(|status| {
            if status.is_in_progress() {
                *status = BuildStatus::NotStarted;
                true
            } else {
                false
            }
        });
    }

    pub fn status(&self) -> BuildStatus {
        self.status.borrow().clone()
    }

    /// Current status once no build is in progress, or after `timeout`.
    pub async fn wait_for_build(&self, timeout: Duration) -> BuildStatus {
        let mut rx = self.status.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|s| !s.is_in_progress())).await {
            Ok(Ok(status)) => status.clone(),
            _ => self.status(),
        }
    }

    pub fn graph(&self) -> Option<Arc<dyn BundleGraph>> {
        self.graph.read().clone()
    }

    /// Name of the first HTML entry bundle of the last successful build.
    pub fn entry_html(&self) -> Option<String> {
        self.graph()?
            .bundles()
            .into_iter()
            .find(|bundle| bundle.is_entry && bundle.bundle_type == "html")
            .map(|bundle| bundle.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fob_hmr::{Bundle, MemoryBundleGraph, NativeFileSystem, TracingLogger};
    use std::path::PathBuf;

    fn state() -> ServerState {
        let fs = Arc::new(NativeFileSystem::new());
        let options = ServerOptions {
            port: 1234,
            host: "127.0.0.1".into(),
            project_root: PathBuf::from("."),
            cache_dir: PathBuf::from(".fob-cache"),
            dist_dir: PathBuf::from(".fob-cache/dist"),
            public_url: "/".into(),
            input_fs: fs.clone(),
            output_fs: fs,
            logger: Arc::new(TracingLogger::new()),
        };
        ServerState::new(options, HmrHub::new())
    }

    #[test]
    fn test_build_status_failed() {
        let status = BuildStatus::Failed {
            diagnostics: vec![Diagnostic::new("Test error")],
        };
        assert!(!status.is_in_progress());
        assert!(!status.is_success());
        assert_eq!(status.diagnostics().map(|d| d.len()), Some(1));
    }

    #[test]
    fn test_build_lifecycle() {
        let state = state();
        assert_eq!(state.status(), BuildStatus::NotStarted);

        state.start_build();
        assert!(state.status().is_in_progress());

        state.complete_build(Arc::new(MemoryBundleGraph::new()));
        assert!(state.status().is_success());

        state.fail_build(vec![Diagnostic::new("Test error")]);
        assert!(state.status().diagnostics().is_some());
    }

    #[tokio::test]
    async fn test_wait_for_build_returns_outcome() {
        let state = Arc::new(state());
        state.start_build();

        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.wait_for_build(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        state.fail_build(vec![Diagnostic::new("nope")]);

        let status = waiter.await.expect("join");
        assert_eq!(status.diagnostics().map(|d| d[0].message.as_str()), Some("nope"));
    }

    #[tokio::test]
    async fn test_wait_for_build_times_out() {
        let state = state();
        state.start_build();

        let status = state.wait_for_build(Duration::from_millis(20)).await;
        assert!(status.is_in_progress());
    }

    #[test]
    fn test_abandon_only_resets_in_progress() {
        let state = state();
        state.fail_build(vec![Diagnostic::new("kept")]);
        state.abandon_build();
        assert!(state.status().diagnostics().is_some());

        state.start_build();
        state.abandon_build();
        assert_eq!(state.status(), BuildStatus::NotStarted);
    }

    #[test]
    fn test_entry_html_picks_first_html_entry() {
        let state = state();
        assert_eq!(state.entry_html(), None);

        let mut graph = MemoryBundleGraph::new();
        graph
            .add_bundle(Bundle {
                id: "js".into(),
                bundle_type: "js".into(),
                name: "index.js".into(),
                is_entry: true,
            })
            .add_bundle(Bundle {
                id: "html".into(),
                bundle_type: "html".into(),
                name: "app/index.html".into(),
                is_entry: true,
            });
        state.complete_build(Arc::new(graph));

        assert_eq!(state.entry_html().as_deref(), Some("app/index.html"));
    }
}
