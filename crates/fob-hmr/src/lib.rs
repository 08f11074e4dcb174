//! # fob-hmr
//!
//! Keeps a dev server and an HMR update channel in step with a build
//! pipeline's lifecycle events, and decides for every rebuild whether a fast
//! incremental update is safe to push.
//!
//! ## Architecture
//!
//! ```text
//!   build pipeline
//!        │ BuildEvent (one at a time)
//!        ▼
//! ┌──────────────────┐   is_safe_for_fast_update()   ┌──────────────┐
//! │   DevReporter    │ ────────────────────────────▶ │ BundleGraph  │
//! │ (event machine)  │                               └──────────────┘
//! └──┬────────────┬──┘
//!    │            │
//!    ▼            ▼
//! Registry<     Registry<
//!  Server>       Channel>
//!    │            │
//!    ▼            ▼
//! AssetServer  UpdateChannel      (provided through `Collaborators`)
//! ```
//!
//! The network services themselves are not part of this crate. Anything
//! implementing [`Collaborators`] can be driven; `fob-dev-server` provides an
//! axum server and an SSE update channel.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fob_hmr::{BuildEvent, DevOptions, DevReporter, ReportContext, ServeOptions};
//!
//! let options = DevOptions {
//!     serve: Some(ServeOptions::new(1234)),
//!     ..DevOptions::default()
//! };
//! let ctx = ReportContext::new(options);
//! let mut reporter = DevReporter::new(my_collaborators);
//!
//! reporter.report(&BuildEvent::WatchStart, &ctx).await?;
//! reporter.report(&BuildEvent::BuildStart, &ctx).await?;
//! ```

pub mod collab;
pub mod error;
pub mod event;
pub mod fs;
pub mod graph;
pub mod logger;
pub mod options;
pub mod registry;
pub mod reporter;
pub mod safety;

pub use collab::{
    AssetServer, ChannelOptions, CollaboratorResult, Collaborators, ServerOptions, UpdateChannel,
};
pub use error::{CollaboratorError, ConfigError, ReporterError, Result, Role};
pub use event::{BuildEvent, Diagnostic, ProgressPhase, UpdateEvent};
pub use fs::{FileSystem, NativeFileSystem};
pub use graph::{
    Asset, AssetId, Bundle, BundleGraph, BundleGroup, ChangedAssets, Dependency,
    ExternalResolution, MemoryBundleGraph,
};
pub use logger::{ReporterLogger, TracingLogger};
pub use options::{DevOptions, HmrConfig, HmrOptions, ServeOptions};
pub use registry::Registry;
pub use reporter::{DevReporter, ReportContext};
pub use safety::{find_unsafe_dependency, is_safe_for_fast_update};
