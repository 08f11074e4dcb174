//! # fob-dev-server
//!
//! Concrete collaborators for [`fob_hmr::DevReporter`]: an axum dev server
//! ([`DevServer`]) and an SSE update channel ([`HmrChannel`]), created
//! through [`AxumCollaborators`].
//!
//! ```rust,ignore
//! use fob_dev_server::AxumCollaborators;
//! use fob_hmr::{BuildEvent, DevReporter, ReportContext};
//!
//! let mut reporter = DevReporter::new(AxumCollaborators);
//! reporter.report(&BuildEvent::WatchStart, &ctx).await?;
//! ```
//!
//! The `fob-serve` binary wires these to a watched output directory.

pub mod cli;
pub mod collaborators;
pub mod error;
pub mod hmr;
mod listener;
pub mod message;
pub mod overlay;
pub mod pipeline;
pub mod serve;
pub mod server;
pub mod state;
pub mod watcher;

pub use collaborators::AxumCollaborators;
pub use error::{Result, ServeError};
pub use hmr::{HMR_CLIENT_PATH, HMR_PATH, HmrChannel, HmrHub};
pub use message::{HmrAsset, HmrMessage};
pub use pipeline::DirectoryPipeline;
pub use server::{DevServer, DevServerHandle, build_router};
pub use state::{BuildStatus, ServerState, SharedState};
pub use watcher::{FileChange, FileWatcher};
