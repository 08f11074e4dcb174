//! The calls the reporter makes outward.
//!
//! A pipeline plugs concrete network services in through [`Collaborators`],
//! which builds an [`AssetServer`] or [`UpdateChannel`] for a port. `start`
//! and `stop` are awaited before the reporter moves on, so no later event can
//! race a half-started service. Build-phase notifications and emits are plain
//! calls: they hand work to the service and return.

use crate::error::CollaboratorError;
use crate::event::{Diagnostic, UpdateEvent};
use crate::fs::FileSystem;
use crate::graph::BundleGraph;
use crate::logger::ReporterLogger;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Everything an asset server needs to come up on its port.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub port: u16,
    pub host: String,
    pub project_root: PathBuf,
    pub cache_dir: PathBuf,
    /// Where written bundles live; `<cache_dir>/dist`.
    pub dist_dir: PathBuf,
    pub public_url: String,
    pub input_fs: Arc<dyn FileSystem>,
    pub output_fs: Arc<dyn FileSystem>,
    pub logger: Arc<dyn ReporterLogger>,
}

/// Everything an update channel needs to come up on its port.
///
/// `dev_server` is set when the channel shares the port of a running server
/// and should attach to it instead of binding its own listener.
#[derive(Debug, Clone)]
pub struct ChannelOptions<H> {
    pub port: u16,
    pub host: String,
    pub dev_server: Option<H>,
    pub logger: Arc<dyn ReporterLogger>,
}

/// A dev server serving the build output.
#[async_trait]
pub trait AssetServer: Send + Sync {
    /// Returned by `start`; lets a co-located channel attach to this server.
    type Handle: Send;

    fn options(&self) -> &ServerOptions;

    async fn start(&self) -> CollaboratorResult<Self::Handle>;

    async fn stop(&self) -> CollaboratorResult<()>;

    /// A build is running; requests should wait for it rather than see stale output.
    fn build_start(&self);

    fn build_success(&self, graph: Arc<dyn BundleGraph>);

    fn build_error(&self, diagnostics: &[Diagnostic]);
}

/// A push channel to connected HMR clients.
#[async_trait]
pub trait UpdateChannel: Send + Sync {
    /// Port the channel was created for.
    fn port(&self) -> u16;

    async fn start(&self) -> CollaboratorResult<()>;

    async fn stop(&self) -> CollaboratorResult<()>;

    fn emit_update(&self, event: UpdateEvent<'_>) -> CollaboratorResult<()>;

    fn emit_error(&self, diagnostics: &[Diagnostic]) -> CollaboratorResult<()>;
}

/// Factory for the services the reporter drives.
pub trait Collaborators: Send + Sync {
    type Server: AssetServer;
    type Channel: UpdateChannel;

    fn create_server(&self, options: ServerOptions) -> Self::Server;

    fn create_channel(
        &self,
        options: ChannelOptions<<Self::Server as AssetServer>::Handle>,
    ) -> Self::Channel;
}
