//! The dev reporter: build lifecycle events in, server and channel calls out.
//!
//! The reporter keeps no state between events besides its two registries.
//! Whether a server or update channel runs on a port is decided by looking
//! it up, every time.

use crate::collab::{AssetServer, ChannelOptions, Collaborators, ServerOptions, UpdateChannel};
use crate::error::{CollaboratorResultExt, Result, Role};
use crate::event::{BuildEvent, Diagnostic, ProgressPhase, UpdateEvent};
use crate::fs::{FileSystem, NativeFileSystem};
use crate::graph::{BundleGraph, ChangedAssets};
use crate::logger::{ReporterLogger, TracingLogger};
use crate::options::{DevOptions, ServeOptions};
use crate::registry::Registry;
use crate::safety::find_unsafe_dependency;
use std::sync::Arc;

/// Options and handles accompanying every event.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub options: DevOptions,
    pub input_fs: Arc<dyn FileSystem>,
    pub output_fs: Arc<dyn FileSystem>,
    pub logger: Arc<dyn ReporterLogger>,
}

impl ReportContext {
    /// Native filesystem for both inputs and outputs, logging through `tracing`.
    pub fn new(options: DevOptions) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(NativeFileSystem::new());
        Self {
            options,
            input_fs: fs.clone(),
            output_fs: fs,
            logger: Arc::new(TracingLogger::new()),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn ReporterLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Server options for `serve`: general options merged with the serve overrides.
    pub fn server_options(&self, serve: &ServeOptions) -> ServerOptions {
        ServerOptions {
            port: serve.port,
            host: serve.host.clone(),
            project_root: self.options.project_root.clone(),
            cache_dir: self.options.cache_dir.clone(),
            dist_dir: self.options.dist_dir(),
            public_url: serve.public_url().to_string(),
            input_fs: self.input_fs.clone(),
            output_fs: self.output_fs.clone(),
            logger: self.logger.clone(),
        }
    }
}

/// Port an event is about: the dev server's, else the HMR channel's.
fn report_port(options: &DevOptions) -> Option<u16> {
    options
        .serve
        .as_ref()
        .map(|serve| serve.port)
        .or_else(|| options.hmr_port())
}

/// Keeps dev servers and HMR channels in step with the build lifecycle.
///
/// Events must be fed one at a time, in pipeline order; `report` takes
/// `&mut self` so that two events can never be processed concurrently.
pub struct DevReporter<C: Collaborators> {
    collaborators: C,
    servers: Registry<C::Server>,
    channels: Registry<C::Channel>,
}

impl<C: Collaborators> DevReporter<C> {
    pub fn new(collaborators: C) -> Self {
        Self::with_registries(collaborators, Registry::new(), Registry::new())
    }

    /// Build a reporter around existing registries.
    pub fn with_registries(
        collaborators: C,
        servers: Registry<C::Server>,
        channels: Registry<C::Channel>,
    ) -> Self {
        Self {
            collaborators,
            servers,
            channels,
        }
    }

    pub fn servers(&self) -> &Registry<C::Server> {
        &self.servers
    }

    pub fn channels(&self) -> &Registry<C::Channel> {
        &self.channels
    }

    /// Handle one build lifecycle event.
    ///
    /// Missing servers or channels are logged and skipped. Failures from the
    /// collaborators themselves are returned.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(event = event.kind(), port = report_port(&ctx.options))
    )]
    pub async fn report(&mut self, event: &BuildEvent, ctx: &ReportContext) -> Result<()> {
        match event {
            BuildEvent::WatchStart => self.watch_start(ctx).await,
            BuildEvent::WatchEnd => self.watch_end(ctx).await,
            BuildEvent::BuildStart => {
                if let Some(server) = self.server(&ctx.options) {
                    server.build_start();
                }
                Ok(())
            }
            BuildEvent::BuildProgress(phase) => self.build_progress(phase, ctx),
            BuildEvent::BuildSuccess {
                graph,
                changed_assets,
                ..
            } => self.build_success(graph, changed_assets, ctx),
            BuildEvent::BuildFailure { diagnostics } => self.build_failure(diagnostics, ctx),
        }
    }

    fn server(&self, options: &DevOptions) -> Option<&C::Server> {
        options
            .serve
            .as_ref()
            .and_then(|serve| self.servers.get(serve.port))
    }

    fn channel(&self, options: &DevOptions) -> Option<&C::Channel> {
        options.hmr_port().and_then(|port| self.channels.get(port))
    }

    async fn watch_start(&mut self, ctx: &ReportContext) -> Result<()> {
        let options = &ctx.options;

        if let Some(serve) = &options.serve {
            if self.servers.contains(serve.port) {
                ctx.logger
                    .warn("Trying to create the devserver but it already exists.");
                return Ok(());
            }

            let server = self.collaborators.create_server(ctx.server_options(serve));
            let handle = server.start().await.for_collaborator(Role::Server, serve.port)?;
            self.servers.insert(serve.port, server);
            ctx.logger.info(&format!(
                "Dev server running at http://{}:{}",
                serve.host, serve.port
            ));

            if options.is_hmr_colocated() {
                let channel_options = ChannelOptions {
                    port: serve.port,
                    host: serve.host.clone(),
                    dev_server: Some(handle),
                    logger: ctx.logger.clone(),
                };
                return self.start_channel(channel_options, ctx).await;
            }
        }

        if let Some(port) = options.independent_hmr_port() {
            let channel_options = ChannelOptions {
                port,
                host: options.hmr_host(),
                dev_server: None,
                logger: ctx.logger.clone(),
            };
            self.start_channel(channel_options, ctx).await?;
        } else if options.hmr_enabled() && options.serve.is_none() {
            ctx.logger
                .warn("HMR is enabled but there is no dev server or HMR port to attach it to.");
        }

        Ok(())
    }

    async fn start_channel(
        &mut self,
        options: ChannelOptions<<C::Server as AssetServer>::Handle>,
        ctx: &ReportContext,
    ) -> Result<()> {
        let port = options.port;
        if self.channels.contains(port) {
            ctx.logger
                .warn("Trying to create the HMR server but it already exists.");
            return Ok(());
        }

        let channel = self.collaborators.create_channel(options);
        channel.start().await.for_collaborator(Role::UpdateChannel, port)?;
        self.channels.insert(port, channel);
        ctx.logger.verbose(&format!("HMR channel listening on port {}", port));
        Ok(())
    }

    async fn watch_end(&mut self, ctx: &ReportContext) -> Result<()> {
        let options = &ctx.options;

        if let Some(serve) = &options.serve {
            match self.servers.get(serve.port) {
                None => ctx
                    .logger
                    .warn("Could not shutdown devserver because it does not exist."),
                Some(server) => {
                    // Keyed by the port the server recorded, not the one in this event.
                    let port = server.options().port;
                    server.stop().await.for_collaborator(Role::Server, port)?;
                    self.servers.remove(port);
                }
            }
        }

        if let Some(channel) = self.channel(options) {
            let port = channel.port();
            channel
                .stop()
                .await
                .for_collaborator(Role::UpdateChannel, port)?;
            self.channels.remove(port);
        }

        Ok(())
    }

    fn build_progress(&self, phase: &ProgressPhase, ctx: &ReportContext) -> Result<()> {
        let ProgressPhase::Bundled {
            changed_assets,
            graph,
        } = phase
        else {
            return Ok(());
        };
        let Some(channel) = self.channel(&ctx.options) else {
            return Ok(());
        };

        match find_unsafe_dependency(changed_assets, graph.as_ref()) {
            None => {
                ctx.logger.verbose("Doing a fast HMR update");
                channel
                    .emit_update(UpdateEvent::new(changed_assets, graph.as_ref()))
                    .for_collaborator(Role::UpdateChannel, channel.port())
            }
            Some(dependency) => {
                ctx.logger.verbose(&format!(
                    "Bailed out of fast HMR update: '{}' in {} loads a bundle group",
                    dependency.specifier, dependency.source_asset_id
                ));
                Ok(())
            }
        }
    }

    fn build_success(
        &self,
        graph: &Arc<dyn BundleGraph>,
        changed_assets: &ChangedAssets,
        ctx: &ReportContext,
    ) -> Result<()> {
        if ctx.options.serve.is_some() {
            match self.server(&ctx.options) {
                Some(server) => server.build_success(graph.clone()),
                None => ctx.logger.warn(
                    "Could not send success event to devserver because it does not exist.",
                ),
            }
        }

        // Always sent, whatever the bundled phase decided.
        if let Some(channel) = self.channel(&ctx.options) {
            channel
                .emit_update(UpdateEvent::new(changed_assets, graph.as_ref()))
                .for_collaborator(Role::UpdateChannel, channel.port())?;
        }

        Ok(())
    }

    fn build_failure(&self, diagnostics: &[Diagnostic], ctx: &ReportContext) -> Result<()> {
        // A failure can arrive before watchStart ran; missing instances are expected here.
        if let Some(server) = self.server(&ctx.options) {
            server.build_error(diagnostics);
        }

        if let Some(channel) = self.channel(&ctx.options) {
            channel
                .emit_error(diagnostics)
                .for_collaborator(Role::UpdateChannel, channel.port())?;
        }

        Ok(())
    }
}
