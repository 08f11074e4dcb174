//! The `fob-serve` session: watch the output directory and drive a
//! [`DevReporter`] with the resulting lifecycle events.
//!
//! The reporter is owned by this one task. The watcher's thread feeds it
//! through a channel, so events always reach `report` one at a time.

use crate::cli::Cli;
use crate::collaborators::AxumCollaborators;
use crate::error::{Result, ServeError};
use crate::pipeline::DirectoryPipeline;
use crate::watcher::FileWatcher;
use fob_hmr::{BuildEvent, DevOptions, DevReporter, ReportContext};
use std::path::PathBuf;

/// Run a session until Ctrl+C or the watcher goes away.
pub async fn execute(cli: Cli) -> Result<()> {
    let mut options = DevOptions::load(cli.config.as_deref())?;
    cli.apply(&mut options)?;

    let dist_dir = resolve(&options.project_root, options.dist_dir());
    let dist_dir = tokio::fs::canonicalize(&dist_dir)
        .await
        .map_err(|_| ServeError::DirectoryNotFound(dist_dir.clone()))?;
    options.dist_dir = Some(dist_dir.clone());

    let ctx = ReportContext::new(options);
    let pipeline = DirectoryPipeline::new(dist_dir.clone(), ctx.output_fs.clone());
    let mut watcher = FileWatcher::new(dist_dir, cli.ignore.clone(), cli.debounce())?;
    tracing::info!("Watching for changes in {}", watcher.root().display());

    let mut reporter = DevReporter::new(AxumCollaborators);
    reporter.report(&BuildEvent::WatchStart, &ctx).await?;

    let session = async {
        run_build(&mut reporter, &ctx, &pipeline, &[]).await?;

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                batch = watcher.next_batch() => {
                    let Some(batch) = batch else {
                        tracing::warn!("File watcher stopped");
                        break;
                    };
                    for change in &batch {
                        tracing::debug!(path = %change.path().display(), "File changed");
                    }
                    run_build(&mut reporter, &ctx, &pipeline, &batch).await?;
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutting down development server...");
                    break;
                }
            }
        }
        Ok::<(), ServeError>(())
    };
    let result = session.await;

    reporter.report(&BuildEvent::WatchEnd, &ctx).await?;
    result
}

async fn run_build(
    reporter: &mut DevReporter<AxumCollaborators>,
    ctx: &ReportContext,
    pipeline: &DirectoryPipeline,
    changes: &[crate::watcher::FileChange],
) -> Result<()> {
    for event in pipeline.build(changes).await {
        match &event {
            BuildEvent::BuildSuccess {
                changed_assets,
                build_time,
                ..
            } => tracing::info!(
                changed = changed_assets.len(),
                "Build completed in {}ms",
                build_time.as_millis()
            ),
            BuildEvent::BuildFailure { diagnostics } => {
                for diagnostic in diagnostics {
                    tracing::error!("{}", diagnostic.message);
                }
            }
            _ => {}
        }
        reporter.report(&event, ctx).await?;
    }
    Ok(())
}

fn resolve(root: &std::path::Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}
