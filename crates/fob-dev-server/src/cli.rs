//! Command-line interface of `fob-serve`.
//!
//! Flags are layered over the options loaded from `fob.dev.json` and
//! `FOB_DEV_*` variables.

use crate::error::{Result, ServeError};
use clap::Parser;
use fob_hmr::{DevOptions, HmrOptions, ServeOptions};
use std::path::PathBuf;
use std::time::Duration;

/// Port used when neither the config nor the flags ask for anything.
pub const DEFAULT_PORT: u16 = 1234;

/// Serve a build output directory with hot module replacement
#[derive(Parser, Debug)]
#[command(
    name = "fob-serve",
    version,
    about = "Serve a build output directory with hot module replacement",
    long_about = "Watches a directory of built bundles, serves it over HTTP and pushes\n\
                  changed assets to connected browsers over Server-Sent Events."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Config file (defaults to fob.dev.json when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Project root; `public/` under it is served as well
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Directory holding the built output (defaults to <cache_dir>/dist)
    #[arg(short, long, value_name = "DIR")]
    pub dist: Option<PathBuf>,

    /// Port for the dev server
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Host to bind the dev server to
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Public URL prefix the output is served under
    #[arg(long, value_name = "URL")]
    pub public_url: Option<String>,

    /// Enable hot module replacement
    #[arg(long, conflicts_with = "no_hot")]
    pub hot: bool,

    /// Run the HMR channel on its own port
    #[arg(long, value_name = "PORT", conflicts_with = "no_hot")]
    pub hmr_port: Option<u16>,

    /// Disable hot module replacement
    #[arg(long)]
    pub no_hot: bool,

    /// Milliseconds to wait for a burst of file writes to settle
    #[arg(long, default_value = "100", value_name = "MS")]
    pub debounce_ms: u64,

    /// Paths to ignore in the watched directory (`*.ext` or a directory name)
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,
}

impl Cli {
    /// Apply flags on top of loaded options and validate the result.
    pub fn apply(&self, options: &mut DevOptions) -> Result<()> {
        if let Some(cwd) = &self.cwd {
            options.project_root = cwd.clone();
        }
        if let Some(dist) = &self.dist {
            options.dist_dir = Some(dist.clone());
        }

        if let Some(port) = self.port {
            match options.serve.as_mut() {
                Some(serve) => serve.port = port,
                None => options.serve = Some(ServeOptions::new(port)),
            }
        }

        if self.host.is_some() || self.public_url.is_some() {
            let serve = options.serve.as_mut().ok_or_else(|| {
                ServeError::InvalidArgument(
                    "--host and --public-url need a dev server; pass --port".to_string(),
                )
            })?;
            if let Some(host) = &self.host {
                serve.host = host.clone();
            }
            if let Some(public_url) = &self.public_url {
                serve.public_url = Some(public_url.clone());
            }
        }

        if self.no_hot {
            options.hot = Some(HmrOptions::Enabled(false));
        } else if let Some(port) = self.hmr_port {
            options.hot = Some(HmrOptions::port(port));
        } else if self.hot {
            options.hot = Some(HmrOptions::Enabled(true));
        }

        if options.serve.is_none() && options.hot.is_none() {
            options.serve = Some(ServeOptions::new(DEFAULT_PORT));
            options.hot = Some(HmrOptions::Enabled(true));
        }

        options.validate()?;
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
