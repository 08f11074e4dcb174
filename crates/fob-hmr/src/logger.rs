//! Logging for the dev reporter.
//!
//! The reporter writes through a [`ReporterLogger`] handed to it with every
//! event, so a pipeline can route messages into its own reporting. The
//! default, [`TracingLogger`], forwards to `tracing`.
//!
//! # Example
//!
//! ```rust,no_run
//! use fob_hmr::logger::{init_logger, ReporterLogger, TracingLogger};
//!
//! init_logger(false, false, false);
//!
//! let logger = TracingLogger::new();
//! logger.verbose("Doing a fast HMR update");
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Leveled sink the reporter logs to.
pub trait ReporterLogger: Send + Sync + std::fmt::Debug {
    fn warn(&self, message: &str);

    fn info(&self, message: &str);

    /// Detail only interesting while debugging HMR decisions.
    fn verbose(&self, message: &str);
}

/// [`ReporterLogger`] backed by `tracing`. `verbose` maps to `DEBUG`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl ReporterLogger for TracingLogger {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "fob_hmr", "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "fob_hmr", "{}", message);
    }

    fn verbose(&self, message: &str) {
        tracing::debug!(target: "fob_hmr", "{}", message);
    }
}

/// Install the global tracing subscriber.
///
/// The level is picked in this order:
/// 1. `verbose`: DEBUG for fob crates
/// 2. `quiet`: ERROR only
/// 3. `RUST_LOG`
/// 4. INFO for fob crates
///
/// Returns `false` if a subscriber was already installed, which keeps this
/// safe to call from tests.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) -> bool {
    init_logger_with_filter(default_filter(verbose, quiet), no_color)
}

fn init_logger_with_filter(filter: EnvFilter, no_color: bool) -> bool {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

fn default_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("fob_hmr=debug,fob_dev_server=debug,fob_serve=debug")
    } else if quiet {
        EnvFilter::new("fob_hmr=error,fob_dev_server=error,fob_serve=error")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("fob_hmr=info,fob_dev_server=info,fob_serve=info"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_twice_is_harmless() {
        let _ = init_logger(false, true, true);
        assert!(!init_logger(false, true, true));
    }

    #[test]
    fn test_tracing_logger_does_not_panic_without_subscriber() {
        let logger = TracingLogger::new();
        logger.warn("warn");
        logger.info("info");
        logger.verbose("verbose");
    }

    #[test]
    fn test_verbose_filter_mentions_all_crates() {
        let filter = default_filter(true, false).to_string();
        assert!(filter.contains("fob_hmr=debug"));
        assert!(filter.contains("fob_dev_server=debug"));
    }
}
