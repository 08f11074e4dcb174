//! Errors of the `fob-serve` binary.

use fob_hmr::{ConfigError, ReporterError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Reporter(#[from] ReporterError),

    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T, E = ServeError> = std::result::Result<T, E>;

/// Convert a serve error into a report for display at exit.
pub fn to_miette(err: ServeError) -> miette::Report {
    match err {
        ServeError::Config(e) => miette::miette!("Configuration error: {}", e),
        ServeError::DirectoryNotFound(path) => miette::miette!(
            "Directory not found: {}\n\nHint: Run a build first or pass --dist <DIR>",
            path.display()
        ),
        ServeError::Reporter(ReporterError::Collaborator { role, port, source }) => {
            miette::miette!(
                "{} on port {} failed: {}\n\nHint: Is another process using the port?",
                role,
                port,
                source
            )
        }
        other => miette::miette!("{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fob_hmr::{CollaboratorError, Role};

    #[test]
    fn test_collaborator_failure_report_mentions_port() {
        let err = ServeError::Reporter(ReporterError::Collaborator {
            role: Role::Server,
            port: 1234,
            source: CollaboratorError::Closed,
        });
        let report = format!("{}", to_miette(err));
        assert!(report.contains("Dev server on port 1234"));
        assert!(report.contains("Hint:"));
    }

    #[test]
    fn test_missing_directory_report_has_hint() {
        let report = format!("{}", to_miette(ServeError::DirectoryNotFound("dist".into())));
        assert!(report.contains("dist"));
        assert!(report.contains("--dist"));
    }
}
