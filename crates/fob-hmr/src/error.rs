//! Error types for the dev reporter.
//!
//! Three kinds of trouble show up while orchestrating a watch session:
//!
//! - **Protocol misuse** (an event for a port with nothing running) is not an
//!   error at all here. It is logged as a warning and ignored.
//! - **Collaborator failures** (a server or channel failing to start, stop or
//!   emit) are returned as [`ReporterError::Collaborator`] to whoever
//!   dispatched the event.
//! - **Build failures** are data ([`crate::Diagnostic`]) and are forwarded.

use std::fmt;
use thiserror::Error;

/// Top-level error returned by [`crate::DevReporter::report`].
#[derive(Debug, Error)]
pub enum ReporterError {
    /// A server or update channel call failed.
    #[error("{role} on port {port} failed: {source}")]
    Collaborator {
        role: Role,
        port: u16,
        #[source]
        source: CollaboratorError,
    },

    /// Dev options are invalid or could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    UpdateChannel,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => f.write_str("Dev server"),
            Role::UpdateChannel => f.write_str("HMR channel"),
        }
    }
}

/// Failures reported by collaborator implementations.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The collaborator was asked to act while not running.
    #[error("Not running")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        field: String,
        value: String,
        hint: String,
    },

    #[error("Failed to load dev options: {0}\n\nHint: Check fob.dev.json syntax and FOB_DEV_* variables")]
    Extract(#[from] Box<figment::Error>),
}

pub type Result<T, E = ReporterError> = std::result::Result<T, E>;

/// Attach the failing collaborator's role and port to a result.
pub(crate) trait CollaboratorResultExt<T> {
    fn for_collaborator(self, role: Role, port: u16) -> Result<T>;
}

impl<T> CollaboratorResultExt<T> for std::result::Result<T, CollaboratorError> {
    fn for_collaborator(self, role: Role, port: u16) -> Result<T> {
        self.map_err(|source| ReporterError::Collaborator { role, port, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_message_names_role_and_port() {
        let result: std::result::Result<(), _> = Err(CollaboratorError::Closed);
        let err = result.for_collaborator(Role::UpdateChannel, 5678).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("HMR channel"));
        assert!(msg.contains("5678"));
        assert!(msg.contains("Not running"));
    }

    #[test]
    fn test_bind_error_message() {
        let err = CollaboratorError::Bind {
            addr: "127.0.0.1:1234".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:1234"));
    }

    #[test]
    fn test_config_error_has_hint() {
        let err = ConfigError::InvalidValue {
            field: "serve.port".into(),
            value: "0".into(),
            hint: "Use a port between 1 and 65535".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("serve.port"));
        assert!(msg.contains("Hint:"));
    }
}
