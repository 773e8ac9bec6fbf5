//! Tracker error handling
//!
//! Mesh reconciliation never fails: a provider reporting data the tracker
//! does not know is a benign race and is treated as a no-op. Errors only come
//! from the attach/detach state machine, configuration loading and the
//! geometry validation helper offered to providers.

use std::path::{Path, PathBuf};

/// Errors raised by the tracker and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("mesh tracker is not attached to a session")]
    NotAttached,

    #[error("mesh tracker is already attached to a session")]
    AlreadyAttached,

    #[error("mesh tracker has been disposed")]
    Disposed,

    #[error("failed to read config file {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("invalid mesh data: {reason}")]
    InvalidMesh { reason: String },
}

/// Type alias for tracker results
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Helper trait for attaching a file path to I/O failures
pub trait TrackerErrorContext<T> {
    fn path_context(self, path: &Path) -> TrackerResult<T>;
}

impl<T> TrackerErrorContext<T> for Result<T, std::io::Error> {
    fn path_context(self, path: &Path) -> TrackerResult<T> {
        self.map_err(|source| TrackerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Create an invalid-mesh error
pub fn invalid_mesh(reason: impl std::fmt::Display) -> TrackerError {
    TrackerError::InvalidMesh {
        reason: reason.to_string(),
    }
}

/// Create an invalid-config error
pub fn invalid_config(field: &'static str, reason: impl std::fmt::Display) -> TrackerError {
    TrackerError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}
