//! Error types for bizintel.
//!
//! Library crates use [`BizIntelError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::job::JobId;

/// Top-level error type for all bizintel operations.
#[derive(Debug, thiserror::Error)]
pub enum BizIntelError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to an external backend.
    #[error("network error: {0}")]
    Network(String),

    /// The generative backend failed or returned an unusable response.
    #[error("generation error: {0}")]
    Generation(String),

    /// Database or record store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed request: missing mandatory fields, empty batch, bad columns.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A batch input file could not be read or decoded.
    #[error("input error: {0}")]
    Input(String),

    /// Status query for a job id the store has never seen (or has evicted).
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// Report rendering error.
    #[error("export error: {0}")]
    Export(String),

    /// A background job worker stopped without settling its job.
    #[error("job error: {0}")]
    Job(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BizIntelError>;

impl BizIntelError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a storage error from any displayable value.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is the caller's fault rather than a backend fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::JobNotFound(_))
    }
}
