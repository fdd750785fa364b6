//! Centralized error types for olmshell.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the olmshell library.
#[derive(Error, Debug)]
pub enum OlmError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified container file does not exist.
    #[error("OLM file not found: {0}")]
    FileNotFound(PathBuf),

    /// The container is not a well-formed compressed archive.
    ///
    /// This is the only fatal error of a conversion run.
    #[error("Invalid OLM file '{path}': {reason}")]
    InvalidContainer { path: PathBuf, reason: String },

    /// A located record could not be read (deleted, permission denied, ...).
    #[error("Could not read record '{path}': {source}")]
    RecordRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A message file could not be written.
    #[error("Could not write message '{path}': {reason}")]
    Emit { path: PathBuf, reason: String },

    /// The configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, OlmError>`.
pub type Result<T> = std::result::Result<T, OlmError>;

impl OlmError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an `InvalidContainer` variant.
    pub fn invalid_container(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidContainer {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// `true` for errors that abort a whole run rather than a single record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidContainer { .. } | Self::FileNotFound(_) | Self::Config(_)
        )
    }
}
