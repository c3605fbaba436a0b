//! Error types for hostkeep-exec

use std::time::Duration;

use thiserror::Error;

/// Transport-level failures of a connector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// Connection not established
    #[error("not connected")]
    NotConnected,

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Binary is not on the search path
    #[error("binary not found: {0}")]
    BinaryNotFound(String),

    /// Operating system could not be identified
    #[error("failed to identify operating system: {0}")]
    OsDetection(String),

    /// File could not be read or written
    #[error("file access failed for {path}: {message}")]
    FileAccess {
        /// Path that was accessed
        path: String,
        /// Underlying error
        message: String,
    },
}

impl ExecError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecError::Timeout { .. } | ExecError::IoError(_))
    }
}
