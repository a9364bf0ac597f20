//! Sync errors.

use std::path::PathBuf;

use thiserror::Error;

/// Sync error types.
#[derive(Debug, Error)]
pub enum SyncError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source tree is missing.
    #[error("Source directory not found: {0}")]
    SourceMissing(PathBuf),

    /// Mirror destination is not configured.
    #[error("Mirror destination not configured: {0}")]
    NotConfigured(String),

    /// Exclude pattern does not compile.
    #[error("Invalid exclude pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Mirror command exited unsuccessfully.
    #[error("Command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    /// Mirror did not finish in time.
    #[error("Mirror timed out after {0}s")]
    Timeout(u64),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Reindex request was not accepted.
    #[error("Reindex trigger failed: {0}")]
    Trigger(String),

    /// Blocking task panicked or was cancelled.
    #[error("Mirror task aborted: {0}")]
    TaskAborted(String),
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::TaskAborted(e.to_string())
    }
}
