//! Backup errors.

use std::path::PathBuf;

use thiserror::Error;

/// Backup error types.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The volume to snapshot is missing or not a directory.
    #[error("Volume unavailable: {}", .0.display())]
    VolumeUnavailable(PathBuf),

    /// Snapshot not found.
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// Archive creation or extraction failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// A blocking archive task panicked or was cancelled.
    #[error("Archive task aborted: {0}")]
    TaskAborted(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for BackupError {
    fn from(e: tokio::task::JoinError) -> Self {
        BackupError::TaskAborted(e.to_string())
    }
}
