//! Monitor errors.

use thiserror::Error;

/// Monitor error types.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Alert channel error.
    #[error("Alert error: {0}")]
    Alert(String),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Restart ledger could not be read or written.
    #[error("Restart ledger error: {0}")]
    Ledger(String),

    /// Configuration value the monitor cannot use.
    #[error(transparent)]
    Config(#[from] caretaker_config::ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Core capability error.
    #[error(transparent)]
    Core(#[from] caretaker_core::CoreError),
}
