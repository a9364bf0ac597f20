//! On-disk layout under the supervisor root.
//!
//! ```text
//! {root}/
//! ├── logs/
//! │   ├── health.log
//! │   ├── alerts.log
//! │   ├── memory.log
//! │   ├── backup.log
//! │   ├── sync.log
//! │   └── debug/          (tracing output)
//! ├── backups/
//! │   └── {service}-{YYYYMMDD_HHMMSS}.tar.gz
//! └── state/
//!     └── restarts.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clock::Clock;
use crate::journal::{Journal, LogCap};

/// The durable logs the supervisor writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Health,
    Alerts,
    Memory,
    Backup,
    Sync,
}

impl LogKind {
    /// File name inside the logs directory.
    pub fn file_name(self) -> &'static str {
        match self {
            LogKind::Health => "health.log",
            LogKind::Alerts => "alerts.log",
            LogKind::Memory => "memory.log",
            LogKind::Backup => "backup.log",
            LogKind::Sync => "sync.log",
        }
    }
}

/// Paths derived from the supervisor root directory.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Directory for rolling tracing output.
    pub fn debug_dir(&self) -> PathBuf {
        self.logs_dir().join("debug")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn log_path(&self, kind: LogKind) -> PathBuf {
        self.logs_dir().join(kind.file_name())
    }

    pub fn restart_ledger_path(&self) -> PathBuf {
        self.state_dir().join("restarts.json")
    }

    /// Open the journal for `kind`.
    pub fn journal(&self, kind: LogKind, cap: LogCap, clock: Arc<dyn Clock>) -> Journal {
        Journal::new(self.log_path(kind), cap, clock)
    }

    /// Create every directory of the layout.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.backups_dir())?;
        std::fs::create_dir_all(self.state_dir())?;
        Ok(())
    }
}
