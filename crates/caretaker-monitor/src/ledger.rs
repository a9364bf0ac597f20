//! Persisted restart ledger.
//!
//! A bounded ring buffer of restart attempts stored at
//! `<root>/state/restarts.json`. The restart ceiling is computed from this
//! file rather than from log contents, so log truncation never resets it.

use std::collections::VecDeque;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MonitorError;

/// Maximum number of attempts kept.
pub const LEDGER_CAPACITY: usize = 64;

/// Whether a start/restart command took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartOutcome {
    Started,
    Failed,
}

impl std::fmt::Display for RestartOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartOutcome::Started => write!(f, "started"),
            RestartOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// One start or restart of the managed process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartAttempt {
    pub timestamp: NaiveDateTime,
    pub reason: String,
    pub outcome: RestartOutcome,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    attempts: VecDeque<RestartAttempt>,
}

/// Restart attempts, oldest first.
#[derive(Debug)]
pub struct RestartLedger {
    path: PathBuf,
    capacity: usize,
    attempts: VecDeque<RestartAttempt>,
    dirty: bool,
}

impl RestartLedger {
    /// Load the ledger at `path`.
    ///
    /// A missing file is an empty ledger. An unreadable one is moved aside
    /// to `<path>.corrupt` and replaced by an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MonitorError> {
        let path = path.into();
        let attempts = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<LedgerFile>(&content) {
                Ok(file) => file.attempts,
                Err(e) => {
                    let aside = path.with_extension("json.corrupt");
                    warn!(
                        "Restart ledger {} is corrupt ({}), moving it to {}",
                        path.display(),
                        e,
                        aside.display()
                    );
                    fs::rename(&path, &aside)?;
                    VecDeque::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => VecDeque::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self::with_attempts(path, attempts))
    }

    /// Read the ledger without touching the file. A corrupt file is an error.
    pub fn read(path: impl Into<PathBuf>) -> Result<Self, MonitorError> {
        let path = path.into();
        let attempts = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<LedgerFile>(&content)
                .map_err(|e| MonitorError::Ledger(format!("{}: {}", path.display(), e)))?
                .attempts,
            Err(e) if e.kind() == ErrorKind::NotFound => VecDeque::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self::with_attempts(path, attempts))
    }

    fn with_attempts(path: PathBuf, attempts: VecDeque<RestartAttempt>) -> Self {
        let mut ledger = Self {
            path,
            capacity: LEDGER_CAPACITY,
            attempts,
            dirty: false,
        };
        ledger.trim();
        ledger
    }

    /// Ledger file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All attempts, oldest first.
    pub fn attempts(&self) -> impl Iterator<Item = &RestartAttempt> {
        self.attempts.iter()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Append an attempt, evicting the oldest beyond capacity.
    pub fn record(&mut self, attempt: RestartAttempt) {
        self.attempts.push_back(attempt);
        self.trim();
        self.dirty = true;
    }

    /// Whether attempts were recorded since the last load or save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Attempts with outcome `started` at or after `now - window`.
    pub fn started_within(&self, now: NaiveDateTime, window: Duration) -> usize {
        let cutoff = now - window;
        self.attempts
            .iter()
            .filter(|a| a.outcome == RestartOutcome::Started && a.timestamp >= cutoff)
            .count()
    }

    /// Write the ledger through a temp file and rename.
    pub fn save(&mut self) -> Result<(), MonitorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = LedgerFile {
            attempts: self.attempts.clone(),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| MonitorError::Ledger(format!("Failed to serialize ledger: {}", e)))?;

        let tmp = self.path.with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        self.dirty = false;

        debug!("Saved {} restart attempts to {:?}", self.attempts.len(), self.path);
        Ok(())
    }

    fn trim(&mut self) {
        while self.attempts.len() > self.capacity {
            self.attempts.pop_front();
        }
    }
}
