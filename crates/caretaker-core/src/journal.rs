//! Size-capped, append-only line journal.
//!
//! Each call to [`Journal::append`] writes exactly one line with a single
//! `write` on a file opened in append mode, so concurrent writers from
//! separately scheduled tasks never interleave partial lines.
//!
//! Before appending, the journal checks the file size. Once it exceeds
//! [`LogCap::max_bytes`], the file is rewritten to its last
//! [`LogCap::keep_lines`] lines (via a temp file and rename) and the new
//! entry is appended after them.
//!
//! Truncate-then-append runs under an exclusive advisory lock on a sidecar
//! `.<name>.lock` file. The rename replaces the log's inode, so the lock
//! cannot live on the log itself.

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs4::fs_std::FileExt;
use tracing::debug;

use crate::clock::Clock;
use crate::error::CoreError;

/// Timestamp format used at the start of every journal line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Growth limits for a journal file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogCap {
    /// Size above which the file is truncated before the next append.
    pub max_bytes: u64,
    /// Number of most recent lines kept on truncation.
    pub keep_lines: usize,
}

impl Default for LogCap {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            keep_lines: 1000,
        }
    }
}

/// Append-only line log with an injectable clock and cap.
#[derive(Clone)]
pub struct Journal {
    path: PathBuf,
    cap: LogCap,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("path", &self.path)
            .field("cap", &self.cap)
            .finish()
    }
}

impl Journal {
    /// Create a journal writing to `path`.
    pub fn new(path: impl Into<PathBuf>, cap: LogCap, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            cap,
            clock,
        }
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The configured cap.
    pub fn cap(&self) -> LogCap {
        self.cap
    }

    /// Append one timestamped entry.
    ///
    /// Embedded newlines are flattened so one call always produces one line.
    pub fn append(&self, message: &str) -> Result<(), CoreError> {
        let _lock = self.lock()?;
        self.truncate_over_cap()?;

        let line = format!(
            "[{}] {}\n",
            self.clock.now().format(TIMESTAMP_FORMAT),
            message.replace(['\r', '\n'], " ")
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Truncate to the most recent lines if the file is over its size cap.
    ///
    /// Returns whether a truncation happened.
    pub fn enforce_cap(&self) -> Result<bool, CoreError> {
        let _lock = self.lock()?;
        self.truncate_over_cap()
    }

    /// Take the writer lock. Released when the returned file is dropped.
    fn lock(&self) -> Result<File, CoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.sidecar_path("lock"))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn truncate_over_cap(&self) -> Result<bool, CoreError> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        if size <= self.cap.max_bytes {
            return Ok(false);
        }

        let lines = self.lines()?;
        let start = lines.len().saturating_sub(self.cap.keep_lines);
        let mut kept = lines[start..].join("\n");
        if !kept.is_empty() {
            kept.push('\n');
        }

        let tmp = self.sidecar_path("tmp");
        fs::write(&tmp, kept)?;
        fs::rename(&tmp, &self.path)?;

        debug!(
            "Truncated {} from {} bytes to {} lines",
            self.path.display(),
            size,
            lines.len() - start
        );
        Ok(true)
    }

    /// All lines currently in the file; empty if it does not exist.
    pub fn lines(&self) -> Result<Vec<String>, CoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// The last `n` lines.
    pub fn tail(&self, n: usize) -> Result<Vec<String>, CoreError> {
        let mut lines = self.lines()?;
        let start = lines.len().saturating_sub(n);
        Ok(lines.split_off(start))
    }

    fn sidecar_path(&self, suffix: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "journal".to_string());
        self.path.with_file_name(format!(".{}.{}", name, suffix))
    }
}
