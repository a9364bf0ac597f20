//! One-way directory mirrors.
//!
//! Both implementations give the destination exactly the source's file
//! tree: new and changed files are copied and files no longer present in
//! the source are deleted. Entries whose name matches an exclude pattern are
//! neither copied nor deleted.

#[cfg(test)]
#[path = "mirror_tests.rs"]
mod tests;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use caretaker_config::SyncConfig;
use regex::Regex;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::SyncError;

/// What a mirror run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub transferred: usize,
    pub deleted: usize,
}

/// Mirror capability.
#[async_trait]
pub trait Mirror: Send + Sync {
    /// Human-readable destination, for logs.
    fn destination(&self) -> String;

    /// Make the destination an exact copy of `source`.
    async fn mirror(&self, source: &Path) -> Result<MirrorStats, SyncError>;
}

/// Build the mirror described by `config`.
///
/// `remote_host` selects rsync over ssh; without it `remote_path` is a local
/// directory.
pub fn mirror_from_config(config: &SyncConfig) -> Result<Box<dyn Mirror>, SyncError> {
    let path = config
        .remote_path
        .clone()
        .ok_or_else(|| SyncError::NotConfigured("sync.remote_path is not set".to_string()))?;

    let mirror: Box<dyn Mirror> = match config.remote_host {
        Some(ref host) => Box::new(
            RsyncMirror::new(host.clone(), path)
                .with_excludes(config.excludes.clone())
                .with_timeout(config.mirror_timeout()),
        ),
        None => Box::new(
            LocalMirror::new(path)
                .with_excludes(config.excludes.as_slice())?
                .with_timeout(config.mirror_timeout()),
        ),
    };
    Ok(mirror)
}

/// Mirror through `rsync -az --delete` to `host:path`.
#[derive(Debug, Clone)]
pub struct RsyncMirror {
    binary: String,
    host: String,
    path: String,
    excludes: Vec<String>,
    timeout: Duration,
}

impl RsyncMirror {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            binary: "rsync".to_string(),
            host: host.into(),
            path: path.into(),
            excludes: Vec::new(),
            timeout: Duration::from_secs(1800),
        }
    }

    /// Use a different rsync binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
        self.excludes = excludes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line arguments for mirroring `source`.
    pub fn args(&self, source: &Path) -> Vec<String> {
        let mut args = vec![
            "-az".to_string(),
            "--delete".to_string(),
            "--stats".to_string(),
        ];
        args.extend(self.excludes.iter().map(|e| format!("--exclude={}", e)));
        // Trailing slashes copy the contents of source, not the directory itself.
        args.push(format!("{}/", source.display().to_string().trim_end_matches('/')));
        args.push(format!("{}/", self.destination().trim_end_matches('/')));
        args
    }
}

#[async_trait]
impl Mirror for RsyncMirror {
    fn destination(&self) -> String {
        format!("{}:{}", self.host, self.path)
    }

    async fn mirror(&self, source: &Path) -> Result<MirrorStats, SyncError> {
        if !source.is_dir() {
            return Err(SyncError::SourceMissing(source.to_path_buf()));
        }

        let args = self.args(source);
        let command = format!("{} {}", self.binary, args.join(" "));
        debug!("Running {}", command);

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| SyncError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| SyncError::Command {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SyncError::Command {
                command,
                reason: format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }

        let stats = parse_rsync_stats(&String::from_utf8_lossy(&output.stdout));
        info!("Mirrored {} to {}", source.display(), self.destination());
        Ok(stats)
    }
}

/// Read file counts from `rsync --stats` output. Missing lines count as zero.
pub fn parse_rsync_stats(output: &str) -> MirrorStats {
    static TRANSFERRED: OnceLock<Option<Regex>> = OnceLock::new();
    static DELETED: OnceLock<Option<Regex>> = OnceLock::new();

    let count = |cell: &OnceLock<Option<Regex>>, pattern: &str| -> usize {
        cell.get_or_init(|| Regex::new(pattern).ok())
            .as_ref()
            .and_then(|re| re.captures(output))
            .and_then(|c| c[1].replace(',', "").parse().ok())
            .unwrap_or(0)
    };

    MirrorStats {
        transferred: count(
            &TRANSFERRED,
            r"Number of regular files transferred: ([\d,]+)",
        ),
        deleted: count(&DELETED, r"Number of deleted files: ([\d,]+)"),
    }
}

/// Mirror into a directory on this host.
#[derive(Debug, Clone)]
pub struct LocalMirror {
    dest: PathBuf,
    excludes: Vec<glob::Pattern>,
    timeout: Duration,
}

impl LocalMirror {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            excludes: Vec::new(),
            timeout: Duration::from_secs(1800),
        }
    }

    /// Exclude entries whose file name matches any of `patterns`.
    pub fn with_excludes<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, SyncError> {
        self.excludes = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p.as_ref()).map_err(|e| SyncError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn sync_tree(
        source: &Path,
        dest: &Path,
        excludes: &[glob::Pattern],
    ) -> Result<MirrorStats, SyncError> {
        let included = |entry: &DirEntry| {
            let name = entry.file_name().to_string_lossy();
            !excludes.iter().any(|p| p.matches(&name))
        };

        fs::create_dir_all(dest)?;
        let mut stats = MirrorStats::default();
        let mut kept = HashSet::new();

        for entry in WalkDir::new(source)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(included)
        {
            let entry = entry.map_err(|e| SyncError::Io(e.into()))?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| SyncError::Io(std::io::Error::other(e)))?
                .to_path_buf();
            let target = dest.join(&relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if target.is_file() {
                    fs::remove_file(&target)?;
                }
                fs::create_dir_all(&target)?;
            } else if file_type.is_file() {
                if target.is_dir() {
                    fs::remove_dir_all(&target)?;
                }
                if needs_copy(entry.path(), &target)? {
                    fs::copy(entry.path(), &target)?;
                    stats.transferred += 1;
                }
            } else {
                debug!("Skipping special file {}", entry.path().display());
                continue;
            }
            kept.insert(relative);
        }

        for entry in WalkDir::new(dest)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_entry(included)
        {
            let entry = entry.map_err(|e| SyncError::Io(e.into()))?;
            let relative = entry
                .path()
                .strip_prefix(dest)
                .map_err(|e| SyncError::Io(std::io::Error::other(e)))?;
            if kept.contains(relative) {
                continue;
            }

            if entry.file_type().is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
                stats.deleted += 1;
            }
            debug!("Deleted {}", entry.path().display());
        }

        Ok(stats)
    }
}

fn needs_copy(source: &Path, target: &Path) -> Result<bool, SyncError> {
    let Ok(existing) = fs::metadata(target) else {
        return Ok(true);
    };
    let wanted = fs::metadata(source)?;
    if existing.len() != wanted.len() {
        return Ok(true);
    }
    Ok(match (wanted.modified(), existing.modified()) {
        (Ok(src), Ok(dst)) => src > dst,
        _ => true,
    })
}

#[async_trait]
impl Mirror for LocalMirror {
    fn destination(&self) -> String {
        self.dest.display().to_string()
    }

    async fn mirror(&self, source: &Path) -> Result<MirrorStats, SyncError> {
        if !source.is_dir() {
            return Err(SyncError::SourceMissing(source.to_path_buf()));
        }

        let source = source.to_path_buf();
        let dest = self.dest.clone();
        let excludes = self.excludes.clone();
        let task = tokio::task::spawn_blocking(move || Self::sync_tree(&source, &dest, &excludes));

        let stats = timeout(self.timeout, task)
            .await
            .map_err(|_| SyncError::Timeout(self.timeout.as_secs()))???;
        info!("Mirrored into {}", self.dest.display());
        Ok(stats)
    }
}
