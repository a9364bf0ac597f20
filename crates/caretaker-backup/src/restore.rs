//! Restore a snapshot into the volume.
//!
//! The sequence is stop, extract into a staging directory next to the
//! volume, move the current volume aside, rename staging into place, start.
//! Until the swap the volume is never touched, and the previous contents
//! survive as `<volume>.pre-restore-<YYYYMMDD_HHMMSS>`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use caretaker_core::{Clock, Journal, ProcessControl, TaskError};
use tracing::{error, info, warn};

use crate::snapshot::{NAME_TIMESTAMP_FORMAT, Snapshot};
use crate::store::SnapshotStore;

/// Outcome of a successful restore.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    /// The snapshot restored.
    pub snapshot: Snapshot,
    /// Where the previous volume contents were moved, if there were any.
    pub previous: Option<PathBuf>,
}

/// Restores snapshots into the managed service's volume.
pub struct RestoreManager {
    store: Arc<dyn SnapshotStore>,
    process: Arc<dyn ProcessControl>,
    service: String,
    volume: PathBuf,
    clock: Arc<dyn Clock>,
    journal: Journal,
}

impl RestoreManager {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        process: Arc<dyn ProcessControl>,
        service: impl Into<String>,
        volume: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
        journal: Journal,
    ) -> Self {
        Self {
            store,
            process,
            service: service.into(),
            volume: volume.into(),
            clock,
            journal,
        }
    }

    /// Restore the snapshot named `name`, or the newest one.
    pub async fn run(&self, name: Option<&str>) -> Result<RestoreReport, TaskError> {
        let snapshot = self.select(name).await?;
        self.record(&format!("Restore started: {}", snapshot.name));

        let staging = self.sibling("restore-staging");
        if staging.exists() {
            warn!("Removing stale staging directory {}", staging.display());
            tokio::fs::remove_dir_all(&staging)
                .await
                .map_err(|e| self.fail(format!("cannot clear {}: {}", staging.display(), e)))?;
        }

        self.process
            .stop(&self.service)
            .await
            .map_err(|e| self.fail(format!("cannot stop {}: {}", self.service, e)))?;

        if let Err(e) = self.store.extract(&snapshot, &staging).await {
            self.discard(&staging).await;
            self.resume().await;
            return Err(self.fail(format!("cannot extract {}: {}", snapshot.name, e)));
        }

        let previous = if self.volume.exists() {
            let aside = self.sibling(&format!(
                "pre-restore-{}",
                self.clock.now().format(NAME_TIMESTAMP_FORMAT)
            ));
            if let Err(e) = tokio::fs::rename(&self.volume, &aside).await {
                self.discard(&staging).await;
                self.resume().await;
                return Err(self.fail(format!("cannot move volume aside: {}", e)));
            }
            Some(aside)
        } else {
            None
        };

        if let Err(e) = tokio::fs::rename(&staging, &self.volume).await {
            if let Some(ref aside) = previous {
                if let Err(back) = tokio::fs::rename(aside, &self.volume).await {
                    error!(
                        "Could not move {} back to {}: {}",
                        aside.display(),
                        self.volume.display(),
                        back
                    );
                }
            }
            self.discard(&staging).await;
            self.resume().await;
            return Err(self.fail(format!("cannot swap in restored volume: {}", e)));
        }

        if let Err(e) = self.process.start(&self.service).await {
            return Err(self.fail(format!(
                "volume restored from {} but {} failed to start: {}",
                snapshot.name, self.service, e
            )));
        }

        info!("Restored {} from {}", self.volume.display(), snapshot.name);
        match previous {
            Some(ref aside) => self.record(&format!(
                "Restore complete: {} (previous volume kept at {})",
                snapshot.name,
                aside.display()
            )),
            None => self.record(&format!("Restore complete: {}", snapshot.name)),
        }

        Ok(RestoreReport { snapshot, previous })
    }

    async fn select(&self, name: Option<&str>) -> Result<Snapshot, TaskError> {
        let mut snapshots = self
            .store
            .list()
            .await
            .map_err(|e| self.fail(format!("cannot list snapshots: {}", e)))?;

        let found = match name {
            Some(name) => snapshots.into_iter().find(|s| s.name == name),
            None => snapshots.pop(),
        };

        found.ok_or_else(|| match name {
            Some(name) => self.fail(format!("no snapshot named {}", name)),
            None => self.fail("no snapshots available".to_string()),
        })
    }

    /// `<volume>.<suffix>` next to the volume.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .volume
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "volume".into());
        name.push(format!(".{}", suffix));
        self.volume.with_file_name(name)
    }

    async fn discard(&self, staging: &Path) {
        if staging.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(staging).await {
                warn!("Failed to remove {}: {}", staging.display(), e);
            }
        }
    }

    /// Bring the service back after an aborted restore.
    async fn resume(&self) {
        if let Err(e) = self.process.start(&self.service).await {
            error!("Failed to restart {} after aborted restore: {}", self.service, e);
        }
    }

    fn fail(&self, message: String) -> TaskError {
        error!("Restore failed: {}", message);
        self.record(&format!("Restore FAILED: {}", message));
        TaskError::RestoreFailed(message)
    }

    fn record(&self, message: &str) {
        if let Err(e) = self.journal.append(message) {
            warn!("Failed to write {}: {}", self.journal.path().display(), e);
        }
    }
}
