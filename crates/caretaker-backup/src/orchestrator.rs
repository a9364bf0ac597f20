//! Backup orchestration and retention.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use caretaker_core::{Clock, Degradation, Journal, TaskError, human_size};
use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::error::BackupError;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;

/// Outcome of a successful backup run.
#[derive(Debug, Clone)]
pub struct BackupReport {
    /// The snapshot just created.
    pub snapshot: Snapshot,
    /// Snapshots removed by retention.
    pub deleted: Vec<Snapshot>,
    /// Non-fatal problems during rotation.
    pub degradations: Vec<Degradation>,
}

/// Takes snapshots of the volume and keeps the newest `retention` of them.
pub struct BackupOrchestrator {
    store: Arc<dyn SnapshotStore>,
    volume: PathBuf,
    retention: usize,
    clock: Arc<dyn Clock>,
    journal: Journal,
}

impl BackupOrchestrator {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        volume: impl Into<PathBuf>,
        retention: usize,
        clock: Arc<dyn Clock>,
        journal: Journal,
    ) -> Self {
        Self {
            store,
            volume: volume.into(),
            retention,
            clock,
            journal,
        }
    }

    pub fn volume(&self) -> &Path {
        &self.volume
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Create one snapshot, then rotate.
    ///
    /// A failed snapshot is fatal and leaves existing snapshots untouched.
    pub async fn run(&self) -> Result<BackupReport, TaskError> {
        self.record(&format!("Backup started: {}", self.volume.display()));

        let snapshot = match self.store.create(&self.volume, self.clock.now()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Backup of {} failed: {}", self.volume.display(), e);
                self.record(&format!("Backup FAILED: {}", e));
                return Err(TaskError::BackupFailed(e.to_string()));
            }
        };

        info!("Backup created: {} ({})", snapshot.name, human_size(snapshot.size_bytes));
        self.record(&format!(
            "Backup created: {} ({})",
            snapshot.name,
            human_size(snapshot.size_bytes)
        ));

        let mut degradations = Vec::new();
        let deleted = self.rotate(&snapshot, &mut degradations).await;

        Ok(BackupReport {
            snapshot,
            deleted,
            degradations,
        })
    }

    /// Delete snapshots beyond the retention limit.
    ///
    /// Only snapshots strictly older than `newest` are candidates, so a
    /// concurrent run can never delete a snapshot newer than its own.
    async fn rotate(
        &self,
        newest: &Snapshot,
        degradations: &mut Vec<Degradation>,
    ) -> Vec<Snapshot> {
        let mut snapshots = match self.store.list().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!("Retention skipped, cannot list snapshots: {}", e);
                self.record(&format!("Retention skipped: {}", e));
                degradations.push(Degradation::transient(format!("retention skipped: {}", e)));
                return Vec::new();
            }
        };

        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut deleted = Vec::new();
        for old in snapshots
            .into_iter()
            .skip(self.retention)
            .filter(|s| s.created_at < newest.created_at)
        {
            match self.store.delete(&old).await {
                Ok(()) => {
                    info!("Deleted old backup: {}", old.name);
                    self.record(&format!("Deleted old backup: {}", old.name));
                    deleted.push(old);
                }
                Err(e) => {
                    warn!("Failed to delete old backup {}: {}", old.name, e);
                    self.record(&format!("Failed to delete old backup {}: {}", old.name, e));
                    degradations.push(Degradation::transient(format!(
                        "could not delete {}: {}",
                        old.name, e
                    )));
                }
            }
        }

        deleted
    }

    /// All snapshots, newest first.
    pub async fn snapshots(&self) -> Result<Vec<Snapshot>, BackupError> {
        let mut snapshots = self.store.list().await?;
        snapshots.reverse();
        Ok(snapshots)
    }

    /// The most recent snapshot, if any.
    pub async fn latest(&self) -> Result<Option<Snapshot>, BackupError> {
        Ok(self.store.list().await?.pop())
    }

    /// Whether a snapshot was created on `date`.
    pub async fn has_snapshot_for(&self, date: NaiveDate) -> Result<bool, BackupError> {
        let snapshots = self.store.list().await?;
        Ok(snapshots.iter().any(|s| s.created_at.date() == date))
    }

    /// Whether a snapshot exists for the clock's current date.
    pub async fn has_snapshot_today(&self) -> Result<bool, BackupError> {
        self.has_snapshot_for(self.clock.today()).await
    }

    fn record(&self, message: &str) {
        if let Err(e) = self.journal.append(message) {
            warn!("Failed to write {}: {}", self.journal.path().display(), e);
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
