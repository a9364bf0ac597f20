//! Sync & Reindex task.
//!
//! The mirror is the blocking phase and its failure ends the invocation.
//! The trigger runs only after a successful mirror and its failure is
//! best-effort: the data is already mirrored.

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;

use std::path::PathBuf;

use caretaker_core::{Degradation, Journal, TaskError};
use tracing::{error, info, warn};

use crate::mirror::{Mirror, MirrorStats};
use crate::trigger::{ReindexTrigger, TriggerOutcome};

/// Outcome of a successful mirror.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub source: PathBuf,
    pub destination: String,
    pub stats: MirrorStats,
    /// `None` when the trigger request failed.
    pub trigger: Option<TriggerOutcome>,
    pub degradations: Vec<Degradation>,
}

/// Mirror then trigger reindex.
pub struct SyncTask {
    source: PathBuf,
    mirror: Box<dyn Mirror>,
    trigger: ReindexTrigger,
    journal: Journal,
}

impl SyncTask {
    pub fn new(
        source: impl Into<PathBuf>,
        mirror: Box<dyn Mirror>,
        trigger: ReindexTrigger,
        journal: Journal,
    ) -> Self {
        Self {
            source: source.into(),
            mirror,
            trigger,
            journal,
        }
    }

    pub async fn run(&self) -> Result<SyncReport, TaskError> {
        let destination = self.mirror.destination();
        info!("Syncing {} to {}", self.source.display(), destination);
        self.record(&format!(
            "Sync started: {} -> {}",
            self.source.display(),
            destination
        ));

        let stats = match self.mirror.mirror(&self.source).await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Mirror to {} failed: {}", destination, e);
                self.record(&format!("Sync FAILED: {}", e));
                return Err(TaskError::MirrorFailed(e.to_string()));
            }
        };
        self.record(&format!(
            "Sync complete: {} transferred, {} deleted",
            stats.transferred, stats.deleted
        ));

        let mut degradations = Vec::new();
        let trigger = match self.trigger.fire().await {
            Ok(outcome) => {
                self.record(&format!("Reindex {}", outcome));
                Some(outcome)
            }
            Err(e) => {
                warn!("Reindex trigger to {} failed: {}", self.trigger.url(), e);
                self.record(&format!("Reindex trigger failed: {}", e));
                degradations.push(Degradation::best_effort(e.to_string()));
                None
            }
        };

        Ok(SyncReport {
            source: self.source.clone(),
            destination,
            stats,
            trigger,
            degradations,
        })
    }

    fn record(&self, message: &str) {
        if let Err(e) = self.journal.append(message) {
            warn!("Failed to write {}: {}", self.journal.path().display(), e);
        }
    }
}
