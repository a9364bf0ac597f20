//! Builds task components from the resolved configuration.

use std::sync::Arc;

use caretaker_backup::{BackupOrchestrator, FileSnapshotStore, RestoreManager, SnapshotStore};
use caretaker_config::SupervisorConfig;
use caretaker_core::{
    Clock, ContainerRuntime, Journal, Layout, LogCap, LogKind, ProcessControl, SystemClock,
    TaskError,
};
use caretaker_monitor::{AlertManager, HealthMonitor, HealthProbe, ResourceWatchdog, RestartPolicy};
use caretaker_sync::{ReindexTrigger, SyncTask, mirror_from_config};

/// Shared collaborators for one invocation.
pub(crate) struct Context {
    pub config: SupervisorConfig,
    pub layout: Layout,
    pub clock: Arc<dyn Clock>,
    pub process: Arc<dyn ProcessControl>,
}

impl Context {
    pub fn new(config: SupervisorConfig) -> Self {
        let runtime = ContainerRuntime::new(config.service.runtime.clone())
            .with_timeout(config.service.command_timeout());
        Self::with_parts(config, Arc::new(SystemClock), Arc::new(runtime))
    }

    pub fn with_parts(
        config: SupervisorConfig,
        clock: Arc<dyn Clock>,
        process: Arc<dyn ProcessControl>,
    ) -> Self {
        Self {
            layout: Layout::new(config.paths.root.clone()),
            config,
            clock,
            process,
        }
    }

    pub fn service(&self) -> &str {
        &self.config.service.name
    }

    pub fn journal(&self, kind: LogKind) -> Journal {
        let cap = LogCap {
            max_bytes: self.config.logs.max_bytes,
            keep_lines: self.config.logs.keep_lines,
        };
        self.layout.journal(kind, cap, self.clock.clone())
    }

    pub fn alerts(&self) -> Arc<AlertManager> {
        Arc::new(AlertManager::from_config(
            &self.config.alerts,
            self.journal(LogKind::Alerts),
            self.clock.clone(),
        ))
    }

    fn store(&self) -> Arc<dyn SnapshotStore> {
        Arc::new(FileSnapshotStore::new(
            self.layout.backups_dir(),
            self.service(),
        ))
    }

    pub fn backup(&self) -> BackupOrchestrator {
        BackupOrchestrator::new(
            self.store(),
            self.config.paths.volume.clone(),
            self.config.backup.retention,
            self.clock.clone(),
            self.journal(LogKind::Backup),
        )
    }

    pub fn restore(&self) -> RestoreManager {
        RestoreManager::new(
            self.store(),
            self.process.clone(),
            self.service(),
            self.config.paths.volume.clone(),
            self.clock.clone(),
            self.journal(LogKind::Backup),
        )
    }

    pub fn health_monitor(&self) -> Result<HealthMonitor, TaskError> {
        let probe = HealthProbe::new(
            self.config.service.health_url.clone(),
            self.config.service.probe_timeout(),
        )
        .map_err(|e| TaskError::CheckFailed(e.to_string()))?;

        Ok(HealthMonitor::new(
            self.service(),
            self.process.clone(),
            probe,
            self.layout.restart_ledger_path(),
            self.clock.clone(),
            self.journal(LogKind::Health),
            self.alerts(),
        )
        .with_policy(
            RestartPolicy::from_config(&self.config.service)
                .map_err(|e| TaskError::CheckFailed(e.to_string()))?,
        )
        .with_backup(Arc::new(self.backup())))
    }

    pub fn watchdog(&self) -> ResourceWatchdog {
        ResourceWatchdog::new(
            self.service(),
            self.process.clone(),
            self.config.memory.threshold_percent,
            self.clock.clone(),
            self.journal(LogKind::Memory),
            self.alerts(),
        )
        .with_hard_limit(self.config.memory.hard_limit.clone())
    }

    pub fn sync_task(&self) -> Result<SyncTask, TaskError> {
        let sync = &self.config.sync;
        let source = sync
            .source
            .clone()
            .ok_or_else(|| TaskError::CheckFailed("sync.source is not set".to_string()))?;
        let mirror = mirror_from_config(sync).map_err(|e| TaskError::CheckFailed(e.to_string()))?;
        let trigger =
            ReindexTrigger::from_config(sync).map_err(|e| TaskError::CheckFailed(e.to_string()))?;

        Ok(SyncTask::new(
            source,
            mirror,
            trigger,
            self.journal(LogKind::Sync),
        ))
    }
}
