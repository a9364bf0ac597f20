//! Health Monitor task.
//!
//! One invocation:
//!
//! 1. Make sure the managed process is running, starting it if not.
//! 2. Probe the health endpoint.
//! 3. On probe failure, restart unless the ceiling of `started` attempts
//!    inside the restart window has been reached.
//! 4. Raise alerts for DEGRADED/UNHEALTHY/UNKNOWN bodies and every reported
//!    warning.
//! 5. Run a catch-up backup if today's snapshot is missing.

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use caretaker_backup::{BackupOrchestrator, Snapshot};
use caretaker_config::{ConfigError, ServiceConfig};
use caretaker_core::{Clock, Degradation, Journal, ProcessControl, TaskError};
use chrono::{NaiveDateTime, TimeDelta};
use tracing::{error, info, warn};

use crate::alert_manager::AlertManager;
use crate::error::MonitorError;
use crate::ledger::{RestartAttempt, RestartLedger, RestartOutcome};
use crate::probe::{HealthProbe, HealthStatus, ProbeOutcome};

/// Restart limits.
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    /// Maximum `started` attempts inside `window`.
    pub ceiling: u32,
    pub window: TimeDelta,
    /// Wait after a start or restart.
    pub settle: Duration,
}

impl RestartPolicy {
    pub fn from_config(config: &ServiceConfig) -> Result<Self, MonitorError> {
        Ok(Self {
            ceiling: config.restart_ceiling,
            window: restart_window(config.restart_window_secs)?,
            settle: config.settle(),
        })
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        let config = ServiceConfig::default();
        Self {
            ceiling: config.restart_ceiling,
            window: TimeDelta::hours(1),
            settle: config.settle(),
        }
    }
}

/// Convert `restart_window_secs` into a window, rejecting values chrono
/// cannot represent.
pub fn restart_window(secs: u64) -> Result<TimeDelta, MonitorError> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| {
            MonitorError::Config(ConfigError::InvalidValue {
                field: "service.restart_window_secs".to_string(),
                message: format!("{} seconds is out of range", secs),
            })
        })
}

/// What one health check observed.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthRecord {
    pub timestamp: NaiveDateTime,
    pub http_status: Option<u16>,
    pub status: HealthStatus,
    pub warnings: Vec<String>,
    /// Failure reason when the probe failed.
    pub detail: Option<String>,
}

impl HealthRecord {
    fn from_outcome(timestamp: NaiveDateTime, outcome: &ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Responded {
                http_status,
                status,
                warnings,
                ..
            } => Self {
                timestamp,
                http_status: Some(*http_status),
                status: *status,
                warnings: warnings.clone(),
                detail: None,
            },
            ProbeOutcome::Failed {
                http_status,
                reason,
            } => Self {
                timestamp,
                http_status: *http_status,
                status: HealthStatus::Unhealthy,
                warnings: Vec::new(),
                detail: Some(reason.clone()),
            },
        }
    }

    /// Line written to the health log.
    pub fn format_line(&self) -> String {
        let http = self
            .http_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut line = format!("status={} http={}", self.status, http);
        if !self.warnings.is_empty() {
            line.push_str(&format!(" warnings={}", self.warnings.len()));
        }
        if let Some(ref detail) = self.detail {
            line.push_str(&format!(" detail={}", detail));
        }
        line
    }
}

/// Outcome of a health check that did not hit the restart ceiling.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub record: HealthRecord,
    /// The process was down and was started.
    pub started: bool,
    /// The process was restarted after a failed probe.
    pub restarted: bool,
    /// `started` attempts inside the window, after this run.
    pub restarts_in_window: usize,
    /// Snapshot created by the catch-up check.
    pub catch_up: Option<Snapshot>,
    pub degradations: Vec<Degradation>,
}

/// Health Monitor.
pub struct HealthMonitor {
    service: String,
    process: Arc<dyn ProcessControl>,
    probe: HealthProbe,
    policy: RestartPolicy,
    ledger_path: PathBuf,
    clock: Arc<dyn Clock>,
    journal: Journal,
    alerts: Arc<AlertManager>,
    backup: Option<Arc<BackupOrchestrator>>,
}

impl HealthMonitor {
    pub fn new(
        service: impl Into<String>,
        process: Arc<dyn ProcessControl>,
        probe: HealthProbe,
        ledger_path: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
        journal: Journal,
        alerts: Arc<AlertManager>,
    ) -> Self {
        Self {
            service: service.into(),
            process,
            probe,
            policy: RestartPolicy::default(),
            ledger_path: ledger_path.into(),
            clock,
            journal,
            alerts,
            backup: None,
        }
    }

    pub fn with_policy(mut self, policy: RestartPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable the catch-up backup check.
    pub fn with_backup(mut self, backup: Arc<BackupOrchestrator>) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Run one health check.
    pub async fn run(&self) -> Result<HealthReport, TaskError> {
        let mut degradations = Vec::new();
        let mut ledger = RestartLedger::load(&self.ledger_path)
            .map_err(|e| TaskError::CheckFailed(e.to_string()))?;

        let started = self.ensure_running(&mut ledger, &mut degradations).await;

        let outcome = self.probe.check().await;
        let record = HealthRecord::from_outcome(self.clock.now(), &outcome);
        self.record(&record.format_line());

        let mut restarted = false;
        let mut verdict = Ok(());

        match outcome {
            ProbeOutcome::Failed { ref reason, .. } => {
                warn!("Health probe of {} failed: {}", self.probe.url(), reason);
                let restarts = ledger.started_within(self.clock.now(), self.policy.window);

                if restarts >= self.policy.ceiling as usize {
                    let err = TaskError::RestartCeiling {
                        restarts,
                        ceiling: self.policy.ceiling,
                    };
                    error!("{}", err);
                    self.alerts
                        .critical(
                            "Health",
                            format!("{} is down ({}); {}", self.service, reason, err),
                        )
                        .await;
                    verdict = Err(err);
                } else {
                    restarted = self
                        .restart(
                            &mut ledger,
                            format!("health probe failed: {}", reason),
                            restarts,
                            &mut degradations,
                        )
                        .await;
                }
            }
            ProbeOutcome::Responded {
                status, ref warnings, ..
            } => {
                match status {
                    HealthStatus::Ok => {}
                    HealthStatus::Degraded => {
                        self.alerts
                            .warning("Health", format!("{} reports DEGRADED", self.service))
                            .await
                    }
                    HealthStatus::Unhealthy => {
                        self.alerts
                            .alert("Health", format!("{} reports UNHEALTHY", self.service))
                            .await
                    }
                    HealthStatus::Unknown => {
                        self.alerts
                            .warning(
                                "Health",
                                format!(
                                    "{} returned an unrecognized health response",
                                    self.service
                                ),
                            )
                            .await
                    }
                }

                for warning in warnings {
                    self.alerts
                        .warning("Health", format!("{}: {}", self.service, warning))
                        .await;
                }
            }
        }

        if ledger.is_dirty() {
            if let Err(e) = ledger.save() {
                warn!("Failed to save restart ledger: {}", e);
                degradations.push(Degradation::transient(format!(
                    "restart ledger not saved: {}",
                    e
                )));
            }
        }

        let catch_up = self.catch_up(&mut degradations).await;

        verdict?;

        Ok(HealthReport {
            record,
            started,
            restarted,
            restarts_in_window: ledger.started_within(self.clock.now(), self.policy.window),
            catch_up,
            degradations,
        })
    }

    /// Start the process if it is not running. Returns whether it was started.
    async fn ensure_running(
        &self,
        ledger: &mut RestartLedger,
        degradations: &mut Vec<Degradation>,
    ) -> bool {
        match self.process.is_running(&self.service).await {
            Ok(true) => false,
            Ok(false) => {
                warn!("{} is not running, starting it", self.service);
                let reason = "process not running".to_string();
                match self.process.start(&self.service).await {
                    Ok(()) => {
                        self.log_attempt(ledger, reason, RestartOutcome::Started);
                        self.alerts
                            .warning(
                                "Health",
                                format!("{} was not running and has been started", self.service),
                            )
                            .await;
                        tokio::time::sleep(self.policy.settle).await;
                        true
                    }
                    Err(e) => {
                        self.log_attempt(
                            ledger,
                            format!("{}: {}", reason, e),
                            RestartOutcome::Failed,
                        );
                        self.alerts
                            .alert(
                                "Health",
                                format!(
                                    "{} is not running and failed to start: {}",
                                    self.service, e
                                ),
                            )
                            .await;
                        degradations.push(Degradation::transient(format!("start failed: {}", e)));
                        false
                    }
                }
            }
            Err(e) => {
                warn!("Cannot query state of {}: {}", self.service, e);
                degradations.push(Degradation::transient(format!(
                    "process state unknown: {}",
                    e
                )));
                false
            }
        }
    }

    async fn restart(
        &self,
        ledger: &mut RestartLedger,
        reason: String,
        restarts: usize,
        degradations: &mut Vec<Degradation>,
    ) -> bool {
        info!(
            "Restarting {} ({}/{} restarts in window)",
            self.service,
            restarts + 1,
            self.policy.ceiling
        );
        match self.process.restart(&self.service).await {
            Ok(()) => {
                tokio::time::sleep(self.policy.settle).await;
                self.log_attempt(ledger, reason.clone(), RestartOutcome::Started);
                self.alerts
                    .warning(
                        "Health",
                        format!(
                            "{} restarted after {} ({}/{} in window)",
                            self.service,
                            reason,
                            restarts + 1,
                            self.policy.ceiling
                        ),
                    )
                    .await;
                true
            }
            Err(e) => {
                self.log_attempt(ledger, format!("{}: {}", reason, e), RestartOutcome::Failed);
                self.alerts
                    .alert("Health", format!("Restart of {} failed: {}", self.service, e))
                    .await;
                degradations.push(Degradation::transient(format!("restart failed: {}", e)));
                false
            }
        }
    }

    fn log_attempt(&self, ledger: &mut RestartLedger, reason: String, outcome: RestartOutcome) {
        self.record(&format!("Restart attempt: {} ({})", outcome, reason));
        ledger.record(RestartAttempt {
            timestamp: self.clock.now(),
            reason,
            outcome,
        });
    }

    async fn catch_up(&self, degradations: &mut Vec<Degradation>) -> Option<Snapshot> {
        let backup = self.backup.as_ref()?;

        match backup.has_snapshot_today().await {
            Ok(true) => None,
            Ok(false) => {
                info!("No backup for {}, running catch-up backup", self.clock.today());
                self.record("No backup for today, running catch-up backup");
                match backup.run().await {
                    Ok(report) => {
                        self.record(&format!("Catch-up backup created: {}", report.snapshot.name));
                        degradations.extend(report.degradations);
                        Some(report.snapshot)
                    }
                    Err(e) => {
                        warn!("Catch-up backup failed: {}", e);
                        self.record(&format!("Catch-up backup failed: {}", e));
                        self.alerts
                            .warning("Backup", format!("Catch-up backup failed: {}", e))
                            .await;
                        degradations.push(Degradation::best_effort(format!(
                            "catch-up backup failed: {}",
                            e
                        )));
                        None
                    }
                }
            }
            Err(e) => {
                warn!("Cannot list snapshots for catch-up check: {}", e);
                degradations.push(Degradation::best_effort(format!(
                    "catch-up check skipped: {}",
                    e
                )));
                None
            }
        }
    }

    fn record(&self, message: &str) {
        if let Err(e) = self.journal.append(message) {
            warn!("Failed to write {}: {}", self.journal.path().display(), e);
        }
    }
}
