//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,
}

/// Managed service and health monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Container/process name of the managed service.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Health endpoint URL.
    #[serde(default = "default_health_url")]
    pub health_url: String,

    /// Health probe timeout (in seconds).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Wait after a restart before the invocation ends (in seconds).
    #[serde(default = "default_settle")]
    pub settle_secs: u64,

    /// Restarts allowed inside the window before giving up.
    #[serde(default = "default_restart_ceiling")]
    pub restart_ceiling: u32,

    /// Time window for counting restarts (in seconds).
    #[serde(default = "default_restart_window")]
    pub restart_window_secs: u64,

    /// Container runtime binary.
    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// Timeout for container runtime commands (in seconds).
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root for logs, backups and state.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// The managed service's persistent data volume.
    #[serde(default = "default_volume")]
    pub volume: PathBuf,
}

/// Resource watchdog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Alert at or above this percentage of the memory limit.
    #[serde(default = "default_memory_threshold")]
    pub threshold_percent: f64,

    /// Configured hard limit, reported in alerts for context (e.g. "4g").
    #[serde(default)]
    pub hard_limit: Option<String>,
}

/// Backup orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Number of snapshots to keep.
    #[serde(default = "default_retention")]
    pub retention: usize,
}

/// Mirror and reindex trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Local tree to mirror.
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Remote host (rsync over ssh). Local mirror when unset.
    #[serde(default)]
    pub remote_host: Option<String>,

    /// Destination directory.
    #[serde(default)]
    pub remote_path: Option<String>,

    /// Name patterns excluded from the mirror.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Reindex trigger endpoint.
    #[serde(default = "default_trigger_url")]
    pub trigger_url: String,

    /// Connect timeout for the trigger request (in milliseconds).
    #[serde(default = "default_trigger_connect_timeout")]
    pub trigger_connect_timeout_ms: u64,

    /// Total timeout for sending the trigger request (in seconds).
    #[serde(default = "default_trigger_timeout")]
    pub trigger_timeout_secs: u64,

    /// Mirror timeout (in seconds).
    #[serde(default = "default_mirror_timeout")]
    pub mirror_timeout_secs: u64,

    /// Request a full rather than incremental reindex.
    #[serde(default)]
    pub full_reindex: bool,
}

/// Journal caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Size above which a log is truncated.
    #[serde(default = "default_log_max_bytes")]
    pub max_bytes: u64,

    /// Lines kept on truncation.
    #[serde(default = "default_log_keep_lines")]
    pub keep_lines: usize,
}

/// Alert delivery beyond the alert log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Webhook receiving alerts as JSON.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Upper bound on one webhook delivery.
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,
}

fn default_webhook_timeout() -> u64 {
    5
}

fn default_service_name() -> String {
    "search-index".to_string()
}

fn default_health_url() -> String {
    "http://localhost:8080/health".to_string()
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_settle() -> u64 {
    30
}

fn default_restart_ceiling() -> u32 {
    3
}

fn default_restart_window() -> u64 {
    3600 // 1 hour
}

/// Longest accepted restart window (30 days).
pub const MAX_RESTART_WINDOW_SECS: u64 = 30 * 24 * 3600;

fn default_runtime() -> String {
    "docker".to_string()
}

fn default_command_timeout() -> u64 {
    120
}

fn default_root() -> PathBuf {
    PathBuf::from("/var/lib/caretaker")
}

fn default_volume() -> PathBuf {
    PathBuf::from("/var/lib/caretaker/volume")
}

fn default_memory_threshold() -> f64 {
    80.0
}

/// Whether `percent` is a usable memory threshold, in (0, 100].
pub fn threshold_in_range(percent: f64) -> bool {
    percent.is_finite() && percent > 0.0 && percent <= 100.0
}

fn default_retention() -> usize {
    7
}

fn default_excludes() -> Vec<String> {
    [
        ".git",
        "__pycache__",
        "*.pyc",
        "node_modules",
        "target",
        "*.tmp",
        "*.swp",
        ".DS_Store",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_trigger_url() -> String {
    "http://localhost:8080/index/trigger".to_string()
}

fn default_trigger_connect_timeout() -> u64 {
    2000
}

fn default_trigger_timeout() -> u64 {
    5
}

fn default_mirror_timeout() -> u64 {
    1800
}

fn default_log_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_log_keep_lines() -> usize {
    1000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            health_url: default_health_url(),
            probe_timeout_secs: default_probe_timeout(),
            settle_secs: default_settle(),
            restart_ceiling: default_restart_ceiling(),
            restart_window_secs: default_restart_window(),
            runtime: default_runtime(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl ServiceConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn restart_window(&self) -> Duration {
        Duration::from_secs(self.restart_window_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            volume: default_volume(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            threshold_percent: default_memory_threshold(),
            hard_limit: None,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: None,
            remote_host: None,
            remote_path: None,
            excludes: default_excludes(),
            trigger_url: default_trigger_url(),
            trigger_connect_timeout_ms: default_trigger_connect_timeout(),
            trigger_timeout_secs: default_trigger_timeout(),
            mirror_timeout_secs: default_mirror_timeout(),
            full_reindex: false,
        }
    }
}

impl SyncConfig {
    pub fn trigger_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.trigger_connect_timeout_ms)
    }

    pub fn trigger_timeout(&self) -> Duration {
        Duration::from_secs(self.trigger_timeout_secs)
    }

    pub fn mirror_timeout(&self) -> Duration {
        Duration::from_secs(self.mirror_timeout_secs)
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_log_max_bytes(),
            keep_lines: default_log_keep_lines(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_secs: default_webhook_timeout(),
        }
    }
}

impl AlertsConfig {
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}
