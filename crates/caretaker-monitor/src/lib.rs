//! # Caretaker Monitor
//!
//! Keeps the managed service alive and tells an operator when it is not.
//!
//! ## Features
//!
//! - Health probe of the service's `/health` endpoint
//! - Restart policy with a time-window ceiling backed by a persisted ledger
//! - Catch-up backup when today's snapshot is missing
//! - Memory watchdog with a distinct threshold exit signal
//! - Alert log, tracing and optional webhook alert channels

pub mod alert_channels;
pub mod alert_manager;
pub mod alerts;
pub mod error;
pub mod health;
pub mod ledger;
pub mod probe;
pub mod watchdog;

pub use alert_channels::WebhookChannel;
pub use alert_manager::AlertManager;
pub use alerts::{Alert, AlertChannel, AlertSeverity, JournalChannel, LogChannel};
pub use error::MonitorError;
pub use health::{HealthMonitor, HealthRecord, HealthReport, RestartPolicy, restart_window};
pub use ledger::{RestartAttempt, RestartLedger, RestartOutcome};
pub use probe::{HealthProbe, HealthStatus, ProbeOutcome};
pub use watchdog::{MemorySample, ResourceWatchdog};
