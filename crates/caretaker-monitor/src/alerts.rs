//! Alert types and core trait definitions.

#[cfg(test)]
#[path = "alerts_tests.rs"]
mod tests;

use async_trait::async_trait;
use caretaker_core::Journal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::MonitorError;

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational.
    Info,
    /// Something is off but the service is serving.
    Warning,
    /// The service or host needs attention.
    Alert,
    /// Automatic recovery gave up or data is at risk.
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "INFO"),
            AlertSeverity::Warning => write!(f, "WARNING"),
            AlertSeverity::Alert => write!(f, "ALERT"),
            AlertSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// An alert message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Alert title.
    pub title: String,
    /// Alert message.
    pub message: String,
    /// Severity level.
    pub severity: AlertSeverity,
    /// Local time the alert was raised.
    pub timestamp: NaiveDateTime,
    /// Source component.
    pub source: Option<String>,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}

impl Alert {
    /// Create a new alert.
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        severity: AlertSeverity,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            timestamp,
            source: None,
            details: None,
        }
    }

    /// Set source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Single-line form used in the alert log.
    pub fn format_line(&self) -> String {
        let mut line = format!("[{}] {}: {}", self.severity, self.title, self.message);
        if let Some(ref source) = self.source {
            line.push_str(&format!(" (source: {})", source));
        }
        line
    }
}

/// Alert channel trait.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Channel name.
    fn name(&self) -> &str;

    /// Send an alert.
    async fn send(&self, alert: &Alert) -> Result<(), MonitorError>;
}

/// Log channel (writes to tracing).
pub struct LogChannel;

#[async_trait]
impl AlertChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, alert: &Alert) -> Result<(), MonitorError> {
        match alert.severity {
            AlertSeverity::Info => info!("[ALERT] {}: {}", alert.title, alert.message),
            AlertSeverity::Warning => warn!("[ALERT] {}: {}", alert.title, alert.message),
            AlertSeverity::Alert | AlertSeverity::Critical => {
                error!("[ALERT] {}: {}", alert.title, alert.message)
            }
        }
        Ok(())
    }
}

/// Alert log channel: one journal line per alert.
pub struct JournalChannel {
    journal: Journal,
}

impl JournalChannel {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

#[async_trait]
impl AlertChannel for JournalChannel {
    fn name(&self) -> &str {
        "journal"
    }

    async fn send(&self, alert: &Alert) -> Result<(), MonitorError> {
        self.journal.append(&alert.format_line())?;
        Ok(())
    }
}
