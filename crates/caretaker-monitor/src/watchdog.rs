//! Resource watchdog.
//!
//! Samples the managed process's memory usage against its limit. A sample
//! at or above the threshold raises one alert and ends the invocation with
//! the threshold exit code, which is distinct from a failed check.

use std::sync::Arc;

use caretaker_config::threshold_in_range;
use caretaker_core::{Clock, Journal, ProcessControl, TaskError, human_size};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use crate::alert_manager::AlertManager;

/// One memory observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySample {
    pub timestamp: NaiveDateTime,
    pub used_bytes: u64,
    pub limit_bytes: u64,
    pub percent: f64,
}

impl MemorySample {
    /// Line written to the memory log.
    pub fn format_line(&self) -> String {
        format!(
            "memory {} / {} ({:.1}%)",
            human_size(self.used_bytes),
            human_size(self.limit_bytes),
            self.percent
        )
    }
}

/// Memory watchdog for the managed process.
pub struct ResourceWatchdog {
    service: String,
    process: Arc<dyn ProcessControl>,
    threshold: f64,
    hard_limit: Option<String>,
    clock: Arc<dyn Clock>,
    journal: Journal,
    alerts: Arc<AlertManager>,
}

impl ResourceWatchdog {
    pub fn new(
        service: impl Into<String>,
        process: Arc<dyn ProcessControl>,
        threshold: f64,
        clock: Arc<dyn Clock>,
        journal: Journal,
        alerts: Arc<AlertManager>,
    ) -> Self {
        Self {
            service: service.into(),
            process,
            threshold,
            hard_limit: None,
            clock,
            journal,
            alerts,
        }
    }

    /// Configured hard limit, quoted in alerts.
    pub fn with_hard_limit(mut self, hard_limit: Option<String>) -> Self {
        self.hard_limit = hard_limit;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Take one sample. `threshold` overrides the configured one.
    pub async fn run(&self, threshold: Option<f64>) -> Result<MemorySample, TaskError> {
        let threshold = threshold.unwrap_or(self.threshold);
        if !threshold_in_range(threshold) {
            return Err(TaskError::CheckFailed(format!(
                "memory threshold must be in (0, 100], got {}",
                threshold
            )));
        }

        let usage = match self.process.resource_usage(&self.service).await {
            Ok(usage) => usage,
            Err(e) => {
                warn!("Cannot sample memory of {}: {}", self.service, e);
                self.record(&format!("memory check failed: {}", e));
                return Err(TaskError::CheckFailed(format!(
                    "memory usage of {} unavailable: {}",
                    self.service, e
                )));
            }
        };

        let sample = MemorySample {
            timestamp: self.clock.now(),
            used_bytes: usage.used_bytes,
            limit_bytes: usage.limit_bytes,
            percent: usage.percent,
        };
        self.record(&sample.format_line());

        if sample.percent < threshold {
            info!("{} memory at {:.1}%", self.service, sample.percent);
            return Ok(sample);
        }

        let mut message = format!(
            "{} memory at {:.1}% ({} of {}), threshold {:.1}%",
            self.service,
            sample.percent,
            human_size(sample.used_bytes),
            human_size(sample.limit_bytes),
            threshold
        );
        if let Some(ref limit) = self.hard_limit {
            message.push_str(&format!("; hard limit {}", limit));
        }
        warn!("{}", message);
        self.alerts.alert("Memory", message).await;

        Err(TaskError::ThresholdExceeded {
            percent: sample.percent,
            threshold,
        })
    }

    fn record(&self, message: &str) {
        if let Err(e) = self.journal.append(message) {
            warn!("Failed to write {}: {}", self.journal.path().display(), e);
        }
    }
}
