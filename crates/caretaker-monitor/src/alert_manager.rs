//! Alert manager for dispatching alerts to channels.

use std::sync::Arc;

use caretaker_config::AlertsConfig;
use caretaker_core::{Clock, Journal};
use tracing::{error, info};

use crate::error::MonitorError;

use super::alert_channels::WebhookChannel;
use super::alerts::{Alert, AlertChannel, AlertSeverity, JournalChannel, LogChannel};

/// Alert manager.
///
/// Delivery failures are logged and returned to the caller; they never fail
/// the task that raised the alert.
pub struct AlertManager {
    channels: Vec<Box<dyn AlertChannel>>,
    clock: Arc<dyn Clock>,
}

impl AlertManager {
    /// Create a manager with only the tracing channel.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            channels: vec![Box::new(LogChannel)],
            clock,
        }
    }

    /// Create from config, writing alerts to `journal`.
    pub fn from_config(config: &AlertsConfig, journal: Journal, clock: Arc<dyn Clock>) -> Self {
        let mut manager = Self::new(clock);
        manager.add_channel(Box::new(JournalChannel::new(journal)));

        if let Some(ref webhook_url) = config.webhook_url {
            if !webhook_url.is_empty() {
                match WebhookChannel::with_timeout(webhook_url, config.webhook_timeout()) {
                    Ok(channel) => {
                        info!("Adding webhook alert channel");
                        manager.add_channel(Box::new(channel));
                    }
                    Err(e) => error!("Webhook alert channel disabled: {}", e),
                }
            }
        }

        manager
    }

    /// Add a channel.
    pub fn add_channel(&mut self, channel: Box<dyn AlertChannel>) {
        self.channels.push(channel);
    }

    /// Get list of channel names.
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send an alert to all channels.
    pub async fn send(&self, alert: &Alert) -> Vec<MonitorError> {
        let mut errors = Vec::new();

        for channel in &self.channels {
            if let Err(e) = channel.send(alert).await {
                error!("Failed to send alert via {}: {}", channel.name(), e);
                errors.push(e);
            }
        }

        errors
    }

    /// Raise an alert stamped with the manager's clock.
    pub async fn raise(
        &self,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) {
        let alert = Alert::new(title, message, severity, self.clock.now());
        self.send(&alert).await;
    }

    /// Send a warning alert.
    pub async fn warning(&self, title: impl Into<String>, message: impl Into<String>) {
        self.raise(AlertSeverity::Warning, title, message).await;
    }

    /// Send an alert-level alert.
    pub async fn alert(&self, title: impl Into<String>, message: impl Into<String>) {
        self.raise(AlertSeverity::Alert, title, message).await;
    }

    /// Send a critical alert.
    pub async fn critical(&self, title: impl Into<String>, message: impl Into<String>) {
        self.raise(AlertSeverity::Critical, title, message).await;
    }
}
