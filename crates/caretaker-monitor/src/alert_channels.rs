//! Alert channel implementations.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::MonitorError;

use super::alerts::{Alert, AlertChannel};

/// Generic JSON webhook channel.
///
/// Posts `{severity, title, message, timestamp, source, details}`.
pub struct WebhookChannel {
    webhook_url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Delivery timeout used by [`WebhookChannel::new`].
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a new webhook channel.
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, MonitorError> {
        Self::with_timeout(webhook_url, Self::DEFAULT_TIMEOUT)
    }

    /// Create a webhook channel whose deliveries give up after `timeout`.
    pub fn with_timeout(
        webhook_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(2)))
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Client(e.to_string()))?;
        Ok(Self {
            webhook_url: webhook_url.into(),
            client,
        })
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, alert: &Alert) -> Result<(), MonitorError> {
        let payload = serde_json::json!({
            "severity": alert.severity,
            "title": alert.title,
            "message": alert.message,
            "timestamp": alert.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "source": alert.source.as_deref().unwrap_or("caretaker"),
            "details": alert.details,
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MonitorError::Alert(format!("Webhook request failed: {}", e)))?;

        if response.status().is_success() {
            debug!("Webhook alert sent successfully");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(MonitorError::Alert(format!(
                "Webhook returned {}: {}",
                status, body
            )))
        }
    }
}
