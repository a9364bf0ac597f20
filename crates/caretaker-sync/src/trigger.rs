//! Fire-and-forget reindex trigger.
//!
//! The request has two phases with separate failure domains. Sending it is
//! bounded by a short connect timeout and a short total timeout, and its
//! failures are visible to the caller. Indexing on the remote side is never
//! awaited: once the request is on the wire, running out of time waiting for
//! the response counts as dispatched.

use std::time::Duration;

use caretaker_config::SyncConfig;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use crate::error::SyncError;

/// How far a trigger request got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The service answered with a 2xx status.
    Accepted { http_status: u16 },
    /// The request was sent but no response arrived before the timeout.
    Dispatched,
}

impl std::fmt::Display for TriggerOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerOutcome::Accepted { http_status } => {
                write!(f, "accepted (HTTP {})", http_status)
            }
            TriggerOutcome::Dispatched => write!(f, "dispatched"),
        }
    }
}

/// Client for the `/index/trigger` endpoint.
pub struct ReindexTrigger {
    client: Client,
    url: String,
    full_reindex: bool,
    timeout: Duration,
}

impl ReindexTrigger {
    pub fn new(
        url: impl Into<String>,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            full_reindex: false,
            timeout,
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        Ok(Self::new(
            config.trigger_url.clone(),
            config.trigger_connect_timeout(),
            config.trigger_timeout(),
        )?
        .with_full_reindex(config.full_reindex))
    }

    /// Ask for a full rather than incremental reindex.
    pub fn with_full_reindex(mut self, full: bool) -> Self {
        self.full_reindex = full;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send the trigger request.
    pub async fn fire(&self) -> Result<TriggerOutcome, SyncError> {
        debug!("POST {} (full_reindex={})", self.url, self.full_reindex);

        let response = match self
            .client
            .post(&self.url)
            .json(&json!({ "full_reindex": self.full_reindex }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() && !e.is_connect() => {
                info!(
                    "Reindex request to {} dispatched, no response within {}s",
                    self.url,
                    self.timeout.as_secs()
                );
                return Ok(TriggerOutcome::Dispatched);
            }
            Err(e) if e.is_connect() => {
                return Err(SyncError::Trigger(format!("cannot connect: {}", e)));
            }
            Err(e) => return Err(SyncError::Trigger(e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Trigger(format!("HTTP {}", status.as_u16())));
        }

        info!("Reindex request to {} accepted", self.url);
        Ok(TriggerOutcome::Accepted {
            http_status: status.as_u16(),
        })
    }
}
