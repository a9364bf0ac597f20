//! HTTP health probe.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::MonitorError;

/// Status reported by the service's health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Degraded,
    Unhealthy,
    /// The body was missing, unparsable or carried an unrecognized status.
    Unknown,
}

impl HealthStatus {
    /// Parse a reported status, case-insensitively.
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "OK" | "HEALTHY" => HealthStatus::Ok,
            "DEGRADED" => HealthStatus::Degraded,
            "UNHEALTHY" => HealthStatus::Unhealthy,
            _ => HealthStatus::Unknown,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Ok => write!(f, "OK"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
            HealthStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The endpoint answered with a 2xx status.
    Responded {
        http_status: u16,
        status: HealthStatus,
        warnings: Vec<String>,
        disk: Option<serde_json::Value>,
    },
    /// Connection failure, timeout or non-2xx answer.
    Failed {
        http_status: Option<u16>,
        reason: String,
    },
}

impl ProbeOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ProbeOutcome::Failed { .. })
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProbeOutcome::Responded { http_status, .. } => Some(*http_status),
            ProbeOutcome::Failed { http_status, .. } => *http_status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: Option<String>,
    #[serde(default)]
    warnings: Vec<serde_json::Value>,
    disk: Option<serde_json::Value>,
}

/// GETs the health endpoint with a short timeout.
pub struct HealthProbe {
    url: String,
    client: reqwest::Client,
}

impl HealthProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::Client(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Probe once. Never errors: every failure mode is a `ProbeOutcome`.
    pub async fn check(&self) -> ProbeOutcome {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    "timed out".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    e.to_string()
                };
                return ProbeOutcome::Failed {
                    http_status: None,
                    reason,
                };
            }
        };

        let http_status = response.status().as_u16();
        if !response.status().is_success() {
            return ProbeOutcome::Failed {
                http_status: Some(http_status),
                reason: format!("HTTP {}", http_status),
            };
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return ProbeOutcome::Failed {
                    http_status: Some(http_status),
                    reason: format!("reading body failed: {}", e),
                };
            }
        };

        Self::classify(http_status, &body)
    }

    /// Classify a 2xx body.
    pub fn classify(http_status: u16, body: &str) -> ProbeOutcome {
        match serde_json::from_str::<HealthBody>(body) {
            Ok(parsed) => ProbeOutcome::Responded {
                http_status,
                status: parsed
                    .status
                    .as_deref()
                    .map(HealthStatus::parse)
                    .unwrap_or(HealthStatus::Unknown),
                warnings: parsed
                    .warnings
                    .into_iter()
                    .map(|w| match w {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
                disk: parsed.disk,
            },
            Err(e) => {
                debug!("Unparsable health body: {}", e);
                ProbeOutcome::Responded {
                    http_status,
                    status: HealthStatus::Unknown,
                    warnings: Vec::new(),
                    disk: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn probe_for(server: &MockServer) -> HealthProbe {
        HealthProbe::new(format!("{}/health", server.uri()), Duration::from_millis(500)).unwrap()
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(HealthStatus::parse("OK"), HealthStatus::Ok);
        assert_eq!(HealthStatus::parse("ok"), HealthStatus::Ok);
        assert_eq!(HealthStatus::parse("DEGRADED"), HealthStatus::Degraded);
        assert_eq!(HealthStatus::parse("Unhealthy"), HealthStatus::Unhealthy);
        assert_eq!(HealthStatus::parse("sleepy"), HealthStatus::Unknown);
    }

    #[test]
    fn test_classify_full_body() {
        let body = r#"{
            "status": "OK",
            "warnings": ["disk 91% full"],
            "disk": {"total_mb": 812.4, "hnsw_mb": 640.1}
        }"#;
        match HealthProbe::classify(200, body) {
            ProbeOutcome::Responded {
                status,
                warnings,
                disk,
                ..
            } => {
                assert_eq!(status, HealthStatus::Ok);
                assert_eq!(warnings, vec!["disk 91% full".to_string()]);
                assert_eq!(disk.unwrap()["total_mb"], 812.4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_unusual_bodies_as_unknown() {
        for body in ["", "not json", "{}", r#"{"status": 3}"#, r#"{"status":"MAYBE"}"#] {
            match HealthProbe::classify(200, body) {
                ProbeOutcome::Responded { status, .. } => {
                    assert_eq!(status, HealthStatus::Unknown, "body {:?}", body)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_classify_non_string_warnings() {
        let outcome = HealthProbe::classify(200, r#"{"status":"OK","warnings":[{"code":7}]}"#);
        match outcome {
            ProbeOutcome::Responded { warnings, .. } => {
                assert_eq!(warnings, vec![r#"{"code":7}"#.to_string()])
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_healthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "OK"})),
            )
            .mount(&server)
            .await;

        let outcome = probe_for(&server).await.check().await;
        assert_eq!(
            outcome,
            ProbeOutcome::Responded {
                http_status: 200,
                status: HealthStatus::Ok,
                warnings: vec![],
                disk: None
            }
        );
    }

    #[tokio::test]
    async fn test_check_non_2xx_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(serde_json::json!({"status": "UNHEALTHY"})),
            )
            .mount(&server)
            .await;

        let outcome = probe_for(&server).await.check().await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.http_status(), Some(503));
    }

    #[tokio::test]
    async fn test_check_timeout_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        let outcome = probe_for(&server).await.check().await;
        assert!(started.elapsed() < Duration::from_secs(3));
        match outcome {
            ProbeOutcome::Failed { http_status, reason } => {
                assert_eq!(http_status, None);
                assert_eq!(reason, "timed out");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_connection_refused() {
        // Bind then drop a listener so the port is closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = HealthProbe::new(
            format!("http://127.0.0.1:{}/health", port),
            Duration::from_millis(500),
        )
        .unwrap();

        let outcome = probe.check().await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.http_status(), None);
    }
}
