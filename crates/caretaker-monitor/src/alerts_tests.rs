//! Tests for alert types, channels and manager.

use super::*;
use crate::alert_channels::WebhookChannel;
use crate::alert_manager::AlertManager;
use caretaker_config::AlertsConfig;
use caretaker_core::{Clock, LogCap, ManualClock};
use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn clock() -> Arc<ManualClock> {
    let now = NaiveDate::from_ymd_opt(2026, 3, 14)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    Arc::new(ManualClock::new(now))
}

fn journal(dir: &TempDir, clock: Arc<ManualClock>) -> Journal {
    Journal::new(dir.path().join("alerts.log"), LogCap::default(), clock)
}

#[test]
fn test_alert_new() {
    let alert = Alert::new("Health", "service DEGRADED", AlertSeverity::Warning, clock().now());
    assert_eq!(alert.title, "Health");
    assert_eq!(alert.severity, AlertSeverity::Warning);
    assert!(alert.source.is_none());
}

#[test]
fn test_alert_format_line() {
    let alert = Alert::new("Memory", "usage 91.0%", AlertSeverity::Alert, clock().now())
        .with_source("watchdog");

    assert_eq!(alert.format_line(), "[ALERT] Memory: usage 91.0% (source: watchdog)");
}

#[test]
fn test_severity_display() {
    assert_eq!(AlertSeverity::Info.to_string(), "INFO");
    assert_eq!(AlertSeverity::Warning.to_string(), "WARNING");
    assert_eq!(AlertSeverity::Alert.to_string(), "ALERT");
    assert_eq!(AlertSeverity::Critical.to_string(), "CRITICAL");
}

#[test]
fn test_severity_ordering() {
    assert!(AlertSeverity::Info < AlertSeverity::Warning);
    assert!(AlertSeverity::Warning < AlertSeverity::Alert);
    assert!(AlertSeverity::Alert < AlertSeverity::Critical);
}

#[test]
fn test_severity_serializes_lowercase() {
    let json = serde_json::to_string(&AlertSeverity::Critical).unwrap();
    assert_eq!(json, "\"critical\"");
}

#[tokio::test]
async fn test_log_channel() {
    let alert = Alert::new("Test", "Test message", AlertSeverity::Info, clock().now());
    assert!(LogChannel.send(&alert).await.is_ok());
}

#[tokio::test]
async fn test_journal_channel_writes_one_line() {
    let dir = TempDir::new().unwrap();
    let clock = clock();
    let channel = JournalChannel::new(journal(&dir, clock.clone()));

    let alert = Alert::new("Health", "service UNHEALTHY", AlertSeverity::Alert, clock.now());
    channel.send(&alert).await.unwrap();

    let lines = std::fs::read_to_string(dir.path().join("alerts.log")).unwrap();
    assert_eq!(lines, "[2026-03-14 09:30:00] [ALERT] Health: service UNHEALTHY\n");
}

#[tokio::test]
async fn test_alert_manager_send() {
    let manager = AlertManager::new(clock());
    let alert = Alert::new("Test", "Test message", AlertSeverity::Info, clock().now());

    let errors = manager.send(&alert).await;
    assert!(errors.is_empty());
}

#[test]
fn test_alert_manager_from_config() {
    let dir = TempDir::new().unwrap();
    let config = AlertsConfig {
        webhook_url: Some("https://hooks.example.com/caretaker".to_string()),
        ..Default::default()
    };

    let manager = AlertManager::from_config(&config, journal(&dir, clock()), clock());
    assert_eq!(manager.channel_names(), vec!["log", "journal", "webhook"]);
}

#[test]
fn test_alert_manager_without_webhook() {
    let dir = TempDir::new().unwrap();
    let config = AlertsConfig {
        webhook_url: Some(String::new()),
        ..Default::default()
    };

    let manager = AlertManager::from_config(&config, journal(&dir, clock()), clock());
    assert_eq!(manager.channel_names(), vec!["log", "journal"]);
}

#[tokio::test]
async fn test_alert_manager_raise_uses_clock() {
    let dir = TempDir::new().unwrap();
    let clock = clock();
    let journal = journal(&dir, clock.clone());
    let manager =
        AlertManager::from_config(&AlertsConfig::default(), journal.clone(), clock.clone());

    clock.advance(chrono::Duration::minutes(5));
    manager.critical("Health", "restart ceiling reached").await;

    let lines = journal.lines().unwrap();
    assert_eq!(
        lines,
        vec!["[2026-03-14 09:35:00] [CRITICAL] Health: restart ceiling reached".to_string()]
    );
}

#[tokio::test]
async fn test_webhook_channel_posts_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(serde_json::json!({
            "severity": "alert",
            "title": "Memory",
            "timestamp": "2026-03-14T09:30:00",
            "source": "caretaker",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let channel = WebhookChannel::new(format!("{}/hook", server.uri())).unwrap();
    let alert = Alert::new("Memory", "usage 91.0%", AlertSeverity::Alert, clock().now());

    channel.send(&alert).await.unwrap();
}

#[tokio::test]
async fn test_webhook_failure_does_not_stop_other_channels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let clock = clock();
    let journal = journal(&dir, clock.clone());
    let mut manager = AlertManager::new(clock.clone());
    manager.add_channel(Box::new(WebhookChannel::new(server.uri()).unwrap()));
    manager.add_channel(Box::new(JournalChannel::new(journal.clone())));

    let alert = Alert::new("Backup", "snapshot failed", AlertSeverity::Critical, clock.now());
    let errors = manager.send(&alert).await;

    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("500"));
    assert_eq!(journal.lines().unwrap().len(), 1);
}

#[tokio::test]
async fn test_slow_webhook_gives_up_within_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(10)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let clock = clock();
    let journal = journal(&dir, clock.clone());
    let config = AlertsConfig {
        webhook_url: Some(server.uri()),
        webhook_timeout_secs: 1,
    };
    let manager = AlertManager::from_config(&config, journal.clone(), clock.clone());

    let started = std::time::Instant::now();
    let alert = Alert::new("Health", "warning one", AlertSeverity::Warning, clock.now());
    let errors = manager.send(&alert).await;

    assert_eq!(errors.len(), 1);
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
    assert_eq!(journal.lines().unwrap().len(), 1);
}
