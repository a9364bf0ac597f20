use super::*;
use caretaker_backup::{MemorySnapshotStore, SnapshotStore};
use caretaker_config::AlertsConfig;
use caretaker_core::{FailureClass, LogCap, ManualClock, ScriptedProcess};
use chrono::NaiveDate;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 14)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

struct Harness {
    dir: TempDir,
    clock: Arc<ManualClock>,
    process: Arc<ScriptedProcess>,
    store: Arc<MemorySnapshotStore>,
    server: MockServer,
}

impl Harness {
    async fn new() -> Self {
        Self::with(true, true).await
    }

    async fn with(running: bool, backed_up_today: bool) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("volume")).unwrap();
        std::fs::write(dir.path().join("volume/index.bin"), b"index").unwrap();

        let store = Arc::new(MemorySnapshotStore::new("svc"));
        if backed_up_today {
            store.insert(at(2, 0)).await;
        }

        Self {
            dir,
            clock: Arc::new(ManualClock::new(at(9, 0))),
            process: Arc::new(ScriptedProcess::new(running)),
            store,
            server: MockServer::start().await,
        }
    }

    async fn respond(&self, template: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    fn journal(&self, name: &str) -> Journal {
        Journal::new(
            self.dir.path().join("logs").join(name),
            LogCap::default(),
            self.clock.clone(),
        )
    }

    fn ledger_path(&self) -> PathBuf {
        self.dir.path().join("state/restarts.json")
    }

    fn monitor(&self, ceiling: u32) -> HealthMonitor {
        let alerts = Arc::new(AlertManager::from_config(
            &AlertsConfig::default(),
            self.journal("alerts.log"),
            self.clock.clone(),
        ));
        let backup = Arc::new(BackupOrchestrator::new(
            self.store.clone(),
            self.dir.path().join("volume"),
            7,
            self.clock.clone(),
            self.journal("backup.log"),
        ));
        let probe = HealthProbe::new(
            format!("{}/health", self.server.uri()),
            Duration::from_millis(500),
        )
        .unwrap();

        HealthMonitor::new(
            "svc",
            self.process.clone(),
            probe,
            self.ledger_path(),
            self.clock.clone(),
            self.journal("health.log"),
            alerts,
        )
        .with_policy(RestartPolicy {
            ceiling,
            window: chrono::Duration::hours(1),
            settle: Duration::ZERO,
        })
        .with_backup(backup)
    }

    fn alert_lines(&self) -> Vec<String> {
        self.journal("alerts.log").lines().unwrap()
    }

    fn health_lines(&self) -> Vec<String> {
        self.journal("health.log").lines().unwrap()
    }

    fn ledger(&self) -> RestartLedger {
        RestartLedger::load(self.ledger_path()).unwrap()
    }
}

#[tokio::test]
async fn test_healthy_service_raises_no_alerts() {
    let h = Harness::new().await;
    h.respond(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .await;

    let report = h.monitor(3).run().await.unwrap();

    assert_eq!(report.record.status, HealthStatus::Ok);
    assert_eq!(report.record.http_status, Some(200));
    assert!(!report.started && !report.restarted);
    assert!(report.catch_up.is_none());
    assert!(report.degradations.is_empty());
    assert!(h.alert_lines().is_empty());
    assert_eq!(h.health_lines(), vec!["[2026-03-14 09:00:00] status=OK http=200".to_string()]);
    assert_eq!(h.process.count("restart"), 0);
}

#[tokio::test]
async fn test_failed_probes_restart_until_ceiling() {
    let h = Harness::new().await;
    h.respond(ResponseTemplate::new(503)).await;
    let monitor = h.monitor(3);

    for n in 1..=3 {
        let report = monitor.run().await.unwrap();
        assert!(report.restarted);
        assert_eq!(report.restarts_in_window, n);
        h.clock.advance(chrono::Duration::minutes(5));
    }
    assert_eq!(h.process.count("restart"), 3);

    let err = monitor.run().await.unwrap_err();

    assert!(matches!(
        err,
        TaskError::RestartCeiling {
            restarts: 3,
            ceiling: 3
        }
    ));
    assert_eq!(err.class(), FailureClass::ExhaustedRetry);
    assert_eq!(err.exit_code(), 1);
    assert_eq!(h.process.count("restart"), 3);

    let alerts = h.alert_lines();
    assert_eq!(alerts.len(), 4);
    assert!(alerts[..3].iter().all(|l| l.contains("[WARNING]")));
    assert!(alerts[3].contains("[CRITICAL]"));
    assert!(alerts[3].contains("manual intervention"));

    assert_eq!(h.ledger().len(), 3);
    let attempts = h
        .health_lines()
        .iter()
        .filter(|l| l.contains("Restart attempt: started"))
        .count();
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn test_restarts_outside_window_do_not_count() {
    let h = Harness::new().await;
    let mut ledger = h.ledger();
    for m in [0, 10, 20] {
        ledger.record(RestartAttempt {
            timestamp: at(7, m),
            reason: "health probe failed: HTTP 503".to_string(),
            outcome: RestartOutcome::Started,
        });
    }
    ledger.save().unwrap();
    h.respond(ResponseTemplate::new(500)).await;

    let report = h.monitor(3).run().await.unwrap();

    assert!(report.restarted);
    assert_eq!(report.restarts_in_window, 1);
    assert_eq!(h.ledger().len(), 4);
}

#[tokio::test]
async fn test_failed_restart_is_recorded_but_not_counted() {
    let h = Harness::new().await;
    h.respond(ResponseTemplate::new(503)).await;
    h.process.fail_next_restart("daemon not responding");
    let monitor = h.monitor(1);

    let report = monitor.run().await.unwrap();
    assert!(!report.restarted);
    assert_eq!(report.restarts_in_window, 0);
    assert_eq!(report.degradations.len(), 1);
    assert_eq!(report.degradations[0].class, FailureClass::Transient);
    let attempts: Vec<_> = h.ledger().attempts().cloned().collect();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, RestartOutcome::Failed);
    assert!(h.alert_lines()[0].contains("[ALERT]"));

    // The failed attempt leaves room for a real restart.
    let report = monitor.run().await.unwrap();
    assert!(report.restarted);

    assert!(monitor.run().await.is_err());
}

#[tokio::test]
async fn test_probe_timeout_counts_as_failure() {
    let h = Harness::new().await;
    h.respond(
        ResponseTemplate::new(200)
            .set_body_json(json!({"status": "OK"}))
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let report = h.monitor(3).run().await.unwrap();

    assert!(report.restarted);
    assert_eq!(report.record.http_status, None);
    assert_eq!(report.record.detail.as_deref(), Some("timed out"));
}

#[tokio::test]
async fn test_stopped_process_is_started() {
    let h = Harness::with(false, true).await;
    h.respond(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .await;

    let report = h.monitor(3).run().await.unwrap();

    assert!(report.started);
    assert!(!report.restarted);
    assert_eq!(report.restarts_in_window, 1);
    assert_eq!(h.process.calls(), vec!["is_running svc", "start svc"]);
    assert!(h.process.running());

    let attempts: Vec<_> = h.ledger().attempts().cloned().collect();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].reason, "process not running");
    assert_eq!(attempts[0].outcome, RestartOutcome::Started);
    assert!(h.alert_lines()[0].contains("has been started"));
}

#[tokio::test]
async fn test_failed_start_is_transient() {
    let h = Harness::with(false, true).await;
    h.process.fail_next_start("no such container");
    h.respond(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .await;

    let report = h.monitor(3).run().await.unwrap();

    assert!(!report.started);
    assert_eq!(report.degradations[0].class, FailureClass::Transient);
    assert_eq!(h.ledger().attempts().next().unwrap().outcome, RestartOutcome::Failed);
}

#[tokio::test]
async fn test_degraded_alerts_without_restart() {
    let h = Harness::new().await;
    h.respond(ResponseTemplate::new(200).set_body_json(json!({"status": "DEGRADED"})))
        .await;

    let report = h.monitor(3).run().await.unwrap();

    assert_eq!(report.record.status, HealthStatus::Degraded);
    assert!(!report.restarted);
    let alerts = h.alert_lines();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("[WARNING] Health: svc reports DEGRADED"));
    assert_eq!(h.process.count("restart"), 0);
}

#[tokio::test]
async fn test_unhealthy_body_alerts_without_restart() {
    let h = Harness::new().await;
    h.respond(ResponseTemplate::new(200).set_body_json(json!({"status": "UNHEALTHY"})))
        .await;

    let report = h.monitor(3).run().await.unwrap();

    assert!(!report.restarted);
    let alerts = h.alert_lines();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("[ALERT] Health: svc reports UNHEALTHY"));
}

#[tokio::test]
async fn test_warnings_are_alerted_even_when_ok() {
    let h = Harness::new().await;
    h.respond(ResponseTemplate::new(200).set_body_json(json!({
        "status": "OK",
        "warnings": ["HNSW index 2.1 GB", "disk 91% full"],
        "disk": {"total_mb": 2150.0, "hnsw_mb": 2100.0}
    })))
    .await;

    let report = h.monitor(3).run().await.unwrap();

    assert_eq!(report.record.warnings.len(), 2);
    let alerts = h.alert_lines();
    assert_eq!(alerts.len(), 2);
    assert!(alerts[0].ends_with("[WARNING] Health: svc: HNSW index 2.1 GB"));
    assert!(alerts[1].ends_with("[WARNING] Health: svc: disk 91% full"));
    assert!(h.health_lines()[0].ends_with("status=OK http=200 warnings=2"));
}

#[tokio::test]
async fn test_unrecognized_body_is_unknown() {
    let h = Harness::new().await;
    h.respond(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .await;

    let report = h.monitor(3).run().await.unwrap();

    assert_eq!(report.record.status, HealthStatus::Unknown);
    assert!(!report.restarted);
    let alerts = h.alert_lines();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("unrecognized health response"));
}

#[tokio::test]
async fn test_catch_up_backup_when_today_missing() {
    let h = Harness::with(true, false).await;
    h.store.insert(at(2, 0) - chrono::Duration::days(1)).await;
    h.respond(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .await;

    let report = h.monitor(3).run().await.unwrap();

    let snapshot = report.catch_up.unwrap();
    assert_eq!(snapshot.created_at, at(9, 0));
    assert_eq!(h.store.list().await.unwrap().len(), 2);
    assert!(h
        .health_lines()
        .iter()
        .any(|l| l.contains("Catch-up backup created: svc-20260314_090000.tar.gz")));
}

#[tokio::test]
async fn test_no_catch_up_when_today_present() {
    let h = Harness::new().await;
    h.respond(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .await;

    let report = h.monitor(3).run().await.unwrap();

    assert!(report.catch_up.is_none());
    assert_eq!(h.store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_catch_up_is_not_fatal() {
    let h = Harness::with(true, false).await;
    h.store.set_fail_create(true);
    h.respond(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .await;

    let report = h.monitor(3).run().await.unwrap();

    assert!(report.catch_up.is_none());
    assert_eq!(report.degradations.len(), 1);
    assert_eq!(report.degradations[0].class, FailureClass::BestEffort);
    let alerts = h.alert_lines();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("Catch-up backup failed"));
}

#[tokio::test]
async fn test_catch_up_runs_even_at_ceiling() {
    let h = Harness::with(true, false).await;
    h.respond(ResponseTemplate::new(503)).await;

    let err = h.monitor(0).run().await.unwrap_err();

    assert!(matches!(err, TaskError::RestartCeiling { .. }));
    assert_eq!(h.store.list().await.unwrap().len(), 1);
    assert_eq!(h.process.count("restart"), 0);
}

#[test]
fn test_record_line_for_failure() {
    let record = HealthRecord::from_outcome(
        at(9, 0),
        &ProbeOutcome::Failed {
            http_status: Some(502),
            reason: "HTTP 502".to_string(),
        },
    );
    assert_eq!(record.status, HealthStatus::Unhealthy);
    assert_eq!(record.format_line(), "status=UNHEALTHY http=502 detail=HTTP 502");
}

#[test]
fn test_policy_from_config() {
    let config = ServiceConfig {
        restart_ceiling: 5,
        restart_window_secs: 600,
        settle_secs: 2,
        ..Default::default()
    };
    let policy = RestartPolicy::from_config(&config).unwrap();
    assert_eq!(policy.ceiling, 5);
    assert_eq!(policy.window, chrono::Duration::minutes(10));
    assert_eq!(policy.settle, Duration::from_secs(2));
}

#[test]
fn test_policy_rejects_unrepresentable_window() {
    for secs in [u64::MAX, 100_000_000_000_000_000] {
        let config = ServiceConfig {
            restart_window_secs: secs,
            ..Default::default()
        };
        let err = RestartPolicy::from_config(&config).unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)), "window {}", secs);
        assert!(err.to_string().contains("service.restart_window_secs"));
    }
}

#[test]
fn test_default_policy_window() {
    assert_eq!(RestartPolicy::default().window, chrono::Duration::hours(1));
    assert_eq!(
        restart_window(3600).unwrap(),
        RestartPolicy::from_config(&ServiceConfig::default()).unwrap().window
    );
}
