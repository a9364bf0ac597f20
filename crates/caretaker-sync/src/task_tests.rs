use super::*;
use crate::mirror::LocalMirror;
use caretaker_core::{FailureClass, LogCap, ManualClock};
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    dir: TempDir,
    server: MockServer,
    clock: Arc<ManualClock>,
}

impl Fixture {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("notes/daily")).unwrap();
        std::fs::write(dir.path().join("notes/daily/today.md"), "# today").unwrap();
        std::fs::write(dir.path().join("notes/scratch.tmp"), "tmp").unwrap();

        let start = NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap();
        Self {
            dir,
            server: MockServer::start().await,
            clock: Arc::new(ManualClock::new(start)),
        }
    }

    fn journal(&self) -> Journal {
        Journal::new(
            self.dir.path().join("logs/sync.log"),
            LogCap::default(),
            self.clock.clone(),
        )
    }

    fn task(&self, source: &str) -> SyncTask {
        let mirror = LocalMirror::new(self.dir.path().join("mirror"))
            .with_excludes(&["*.tmp"])
            .unwrap();
        let trigger = ReindexTrigger::new(
            format!("{}/index/trigger", self.server.uri()),
            Duration::from_millis(500),
            Duration::from_millis(300),
        )
        .unwrap();
        SyncTask::new(
            self.dir.path().join(source),
            Box::new(mirror),
            trigger,
            self.journal(),
        )
    }
}

#[tokio::test]
async fn test_mirror_then_trigger() {
    let fx = Fixture::new().await;
    Mock::given(method("POST"))
        .and(path("/index/trigger"))
        .and(body_json(json!({"full_reindex": false})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&fx.server)
        .await;

    let report = fx.task("notes").run().await.unwrap();

    assert_eq!(report.stats.transferred, 1);
    assert_eq!(report.trigger, Some(TriggerOutcome::Accepted { http_status: 202 }));
    assert!(report.degradations.is_empty());
    assert!(fx.dir.path().join("mirror/daily/today.md").exists());
    assert!(!fx.dir.path().join("mirror/scratch.tmp").exists());

    let lines = fx.journal().lines().unwrap();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].ends_with("Sync complete: 1 transferred, 0 deleted"));
    assert!(lines[2].ends_with("Reindex accepted (HTTP 202)"));
}

#[tokio::test]
async fn test_mirror_failure_never_triggers() {
    let fx = Fixture::new().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&fx.server)
        .await;

    let err = fx.task("missing").run().await.unwrap_err();

    assert!(matches!(err, TaskError::MirrorFailed(_)));
    assert_eq!(err.exit_code(), 1);
    fx.server.verify().await;
    let lines = fx.journal().lines().unwrap();
    assert!(lines.last().unwrap().contains("Sync FAILED"));
}

#[tokio::test]
async fn test_trigger_failure_is_best_effort() {
    let fx = Fixture::new().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&fx.server)
        .await;

    let report = fx.task("notes").run().await.unwrap();

    assert!(report.trigger.is_none());
    assert_eq!(report.degradations.len(), 1);
    assert_eq!(report.degradations[0].class, FailureClass::BestEffort);
    assert_eq!(report.degradations[0].class.exit_code(), 0);
    assert!(fx.dir.path().join("mirror/daily/today.md").exists());
}

#[tokio::test]
async fn test_unresponsive_trigger_returns_promptly() {
    let fx = Fixture::new().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&fx.server)
        .await;

    let started = Instant::now();
    let report = fx.task("notes").run().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.trigger, Some(TriggerOutcome::Dispatched));
    assert!(report.degradations.is_empty());
}
