mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};

use common::*;
use uptime_worker::StoreError;
use uptime_worker::WorkerError;
use uptime_worker::alerts::AlertTransport;
use uptime_worker::checks::{Check, CheckState};
use uptime_worker::monitoring::{
    HttpProber, LogEntry, MonitoringExecutor, Outcome, ProbeErrorKind, Prober,
};
use uptime_worker::store::{CHECKS, FileLogStore, FileRecordStore, LogStore, RecordStore};

struct Harness {
    _dir: TempDir,
    records: Arc<FileRecordStore>,
    logs: Arc<FileLogStore>,
    alerts: Arc<RecordingTransport>,
    executor: Arc<MonitoringExecutor>,
}

impl Harness {
    fn new(prober: Arc<dyn Prober>, alerts: RecordingTransport) -> Self {
        let dir = tempdir().unwrap();
        let records = Arc::new(FileRecordStore::new(dir.path().join("data")));
        let logs = Arc::new(FileLogStore::new(dir.path().join("logs")));
        let alerts = Arc::new(alerts);
        let executor = Arc::new(MonitoringExecutor::new(
            records.clone(),
            logs.clone(),
            prober,
            alerts.clone() as Arc<dyn AlertTransport>,
        ));
        Self { _dir: dir, records, logs, alerts, executor }
    }

    async fn stored_check(&self, id: &str) -> Check {
        serde_json::from_value(self.records.read(CHECKS, id).await.unwrap()).unwrap()
    }

    async fn log_entries(&self, id: &str) -> Vec<LogEntry> {
        let raw = self.logs.read_full(id).await.unwrap_or_default();
        String::from_utf8(raw)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

fn http_prober() -> Arc<dyn Prober> {
    Arc::new(HttpProber::new("uptime-worker-tests", false).unwrap())
}

#[tokio::test]
async fn test_up_check_answering_500_goes_down_and_alerts_once() {
    let server = spawn_stub(StubBehavior::Status(500)).await;
    let harness = Harness::new(http_prober(), RecordingTransport::default());

    let url = format!("{}/health", server.addr);
    let mut record = check_record(CHECK_ID, &url);
    record["state"] = json!("up");
    record["lastChecked"] = json!(T0);
    harness.records.create(CHECKS, CHECK_ID, &record).await.unwrap();

    let summary = harness.executor.gather_all_checks().await;
    assert_eq!(summary.listed, 1);
    assert_eq!(summary.probed, 1);
    assert_eq!(summary.alerts_sent, 1);

    let stored = harness.stored_check(CHECK_ID).await;
    assert_eq!(stored.state, CheckState::Down);
    assert!(stored.last_checked.unwrap() > T0);

    let entries = harness.log_entries(CHECK_ID).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, Outcome::response(500));
    assert_eq!(entries[0].state, CheckState::Down);
    assert!(entries[0].alert_triggered);
    // The logged check is the record as it was before the probe
    assert_eq!(entries[0].check.state, CheckState::Up);
    assert_eq!(entries[0].check.last_checked, Some(T0));

    let sent = harness.alerts.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, PHONE);
    assert_eq!(
        sent[0].1,
        format!("Alert: your check for GET http://{url} is currently down")
    );

    let requests = server.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("GET /health HTTP/1.1"));
}

#[tokio::test]
async fn test_silent_target_times_out_at_check_timeout() {
    let server = spawn_stub(StubBehavior::Hang).await;
    let harness = Harness::new(http_prober(), RecordingTransport::default());

    let mut record = check_record(CHECK_ID, &server.addr.to_string());
    record["timeoutSeconds"] = json!(1);
    harness.records.create(CHECKS, CHECK_ID, &record).await.unwrap();

    let started = Instant::now();
    let report = harness.executor.run_check(CHECK_ID).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(900), "returned too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "timeout not enforced: {elapsed:?}");

    assert_eq!(report.outcome.error().map(|e| e.kind), Some(ProbeErrorKind::Timeout));
    assert_eq!(report.outcome.response_code(), None);
    assert_eq!(report.state, CheckState::Down);
    // Never probed before, so no transition to report
    assert!(!report.alert_triggered);
}

#[tokio::test]
async fn test_success_code_marks_check_up() {
    let server = spawn_stub(StubBehavior::Status(200)).await;
    let harness = Harness::new(http_prober(), RecordingTransport::default());

    let record = check_record(CHECK_ID, &server.addr.to_string());
    harness.records.create(CHECKS, CHECK_ID, &record).await.unwrap();

    let report = harness.executor.run_check(CHECK_ID).await.unwrap();
    assert_eq!(report.outcome, Outcome::response(200));
    assert_eq!(report.state, CheckState::Up);
    assert_eq!(harness.stored_check(CHECK_ID).await.state, CheckState::Up);
}

#[tokio::test]
async fn test_check_run_keeps_fields_the_worker_does_not_model() {
    let prober = Arc::new(ScriptedProber::always(Outcome::response(200)));
    let harness = Harness::new(prober, RecordingTransport::default());

    let mut record = check_record(CHECK_ID, "example.com");
    record["label"] = json!("homepage");
    record["createdAt"] = json!(T0);
    record["tags"] = json!(["prod", "eu"]);
    harness.records.create(CHECKS, CHECK_ID, &record).await.unwrap();

    harness.executor.run_check(CHECK_ID).await.unwrap();

    let stored = harness.records.read(CHECKS, CHECK_ID).await.unwrap();
    assert_eq!(stored["label"], json!("homepage"));
    assert_eq!(stored["createdAt"], json!(T0));
    assert_eq!(stored["tags"], json!(["prod", "eu"]));
    assert_eq!(stored["state"], json!("up"));
    assert!(stored["lastChecked"].as_i64().unwrap() > T0);

    // Nothing else was added or dropped
    let mut expected = record.clone();
    expected["state"] = stored["state"].clone();
    expected["lastChecked"] = stored["lastChecked"].clone();
    assert_eq!(stored, expected);
}

#[tokio::test]
async fn test_first_probe_never_alerts() {
    let prober = Arc::new(ScriptedProber::always(Outcome::network("connection refused")));
    let harness = Harness::new(prober, RecordingTransport::default());

    harness.records.create(CHECKS, CHECK_ID, &check_record(CHECK_ID, "example.com")).await.unwrap();

    let report = harness.executor.run_check(CHECK_ID).await.unwrap();
    assert_eq!(report.state, CheckState::Down);
    assert!(!report.alert_triggered);
    assert!(!report.alert_sent);
    assert!(report.logged);

    let stored = harness.stored_check(CHECK_ID).await;
    assert!(stored.last_checked.is_some());
    assert!(harness.alerts.messages().is_empty());
}

#[tokio::test]
async fn test_alerts_only_on_transitions() {
    let prober = Arc::new(ScriptedProber::sequence(vec![
        Outcome::response(200),
        Outcome::response(200),
        Outcome::response(503),
        Outcome::timeout(),
        Outcome::response(200),
    ]));
    let harness = Harness::new(prober.clone(), RecordingTransport::default());

    harness.records.create(CHECKS, CHECK_ID, &check_record(CHECK_ID, "example.com")).await.unwrap();

    let mut triggered = Vec::new();
    for _ in 0..5 {
        let report = harness.executor.run_check(CHECK_ID).await.unwrap();
        triggered.push(report.alert_triggered);
    }

    assert_eq!(triggered, vec![false, false, true, false, true]);
    assert_eq!(prober.calls(), 5);

    let sent = harness.alerts.messages();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.ends_with("is currently down"));
    assert!(sent[1].1.ends_with("is currently up"));

    let entries = harness.log_entries(CHECK_ID).await;
    assert_eq!(entries.len(), 5);
    let states: Vec<_> = entries.iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![CheckState::Up, CheckState::Up, CheckState::Down, CheckState::Down, CheckState::Up]
    );
    for entry in &entries {
        assert!(entry.outcome.error().is_some() ^ entry.outcome.response_code().is_some());
    }
}

#[tokio::test]
async fn test_ineligible_records_are_skipped_untouched() {
    let prober = Arc::new(ScriptedProber::always(Outcome::response(200)));
    let harness = Harness::new(prober.clone(), RecordingTransport::default());

    let mut no_codes = check_record(CHECK_ID, "example.com");
    no_codes["successCodes"] = json!([]);
    let mut slow = check_record(OTHER_CHECK_ID, "example.com");
    slow["timeoutSeconds"] = json!(6);

    harness.records.create(CHECKS, CHECK_ID, &no_codes).await.unwrap();
    harness.records.create(CHECKS, OTHER_CHECK_ID, &slow).await.unwrap();

    let summary = harness.executor.gather_all_checks().await;
    assert_eq!(summary.listed, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.probed, 0);
    assert_eq!(prober.calls(), 0);

    assert_eq!(harness.records.read(CHECKS, CHECK_ID).await.unwrap(), no_codes);
    assert_eq!(harness.records.read(CHECKS, OTHER_CHECK_ID).await.unwrap(), slow);
    assert!(harness.log_entries(CHECK_ID).await.is_empty());
    assert!(harness.log_entries(OTHER_CHECK_ID).await.is_empty());
}

#[tokio::test]
async fn test_bad_record_does_not_affect_others() {
    let prober = Arc::new(ScriptedProber::always(Outcome::response(200)));
    let harness = Harness::new(prober, RecordingTransport::default());

    let mut broken = check_record(CHECK_ID, "example.com");
    broken["method"] = json!("patch");
    harness.records.create(CHECKS, CHECK_ID, &broken).await.unwrap();
    harness
        .records
        .create(CHECKS, OTHER_CHECK_ID, &check_record(OTHER_CHECK_ID, "example.org"))
        .await
        .unwrap();

    let summary = harness.executor.gather_all_checks().await;
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.probed, 1);
    assert_eq!(harness.stored_check(OTHER_CHECK_ID).await.state, CheckState::Up);
}

#[tokio::test]
async fn test_empty_store_is_a_no_op() {
    let prober = Arc::new(ScriptedProber::always(Outcome::response(200)));
    let harness = Harness::new(prober.clone(), RecordingTransport::default());

    let summary = harness.executor.gather_all_checks().await;
    assert_eq!(summary, Default::default());
    assert_eq!(prober.calls(), 0);
}

#[tokio::test]
async fn test_failed_alert_keeps_new_state() {
    let prober = Arc::new(ScriptedProber::always(Outcome::response(500)));
    let harness = Harness::new(prober, RecordingTransport::failing());

    let mut record = check_record(CHECK_ID, "example.com");
    record["state"] = json!("up");
    record["lastChecked"] = json!(T0);
    harness.records.create(CHECKS, CHECK_ID, &record).await.unwrap();

    let report = harness.executor.run_check(CHECK_ID).await.unwrap();
    assert!(report.alert_triggered);
    assert!(!report.alert_sent);
    assert_eq!(harness.alerts.messages().len(), 1);
    assert_eq!(harness.stored_check(CHECK_ID).await.state, CheckState::Down);
}

/// Record store whose writes always fail
struct ReadOnlyRecords(FileRecordStore);

#[async_trait]
impl RecordStore for ReadOnlyRecords {
    async fn list(&self, kind: &str) -> Result<Vec<String>, StoreError> {
        self.0.list(kind).await
    }

    async fn read(&self, kind: &str, id: &str) -> Result<Value, StoreError> {
        self.0.read(kind, id).await
    }

    async fn update(&self, _kind: &str, _id: &str, _record: &Value) -> Result<(), StoreError> {
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
    }

    async fn create(&self, kind: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        self.0.create(kind, id, record).await
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<(), StoreError> {
        self.0.delete(kind, id).await
    }
}

#[tokio::test]
async fn test_unpersisted_transition_withholds_alert() {
    let dir = tempdir().unwrap();
    let inner = FileRecordStore::new(dir.path().join("data"));
    let mut record = check_record(CHECK_ID, "example.com");
    record["state"] = json!("up");
    record["lastChecked"] = json!(T0);
    inner.create(CHECKS, CHECK_ID, &record).await.unwrap();

    let logs = Arc::new(FileLogStore::new(dir.path().join("logs")));
    let alerts = Arc::new(RecordingTransport::default());
    let executor = MonitoringExecutor::new(
        Arc::new(ReadOnlyRecords(inner)),
        logs.clone(),
        Arc::new(ScriptedProber::always(Outcome::timeout())),
        alerts.clone(),
    );

    let result = executor.run_check(CHECK_ID).await;
    assert!(matches!(result, Err(WorkerError::Persistence { .. })));
    assert!(alerts.messages().is_empty());

    // The outcome is still on record
    let logged = String::from_utf8(logs.read_full(CHECK_ID).await.unwrap()).unwrap();
    assert_eq!(logged.lines().count(), 1);
}
