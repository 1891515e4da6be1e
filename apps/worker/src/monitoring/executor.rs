use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::prober::Prober;
use super::state::{self, Evaluation};
use super::types::{LogEntry, Outcome};
use crate::alerts::AlertTransport;
use crate::checks::{Check, CheckState, Eligibility, validate_check};
use crate::error::WorkerError;
use crate::store::{CHECKS, LogStore, RecordStore};

/// What happened to one check during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub check_id: String,
    pub outcome: Outcome,
    pub state: CheckState,
    pub alert_triggered: bool,
    pub alert_sent: bool,
    pub logged: bool,
}

/// Counters for one gather cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub listed: usize,
    pub probed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub alerts_sent: usize,
}

/// Monitoring executor - loads, probes and updates checks.
///
/// Holds every collaborator the worker needs; built once at startup and
/// shared by reference with the scheduler.
pub struct MonitoringExecutor {
    records: Arc<dyn RecordStore>,
    logs: Arc<dyn LogStore>,
    prober: Arc<dyn Prober>,
    alerts: Arc<dyn AlertTransport>,
}

impl MonitoringExecutor {
    pub fn new(
        records: Arc<dyn RecordStore>,
        logs: Arc<dyn LogStore>,
        prober: Arc<dyn Prober>,
        alerts: Arc<dyn AlertTransport>,
    ) -> Self {
        Self { records, logs, prober, alerts }
    }

    /// Run one cycle over every stored check.
    ///
    /// Each check gets its own task; a failing or panicking check never
    /// affects the others. Returns once all tasks finished.
    pub async fn gather_all_checks(self: &Arc<Self>) -> CycleSummary {
        let ids = match self.records.list(CHECKS).await {
            Ok(ids) if !ids.is_empty() => ids,
            Ok(_) => {
                warn!("Could not find any checks to process");
                return CycleSummary::default();
            }
            Err(e) => {
                error!(error = %e, "Could not list checks");
                return CycleSummary::default();
            }
        };

        let mut summary = CycleSummary { listed: ids.len(), ..CycleSummary::default() };
        let mut tasks = JoinSet::new();

        for id in ids {
            let executor = Arc::clone(self);
            tasks.spawn(async move { executor.run_check(&id).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(report)) => {
                    summary.probed += 1;
                    if report.alert_sent {
                        summary.alerts_sent += 1;
                    }
                }
                Ok(Err(WorkerError::SkippableRecord(reason))) => {
                    warn!(%reason, "Check skipped");
                    summary.skipped += 1;
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Check failed");
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(error = %e, "Check task aborted");
                    summary.failed += 1;
                }
            }
        }

        info!(
            listed = summary.listed,
            probed = summary.probed,
            skipped = summary.skipped,
            failed = summary.failed,
            alerts = summary.alerts_sent,
            "Check cycle finished"
        );
        summary
    }

    /// Load, validate and process a single stored check
    pub async fn run_check(&self, id: &str) -> Result<ProbeReport, WorkerError> {
        let raw = self
            .records
            .read(CHECKS, id)
            .await
            .map_err(|e| WorkerError::SkippableRecord(format!("could not read check {id}: {e}")))?;

        match validate_check(&raw) {
            Eligibility::Eligible(check) => self.process_check(raw, check).await,
            Eligibility::Ineligible(record) => Err(record.into()),
        }
    }

    /// Probe an eligible check, persist its new state, log the outcome and
    /// alert the owner if the state flipped, in that order.
    ///
    /// `record` is the stored record `check` was validated from; only its
    /// `state` and `lastChecked` are rewritten.
    pub async fn process_check(
        &self,
        mut record: Value,
        check: Check,
    ) -> Result<ProbeReport, WorkerError> {
        let outcome = self.prober.probe(&check).await;
        let evaluation = state::evaluate(&check, &outcome);
        let now = chrono::Utc::now().timestamp_millis();
        let updated = state::apply(&check, &evaluation, now);
        state::stamp_record(&mut record, &evaluation, now);

        debug!(check_id = %check.id, %outcome, state = %evaluation.state, "Probe finished");

        let persisted = self.persist(&check.id, &record).await;
        let logged = self.log_outcome(&check, &outcome, &evaluation, now).await;

        // Without a stored transition the next cycle sees the old state and
        // raises the alert itself
        if let Err(e) = persisted {
            if evaluation.alert_triggered {
                warn!(check_id = %check.id, "State change not persisted, alert withheld");
            }
            return Err(e);
        }

        let alert_sent = if evaluation.alert_triggered {
            self.alert_status_change(&updated).await
        } else {
            debug!(check_id = %check.id, "No alert needed");
            false
        };

        Ok(ProbeReport {
            check_id: check.id,
            outcome,
            state: evaluation.state,
            alert_triggered: evaluation.alert_triggered,
            alert_sent,
            logged,
        })
    }

    async fn persist(&self, check_id: &str, record: &Value) -> Result<(), WorkerError> {
        self.records.update(CHECKS, check_id, record).await.map_err(|source| {
            WorkerError::Persistence {
                check_id: check_id.to_string(),
                what: "check record",
                source,
            }
        })
    }

    async fn log_outcome(
        &self,
        check: &Check,
        outcome: &Outcome,
        evaluation: &Evaluation,
        time: i64,
    ) -> bool {
        let entry = LogEntry {
            check: check.clone(),
            outcome: outcome.clone(),
            state: evaluation.state,
            alert_triggered: evaluation.alert_triggered,
            time,
        };

        let result = match serde_json::to_string(&entry) {
            Ok(line) => self.logs.append(&check.id, &line).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => true,
            Err(source) => {
                let e = WorkerError::Persistence {
                    check_id: check.id.clone(),
                    what: "log entry",
                    source,
                };
                error!(check_id = %check.id, error = %e, "Log append failed");
                false
            }
        }
    }

    async fn alert_status_change(&self, updated: &Check) -> bool {
        let message = state::alert_message(updated);

        match self.alerts.send(&updated.user_phone, &message).await {
            Ok(()) => {
                info!(check_id = %updated.id, %message, "User was alerted to the status change");
                true
            }
            Err(source) => {
                let e = WorkerError::AlertDispatch { check_id: updated.id.clone(), source };
                error!(check_id = %updated.id, error = %e, "Alert dispatch failed");
                false
            }
        }
    }
}
