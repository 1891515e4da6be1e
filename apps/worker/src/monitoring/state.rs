use serde_json::Value;

use super::types::Outcome;
use crate::checks::{Check, CheckState};

/// Decision taken for one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub state: CheckState,
    pub alert_triggered: bool,
}

/// Derive the new state of `check` from `outcome`.
///
/// The very first probe of a check (no `last_checked`) only seeds the
/// baseline and never alerts.
pub fn evaluate(check: &Check, outcome: &Outcome) -> Evaluation {
    let up = outcome.error().is_none()
        && outcome.response_code().is_some_and(|code| check.is_success_code(code));
    let state = if up { CheckState::Up } else { CheckState::Down };

    let alert_triggered = check.last_checked.is_some() && check.state != state;

    Evaluation { state, alert_triggered }
}

/// Copy of `check` carrying the evaluated state, stamped at `now_ms`
pub fn apply(check: &Check, evaluation: &Evaluation, now_ms: i64) -> Check {
    Check { state: evaluation.state, last_checked: Some(now_ms), ..check.clone() }
}

/// Write the evaluated state and `now_ms` into the stored record.
///
/// Every other field is left as the record's owner wrote it.
pub fn stamp_record(record: &mut Value, evaluation: &Evaluation, now_ms: i64) {
    if let Value::Object(fields) = record {
        fields.insert("state".to_string(), Value::String(evaluation.state.to_string()));
        fields.insert("lastChecked".to_string(), Value::from(now_ms));
    }
}

/// Message sent to the owner on a state change
pub fn alert_message(check: &Check) -> String {
    format!(
        "Alert: your check for {} {} is currently {}",
        check.method.as_str().to_uppercase(),
        check.target(),
        check.state
    )
}
