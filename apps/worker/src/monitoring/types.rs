use serde::{Deserialize, Serialize};

use crate::checks::{Check, CheckState};

/// Classification of a failed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeErrorKind {
    Network,
    Timeout,
}

/// Why a probe produced no response. Always a `down` outcome, never a fault
/// of the worker itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.detail) {
            (ProbeErrorKind::Timeout, _) => write!(f, "timeout"),
            (ProbeErrorKind::Network, Some(detail)) => write!(f, "network error: {detail}"),
            (ProbeErrorKind::Network, None) => write!(f, "network error"),
        }
    }
}

/// Result of one probe.
///
/// Built only through [`Outcome::response`], [`Outcome::network`] and
/// [`Outcome::timeout`], so exactly one of `error` and `response_code` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    error: Option<ProbeError>,
    response_code: Option<u16>,
}

impl Outcome {
    pub fn response(code: u16) -> Self {
        Self { error: None, response_code: Some(code) }
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self {
            error: Some(ProbeError { kind: ProbeErrorKind::Network, detail: Some(detail.into()) }),
            response_code: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            error: Some(ProbeError { kind: ProbeErrorKind::Timeout, detail: None }),
            response_code: None,
        }
    }

    pub fn error(&self) -> Option<&ProbeError> {
        self.error.as_ref()
    }

    pub fn response_code(&self) -> Option<u16> {
        self.response_code
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.error, self.response_code) {
            (Some(error), _) => write!(f, "{error}"),
            (None, Some(code)) => write!(f, "HTTP {code}"),
            (None, None) => write!(f, "no result"),
        }
    }
}

/// One immutable line of a check's log stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub check: Check,
    pub outcome: Outcome,
    pub state: CheckState,
    pub alert_triggered: bool,
    /// Epoch millis at which the probe was processed
    pub time: i64,
}
