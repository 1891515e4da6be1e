use std::io::Error as IoError;

use thiserror::Error;

use crate::alerts::AlertError;
use crate::checks::IneligibleRecord;

/// Errors raised by the record and log stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0:#}")]
    Io(#[from] IoError),

    #[error("Record not found: {kind}/{id}")]
    NotFound { kind: String, id: String },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid identifier: {0:?}")]
    InvalidId(String),
}

/// Failures inside one worker cycle.
///
/// None of these is fatal to the process; they are reported through tracing
/// and the cycle moves on to the next check. Network and timeout failures of
/// a probe are not listed here: they are a `down` outcome, see
/// [`crate::monitoring::ProbeError`].
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Record could not be read or is not eligible for probing
    #[error("Skipping check: {0}")]
    SkippableRecord(String),

    #[error("Could not persist {what} for check {check_id}: {source}")]
    Persistence {
        check_id: String,
        what: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Could not alert owner of check {check_id}: {source}")]
    AlertDispatch {
        check_id: String,
        #[source]
        source: AlertError,
    },

    #[error("Rotation of log {stream_id} failed: {detail}")]
    Rotation { stream_id: String, detail: String },
}

impl From<IneligibleRecord> for WorkerError {
    fn from(record: IneligibleRecord) -> Self {
        WorkerError::SkippableRecord(record.to_string())
    }
}
