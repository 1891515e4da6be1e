/// Storage collaborators of the worker
///
/// Both stores are plain directories on disk. Records are keyed JSON files
/// shared with the CRUD layer; logs are append-only line files owned by the
/// worker, rotated into compressed archives.
pub mod logs;
pub mod records;

pub use logs::{FileLogStore, LogKind, LogStore};
pub use records::{CHECKS, FileRecordStore, RecordStore};

use crate::error::StoreError;

/// Reject ids that would escape the store directory
fn validate_id(id: &str) -> Result<(), StoreError> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0'])
        || id.starts_with('.');

    if bad { Err(StoreError::InvalidId(id.to_string())) } else { Ok(()) }
}
