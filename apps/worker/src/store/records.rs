use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::validate_id;
use crate::error::StoreError;

/// Collection holding check records
pub const CHECKS: &str = "checks";

/// Keyed record persistence shared with the CRUD layer.
///
/// Records are handled as raw JSON: the worker validates them itself and must
/// cope with whatever another writer left behind.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List the ids stored under `kind`
    async fn list(&self, kind: &str) -> Result<Vec<String>, StoreError>;

    /// Read one record
    async fn read(&self, kind: &str, id: &str) -> Result<Value, StoreError>;

    /// Overwrite an existing record as a whole
    async fn update(&self, kind: &str, id: &str, record: &Value) -> Result<(), StoreError>;

    /// Create a record, failing if one already exists
    async fn create(&self, kind: &str, id: &str, record: &Value) -> Result<(), StoreError>;

    /// Remove a record
    async fn delete(&self, kind: &str, id: &str) -> Result<(), StoreError>;
}

/// One JSON file per record: `<base_dir>/<kind>/<id>.json`
///
/// Updates go through a sibling temp file that is renamed into place, so a
/// reader sees either the old or the new record, never a partial one.
pub struct FileRecordStore {
    base_dir: PathBuf,
    temp_seq: AtomicU64,
}

impl FileRecordStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), temp_seq: AtomicU64::new(0) }
    }

    fn record_path(&self, kind: &str, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(kind)?;
        validate_id(id)?;
        Ok(self.base_dir.join(kind).join(format!("{id}.json")))
    }

    fn not_found(kind: &str, id: &str) -> StoreError {
        StoreError::NotFound { kind: kind.to_string(), id: id.to_string() }
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn list(&self, kind: &str) -> Result<Vec<String>, StoreError> {
        validate_id(kind)?;
        let dir = self.base_dir.join(kind);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|name| name.strip_suffix(".json")) {
                ids.push(id.to_string());
            }
        }
        ids.sort();

        Ok(ids)
    }

    async fn read(&self, kind: &str, id: &str) -> Result<Value, StoreError> {
        let path = self.record_path(kind, id)?;
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Self::not_found(kind, id));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&raw)?)
    }

    async fn update(&self, kind: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.record_path(kind, id)?;
        let data = serde_json::to_vec(record)?;

        // Updates only touch records that already exist
        match fs::metadata(&path).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Self::not_found(kind, id));
            }
            Err(e) => return Err(e.into()),
        }

        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let temp = path.with_file_name(format!("{id}.json.{seq}.tmp"));

        let written = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn create(&self, kind: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.record_path(kind, id)?;
        let data = serde_json::to_vec(record)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(format!("{kind}/{id}")));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&data).await?;
        file.flush().await?;

        Ok(())
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<(), StoreError> {
        let path = self.record_path(kind, id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Self::not_found(kind, id)),
            Err(e) => Err(e.into()),
        }
    }
}
