use std::io::SeekFrom;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::RwLock;

use super::validate_id;
use crate::error::StoreError;

/// Suffix of an active, append-only log
pub const ACTIVE_SUFFIX: &str = ".log";
/// Suffix of a compressed archive (gzip, then base64)
pub const ARCHIVE_SUFFIX: &str = ".gz.b64";

/// Which kind of stream to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Active,
    Archived,
}

/// Append-only per-check log streams plus their compressed archives
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one line to a stream, creating it when absent
    async fn append(&self, stream_id: &str, line: &str) -> Result<(), StoreError>;

    /// List stream ids (suffix stripped) of the given kind
    async fn list(&self, kind: LogKind) -> Result<Vec<String>, StoreError>;

    /// Read the whole content of an active stream
    async fn read_full(&self, stream_id: &str) -> Result<Vec<u8>, StoreError>;

    /// Persist an archive; fails with `AlreadyExists` if the id is taken
    async fn write_archive(&self, archive_id: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Read the raw (still encoded) bytes of an archive
    async fn read_archive(&self, archive_id: &str) -> Result<Vec<u8>, StoreError>;

    /// Drop the first `archived_len` bytes of an active stream without
    /// deleting it. Lines appended after those bytes were read are kept, so
    /// with no concurrent writer the stream ends up empty.
    async fn truncate(&self, stream_id: &str, archived_len: u64) -> Result<(), StoreError>;
}

/// Flat directory of `<id>.log` and `<archive-id>.gz.b64` files
pub struct FileLogStore {
    base_dir: PathBuf,
    /// Appends share it, full reads and truncation take it exclusively
    rewrite_lock: RwLock<()>,
}

impl FileLogStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), rewrite_lock: RwLock::new(()) }
    }

    fn active_path(&self, stream_id: &str) -> Result<PathBuf, StoreError> {
        validate_id(stream_id)?;
        Ok(self.base_dir.join(format!("{stream_id}{ACTIVE_SUFFIX}")))
    }

    fn archive_path(&self, archive_id: &str) -> Result<PathBuf, StoreError> {
        validate_id(archive_id)?;
        Ok(self.base_dir.join(format!("{archive_id}{ARCHIVE_SUFFIX}")))
    }

    fn not_found(id: &str) -> StoreError {
        StoreError::NotFound { kind: "logs".to_string(), id: id.to_string() }
    }
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn append(&self, stream_id: &str, line: &str) -> Result<(), StoreError> {
        let path = self.active_path(stream_id)?;
        fs::create_dir_all(&self.base_dir).await?;

        let _guard = self.rewrite_lock.read().await;
        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path).await?;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        file.write_all(&buf).await?;
        file.flush().await?;

        Ok(())
    }

    async fn list(&self, kind: LogKind) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let suffix = match kind {
            LogKind::Active => ACTIVE_SUFFIX,
            LogKind::Archived => ARCHIVE_SUFFIX,
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|name| name.strip_suffix(suffix)) {
                ids.push(id.to_string());
            }
        }
        ids.sort();

        Ok(ids)
    }

    async fn read_full(&self, stream_id: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.active_path(stream_id)?;

        // Exclusive so no append is halfway through its line
        let _guard = self.rewrite_lock.write().await;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Self::not_found(stream_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_archive(&self, archive_id: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.archive_path(archive_id)?;
        fs::create_dir_all(&self.base_dir).await?;

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(archive_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(data).await?;
        // The archive must be durable before its source may be truncated
        file.sync_all().await?;

        Ok(())
    }

    async fn read_archive(&self, archive_id: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.archive_path(archive_id)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Self::not_found(archive_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn truncate(&self, stream_id: &str, archived_len: u64) -> Result<(), StoreError> {
        let path = self.active_path(stream_id)?;

        let _guard = self.rewrite_lock.write().await;
        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Self::not_found(stream_id));
            }
            Err(e) => return Err(e.into()),
        };

        let mut tail = Vec::new();
        if file.metadata().await?.len() > archived_len {
            file.seek(SeekFrom::Start(archived_len)).await?;
            file.read_to_end(&mut tail).await?;
        }
        drop(file);

        // The active log is replaced in one rename: until then it still holds
        // both the archived prefix and the tail
        let temp = path.with_file_name(format!("{stream_id}{ACTIVE_SUFFIX}.tmp"));
        let mut rewritten = fs::File::create(&temp).await?;
        rewritten.write_all(&tail).await?;
        rewritten.sync_all().await?;
        drop(rewritten);
        fs::rename(&temp, &path).await?;

        Ok(())
    }
}
