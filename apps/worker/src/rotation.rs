//! Daily rotation of the per-check logs.
//!
//! Each active log is compressed into a new archive (gzip, then base64) and
//! only once that archive is on disk is the archived prefix cut from the
//! active log. A crash between the two steps leaves the log intact, so the
//! next sweep archives the same content again instead of losing it.

use std::io::{Read, Write};
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use tracing::{debug, error, info};

use crate::error::{StoreError, WorkerError};
use crate::store::{LogKind, LogStore};

/// Counters for one rotation sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RotationSummary {
    pub rotated: usize,
    pub empty: usize,
    pub failed: usize,
}

/// Compresses and truncates active logs
pub struct LogRotation {
    logs: Arc<dyn LogStore>,
}

impl LogRotation {
    pub fn new(logs: Arc<dyn LogStore>) -> Self {
        Self { logs }
    }

    /// Rotate every active log once
    pub async fn rotate_all(&self) -> RotationSummary {
        let mut summary = RotationSummary::default();

        let streams = match self.logs.list(LogKind::Active).await {
            Ok(streams) => streams,
            Err(e) => {
                error!(error = %e, "Could not list logs to rotate");
                return summary;
            }
        };

        for stream_id in streams {
            match self.rotate(&stream_id).await {
                Ok(Some(archive_id)) => {
                    debug!(stream_id, archive_id, "Log rotated");
                    summary.rotated += 1;
                }
                Ok(None) => summary.empty += 1,
                Err(e) => {
                    error!(stream_id, error = %e, "Log rotation failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            rotated = summary.rotated,
            empty = summary.empty,
            failed = summary.failed,
            "Log rotation sweep finished"
        );
        summary
    }

    /// Archive one active log and cut the archived content from it.
    ///
    /// Returns the archive id, or `None` when there was nothing to archive.
    pub async fn rotate(&self, stream_id: &str) -> Result<Option<String>, WorkerError> {
        let failed =
            |detail: String| WorkerError::Rotation { stream_id: stream_id.to_string(), detail };

        let content = self.logs.read_full(stream_id).await.map_err(|e| failed(e.to_string()))?;
        if content.is_empty() {
            return Ok(None);
        }

        let encoded = compress(&content).map_err(|e| failed(format!("compression: {e}")))?;
        let archive_id = archive_id_for(stream_id, chrono::Utc::now().timestamp_millis());

        match self.logs.write_archive(&archive_id, encoded.as_bytes()).await {
            Ok(()) => {}
            // Never truncate without an archive of our own
            Err(StoreError::AlreadyExists(id)) => {
                return Err(failed(format!("archive {id} already exists, retrying next sweep")));
            }
            Err(e) => return Err(failed(e.to_string())),
        }

        self.logs
            .truncate(stream_id, content.len() as u64)
            .await
            .map_err(|e| failed(format!("archived as {archive_id} but truncation failed: {e}")))?;

        Ok(Some(archive_id))
    }

    /// Decoded content of an archive
    pub async fn decompress(&self, archive_id: &str) -> Result<String, WorkerError> {
        let failed =
            |detail: String| WorkerError::Rotation { stream_id: archive_id.to_string(), detail };

        let raw = self.logs.read_archive(archive_id).await.map_err(|e| failed(e.to_string()))?;
        decompress(&raw).map_err(|e| failed(format!("decompression: {e}")))
    }
}

/// Archive names embed a timestamp so repeated rotations never collide
pub fn archive_id_for(stream_id: &str, now_ms: i64) -> String {
    format!("{stream_id}-{now_ms}")
}

/// gzip, then base64
pub fn compress(data: &[u8]) -> std::io::Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let gzipped = encoder.finish()?;
    Ok(STANDARD.encode(gzipped))
}

/// Inverse of [`compress`]
pub fn decompress(encoded: &[u8]) -> std::io::Result<String> {
    let trimmed = encoded.trim_ascii();
    let gzipped = STANDARD
        .decode(trimmed)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut out = String::new();
    GzDecoder::new(gzipped.as_slice()).read_to_string(&mut out)?;
    Ok(out)
}
