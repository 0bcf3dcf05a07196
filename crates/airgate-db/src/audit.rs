//! # Audit Sink
//!
//! Append-only flat-file mirror of every newly inserted sample.
//!
//! One JSON line per sample, written at insert time and independent of the
//! upload status that row later reaches. There is no read or query API; the
//! file exists for audit and offline export. Duplicate inserts never reach
//! this sink - the store facade appends only on `InsertOutcome::Inserted`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use airgate_core::Sample;

use crate::error::{DbError, DbResult};

// =============================================================================
// Line Format
// =============================================================================

/// Shape of one audit line. Field names are part of the export format.
#[derive(Debug, Serialize)]
struct AuditLine<'a> {
    sample_time: u32,
    download_time_ms: i64,
    raw_particle_count: u16,
    particle_count: u16,
    temperature_tenths_f: u16,
    humidity: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    latitude: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    longitude: Option<&'a str>,
}

// =============================================================================
// Audit Sink
// =============================================================================

/// Append-only JSON-lines sink.
///
/// The file handle lives behind a mutex so concurrent inserts cannot
/// interleave partial lines. Every append is flushed before returning.
pub struct AuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditSink {
    /// Opens (or creates) the audit file in append mode.
    pub async fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| DbError::AuditSink(format!("{}: {e}", path.display())))?;

        info!(path = %path.display(), "Audit sink opened");

        Ok(AuditSink {
            path,
            file: Mutex::new(file),
        })
    }

    /// Appends one line for a newly inserted sample.
    pub async fn append(&self, sample: &Sample) -> DbResult<()> {
        let line = AuditLine {
            sample_time: sample.sample_time,
            download_time_ms: sample.download_time_ms,
            raw_particle_count: sample.raw_particle_count,
            particle_count: sample.particle_count,
            temperature_tenths_f: sample.temperature_tenths_f,
            humidity: sample.humidity,
            latitude: sample.gps.as_ref().map(|g| g.latitude.as_str()),
            longitude: sample.gps.as_ref().map(|g| g.longitude.as_str()),
        };

        let mut text =
            serde_json::to_string(&line).map_err(|e| DbError::AuditSink(e.to_string()))?;
        text.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;

        debug!(sample_time = sample.sample_time, "Audit line appended");
        Ok(())
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// =============================================================================
// Tests
// =============================================================================
