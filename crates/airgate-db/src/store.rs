//! # Sample Store Facade
//!
//! The durable store the sync engine talks to: SQLite table + audit sink
//! behind one handle.
//!
//! ## Store Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SampleStore                                      │
//! │                                                                         │
//! │  insert(sample)                                                         │
//! │       │                                                                 │
//! │       ├── INSERT INTO samples ... ──► Inserted(id)                      │
//! │       │        │                          │                             │
//! │       │        │                          └──► audit sink: one line     │
//! │       │        │                                                        │
//! │       │        └── UNIQUE(sample_time) hit ──► Duplicate                │
//! │       │                                        (NO audit line)          │
//! │       │                                                                 │
//! │  recover()      - startup only, in_progress → not_attempted            │
//! │  claim_batch(n) - oldest pending → in_progress, all-or-nothing         │
//! │  mark_uploaded / mark_failed - bulk by database_id                     │
//! │  shutdown()     - close the pool                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;

use tracing::{info, warn};

use airgate_core::{DataSampleSet, Sample, UploadStatus};

use crate::audit::AuditSink;
use crate::error::DbResult;
use crate::pool::{Database, DbConfig};
use crate::repository::sample::{InsertOutcome, SampleRepository};

/// Durable, crash-safe sample store with an audit-sink mirror.
pub struct SampleStore {
    db: Database,
    repo: SampleRepository,
    audit: AuditSink,
}

impl SampleStore {
    /// Opens the store: database pool, migrations, audit file.
    pub async fn open(db_config: DbConfig, audit_path: impl AsRef<Path>) -> DbResult<Self> {
        let db = Database::new(db_config).await?;
        let repo = db.samples();
        let audit = AuditSink::open(audit_path).await?;

        Ok(SampleStore { db, repo, audit })
    }

    /// Wraps an already-open database (tests, embedders).
    pub async fn with_database(db: Database, audit_path: impl AsRef<Path>) -> DbResult<Self> {
        let repo = db.samples();
        let audit = AuditSink::open(audit_path).await?;
        Ok(SampleStore { db, repo, audit })
    }

    /// Inserts a sample and mirrors it to the audit sink.
    ///
    /// On [`InsertOutcome::Duplicate`] the audit sink is NOT written - the
    /// line for that sample already exists from the first insert. An audit
    /// write failure is logged and swallowed: the row is durable in SQLite,
    /// which is the delivery guarantee that matters.
    pub async fn insert(&self, sample: &Sample) -> DbResult<InsertOutcome> {
        let outcome = self.repo.insert(sample).await?;

        if matches!(outcome, InsertOutcome::Inserted(_)) {
            if let Err(e) = self.audit.append(sample).await {
                warn!(?e, sample_time = sample.sample_time, "Audit append failed");
            }
        }

        Ok(outcome)
    }

    /// Startup crash recovery. Run once before scheduling begins.
    pub async fn recover(&self) -> DbResult<u64> {
        self.repo.reset_in_progress().await
    }

    /// Claims up to `max_size` pending samples, marking them in-progress.
    pub async fn claim_batch(&self, max_size: usize) -> DbResult<DataSampleSet> {
        self.repo.claim_batch(max_size).await
    }

    /// Marks every sample in the set as successfully uploaded.
    pub async fn mark_uploaded(&self, set: &DataSampleSet) -> DbResult<()> {
        self.repo.mark_uploaded(set).await
    }

    /// Marks every sample in the set as rejected by the server.
    pub async fn mark_failed(&self, set: &DataSampleSet) -> DbResult<()> {
        self.repo.mark_failed(set).await
    }

    /// Rows still eligible for claiming.
    pub async fn count_pending(&self) -> DbResult<i64> {
        self.repo.count_pending().await
    }

    /// Rows in a given status (diagnostics).
    pub async fn count_with_status(&self, status: UploadStatus) -> DbResult<i64> {
        self.repo.count_with_status(status).await
    }

    /// Releases the underlying pool. Call on shutdown.
    pub async fn shutdown(&self) {
        info!("Shutting down sample store");
        self.db.close().await;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use airgate_core::Sample;

    fn sample(time: u32) -> Sample {
        Sample {
            database_id: None,
            sample_time: time,
            download_time_ms: 1_700_000_000_000,
            raw_particle_count: 5,
            particle_count: 3,
            temperature_tenths_f: 712,
            humidity: 40,
            gps: None,
        }
    }

    async fn open_store(dir: &tempfile::TempDir) -> SampleStore {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        SampleStore::with_database(db, dir.path().join("audit.jsonl"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_insert_writes_no_second_audit_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        assert!(matches!(
            store.insert(&sample(1000)).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));
        assert_eq!(
            store.insert(&sample(1000)).await.unwrap(),
            InsertOutcome::Duplicate
        );

        let contents = tokio::fs::read_to_string(dir.path().join("audit.jsonl"))
            .await
            .unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn recover_then_claim_returns_previously_claimed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        for t in 1..=5u32 {
            store.insert(&sample(t)).await.unwrap();
        }
        let claimed = store.claim_batch(5).await.unwrap();
        assert_eq!(claimed.len(), 5);

        let reset = store.recover().await.unwrap();
        assert_eq!(reset, 5);

        let reclaimed = store.claim_batch(5).await.unwrap();
        assert_eq!(reclaimed.len(), 5);
        let times: Vec<u32> = reclaimed.iter().map(|s| s.sample_time).collect();
        assert_eq!(times, vec![1, 2, 3, 4, 5]);
    }
}
