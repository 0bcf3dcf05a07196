//! # Sample Repository
//!
//! The samples table and its per-row upload-status state machine.
//!
//! ## Claim/Mark Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Upload-Status State Machine                          │
//! │                                                                         │
//! │  insert ──► not_attempted                                              │
//! │                 │                                                       │
//! │                 │ claim_batch (transactional: SELECT oldest N,         │
//! │                 │              UPDATE each to in_progress, COMMIT)     │
//! │                 ▼                                                       │
//! │             in_progress                                                 │
//! │              │       │                                                  │
//! │   mark_uploaded    mark_failed                                          │
//! │              │       │                                                  │
//! │              ▼       ▼                                                  │
//! │          success   failure                                              │
//! │                                                                         │
//! │  Startup: reset_in_progress moves every in_progress row back to        │
//! │  not_attempted - an upload is never assumed to have survived a crash.  │
//! │                                                                         │
//! │  Rows are NEVER deleted. The table doubles as the audit trail.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{FromRow, SqlitePool};
use tracing::{debug, warn};

use airgate_core::{DataSampleSet, GpsFix, Sample, UploadStatus};

use crate::error::{DbError, DbResult};

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw row shape; converted to the domain `Sample` after status parsing.
#[derive(Debug, FromRow)]
struct SampleRow {
    id: i64,
    sample_time: u32,
    download_time_ms: i64,
    raw_particle_count: u16,
    particle_count: u16,
    temperature_tenths_f: u16,
    humidity: u16,
    gps_is_valid: Option<bool>,
    gps_latitude: Option<String>,
    gps_longitude: Option<String>,
    gps_quadrant: Option<String>,
    upload_status: String,
}

impl SampleRow {
    fn into_sample(self) -> DbResult<(Sample, UploadStatus)> {
        let status: UploadStatus =
            self.upload_status
                .parse()
                .map_err(|e: airgate_core::CoreError| DbError::CorruptRow {
                    id: self.id,
                    message: e.to_string(),
                })?;

        let gps = match (self.gps_latitude, self.gps_longitude) {
            (Some(latitude), Some(longitude)) => Some(GpsFix {
                is_valid: self.gps_is_valid.unwrap_or(false),
                latitude,
                longitude,
                quadrant: self.gps_quadrant.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok((
            Sample {
                database_id: Some(self.id),
                sample_time: self.sample_time,
                download_time_ms: self.download_time_ms,
                raw_particle_count: self.raw_particle_count,
                particle_count: self.particle_count,
                temperature_tenths_f: self.temperature_tenths_f,
                humidity: self.humidity,
                gps,
            },
            status,
        ))
    }
}

const SELECT_COLUMNS: &str = "id, sample_time, download_time_ms, raw_particle_count, \
     particle_count, temperature_tenths_f, humidity, gps_is_valid, gps_latitude, \
     gps_longitude, gps_quadrant, upload_status";

// =============================================================================
// Insert Outcome
// =============================================================================

/// Result of an insert attempt.
///
/// `Duplicate` is an expected outcome, not an error: the acquisition loop
/// treats it as "already have this sample" (success-equivalent) and must
/// NOT re-append the audit line for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row inserted; carries the new row id.
    Inserted(i64),
    /// A row with the same `sample_time` already exists.
    Duplicate,
}

// =============================================================================
// Sample Repository
// =============================================================================

/// Repository for sample persistence and upload-status transitions.
#[derive(Debug, Clone)]
pub struct SampleRepository {
    pool: SqlitePool,
}

impl SampleRepository {
    /// Creates a new SampleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SampleRepository { pool }
    }

    /// Inserts a sample with status `not_attempted`.
    ///
    /// The unique index on `sample_time` enforces the identity-by-time rule;
    /// a violation is reported as [`InsertOutcome::Duplicate`], every other
    /// database failure as a [`DbError`].
    pub async fn insert(&self, sample: &Sample) -> DbResult<InsertOutcome> {
        let (gps_is_valid, gps_latitude, gps_longitude, gps_quadrant) = match &sample.gps {
            Some(fix) => (
                Some(fix.is_valid),
                Some(fix.latitude.as_str()),
                Some(fix.longitude.as_str()),
                Some(fix.quadrant.as_str()),
            ),
            None => (None, None, None, None),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO samples (
                sample_time, download_time_ms, raw_particle_count, particle_count,
                temperature_tenths_f, humidity, gps_is_valid, gps_latitude,
                gps_longitude, gps_quadrant, upload_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(sample.sample_time)
        .bind(sample.download_time_ms)
        .bind(sample.raw_particle_count)
        .bind(sample.particle_count)
        .bind(sample.temperature_tenths_f)
        .bind(sample.humidity)
        .bind(gps_is_valid)
        .bind(gps_latitude)
        .bind(gps_longitude)
        .bind(gps_quadrant)
        .bind(UploadStatus::NotAttempted.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                let id = done.last_insert_rowid();
                debug!(sample_time = sample.sample_time, id, "Sample inserted");
                Ok(InsertOutcome::Inserted(id))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(sample_time = sample.sample_time, "Duplicate sample");
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Startup crash recovery: every `in_progress` row goes back to
    /// `not_attempted`. Must run once before scheduling begins.
    ///
    /// Returns the number of rows reset.
    pub async fn reset_in_progress(&self) -> DbResult<u64> {
        let result = sqlx::query("UPDATE samples SET upload_status = ?1 WHERE upload_status = ?2")
            .bind(UploadStatus::NotAttempted.as_str())
            .bind(UploadStatus::InProgress.as_str())
            .execute(&self.pool)
            .await?;

        let reset = result.rows_affected();
        if reset > 0 {
            warn!(reset, "Reset in-progress samples from a previous run");
        }
        Ok(reset)
    }

    /// Atomically claims up to `max_size` pending samples for upload.
    ///
    /// Selects the oldest `not_attempted` rows (insertion order) and marks
    /// them `in_progress` in one transaction. If the status update fails the
    /// transaction rolls back and an EMPTY set is returned - a batch is never
    /// partially claimed.
    pub async fn claim_batch(&self, max_size: usize) -> DbResult<DataSampleSet> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<SampleRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM samples WHERE upload_status = ?1 ORDER BY id ASC LIMIT ?2"
        ))
        .bind(UploadStatus::NotAttempted.as_str())
        .bind(max_size as i64)
        .fetch_all(&mut *tx)
        .await?;

        let mut set = DataSampleSet::with_capacity(max_size);
        for row in rows {
            let id = row.id;
            let (sample, _) = row.into_sample()?;
            set.add(sample);

            let updated = sqlx::query("UPDATE samples SET upload_status = ?1 WHERE id = ?2")
                .bind(UploadStatus::InProgress.as_str())
                .bind(id)
                .execute(&mut *tx)
                .await;

            if let Err(e) = updated {
                warn!(?e, id, "Claim status update failed, discarding batch");
                let _ = tx.rollback().await;
                return Ok(DataSampleSet::with_capacity(max_size));
            }
        }

        if let Err(e) = tx.commit().await {
            warn!(?e, "Claim commit failed, discarding batch");
            return Ok(DataSampleSet::with_capacity(max_size));
        }

        debug!(claimed = set.len(), "Claimed upload batch");
        Ok(set)
    }

    /// Marks every sample in the set `success`, matched by `database_id`.
    pub async fn mark_uploaded(&self, set: &DataSampleSet) -> DbResult<()> {
        self.mark(set, UploadStatus::Success).await
    }

    /// Marks every sample in the set `failure`, matched by `database_id`.
    pub async fn mark_failed(&self, set: &DataSampleSet) -> DbResult<()> {
        self.mark(set, UploadStatus::Failure).await
    }

    async fn mark(&self, set: &DataSampleSet, status: UploadStatus) -> DbResult<()> {
        let ids = set.database_ids();
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        for id in &ids {
            sqlx::query("UPDATE samples SET upload_status = ?1 WHERE id = ?2")
                .bind(status.as_str())
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(count = ids.len(), status = %status, "Bulk status transition");
        Ok(())
    }

    /// Counts rows eligible for claiming.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM samples WHERE upload_status = ?1")
                .bind(UploadStatus::NotAttempted.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Counts rows in a given status (diagnostics).
    pub async fn count_with_status(&self, status: UploadStatus) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM samples WHERE upload_status = ?1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

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

    #[tokio::test]
    async fn insert_then_duplicate() {
        let db = test_db().await;
        let repo = db.samples();

        let first = repo.insert(&sample(1000)).await.unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));

        // Same time, different channel values: still the same sample.
        let mut other = sample(1000);
        other.humidity = 99;
        let second = repo.insert(&other).await.unwrap();
        assert_eq!(second, InsertOutcome::Duplicate);

        assert_eq!(repo.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn claim_marks_in_progress_and_orders_by_insertion() {
        let db = test_db().await;
        let repo = db.samples();

        for t in [300u32, 100, 200] {
            repo.insert(&sample(t)).await.unwrap();
        }

        let batch = repo.claim_batch(2).await.unwrap();
        assert_eq!(batch.len(), 2);
        // Insertion order claim: 300 then 100; set iteration is time order.
        let times: Vec<u32> = batch.iter().map(|s| s.sample_time).collect();
        assert_eq!(times, vec![100, 300]);

        assert_eq!(repo.count_pending().await.unwrap(), 1);
        assert_eq!(
            repo.count_with_status(UploadStatus::InProgress).await.unwrap(),
            2
        );

        // A second claim never sees in-progress rows.
        let rest = repo.claim_batch(10).await.unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn crash_recovery_resets_in_progress() {
        let db = test_db().await;
        let repo = db.samples();

        for t in 1..=3u32 {
            repo.insert(&sample(t)).await.unwrap();
        }
        let claimed = repo.claim_batch(3).await.unwrap();
        assert_eq!(claimed.len(), 3);
        assert_eq!(repo.count_pending().await.unwrap(), 0);

        // Simulated restart.
        let reset = repo.reset_in_progress().await.unwrap();
        assert_eq!(reset, 3);

        let reclaimed = repo.claim_batch(3).await.unwrap();
        assert_eq!(reclaimed.len(), 3);
        let times: Vec<u32> = reclaimed.iter().map(|s| s.sample_time).collect();
        assert_eq!(times, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn mark_uploaded_and_failed_transition_by_id() {
        let db = test_db().await;
        let repo = db.samples();

        for t in 1..=4u32 {
            repo.insert(&sample(t)).await.unwrap();
        }

        let batch_a = repo.claim_batch(2).await.unwrap();
        let batch_b = repo.claim_batch(2).await.unwrap();

        repo.mark_uploaded(&batch_a).await.unwrap();
        repo.mark_failed(&batch_b).await.unwrap();

        assert_eq!(
            repo.count_with_status(UploadStatus::Success).await.unwrap(),
            2
        );
        assert_eq!(
            repo.count_with_status(UploadStatus::Failure).await.unwrap(),
            2
        );
        assert_eq!(
            repo.count_with_status(UploadStatus::InProgress).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn failed_claim_rolls_back_and_leaves_rows_pending() {
        let db = test_db().await;
        let repo = db.samples();

        for t in 1..=3u32 {
            repo.insert(&sample(t)).await.unwrap();
        }

        // Make the in_progress transition itself fail mid-claim.
        sqlx::query(
            r#"
            CREATE TRIGGER block_claim BEFORE UPDATE OF upload_status ON samples
            WHEN NEW.upload_status = 'in_progress'
            BEGIN
                SELECT RAISE(ABORT, 'disk full');
            END
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        // All-or-nothing: the whole batch is discarded, no row is left
        // half-claimed.
        let batch = repo.claim_batch(3).await.unwrap();
        assert!(batch.is_empty());
        assert_eq!(repo.count_pending().await.unwrap(), 3);
        assert_eq!(
            repo.count_with_status(UploadStatus::InProgress).await.unwrap(),
            0
        );

        // Once the fault clears, the same rows claim normally.
        sqlx::query("DROP TRIGGER block_claim")
            .execute(db.pool())
            .await
            .unwrap();
        let batch = repo.claim_batch(3).await.unwrap();
        assert_eq!(batch.len(), 3);
    }

    #[tokio::test]
    async fn gps_fields_round_trip() {
        let db = test_db().await;
        let repo = db.samples();

        let mut s = sample(42);
        s.gps = Some(GpsFix {
            is_valid: true,
            latitude: "40.443322".into(),
            longitude: "-79.941145".into(),
            quadrant: "NW".into(),
        });
        repo.insert(&s).await.unwrap();

        let batch = repo.claim_batch(1).await.unwrap();
        let stored = batch.iter().next().unwrap();
        let fix = stored.gps.as_ref().unwrap();
        assert!(fix.is_valid);
        assert_eq!(fix.latitude, "40.443322");
        assert_eq!(fix.longitude, "-79.941145");
        assert_eq!(fix.quadrant, "NW");
    }
}
