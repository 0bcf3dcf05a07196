//! # Acquisition and Upload Scheduler
//!
//! The two independent loops that move samples device → store → server.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Scheduler                                      │
//! │                                                                         │
//! │  ACQUISITION LOOP                      UPLOAD LOOP                      │
//! │  ─────────────────                     ───────────                      │
//! │  read historic sample                  retained batch? else claim        │
//! │      │                                     │                            │
//! │      ├─ data: insert ─► delete ─► 0s       ├─ empty ──────────► 15s     │
//! │      ├─ empty sentinel ───────► 30s        ├─ no response:              │
//! │      └─ failure ──────────────►  5s        │    RETAIN batch ──► 60s    │
//! │                                            └─ verdict: mark,            │
//! │  insert/delete ordering is the               full ► 0s  else ► 15s      │
//! │  delivery guarantee: the row is                                         │
//! │  durable BEFORE the device copy                                         │
//! │  is destroyed. A crash in between          Retained batches are never   │
//! │  costs one re-download, never a            marked failed: the server    │
//! │  lost sample.                              never answered.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both loops run until shutdown; every failure is logged, counted and
//! rescheduled. Nothing here panics or exits on error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use airgate_core::{DataSampleSet, StatEvent, Statistics};
use airgate_db::SampleStore;

use crate::config::SchedulerSection;
use crate::error::SyncResult;
use crate::session::DeviceSession;
use crate::uplink::Uplink;

// =============================================================================
// Delay Tables
// =============================================================================

/// Next acquisition after a stored-and-deleted sample: drain immediately.
pub const ACQUISITION_DRAIN_DELAY: Duration = Duration::ZERO;
/// Next acquisition after the empty sentinel: the device has nothing queued.
pub const ACQUISITION_IDLE_DELAY: Duration = Duration::from_secs(30);
/// Next acquisition after any failure in the read/insert/delete chain.
pub const ACQUISITION_FAILURE_DELAY: Duration = Duration::from_secs(5);

/// Next upload attempt when there was nothing to claim.
pub const UPLOAD_IDLE_DELAY: Duration = Duration::from_secs(15);
/// Next upload attempt after the server gave no usable response.
pub const UPLOAD_RETAIN_DELAY: Duration = Duration::from_secs(60);

/// Delay until the next claim after a batch was resolved (marked either
/// way). A full batch means more rows are probably waiting behind it.
pub fn upload_reschedule_delay(batch_was_full: bool) -> Duration {
    if batch_was_full {
        Duration::ZERO
    } else {
        UPLOAD_IDLE_DELAY
    }
}

// =============================================================================
// Options
// =============================================================================

/// Scheduler tunables.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub batch_size: usize,
    pub worker_permits: usize,
    pub acquisition_enabled: bool,
    pub upload_enabled: bool,
    /// Grace period for loop teardown on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        SchedulerOptions {
            batch_size: airgate_core::DEFAULT_BATCH_CAPACITY,
            worker_permits: 1,
            acquisition_enabled: true,
            upload_enabled: true,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl From<&SchedulerSection> for SchedulerOptions {
    fn from(section: &SchedulerSection) -> Self {
        SchedulerOptions {
            batch_size: section.batch_size,
            worker_permits: section.worker_permits,
            acquisition_enabled: section.acquisition_enabled,
            upload_enabled: section.upload_enabled,
            ..SchedulerOptions::default()
        }
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Owns the two pipeline loops for one device session.
pub struct Scheduler {
    session: DeviceSession,
    store: Arc<SampleStore>,
    uplink: Arc<dyn Uplink>,
    stats: Arc<Statistics>,
    options: SchedulerOptions,
}

/// Handle to the running loops. Dropping it does NOT stop them; call
/// [`SchedulerHandle::shutdown`].
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    store: Arc<SampleStore>,
    grace: Duration,
}

impl Scheduler {
    pub fn new(
        session: DeviceSession,
        store: Arc<SampleStore>,
        uplink: Arc<dyn Uplink>,
        stats: Arc<Statistics>,
        options: SchedulerOptions,
    ) -> Self {
        Scheduler {
            session,
            store,
            uplink,
            stats,
            options,
        }
    }

    /// Runs crash recovery, then spawns the enabled loops.
    ///
    /// Recovery MUST complete before the first claim: in-progress rows from
    /// a previous run are unclaimed leftovers, not live uploads.
    pub async fn start(self) -> SyncResult<SchedulerHandle> {
        let reset = self.store.recover().await?;
        if reset > 0 {
            info!(reset, "Recovered in-progress samples from previous run");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        if self.options.acquisition_enabled {
            tasks.push(tokio::spawn(acquisition_loop(
                self.session.clone(),
                Arc::clone(&self.store),
                Arc::clone(&self.stats),
                shutdown_rx.clone(),
            )));
        }

        if self.options.upload_enabled {
            let permits = Arc::new(Semaphore::new(self.options.worker_permits.max(1)));
            tasks.push(tokio::spawn(upload_loop(
                Arc::clone(&self.store),
                Arc::clone(&self.uplink),
                Arc::clone(&self.stats),
                permits,
                self.options.batch_size,
                shutdown_rx,
            )));
        }

        info!(
            acquisition = self.options.acquisition_enabled,
            upload = self.options.upload_enabled,
            batch_size = self.options.batch_size,
            "Scheduler started"
        );

        Ok(SchedulerHandle {
            shutdown_tx,
            tasks,
            store: self.store,
            grace: self.options.shutdown_grace,
        })
    }
}

impl SchedulerHandle {
    /// Signals both loops, waits out the grace period, then closes the
    /// store. A loop that outlives the grace period is abandoned; the store
    /// recovery path covers whatever it had in flight.
    pub async fn shutdown(self) {
        info!("Scheduler shutting down");
        let _ = self.shutdown_tx.send(true);

        for task in self.tasks {
            if tokio::time::timeout(self.grace, task).await.is_err() {
                warn!("Scheduler loop did not stop within the grace period");
            }
        }

        self.store.shutdown().await;
    }
}

/// Sleeps `delay` unless shutdown fires first. Returns true on shutdown.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        biased;
        _ = shutdown.changed() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

// =============================================================================
// Acquisition Loop
// =============================================================================

async fn acquisition_loop(
    session: DeviceSession,
    store: Arc<SampleStore>,
    stats: Arc<Statistics>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Acquisition loop running");
    loop {
        let delay = acquire_one(&session, &store, &stats).await;
        if wait_or_shutdown(&mut shutdown, delay).await {
            debug!("Acquisition loop stopped");
            break;
        }
    }
}

/// One download → insert → delete pass. Returns the delay until the next
/// pass.
async fn acquire_one(
    session: &DeviceSession,
    store: &SampleStore,
    stats: &Statistics,
) -> Duration {
    stats.record(StatEvent::DownloadRequested);
    let sample = match session.read_historic_sample().await {
        Ok(sample) => sample,
        Err(e) => {
            warn!(error = %e, "Sample download failed");
            stats.record(StatEvent::DownloadFailed);
            return ACQUISITION_FAILURE_DELAY;
        }
    };
    stats.record(StatEvent::DownloadSucceeded);

    // All channels zero is the device saying "nothing stored". It never
    // reaches the store and it is never deleted (there is nothing to
    // delete).
    if sample.is_empty() {
        return ACQUISITION_IDLE_DELAY;
    }

    stats.record(StatEvent::SaveRequested);
    // A duplicate counts as a successful save: the row is durable either
    // way, so the device copy is safe to destroy.
    match store.insert(&sample).await {
        Ok(_) => stats.record(StatEvent::SaveSucceeded),
        Err(e) => {
            error!(error = %e, sample_time = sample.sample_time, "Sample save failed");
            stats.record(StatEvent::SaveFailed);
            // Device copy untouched; the sample comes back next pass.
            return ACQUISITION_FAILURE_DELAY;
        }
    }

    stats.record(StatEvent::DeleteRequested);
    match session.delete_sample(sample.sample_time).await {
        Ok(()) => {
            stats.record(StatEvent::DeleteSucceeded);
            ACQUISITION_DRAIN_DELAY
        }
        Err(e) => {
            // Row is stored; the re-download dedups as Duplicate.
            warn!(error = %e, sample_time = sample.sample_time, "Device delete failed");
            stats.record(StatEvent::DeleteFailed);
            ACQUISITION_FAILURE_DELAY
        }
    }
}

// =============================================================================
// Upload Loop
// =============================================================================

async fn upload_loop(
    store: Arc<SampleStore>,
    uplink: Arc<dyn Uplink>,
    stats: Arc<Statistics>,
    permits: Arc<Semaphore>,
    batch_size: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Upload loop running");
    // A batch the server never answered for stays here and is resubmitted
    // before anything new is claimed.
    let mut retained: Option<DataSampleSet> = None;
    loop {
        let delay = upload_one(
            &store,
            uplink.as_ref(),
            &stats,
            &permits,
            batch_size,
            &mut retained,
        )
        .await;
        if wait_or_shutdown(&mut shutdown, delay).await {
            debug!("Upload loop stopped");
            break;
        }
    }
}

/// One claim → upload → mark pass. Returns the delay until the next pass.
async fn upload_one(
    store: &SampleStore,
    uplink: &dyn Uplink,
    stats: &Statistics,
    permits: &Semaphore,
    batch_size: usize,
    retained: &mut Option<DataSampleSet>,
) -> Duration {
    let batch = match retained.take() {
        Some(batch) => {
            debug!(batch_size = batch.len(), "Resubmitting retained batch");
            batch
        }
        None => match store.claim_batch(batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "Batch claim failed");
                return UPLOAD_IDLE_DELAY;
            }
        },
    };

    if batch.is_empty() {
        return UPLOAD_IDLE_DELAY;
    }

    let Ok(_permit) = permits.acquire().await else {
        return UPLOAD_IDLE_DELAY;
    };

    let count = batch.len() as u64;
    stats.record_many(StatEvent::SampleUploadRequested, count);

    match uplink.upload_samples(&batch).await {
        // No usable response: the server may or may not have the data, so
        // the rows stay in-progress and the same batch goes out again.
        Err(e) => {
            warn!(error = %e, batch_size = batch.len(), "Upload got no response, retaining batch");
            stats.record_many(StatEvent::SampleUploadFailed, count);
            *retained = Some(batch);
            UPLOAD_RETAIN_DELAY
        }
        Ok(outcome) if outcome.was_successful() => {
            let was_full = batch.is_full();
            if let Err(e) = store.mark_uploaded(&batch).await {
                // Rows stay in-progress; startup recovery re-queues them,
                // costing a duplicate upload rather than a lost sample.
                error!(error = %e, "Failed to mark batch uploaded");
            }
            stats.record_many(StatEvent::SampleUploadSucceeded, count);
            upload_reschedule_delay(was_full)
        }
        Ok(outcome) => {
            let receipt = outcome.payload.unwrap_or_default();
            warn!(
                message = outcome.message.as_deref().unwrap_or("none"),
                accepted_records = receipt.successful_records,
                rejected_records = receipt.failed_records,
                first_failure = receipt.failure.as_deref().unwrap_or("none"),
                batch_size = batch.len(),
                "Server rejected batch"
            );
            let was_full = batch.is_full();
            if let Err(e) = store.mark_failed(&batch).await {
                error!(error = %e, "Failed to mark batch rejected");
            }
            stats.record_many(StatEvent::SampleUploadFailed, count);
            upload_reschedule_delay(was_full)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use airgate_core::{CapabilityTable, Sample, UploadStatus};
    use airgate_db::{Database, DbConfig};

    use crate::codec::{self, ConfigFrame};
    use crate::error::SyncError;
    use crate::session::{DeviceSession, SessionOptions};
    use crate::transport::{FrameTransport, TransportError};
    use crate::uplink::UploadOutcome;

    // -------------------------------------------------------------------------
    // Fakes
    // -------------------------------------------------------------------------

    /// Device with a queue of stored sample times, shared with the test so
    /// it can inspect what the scheduler deleted.
    #[derive(Default)]
    struct DeviceState {
        stored: VecDeque<u32>,
    }

    struct FakeDevice {
        state: Arc<Mutex<DeviceState>>,
    }

    fn sample_for(time: u32) -> Sample {
        Sample {
            database_id: None,
            sample_time: time,
            download_time_ms: 0,
            raw_particle_count: 5,
            particle_count: 3,
            temperature_tenths_f: 712,
            humidity: 40,
            gps: None,
        }
    }

    #[async_trait]
    impl FrameTransport for FakeDevice {
        async fn exchange(
            &mut self,
            request: &[u8],
            _expected_response_len: usize,
            _timeout: Duration,
        ) -> Result<Vec<u8>, TransportError> {
            let mut state = self.state.lock().unwrap();
            Ok(match request[0] {
                b'I' => codec::encode_config_response(&ConfigFrame {
                    id: "AG100042".into(),
                    protocol_version: 2,
                    hardware_version: 1,
                    firmware_version: 1,
                    logging_interval: 60,
                }),
                b'S' | b'G' => match state.stored.front() {
                    Some(&time) => codec::encode_sample_response(&sample_for(time), false),
                    None => codec::encode_empty_sample_response(false),
                },
                b'D' => {
                    let target = u32::from_be_bytes(request[5..9].try_into().unwrap());
                    state.stored.retain(|&t| t != target);
                    codec::encode_ack_response(b'D')
                }
                other => panic!("unexpected command {other:#04x}"),
            })
        }
    }

    /// Records every delivered batch; optionally gives no response or a
    /// rejection for the first N attempts.
    struct FakeUplink {
        delivered: Mutex<Vec<Vec<u32>>>,
        no_response_first: AtomicU32,
        reject_first: AtomicU32,
    }

    impl FakeUplink {
        fn new() -> Self {
            FakeUplink {
                delivered: Mutex::new(Vec::new()),
                no_response_first: AtomicU32::new(0),
                reject_first: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Uplink for FakeUplink {
        async fn upload_samples(&self, batch: &DataSampleSet) -> SyncResult<UploadOutcome> {
            if self
                .no_response_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(SyncError::UplinkUnavailable("connection refused".into()));
            }
            if self
                .reject_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(UploadOutcome::rejected("bad channel count"));
            }
            self.delivered
                .lock()
                .unwrap()
                .push(batch.iter().map(|s| s.sample_time).collect());
            Ok(UploadOutcome::accepted())
        }

        async fn validate_credentials(&self) -> SyncResult<UploadOutcome> {
            Ok(UploadOutcome::accepted())
        }
    }

    // -------------------------------------------------------------------------
    // Harness
    // -------------------------------------------------------------------------

    struct Rig {
        handle: SchedulerHandle,
        store: Arc<SampleStore>,
        uplink: Arc<FakeUplink>,
        stats: Arc<Statistics>,
        device_state: Arc<Mutex<DeviceState>>,
        _audit_dir: tempfile::TempDir,
    }

    /// Pool acquire timeouts count against the test clock once it is
    /// paused, so keep them far beyond the simulated-time budget.
    fn test_db_config() -> DbConfig {
        DbConfig::in_memory().connect_timeout(Duration::from_secs(3600))
    }

    /// `device_times` sit on the fake device for the acquisition loop;
    /// `prestored_times` are inserted straight into the store so upload
    /// batch shapes are deterministic.
    ///
    /// Returns with the clock paused. Pausing happens only after the rig
    /// is fully up: connection setup runs on blocking-pool threads, and
    /// while the async runtime sits idle waiting on them an auto-advancing
    /// clock races through the pool's acquire timeout.
    async fn start_rig(
        device_times: &[u32],
        prestored_times: &[u32],
        uplink: FakeUplink,
        options: SchedulerOptions,
    ) -> Rig {
        let device_state = Arc::new(Mutex::new(DeviceState {
            stored: device_times.iter().copied().collect(),
        }));
        let (session, _signal, _liveness) = DeviceSession::connect(
            Box::new(FakeDevice {
                state: Arc::clone(&device_state),
            }),
            &CapabilityTable::standard(),
            SessionOptions::default(),
        )
        .await
        .unwrap();

        let audit_dir = tempfile::tempdir().unwrap();
        let db = Database::new(test_db_config()).await.unwrap();
        let store = Arc::new(
            SampleStore::with_database(db, audit_dir.path().join("audit.jsonl"))
                .await
                .unwrap(),
        );
        for &t in prestored_times {
            store.insert(&sample_for(t)).await.unwrap();
        }

        let uplink = Arc::new(uplink);
        let stats = Arc::new(Statistics::unobserved());

        let handle = Scheduler::new(
            session,
            Arc::clone(&store),
            uplink.clone() as Arc<dyn Uplink>,
            Arc::clone(&stats),
            options,
        )
        .start()
        .await
        .unwrap();

        tokio::time::pause();

        Rig {
            handle,
            store,
            uplink,
            stats,
            device_state,
            _audit_dir: audit_dir,
        }
    }

    /// Paused-clock wait: the runtime auto-advances timers while we poll.
    async fn wait_until(mut condition: impl AsyncFnMut() -> bool) {
        for _ in 0..600 {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        panic!("condition not reached within simulated time budget");
    }

    // -------------------------------------------------------------------------
    // Tests
    // -------------------------------------------------------------------------

    #[test]
    fn reschedule_delay_drains_full_batches_immediately() {
        assert_eq!(upload_reschedule_delay(true), Duration::ZERO);
        assert_eq!(upload_reschedule_delay(false), UPLOAD_IDLE_DELAY);
    }

    #[tokio::test]
    async fn drains_device_stores_and_uploads_everything() {
        let rig = start_rig(
            &[100, 200, 300],
            &[],
            FakeUplink::new(),
            SchedulerOptions::default(),
        )
        .await;

        wait_until(async || {
            rig.store
                .count_with_status(UploadStatus::Success)
                .await
                .unwrap()
                == 3
        })
        .await;

        // Device fully drained: every stored sample was deleted after save.
        assert!(rig.device_state.lock().unwrap().stored.is_empty());

        // Batch boundaries depend on loop interleaving, but claims come out
        // in insertion order, so the flattened stream is ascending.
        let delivered: Vec<u32> = rig
            .uplink
            .delivered
            .lock()
            .unwrap()
            .clone()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(delivered, vec![100, 200, 300]);

        let snapshot = rig.stats.snapshot();
        assert_eq!(snapshot.saves.successful, 3);
        assert_eq!(snapshot.deletes.successful, 3);
        assert_eq!(snapshot.sample_uploads.successful, 3);
        assert_eq!(snapshot.saves.failed, 0);

        rig.handle.shutdown().await;
    }

    #[tokio::test]
    async fn no_response_retains_batch_until_server_answers() {
        let uplink = FakeUplink::new();
        uplink.no_response_first.store(2, Ordering::SeqCst);
        let rig = start_rig(&[], &[100, 200], uplink, SchedulerOptions::default()).await;

        wait_until(async || {
            rig.store
                .count_with_status(UploadStatus::Success)
                .await
                .unwrap()
                == 2
        })
        .await;

        // The exact same batch that got no response is what finally landed;
        // the rows were never marked failed in between.
        let delivered = rig.uplink.delivered.lock().unwrap().clone();
        assert_eq!(delivered, vec![vec![100, 200]]);
        assert_eq!(
            rig.store
                .count_with_status(UploadStatus::Failure)
                .await
                .unwrap(),
            0
        );

        rig.handle.shutdown().await;
    }

    #[tokio::test]
    async fn rejected_batch_is_marked_failed_and_not_reclaimed() {
        let uplink = FakeUplink::new();
        uplink.reject_first.store(1, Ordering::SeqCst);
        let rig = start_rig(&[], &[100, 200], uplink, SchedulerOptions::default()).await;

        wait_until(async || {
            rig.store
                .count_with_status(UploadStatus::Failure)
                .await
                .unwrap()
                == 2
        })
        .await;

        // Rejected rows leave the claimable pool for good.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rig.uplink.delivered.lock().unwrap().is_empty());
        assert_eq!(rig.store.count_pending().await.unwrap(), 0);

        rig.handle.shutdown().await;
    }

    #[tokio::test]
    async fn full_batches_drain_back_to_back() {
        let times: Vec<u32> = (1..=5).collect();
        let options = SchedulerOptions {
            batch_size: 2,
            ..SchedulerOptions::default()
        };
        let rig = start_rig(&[], &times, FakeUplink::new(), options).await;

        wait_until(async || {
            rig.store
                .count_with_status(UploadStatus::Success)
                .await
                .unwrap()
                == 5
        })
        .await;

        let delivered = rig.uplink.delivered.lock().unwrap().clone();
        assert_eq!(delivered.len(), 3);
        assert_eq!(delivered[0].len(), 2);
        assert_eq!(delivered[1].len(), 2);
        assert_eq!(delivered[2].len(), 1);
        // Claim order is insertion order, so times stay ascending overall.
        let flat: Vec<u32> = delivered.into_iter().flatten().collect();
        assert_eq!(flat, times);

        rig.handle.shutdown().await;
    }

    #[tokio::test]
    async fn acquisition_only_mode_never_touches_the_uplink() {
        let options = SchedulerOptions {
            upload_enabled: false,
            ..SchedulerOptions::default()
        };
        let rig = start_rig(&[100], &[], FakeUplink::new(), options).await;

        wait_until(async || rig.store.count_pending().await.unwrap() == 1).await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(rig.uplink.delivered.lock().unwrap().is_empty());
        assert_eq!(
            rig.store
                .count_with_status(UploadStatus::NotAttempted)
                .await
                .unwrap(),
            1
        );

        rig.handle.shutdown().await;
    }

    #[tokio::test]
    async fn start_recovers_stale_in_progress_rows() {
        // Simulate a crash: rows claimed by a previous run, then the
        // scheduler starts fresh over the same store.
        let audit_dir = tempfile::tempdir().unwrap();
        let db = Database::new(test_db_config()).await.unwrap();
        let store = Arc::new(
            SampleStore::with_database(db, audit_dir.path().join("audit.jsonl"))
                .await
                .unwrap(),
        );
        store.insert(&sample_for(100)).await.unwrap();
        store.insert(&sample_for(200)).await.unwrap();
        let stranded = store.claim_batch(10).await.unwrap();
        assert_eq!(stranded.len(), 2);

        let device_state = Arc::new(Mutex::new(DeviceState::default()));
        let (session, _signal, _liveness) = DeviceSession::connect(
            Box::new(FakeDevice {
                state: device_state,
            }),
            &CapabilityTable::standard(),
            SessionOptions::default(),
        )
        .await
        .unwrap();

        let uplink = Arc::new(FakeUplink::new());
        let handle = Scheduler::new(
            session,
            Arc::clone(&store),
            uplink.clone() as Arc<dyn Uplink>,
            Arc::new(Statistics::unobserved()),
            SchedulerOptions::default(),
        )
        .start()
        .await
        .unwrap();

        tokio::time::pause();
        wait_until(async || {
            store
                .count_with_status(UploadStatus::Success)
                .await
                .unwrap()
                == 2
        })
        .await;

        assert_eq!(uplink.delivered.lock().unwrap().clone(), vec![vec![100, 200]]);
        handle.shutdown().await;
    }
}
