//! # Gateway Statistics
//!
//! Monotonic counters for every pipeline stage, observable through a
//! change-notification callback.
//!
//! ## Counter Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Statistics Counters                              │
//! │                                                                         │
//! │              requested    successful    failed                          │
//! │  downloads       ●            ●            ●     (device → host)        │
//! │  saves           ●            ●            ●     (host → store)         │
//! │  deletes         ●            ●            ●     (host → device)        │
//! │  sample uploads  ●            ●            ●     (store → server)       │
//! │  file uploads    ●            ●            ●     (bulk log transfer)    │
//! │                                                                         │
//! │  Every counter only ever increases. After each change the observer     │
//! │  receives a fresh snapshot; failures stay visible without crashing     │
//! │  the process.                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// =============================================================================
// Events
// =============================================================================

/// One countable pipeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatEvent {
    DownloadRequested,
    DownloadSucceeded,
    DownloadFailed,
    SaveRequested,
    SaveSucceeded,
    SaveFailed,
    DeleteRequested,
    DeleteSucceeded,
    DeleteFailed,
    SampleUploadRequested,
    SampleUploadSucceeded,
    SampleUploadFailed,
    FileUploadRequested,
    FileUploadSucceeded,
    FileUploadFailed,
}

// =============================================================================
// Snapshot
// =============================================================================

/// Requested/successful/failed triple for one pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterTriple {
    pub requested: u64,
    pub successful: u64,
    pub failed: u64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub downloads: CounterTriple,
    pub saves: CounterTriple,
    pub deletes: CounterTriple,
    pub sample_uploads: CounterTriple,
    pub file_uploads: CounterTriple,
}

// =============================================================================
// Observer
// =============================================================================

/// Receives a snapshot after every counter change.
///
/// Implemented by whatever surfaces the numbers (a status line, a metrics
/// bridge); the engine itself only increments.
pub trait StatsObserver: Send + Sync {
    fn on_change(&self, snapshot: &StatisticsSnapshot);
}

/// No-op observer for tests and headless runs.
pub struct NoOpObserver;

impl StatsObserver for NoOpObserver {
    fn on_change(&self, _snapshot: &StatisticsSnapshot) {}
}

// =============================================================================
// Statistics
// =============================================================================

/// Shared counter set. Cheap to clone via `Arc` by the scheduler tasks.
pub struct Statistics {
    downloads_requested: AtomicU64,
    downloads_successful: AtomicU64,
    downloads_failed: AtomicU64,
    saves_requested: AtomicU64,
    saves_successful: AtomicU64,
    saves_failed: AtomicU64,
    deletes_requested: AtomicU64,
    deletes_successful: AtomicU64,
    deletes_failed: AtomicU64,
    sample_uploads_requested: AtomicU64,
    sample_uploads_successful: AtomicU64,
    sample_uploads_failed: AtomicU64,
    file_uploads_requested: AtomicU64,
    file_uploads_successful: AtomicU64,
    file_uploads_failed: AtomicU64,
    observer: Arc<dyn StatsObserver>,
}

impl Statistics {
    /// Creates a counter set that notifies the given observer.
    pub fn new(observer: Arc<dyn StatsObserver>) -> Self {
        Statistics {
            downloads_requested: AtomicU64::new(0),
            downloads_successful: AtomicU64::new(0),
            downloads_failed: AtomicU64::new(0),
            saves_requested: AtomicU64::new(0),
            saves_successful: AtomicU64::new(0),
            saves_failed: AtomicU64::new(0),
            deletes_requested: AtomicU64::new(0),
            deletes_successful: AtomicU64::new(0),
            deletes_failed: AtomicU64::new(0),
            sample_uploads_requested: AtomicU64::new(0),
            sample_uploads_successful: AtomicU64::new(0),
            sample_uploads_failed: AtomicU64::new(0),
            file_uploads_requested: AtomicU64::new(0),
            file_uploads_successful: AtomicU64::new(0),
            file_uploads_failed: AtomicU64::new(0),
            observer,
        }
    }

    /// Creates a counter set with no observer.
    pub fn unobserved() -> Self {
        Self::new(Arc::new(NoOpObserver))
    }

    /// Increments one counter by one.
    pub fn record(&self, event: StatEvent) {
        self.record_many(event, 1);
    }

    /// Increments one counter by `n` (batch-sized upload events).
    pub fn record_many(&self, event: StatEvent, n: u64) {
        self.cell(event).fetch_add(n, Ordering::Relaxed);
        let snapshot = self.snapshot();
        self.observer.on_change(&snapshot);
    }

    fn cell(&self, event: StatEvent) -> &AtomicU64 {
        match event {
            StatEvent::DownloadRequested => &self.downloads_requested,
            StatEvent::DownloadSucceeded => &self.downloads_successful,
            StatEvent::DownloadFailed => &self.downloads_failed,
            StatEvent::SaveRequested => &self.saves_requested,
            StatEvent::SaveSucceeded => &self.saves_successful,
            StatEvent::SaveFailed => &self.saves_failed,
            StatEvent::DeleteRequested => &self.deletes_requested,
            StatEvent::DeleteSucceeded => &self.deletes_successful,
            StatEvent::DeleteFailed => &self.deletes_failed,
            StatEvent::SampleUploadRequested => &self.sample_uploads_requested,
            StatEvent::SampleUploadSucceeded => &self.sample_uploads_successful,
            StatEvent::SampleUploadFailed => &self.sample_uploads_failed,
            StatEvent::FileUploadRequested => &self.file_uploads_requested,
            StatEvent::FileUploadSucceeded => &self.file_uploads_successful,
            StatEvent::FileUploadFailed => &self.file_uploads_failed,
        }
    }

    /// Copies every counter into a snapshot.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatisticsSnapshot {
            downloads: CounterTriple {
                requested: load(&self.downloads_requested),
                successful: load(&self.downloads_successful),
                failed: load(&self.downloads_failed),
            },
            saves: CounterTriple {
                requested: load(&self.saves_requested),
                successful: load(&self.saves_successful),
                failed: load(&self.saves_failed),
            },
            deletes: CounterTriple {
                requested: load(&self.deletes_requested),
                successful: load(&self.deletes_successful),
                failed: load(&self.deletes_failed),
            },
            sample_uploads: CounterTriple {
                requested: load(&self.sample_uploads_requested),
                successful: load(&self.sample_uploads_successful),
                failed: load(&self.sample_uploads_failed),
            },
            file_uploads: CounterTriple {
                requested: load(&self.file_uploads_requested),
                successful: load(&self.file_uploads_successful),
                failed: load(&self.file_uploads_failed),
            },
        }
    }
}

impl std::fmt::Debug for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statistics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
