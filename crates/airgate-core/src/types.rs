//! # Domain Types
//!
//! Core domain types used throughout the AirGate gateway.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │     Sample       │   │  DataSampleSet   │   │   DeviceConfig   │    │
//! │  │  ──────────────  │   │  ──────────────  │   │  ──────────────  │    │
//! │  │  database_id     │   │  bounded         │   │  id              │    │
//! │  │  sample_time ★   │   │  time-ordered    │   │  protocol_version│    │
//! │  │  sensor channels │   │  deduplicated    │   │  logging_interval│    │
//! │  │  optional GPS    │   │                  │   │  api: ApiSupport │    │
//! │  └──────────────────┘   └──────────────────┘   └──────────────────┘    │
//! │                                                                         │
//! │  ★ sample_time is the ONLY identity field: two samples with the same   │
//! │    device timestamp are the same sample, whatever else differs.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity-by-Time Policy
//! The device assigns each stored reading a UTC-seconds timestamp and never
//! produces two readings in the same second. Equality, ordering, hashing and
//! store-level dedup all key on `sample_time` alone. A re-downloaded sample
//! with a differing channel value is still the *same* sample.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::capabilities::ApiSupport;
use crate::DEFAULT_BATCH_CAPACITY;

// =============================================================================
// Upload Status
// =============================================================================

/// Per-sample upload state machine.
///
/// ```text
/// NotAttempted ──claim──► InProgress ──server OK──► Success
///      ▲                      │
///      │                      └──server KO──► Failure
///      └── startup recovery (reset_in_progress)
/// ```
///
/// A sample is eligible for claiming iff its status is `NotAttempted`.
/// On process restart every `InProgress` row is reset to `NotAttempted`
/// before scheduling resumes - an upload is never assumed to have survived
/// a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Never claimed for upload.
    NotAttempted,
    /// Claimed by an upload batch currently in flight.
    InProgress,
    /// Remote server acknowledged the record.
    Success,
    /// Remote server rejected the record.
    Failure,
}

impl UploadStatus {
    /// Database column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::NotAttempted => "not_attempted",
            UploadStatus::InProgress => "in_progress",
            UploadStatus::Success => "success",
            UploadStatus::Failure => "failure",
        }
    }
}

impl std::str::FromStr for UploadStatus {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_attempted" => Ok(UploadStatus::NotAttempted),
            "in_progress" => Ok(UploadStatus::InProgress),
            "success" => Ok(UploadStatus::Success),
            "failure" => Ok(UploadStatus::Failure),
            other => Err(crate::CoreError::UnknownUploadStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// GPS Fix
// =============================================================================

/// GPS position attached to a sample by GPS-equipped device variants.
///
/// Latitude and longitude are kept as the exact decimal text the device
/// frame carries (degrees and fraction joined with a `.`), never re-parsed
/// into floating point. The upload wire format and the audit sink both
/// forward this text verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpsFix {
    /// Whether the device had satellite lock when the sample was taken.
    pub is_valid: bool,

    /// Latitude as decimal text, e.g. `"40.443322"`.
    pub latitude: String,

    /// Longitude as decimal text, e.g. `"-79.941145"`.
    pub longitude: String,

    /// Compass quadrant reported by the device (e.g. `"NW"`).
    pub quadrant: String,
}

// =============================================================================
// Sample
// =============================================================================

/// One device measurement.
///
/// ## Dual-Key Identity Pattern
/// - `database_id`: local store identity, absent until persisted
/// - `sample_time`: device-assigned identity, the *only* comparison key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// Local store row id. `None` until the sample has been persisted.
    pub database_id: Option<i64>,

    /// Device-assigned UTC timestamp in seconds. Unique key.
    pub sample_time: u32,

    /// Host-assigned UTC timestamp in milliseconds, set at acquisition.
    pub download_time_ms: i64,

    /// Raw particle count channel.
    pub raw_particle_count: u16,

    /// Particle count or concentration, depending on the device variant
    /// (see `ApiSupport::has_particle_count` / `has_particle_concentration`).
    pub particle_count: u16,

    /// Temperature in tenths of a degree Fahrenheit.
    pub temperature_tenths_f: u16,

    /// Relative humidity channel.
    pub humidity: u16,

    /// GPS position, present only on GPS-equipped variants.
    pub gps: Option<GpsFix>,
}

impl Sample {
    /// Empty-sample sentinel: all numeric channels zero means the device
    /// had no data available. Such a sample must never reach the store;
    /// the check is the caller's responsibility, not the codec's.
    pub fn is_empty(&self) -> bool {
        self.sample_time == 0
            && self.raw_particle_count == 0
            && self.particle_count == 0
            && self.temperature_tenths_f == 0
            && self.humidity == 0
    }
}

// Identity is sample_time alone. See the module docs for the policy.
impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.sample_time == other.sample_time
    }
}

impl Eq for Sample {}

impl PartialOrd for Sample {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sample {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sample_time.cmp(&other.sample_time)
    }
}

impl Hash for Sample {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sample_time.hash(state);
    }
}

// =============================================================================
// Data Sample Set
// =============================================================================

/// Outcome of adding a sample to a [`DataSampleSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Sample accepted.
    Added,
    /// A sample with the same `sample_time` is already in the set.
    Duplicate,
    /// The set already holds its configured maximum.
    Full,
}

/// An ordered, deduplicated, bounded batch of samples.
///
/// Iteration order is ascending `sample_time`. Capacity defaults to
/// [`DEFAULT_BATCH_CAPACITY`] and is the upload batch size: a *full* set
/// tells the upload loop there is probably more work queued behind it.
#[derive(Debug, Clone)]
pub struct DataSampleSet {
    samples: BTreeMap<u32, Sample>,
    capacity: usize,
}

impl DataSampleSet {
    /// Creates an empty set with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BATCH_CAPACITY)
    }

    /// Creates an empty set with an explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        DataSampleSet {
            samples: BTreeMap::new(),
            capacity,
        }
    }

    /// Adds a sample, keyed by its `sample_time`.
    ///
    /// Duplicates are ignored (the existing sample wins) and a full set
    /// rejects further samples; both are reported as typed outcomes rather
    /// than errors because the scheduler treats them as normal control flow.
    pub fn add(&mut self, sample: Sample) -> AddOutcome {
        if self.samples.contains_key(&sample.sample_time) {
            return AddOutcome::Duplicate;
        }
        if self.samples.len() >= self.capacity {
            return AddOutcome::Full;
        }
        self.samples.insert(sample.sample_time, sample);
        AddOutcome::Added
    }

    /// Number of samples in the set.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the set holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True if the set holds its configured maximum.
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// The configured maximum size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates samples in ascending `sample_time` order.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }

    /// Store row ids of every persisted sample in the set, in time order.
    ///
    /// Samples that were never persisted (no `database_id`) are skipped;
    /// the store's mark operations match rows by these ids.
    pub fn database_ids(&self) -> Vec<i64> {
        self.samples.values().filter_map(|s| s.database_id).collect()
    }
}

impl Default for DataSampleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a DataSampleSet {
    type Item = &'a Sample;
    type IntoIter = std::collections::btree_map::Values<'a, u32, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.values()
    }
}

// =============================================================================
// Device Config
// =============================================================================

/// Immutable snapshot of the device configuration, read once per session.
///
/// The session holds the *current* snapshot in a cell and replaces it with
/// the read-back result after a successful logging-interval write; nothing
/// mutates a `DeviceConfig` in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device identity string. Extended-id variants append a suffix read
    /// with a second command.
    pub id: String,

    /// Protocol version; drives the capability lookup.
    pub protocol_version: u16,

    /// Hardware revision.
    pub hardware_version: u16,

    /// Firmware revision.
    pub firmware_version: u16,

    /// Logging interval in minutes.
    pub logging_interval: u16,

    /// Capability flags derived from `protocol_version`.
    pub api: ApiSupport,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn identity_is_sample_time_only() {
        let a = sample(1000);
        let mut b = sample(1000);
        b.raw_particle_count = 999;
        b.humidity = 7;
        b.database_id = Some(42);

        assert_eq!(a, b);

        let mut hasher_a = std::collections::hash_map::DefaultHasher::new();
        let mut hasher_b = std::collections::hash_map::DefaultHasher::new();
        a.hash(&mut hasher_a);
        b.hash(&mut hasher_b);
        assert_eq!(hasher_a.finish(), hasher_b.finish());
    }

    #[test]
    fn ordering_follows_sample_time() {
        assert!(sample(10) < sample(20));
        assert!(sample(30) > sample(20));
    }

    #[test]
    fn empty_sentinel_requires_all_channels_zero() {
        let zero = Sample {
            database_id: None,
            sample_time: 0,
            download_time_ms: 0,
            raw_particle_count: 0,
            particle_count: 0,
            temperature_tenths_f: 0,
            humidity: 0,
            gps: None,
        };
        assert!(zero.is_empty());

        let mut not_empty = zero.clone();
        not_empty.humidity = 1;
        assert!(!not_empty.is_empty());
    }

    #[test]
    fn set_orders_and_dedups() {
        let mut set = DataSampleSet::with_capacity(10);
        assert_eq!(set.add(sample(30)), AddOutcome::Added);
        assert_eq!(set.add(sample(10)), AddOutcome::Added);
        assert_eq!(set.add(sample(20)), AddOutcome::Added);
        assert_eq!(set.add(sample(20)), AddOutcome::Duplicate);

        let times: Vec<u32> = set.iter().map(|s| s.sample_time).collect();
        assert_eq!(times, vec![10, 20, 30]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn set_rejects_beyond_capacity() {
        let mut set = DataSampleSet::with_capacity(2);
        assert_eq!(set.add(sample(1)), AddOutcome::Added);
        assert_eq!(set.add(sample(2)), AddOutcome::Added);
        assert!(set.is_full());
        assert_eq!(set.add(sample(3)), AddOutcome::Full);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn database_ids_skip_unpersisted() {
        let mut set = DataSampleSet::new();
        let mut a = sample(1);
        a.database_id = Some(11);
        let b = sample(2);
        let mut c = sample(3);
        c.database_id = Some(33);

        set.add(a);
        set.add(b);
        set.add(c);

        assert_eq!(set.database_ids(), vec![11, 33]);
    }

    #[test]
    fn upload_status_round_trips_column_text() {
        for status in [
            UploadStatus::NotAttempted,
            UploadStatus::InProgress,
            UploadStatus::Success,
            UploadStatus::Failure,
        ] {
            let parsed: UploadStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("uploaded".parse::<UploadStatus>().is_err());
    }
}
