//! # airgate-core: Pure Domain Types for the AirGate Gateway
//!
//! This crate is the **heart** of AirGate. It contains the domain model for
//! the sensor gateway as pure types with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        AirGate Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────┐         ┌──────────────────────────────────────┐  │
//! │  │  Sensor Device  │◄───────►│            airgate-sync              │  │
//! │  │  (USB/serial)   │  frames │  codec, session, scheduler, uplink   │  │
//! │  └─────────────────┘         └───────┬──────────────────────┬───────┘  │
//! │                                      │                      │          │
//! │                              ┌───────▼───────┐      ┌───────▼───────┐  │
//! │                              │  airgate-db   │      │ Remote server │  │
//! │                              │  SampleStore  │      │  (HTTP POST)  │  │
//! │                              └───────┬───────┘      └───────────────┘  │
//! │                                      │                                  │
//! │  ┌───────────────────────────────────▼─────────────────────────────┐   │
//! │  │                 ★ airgate-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌──────────────┐  ┌───────────┐  ┌─────────┐  │   │
//! │  │   │   types   │  │ capabilities │  │   stats   │  │  error  │  │   │
//! │  │   │  Sample   │  │  ApiSupport  │  │ Statistics│  │CoreError│  │   │
//! │  │   │ SampleSet │  │ Capability-  │  │ observers │  │         │  │   │
//! │  │   │ DeviceCfg │  │    Table     │  │           │  │         │  │   │
//! │  │   └───────────┘  └──────────────┘  └───────────┘  └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Sample, DataSampleSet, DeviceConfig, UploadStatus)
//! - [`capabilities`] - Protocol-version capability lookup (ApiSupport)
//! - [`stats`] - Monotonic gateway counters with change notification
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Identity by time**: Samples are equal iff their device timestamps are
//!    equal - this is the dedup rule the whole pipeline relies on
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod capabilities;
pub mod error;
pub mod stats;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use airgate_core::Sample` instead of
// `use airgate_core::types::Sample`

pub use capabilities::{ApiSupport, CapabilityTable};
pub use error::{validate_logging_interval, CoreError};
pub use stats::{NoOpObserver, StatEvent, Statistics, StatisticsSnapshot, StatsObserver};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default maximum number of samples in one upload batch.
///
/// ## Why 200?
/// A full batch at the default logging interval covers several hours of
/// readings while keeping the JSON payload small enough for slow links.
/// Configurable via `[scheduler] batch_size`.
pub const DEFAULT_BATCH_CAPACITY: usize = 200;

/// Largest logging interval (in minutes) the device firmware accepts.
///
/// Values above this are rejected before any frame is sent.
pub const MAX_LOGGING_INTERVAL_MINUTES: u16 = 240;
