//! # airgate-db: Durable Sample Store for AirGate
//!
//! SQLite-backed persistence for device samples, plus the append-only audit
//! sink. The sync engine only sees the [`SampleStore`] facade and typed
//! outcomes - no SQL leaks upward.
//!
//! ## Crate Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          airgate-db                                     │
//! │                                                                         │
//! │  ┌───────────┐   ┌──────────────┐   ┌───────────────┐   ┌──────────┐  │
//! │  │   pool    │   │  migrations  │   │  repository   │   │  audit   │  │
//! │  │ DbConfig  │──►│  embedded    │   │ SampleRepo    │   │ AuditSink│  │
//! │  │ Database  │   │  SQL files   │   │ insert/claim/ │   │ JSONL    │  │
//! │  │           │   │              │   │ mark/reset    │   │ append   │  │
//! │  └───────────┘   └──────────────┘   └───────┬───────┘   └────┬─────┘  │
//! │                                             │                │         │
//! │                                      ┌──────▼────────────────▼──────┐  │
//! │                                      │       store::SampleStore     │  │
//! │                                      │  (what airgate-sync uses)    │  │
//! │                                      └──────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delivery Guarantees
//! - Insert is deduplicated on `sample_time` (identity-by-time); a duplicate
//!   is a typed outcome, not an error, so a crash between store-insert and
//!   device-delete costs at most one harmless re-download.
//! - Claim is all-or-nothing: a batch is either fully marked in-progress or
//!   not claimed at all.
//! - `recover()` resets in-progress rows at startup; an upload is never
//!   assumed to have survived a crash.

pub mod audit;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

pub use audit::AuditSink;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{InsertOutcome, SampleRepository};
pub use store::SampleStore;
