//! # airgate-sync: Sync Engine for AirGate
//!
//! The gateway's moving parts: the device protocol codec, the session that
//! owns a connected device, the scheduler that pumps samples through the
//! store, and the HTTP uplink that delivers them to the storage server.
//!
//! ## Engine Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          airgate-sync                                   │
//! │                                                                         │
//! │   device ◄── transport ◄── codec ◄── session ◄──┐                       │
//! │   (USB/serial)  (seam)    (frames)  (liveness,  │                       │
//! │                                      serialized │                       │
//! │                                      commands)  │                       │
//! │                                                 │                       │
//! │                    ┌────────────────────────────┴──────────┐            │
//! │                    │              scheduler                │            │
//! │                    │  acquisition loop │ upload loop       │            │
//! │                    └────────┬──────────┴─────────┬─────────┘            │
//! │                             ▼                    ▼                      │
//! │                     airgate-db store      uplink (HTTP POST)            │
//! │                                                                         │
//! │   config (TOML) wires the whole thing; retry backs session connect.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wiring Order
//! 1. [`GatewayConfig::load_or_default`] + env overrides + validate
//! 2. [`SampleStore`](airgate_db::SampleStore) open
//! 3. [`DeviceSession::connect`] over a [`FrameTransport`]
//! 4. [`HttpUplink::new`] from the config and the session's capabilities
//! 5. [`Scheduler::start`]; on the failure signal, shut down and reconnect

pub mod codec;
pub mod config;
pub mod error;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod uplink;

pub use codec::{CodecError, Command, ConfigFrame};
pub use config::GatewayConfig;
pub use error::{SyncError, SyncResult};
pub use retry::RetryPolicy;
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerOptions};
pub use session::{DeviceSession, FailureSignal, SessionOptions, SessionState};
pub use transport::{FrameTransport, TransportError};
pub use uplink::{HttpUplink, Uplink, UplinkEndpoint, UploadOutcome, UploadReceipt};
