//! # Sync Error Types
//!
//! Error types for the sync engine.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Codec       │  │    Session      │  │       Uplink            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Checksum       │  │  Communication  │  │  UplinkUnavailable      │ │
//! │  │  Length         │  │  SessionFailed  │  │  (batch retained)       │ │
//! │  │  (one command)  │  │  InitFailed     │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │     Store       │  │  Configuration  │                              │
//! │  │                 │  │                 │                              │
//! │  │  Store(DbError) │  │  InvalidConfig  │                              │
//! │  │  (logged +      │  │  ConfigLoad/    │                              │
//! │  │   counted)      │  │  SaveFailed     │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! │                                                                         │
//! │  NOT ERRORS: a duplicate sample (InsertOutcome::Duplicate) and a       │
//! │  structured server rejection (UploadOutcome with result "KO") are      │
//! │  typed outcomes - expected control flow, never raised.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Propagation policy: codec and store errors stay local to the operation
//! and are counted; the session-failure event is the only condition that
//! propagates upward, via the one-shot failure signal. The process keeps
//! running and retrying until explicitly shut down.

use thiserror::Error;

use crate::codec::CodecError;
use crate::transport::TransportError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all engine failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Codec Errors (fatal to one command, not to the session)
    // =========================================================================
    /// Malformed device frame.
    #[error(transparent)]
    Codec(#[from] CodecError),

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// Transport-level exchange failure. Triggers session failure.
    #[error("Device communication failed: {0}")]
    Communication(String),

    /// The session has entered the Failed state; no further commands.
    #[error("Device session has failed")]
    SessionFailed,

    /// Session construction could not read the device configuration.
    #[error("Session initialization failed: {0}")]
    InitFailed(String),

    /// The device's capability set does not include this command.
    #[error("Device does not support {0}")]
    Unsupported(&'static str),

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// Durable store failure; the scheduler logs, counts and retries on its
    /// own loop timing.
    #[error("Store error: {0}")]
    Store(#[from] airgate_db::DbError),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Domain rule violation (e.g. logging interval out of range).
    #[error(transparent)]
    Core(#[from] airgate_core::CoreError),

    // =========================================================================
    // Uplink Errors
    // =========================================================================
    /// No usable response from the upload endpoint. The in-flight batch is
    /// retained and resubmitted; it is NOT marked failed in the store.
    #[error("Upload endpoint unavailable: {0}")]
    UplinkUnavailable(String),

    /// Failed to build the wire payload.
    #[error("Payload serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid gateway configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save the config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// The engine is shutting down.
    #[error("Sync engine is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        SyncError::Communication(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::UplinkUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// True if the operation can be retried without operator action.
    ///
    /// Retryable: transport hiccups (device or uplink) and store errors - the
    /// scheduler loops will come back around. Not retryable: configuration
    /// problems and a dead session (needs reconnection by the owner).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Communication(_)
                | SyncError::UplinkUnavailable(_)
                | SyncError::Store(_)
                | SyncError::Codec(_)
        )
    }

    /// True if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Communication("serial unplugged".into()).is_retryable());
        assert!(SyncError::UplinkUnavailable("connect refused".into()).is_retryable());

        assert!(!SyncError::SessionFailed.is_retryable());
        assert!(!SyncError::InvalidConfig("no host".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidConfig("bad".into()).is_config_error());
        assert!(!SyncError::SessionFailed.is_config_error());
    }
}
