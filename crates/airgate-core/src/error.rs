//! # Domain Error Types
//!
//! Errors for the pure domain layer. Store, protocol and transport errors
//! live in their own crates; only rules expressible without I/O belong here.

use thiserror::Error;

use crate::MAX_LOGGING_INTERVAL_MINUTES;

/// Domain rule violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Logging interval outside the range the firmware accepts.
    #[error("Logging interval {0} out of range (1..={max})", max = MAX_LOGGING_INTERVAL_MINUTES)]
    InvalidLoggingInterval(u16),

    /// Upload-status column text did not match any known state.
    #[error("Unknown upload status '{0}'")]
    UnknownUploadStatus(String),
}

/// Validates a logging interval before it is written to the device.
pub fn validate_logging_interval(minutes: u16) -> Result<(), CoreError> {
    if minutes == 0 || minutes > MAX_LOGGING_INTERVAL_MINUTES {
        return Err(CoreError::InvalidLoggingInterval(minutes));
    }
    Ok(())
}
