//! # Frame Transport Seam
//!
//! The HID/serial driver lives outside this workspace. The engine sees only
//! this trait: one fixed-size request/response exchange at a time, with a
//! finite timeout. The [`crate::session::DeviceSession`] serializes access,
//! so implementations may assume no concurrent calls.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level exchange failures.
///
/// Any of these, surfaced during a command or the liveness probe, kills the
/// session (transition to `Failed`); they are never retried at this level.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device did not answer within the timeout.
    #[error("Exchange timed out after {0:?}")]
    Timeout(Duration),

    /// The device is not (or no longer) connected.
    #[error("Device not connected")]
    NotConnected,

    /// Driver-level I/O failure.
    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// Fixed-size request/response exchange primitive.
///
/// `expected_response_len` of zero means the command has no response (the
/// bootloader command); the implementation should return an empty vec after
/// the write completes.
#[async_trait]
pub trait FrameTransport: Send {
    async fn exchange(
        &mut self,
        request: &[u8],
        expected_response_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;
}
