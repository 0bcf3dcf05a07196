//! # Device Session
//!
//! Ownership of one connected device: serialized command execution, the
//! periodic liveness probe, and the one-shot failure signal.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DeviceSession                                    │
//! │                                                                         │
//! │   connect(transport)                                                    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   Connecting ── read config (bounded retry) ──► Ready ◄─┐               │
//! │        │                │                        │      │ every 5s      │
//! │        │ retries        │ capability lookup      │      │ liveness      │
//! │        │ exhausted      │ (+extended id)         │      │ probe         │
//! │        ▼                ▼                        ▼      │               │
//! │     Failed ◄──── any transport error ──── execute(cmd) ─┘               │
//! │        │                                                                │
//! │        └──► failure signal fires ONCE; owner reconnects                 │
//! │                                                                         │
//! │   Codec errors (bad checksum/length) fail the COMMAND, not the          │
//! │   session. Transport errors fail the session.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Commands take the transport mutex for the full exchange, so the device
//! never sees interleaved frames; the liveness probe queues behind commands
//! on the same mutex.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use airgate_core::{validate_logging_interval, CapabilityTable, DeviceConfig, Sample};

use crate::codec::{self, Command};
use crate::error::{SyncError, SyncResult};
use crate::retry::{retry, RetryPolicy};
use crate::transport::FrameTransport;

// =============================================================================
// Session State
// =============================================================================

/// Externally observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial configuration read in progress.
    Connecting,
    /// Connected; commands accepted.
    Ready,
    /// Terminal. The owner must tear down and reconnect.
    Failed,
}

/// Tunables for session construction and liveness.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Interval between liveness probes.
    pub liveness_interval: Duration,
    /// Timeout for a single command exchange.
    pub command_timeout: Duration,
    /// Retry budget for the initial configuration read.
    pub init_retry: RetryPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            liveness_interval: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
            init_retry: RetryPolicy::fixed(3, Duration::from_millis(200)),
        }
    }
}

// =============================================================================
// Failure Signal
// =============================================================================

/// One-shot notification that the session has failed.
///
/// Fires at most once per session, whatever failed first (probe or command).
/// The holder's reaction is reconnection, not retry of the failed command.
pub struct FailureSignal {
    rx: watch::Receiver<bool>,
}

impl FailureSignal {
    /// Resolves when the session fails. If the session was dropped without
    /// failing, pends forever.
    pub async fn wait(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }

    /// Non-blocking check.
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }
}

// =============================================================================
// Session Internals
// =============================================================================

struct SessionInner {
    transport: Mutex<Box<dyn FrameTransport>>,
    config: RwLock<DeviceConfig>,
    state: RwLock<SessionState>,
    liveness_paused: AtomicBool,
    failure_tx: watch::Sender<bool>,
    failure_fired: AtomicBool,
    command_timeout: Duration,
}

impl SessionInner {
    fn state(&self) -> SessionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Transitions to `Failed` and fires the failure signal exactly once.
    fn fail(&self, reason: &str) {
        self.set_state(SessionState::Failed);
        if !self.failure_fired.swap(true, Ordering::SeqCst) {
            error!(reason, "Device session failed");
            let _ = self.failure_tx.send(true);
        }
    }

    /// Encodes, exchanges, and length/checksum-verifies one command.
    ///
    /// Transport errors fail the session before propagating; codec errors
    /// propagate without touching the session state.
    async fn execute(&self, command: Command) -> SyncResult<Vec<u8>> {
        if self.state() != SessionState::Ready {
            return Err(SyncError::SessionFailed);
        }

        let api = self.config.read().unwrap_or_else(|e| e.into_inner()).api;
        let host_time = Utc::now().timestamp() as u32;
        let request = codec::encode(&command, host_time);
        let expected_len = command.response_len(&api);

        let response = {
            let mut transport = self.transport.lock().await;
            transport
                .exchange(&request, expected_len, self.command_timeout)
                .await
        };

        match response {
            Ok(frame) => {
                if expected_len > 0 {
                    codec::verify(&frame, expected_len)?;
                }
                Ok(frame)
            }
            Err(err) => {
                self.fail(&err.to_string());
                Err(err.into())
            }
        }
    }
}

// =============================================================================
// Device Session
// =============================================================================

/// Handle to one connected device.
///
/// Cheap to clone; all clones share the same transport, state and failure
/// signal.
#[derive(Clone)]
pub struct DeviceSession {
    inner: Arc<SessionInner>,
    shutdown_tx: mpsc::Sender<()>,
}

impl DeviceSession {
    /// Connects: reads the device configuration (with a bounded retry),
    /// resolves capabilities, reads the extended identity where supported,
    /// and starts the liveness probe.
    pub async fn connect(
        mut transport: Box<dyn FrameTransport>,
        capabilities: &CapabilityTable,
        options: SessionOptions,
    ) -> SyncResult<(Self, FailureSignal, JoinHandle<()>)> {
        // The config response is a standard frame on every variant, so the
        // read works before capabilities are known.
        let config_frame = retry(options.init_retry, async || {
            let request = codec::encode(&Command::ReadConfig, Utc::now().timestamp() as u32);
            let frame = transport
                .exchange(&request, codec::RESPONSE_FRAME_LEN, options.command_timeout)
                .await
                .map_err(|e| SyncError::InitFailed(e.to_string()))?;
            codec::decode_config(&frame).map_err(|e| SyncError::InitFailed(e.to_string()))
        })
        .await?;

        let api = capabilities.lookup(config_frame.protocol_version);

        let mut id = config_frame.id.clone();
        if api.has_extended_id {
            // Same bounded retry as the config read; a flaky first exchange
            // must not fail the whole connect.
            let suffix = retry(options.init_retry, async || {
                let request =
                    codec::encode(&Command::ReadExtendedId, Utc::now().timestamp() as u32);
                let frame = transport
                    .exchange(&request, codec::RESPONSE_FRAME_LEN, options.command_timeout)
                    .await
                    .map_err(|e| SyncError::InitFailed(e.to_string()))?;
                codec::decode_extended_id(&frame).map_err(|e| SyncError::InitFailed(e.to_string()))
            })
            .await?;
            id.push_str(&suffix);
        }

        let config = DeviceConfig {
            id,
            protocol_version: config_frame.protocol_version,
            hardware_version: config_frame.hardware_version,
            firmware_version: config_frame.firmware_version,
            logging_interval: config_frame.logging_interval,
            api,
        };

        info!(
            device_id = %config.id,
            protocol_version = config.protocol_version,
            logging_interval = config.logging_interval,
            "Device session established"
        );

        let (failure_tx, failure_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let inner = Arc::new(SessionInner {
            transport: Mutex::new(transport),
            config: RwLock::new(config),
            state: RwLock::new(SessionState::Ready),
            liveness_paused: AtomicBool::new(false),
            failure_tx,
            failure_fired: AtomicBool::new(false),
            command_timeout: options.command_timeout,
        });

        let liveness = tokio::spawn(liveness_loop(
            Arc::clone(&inner),
            options.liveness_interval,
            shutdown_rx,
        ));

        let session = DeviceSession { inner, shutdown_tx };
        Ok((session, FailureSignal { rx: failure_rx }, liveness))
    }

    /// Current snapshot of the device configuration.
    pub fn config(&self) -> DeviceConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Reads the sample currently being measured.
    pub async fn read_current_sample(&self) -> SyncResult<Sample> {
        self.read_sample(Command::ReadCurrentSample).await
    }

    /// Reads the most recent stored sample. All-zero channels mean the
    /// device has no stored data; the caller checks `Sample::is_empty()`.
    pub async fn read_historic_sample(&self) -> SyncResult<Sample> {
        self.read_sample(Command::ReadHistoricSample).await
    }

    async fn read_sample(&self, command: Command) -> SyncResult<Sample> {
        let has_gps = self.config().api.has_gps;
        let download_time_ms = Utc::now().timestamp_millis();
        let frame = self.inner.execute(command).await?;
        Ok(codec::decode_sample(&frame, has_gps, download_time_ms)?)
    }

    /// Deletes the stored sample with the given device timestamp.
    pub async fn delete_sample(&self, sample_time: u32) -> SyncResult<()> {
        let frame = self.inner.execute(Command::DeleteSample { sample_time }).await?;
        Ok(codec::decode_ack(&frame)?)
    }

    /// Reads the count of stored samples.
    pub async fn read_sample_count(&self) -> SyncResult<u32> {
        if !self.config().api.can_get_sample_count {
            return Err(SyncError::Unsupported("sample count"));
        }
        let frame = self.inner.execute(Command::ReadSampleCount).await?;
        Ok(codec::decode_sample_count(&frame)?)
    }

    /// Writes the logging interval and replaces the configuration snapshot
    /// with the device's read-back.
    pub async fn set_logging_interval(&self, minutes: u16) -> SyncResult<DeviceConfig> {
        validate_logging_interval(minutes)?;
        if !self.config().api.can_mutate_logging_interval {
            return Err(SyncError::Unsupported("logging interval write"));
        }

        let frame = self
            .inner
            .execute(Command::WriteLoggingInterval(minutes as u8))
            .await?;
        let read_back = codec::decode_config(&frame)?;

        let mut config = self.inner.config.write().unwrap_or_else(|e| e.into_inner());
        config.logging_interval = read_back.logging_interval;
        config.firmware_version = read_back.firmware_version;
        config.hardware_version = read_back.hardware_version;
        debug!(
            logging_interval = config.logging_interval,
            "Logging interval updated from device read-back"
        );
        Ok(config.clone())
    }

    /// Sends the device into bootloader mode.
    ///
    /// No response is read. The session transitions to `Failed` without
    /// firing the failure signal: the caller asked for this, reconnection
    /// is their explicit next step.
    pub async fn enter_bootloader(&self) -> SyncResult<()> {
        if !self.config().api.can_enter_bootloader_mode {
            return Err(SyncError::Unsupported("bootloader mode"));
        }
        self.pause_liveness();
        self.inner.execute(Command::EnterBootloader).await?;
        self.inner.set_state(SessionState::Failed);
        info!("Device entering bootloader; session closed");
        Ok(())
    }

    /// Suspends the liveness probe. Commands still work.
    pub fn pause_liveness(&self) {
        self.inner.liveness_paused.store(true, Ordering::SeqCst);
    }

    /// Resumes the liveness probe.
    pub fn resume_liveness(&self) {
        self.inner.liveness_paused.store(false, Ordering::SeqCst);
    }

    /// Stops the liveness task. The transport is released on drop.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Liveness Probe
// =============================================================================

/// Probes the device with a current-sample read on a fixed cadence.
///
/// The probe reuses the real command path, so a hung or unplugged device is
/// detected even when the scheduler is idle. Any probe failure, transport
/// or decode, ends the session: a device answering garbage is as dead as
/// one not answering at all.
async fn liveness_loop(
    inner: Arc<SessionInner>,
    probe_interval: Duration,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(probe_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; connect() just talked to the device.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Liveness probe stopping");
                break;
            }
            _ = ticker.tick() => {
                // A dead session ends the task even while paused
                // (bootloader entry pauses first, then fails the state).
                match inner.state() {
                    SessionState::Ready => {}
                    _ => break,
                }
                if inner.liveness_paused.load(Ordering::SeqCst) {
                    continue;
                }
                // ANY unpaused probe failure kills the session. Transport
                // errors already fail inside execute; a corrupt response
                // (codec error) must not leave a zombie Ready session
                // behind, so fail here too (fire-once makes this safe).
                if let Err(e) = inner.execute(Command::ReadCurrentSample).await {
                    warn!(error = %e, "Liveness probe failed");
                    inner.fail(&e.to_string());
                    break;
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
