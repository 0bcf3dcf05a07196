//! # Upload Transport
//!
//! HTTP delivery of sample batches to the remote storage server.
//!
//! ## Upload Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         HttpUplink                                      │
//! │                                                                         │
//! │  batch ──► build_payload ──► POST /input/{device} ──► response          │
//! │              (channel_names        basic auth             │             │
//! │               + data rows)                                │             │
//! │                                       ┌───────────────────┼──────────┐  │
//! │                                       ▼                   ▼          ▼  │
//! │                                  no response         401 / 403    body  │
//! │                                       │                   │          │  │
//! │                                UplinkUnavailable    fixed "KO"    parse │
//! │                                  (Err: batch         outcome      JSON  │
//! │                                   retained)              │          │   │
//! │                                                          ▼          ▼   │
//! │                                                   UploadOutcome "OK"/"KO"│
//! │                                                   (Ok: batch resolved)  │
//! │                                                                         │
//! │  The Err/Ok split is the retention contract: an error means nobody      │
//! │  answered and the batch stays in flight; an outcome means the server    │
//! │  decided, and the store is marked accordingly.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Channel layout varies by device capability; the server learns the shape
//! from `channel_names`, so rows and names are always built from the same
//! capability set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use airgate_core::{ApiSupport, DataSampleSet};

use crate::error::SyncResult;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(300);

// =============================================================================
// Outcome
// =============================================================================

/// Per-batch record accounting attached to a server verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadReceipt {
    #[serde(default)]
    pub successful_records: u64,
    #[serde(default)]
    pub failed_records: u64,
    /// Server-side reason for the failed records, when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Structured verdict from the storage server.
///
/// `"OK"` acknowledges the whole batch; anything else rejects it. A
/// rejection is a *successful exchange* with a negative answer, which is
/// why it is an `Ok` value and not an error. The optional `payload`
/// carries the server's per-record accounting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadOutcome {
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<UploadReceipt>,
}

impl UploadOutcome {
    /// Batch acknowledged and stored remotely.
    pub fn was_successful(&self) -> bool {
        self.result == "OK"
    }

    /// Synthesizes a whole-batch acknowledgement (test fakes, probes).
    pub fn accepted() -> Self {
        UploadOutcome {
            result: "OK".to_string(),
            message: None,
            payload: None,
        }
    }

    /// Synthesizes a rejection with a local message.
    pub fn rejected(message: impl Into<String>) -> Self {
        UploadOutcome {
            result: "KO".to_string(),
            message: Some(message.into()),
            payload: None,
        }
    }
}

// =============================================================================
// Uplink Seam
// =============================================================================

/// Upload transport seam. The scheduler only sees this trait, so tests swap
/// in a recording fake.
#[async_trait]
pub trait Uplink: Send + Sync {
    /// Delivers a batch. `Err` means no usable server response (retain the
    /// batch); `Ok` carries the server's verdict (resolve the batch).
    async fn upload_samples(&self, batch: &DataSampleSet) -> SyncResult<UploadOutcome>;

    /// Probes the endpoint with an empty batch to verify credentials.
    async fn validate_credentials(&self) -> SyncResult<UploadOutcome>;
}

// =============================================================================
// Payload
// =============================================================================

#[derive(Debug, Serialize)]
struct UploadPayload {
    channel_names: Vec<&'static str>,
    data: Vec<Vec<Value>>,
}

/// Builds the JSON payload for a batch.
///
/// Channel order is fixed: time, raw particle count, the variant-specific
/// particle channel, temperature where the device has the sensor, humidity,
/// then GPS coordinate text on GPS-equipped variants. Coordinates are
/// forwarded as the exact decimal text decoded from the device, never as
/// floats.
pub fn build_payload(batch: &DataSampleSet, api: &ApiSupport) -> Value {
    let mut channel_names = vec!["time", "raw_particle_count"];
    channel_names.push(if api.has_particle_concentration {
        "particle_concentration"
    } else {
        "particle_count"
    });
    if api.has_temperature_sensor {
        channel_names.push("temperature");
    }
    channel_names.push("humidity");
    if api.has_gps {
        channel_names.push("latitude");
        channel_names.push("longitude");
    }

    let data = batch
        .iter()
        .map(|sample| {
            let mut row = vec![
                Value::from(sample.sample_time),
                Value::from(sample.raw_particle_count),
                Value::from(sample.particle_count),
            ];
            if api.has_temperature_sensor {
                row.push(Value::from(sample.temperature_tenths_f));
            }
            row.push(Value::from(sample.humidity));
            if api.has_gps {
                match &sample.gps {
                    Some(fix) => {
                        row.push(Value::from(fix.latitude.clone()));
                        row.push(Value::from(fix.longitude.clone()));
                    }
                    None => {
                        row.push(Value::from(""));
                        row.push(Value::from(""));
                    }
                }
            }
            row
        })
        .collect();

    serde_json::to_value(UploadPayload {
        channel_names,
        data,
    })
    .unwrap_or(Value::Null)
}

// =============================================================================
// HTTP Uplink
// =============================================================================

/// Endpoint coordinates and credentials for the storage server.
#[derive(Debug, Clone)]
pub struct UplinkEndpoint {
    pub host: String,
    pub port: u16,
    pub device_name: String,
    pub username: String,
    pub password: String,
}

impl UplinkEndpoint {
    fn url(&self) -> String {
        format!(
            "http://{}:{}/input/{}",
            self.host, self.port, self.device_name
        )
    }
}

/// Production [`Uplink`] over HTTP with basic auth.
pub struct HttpUplink {
    client: reqwest::Client,
    endpoint: UplinkEndpoint,
    api: ApiSupport,
}

impl HttpUplink {
    /// Builds the client with generous timeouts; uploads ride residential
    /// links and the server may be slow under bulk ingest.
    pub fn new(endpoint: UplinkEndpoint, api: ApiSupport) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(HttpUplink {
            client,
            endpoint,
            api,
        })
    }

    async fn post(&self, payload: &Value) -> SyncResult<UploadOutcome> {
        let response = self
            .client
            .post(self.endpoint.url())
            .basic_auth(&self.endpoint.username, Some(&self.endpoint.password))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            warn!(%status, "Upload credentials rejected");
            return Ok(UploadOutcome::rejected("authentication rejected by server"));
        }

        // The server's verdict lives in the body, whatever the status code.
        // A body that does not parse is a rejection, not an outage: the
        // server answered, it just did not accept the batch.
        let body = response.text().await?;
        match serde_json::from_str::<UploadOutcome>(&body) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(%status, error = %e, "Unparseable upload response");
                Ok(UploadOutcome::rejected(format!(
                    "unparseable server response (status {status})"
                )))
            }
        }
    }
}

#[async_trait]
impl Uplink for HttpUplink {
    async fn upload_samples(&self, batch: &DataSampleSet) -> SyncResult<UploadOutcome> {
        debug!(
            batch_size = batch.len(),
            device = %self.endpoint.device_name,
            "Uploading sample batch"
        );
        let payload = build_payload(batch, &self.api);
        self.post(&payload).await
    }

    async fn validate_credentials(&self) -> SyncResult<UploadOutcome> {
        let empty = build_payload(&DataSampleSet::with_capacity(0), &self.api);
        self.post(&empty).await
    }
}

// =============================================================================
// Tests
// =============================================================================
