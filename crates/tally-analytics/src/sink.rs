//! Analytics sinks.
//!
//! - [`SegmentSink`]: delivers each record as a Segment-compatible HTTP
//!   `track` call. One request per record; no batching, no retry.
//! - [`LogSink`]: logs records instead of delivering them, used when no
//!   write key is configured.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tally_types::TrackingRecord;
use url::Url;

use crate::error::SinkError;

/// Default Segment API base URL.
pub const DEFAULT_SEGMENT_ENDPOINT: &str = "https://api.segment.io";

/// Default request timeout for a track call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("tally/", env!("CARGO_PKG_VERSION"));

/// The analytics collaborator. `track` may fail; callers must not retry.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Accepts one tracking record.
    async fn track(&self, record: TrackingRecord) -> Result<(), SinkError>;
}

/// Connection settings for [`SegmentSink`].
#[derive(Debug, Clone)]
pub struct SegmentSettings {
    /// Source write key, sent as the basic-auth username.
    pub write_key: String,
    /// API base URL.
    pub endpoint: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl SegmentSettings {
    /// Settings for the public Segment API.
    pub fn new(write_key: impl Into<String>) -> Self {
        Self {
            write_key: write_key.into(),
            endpoint: DEFAULT_SEGMENT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Resolves `v1/track` below the endpoint, keeping any path prefix.
fn track_url(endpoint: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(endpoint)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("v1/track")
}

/// Delivers records to the Segment HTTP tracking API.
#[derive(Debug, Clone)]
pub struct SegmentSink {
    client: Client,
    track_url: Url,
    write_key: String,
}

impl SegmentSink {
    /// Creates a sink for the given settings.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Endpoint` if the endpoint is not a valid URL, or
    /// `SinkError::Http` if the HTTP client cannot be built.
    pub fn new(settings: SegmentSettings) -> Result<Self, SinkError> {
        let track_url = track_url(&settings.endpoint)?;
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            track_url,
            write_key: settings.write_key,
        })
    }

    /// The resolved `track` URL.
    pub fn track_url(&self) -> &Url {
        &self.track_url
    }

    /// Adds the envelope fields. Fields already on the record are kept.
    fn payload(record: TrackingRecord) -> Value {
        let mut body = record.into_map();
        body.entry("messageId")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        body.entry("timestamp")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        body.entry("context").or_insert_with(|| {
            json!({"library": {"name": "tally", "version": env!("CARGO_PKG_VERSION")}})
        });
        Value::Object(body)
    }
}

#[async_trait]
impl AnalyticsSink for SegmentSink {
    async fn track(&self, record: TrackingRecord) -> Result<(), SinkError> {
        let event = record.event().unwrap_or_default().to_string();

        let response = self
            .client
            .post(self.track_url.clone())
            .basic_auth(&self.write_key, Some(""))
            .json(&Self::payload(record))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(event = %event, "delivered analytics event");
        Ok(())
    }
}

/// Logs records at `info` instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl AnalyticsSink for LogSink {
    async fn track(&self, record: TrackingRecord) -> Result<(), SinkError> {
        let fields = Value::Object(record.as_map().clone());
        tracing::info!(
            event = record.event().unwrap_or_default(),
            user_id = record.user_id().unwrap_or_default(),
            record = %fields,
            "analytics event (no sink configured)"
        );
        Ok(())
    }
}
