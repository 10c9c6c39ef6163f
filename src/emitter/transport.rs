use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use crate::schema::EventRecord;

/// Transport is the seam between the emitter and the collector.
///
/// The emitter owns fire-and-forget semantics; a transport only
/// performs one delivery attempt and reports how it went.
///
/// CONTRACT:
/// - Exactly one attempt per call, no internal retry
/// - Any non-success outcome is returned as `Err`
/// - Must never panic
///
/// THREAD SAFETY:
/// - Shared by every concurrent delivery attempt
///
#[async_trait::async_trait]
pub trait Transport: Send + Sync {

    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Delivers a single record.
    async fn post(&self, record: &EventRecord) -> Result<()>;
}

// ------------------------------------------------------------
// HTTP transport
// ------------------------------------------------------------
//
// POSTs the record as JSON to the collector endpoint.
// The response body is ignored; only the status is inspected.
//
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn post(&self, record: &EventRecord) -> Result<()> {
        self.client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.endpoint))?
            .error_for_status()
            .with_context(|| format!("collector rejected {}", record.event_type))?;
        Ok(())
    }
}

// ------------------------------------------------------------
// Demo transport
// ------------------------------------------------------------
//
// No network traffic. Each record is logged together with the
// time it would have been captured at the sink.
//
pub struct DemoTransport;

#[async_trait::async_trait]
impl Transport for DemoTransport {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn post(&self, record: &EventRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        info!(
            "DEMO → {} captured_at={}",
            json,
            chrono::Utc::now().to_rfc3339()
        );
        Ok(())
    }
}
