//! HTTP sink: POSTs each record as JSON to `<base_url>/<kind>`.

use async_trait::async_trait;
use event_types::{DeliverySink, Record, RecordKind, SinkError};
use std::time::Duration;

/// Header carrying the record id so the receiver can drop redeliveries.
pub const EVENT_ID_HEADER: &str = "x-event-id";

/// Sink that forwards records to an HTTP endpoint. Any non-2xx answer is a failed delivery.
pub struct WebhookSink {
    client: reqwest::Client,
    base_url: String,
}

impl WebhookSink {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self, kind: RecordKind) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), kind.as_str())
    }
}

#[async_trait]
impl<T: Record> DeliverySink<T> for WebhookSink {
    async fn deliver(&self, record: &T) -> Result<(), SinkError> {
        let url = self.endpoint(T::KIND);
        let resp = self
            .client
            .post(&url)
            .header(EVENT_ID_HEADER, record.id().to_string())
            .json(record)
            .send()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Rejected(format!("{url} returned {status}: {body}")));
        }
        tracing::debug!(kind = %T::KIND, id = %record.id(), "event delivered");
        Ok(())
    }
}
