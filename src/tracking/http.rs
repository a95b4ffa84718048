//! HTTP delivery of tracking batches.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::event::TrackingEvent;
use super::sink::TrackingTransport;
use crate::error::{ConfigError, TrackingError};

#[derive(Serialize)]
struct Batch<'a> {
    events: &'a [TrackingEvent],
}

/// POSTs `{"events": [...]}` to the tracking endpoint. The response body is
/// ignored.
pub struct HttpTrackingTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTrackingTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl TrackingTransport for HttpTrackingTransport {
    async fn send(&self, batch: &[TrackingEvent]) -> Result<(), TrackingError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&Batch { events: batch })
            .send()
            .await
            .map_err(|e| TrackingError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(TrackingError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}
