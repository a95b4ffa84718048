//! Lead submission over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::model::{LeadReceipt, LeadSubmission};
use crate::error::{ConfigError, SubmissionError};

/// Persists a completed lead. Called once per dialogue.
#[async_trait]
pub trait LeadSubmitter: Send + Sync {
    async fn submit(&self, lead: &LeadSubmission) -> Result<LeadReceipt, SubmissionError>;
}

/// POSTs the lead as JSON to the persistence endpoint.
pub struct HttpLeadSubmitter {
    client: reqwest::Client,
    endpoint: String,
    token: Option<SecretString>,
    timeout: Duration,
}

impl HttpLeadSubmitter {
    pub fn new(
        endpoint: &str,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            token,
            timeout,
        })
    }
}

#[async_trait]
impl LeadSubmitter for HttpLeadSubmitter {
    async fn submit(&self, lead: &LeadSubmission) -> Result<LeadReceipt, SubmissionError> {
        let mut request = self.client.post(&self.endpoint).json(lead);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SubmissionError::Timeout(self.timeout)
            } else {
                SubmissionError::Http(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SubmissionError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let receipt: LeadReceipt = resp
            .json()
            .await
            .map_err(|e| SubmissionError::InvalidResponse(e.to_string()))?;

        debug!(
            protocol = %lead.protocol,
            success = receipt.success,
            lead_id = ?receipt.lead_id,
            "Lead endpoint responded"
        );
        Ok(receipt)
    }
}
