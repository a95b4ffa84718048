//! In-process lead store, used when no persistence endpoint is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::model::{LeadReceipt, LeadSubmission};
use super::submitter::LeadSubmitter;
use crate::error::SubmissionError;

/// A lead as held by [`MemoryLeadStore`].
#[derive(Debug, Clone, Serialize)]
pub struct StoredLead {
    pub lead_id: Uuid,
    /// Dedup key: WhatsApp digits, else lowercased e-mail, else protocol.
    pub key: String,
    pub latest: LeadSubmission,
    pub submissions: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts leads in memory, keyed by contact.
#[derive(Default)]
pub struct MemoryLeadStore {
    leads: RwLock<Vec<StoredLead>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn leads(&self) -> Vec<StoredLead> {
        self.leads.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.leads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.leads.read().await.is_empty()
    }
}

fn dedup_key(lead: &LeadSubmission) -> String {
    if let Some(phone) = lead.answers.get("whatsapp") {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            return format!("whatsapp:{digits}");
        }
    }
    if let Some(email) = lead.answers.get("email") {
        let email = email.trim().to_lowercase();
        if !email.is_empty() {
            return format!("email:{email}");
        }
    }
    format!("protocol:{}", lead.protocol)
}

#[async_trait]
impl LeadSubmitter for MemoryLeadStore {
    async fn submit(&self, lead: &LeadSubmission) -> Result<LeadReceipt, SubmissionError> {
        let key = dedup_key(lead);
        let now = Utc::now();
        let mut leads = self.leads.write().await;

        let (stored, created) = match leads.iter_mut().find(|l| l.key == key) {
            Some(existing) => {
                existing.latest = lead.clone();
                existing.submissions += 1;
                existing.updated_at = now;
                (existing.clone(), false)
            }
            None => {
                let stored = StoredLead {
                    lead_id: Uuid::new_v4(),
                    key,
                    latest: lead.clone(),
                    submissions: 1,
                    created_at: now,
                    updated_at: now,
                };
                leads.push(stored.clone());
                (stored, true)
            }
        };

        info!(
            lead_id = %stored.lead_id,
            protocol = %lead.protocol,
            created,
            "Lead stored in memory"
        );

        Ok(LeadReceipt {
            success: true,
            lead_id: Some(stored.lead_id.to_string()),
            data: Some(serde_json::json!({
                "created": created,
                "submissions": stored.submissions,
            })),
        })
    }
}
