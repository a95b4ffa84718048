//! Lead submission payload and endpoint response.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dialogue::state::{Answers, SessionState};

/// Answer key holding the user-type branch.
const USER_TYPE_FIELD: &str = "userType";

/// Prefix of every protocol id.
pub const PROTOCOL_PREFIX: &str = "CRI";

/// Generate a human-readable protocol id: `CRI` + UTC milliseconds + three
/// random digits.
pub fn generate_protocol() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("{PROTOCOL_PREFIX}{}{suffix:03}", Utc::now().timestamp_millis())
}

/// Payload sent once to the persistence endpoint when a dialogue completes.
///
/// Serialized as one flat object: every captured field (`name`, `userType`,
/// `whatsapp`, ...) next to the metadata keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSubmission {
    #[serde(flatten)]
    pub answers: Answers,
    /// Which dialogue variant produced the lead.
    pub source: String,
    pub protocol: String,
    pub session_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

impl LeadSubmission {
    pub fn from_session(state: &SessionState, source: &str, protocol: &str) -> Self {
        Self {
            answers: state.answers.clone(),
            source: source.to_string(),
            protocol: protocol.to_string(),
            session_id: state.session_id,
            submitted_at: Utc::now(),
        }
    }

    /// The branch the user picked, when the script captured one.
    pub fn user_type(&self) -> Option<&str> {
        self.answers.get(USER_TYPE_FIELD)
    }
}

/// Response of the persistence endpoint: `{success, leadId, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadReceipt {
    pub success: bool,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}
