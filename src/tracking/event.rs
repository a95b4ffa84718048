//! Analytics events emitted by the dialogue engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single analytics event, correlated by session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl TrackingEvent {
    pub fn new(session_id: Uuid, kind: EventKind) -> Self {
        Self {
            session_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Event name as sent on the wire.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    SessionStart {
        source: String,
        script: String,
    },
    StepCompleted {
        step_id: String,
        /// 1-based position among the answered steps of this session.
        ordinal: u32,
        value: String,
        step_elapsed_ms: u64,
        session_elapsed_ms: u64,
    },
    FormSubmitted {
        protocol: String,
        success: bool,
        session_elapsed_ms: u64,
    },
    /// Teardown of a session, completed or not.
    Abandoned {
        last_step: String,
        completed: bool,
        session_elapsed_ms: u64,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStart { .. } => "session_start",
            Self::StepCompleted { .. } => "step_completed",
            Self::FormSubmitted { .. } => "form_submitted",
            Self::Abandoned { .. } => "abandoned",
        }
    }
}
