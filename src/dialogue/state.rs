//! Session state — one user's progress through the dialogue.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScriptError;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Bot,
    User,
}

/// A line in the rendered conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Collected answers, keyed by target field.
///
/// Append-only: a field is recorded at most once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answers(BTreeMap<String, String>);

impl Answers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Value of `field`, or an empty string when it was never captured.
    pub fn get_or_empty(&self, field: &str) -> &str {
        self.get(field).unwrap_or("")
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Record a captured value. `step` is only used for error reporting.
    pub(crate) fn record(&mut self, step: &str, field: &str, value: String) -> Result<(), ScriptError> {
        if self.0.contains_key(field) {
            return Err(ScriptError::FieldAlreadyCaptured {
                step: step.to_string(),
                field: field.to_string(),
            });
        }
        self.0.insert(field.to_string(), value);
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Answers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// In-memory state of a single dialogue session.
///
/// Never persisted: it is dropped once the lead is submitted or the session
/// is torn down.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub answers: Answers,
    /// Index of the current step in the script. Only ever moves forward.
    pub current_step_index: usize,
    pub transcript: Vec<TranscriptEntry>,
    /// Reference id generated when the terminal step is reached.
    pub protocol: Option<String>,
    pub completed: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            answers: Answers::new(),
            current_step_index: 0,
            transcript: Vec::new(),
            protocol: None,
            completed: false,
        }
    }

    pub fn push_transcript(&mut self, speaker: Speaker, content: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            speaker,
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    /// Move the step pointer forward. Returns false (leaving the pointer
    /// untouched) if `index` is not ahead of the current step.
    pub(crate) fn advance_to(&mut self, index: usize) -> bool {
        if index <= self.current_step_index {
            return false;
        }
        self.current_step_index = index;
        true
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state() {
        let state = SessionState::new();
        assert_eq!(state.current_step_index, 0);
        assert!(state.answers.is_empty());
        assert!(state.transcript.is_empty());
        assert!(state.protocol.is_none());
        assert!(!state.completed);
    }

    #[test]
    fn session_ids_are_distinct() {
        let a = SessionState::new();
        let b = SessionState::new();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn answers_are_append_only() {
        let mut answers = Answers::new();
        answers.record("ask_name", "name", "Ana".to_string()).unwrap();
        let err = answers
            .record("ask_name_again", "name", "Bia".to_string())
            .unwrap_err();
        assert_eq!(
            err,
            ScriptError::FieldAlreadyCaptured {
                step: "ask_name_again".to_string(),
                field: "name".to_string(),
            }
        );
        assert_eq!(answers.get("name"), Some("Ana"));
        assert_eq!(answers.len(), 1);
    }

    #[test]
    fn advance_is_forward_only() {
        let mut state = SessionState::new();
        assert!(state.advance_to(2));
        assert!(!state.advance_to(2));
        assert!(!state.advance_to(1));
        assert_eq!(state.current_step_index, 2);
    }

    #[test]
    fn answers_serialize_as_plain_map() {
        let answers: Answers = [("name", "Ana"), ("userType", "empresa")].into_iter().collect();
        let json = serde_json::to_value(&answers).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Ana", "userType": "empresa"}));
        assert_eq!(answers.get_or_empty("email"), "");
    }

    #[test]
    fn transcript_records_speaker() {
        let mut state = SessionState::new();
        state.push_transcript(Speaker::Bot, "Olá!");
        state.push_transcript(Speaker::User, "Oi");
        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.transcript[0].speaker, Speaker::Bot);
        assert_eq!(state.transcript[1].content, "Oi");
    }
}
