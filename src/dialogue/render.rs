//! Render surface contract — what the engine asks a UI to draw.

use serde::Serialize;

use super::step::Choice;

/// A render instruction emitted by the engine.
///
/// Serialized with a `type` tag so transports can forward it as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderEvent {
    /// A bot line was appended to the transcript.
    BotMessage { step_id: String, content: String },
    /// The user's answer was appended to the transcript.
    UserMessage { step_id: String, content: String },
    /// The last text submission failed validation.
    ValidationError { step_id: String, message: String },
    /// The bot is "typing" before the next line.
    Typing { step_id: String },
    /// Enable free-text input for `step_id`.
    AwaitText {
        step_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    /// Show the choice buttons for `step_id`.
    AwaitChoice { step_id: String, choices: Vec<Choice> },
    /// The dialogue reached its terminal step; input is disabled.
    Completed { protocol: String },
}

/// Receives render instructions. Implementations must not block.
pub trait Renderer: Send + Sync {
    fn render(&self, event: RenderEvent);
}

impl<F> Renderer for F
where
    F: Fn(RenderEvent) + Send + Sync,
{
    fn render(&self, event: RenderEvent) {
        self(event)
    }
}

/// Input affordance for the current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputAffordance {
    None,
    Text {
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    Choice { choices: Vec<Choice> },
}

/// Render-ready payload for the step the engine is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub step_id: String,
    pub prompt: String,
    pub input: InputAffordance,
}
