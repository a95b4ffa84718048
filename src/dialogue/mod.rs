//! Conversational lead intake — scripted, branching dialogue.
//!
//! A [`StepScript`] is a validated table of steps. A [`DialogueEngine`]
//! walks one session through it: it renders bot messages, collects and
//! validates answers, resolves branches, and submits the lead when the
//! terminal step is reached.

pub mod engine;
pub mod render;
pub mod script;
pub mod scripts;
pub mod state;
pub mod step;
pub mod validate;

pub use engine::{DialogueEngine, EnginePhase, SubmitOutcome, TeardownHandle};
pub use render::{InputAffordance, RenderEvent, Renderer, StepView};
pub use script::{ScriptSummary, StepScript};
pub use scripts::lead_intake_script;
pub use state::{Answers, SessionState, Speaker, TranscriptEntry};
pub use step::{Choice, Choices, NextStep, Prompt, Step, StepKind, interpolate};
pub use validate::Validator;
