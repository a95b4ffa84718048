//! Step definitions — the nodes of a dialogue script.
//!
//! Dynamic parts of a step (prompt text, choice list, next-step branch) are
//! explicit enum variants holding plain function pointers, so a script stays
//! a plain data table that can be inspected and tested without running it.

use serde::{Deserialize, Serialize};

use super::state::Answers;
use super::validate::Validator;

pub type PromptFn = fn(&Answers) -> String;
pub type ChoicesFn = fn(&Answers) -> Vec<Choice>;
/// Branch resolver: `(captured_value, answers) -> next step id`.
pub type BranchFn = fn(&str, &Answers) -> String;

/// Text shown by the bot when a step is entered.
#[derive(Debug, Clone)]
pub enum Prompt {
    Static(String),
    Computed(PromptFn),
}

impl Prompt {
    pub fn render(&self, answers: &Answers) -> String {
        match self {
            Self::Static(text) => text.clone(),
            Self::Computed(f) => f(answers),
        }
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Self::Static(text.to_string())
    }
}

/// Replace `{field}` placeholders with collected answers.
///
/// Unknown or uncaptured fields render as an empty string. Unbalanced braces
/// are copied through unchanged.
pub fn interpolate(template: &str, answers: &Answers) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                out.push_str(answers.get_or_empty(&after[..close]));
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// A selectable option of a choice step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Text shown on the button, echoed as the user's message.
    pub label: String,
    /// Value stored in the answers map.
    pub value: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Choices {
    Static(Vec<Choice>),
    Computed(ChoicesFn),
}

impl Choices {
    pub fn resolve(&self, answers: &Answers) -> Vec<Choice> {
        match self {
            Self::Static(list) => list.clone(),
            Self::Computed(f) => f(answers),
        }
    }
}

/// How the step after this one is chosen.
#[derive(Debug, Clone)]
pub enum NextStep {
    Fixed(String),
    Branch(BranchFn),
}

/// What a step asks of the user.
#[derive(Debug, Clone)]
pub enum StepKind {
    /// Bot-only message; advances on its own after the typing delay.
    Message,
    TextInput {
        target_field: String,
        validator: Validator,
        error_message: String,
        placeholder: Option<String>,
    },
    ChoiceInput {
        target_field: String,
        choices: Choices,
    },
}

/// A node in the dialogue script.
#[derive(Debug, Clone)]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
    pub prompt: Prompt,
    pub next: Option<NextStep>,
    pub is_terminal: bool,
}

impl Step {
    pub fn message(id: &str, prompt: impl Into<Prompt>) -> Self {
        Self {
            id: id.to_string(),
            kind: StepKind::Message,
            prompt: prompt.into(),
            next: None,
            is_terminal: false,
        }
    }

    pub fn text(
        id: &str,
        prompt: impl Into<Prompt>,
        target_field: &str,
        validator: Validator,
        error_message: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            kind: StepKind::TextInput {
                target_field: target_field.to_string(),
                validator,
                error_message: error_message.to_string(),
                placeholder: None,
            },
            prompt: prompt.into(),
            next: None,
            is_terminal: false,
        }
    }

    pub fn choice(id: &str, prompt: impl Into<Prompt>, target_field: &str, choices: Choices) -> Self {
        Self {
            id: id.to_string(),
            kind: StepKind::ChoiceInput {
                target_field: target_field.to_string(),
                choices,
            },
            prompt: prompt.into(),
            next: None,
            is_terminal: false,
        }
    }

    pub fn then(mut self, next: &str) -> Self {
        self.next = Some(NextStep::Fixed(next.to_string()));
        self
    }

    pub fn branch(mut self, resolver: BranchFn) -> Self {
        self.next = Some(NextStep::Branch(resolver));
        self
    }

    pub fn terminal(mut self) -> Self {
        self.is_terminal = true;
        self
    }

    /// Set the input placeholder. No effect on non-text steps.
    pub fn placeholder(mut self, hint: &str) -> Self {
        if let StepKind::TextInput { placeholder, .. } = &mut self.kind {
            *placeholder = Some(hint.to_string());
        }
        self
    }

    pub fn target_field(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Message => None,
            StepKind::TextInput { target_field, .. } | StepKind::ChoiceInput { target_field, .. } => {
                Some(target_field.as_str())
            }
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            StepKind::Message => "message",
            StepKind::TextInput { .. } => "text_input",
            StepKind::ChoiceInput { .. } => "choice_input",
        }
    }

    /// Serializable description of this step. Function-valued parts appear
    /// as markers.
    pub fn summary(&self) -> StepSummary {
        let (validator, choices) = match &self.kind {
            StepKind::Message => (None, None),
            StepKind::TextInput { validator, .. } => (Some(validator.describe()), None),
            StepKind::ChoiceInput { choices, .. } => (
                None,
                Some(match choices {
                    Choices::Static(list) => ChoicesSummary::Static {
                        choices: list.clone(),
                    },
                    Choices::Computed(_) => ChoicesSummary::Computed,
                }),
            ),
        };
        StepSummary {
            id: self.id.clone(),
            kind: self.kind_name(),
            prompt: match &self.prompt {
                Prompt::Static(text) => Some(text.clone()),
                Prompt::Computed(_) => None,
            },
            target_field: self.target_field().map(String::from),
            validator,
            choices,
            next: match &self.next {
                Some(NextStep::Fixed(id)) => NextSummary::Fixed { step: id.clone() },
                Some(NextStep::Branch(_)) => NextSummary::Branch,
                None => NextSummary::End,
            },
            is_terminal: self.is_terminal,
        }
    }
}

/// Introspection view of a [`Step`].
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub id: String,
    pub kind: &'static str,
    /// Static prompt text; `None` when computed from answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<ChoicesSummary>,
    pub next: NextSummary,
    pub is_terminal: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChoicesSummary {
    Static { choices: Vec<Choice> },
    Computed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NextSummary {
    Fixed { step: String },
    Branch,
    End,
}
