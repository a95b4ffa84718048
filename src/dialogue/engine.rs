//! DialogueEngine — drives one session through a step script.
//!
//! The engine is cooperative and single-threaded per session: every state
//! change happens inside `start`, `on_text_submit` or `on_choice_select`.
//! It suspends at input steps until the render surface calls back, and at
//! message steps for the typing delay. The delay can be cancelled from
//! outside through a [`TeardownHandle`], after which the session is closed.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::render::{InputAffordance, RenderEvent, Renderer, StepView};
use super::script::StepScript;
use super::state::{Answers, SessionState, Speaker, TranscriptEntry};
use super::step::{Choice, Step, StepKind};
use crate::config::EngineConfig;
use crate::error::{EngineError, ScriptError};
use crate::lead::{LeadSubmission, LeadSubmitter, generate_protocol};
use crate::tracking::{EventKind, TrackingEvent, TrackingSink};

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Constructed, `start` not called yet.
    Idle,
    /// Showing bot messages; no input accepted.
    Presenting,
    AwaitingText,
    AwaitingChoice,
    /// Terminal step reached and lead submitted.
    Completed,
    /// Torn down, or stopped by a script defect.
    Closed,
}

impl std::fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Presenting => "presenting",
            Self::AwaitingText => "awaiting_text",
            Self::AwaitingChoice => "awaiting_choice",
            Self::Completed => "completed",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Result of a text submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Validation failed; the same step is waiting for another attempt.
    Rejected { message: String },
    /// The value was stored and the engine moved on. `phase` is where it
    /// stopped: awaiting the next input, or completed.
    Accepted { phase: EnginePhase },
}

/// Cancels a session from outside the task driving it.
#[derive(Clone)]
pub struct TeardownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl TeardownHandle {
    /// Abort any pending typing delay. The engine refuses further input.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Drives a [`StepScript`] against one [`SessionState`].
pub struct DialogueEngine {
    script: Arc<StepScript>,
    config: EngineConfig,
    renderer: Arc<dyn Renderer>,
    leads: Arc<dyn LeadSubmitter>,
    tracker: Arc<dyn TrackingSink>,
    state: SessionState,
    phase: EnginePhase,
    /// Choices offered by the current choice step.
    offered: Vec<Choice>,
    answered: u32,
    started_at: Instant,
    step_entered_at: Instant,
    teardown: TeardownHandle,
    teardown_rx: watch::Receiver<bool>,
    abandoned: bool,
    submission_ok: Option<bool>,
}

impl DialogueEngine {
    pub fn new(
        script: Arc<StepScript>,
        config: EngineConfig,
        renderer: Arc<dyn Renderer>,
        leads: Arc<dyn LeadSubmitter>,
        tracker: Arc<dyn TrackingSink>,
    ) -> Self {
        let (tx, teardown_rx) = watch::channel(false);
        let now = Instant::now();
        Self {
            script,
            config,
            renderer,
            leads,
            tracker,
            state: SessionState::new(),
            phase: EnginePhase::Idle,
            offered: Vec::new(),
            answered: 0,
            started_at: now,
            step_entered_at: now,
            teardown: TeardownHandle { tx: Arc::new(tx) },
            teardown_rx,
            abandoned: false,
            submission_ok: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.state.session_id
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn answers(&self) -> &Answers {
        &self.state.answers
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.state.transcript
    }

    /// Id of the step the engine is on.
    pub fn current_step_id(&self) -> Option<&str> {
        self.script
            .step(self.state.current_step_index)
            .map(|s| s.id.as_str())
    }

    /// Whether the lead endpoint accepted the submission. `None` until the
    /// terminal step has been processed.
    pub fn submission_succeeded(&self) -> Option<bool> {
        self.submission_ok
    }

    pub fn teardown_handle(&self) -> TeardownHandle {
        self.teardown.clone()
    }

    /// Begin the dialogue: emit `session_start` and run until the first
    /// input step (or the end of the script).
    pub async fn start(&mut self) -> Result<(), EngineError> {
        self.ensure_open()?;
        if self.phase != EnginePhase::Idle {
            return Err(EngineError::AlreadyStarted);
        }

        self.started_at = Instant::now();
        info!(
            session_id = %self.state.session_id,
            script = %self.script.name(),
            source = %self.config.source,
            "Dialogue started"
        );
        self.track(EventKind::SessionStart {
            source: self.config.source.clone(),
            script: self.script.name().to_string(),
        });

        self.process_current_step().await
    }

    /// Run the current step, chaining through message steps until the
    /// engine has to wait for the user or the dialogue ends.
    pub async fn process_current_step(&mut self) -> Result<(), EngineError> {
        let script = Arc::clone(&self.script);
        loop {
            self.ensure_open()?;
            let index = self.state.current_step_index;
            let step = script.step(index).ok_or_else(|| {
                self.fatal(ScriptError::UnknownStep {
                    from: format!("#{index}"),
                    target: format!("#{index}"),
                })
            })?;

            self.step_entered_at = Instant::now();
            let prompt = step.prompt.render(&self.state.answers);
            self.say(&step.id, prompt);

            match &step.kind {
                StepKind::Message => {
                    self.phase = EnginePhase::Presenting;
                    self.renderer.render(RenderEvent::Typing {
                        step_id: step.id.clone(),
                    });
                    let waited = self.typing_delay().await;

                    if step.is_terminal {
                        // The closing message is already on screen: a teardown
                        // only cuts the wait short, the lead still goes out.
                        self.submit_lead().await;
                        if waited.is_err() {
                            self.phase = EnginePhase::Closed;
                        }
                        return waited;
                    }
                    waited?;
                    self.advance(step, "")?;
                }
                StepKind::TextInput { placeholder, .. } => {
                    self.phase = EnginePhase::AwaitingText;
                    self.renderer.render(RenderEvent::AwaitText {
                        step_id: step.id.clone(),
                        placeholder: placeholder.clone(),
                    });
                    return Ok(());
                }
                StepKind::ChoiceInput { choices, .. } => {
                    self.offered = choices.resolve(&self.state.answers);
                    self.phase = EnginePhase::AwaitingChoice;
                    self.renderer.render(RenderEvent::AwaitChoice {
                        step_id: step.id.clone(),
                        choices: self.offered.clone(),
                    });
                    return Ok(());
                }
            }
        }
    }

    /// Free-text callback from the render surface.
    pub async fn on_text_submit(&mut self, raw: &str) -> Result<SubmitOutcome, EngineError> {
        self.ensure_open()?;
        let script = Arc::clone(&self.script);
        let step = self.current_step(&script)?;

        let (target_field, validator, error_message, placeholder) = match (&step.kind, self.phase) {
            (
                StepKind::TextInput {
                    target_field,
                    validator,
                    error_message,
                    placeholder,
                },
                EnginePhase::AwaitingText,
            ) => (target_field, validator, error_message, placeholder),
            _ => {
                return Err(EngineError::NotAwaitingText {
                    step: step.id.clone(),
                });
            }
        };

        if !validator.accepts(raw) {
            debug!(
                session_id = %self.state.session_id,
                step = %step.id,
                "Input rejected by validator"
            );
            self.state.push_transcript(Speaker::Bot, error_message.as_str());
            self.renderer.render(RenderEvent::ValidationError {
                step_id: step.id.clone(),
                message: error_message.clone(),
            });
            self.renderer.render(RenderEvent::AwaitText {
                step_id: step.id.clone(),
                placeholder: placeholder.clone(),
            });
            return Ok(SubmitOutcome::Rejected {
                message: error_message.clone(),
            });
        }

        let value = raw.trim().to_string();
        self.capture(step, target_field, value.clone(), value.clone())?;
        self.advance(step, &value)?;
        self.process_current_step().await?;
        Ok(SubmitOutcome::Accepted { phase: self.phase })
    }

    /// Choice callback from the render surface. `value` must be one of the
    /// offered choices; the stored label is the offered one.
    pub async fn on_choice_select(
        &mut self,
        value: &str,
        label: &str,
    ) -> Result<EnginePhase, EngineError> {
        self.ensure_open()?;
        let script = Arc::clone(&self.script);
        let step = self.current_step(&script)?;

        let target_field = match (&step.kind, self.phase) {
            (StepKind::ChoiceInput { target_field, .. }, EnginePhase::AwaitingChoice) => {
                target_field
            }
            _ => {
                return Err(EngineError::NotAwaitingChoice {
                    step: step.id.clone(),
                });
            }
        };

        let choice = self
            .offered
            .iter()
            .find(|c| c.value == value)
            .cloned()
            .ok_or_else(|| EngineError::UnknownChoice {
                step: step.id.clone(),
                value: value.to_string(),
            })?;
        if choice.label != label {
            debug!(
                step = %step.id,
                offered = %choice.label,
                received = %label,
                "Choice label differs from offered label"
            );
        }

        self.capture(step, target_field, choice.value.clone(), choice.label)?;
        self.offered.clear();
        self.advance(step, &choice.value)?;
        self.process_current_step().await?;
        Ok(self.phase)
    }

    /// Render-ready payload for the current step, if one is on screen.
    pub fn view(&self) -> Option<StepView> {
        if matches!(self.phase, EnginePhase::Idle | EnginePhase::Closed) {
            return None;
        }
        let step = self.script.step(self.state.current_step_index)?;
        let input = match (&step.kind, self.phase) {
            (StepKind::TextInput { placeholder, .. }, EnginePhase::AwaitingText) => {
                InputAffordance::Text {
                    placeholder: placeholder.clone(),
                }
            }
            (StepKind::ChoiceInput { .. }, EnginePhase::AwaitingChoice) => InputAffordance::Choice {
                choices: self.offered.clone(),
            },
            _ => InputAffordance::None,
        };
        Some(StepView {
            step_id: step.id.clone(),
            prompt: step.prompt.render(&self.state.answers),
            input,
        })
    }

    /// Tear the session down: cancel pending delays, emit `abandoned` with
    /// the last step reached, and flush tracking. Idempotent.
    pub async fn abandon(&mut self) {
        if self.abandoned {
            return;
        }
        self.abandoned = true;
        self.teardown.cancel();
        self.phase = EnginePhase::Closed;

        let last_step = self.current_step_id().unwrap_or_default().to_string();
        info!(
            session_id = %self.state.session_id,
            last_step = %last_step,
            completed = self.state.completed,
            "Dialogue torn down"
        );
        self.track(EventKind::Abandoned {
            last_step,
            completed: self.state.completed,
            session_elapsed_ms: self.session_elapsed_ms(),
        });
        self.tracker.flush().await;
    }

    // ── internals ───────────────────────────────────────────────────────

    fn ensure_open(&mut self) -> Result<(), EngineError> {
        if self.phase == EnginePhase::Closed {
            return Err(EngineError::Closed);
        }
        if self.teardown.is_cancelled() {
            self.phase = EnginePhase::Closed;
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    fn current_step<'s>(&self, script: &'s StepScript) -> Result<&'s Step, EngineError> {
        if self.phase == EnginePhase::Idle {
            return Err(EngineError::NotStarted);
        }
        script
            .step(self.state.current_step_index)
            .ok_or(EngineError::Closed)
    }

    /// Log a script defect and stop the session.
    fn fatal(&mut self, err: ScriptError) -> EngineError {
        error!(
            session_id = %self.state.session_id,
            script = %self.script.name(),
            error = %err,
            "Dialogue script defect"
        );
        self.phase = EnginePhase::Closed;
        EngineError::Script(err)
    }

    fn say(&mut self, step_id: &str, content: String) {
        self.state.push_transcript(Speaker::Bot, content.as_str());
        self.renderer.render(RenderEvent::BotMessage {
            step_id: step_id.to_string(),
            content,
        });
    }

    /// Store an accepted answer, echo it as the user's message, and emit
    /// `step_completed`.
    fn capture(
        &mut self,
        step: &Step,
        field: &str,
        value: String,
        shown: String,
    ) -> Result<(), EngineError> {
        if let Err(e) = self.state.answers.record(&step.id, field, value.clone()) {
            return Err(self.fatal(e));
        }
        self.state.push_transcript(Speaker::User, shown.as_str());
        self.renderer.render(RenderEvent::UserMessage {
            step_id: step.id.clone(),
            content: shown,
        });

        self.answered += 1;
        let step_elapsed_ms = self.step_entered_at.elapsed().as_millis() as u64;
        debug!(
            session_id = %self.state.session_id,
            step = %step.id,
            field = %field,
            "Answer captured"
        );
        self.track(EventKind::StepCompleted {
            step_id: step.id.clone(),
            ordinal: self.answered,
            value,
            step_elapsed_ms,
            session_elapsed_ms: self.session_elapsed_ms(),
        });
        Ok(())
    }

    /// Resolve the step after `step` and move the pointer there.
    fn advance(&mut self, step: &Step, captured: &str) -> Result<(), EngineError> {
        let from = self.state.current_step_index;
        let next = match self.script.resolve_next(from, captured, &self.state.answers) {
            Ok(next) => next,
            Err(e) => return Err(self.fatal(e)),
        };
        if !self.state.advance_to(next) {
            return Err(self.fatal(ScriptError::BackwardTransition {
                from: step.id.clone(),
                target: format!("#{next}"),
            }));
        }
        Ok(())
    }

    /// Wait out the typing delay unless the session is torn down first.
    async fn typing_delay(&mut self) -> Result<(), EngineError> {
        let delay = self.config.typing_delay;
        if delay.is_zero() {
            return self.ensure_open();
        }

        let mut rx = self.teardown_rx.clone();
        let cancelled = async move {
            loop {
                let closed = *rx.borrow_and_update();
                if closed || rx.changed().await.is_err() {
                    break;
                }
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => self.ensure_open(),
            _ = cancelled => {
                debug!(session_id = %self.state.session_id, "Typing delay cancelled");
                self.phase = EnginePhase::Closed;
                Err(EngineError::Closed)
            }
        }
    }

    /// Package the answers and submit them once. Failures are logged only:
    /// the closing message is already on screen.
    async fn submit_lead(&mut self) {
        let protocol = generate_protocol();
        self.state.protocol = Some(protocol.clone());
        self.state.completed = true;
        self.phase = EnginePhase::Completed;
        self.renderer.render(RenderEvent::Completed {
            protocol: protocol.clone(),
        });

        let lead = LeadSubmission::from_session(&self.state, &self.config.source, &protocol);
        let success = match self.leads.submit(&lead).await {
            Ok(receipt) if receipt.success => {
                info!(
                    session_id = %self.state.session_id,
                    protocol = %protocol,
                    lead_id = ?receipt.lead_id,
                    "Lead submitted"
                );
                true
            }
            Ok(receipt) => {
                warn!(
                    session_id = %self.state.session_id,
                    protocol = %protocol,
                    data = ?receipt.data,
                    answers = ?self.state.answers,
                    "Lead endpoint reported failure, lead not saved"
                );
                false
            }
            Err(e) => {
                warn!(
                    session_id = %self.state.session_id,
                    protocol = %protocol,
                    error = %e,
                    answers = ?self.state.answers,
                    "Lead submission failed, lead not saved"
                );
                false
            }
        };
        self.submission_ok = Some(success);

        self.track(EventKind::FormSubmitted {
            protocol,
            success,
            session_elapsed_ms: self.session_elapsed_ms(),
        });
        self.tracker.flush().await;
    }

    fn track(&self, kind: EventKind) {
        self.tracker
            .record(TrackingEvent::new(self.state.session_id, kind));
    }

    fn session_elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}
