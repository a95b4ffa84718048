//! CLI channel — stdin/stdout REPL for trying a dialogue script locally.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::EngineConfig;
use crate::dialogue::{Choice, DialogueEngine, EnginePhase, RenderEvent, Renderer, StepScript};
use crate::error::{ChannelError, EngineError};
use crate::lead::LeadSubmitter;
use crate::tracking::TrackingSink;

/// Prints render events to the terminal.
struct TerminalRenderer;

impl Renderer for TerminalRenderer {
    fn render(&self, event: RenderEvent) {
        match event {
            RenderEvent::BotMessage { content, .. } => println!("\n🤖 {}", content),
            RenderEvent::UserMessage { .. } => {}
            RenderEvent::ValidationError { message, .. } => eprintln!("⚠️  {}", message),
            RenderEvent::Typing { .. } => eprintln!("   ..."),
            RenderEvent::AwaitText { placeholder, .. } => match placeholder {
                Some(hint) => eprint!("[{}] > ", hint),
                None => eprint!("> "),
            },
            RenderEvent::AwaitChoice { choices, .. } => {
                for (i, choice) in choices.iter().enumerate() {
                    eprintln!("  {}. {}", i + 1, choice.label);
                }
                eprint!("> ");
            }
            RenderEvent::Completed { protocol } => eprintln!("\n✅ Protocolo: {}", protocol),
        }
    }
}

/// Map a typed line to one of the offered choices: by number, value or label.
fn pick_choice<'a>(choices: &'a [Choice], line: &str) -> Option<&'a Choice> {
    if let Ok(n) = line.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| choices.get(i));
    }
    choices
        .iter()
        .find(|c| c.value.eq_ignore_ascii_case(line) || c.label.eq_ignore_ascii_case(line))
}

/// Runs a single dialogue against stdin until it completes or stdin closes.
pub struct CliChannel {
    script: Arc<StepScript>,
    config: EngineConfig,
    leads: Arc<dyn LeadSubmitter>,
    tracker: Arc<dyn TrackingSink>,
}

impl CliChannel {
    pub fn new(
        script: Arc<StepScript>,
        config: EngineConfig,
        leads: Arc<dyn LeadSubmitter>,
        tracker: Arc<dyn TrackingSink>,
    ) -> Self {
        Self {
            script,
            config,
            leads,
            tracker,
        }
    }

    pub async fn run(&self) -> Result<(), ChannelError> {
        let mut engine = DialogueEngine::new(
            Arc::clone(&self.script),
            self.config.clone(),
            Arc::new(TerminalRenderer),
            Arc::clone(&self.leads),
            Arc::clone(&self.tracker),
        );
        engine
            .start()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "cli".to_string(),
                reason: e.to_string(),
            })?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while matches!(
            engine.phase(),
            EnginePhase::AwaitingText | EnginePhase::AwaitingChoice
        ) {
            let Some(line) = lines.next_line().await? else {
                break; // EOF
            };
            let line = line.trim();

            let result = if engine.phase() == EnginePhase::AwaitingText {
                engine.on_text_submit(line).await.map(|_| ())
            } else {
                let offered = match engine.view().map(|v| v.input) {
                    Some(crate::dialogue::InputAffordance::Choice { choices }) => choices,
                    _ => Vec::new(),
                };
                match pick_choice(&offered, line) {
                    Some(choice) => engine
                        .on_choice_select(&choice.value, &choice.label)
                        .await
                        .map(|_| ()),
                    None => {
                        eprint!("Escolha uma das opções (1-{}) > ", offered.len());
                        continue;
                    }
                }
            };

            match result {
                Ok(()) => {}
                Err(EngineError::Closed) => break,
                Err(e) => {
                    tracing::error!("Dialogue stopped: {}", e);
                    break;
                }
            }
        }

        engine.abandon().await;
        Ok(())
    }
}
