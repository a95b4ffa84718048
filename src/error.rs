//! Error types for Lead Intake.

use std::time::Duration;

/// Top-level error type for the intake service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Step script authoring defects.
///
/// These are programming errors in the script definition. They are raised at
/// construction time where possible, and at runtime for data-dependent
/// branches.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("Script has no steps")]
    Empty,

    #[error("Duplicate step id: {0}")]
    DuplicateStep(String),

    #[error("Step {from} resolves to unknown step {target}")]
    UnknownStep { from: String, target: String },

    #[error("Step {from} resolves backwards to {target}")]
    BackwardTransition { from: String, target: String },

    #[error("Input step {0} has no target field")]
    MissingTargetField(String),

    #[error("Non-terminal step {0} has no next step")]
    MissingNext(String),

    #[error("Terminal step {0} must not declare a next step")]
    TerminalWithNext(String),

    #[error("Choice step {0} offers no choices")]
    EmptyChoices(String),

    #[error("Script has no terminal step")]
    NoTerminal,

    #[error("Field {field} captured twice (step {step})")]
    FieldAlreadyCaptured { step: String, field: String },
}

/// Misuse of the dialogue engine API.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Dialogue already started")]
    AlreadyStarted,

    #[error("Dialogue has not been started")]
    NotStarted,

    #[error("Step {step} is not awaiting text input")]
    NotAwaitingText { step: String },

    #[error("Step {step} is not awaiting a choice")]
    NotAwaitingChoice { step: String },

    #[error("Choice {value} is not offered by step {step}")]
    UnknownChoice { step: String, value: String },

    #[error("Dialogue session is closed")]
    Closed,

    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Lead submission failures.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Lead endpoint request failed: {0}")]
    Http(String),

    #[error("Lead endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Lead endpoint timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response from lead endpoint: {0}")]
    InvalidResponse(String),
}

/// Tracking delivery failures. Never propagated to the dialogue.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Tracking endpoint request failed: {0}")]
    Http(String),

    #[error("Tracking endpoint returned status {0}")]
    Status(u16),
}

/// Transport channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the intake service.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn check(fail: bool) -> std::result::Result<(), ScriptError> {
        if fail { Err(ScriptError::NoTerminal) } else { Ok(()) }
    }

    fn load_script(fail: bool) -> Result<&'static str> {
        check(fail)?;
        Ok("lead_intake")
    }

    #[test]
    fn domain_errors_convert_with_question_mark() {
        assert_eq!(load_script(false).unwrap(), "lead_intake");
        let err = load_script(true).unwrap_err();
        assert!(matches!(err, Error::Script(ScriptError::NoTerminal)));
        assert_eq!(err.to_string(), "Script error: Script has no terminal step");
    }

    #[test]
    fn io_and_config_errors_are_wrapped() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken").into();
        assert!(matches!(err, Error::Io(_)));

        let err: Error = ConfigError::InvalidValue {
            key: "LEAD_INTAKE_PORT".to_string(),
            message: "\"x\": invalid digit".to_string(),
        }
        .into();
        assert!(err.to_string().contains("LEAD_INTAKE_PORT"));
    }
}
