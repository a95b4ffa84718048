//! Step script — the validated, ordered table of dialogue steps.

use std::collections::HashMap;

use serde::Serialize;

use super::state::Answers;
use super::step::{Choices, NextStep, Step, StepKind, StepSummary};
use crate::error::ScriptError;

/// An ordered list of steps, indexed by id.
///
/// Steps are laid out so that every transition moves forward: branches
/// occupy consecutive runs of the table and converge on a later step.
#[derive(Debug, Clone)]
pub struct StepScript {
    name: String,
    steps: Vec<Step>,
    index: HashMap<String, usize>,
}

impl StepScript {
    /// Build a script, rejecting authoring defects that can be detected
    /// without running it.
    pub fn new(name: &str, steps: Vec<Step>) -> Result<Self, ScriptError> {
        if steps.is_empty() {
            return Err(ScriptError::Empty);
        }

        let mut index = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if index.insert(step.id.clone(), i).is_some() {
                return Err(ScriptError::DuplicateStep(step.id.clone()));
            }
        }

        for (i, step) in steps.iter().enumerate() {
            match &step.kind {
                StepKind::Message => {}
                StepKind::TextInput { target_field, .. } => {
                    if target_field.trim().is_empty() {
                        return Err(ScriptError::MissingTargetField(step.id.clone()));
                    }
                }
                StepKind::ChoiceInput {
                    target_field,
                    choices,
                } => {
                    if target_field.trim().is_empty() {
                        return Err(ScriptError::MissingTargetField(step.id.clone()));
                    }
                    if let Choices::Static(list) = choices {
                        if list.is_empty() {
                            return Err(ScriptError::EmptyChoices(step.id.clone()));
                        }
                    }
                }
            }

            match (&step.next, step.is_terminal) {
                (Some(_), true) => return Err(ScriptError::TerminalWithNext(step.id.clone())),
                (None, false) => return Err(ScriptError::MissingNext(step.id.clone())),
                (Some(NextStep::Fixed(target)), false) => {
                    check_target(&index, i, &step.id, target)?;
                }
                _ => {}
            }
        }

        if !steps.iter().any(|s| s.is_terminal) {
            return Err(ScriptError::NoTerminal);
        }

        Ok(Self {
            name: name.to_string(),
            steps,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn step_by_id(&self, id: &str) -> Option<&Step> {
        self.index_of(id).and_then(|i| self.steps.get(i))
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Resolve the step that follows `from` given the value just captured
    /// (empty for message steps) and the answers so far.
    ///
    /// Returns the index of the next step. Deterministic for a given
    /// `(captured, answers)` pair.
    pub fn resolve_next(
        &self,
        from: usize,
        captured: &str,
        answers: &Answers,
    ) -> Result<usize, ScriptError> {
        let step = self.steps.get(from).ok_or_else(|| ScriptError::UnknownStep {
            from: format!("#{from}"),
            target: format!("#{from}"),
        })?;
        let target = match &step.next {
            Some(NextStep::Fixed(id)) => id.clone(),
            Some(NextStep::Branch(resolver)) => resolver(captured, answers),
            None => return Err(ScriptError::MissingNext(step.id.clone())),
        };
        check_target(&self.index, from, &step.id, &target)
    }

    pub fn summary(&self) -> ScriptSummary {
        ScriptSummary {
            name: self.name.clone(),
            steps: self.steps.iter().map(Step::summary).collect(),
        }
    }
}

fn check_target(
    index: &HashMap<String, usize>,
    from: usize,
    from_id: &str,
    target: &str,
) -> Result<usize, ScriptError> {
    let to = index
        .get(target)
        .copied()
        .ok_or_else(|| ScriptError::UnknownStep {
            from: from_id.to_string(),
            target: target.to_string(),
        })?;
    if to <= from {
        return Err(ScriptError::BackwardTransition {
            from: from_id.to_string(),
            target: target.to_string(),
        });
    }
    Ok(to)
}

/// Serializable view of a whole script.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptSummary {
    pub name: String,
    pub steps: Vec<StepSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::step::Choice;
    use crate::dialogue::validate::Validator;

    fn ask(id: &str, field: &str) -> Step {
        Step::text(id, "?", field, Validator::NonEmpty, "obrigatório")
    }

    #[test]
    fn accepts_linear_script() {
        let script = StepScript::new(
            "linear",
            vec![
                Step::message("hello", "Oi").then("ask"),
                ask("ask", "name").then("bye"),
                Step::message("bye", "Tchau").terminal(),
            ],
        )
        .unwrap();
        assert_eq!(script.len(), 3);
        assert_eq!(script.index_of("ask"), Some(1));
        assert_eq!(script.step_by_id("bye").unwrap().id, "bye");
        assert_eq!(script.resolve_next(0, "", &Answers::new()).unwrap(), 1);
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert_eq!(StepScript::new("x", vec![]).unwrap_err(), ScriptError::Empty);

        let err = StepScript::new(
            "x",
            vec![
                Step::message("a", "1").then("a2"),
                Step::message("a", "2").terminal(),
            ],
        )
        .unwrap_err();
        assert_eq!(err, ScriptError::DuplicateStep("a".to_string()));
    }

    #[test]
    fn rejects_unknown_and_backward_targets() {
        let err = StepScript::new(
            "x",
            vec![Step::message("a", "1").then("nowhere"), Step::message("b", "2").terminal()],
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::UnknownStep { ref target, .. } if target == "nowhere"));

        let err = StepScript::new(
            "x",
            vec![
                Step::message("a", "1").then("b"),
                Step::message("b", "2").then("a"),
                Step::message("c", "3").terminal(),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::BackwardTransition { .. }));
    }

    #[test]
    fn rejects_malformed_steps() {
        let err = StepScript::new("x", vec![Step::message("a", "1")]).unwrap_err();
        assert_eq!(err, ScriptError::MissingNext("a".to_string()));

        let err = StepScript::new(
            "x",
            vec![Step::message("a", "1").then("b").terminal(), Step::message("b", "2").terminal()],
        )
        .unwrap_err();
        assert_eq!(err, ScriptError::TerminalWithNext("a".to_string()));

        let err = StepScript::new(
            "x",
            vec![ask("a", " ").then("b"), Step::message("b", "2").terminal()],
        )
        .unwrap_err();
        assert_eq!(err, ScriptError::MissingTargetField("a".to_string()));

        let err = StepScript::new(
            "x",
            vec![
                Step::choice("a", "?", "f", Choices::Static(vec![])).then("b"),
                Step::message("b", "2").terminal(),
            ],
        )
        .unwrap_err();
        assert_eq!(err, ScriptError::EmptyChoices("a".to_string()));
    }

    #[test]
    fn branch_targets_checked_at_resolution() {
        let script = StepScript::new(
            "x",
            vec![
                Step::choice(
                    "pick",
                    "?",
                    "kind",
                    Choices::Static(vec![Choice::new("A", "a"), Choice::new("B", "b")]),
                )
                .branch(|value, _| match value {
                    "a" => "path_a".to_string(),
                    "b" => "path_b".to_string(),
                    _ => "missing".to_string(),
                }),
                Step::message("path_a", "A").then("end"),
                Step::message("path_b", "B").then("end"),
                Step::message("end", "fim").terminal(),
            ],
        )
        .unwrap();

        let answers = Answers::new();
        assert_eq!(script.resolve_next(0, "a", &answers).unwrap(), 1);
        assert_eq!(script.resolve_next(0, "b", &answers).unwrap(), 2);
        // same inputs, same answer
        assert_eq!(script.resolve_next(0, "b", &answers).unwrap(), 2);

        let err = script.resolve_next(0, "zzz", &answers).unwrap_err();
        assert_eq!(
            err,
            ScriptError::UnknownStep {
                from: "pick".to_string(),
                target: "missing".to_string(),
            }
        );
        assert_eq!(
            script.resolve_next(3, "", &answers).unwrap_err(),
            ScriptError::MissingNext("end".to_string())
        );
    }

    #[test]
    fn summary_lists_every_step() {
        let script = StepScript::new(
            "tiny",
            vec![Step::message("a", "1").then("b"), Step::message("b", "2").terminal()],
        )
        .unwrap();
        let json = serde_json::to_value(script.summary()).unwrap();
        assert_eq!(json["name"], "tiny");
        assert_eq!(json["steps"].as_array().unwrap().len(), 2);
        assert_eq!(json["steps"][1]["next"]["type"], "end");
    }
}
