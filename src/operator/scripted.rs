//! Operator that replays a fixed list of answers.

use super::{
    ConflictResolution, ManualFix, ManualFixResponse, NoticeLevel, Operator, TargetChoice,
};
use crate::error::{Result, WorkflowError};
use crate::workflow::WorkflowStep;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;

/// One canned answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// For [`Operator::confirm`]
    Confirm(bool),
    /// For [`Operator::resolve_conflict`]
    Conflict(ConflictResolution),
    /// For [`Operator::manual_fix`]
    ManualFix(ManualFixResponse),
    /// For [`Operator::choose_target`]
    Target(TargetChoice),
    /// For [`Operator::provide_text`]
    Text(Option<String>),
}

/// Answers questions from a queue, in order.
///
/// A question consumes the front answer only when it is of the matching
/// kind. Otherwise confirmations fall back to the configured default (if
/// any), target selection accepts the detected target and text prompts get
/// no answer; conflict and manual-fix questions fail with
/// `OperatorUnavailable`. Steps passed to [`Self::decline`] are always
/// answered no.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: Mutex<VecDeque<Answer>>,
    default_confirm: Option<bool>,
    declined: BTreeSet<WorkflowStep>,
    questions: Mutex<Vec<String>>,
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl ScriptedOperator {
    /// Replay `answers` in order
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Operator that says yes to everything it is not scripted for
    pub fn always_confirm() -> Self {
        Self::default().with_default_confirm(true)
    }

    /// Answer unscripted confirmations with `value`
    pub fn with_default_confirm(mut self, value: bool) -> Self {
        self.default_confirm = Some(value);
        self
    }

    /// Answer every confirmation for `step` with no
    pub fn decline(mut self, step: WorkflowStep) -> Self {
        self.declined.insert(step);
        self
    }

    /// Every question asked so far
    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Every message shown so far
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Answers not consumed
    pub fn remaining(&self) -> usize {
        self.answers.lock().map(|a| a.len()).unwrap_or_default()
    }

    fn ask(&self, question: String, matches: fn(&Answer) -> bool) -> Option<Answer> {
        if let Ok(mut asked) = self.questions.lock() {
            asked.push(question);
        }
        let mut answers = self.answers.lock().ok()?;
        if answers.front().is_some_and(matches) {
            answers.pop_front()
        } else {
            None
        }
    }

    fn front(&self) -> Option<Answer> {
        self.answers.lock().ok().and_then(|a| a.front().cloned())
    }
}

fn unexpected(expected: &str, front: Option<Answer>) -> crate::error::UpgradeError {
    WorkflowError::OperatorUnavailable {
        reason: match front {
            Some(answer) => format!("expected a {} answer, script has {:?} next", expected, answer),
            None => format!("script exhausted while waiting for a {} answer", expected),
        },
    }
    .into()
}

impl Operator for ScriptedOperator {
    fn confirm(&self, step: WorkflowStep, question: &str) -> Result<bool> {
        let question = format!("[{}] {}", step, question);
        if self.declined.contains(&step) {
            self.ask(question, |_| false);
            return Ok(false);
        }
        match self.ask(question, |a| matches!(a, Answer::Confirm(_))) {
            Some(Answer::Confirm(value)) => Ok(value),
            _ => self
                .default_confirm
                .ok_or_else(|| unexpected("confirm", self.front())),
        }
    }

    fn resolve_conflict(&self, branch: &str, paths: &[String]) -> Result<ConflictResolution> {
        let question = format!("conflict merging {} ({} paths)", branch, paths.len());
        match self.ask(question, |a| matches!(a, Answer::Conflict(_))) {
            Some(Answer::Conflict(choice)) => Ok(choice),
            _ => Err(unexpected("conflict", self.front())),
        }
    }

    fn manual_fix(&self, fix: &ManualFix) -> Result<ManualFixResponse> {
        let question = format!("manual fix: {}", fix.failure);
        match self.ask(question, |a| matches!(a, Answer::ManualFix(_))) {
            Some(Answer::ManualFix(response)) => Ok(response),
            _ => Err(unexpected("manual fix", self.front())),
        }
    }

    fn choose_target(&self, detected: Option<&crate::version::TargetRef>) -> Result<TargetChoice> {
        let question = match detected {
            Some(target) => format!("target (detected {})", target),
            None => "target (nothing detected)".to_string(),
        };
        match self.ask(question, |a| matches!(a, Answer::Target(_))) {
            Some(Answer::Target(choice)) => Ok(choice),
            _ if detected.is_some() => Ok(TargetChoice::UseDetected),
            _ => Err(unexpected("target", self.front())),
        }
    }

    fn provide_text(&self, prompt: &str) -> Result<Option<String>> {
        match self.ask(prompt.to_string(), |a| matches!(a, Answer::Text(_))) {
            Some(Answer::Text(value)) => Ok(value),
            _ => Ok(None),
        }
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push((level, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_in_order_then_falls_back() {
        let op = ScriptedOperator::new([Answer::Confirm(false)]).with_default_confirm(true);
        assert!(!op.confirm(WorkflowStep::Built, "build?").unwrap());
        assert!(op.confirm(WorkflowStep::Built, "build?").unwrap());
        assert_eq!(op.questions().len(), 2);
    }

    #[test]
    fn mismatched_answer_is_left_in_place() {
        let op = ScriptedOperator::new([Answer::Confirm(true)]);
        assert!(op.resolve_conflict("custom", &[]).is_err());
        assert_eq!(op.remaining(), 1);
        assert!(op.confirm(WorkflowStep::Built, "build?").unwrap());
    }

    #[test]
    fn declined_step_overrides_default() {
        let op = ScriptedOperator::always_confirm().decline(WorkflowStep::CacheCleared);
        assert!(!op.confirm(WorkflowStep::CacheCleared, "clear?").unwrap());
        assert!(op.confirm(WorkflowStep::Built, "build?").unwrap());
    }

    #[test]
    fn exhausted_script_without_default_is_an_error() {
        let op = ScriptedOperator::new([]);
        assert!(op.confirm(WorkflowStep::Synced, "checkout?").is_err());
        assert_eq!(op.provide_text("remote?").unwrap(), None);
    }
}
