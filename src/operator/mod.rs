//! Operator decisions.
//!
//! Every point where the workflow needs a human goes through [`Operator`],
//! with an enumerated set of answers per decision. [`TerminalOperator`]
//! asks on stdin; [`ScriptedOperator`] replays canned answers.

mod scripted;
mod terminal;

pub use scripted::{Answer, ScriptedOperator};
pub use terminal::TerminalOperator;

use crate::error::Result;
use crate::version::TargetRef;
use crate::workflow::WorkflowStep;

/// Severity of a message shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Progress
    Info,
    /// A step finished
    Success,
    /// Something was skipped or looks off
    Warning,
    /// A step failed
    Error,
}

/// Answer to a merge conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Operator resolved the conflicts in the working tree; verify and commit
    ResolvedManually,
    /// Abort the merge and continue with upstream code only
    SkipCustomizations,
    /// Abort the merge and the whole upgrade
    AbortWorkflow,
}

/// A recognized build failure the operator can fix by hand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualFix {
    /// Failing command and its last stderr line
    pub failure: String,
    /// What to do before retrying
    pub remediation: String,
}

/// Answer to a [`ManualFix`] request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualFixResponse {
    /// Fix applied, build again
    Retry,
    /// Give up
    Abort,
}

/// Answer to the target selection prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetChoice {
    /// Go with what was detected
    UseDetected,
    /// Use this tag, branch or `main` instead
    Target(TargetRef),
    /// Stop the upgrade
    Abort,
}

/// A human making decisions for the workflow
pub trait Operator {
    /// Yes/no before a step that changes the system
    fn confirm(&self, step: WorkflowStep, question: &str) -> Result<bool>;

    /// How to proceed after a conflicted merge of `branch`
    fn resolve_conflict(&self, branch: &str, paths: &[String]) -> Result<ConflictResolution>;

    /// Acknowledge a recognized build failure
    fn manual_fix(&self, fix: &ManualFix) -> Result<ManualFixResponse>;

    /// Accept or override the detected upgrade target
    fn choose_target(&self, detected: Option<&TargetRef>) -> Result<TargetChoice>;

    /// Free-form value; `None` when the operator declines to give one
    fn provide_text(&self, prompt: &str) -> Result<Option<String>>;

    /// Show a message
    fn notify(&self, level: NoticeLevel, message: &str);
}
