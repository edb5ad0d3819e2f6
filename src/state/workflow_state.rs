//! In-memory state of one upgrade run.

use crate::error::ErrorKind;
use crate::git::RemoteClassification;
use crate::version::TargetRef;
use crate::workflow::WorkflowStep;
use std::collections::BTreeMap;

/// A step the workflow entered
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Step entered
    pub step: WorkflowStep,
    /// When it was entered
    pub entered_at: chrono::DateTime<chrono::Utc>,
}

/// What happened to the customization branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomizationStatus {
    /// No customization branch configured
    NotConfigured,
    /// Merged without conflicts
    Merged,
    /// Merged after the operator resolved conflicts
    MergedManually,
    /// Merge abandoned; upgrade branch holds upstream code only
    Skipped,
}

/// State owned by the engine for the duration of a run
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// Step currently in progress
    pub current_step: WorkflowStep,
    /// Operator answers for confirmation-gated steps
    pub confirmations: BTreeMap<WorkflowStep, bool>,
    /// Kind of the error that ended the run, if any
    pub last_error: Option<ErrorKind>,
    /// Every step entered, in order
    pub trail: Vec<StepRecord>,
    /// Optional steps the operator declined
    pub skipped: Vec<WorkflowStep>,
    /// Fork and upstream remote names
    pub remotes: RemoteClassification,
    /// Version the instance ran before the upgrade
    pub from_version: Option<String>,
    /// Chosen upgrade target
    pub target: Option<TargetRef>,
    /// Branch (or detached commit) checked out when the run started
    pub original_branch: Option<String>,
    /// Branch created for this upgrade
    pub upgrade_branch: Option<String>,
    /// Upstream main-line commits missing from the pre-upgrade branch
    pub commits_behind: Option<usize>,
    /// Commit the upgrade branch was created at
    pub upstream_commit: Option<String>,
    /// Outcome of merging customizations
    pub customizations: CustomizationStatus,
    /// Dump written during the backup step
    pub backup_file: Option<std::path::PathBuf>,
    /// Number of build attempts so far
    pub build_attempts: u32,
    /// Migrations applied during the run
    pub migrations_applied: usize,
    /// Services restarted, in order
    pub restarted_services: Vec<String>,
    /// When the run started
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    /// Fresh state at `Start`
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        Self {
            current_step: WorkflowStep::Start,
            confirmations: BTreeMap::new(),
            last_error: None,
            trail: vec![StepRecord {
                step: WorkflowStep::Start,
                entered_at: now,
            }],
            skipped: Vec::new(),
            remotes: RemoteClassification::default(),
            from_version: None,
            target: None,
            original_branch: None,
            upgrade_branch: None,
            commits_behind: None,
            upstream_commit: None,
            customizations: CustomizationStatus::NotConfigured,
            backup_file: None,
            build_attempts: 0,
            migrations_applied: 0,
            restarted_services: Vec::new(),
            started_at: now,
        }
    }

    /// Record the operator's answer for `step`
    pub fn record_confirmation(&mut self, step: WorkflowStep, confirmed: bool) {
        self.confirmations.insert(step, confirmed);
    }

    /// Whether `step` has a recorded yes
    pub fn is_confirmed(&self, step: WorkflowStep) -> bool {
        self.confirmations.get(&step).copied().unwrap_or(false)
    }

    /// Make `step` the current step
    pub fn enter(&mut self, step: WorkflowStep) {
        self.current_step = step;
        self.trail.push(StepRecord {
            step,
            entered_at: chrono::Utc::now(),
        });
    }

    /// Whether `step` was entered at some point
    pub fn has_entered(&self, step: WorkflowStep) -> bool {
        self.trail.iter().any(|r| r.step == step)
    }

    /// Steps entered, in order
    pub fn steps(&self) -> Vec<WorkflowStep> {
        self.trail.iter().map(|r| r.step).collect()
    }

    /// Record that an optional step was declined
    pub fn mark_skipped(&mut self, step: WorkflowStep) {
        self.skipped.push(step);
    }

    /// Record the error that ended the run
    pub fn record_error(&mut self, kind: ErrorKind) {
        self.last_error = Some(kind);
    }

    /// Time since the run started
    pub fn elapsed(&self) -> chrono::Duration {
        chrono::Utc::now() - self.started_at
    }

    /// One-line summary for the operator
    pub fn summary(&self) -> String {
        let target = self
            .target
            .as_ref()
            .map_or_else(|| "undecided".to_string(), |t| t.to_string());
        format!(
            "Step '{}', target {}, {} step(s) skipped, {}s elapsed",
            self.current_step,
            target,
            self.skipped.len(),
            self.elapsed().num_seconds()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_start_with_nothing_confirmed() {
        let state = WorkflowState::new();
        assert_eq!(state.current_step, WorkflowStep::Start);
        assert!(!state.is_confirmed(WorkflowStep::Built));
        assert_eq!(state.steps(), vec![WorkflowStep::Start]);
    }

    #[test]
    fn declined_confirmation_is_not_confirmed() {
        let mut state = WorkflowState::new();
        state.record_confirmation(WorkflowStep::CacheCleared, false);
        state.record_confirmation(WorkflowStep::Built, true);
        assert!(!state.is_confirmed(WorkflowStep::CacheCleared));
        assert!(state.is_confirmed(WorkflowStep::Built));
    }

    #[test]
    fn trail_follows_entered_steps() {
        let mut state = WorkflowState::new();
        state.enter(WorkflowStep::Announce);
        state.enter(WorkflowStep::RemoteDetected);
        assert_eq!(state.current_step, WorkflowStep::RemoteDetected);
        assert!(state.has_entered(WorkflowStep::Announce));
        assert!(!state.has_entered(WorkflowStep::Built));
    }
}
