//! Upgrade workflow steps and their gating rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A state of the upgrade workflow.
///
/// Declaration order is the order of the main line, so `Ord` reflects
/// progress. `MergeConflict` and `ManualFixRequested` are sub-states of
/// `Synced` and `Built` respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkflowStep {
    /// Nothing has happened yet
    Start,
    /// Plan shown to the operator
    Announce,
    /// Database backup offered
    BackupPending,
    /// Fork and upstream remotes identified and fetched
    RemoteDetected,
    /// Target tag or branch chosen
    VersionSelected,
    /// Waiting on the operator after a conflicted merge
    MergeConflict,
    /// Upgrade branch checked out (customizations merged or skipped)
    Synced,
    /// Waiting on the operator to fix a recognized build failure
    ManualFixRequested,
    /// Dependencies installed and assets compiled
    Built,
    /// Pending migrations listed
    MigrationChecked,
    /// Pending migrations applied
    MigrationApplied,
    /// Application cache cleared
    CacheCleared,
    /// Search index rebuilt
    SearchIndexed,
    /// Services restarted in dependency order
    ServicesRestarted,
    /// Services verified and history written
    Verified,
    /// Cancelled by the operator or an unrecoverable error
    Aborted,
}

/// How a step may be entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepGate {
    /// Read-only or bookkeeping; runs without asking
    Unconditional,
    /// Mutates the repository, database or services; needs a recorded yes
    Confirmed,
    /// Operator dialogue with several outcomes
    Decision,
    /// End of the workflow
    Terminal,
}

impl WorkflowStep {
    /// Gate applied before entering this step
    pub fn gate(self) -> StepGate {
        match self {
            WorkflowStep::Start
            | WorkflowStep::Announce
            | WorkflowStep::RemoteDetected
            | WorkflowStep::VersionSelected
            | WorkflowStep::MigrationChecked => StepGate::Unconditional,
            WorkflowStep::BackupPending
            | WorkflowStep::Synced
            | WorkflowStep::Built
            | WorkflowStep::MigrationApplied
            | WorkflowStep::CacheCleared
            | WorkflowStep::SearchIndexed
            | WorkflowStep::ServicesRestarted => StepGate::Confirmed,
            WorkflowStep::MergeConflict | WorkflowStep::ManualFixRequested => StepGate::Decision,
            WorkflowStep::Verified | WorkflowStep::Aborted => StepGate::Terminal,
        }
    }

    /// Whether entering this step requires a recorded confirmation
    pub fn requires_confirmation(self) -> bool {
        self.gate() == StepGate::Confirmed
    }

    /// Whether the workflow ends here
    pub fn is_terminal(self) -> bool {
        self.gate() == StepGate::Terminal
    }

    /// Whether the operator may decline this step and still continue
    pub fn is_optional(self) -> bool {
        matches!(
            self,
            WorkflowStep::BackupPending | WorkflowStep::CacheCleared | WorkflowStep::SearchIndexed
        )
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            WorkflowStep::Start => "start",
            WorkflowStep::Announce => "announce",
            WorkflowStep::BackupPending => "backup",
            WorkflowStep::RemoteDetected => "detect remotes",
            WorkflowStep::VersionSelected => "select version",
            WorkflowStep::MergeConflict => "merge conflict",
            WorkflowStep::Synced => "checkout",
            WorkflowStep::ManualFixRequested => "manual fix",
            WorkflowStep::Built => "build",
            WorkflowStep::MigrationChecked => "check migrations",
            WorkflowStep::MigrationApplied => "apply migrations",
            WorkflowStep::CacheCleared => "clear cache",
            WorkflowStep::SearchIndexed => "rebuild search index",
            WorkflowStep::ServicesRestarted => "restart services",
            WorkflowStep::Verified => "verify",
            WorkflowStep::Aborted => "aborted",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
