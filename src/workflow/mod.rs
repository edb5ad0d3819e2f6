//! The upgrade workflow.
//!
//! [`WorkflowStep`] names the states, [`UpgradeEngine`] walks them:
//!
//! ```text
//! Start → Announce → BackupPending → RemoteDetected → VersionSelected
//!   → Synced (↔ MergeConflict) → Built (↔ ManualFixRequested)
//!   → MigrationChecked → MigrationApplied → CacheCleared → SearchIndexed
//!   → ServicesRestarted → Verified
//! ```
//!
//! `Aborted` is reachable from every non-terminal step.

mod build;
mod engine;
mod finish;
mod step;
mod sync;

pub use build::recognize_build_failure;
pub use engine::{UpgradeEngine, UpgradeOutcome};
pub use step::{StepGate, WorkflowStep};
