//! State of an upgrade run and the history of completed upgrades.
//!
//! [`WorkflowState`] lives only as long as one run; the only thing that
//! survives the process is the line appended to [`UpgradeHistory`].

mod history;
mod workflow_state;

pub use history::{UpgradeHistory, UpgradeLogEntry};
pub use workflow_state::{CustomizationStatus, StepRecord, WorkflowState};
