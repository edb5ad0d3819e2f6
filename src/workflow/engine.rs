//! The upgrade state machine.

use super::WorkflowStep;
use crate::config::UpgradeConfig;
use crate::error::{ErrorKind, Result, UpgradeError, WorkflowError};
use crate::operator::{NoticeLevel, Operator};
use crate::state::{UpgradeHistory, UpgradeLogEntry, WorkflowState};
use crate::system::Toolbox;
use crate::version::TargetRef;

/// Result of one [`UpgradeEngine::run`]
#[derive(Debug)]
pub struct UpgradeOutcome {
    /// Final state, including the trail of entered steps
    pub state: WorkflowState,
    /// Error that ended the run early
    pub error: Option<UpgradeError>,
    /// History line written on success
    pub log_entry: Option<UpgradeLogEntry>,
}

impl UpgradeOutcome {
    /// Whether the run reached `Verified`
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.state.current_step == WorkflowStep::Verified
    }

    /// Whether the operator cancelled the run
    pub fn is_aborted(&self) -> bool {
        self.state.last_error == Some(ErrorKind::Aborted)
    }

    /// Process exit code: 0 on success, 2 on operator abort, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match &self.error {
            None if self.is_success() => 0,
            None => 1,
            Some(e) => e.exit_code(),
        }
    }
}

/// Drives one upgrade from `Start` to `Verified` or `Aborted`.
///
/// Steps run strictly in order. Every step that changes the repository,
/// the database or the running services is preceded by an operator
/// confirmation recorded in [`WorkflowState`]; [`Self::transition`]
/// refuses to enter such a step without one.
pub struct UpgradeEngine<'a, T: Toolbox, O: Operator> {
    pub(super) config: &'a UpgradeConfig,
    pub(super) tools: &'a T,
    pub(super) operator: &'a O,
    pub(super) target_override: Option<TargetRef>,
    pub(super) history: UpgradeHistory,
}

impl<'a, T: Toolbox, O: Operator> UpgradeEngine<'a, T, O> {
    /// Engine for the configured checkout
    pub fn new(config: &'a UpgradeConfig, tools: &'a T, operator: &'a O) -> Self {
        Self {
            config,
            tools,
            operator,
            target_override: None,
            history: UpgradeHistory::new(config.history_path()),
        }
    }

    /// Skip target detection and upgrade to `target`
    pub fn with_target(mut self, target: TargetRef) -> Self {
        self.target_override = Some(target);
        self
    }

    /// Run the whole workflow. Never panics on external failures; the
    /// outcome carries the error and the state at which it happened.
    pub async fn run(&self) -> UpgradeOutcome {
        let mut state = WorkflowState::new();

        match self.drive(&mut state).await {
            Ok(entry) => UpgradeOutcome {
                state,
                error: None,
                log_entry: Some(entry),
            },
            Err(error) => {
                log::error!("Upgrade stopped during '{}': {}", state.current_step, error);
                state.record_error(error.kind());
                let failed_at = state.current_step;
                state.enter(WorkflowStep::Aborted);
                let level = if error.kind() == ErrorKind::Aborted {
                    NoticeLevel::Warning
                } else {
                    NoticeLevel::Error
                };
                self.operator.notify(
                    level,
                    &format!("Upgrade stopped at '{}': {}", failed_at, error),
                );
                UpgradeOutcome {
                    state,
                    error: Some(error),
                    log_entry: None,
                }
            }
        }
    }

    async fn drive(&self, state: &mut WorkflowState) -> Result<UpgradeLogEntry> {
        self.announce(state).await?;
        self.backup(state).await?;
        self.detect_remotes(state).await?;
        let target = self.select_version(state).await?;
        self.sync(state, &target).await?;
        self.build(state).await?;
        self.migrate(state).await?;
        self.clear_cache(state).await?;
        self.rebuild_search(state).await?;
        self.restart_services(state).await?;
        self.verify(state, &target).await
    }

    /// Ask the operator about `step` and record the answer
    pub(super) fn ask(
        &self,
        state: &mut WorkflowState,
        step: WorkflowStep,
        question: &str,
    ) -> Result<bool> {
        let answer = self.operator.confirm(step, question)?;
        state.record_confirmation(step, answer);
        log::debug!("Operator answered {} for '{}'", answer, step);
        Ok(answer)
    }

    /// Enter `step`, enforcing its gate
    pub(super) fn transition(&self, state: &mut WorkflowState, step: WorkflowStep) -> Result<()> {
        if step.requires_confirmation() && !state.is_confirmed(step) {
            return Err(WorkflowError::UnconfirmedStep { step }.into());
        }
        log::info!("Entering step '{}'", step);
        state.enter(step);
        Ok(())
    }

    /// Record a declined optional step and tell the operator
    pub(super) fn skip(&self, state: &mut WorkflowState, step: WorkflowStep, why: &str) {
        log::warn!("Skipping '{}': {}", step, why);
        state.mark_skipped(step);
        self.operator
            .notify(NoticeLevel::Warning, &format!("Skipped {}: {}", step, why));
    }

    pub(super) fn notify(&self, level: NoticeLevel, message: &str) {
        self.operator.notify(level, message);
    }
}
