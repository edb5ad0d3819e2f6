//! Build with a single operator-assisted retry, then migrations.

use super::{UpgradeEngine, WorkflowStep};
use crate::config::BuildFailurePattern;
use crate::error::{Result, UpgradeError, WorkflowError};
use crate::operator::{ManualFix, ManualFixResponse, NoticeLevel, Operator};
use crate::state::WorkflowState;
use crate::system::{BuildToolchain, MigrationTool, Toolbox};

/// Builds allowed per run: the first attempt plus one retry
const MAX_BUILD_ATTEMPTS: u32 = 2;

/// Match a failed build's output against the configured patterns.
///
/// Returns the first pattern that matches, with the last non-empty output
/// line as the failure summary. Patterns that are not valid regexes are
/// ignored.
pub fn recognize_build_failure(output: &str, patterns: &[BuildFailurePattern]) -> Option<ManualFix> {
    let failure = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("build failed")
        .to_string();

    patterns.iter().find_map(|p| match regex::Regex::new(&p.pattern) {
        Ok(re) if re.is_match(output) => Some(ManualFix {
            failure: failure.clone(),
            remediation: p.remediation.clone(),
        }),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Ignoring invalid build failure pattern '{}': {}", p.pattern, e);
            None
        }
    })
}

fn failure_output(error: &UpgradeError) -> String {
    match error {
        UpgradeError::Command(c) => c.stderr().map_or_else(|| c.to_string(), str::to_string),
        other => other.to_string(),
    }
}

impl<T: Toolbox, O: Operator> UpgradeEngine<'_, T, O> {
    pub(super) async fn build(&self, state: &mut WorkflowState) -> Result<()> {
        let step = WorkflowStep::Built;
        if !self.ask(state, step, "Install dependencies and precompile assets?")? {
            return Err(UpgradeError::aborted(step, "build declined"));
        }
        self.transition(state, step)?;

        loop {
            state.build_attempts += 1;
            let error = match self.build_once().await {
                Ok(()) => break,
                Err(e) => e,
            };

            let output = failure_output(&error);
            let Some(fix) = recognize_build_failure(&output, &self.config.build.failure_patterns)
            else {
                return Err(error);
            };
            if state.build_attempts >= MAX_BUILD_ATTEMPTS {
                return Err(WorkflowError::BuildRetryExhausted {
                    reason: fix.failure,
                }
                .into());
            }

            self.transition(state, WorkflowStep::ManualFixRequested)?;
            match self.operator.manual_fix(&fix)? {
                ManualFixResponse::Retry => {
                    log::info!("Retrying build after manual fix");
                    self.transition(state, step)?;
                }
                ManualFixResponse::Abort => {
                    return Err(UpgradeError::aborted(
                        WorkflowStep::ManualFixRequested,
                        fix.failure,
                    ));
                }
            }
        }

        self.notify(NoticeLevel::Success, "Dependencies installed and assets compiled");
        Ok(())
    }

    async fn build_once(&self) -> Result<()> {
        let toolchain = self.tools.build();
        toolchain.install_dependencies().await?;
        toolchain.precompile_assets().await
    }

    pub(super) async fn migrate(&self, state: &mut WorkflowState) -> Result<()> {
        self.transition(state, WorkflowStep::MigrationChecked)?;
        let migrations = self.tools.migrations();

        let pending = migrations.pending().await?;
        if pending.is_empty() {
            self.notify(NoticeLevel::Info, "No pending migrations");
            return Ok(());
        }

        self.notify(
            NoticeLevel::Info,
            &format!("{} pending migration(s):", pending.len()),
        );
        for migration in &pending {
            self.notify(
                NoticeLevel::Info,
                &format!("  {} {}", migration.version, migration.name),
            );
        }

        let step = WorkflowStep::MigrationApplied;
        let question = format!("Apply {} pending migration(s)?", pending.len());
        if !self.ask(state, step, &question)? {
            return Err(UpgradeError::aborted(
                WorkflowStep::MigrationChecked,
                "pending migrations declined; the new code cannot run on the old schema",
            ));
        }

        self.transition(state, step)?;
        migrations.apply_all().await?;
        state.migrations_applied = pending.len();
        self.notify(
            NoticeLevel::Success,
            &format!("Applied {} migration(s)", pending.len()),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<BuildFailurePattern> {
        vec![BuildFailurePattern {
            pattern: r"libicu|charlock_holmes".to_string(),
            remediation: "Reinstall charlock_holmes against the current ICU".to_string(),
        }]
    }

    #[test]
    fn known_failure_is_recognized() {
        let output = "Installing charlock_holmes 0.7.7 with native extensions\n\
                      An error occurred while installing charlock_holmes (0.7.7)\n\n";
        let fix = recognize_build_failure(output, &patterns()).unwrap();
        assert_eq!(fix.failure, "An error occurred while installing charlock_holmes (0.7.7)");
        assert!(fix.remediation.contains("ICU"));
    }

    #[test]
    fn unknown_failure_is_not_recognized() {
        assert!(recognize_build_failure("yarn: network timeout", &patterns()).is_none());
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let mut patterns = patterns();
        patterns.insert(
            0,
            BuildFailurePattern {
                pattern: "(".to_string(),
                remediation: String::new(),
            },
        );
        assert!(recognize_build_failure("libicu.so.70 missing", &patterns).is_some());
    }
}
