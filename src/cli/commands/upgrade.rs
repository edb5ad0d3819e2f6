//! Upgrade command implementation.
//!
//! Runs preflight checks, then drives the interactive workflow with the
//! terminal as operator.

use super::helpers::print_recovery_suggestions;
use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::operator::TerminalOperator;
use crate::system::{SystemToolbox, preflight};
use crate::version::TargetRef;
use crate::workflow::UpgradeEngine;

/// Execute upgrade command
pub(super) async fn execute_upgrade(target: Option<&str>, config: &RuntimeConfig) -> Result<i32> {
    let settings = &config.settings;

    preflight::run_preflight(settings)?;
    let tools = SystemToolbox::from_config(settings)?;
    let operator = TerminalOperator::new(config.output().clone());

    let mut engine = UpgradeEngine::new(settings, &tools, &operator);
    if let Some(target) = target {
        engine = engine.with_target(TargetRef::from_user_input(target));
    }

    let _ = config.output().section("Mastodon upgrade");
    let outcome = engine.run().await;

    let _ = config.output().section("Summary");
    config.println(&outcome.state.summary());
    if let Some(file) = &outcome.state.backup_file {
        config.indent(&format!("Backup: {}", file.display()));
    }
    if let Some(branch) = &outcome.state.upgrade_branch {
        config.indent(&format!("Branch: {}", branch));
    }
    if !outcome.state.skipped.is_empty() {
        let skipped: Vec<_> = outcome.state.skipped.iter().map(|s| s.label()).collect();
        config.indent(&format!("Skipped: {}", skipped.join(", ")));
    }

    match (&outcome.error, &outcome.log_entry) {
        (Some(error), _) => print_recovery_suggestions(config, error),
        (None, Some(entry)) => config.success_println(&entry.to_line()),
        (None, None) => {}
    }

    Ok(outcome.exit_code())
}
