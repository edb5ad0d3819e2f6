//! Migration commands: list pending, apply one.

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::operator::{Operator, TerminalOperator};
use crate::system::{MigrationTool, RailsMigrations};
use crate::workflow::WorkflowStep;

fn migrations(config: &RuntimeConfig) -> RailsMigrations {
    RailsMigrations::new(&config.settings.working_dir, config.settings.rails_env.as_str())
}

/// Execute pending-migrations command
pub(super) async fn execute_pending_migrations(config: &RuntimeConfig) -> Result<()> {
    let pending = migrations(config).pending().await?;
    if pending.is_empty() {
        config.success_println("No pending migrations");
        return Ok(());
    }

    let _ = config.output().section("Pending migrations");
    for migration in &pending {
        config.println(&format!("{}  {}", migration.version, migration.name));
    }
    Ok(())
}

/// Execute migrate-one command
pub(super) async fn execute_migrate_one(version: &str, config: &RuntimeConfig) -> Result<i32> {
    let tool = migrations(config);
    let pending = tool.pending().await?;
    let Some(migration) = pending.iter().find(|m| m.version == version) else {
        config.warning_println(&format!("Migration {} is not pending", version));
        return Ok(1);
    };

    let operator = TerminalOperator::new(config.output().clone());
    let question = format!("Apply migration {} ({})?", migration.version, migration.name);
    if !operator.confirm(WorkflowStep::MigrationApplied, &question)? {
        config.warning_println("Migration not applied");
        return Ok(2);
    }

    tool.apply(version).await?;
    config.success_println(&format!("Applied {}", version));
    Ok(0)
}
