//! Command execution functions.
//!
//! Each subcommand loads the runtime configuration, runs, and maps its
//! result to a process exit code.

mod detect;
mod helpers;
mod migrations;
mod services;
mod upgrade;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;

use detect::execute_detect;
use migrations::{execute_migrate_one, execute_pending_migrations};
use services::{execute_service_action, execute_services};
use upgrade::execute_upgrade;

/// Execute the main command based on parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        // Never quiet for validation errors
        let output = super::OutputManager::new(false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::load(&args)?;

    let result = match &args.command {
        Command::Upgrade { target } => execute_upgrade(target.as_deref(), &config).await,
        Command::Detect { json } => execute_detect(*json, &config).await.map(|()| 0),
        Command::Services { action: None } => execute_services(&config).await,
        Command::Services {
            action: Some(action),
        } => execute_service_action(action, &config).await,
        Command::PendingMigrations => execute_pending_migrations(&config).await.map(|()| 0),
        Command::MigrateOne { version } => execute_migrate_one(version, &config).await,
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            config.error_println(&format!(
                "Command '{}' failed: {}",
                args.command.name(),
                e
            ));
            helpers::print_recovery_suggestions(&config, &e);
            Ok(e.exit_code())
        }
    }
}
