//! Command line argument parsing and validation.

use super::OutputManager;
use crate::config::UpgradeConfig;
use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Guided upgrades for self-hosted Mastodon instances
#[derive(Parser, Debug)]
#[command(
    name = "mastodon_upgrade",
    version,
    about = "Guided upgrades for self-hosted Mastodon instances",
    long_about = "Upgrade a Mastodon checkout to the newest upstream release, step by step.

Every step that touches the repository, the database or the running
services asks for confirmation first.

Usage:
  mastodon_upgrade upgrade
  mastodon_upgrade upgrade --target v4.2.1
  mastodon_upgrade detect --json
  mastodon_upgrade services
  mastodon_upgrade services restart mastodon-web"
)]
pub struct Args {
    /// Config file (default: <config dir>/mastodon_upgrade/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Mastodon checkout, overriding the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub working_dir: Option<PathBuf>,

    /// Only print prompts and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the interactive upgrade
    Upgrade {
        /// Tag, upstream branch or `main` to upgrade to, skipping detection
        #[arg(long, value_name = "REF")]
        target: Option<String>,
    },

    /// Show detected remotes, target and running version without changing anything
    Detect {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show whether each configured service is running, or start/stop/restart one
    Services {
        /// Action on a single service; status of all when omitted
        #[command(subcommand)]
        action: Option<ServiceAction>,
    },

    /// List migrations that have not been applied
    PendingMigrations,

    /// Apply a single migration by version
    MigrateOne {
        /// Migration version, e.g. 20240301123000
        #[arg(value_name = "VERSION")]
        version: String,
    },
}

/// Actions on one configured service
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ServiceAction {
    /// Start a stopped service
    Start {
        /// Unit name, e.g. mastodon-web
        service: String,
    },
    /// Stop a running service
    Stop {
        /// Unit name
        service: String,
    },
    /// Restart a service
    Restart {
        /// Unit name
        service: String,
    },
}

impl ServiceAction {
    /// Verb for prompts and messages
    pub fn verb(&self) -> &'static str {
        match self {
            ServiceAction::Start { .. } => "start",
            ServiceAction::Stop { .. } => "stop",
            ServiceAction::Restart { .. } => "restart",
        }
    }

    /// Service the action applies to
    pub fn service(&self) -> &str {
        match self {
            ServiceAction::Start { service }
            | ServiceAction::Stop { service }
            | ServiceAction::Restart { service } => service,
        }
    }
}

impl Command {
    /// Subcommand name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Upgrade { .. } => "upgrade",
            Command::Detect { .. } => "detect",
            Command::Services { .. } => "services",
            Command::PendingMigrations => "pending-migrations",
            Command::MigrateOne { .. } => "migrate-one",
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        match &self.command {
            Command::Upgrade { target: Some(t) } if t.trim().is_empty() => {
                Err("--target must not be empty".to_string())
            }
            Command::MigrateOne { version }
                if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) =>
            {
                Err(format!("Migration version must be numeric, got '{}'", version))
            }
            Command::Services {
                action: Some(action),
            } if action.service().trim().is_empty() => {
                Err("Service name must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Configuration derived from command line arguments and the config file
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: OutputManager,
    /// Effective settings
    pub settings: UpgradeConfig,
}

impl RuntimeConfig {
    /// Load settings, applying `--working-dir` on top of file and environment
    pub fn load(args: &Args) -> Result<Self> {
        let mut settings = UpgradeConfig::load(args.config.as_deref())?;
        if let Some(dir) = &args.working_dir {
            settings.working_dir = dir.clone();
        }
        log::debug!("Working directory: {}", settings.working_dir.display());
        Ok(Self {
            output: OutputManager::new(args.quiet),
            settings,
        })
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &OutputManager {
        &self.output
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}
