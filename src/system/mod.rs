//! External collaborators of the upgrade workflow.
//!
//! One small trait per capability, each with a production implementation
//! that spawns the corresponding tool. [`Toolbox`] bundles them so the
//! workflow engine can be driven by fakes in tests.

mod backup;
mod command;
mod instance;
mod migrations;
pub mod preflight;
mod services;
mod tootctl;
mod toolchain;

pub use backup::{BackupTool, PgDump};
pub use command::{CommandOutput, ExternalCommand};
pub use instance::{InstanceApi, InstanceStatus, normalize_instance_version};
pub use migrations::{MigrationTool, PendingMigration, RailsMigrations, parse_migration_status};
pub use services::{ServiceManager, Systemd};
pub use tootctl::{CacheTool, SearchIndexer, Tootctl};
pub use toolchain::{BuildToolchain, RailsToolchain};

use crate::config::UpgradeConfig;
use crate::error::Result;
use crate::git::{GitCli, GitOperations};

/// Every external capability the workflow needs
pub trait Toolbox {
    /// Version control
    type Git: GitOperations;
    /// Dependency installation and asset build
    type Build: BuildToolchain;
    /// Schema migrations
    type Migrations: MigrationTool;
    /// Service control
    type Services: ServiceManager;
    /// Search index
    type Search: SearchIndexer;
    /// Application cache
    type Cache: CacheTool;
    /// Running version lookup
    type Instance: InstanceStatus;
    /// Database backups
    type Backup: BackupTool;

    /// Version control
    fn git(&self) -> &Self::Git;
    /// Dependency installation and asset build
    fn build(&self) -> &Self::Build;
    /// Schema migrations
    fn migrations(&self) -> &Self::Migrations;
    /// Service control
    fn services(&self) -> &Self::Services;
    /// Search index
    fn search(&self) -> &Self::Search;
    /// Application cache
    fn cache(&self) -> &Self::Cache;
    /// Running version lookup
    fn instance(&self) -> &Self::Instance;
    /// Database backups
    fn backup(&self) -> &Self::Backup;
}

/// Production collaborators for a Mastodon host
#[derive(Debug, Clone)]
pub struct SystemToolbox {
    git: GitCli,
    build: RailsToolchain,
    migrations: RailsMigrations,
    services: Systemd,
    tootctl: Tootctl,
    instance: InstanceApi,
    backup: PgDump,
}

impl SystemToolbox {
    /// Wire every collaborator to the configured checkout
    pub fn from_config(config: &UpgradeConfig) -> Result<Self> {
        let dir = &config.working_dir;
        let env = config.rails_env.as_str();
        Ok(Self {
            git: GitCli::new(dir),
            build: RailsToolchain::new(dir, env),
            migrations: RailsMigrations::new(dir, env),
            services: Systemd,
            tootctl: Tootctl::new(dir, env),
            instance: InstanceApi::new(config.instance_url.as_deref())?,
            backup: PgDump::new(config.backup.database.clone()),
        })
    }
}

impl Toolbox for SystemToolbox {
    type Git = GitCli;
    type Build = RailsToolchain;
    type Migrations = RailsMigrations;
    type Services = Systemd;
    type Search = Tootctl;
    type Cache = Tootctl;
    type Instance = InstanceApi;
    type Backup = PgDump;

    fn git(&self) -> &GitCli {
        &self.git
    }

    fn build(&self) -> &RailsToolchain {
        &self.build
    }

    fn migrations(&self) -> &RailsMigrations {
        &self.migrations
    }

    fn services(&self) -> &Systemd {
        &self.services
    }

    fn search(&self) -> &Tootctl {
        &self.tootctl
    }

    fn cache(&self) -> &Tootctl {
        &self.tootctl
    }

    fn instance(&self) -> &InstanceApi {
        &self.instance
    }

    fn backup(&self) -> &PgDump {
        &self.backup
    }
}
