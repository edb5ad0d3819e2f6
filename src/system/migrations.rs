//! Database migration status and application.

use crate::error::Result;
use crate::system::ExternalCommand;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};

/// A migration not yet applied to the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMigration {
    /// Timestamp version, e.g. `20240101120000`
    pub version: String,
    /// Migration name as reported by rails
    pub name: String,
}

/// Reports and applies schema migrations
pub trait MigrationTool {
    /// Migrations shipped with the code but not applied
    fn pending(&self) -> impl Future<Output = Result<Vec<PendingMigration>>>;

    /// Apply every pending migration
    fn apply_all(&self) -> impl Future<Output = Result<()>>;

    /// Apply a single migration by version
    fn apply(&self, version: &str) -> impl Future<Output = Result<()>>;
}

/// Parse `rails db:migrate:status`: every `down` row is pending.
///
/// ```text
///  Status   Migration ID    Migration Name
/// --------------------------------------------------
///    up     20230101000000  Create accounts
///   down    20240301000000  Add indexable to accounts
/// ```
pub fn parse_migration_status(output: &str) -> Vec<PendingMigration> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            if parts.next()? != "down" {
                return None;
            }
            let version = parts.next()?;
            if !version.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            Some(PendingMigration {
                version: version.to_string(),
                name: parts.collect::<Vec<_>>().join(" "),
            })
        })
        .collect()
}

/// Migrations through `bundle exec rails`
#[derive(Debug, Clone)]
pub struct RailsMigrations {
    work_dir: PathBuf,
    rails_env: String,
}

impl RailsMigrations {
    /// Migrate the checkout at `work_dir` in `rails_env`
    pub fn new(work_dir: impl AsRef<Path>, rails_env: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
            rails_env: rails_env.into(),
        }
    }

    fn rails(&self, task: &str) -> ExternalCommand {
        ExternalCommand::new("bundle")
            .args(["exec", "rails", task])
            .current_dir(&self.work_dir)
            .env("RAILS_ENV", &self.rails_env)
    }
}

impl MigrationTool for RailsMigrations {
    async fn pending(&self) -> Result<Vec<PendingMigration>> {
        let out = self.rails("db:migrate:status").run().await?;
        Ok(parse_migration_status(&out))
    }

    async fn apply_all(&self) -> Result<()> {
        log::info!("Applying all pending migrations");
        self.rails("db:migrate").run().await.map(drop)
    }

    async fn apply(&self, version: &str) -> Result<()> {
        log::info!("Applying migration {}", version);
        self.rails("db:migrate:up")
            .env("VERSION", version)
            .run()
            .await
            .map(drop)
    }
}
