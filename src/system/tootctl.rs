//! Cache and search index maintenance through `bin/tootctl`.

use crate::error::Result;
use crate::system::ExternalCommand;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Rebuilds the search index
pub trait SearchIndexer {
    /// Reset index definitions so the next deploy recreates them
    fn reset(&self) -> impl Future<Output = Result<()>>;

    /// Rebuild one index
    fn rebuild(
        &self,
        entity: &str,
        concurrency: usize,
        batch_size: usize,
    ) -> impl Future<Output = Result<()>>;
}

/// Clears the application cache
pub trait CacheTool {
    /// Clear cached data that depends on code or schema
    fn clear(&self) -> impl Future<Output = Result<()>>;
}

/// Mastodon's admin CLI
#[derive(Debug, Clone)]
pub struct Tootctl {
    work_dir: PathBuf,
    rails_env: String,
}

impl Tootctl {
    /// Use `bin/tootctl` inside `work_dir`
    pub fn new(work_dir: impl AsRef<Path>, rails_env: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
            rails_env: rails_env.into(),
        }
    }

    fn command<I, S>(&self, args: I) -> ExternalCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExternalCommand::new(self.work_dir.join("bin").join("tootctl").display().to_string())
            .args(args)
            .current_dir(&self.work_dir)
            .env("RAILS_ENV", &self.rails_env)
    }
}

impl SearchIndexer for Tootctl {
    async fn reset(&self) -> Result<()> {
        log::info!("Resetting search index definitions");
        self.command(["search", "deploy", "--reset-chewy", "--only-mapping"])
            .run()
            .await
            .map(drop)
    }

    async fn rebuild(&self, entity: &str, concurrency: usize, batch_size: usize) -> Result<()> {
        log::info!(
            "Rebuilding search index '{}' (concurrency {}, batch {})",
            entity,
            concurrency,
            batch_size
        );
        self.command([
            "search".to_string(),
            "deploy".to_string(),
            format!("--only={}", entity),
            format!("--concurrency={}", concurrency),
            format!("--batch-size={}", batch_size),
        ])
        .run()
        .await
        .map(drop)
    }
}

impl CacheTool for Tootctl {
    async fn clear(&self) -> Result<()> {
        log::info!("Clearing application cache");
        self.command(["cache", "clear"]).run().await.map(drop)
    }
}
