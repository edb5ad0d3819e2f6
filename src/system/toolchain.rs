//! Dependency installation and asset compilation.

use crate::error::Result;
use crate::system::ExternalCommand;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Installs dependencies and compiles assets for the checked-out code
pub trait BuildToolchain {
    /// Ruby and JavaScript dependencies
    fn install_dependencies(&self) -> impl Future<Output = Result<()>>;

    /// Production asset compilation
    fn precompile_assets(&self) -> impl Future<Output = Result<()>>;
}

/// `bundle install`, `yarn install` and `rails assets:precompile`
#[derive(Debug, Clone)]
pub struct RailsToolchain {
    work_dir: PathBuf,
    rails_env: String,
}

impl RailsToolchain {
    /// Build the checkout at `work_dir` for `rails_env`
    pub fn new(work_dir: impl AsRef<Path>, rails_env: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
            rails_env: rails_env.into(),
        }
    }

    fn command(&self, program: &str) -> ExternalCommand {
        ExternalCommand::new(program)
            .current_dir(&self.work_dir)
            .env("RAILS_ENV", &self.rails_env)
    }
}

impl BuildToolchain for RailsToolchain {
    async fn install_dependencies(&self) -> Result<()> {
        log::info!("Installing Ruby dependencies");
        self.command("bundle").arg("install").run().await?;
        log::info!("Installing JavaScript dependencies");
        self.command("yarn")
            .args(["install", "--immutable"])
            .run()
            .await?;
        Ok(())
    }

    async fn precompile_assets(&self) -> Result<()> {
        log::info!("Precompiling assets");
        self.command("bundle")
            .args(["exec", "rails", "assets:precompile"])
            .run()
            .await
            .map(drop)
    }
}
