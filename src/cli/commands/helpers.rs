//! Shared helper functions for command execution.

use crate::cli::RuntimeConfig;
use crate::error::UpgradeError;
use crate::git::{GitCli, GitOperations};

/// Print the error's recovery suggestions, if any
pub(super) fn print_recovery_suggestions(config: &RuntimeConfig, error: &UpgradeError) {
    let suggestions = error.recovery_suggestions();
    if suggestions.is_empty() {
        return;
    }
    config.println("\n💡 Recovery suggestions:");
    for suggestion in suggestions {
        config.println(&format!("  • {}", suggestion));
    }
}

/// Git adapter for the configured checkout, failing early outside a repository
pub(super) async fn open_repository(config: &RuntimeConfig) -> crate::error::Result<GitCli> {
    let git = GitCli::new(&config.settings.working_dir);
    if !git.is_repository().await? {
        return Err(crate::error::GitError::NotRepository {
            path: config.settings.working_dir.clone(),
        }
        .into());
    }
    Ok(git)
}

/// Render a yes/no cell for status tables
pub(super) fn status_mark(ok: bool) -> &'static str {
    if ok { "✓" } else { "✗" }
}
