//! Checks run before the workflow starts.

use crate::config::UpgradeConfig;
use crate::error::{CommandError, GitError, PermissionError, Result};

/// Tools the production collaborators spawn
pub const REQUIRED_TOOLS: &[&str] = &["git", "bundle", "yarn", "systemctl", "journalctl", "pg_dump"];

/// Fail unless every tool is on `PATH`
pub fn check_tools(tools: &[&str]) -> Result<()> {
    for tool in tools {
        which::which(tool).map_err(|_| CommandError::ToolMissing {
            tool: tool.to_string(),
        })?;
    }
    Ok(())
}

/// Fail unless the effective user matches `expected`
pub fn check_user(expected: &str) -> Result<()> {
    let actual = effective_user().ok_or(PermissionError::UnknownUser)?;
    if actual != expected {
        return Err(PermissionError::WrongUser {
            expected: expected.to_string(),
            actual,
        }
        .into());
    }
    Ok(())
}

#[cfg(unix)]
fn effective_user() -> Option<String> {
    users::get_effective_username().map(|name| name.to_string_lossy().into_owned())
}

#[cfg(not(unix))]
fn effective_user() -> Option<String> {
    std::env::var("USERNAME").ok()
}

/// Everything the `upgrade` command checks before handing over to the engine
pub fn run_preflight(config: &UpgradeConfig) -> Result<()> {
    if !config.working_dir.join(".git").exists() {
        return Err(GitError::NotRepository {
            path: config.working_dir.clone(),
        }
        .into());
    }
    check_tools(REQUIRED_TOOLS)?;
    if let Some(user) = &config.required_user {
        check_user(user)?;
    }
    let tootctl = config.working_dir.join("bin").join("tootctl");
    if !tootctl.exists() {
        return Err(CommandError::ToolMissing {
            tool: tootctl.display().to_string(),
        }
        .into());
    }
    log::debug!("Preflight checks passed for {}", config.working_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_is_reported_by_name() {
        let err = check_tools(&["definitely-not-a-real-tool-4f1c"]).unwrap_err();
        assert!(err.to_string().contains("definitely-not-a-real-tool-4f1c"));
    }

    #[test]
    fn wrong_user_is_permission_denied() {
        let err = check_user("no-such-user-for-upgrade-tests").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PermissionDenied);
    }

    #[test]
    fn non_repository_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = UpgradeConfig {
            working_dir: dir.path().to_path_buf(),
            ..UpgradeConfig::default()
        };
        assert!(matches!(
            run_preflight(&config),
            Err(crate::error::UpgradeError::Git(GitError::NotRepository { .. }))
        ));
    }
}
