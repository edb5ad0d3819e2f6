//! Error types for mastodon_upgrade operations.
//!
//! Every error carries actionable text for the operator, and maps onto one
//! [`ErrorKind`] of the upgrade error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

use crate::workflow::WorkflowStep;

/// Result type alias for mastodon_upgrade operations
pub type Result<T> = std::result::Result<T, UpgradeError>;

/// Main error type for all mastodon_upgrade operations
#[derive(Error, Debug)]
pub enum UpgradeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Auto-detection errors
    #[error("Detection failed: {0}")]
    Detection(#[from] DetectionError),

    /// Git operation errors
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// External command errors
    #[error("External command failed: {0}")]
    Command(#[from] CommandError),

    /// Privilege errors
    #[error("Permission denied: {0}")]
    Permission(#[from] PermissionError),

    /// Resource errors (disk space)
    #[error("Insufficient resources: {0}")]
    Resource(#[from] ResourceError),

    /// Workflow sequencing errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Coarse classification of an [`UpgradeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required identifier or setting is absent
    ConfigurationMissing,
    /// A remote, version or branch could not be found automatically
    DetectionFailed,
    /// A build, install, migrate or service command exited non-zero
    ExternalCommandFailed,
    /// A merge left conflicts behind
    ConflictDetected,
    /// The process lacks the privileges a step needs
    PermissionDenied,
    /// Not enough disk space (or similar) to proceed safely
    ResourceInsufficient,
    /// The operator cancelled the workflow
    Aborted,
    /// Anything else (IO, serialization, invariant violations)
    Internal,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required setting absent
    #[error("Missing required setting '{field}'. {hint}")]
    Missing {
        /// Setting name
        field: String,
        /// How to provide it
        hint: String,
    },

    /// Setting present but unusable
    #[error("Invalid setting '{field}': {reason}")]
    Invalid {
        /// Setting name
        field: String,
        /// Reason for the error
        reason: String,
    },

    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        /// Path to the config file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        /// Path to the config file
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },
}

/// Role a git remote plays in the upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteRole {
    /// The operator's own fork
    Fork,
    /// The original project repository
    Upstream,
}

impl RemoteRole {
    /// The opposite role
    pub fn other(self) -> Self {
        match self {
            RemoteRole::Fork => RemoteRole::Upstream,
            RemoteRole::Upstream => RemoteRole::Fork,
        }
    }
}

impl std::fmt::Display for RemoteRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteRole::Fork => write!(f, "fork"),
            RemoteRole::Upstream => write!(f, "upstream"),
        }
    }
}

/// Auto-detection errors
#[derive(Error, Debug)]
pub enum DetectionError {
    /// No remote matched the configured identifiers
    #[error("No {role} remote found among configured git remotes")]
    RemoteNotFound {
        /// Which remote was missing
        role: RemoteRole,
    },

    /// No stable, parseable release tag
    #[error("No stable release tag found ({considered} tag(s) considered)")]
    NoStableTag {
        /// Number of tags inspected
        considered: usize,
    },

    /// No remote branch carrying the prefix
    #[error("No branch with prefix '{prefix}' found")]
    NoPrefixedBranch {
        /// Configured prefix
        prefix: String,
    },

    /// Instance API unreachable or malformed
    #[error("Could not determine running instance version: {reason}")]
    InstanceVersionUnavailable {
        /// Reason for the error
        reason: String,
    },
}

/// Git operation errors
#[derive(Error, Debug)]
pub enum GitError {
    /// Not a git repository
    #[error("{path} is not a git repository")]
    NotRepository {
        /// Directory inspected
        path: PathBuf,
    },

    /// A git invocation failed
    #[error("git {operation} failed: {reason}")]
    CommandFailed {
        /// Operation that failed
        operation: String,
        /// Reason for the error
        reason: String,
    },

    /// The checkout has unmerged paths left from an earlier merge
    #[error("Unmerged paths left in the checkout: {}", .paths.join(", "))]
    UnresolvedConflicts {
        /// Paths still unmerged
        paths: Vec<String>,
    },

    /// Branch already present
    #[error("Branch '{branch}' already exists")]
    BranchExists {
        /// Branch name
        branch: String,
    },

    /// Reference could not be resolved
    #[error("Reference '{reference}' not found")]
    RefNotFound {
        /// Reference name
        reference: String,
    },
}

/// External command errors
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command could not be spawned
    #[error("Could not run '{command}': {reason}")]
    SpawnFailed {
        /// Command line
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Command exited non-zero
    #[error("'{command}' exited with status {}{}", .code.map_or_else(|| "unknown".to_string(), |c| c.to_string()), summarize(.stderr))]
    NonZeroExit {
        /// Command line
        command: String,
        /// Exit code, if any
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// Required tool not on PATH
    #[error("Required tool '{tool}' not found on PATH")]
    ToolMissing {
        /// Tool name
        tool: String,
    },

    /// Command did not finish in time
    #[error("'{command}' did not finish within {seconds}s")]
    Timeout {
        /// Command line
        command: String,
        /// Timeout in seconds
        seconds: u64,
    },

    /// HTTP request failed
    #[error("Request to {url} failed: {reason}")]
    Http {
        /// Requested URL
        url: String,
        /// Reason for the error
        reason: String,
    },
}

fn summarize(stderr: &str) -> String {
    match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
        Some(last) => format!(": {}", last.trim()),
        None => String::new(),
    }
}

impl CommandError {
    /// Captured stderr for failures that produced any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            CommandError::NonZeroExit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Privilege errors
#[derive(Error, Debug)]
pub enum PermissionError {
    /// Running as the wrong account
    #[error("Running as '{actual}' but this step requires '{expected}'")]
    WrongUser {
        /// Configured user
        expected: String,
        /// Effective user
        actual: String,
    },

    /// Current user could not be determined
    #[error("Could not determine the effective user")]
    UnknownUser,
}

/// Resource errors
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Backup destination too full
    #[error(
        "Only {available_bytes} bytes free at {path}, at least {required_bytes} required for a backup"
    )]
    InsufficientDiskSpace {
        /// Backup directory
        path: PathBuf,
        /// Free bytes on its filesystem
        available_bytes: u64,
        /// Configured minimum
        required_bytes: u64,
    },
}

/// Workflow sequencing errors
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Operator cancelled
    #[error("Upgrade aborted at step '{step}': {reason}")]
    Aborted {
        /// Step at which the abort happened
        step: WorkflowStep,
        /// Reason for the abort
        reason: String,
    },

    /// Engine attempted a mutating step without confirmation
    #[error("Step '{step}' requires operator confirmation")]
    UnconfirmedStep {
        /// Step that was refused
        step: WorkflowStep,
    },

    /// Build failed again after the single manual-fix retry
    #[error("Build failed after manual fix: {reason}")]
    BuildRetryExhausted {
        /// Last failure
        reason: String,
    },

    /// Services not running after restart
    #[error("Services not running after restart: {}", .services.join(", "))]
    ServicesNotRunning {
        /// Services reported inactive
        services: Vec<String>,
    },

    /// No answer could be obtained from the operator
    #[error("Operator input unavailable: {reason}")]
    OperatorUnavailable {
        /// Reason for the error
        reason: String,
    },
}

impl UpgradeError {
    /// Shorthand for an operator abort at `step`
    pub fn aborted(step: WorkflowStep, reason: impl Into<String>) -> Self {
        UpgradeError::Workflow(WorkflowError::Aborted {
            step,
            reason: reason.into(),
        })
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpgradeError::Config(ConfigError::Missing { .. }) => ErrorKind::ConfigurationMissing,
            UpgradeError::Config(_) => ErrorKind::ConfigurationMissing,
            UpgradeError::Detection(_) => ErrorKind::DetectionFailed,
            UpgradeError::Git(GitError::UnresolvedConflicts { .. }) => ErrorKind::ConflictDetected,
            UpgradeError::Git(_) | UpgradeError::Command(_) => ErrorKind::ExternalCommandFailed,
            UpgradeError::Workflow(WorkflowError::BuildRetryExhausted { .. })
            | UpgradeError::Workflow(WorkflowError::ServicesNotRunning { .. }) => {
                ErrorKind::ExternalCommandFailed
            }
            UpgradeError::Permission(_) => ErrorKind::PermissionDenied,
            UpgradeError::Resource(_) => ErrorKind::ResourceInsufficient,
            UpgradeError::Workflow(WorkflowError::Aborted { .. }) => ErrorKind::Aborted,
            UpgradeError::Workflow(_)
            | UpgradeError::Io(_)
            | UpgradeError::Json(_)
            | UpgradeError::Anyhow(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Process exit code for this error: 2 for operator aborts, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.kind() == ErrorKind::Aborted { 2 } else { 1 }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            UpgradeError::Config(ConfigError::Missing { field, .. }) => vec![
                format!("Set '{}' in the config file", field),
                "Run 'mastodon_upgrade detect' to see what was auto-detected".to_string(),
            ],
            UpgradeError::Config(ConfigError::ParseFailed { path, .. }) => vec![format!(
                "Fix the TOML syntax in {} or remove the file to use defaults",
                path.display()
            )],
            UpgradeError::Detection(DetectionError::RemoteNotFound { role }) => vec![
                "List configured remotes: git remote -v".to_string(),
                match role {
                    RemoteRole::Upstream => {
                        "Add the upstream remote: git remote add upstream https://github.com/mastodon/mastodon.git".to_string()
                    }
                    RemoteRole::Fork => {
                        "Set remotes.fork_identifier to a substring of your fork's URL".to_string()
                    }
                },
            ],
            UpgradeError::Detection(DetectionError::NoStableTag { .. }) => vec![
                "Fetch tags from upstream: git fetch upstream --tags".to_string(),
                "Pass an explicit target with --target <tag>".to_string(),
            ],
            UpgradeError::Git(GitError::NotRepository { path }) => vec![format!(
                "Point --working-dir at the Mastodon checkout (currently {})",
                path.display()
            )],
            UpgradeError::Git(GitError::UnresolvedConflicts { .. }) => vec![
                "Inspect conflicts: git status".to_string(),
                "Finish the merge with git commit, or abandon it: git merge --abort".to_string(),
            ],
            UpgradeError::Git(GitError::BranchExists { branch }) => vec![
                format!("Delete the stale branch: git branch -D {}", branch),
            ],
            UpgradeError::Command(CommandError::ToolMissing { tool }) => vec![
                format!("Install '{}' or add it to PATH", tool),
            ],
            UpgradeError::Permission(PermissionError::WrongUser { expected, .. }) => vec![
                format!("Re-run as the '{}' user: sudo -iu {}", expected, expected),
            ],
            UpgradeError::Resource(ResourceError::InsufficientDiskSpace { path, .. }) => vec![
                format!("Free space on the filesystem holding {}", path.display()),
                "Point backup.directory at a larger volume".to_string(),
            ],
            UpgradeError::Workflow(WorkflowError::Aborted { step, .. }) => vec![format!(
                "Nothing after '{}' was executed; re-run when ready",
                step
            )],
            UpgradeError::Workflow(WorkflowError::BuildRetryExhausted { .. }) => vec![
                "Run the build by hand to see the full output: bundle install && yarn install"
                    .to_string(),
            ],
            UpgradeError::Workflow(WorkflowError::ServicesNotRunning { services }) => services
                .iter()
                .map(|s| format!("Inspect logs: journalctl -u {} -n 100", s))
                .collect(),
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_abort_exits_with_two() {
        let err = UpgradeError::aborted(WorkflowStep::MigrationChecked, "declined");
        assert_eq!(err.kind(), ErrorKind::Aborted);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn conflicts_are_classified_separately_from_git_failures() {
        let conflict = UpgradeError::Git(GitError::UnresolvedConflicts {
            paths: vec!["app/models/status.rb".to_string()],
        });
        let failure = UpgradeError::Git(GitError::CommandFailed {
            operation: "fetch".to_string(),
            reason: "timeout".to_string(),
        });
        assert_eq!(conflict.kind(), ErrorKind::ConflictDetected);
        assert_eq!(failure.kind(), ErrorKind::ExternalCommandFailed);
        assert_eq!(failure.exit_code(), 1);
    }

    #[test]
    fn non_zero_exit_message_shows_last_stderr_line() {
        let err = CommandError::NonZeroExit {
            command: "bundle install".to_string(),
            code: Some(5),
            stderr: "Fetching gems\nincompatible library version\n\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "'bundle install' exited with status 5: incompatible library version"
        );
    }
}
