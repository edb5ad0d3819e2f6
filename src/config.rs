//! Upgrade configuration.
//!
//! Loaded from a TOML file (default `<config dir>/mastodon_upgrade/config.toml`),
//! then overridden by `MASTODON_UPGRADE_*` environment variables. Every field
//! has a default matching a standard Mastodon installation, so the file may
//! be absent.

use crate::error::{ConfigError, Result};
use crate::git::RemoteIdentifiers;
use crate::version::DEFAULT_PRERELEASE_MARKERS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "MASTODON_UPGRADE_";

/// Complete configuration for an upgrade run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpgradeConfig {
    /// Mastodon checkout
    pub working_dir: PathBuf,
    /// `RAILS_ENV` for every rails/tootctl invocation
    pub rails_env: String,
    /// Account the upgrade must run as, if any
    pub required_user: Option<String>,
    /// Base URL of the instance, used to read the running version
    pub instance_url: Option<String>,
    /// Upgrade history file; defaults to `<working_dir>/log/upgrade_history.log`
    pub history_file: Option<PathBuf>,
    /// Remote detection and branch naming
    pub remotes: RemoteSettings,
    /// Target version detection
    pub versions: VersionSettings,
    /// Build failure recognition
    pub build: BuildSettings,
    /// Backup before upgrading
    pub backup: BackupSettings,
    /// Search index rebuild
    pub search: SearchSettings,
    /// Services to restart
    pub services: ServiceSettings,
}

/// Remote detection and branch naming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteSettings {
    /// Substring of the fork URL, e.g. `alice/mastodon`
    pub fork_identifier: Option<String>,
    /// Substrings of the upstream URL
    pub upstream_identifiers: Vec<String>,
    /// Upstream main line
    pub main_branch: String,
    /// Branch (on the fork remote) holding local customizations
    pub customization_branch: Option<String>,
    /// Prefix for the branch created for each upgrade
    pub upgrade_branch_prefix: String,
    /// Offer to push the upgrade branch to the fork
    pub push_upgrade_branch: bool,
}

/// Target version detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersionSettings {
    /// Tags containing any of these are ignored
    pub prerelease_markers: Vec<String>,
    /// Prefix of upstream maintenance branches
    pub stable_branch_prefix: String,
}

/// A build failure the operator can fix by hand
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildFailurePattern {
    /// Regex matched against build stderr
    pub pattern: String,
    /// What the operator should do before retrying
    pub remediation: String,
}

/// Build failure recognition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
    /// Recognized failures, tried in order
    pub failure_patterns: Vec<BuildFailurePattern>,
}

/// Backup before upgrading
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupSettings {
    /// Where dumps are written
    pub directory: PathBuf,
    /// PostgreSQL database name
    pub database: String,
    /// Minimum free bytes on the backup filesystem
    pub min_free_bytes: u64,
}

/// Search index rebuild
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    /// Instance runs Elasticsearch/OpenSearch
    pub enabled: bool,
    /// Indices to rebuild, in order
    pub entities: Vec<String>,
    /// Worker concurrency passed to the index tool
    pub concurrency: usize,
    /// Batch size passed to the index tool
    pub batch_size: usize,
}

/// Services to restart, grouped by restart order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceSettings {
    /// Background workers, restarted first
    pub workers: Vec<String>,
    /// Web processes
    pub web: Vec<String>,
    /// Streaming processes, restarted last
    pub streaming: Vec<String>,
    /// Journal lines shown after the restart
    pub log_tail_lines: usize,
    /// Upper bound for reading the journal
    pub log_tail_timeout_secs: u64,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("/home/mastodon/live"),
            rails_env: "production".to_string(),
            required_user: None,
            instance_url: None,
            history_file: None,
            remotes: RemoteSettings::default(),
            versions: VersionSettings::default(),
            build: BuildSettings::default(),
            backup: BackupSettings::default(),
            search: SearchSettings::default(),
            services: ServiceSettings::default(),
        }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            fork_identifier: None,
            upstream_identifiers: vec![
                "mastodon/mastodon".to_string(),
                "tootsuite/mastodon".to_string(),
            ],
            main_branch: "main".to_string(),
            customization_branch: None,
            upgrade_branch_prefix: "upgrade-".to_string(),
            push_upgrade_branch: true,
        }
    }
}

impl Default for VersionSettings {
    fn default() -> Self {
        Self {
            prerelease_markers: DEFAULT_PRERELEASE_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            stable_branch_prefix: "stable-".to_string(),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            failure_patterns: vec![
                BuildFailurePattern {
                    pattern: r"incompatible library version".to_string(),
                    remediation: "A native gem was built against another library version. \
                                  Run `bundle pristine` (or reinstall the gem named above), then retry."
                        .to_string(),
                },
                BuildFailurePattern {
                    pattern: r"Your Ruby version is \S+, but your Gemfile specified \S+".to_string(),
                    remediation: "Install the Ruby version from .ruby-version \
                                  (`rbenv install`), then retry."
                        .to_string(),
                },
                BuildFailurePattern {
                    pattern: r"ERR_OSSL_EVP_UNSUPPORTED".to_string(),
                    remediation: "Node.js needs the legacy OpenSSL provider: \
                                  export NODE_OPTIONS=--openssl-legacy-provider, then retry."
                        .to_string(),
                },
                BuildFailurePattern {
                    pattern: r"The engine .node. is incompatible with this module".to_string(),
                    remediation: "Upgrade Node.js to the version required by package.json, then retry."
                        .to_string(),
                },
            ],
        }
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/home/mastodon/backups"),
            database: "mastodon_production".to_string(),
            min_free_bytes: 5 * 1024 * 1024 * 1024,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            entities: vec![
                "accounts".to_string(),
                "tags".to_string(),
                "statuses".to_string(),
                "public_statuses".to_string(),
            ],
            concurrency: num_cpus::get().max(1),
            batch_size: 100,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            workers: vec!["mastodon-sidekiq".to_string()],
            web: vec!["mastodon-web".to_string()],
            streaming: vec!["mastodon-streaming".to_string()],
            log_tail_lines: 20,
            log_tail_timeout_secs: 10,
        }
    }
}

impl ServiceSettings {
    /// Workers, then web, then streaming
    pub fn restart_order(&self) -> Vec<String> {
        self.workers
            .iter()
            .chain(&self.web)
            .chain(&self.streaming)
            .cloned()
            .collect()
    }

    /// Timeout for the journal tail
    pub fn log_tail_timeout(&self) -> Duration {
        Duration::from_secs(self.log_tail_timeout_secs)
    }
}

impl UpgradeConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mastodon_upgrade").join("config.toml"))
    }

    /// Load from `path`, or from the default location when it exists,
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(explicit) => Self::from_file(explicit)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(found) => Self::from_file(&found)?,
                None => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    fn from_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|source| {
            ConfigError::ParseFailed {
                path: path.to_path_buf(),
                source,
            }
            .into()
        })
    }

    /// Apply `MASTODON_UPGRADE_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.is_empty());

        if let Some(dir) = var("WORKING_DIR") {
            self.working_dir = PathBuf::from(dir);
        }
        if let Some(env) = var("RAILS_ENV") {
            self.rails_env = env;
        }
        if let Some(fork) = var("FORK") {
            self.remotes.fork_identifier = Some(fork);
        }
        if let Some(branch) = var("CUSTOMIZATION_BRANCH") {
            self.remotes.customization_branch = Some(branch);
        }
        if let Some(url) = var("INSTANCE_URL") {
            self.instance_url = Some(url);
        }
        if let Some(user) = var("REQUIRED_USER") {
            self.required_user = Some(user);
        }
        if let Some(enabled) = var("SEARCH").and_then(|v| parse_bool(&v)) {
            self.search.enabled = enabled;
        }
        if let Some(concurrency) = var("SEARCH_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.search.concurrency = concurrency;
        }
    }

    /// Reject settings the workflow cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.services.restart_order().is_empty() {
            return Err(invalid("services", "at least one service must be configured"));
        }
        if self.remotes.upstream_identifiers.iter().all(|id| id.is_empty()) {
            return Err(ConfigError::Missing {
                field: "remotes.upstream_identifiers".to_string(),
                hint: "Add a substring of the upstream repository URL, e.g. \"mastodon/mastodon\"."
                    .to_string(),
            }
            .into());
        }
        if self.remotes.upgrade_branch_prefix.trim().is_empty() {
            return Err(invalid("remotes.upgrade_branch_prefix", "must not be empty"));
        }
        if self.search.enabled {
            if self.search.batch_size == 0 {
                return Err(invalid("search.batch_size", "must be greater than zero"));
            }
            if self.search.concurrency == 0 {
                return Err(invalid("search.concurrency", "must be greater than zero"));
            }
        }
        for failure in &self.build.failure_patterns {
            regex::Regex::new(&failure.pattern)
                .map_err(|e| invalid("build.failure_patterns", &e.to_string()))?;
        }
        if let Some(raw) = &self.instance_url {
            let parsed = url::Url::parse(raw).map_err(|e| invalid("instance_url", &e.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(invalid("instance_url", "scheme must be http or https"));
            }
        }
        Ok(())
    }

    /// Fork/upstream identifiers for the remote classifier
    pub fn remote_identifiers(&self) -> RemoteIdentifiers {
        RemoteIdentifiers {
            fork: self.remotes.fork_identifier.clone(),
            upstream: self.remotes.upstream_identifiers.clone(),
        }
    }

    /// Resolved history file path
    pub fn history_path(&self) -> PathBuf {
        self.history_file
            .clone()
            .unwrap_or_else(|| self.working_dir.join("log").join("upgrade_history.log"))
    }
}

fn invalid(field: &str, reason: &str) -> crate::error::UpgradeError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
