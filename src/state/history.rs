//! Append-only history of completed upgrades.

use crate::error::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One completed upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeLogEntry {
    /// Completion time
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Version before the upgrade
    pub from_version: String,
    /// Version after the upgrade
    pub to_version: String,
    /// Upstream commits the old branch was missing
    pub commits_behind: usize,
}

impl UpgradeLogEntry {
    /// Entry stamped now
    pub fn now(from_version: impl Into<String>, to_version: impl Into<String>, commits_behind: usize) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            from_version: from_version.into(),
            to_version: to_version.into(),
            commits_behind,
        }
    }

    /// The line written to the history file, without newline
    pub fn to_line(&self) -> String {
        format!(
            "{} upgraded from {} to {} ({} commits behind)",
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.from_version,
            self.to_version,
            self.commits_behind
        )
    }
}

/// Writer for the history file
#[derive(Debug, Clone)]
pub struct UpgradeHistory {
    path: PathBuf,
}

impl UpgradeHistory {
    /// History stored at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// File location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line, creating the file and its directory as needed
    pub fn append(&self, entry: &UpgradeLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.to_line())?;
        log::info!("Recorded upgrade in {}", self.path.display());
        Ok(())
    }
}
