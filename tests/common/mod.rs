//! In-memory collaborators for driving the upgrade engine in tests.

#![allow(dead_code)]

use mastodon_upgrade::error::{CommandError, DetectionError, GitError, Result, UpgradeError};
use mastodon_upgrade::git::{GitOperations, MergeOutcome, RemoteEntry};
use mastodon_upgrade::system::{
    BackupTool, BuildToolchain, CacheTool, InstanceStatus, MigrationTool, PendingMigration,
    SearchIndexer, ServiceManager, Toolbox,
};
use mastodon_upgrade::UpgradeConfig;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered record of every side effect the fakes performed
pub type Journal = Arc<Mutex<Vec<String>>>;

fn record(journal: &Journal, entry: impl Into<String>) {
    journal.lock().unwrap().push(entry.into());
}

pub const UPSTREAM_URL: &str = "https://github.com/mastodon/mastodon.git";
pub const FORK_URL: &str = "git@github.com:example/mastodon.git";
pub const UPSTREAM_COMMIT: &str = "aaaa111";

/// Repository model behind [`FakeGit`]
#[derive(Debug)]
pub struct GitModel {
    pub remotes: Vec<RemoteEntry>,
    pub tags: Vec<String>,
    pub remote_branches: Vec<String>,
    /// Resolvable refs and the commit each points at
    pub refs: BTreeMap<String, String>,
    /// Local branches
    pub branches: BTreeMap<String, String>,
    pub current_branch: String,
    pub head: String,
    pub commits_behind: usize,
    /// Paths reported when merging, `None` for a clean merge
    pub conflicts: Option<Vec<String>>,
    /// Answers to successive `unmerged_paths` calls while merging; empty once exhausted
    pub unmerged: VecDeque<Vec<String>>,
    pub merging: bool,
}

impl Default for GitModel {
    fn default() -> Self {
        let mut refs = BTreeMap::new();
        refs.insert("v4.1.9".to_string(), "old0000".to_string());
        refs.insert("v4.2.0".to_string(), UPSTREAM_COMMIT.to_string());
        refs.insert("upstream/main".to_string(), "main000".to_string());
        refs.insert("upstream/stable-4.2".to_string(), "stable42".to_string());
        refs.insert("origin/custom".to_string(), "custom0".to_string());

        let mut branches = BTreeMap::new();
        branches.insert("custom".to_string(), "custom0".to_string());

        Self {
            remotes: vec![
                RemoteEntry::fetch("origin", FORK_URL),
                RemoteEntry::push("origin", FORK_URL),
                RemoteEntry::fetch("upstream", UPSTREAM_URL),
                RemoteEntry::push("upstream", UPSTREAM_URL),
            ],
            tags: vec!["v4.1.9".into(), "v4.2.0".into(), "v4.3.0-rc1".into()],
            remote_branches: vec!["main".into(), "stable-4.2".into()],
            refs,
            branches,
            current_branch: "custom".to_string(),
            head: "custom0".to_string(),
            commits_behind: 42,
            conflicts: None,
            unmerged: VecDeque::new(),
            merging: false,
        }
    }
}

#[derive(Debug)]
pub struct FakeGit {
    pub model: Mutex<GitModel>,
    journal: Journal,
}

impl GitOperations for FakeGit {
    async fn is_repository(&self) -> Result<bool> {
        Ok(true)
    }

    async fn list_remotes(&self) -> Result<Vec<RemoteEntry>> {
        Ok(self.model.lock().unwrap().remotes.clone())
    }

    async fn fetch(&self, remote: &str, tags: bool) -> Result<()> {
        let suffix = if tags { " --tags" } else { "" };
        record(&self.journal, format!("git fetch {}{}", remote, suffix));
        Ok(())
    }

    async fn current_branch(&self) -> Result<String> {
        Ok(self.model.lock().unwrap().current_branch.clone())
    }

    async fn head_commit(&self) -> Result<String> {
        Ok(self.model.lock().unwrap().head.clone())
    }

    async fn ref_exists(&self, reference: &str) -> Result<bool> {
        let model = self.model.lock().unwrap();
        Ok(model.refs.contains_key(reference) || model.branches.contains_key(reference))
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        Ok(self.model.lock().unwrap().tags.clone())
    }

    async fn list_remote_branches(&self, _remote: &str) -> Result<Vec<String>> {
        Ok(self.model.lock().unwrap().remote_branches.clone())
    }

    async fn commits_behind(&self, _base: &str, _upstream: &str) -> Result<usize> {
        Ok(self.model.lock().unwrap().commits_behind)
    }

    async fn create_branch(&self, name: &str, start_point: &str) -> Result<()> {
        let mut model = self.model.lock().unwrap();
        if model.branches.contains_key(name) {
            return Err(GitError::BranchExists {
                branch: name.to_string(),
            }
            .into());
        }
        let commit = model
            .refs
            .get(start_point)
            .cloned()
            .ok_or_else(|| GitError::RefNotFound {
                reference: start_point.to_string(),
            })?;
        model.branches.insert(name.to_string(), commit.clone());
        model.current_branch = name.to_string();
        model.head = commit;
        record(&self.journal, format!("git checkout -b {} {}", name, start_point));
        Ok(())
    }

    async fn checkout(&self, reference: &str) -> Result<()> {
        let mut model = self.model.lock().unwrap();
        let commit = model
            .branches
            .get(reference)
            .cloned()
            .ok_or_else(|| GitError::RefNotFound {
                reference: reference.to_string(),
            })?;
        model.current_branch = reference.to_string();
        model.head = commit;
        record(&self.journal, format!("git checkout {}", reference));
        Ok(())
    }

    async fn merge(&self, reference: &str) -> Result<MergeOutcome> {
        record(&self.journal, format!("git merge {}", reference));
        let mut model = self.model.lock().unwrap();
        match model.conflicts.clone() {
            Some(paths) => {
                model.merging = true;
                Ok(MergeOutcome::Conflicted { paths })
            }
            None => {
                let merged = format!("merge-of-{}", reference);
                let branch = model.current_branch.clone();
                model.branches.insert(branch, merged.clone());
                model.head = merged;
                Ok(MergeOutcome::Clean)
            }
        }
    }

    async fn merge_abort(&self) -> Result<()> {
        record(&self.journal, "git merge --abort");
        self.model.lock().unwrap().merging = false;
        Ok(())
    }

    async fn unmerged_paths(&self) -> Result<Vec<String>> {
        let mut model = self.model.lock().unwrap();
        if !model.merging {
            return Ok(Vec::new());
        }
        Ok(model.unmerged.pop_front().unwrap_or_default())
    }

    async fn commit_merge(&self) -> Result<()> {
        record(&self.journal, "git commit --no-edit");
        let mut model = self.model.lock().unwrap();
        model.merging = false;
        model.head = "resolved-merge".to_string();
        Ok(())
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        record(&self.journal, format!("git push {} {}", remote, branch));
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeBuild {
    /// Stderr of failing attempts, consumed one per build
    pub failures: Mutex<VecDeque<String>>,
    journal: Journal,
}

impl BuildToolchain for FakeBuild {
    async fn install_dependencies(&self) -> Result<()> {
        record(&self.journal, "bundle install");
        match self.failures.lock().unwrap().pop_front() {
            Some(stderr) => Err(CommandError::NonZeroExit {
                command: "bundle install".to_string(),
                code: Some(5),
                stderr,
            }
            .into()),
            None => Ok(()),
        }
    }

    async fn precompile_assets(&self) -> Result<()> {
        record(&self.journal, "assets:precompile");
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeMigrations {
    pub pending: Mutex<Vec<PendingMigration>>,
    journal: Journal,
}

impl MigrationTool for FakeMigrations {
    async fn pending(&self) -> Result<Vec<PendingMigration>> {
        Ok(self.pending.lock().unwrap().clone())
    }

    async fn apply_all(&self) -> Result<()> {
        record(&self.journal, "db:migrate");
        self.pending.lock().unwrap().clear();
        Ok(())
    }

    async fn apply(&self, version: &str) -> Result<()> {
        record(&self.journal, format!("db:migrate:up {}", version));
        self.pending.lock().unwrap().retain(|m| m.version != version);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeServices {
    /// Services reporting inactive during verification
    pub down: Mutex<Vec<String>>,
    /// How long reading the journal takes
    pub log_delay: Mutex<Duration>,
    journal: Journal,
}

impl ServiceManager for FakeServices {
    async fn is_active(&self, service: &str) -> Result<bool> {
        Ok(!self.down.lock().unwrap().iter().any(|s| s == service))
    }

    async fn start(&self, service: &str) -> Result<()> {
        record(&self.journal, format!("start {}", service));
        Ok(())
    }

    async fn stop(&self, service: &str) -> Result<()> {
        record(&self.journal, format!("stop {}", service));
        Ok(())
    }

    async fn restart(&self, service: &str) -> Result<()> {
        record(&self.journal, format!("restart {}", service));
        Ok(())
    }

    async fn tail_logs(&self, service: &str, lines: usize) -> Result<String> {
        let delay = *self.log_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(format!("{} started ({} lines requested)", service, lines))
    }
}

#[derive(Debug)]
pub struct FakeTootctl {
    journal: Journal,
}

impl SearchIndexer for FakeTootctl {
    async fn reset(&self) -> Result<()> {
        record(&self.journal, "search deploy --reset-chewy");
        Ok(())
    }

    async fn rebuild(&self, entity: &str, concurrency: usize, batch_size: usize) -> Result<()> {
        record(
            &self.journal,
            format!("search deploy --only {} -c {} -b {}", entity, concurrency, batch_size),
        );
        Ok(())
    }
}

impl CacheTool for FakeTootctl {
    async fn clear(&self) -> Result<()> {
        record(&self.journal, "cache clear");
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeInstance {
    /// Successive answers; `None` means the API is unreachable
    pub versions: Mutex<VecDeque<Option<String>>>,
}

impl InstanceStatus for FakeInstance {
    async fn current_version(&self) -> Result<String> {
        match self.versions.lock().unwrap().pop_front().flatten() {
            Some(version) => Ok(version),
            None => Err(DetectionError::InstanceVersionUnavailable {
                reason: "connection refused".to_string(),
            }
            .into()),
        }
    }
}

#[derive(Debug)]
pub struct FakeBackup {
    pub free_bytes: Mutex<u64>,
    journal: Journal,
}

impl BackupTool for FakeBackup {
    async fn available_space(&self, _dir: &Path) -> Result<u64> {
        Ok(*self.free_bytes.lock().unwrap())
    }

    async fn create_backup(&self, dir: &Path) -> Result<PathBuf> {
        record(&self.journal, "pg_dump");
        Ok(dir.join("mastodon_production.dump"))
    }
}

/// Every fake, sharing one journal
#[derive(Debug)]
pub struct FakeToolbox {
    pub git: FakeGit,
    pub build: FakeBuild,
    pub migrations: FakeMigrations,
    pub services: FakeServices,
    pub tootctl: FakeTootctl,
    pub instance: FakeInstance,
    pub backup: FakeBackup,
    pub journal: Journal,
}

impl FakeToolbox {
    /// A healthy instance on v4.1.9 with one pending migration
    pub fn new() -> Self {
        let journal: Journal = Arc::default();
        Self {
            git: FakeGit {
                model: Mutex::new(GitModel::default()),
                journal: journal.clone(),
            },
            build: FakeBuild {
                failures: Mutex::new(VecDeque::new()),
                journal: journal.clone(),
            },
            migrations: FakeMigrations {
                pending: Mutex::new(vec![PendingMigration {
                    version: "20240301123000".to_string(),
                    name: "AddIndexToStatuses".to_string(),
                }]),
                journal: journal.clone(),
            },
            services: FakeServices {
                down: Mutex::new(Vec::new()),
                log_delay: Mutex::new(Duration::ZERO),
                journal: journal.clone(),
            },
            tootctl: FakeTootctl {
                journal: journal.clone(),
            },
            instance: FakeInstance {
                versions: Mutex::new(VecDeque::from([
                    Some("4.1.9".to_string()),
                    Some("4.2.0".to_string()),
                ])),
            },
            backup: FakeBackup {
                free_bytes: Mutex::new(u64::MAX),
                journal: journal.clone(),
            },
            journal,
        }
    }

    /// Side effects so far, in order
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    /// Whether any journal entry starts with `prefix`
    pub fn did(&self, prefix: &str) -> bool {
        self.journal().iter().any(|e| e.starts_with(prefix))
    }

    /// Position of the first journal entry equal to `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.journal().iter().position(|e| e == entry)
    }
}

impl Toolbox for FakeToolbox {
    type Git = FakeGit;
    type Build = FakeBuild;
    type Migrations = FakeMigrations;
    type Services = FakeServices;
    type Search = FakeTootctl;
    type Cache = FakeTootctl;
    type Instance = FakeInstance;
    type Backup = FakeBackup;

    fn git(&self) -> &FakeGit {
        &self.git
    }

    fn build(&self) -> &FakeBuild {
        &self.build
    }

    fn migrations(&self) -> &FakeMigrations {
        &self.migrations
    }

    fn services(&self) -> &FakeServices {
        &self.services
    }

    fn search(&self) -> &FakeTootctl {
        &self.tootctl
    }

    fn cache(&self) -> &FakeTootctl {
        &self.tootctl
    }

    fn instance(&self) -> &FakeInstance {
        &self.instance
    }

    fn backup(&self) -> &FakeBackup {
        &self.backup
    }
}

/// Config pointing at `dir`, with a fork and a customization branch
pub fn test_config(dir: &Path) -> UpgradeConfig {
    let mut config = UpgradeConfig::default();
    config.working_dir = dir.to_path_buf();
    config.history_file = Some(dir.join("upgrade_history.log"));
    config.backup.directory = dir.join("backups");
    config.remotes.fork_identifier = Some("example/mastodon".to_string());
    config.remotes.customization_branch = Some("custom".to_string());
    config.search.enabled = true;
    config.search.concurrency = 2;
    config
}

/// Unwrap helper for error assertions
pub fn error_of(outcome: &mastodon_upgrade::UpgradeOutcome) -> &UpgradeError {
    outcome.error.as_ref().expect("run should have failed")
}
