//! Announce, backup, remote detection, target selection and checkout.

use super::{UpgradeEngine, WorkflowStep};
use crate::error::{
    ConfigError, DetectionError, GitError, RemoteRole, ResourceError, Result, UpgradeError,
};
use crate::git::{GitOperations, MergeOutcome, RemoteClassification, classify_remotes};
use crate::operator::{ConflictResolution, NoticeLevel, Operator, TargetChoice};
use crate::state::{CustomizationStatus, WorkflowState};
use crate::system::{BackupTool, InstanceStatus, Toolbox};
use crate::version::{TargetRef, latest_prefixed_branch, latest_stable_tag};

impl<T: Toolbox, O: Operator> UpgradeEngine<'_, T, O> {
    pub(super) async fn announce(&self, state: &mut WorkflowState) -> Result<()> {
        self.transition(state, WorkflowStep::Announce)?;

        let git = self.tools.git();
        let branch = git.current_branch().await?;
        state.original_branch = Some(if branch == "HEAD" {
            git.head_commit().await?
        } else {
            branch.clone()
        });
        let from = match self.tools.instance().current_version().await {
            Ok(version) => Some(version),
            Err(e) => {
                log::warn!("Could not read the running version: {}", e);
                self.operator
                    .provide_text("Version currently running (e.g. v4.1.9)")?
            }
        };
        let from = from.unwrap_or_else(|| "unknown".to_string());

        self.notify(
            NoticeLevel::Info,
            &format!(
                "Upgrading {} (branch '{}', running {})",
                self.config.working_dir.display(),
                branch,
                from
            ),
        );
        self.notify(
            NoticeLevel::Info,
            "Plan: backup, fetch upstream, pick target, branch and merge customizations, \
             build, migrate, clear cache, reindex search, restart services, verify",
        );
        state.from_version = Some(from);
        Ok(())
    }

    pub(super) async fn backup(&self, state: &mut WorkflowState) -> Result<()> {
        let step = WorkflowStep::BackupPending;
        let settings = &self.config.backup;
        let backup = self.tools.backup();

        match backup.available_space(&settings.directory).await {
            Ok(available) if available < settings.min_free_bytes => {
                let shortage = ResourceError::InsufficientDiskSpace {
                    path: settings.directory.clone(),
                    available_bytes: available,
                    required_bytes: settings.min_free_bytes,
                };
                self.notify(NoticeLevel::Warning, &shortage.to_string());
                return self.continue_without_backup(state, "not enough free space");
            }
            Ok(available) => log::debug!("{} bytes free for the backup", available),
            Err(e) => log::warn!("Free space check failed, continuing: {}", e),
        }

        let question = format!(
            "Dump database '{}' to {} before upgrading?",
            settings.database,
            settings.directory.display()
        );
        if !self.ask(state, step, &question)? {
            return self.continue_without_backup(state, "backup declined");
        }

        self.transition(state, step)?;
        let file = backup.create_backup(&settings.directory).await?;
        self.notify(
            NoticeLevel::Success,
            &format!("Database dumped to {}", file.display()),
        );
        state.backup_file = Some(file);
        Ok(())
    }

    fn continue_without_backup(&self, state: &mut WorkflowState, why: &str) -> Result<()> {
        let step = WorkflowStep::BackupPending;
        if self
            .operator
            .confirm(step, "Continue the upgrade WITHOUT a database backup?")?
        {
            self.skip(state, step, why);
            Ok(())
        } else {
            Err(UpgradeError::aborted(step, why))
        }
    }

    pub(super) async fn detect_remotes(&self, state: &mut WorkflowState) -> Result<()> {
        let git = self.tools.git();
        let entries = git.list_remotes().await?;
        let mut known: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        known.sort();
        known.dedup();

        let classified = classify_remotes(&entries, &self.config.remote_identifiers());
        let upstream = match classified.upstream {
            Some(name) => name,
            None => self.ask_remote(
                RemoteRole::Upstream,
                &known,
                classified.fork.as_deref(),
                "remotes.upstream_identifiers",
            )?,
        };
        let fork = match classified.fork {
            Some(name) => Some(name),
            None if self.config.remotes.fork_identifier.is_some() => Some(self.ask_remote(
                RemoteRole::Fork,
                &known,
                Some(&upstream),
                "remotes.fork_identifier",
            )?),
            None => None,
        };

        self.transition(state, WorkflowStep::RemoteDetected)?;
        state.remotes = RemoteClassification {
            fork: fork.clone(),
            upstream: Some(upstream.clone()),
        };

        git.fetch(&upstream, true).await?;
        if let Some(fork) = &fork {
            git.fetch(fork, false).await?;
        }

        let main_line = format!("{}/{}", upstream, self.config.remotes.main_branch);
        let behind = git.commits_behind("HEAD", &main_line).await?;
        state.commits_behind = Some(behind);

        let message = match &fork {
            Some(fork) => format!("Upstream '{}', fork '{}'; {} commits behind {}", upstream, fork, behind, main_line),
            None => format!("Upstream '{}'; {} commits behind {}", upstream, behind, main_line),
        };
        self.notify(NoticeLevel::Info, &message);
        Ok(())
    }

    /// Ask for a remote name; `taken` is the remote already assigned to the other role
    fn ask_remote(
        &self,
        role: RemoteRole,
        known: &[String],
        taken: Option<&str>,
        field: &str,
    ) -> Result<String> {
        self.notify(
            NoticeLevel::Warning,
            &format!(
                "Could not identify the {} remote among: {}",
                role,
                known.join(", ")
            ),
        );
        match self
            .operator
            .provide_text(&format!("Name of the {} remote", role))?
        {
            Some(name) if taken == Some(name.as_str()) => {
                self.notify(
                    NoticeLevel::Error,
                    &format!("'{}' is already the {} remote", name, role.other()),
                );
                Err(DetectionError::RemoteNotFound { role }.into())
            }
            Some(name) if known.contains(&name) => Ok(name),
            Some(name) => {
                log::warn!("'{}' is not a configured remote", name);
                Err(DetectionError::RemoteNotFound { role }.into())
            }
            None => Err(ConfigError::Missing {
                field: field.to_string(),
                hint: format!("a substring of the {} remote URL", role),
            }
            .into()),
        }
    }

    pub(super) fn upstream_remote(&self, state: &WorkflowState) -> Result<String> {
        state.remotes.upstream.clone().ok_or_else(|| {
            DetectionError::RemoteNotFound {
                role: RemoteRole::Upstream,
            }
            .into()
        })
    }

    pub(super) async fn select_version(&self, state: &mut WorkflowState) -> Result<TargetRef> {
        let upstream = self.upstream_remote(state)?;

        let target = match &self.target_override {
            Some(target) => {
                self.notify(
                    NoticeLevel::Info,
                    &format!("Using {} from the command line", target),
                );
                target.clone()
            }
            None => {
                let detected = self.detect_target(&upstream).await?;
                match self.operator.choose_target(detected.as_ref())? {
                    TargetChoice::UseDetected => {
                        detected.ok_or(DetectionError::NoStableTag { considered: 0 })?
                    }
                    TargetChoice::Target(target) => target,
                    TargetChoice::Abort => {
                        return Err(UpgradeError::aborted(
                            WorkflowStep::VersionSelected,
                            "no upgrade target chosen",
                        ));
                    }
                }
            }
        };

        let start = target.start_point(&upstream, &self.config.remotes.main_branch);
        if !self.tools.git().ref_exists(&start).await? {
            return Err(GitError::RefNotFound { reference: start }.into());
        }

        self.transition(state, WorkflowStep::VersionSelected)?;
        self.notify(NoticeLevel::Success, &format!("Upgrading to {}", target));
        state.target = Some(target.clone());
        Ok(target)
    }

    /// Newest stable tag, else newest stable branch, else nothing
    async fn detect_target(&self, upstream: &str) -> Result<Option<TargetRef>> {
        let git = self.tools.git();

        let tags = git.list_tags().await?;
        match latest_stable_tag(&tags, &self.config.versions.prerelease_markers) {
            Ok(tag) => return Ok(Some(TargetRef::Tag(tag.raw))),
            Err(e) => log::warn!("{}", e),
        }

        let branches = git.list_remote_branches(upstream).await?;
        match latest_prefixed_branch(&branches, &self.config.versions.stable_branch_prefix) {
            Ok(branch) => Ok(Some(TargetRef::Branch(branch))),
            Err(e) => {
                log::warn!("{}", e);
                Ok(None)
            }
        }
    }

    pub(super) async fn sync(&self, state: &mut WorkflowState, target: &TargetRef) -> Result<()> {
        let step = WorkflowStep::Synced;
        let git = self.tools.git();
        let upstream = self.upstream_remote(state)?;
        let start = target.start_point(&upstream, &self.config.remotes.main_branch);
        let branch = format!("{}{}", self.config.remotes.upgrade_branch_prefix, target.label());
        let customizations = self.customization_ref(state);

        let leftover = git.unmerged_paths().await?;
        if !leftover.is_empty() {
            return Err(GitError::UnresolvedConflicts { paths: leftover }.into());
        }

        let question = match &customizations {
            Some(reference) => format!(
                "Create branch '{}' from {} and merge {} into it?",
                branch, start, reference
            ),
            None => format!("Create branch '{}' from {}?", branch, start),
        };
        if !self.ask(state, step, &question)? {
            return Err(UpgradeError::aborted(step, "checkout declined"));
        }
        self.transition(state, step)?;

        match git.create_branch(&branch, &start).await {
            Ok(()) => {}
            Err(UpgradeError::Git(GitError::BranchExists { .. })) => {
                let reuse = self.operator.confirm(
                    step,
                    &format!("Branch '{}' already exists. Check it out and continue?", branch),
                )?;
                if !reuse {
                    return Err(UpgradeError::aborted(
                        step,
                        format!("branch '{}' already exists", branch),
                    ));
                }
                git.checkout(&branch).await?;
            }
            Err(e) => return Err(e),
        }
        state.upgrade_branch = Some(branch.clone());

        if let Err(e) = self.prepare_branch(state, &branch, customizations).await {
            self.restore_original_branch(state).await;
            return Err(e);
        }

        self.notify(NoticeLevel::Success, &format!("Checked out '{}'", branch));
        Ok(())
    }

    async fn prepare_branch(
        &self,
        state: &mut WorkflowState,
        branch: &str,
        customizations: Option<String>,
    ) -> Result<()> {
        state.upstream_commit = Some(self.tools.git().head_commit().await?);
        if let Some(reference) = customizations {
            self.merge_customizations(state, &reference).await?;
        }
        self.push_branch(state, branch).await
    }

    /// Best effort: abandon any merge and check out the branch the run started on
    async fn restore_original_branch(&self, state: &WorkflowState) {
        let Some(original) = &state.original_branch else {
            return;
        };
        let git = self.tools.git();

        match git.unmerged_paths().await {
            Ok(paths) if !paths.is_empty() => {
                if let Err(e) = git.merge_abort().await {
                    log::warn!("git merge --abort failed: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => log::warn!("Could not list unmerged paths: {}", e),
        }

        match git.checkout(original).await {
            Ok(()) => self.notify(
                NoticeLevel::Info,
                &format!("Checked out '{}' again", original),
            ),
            Err(e) => self.notify(
                NoticeLevel::Warning,
                &format!("Could not return to '{}': {}", original, e),
            ),
        }
    }

    /// `<fork>/<branch>` when a fork remote exists, else the local branch
    fn customization_ref(&self, state: &WorkflowState) -> Option<String> {
        let branch = self.config.remotes.customization_branch.as_ref()?;
        Some(match &state.remotes.fork {
            Some(fork) => format!("{}/{}", fork, branch),
            None => branch.clone(),
        })
    }

    async fn merge_customizations(&self, state: &mut WorkflowState, reference: &str) -> Result<()> {
        let git = self.tools.git();

        let mut paths = match git.merge(reference).await? {
            MergeOutcome::Clean => {
                state.customizations = CustomizationStatus::Merged;
                self.notify(NoticeLevel::Success, &format!("Merged {}", reference));
                return Ok(());
            }
            MergeOutcome::Conflicted { paths } => paths,
        };

        self.transition(state, WorkflowStep::MergeConflict)?;
        loop {
            match self.operator.resolve_conflict(reference, &paths)? {
                ConflictResolution::ResolvedManually => {
                    let remaining = git.unmerged_paths().await?;
                    if remaining.is_empty() {
                        git.commit_merge().await?;
                        state.customizations = CustomizationStatus::MergedManually;
                        break;
                    }
                    self.notify(
                        NoticeLevel::Warning,
                        &format!("{} file(s) still have conflicts", remaining.len()),
                    );
                    paths = remaining;
                }
                ConflictResolution::SkipCustomizations => {
                    git.merge_abort().await?;
                    state.customizations = CustomizationStatus::Skipped;
                    self.notify(
                        NoticeLevel::Warning,
                        &format!(
                            "Merge of {} abandoned; continuing with upstream code only",
                            reference
                        ),
                    );
                    break;
                }
                ConflictResolution::AbortWorkflow => {
                    git.merge_abort().await?;
                    return Err(UpgradeError::aborted(
                        WorkflowStep::MergeConflict,
                        format!("merge of {} abandoned", reference),
                    ));
                }
            }
        }

        self.transition(state, WorkflowStep::Synced)
    }

    async fn push_branch(&self, state: &WorkflowState, branch: &str) -> Result<()> {
        let Some(fork) = &state.remotes.fork else {
            return Ok(());
        };
        if !self.config.remotes.push_upgrade_branch {
            return Ok(());
        }

        let question = format!("Push '{}' to '{}'?", branch, fork);
        if self.operator.confirm(WorkflowStep::Synced, &question)? {
            self.tools.git().push(fork, branch).await?;
            self.notify(NoticeLevel::Success, &format!("Pushed '{}' to '{}'", branch, fork));
        } else {
            log::info!("Upgrade branch not pushed");
        }
        Ok(())
    }
}
