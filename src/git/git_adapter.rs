//! [`GitOperations`] backed by the `git` binary.

use crate::error::{GitError, Result, UpgradeError};
use crate::git::{GitOperations, MergeOutcome, RemoteEntry, parse_remote_listing};
use crate::system::ExternalCommand;
use std::path::{Path, PathBuf};

/// Git operations executed through the `git` command line
#[derive(Debug, Clone)]
pub struct GitCli {
    work_dir: PathBuf,
}

impl GitCli {
    /// Operate on the repository at `work_dir`
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
        }
    }

    /// Repository directory
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn command<I, S>(&self, args: I) -> ExternalCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExternalCommand::new("git")
            .args(args)
            .current_dir(&self.work_dir)
    }

    async fn run<I, S>(&self, operation: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command(args)
            .run()
            .await
            .map_err(|e| git_failure(operation, e))
    }
}

fn git_failure(operation: &str, error: UpgradeError) -> UpgradeError {
    let reason = match &error {
        UpgradeError::Command(cmd) => cmd
            .stderr()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| cmd.to_string()),
        other => other.to_string(),
    };
    GitError::CommandFailed {
        operation: operation.to_string(),
        reason,
    }
    .into()
}

fn non_empty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Strip `remote/` from `git branch -r` names, dropping the `HEAD` alias.
fn remote_branch_names(output: &str, remote: &str) -> Vec<String> {
    let prefix = format!("{}/", remote);
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.contains("->"))
        .filter_map(|l| l.strip_prefix(&prefix))
        .filter(|name| *name != "HEAD")
        .map(str::to_string)
        .collect()
}

impl GitOperations for GitCli {
    async fn is_repository(&self) -> Result<bool> {
        let output = self
            .command(["rev-parse", "--is-inside-work-tree"])
            .output()
            .await?;
        Ok(output.success() && output.stdout.trim() == "true")
    }

    async fn list_remotes(&self) -> Result<Vec<RemoteEntry>> {
        let out = self.run("remote", ["remote", "-v"]).await?;
        Ok(parse_remote_listing(&out))
    }

    async fn fetch(&self, remote: &str, tags: bool) -> Result<()> {
        let mut args = vec!["fetch", remote];
        if tags {
            args.push("--tags");
        }
        self.run("fetch", args).await.map(drop)
    }

    async fn current_branch(&self) -> Result<String> {
        let out = self
            .run("rev-parse", ["rev-parse", "--abbrev-ref", "HEAD"])
            .await?;
        Ok(out.trim().to_string())
    }

    async fn head_commit(&self) -> Result<String> {
        let out = self.run("rev-parse", ["rev-parse", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }

    async fn ref_exists(&self, reference: &str) -> Result<bool> {
        let output = self
            .command([
                "rev-parse".to_string(),
                "--verify".to_string(),
                "--quiet".to_string(),
                format!("{}^{{commit}}", reference),
            ])
            .output()
            .await?;
        Ok(output.success())
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        let out = self.run("tag", ["tag", "--list"]).await?;
        Ok(non_empty_lines(&out))
    }

    async fn list_remote_branches(&self, remote: &str) -> Result<Vec<String>> {
        let out = self.run("branch", ["branch", "-r", "--list"]).await?;
        Ok(remote_branch_names(&out, remote))
    }

    async fn commits_behind(&self, base: &str, upstream: &str) -> Result<usize> {
        let range = format!("{}..{}", base, upstream);
        let out = self.run("rev-list", ["rev-list", "--count", range.as_str()]).await?;
        out.trim().parse::<usize>().map_err(|_| {
            UpgradeError::from(GitError::CommandFailed {
                operation: "rev-list".to_string(),
                reason: format!("unexpected count output '{}'", out.trim()),
            })
        })
    }

    async fn create_branch(&self, name: &str, start_point: &str) -> Result<()> {
        if self.ref_exists(&format!("refs/heads/{}", name)).await? {
            return Err(GitError::BranchExists {
                branch: name.to_string(),
            }
            .into());
        }
        self.run("checkout", ["checkout", "-b", name, start_point])
            .await
            .map(drop)
    }

    async fn checkout(&self, reference: &str) -> Result<()> {
        self.run("checkout", ["checkout", reference]).await.map(drop)
    }

    async fn merge(&self, reference: &str) -> Result<MergeOutcome> {
        let output = self
            .command(["merge", "--no-edit", reference])
            .output()
            .await?;
        if output.success() {
            return Ok(MergeOutcome::Clean);
        }

        let paths = self.unmerged_paths().await?;
        if paths.is_empty() {
            return Err(GitError::CommandFailed {
                operation: "merge".to_string(),
                reason: output.stderr.trim().to_string(),
            }
            .into());
        }
        log::warn!("Merge of {} stopped with {} conflict(s)", reference, paths.len());
        Ok(MergeOutcome::Conflicted { paths })
    }

    async fn merge_abort(&self) -> Result<()> {
        self.run("merge --abort", ["merge", "--abort"]).await.map(drop)
    }

    async fn unmerged_paths(&self) -> Result<Vec<String>> {
        let out = self
            .run("diff", ["diff", "--name-only", "--diff-filter=U"])
            .await?;
        Ok(non_empty_lines(&out))
    }

    async fn commit_merge(&self) -> Result<()> {
        self.run("commit", ["commit", "--no-edit"]).await.map(drop)
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run("push", ["push", "--set-upstream", remote, branch])
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_branch_names_strip_prefix_and_head_alias() {
        let output = "  upstream/HEAD -> upstream/main\n  upstream/main\n  upstream/stable-4.2\n  origin/custom\n";
        assert_eq!(
            remote_branch_names(output, "upstream"),
            vec!["main".to_string(), "stable-4.2".to_string()]
        );
    }

    #[test]
    fn non_empty_lines_trims() {
        assert_eq!(non_empty_lines("v4.1.0\n\n  v4.2.0 \n"), vec!["v4.1.0", "v4.2.0"]);
    }
}
