//! Git operations trait and types used by the upgrade workflow.
//!
//! The workflow only talks to version control through [`GitOperations`];
//! [`crate::git::GitCli`] is the production implementation.

use crate::error::Result;
use crate::git::RemoteEntry;
use std::future::Future;

/// Trait defining all Git operations the upgrade workflow needs
pub trait GitOperations {
    /// Whether the working directory is inside a git repository
    fn is_repository(&self) -> impl Future<Output = Result<bool>>;

    /// All remotes as listed by `git remote -v`
    fn list_remotes(&self) -> impl Future<Output = Result<Vec<RemoteEntry>>>;

    /// Fetch a remote, optionally with tags
    fn fetch(&self, remote: &str, tags: bool) -> impl Future<Output = Result<()>>;

    /// Name of the checked-out branch (`HEAD` when detached)
    fn current_branch(&self) -> impl Future<Output = Result<String>>;

    /// Full hash of `HEAD`
    fn head_commit(&self) -> impl Future<Output = Result<String>>;

    /// Whether a reference resolves to a commit
    fn ref_exists(&self, reference: &str) -> impl Future<Output = Result<bool>>;

    /// All local tags
    fn list_tags(&self) -> impl Future<Output = Result<Vec<String>>>;

    /// Branch names on a remote, without the `remote/` prefix
    fn list_remote_branches(&self, remote: &str) -> impl Future<Output = Result<Vec<String>>>;

    /// Number of commits reachable from `upstream` but not from `base`
    fn commits_behind(&self, base: &str, upstream: &str) -> impl Future<Output = Result<usize>>;

    /// Create a branch at `start_point` and check it out
    fn create_branch(&self, name: &str, start_point: &str) -> impl Future<Output = Result<()>>;

    /// Check out an existing reference
    fn checkout(&self, reference: &str) -> impl Future<Output = Result<()>>;

    /// Merge a reference into the current branch
    fn merge(&self, reference: &str) -> impl Future<Output = Result<MergeOutcome>>;

    /// Abandon an in-progress merge, restoring the pre-merge `HEAD`
    fn merge_abort(&self) -> impl Future<Output = Result<()>>;

    /// Paths still marked as unmerged in the index
    fn unmerged_paths(&self) -> impl Future<Output = Result<Vec<String>>>;

    /// Conclude an in-progress merge with the default message
    fn commit_merge(&self) -> impl Future<Output = Result<()>>;

    /// Push a branch and set its upstream
    fn push(&self, remote: &str, branch: &str) -> impl Future<Output = Result<()>>;
}

/// Result of a merge attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Merge completed (or nothing to merge)
    Clean,
    /// Merge stopped; these paths need resolution
    Conflicted {
        /// Conflicted paths
        paths: Vec<String>,
    },
}
