//! Version control integration for the upgrade workflow.
//!
//! [`GitOperations`] is the seam the workflow talks to; [`GitCli`] drives the
//! `git` binary. Remote classification lives in [`remotes`] as pure functions.

mod git_adapter;
mod operations;
pub mod remotes;

pub use git_adapter::GitCli;
pub use operations::{GitOperations, MergeOutcome};
pub use remotes::{
    RemoteClassification, RemoteDirection, RemoteEntry, RemoteIdentifiers, classify_remotes,
    parse_remote_listing,
};
