//! # Mastodon Upgrade
//!
//! Guided, operator-confirmed upgrades for self-hosted Mastodon instances.
//!
//! The workflow takes a git checkout of Mastodon (optionally a fork carrying
//! local customizations) to a newer upstream release: it offers a database
//! backup, identifies the fork and upstream remotes, picks the newest stable
//! tag, creates an upgrade branch and merges the customizations into it,
//! rebuilds, migrates, clears caches, reindexes search, restarts services
//! in dependency order and verifies the result.
//!
//! ## Features
//!
//! - **Confirmation gates**: nothing touches the repository, database or
//!   services without an explicit yes from the operator
//! - **Conflict handling**: resolve by hand, skip customizations, or abort
//! - **Known build failures**: recognized errors pause for a manual fix and
//!   one retry
//! - **Pluggable collaborators**: git, build, migrations, services, search,
//!   cache, backup and instance status are traits, so the engine runs
//!   against fakes in tests
//!
//! ## Usage
//!
//! ```bash
//! mastodon_upgrade upgrade                  # detect and upgrade interactively
//! mastodon_upgrade upgrade --target v4.2.1  # skip target detection
//! mastodon_upgrade detect --json            # read-only report
//! mastodon_upgrade services                 # is everything running?
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod operator;
pub mod state;
pub mod system;
pub mod version;
pub mod workflow;

// Re-export main types for public API
pub use cli::Args;
pub use config::UpgradeConfig;
pub use error::{ErrorKind, Result, UpgradeError};
pub use git::{GitCli, GitOperations};
pub use operator::{Operator, ScriptedOperator, TerminalOperator};
pub use state::{UpgradeHistory, UpgradeLogEntry, WorkflowState};
pub use system::{SystemToolbox, Toolbox};
pub use version::TargetRef;
pub use workflow::{UpgradeEngine, UpgradeOutcome, WorkflowStep};
