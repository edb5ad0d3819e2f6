//! Upgrade target selection.
//!
//! Picks the newest stable release tag (or newest stable branch) from what
//! upstream publishes, and describes the chosen target as a [`TargetRef`].

mod selector;

pub use selector::{
    DEFAULT_PRERELEASE_MARKERS, VersionTag, latest_prefixed_branch, latest_stable_tag,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the upgrade branch is created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetRef {
    /// A release tag, e.g. `v4.2.0`
    Tag(String),
    /// A branch on the upstream remote, e.g. `stable-4.2`
    Branch(String),
    /// Upstream's main line
    Main,
}

impl TargetRef {
    /// Interpret `--target`: anything that parses as a version is a tag,
    /// `main` is the main line, everything else is a branch.
    pub fn from_user_input(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("main") {
            TargetRef::Main
        } else if VersionTag::parse(trimmed, &[]).is_some() {
            TargetRef::Tag(trimmed.to_string())
        } else {
            TargetRef::Branch(trimmed.to_string())
        }
    }

    /// Commit-ish to branch from, given the upstream remote name
    pub fn start_point(&self, upstream_remote: &str, main_branch: &str) -> String {
        match self {
            TargetRef::Tag(tag) => tag.clone(),
            TargetRef::Branch(branch) => format!("{}/{}", upstream_remote, branch),
            TargetRef::Main => format!("{}/{}", upstream_remote, main_branch),
        }
    }

    /// Short label used in branch names and the history log
    pub fn label(&self) -> &str {
        match self {
            TargetRef::Tag(name) | TargetRef::Branch(name) => name,
            TargetRef::Main => "main",
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRef::Tag(tag) => write!(f, "tag {}", tag),
            TargetRef::Branch(branch) => write!(f, "branch {}", branch),
            TargetRef::Main => write!(f, "main"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_input_is_classified() {
        assert_eq!(TargetRef::from_user_input("v4.2.1"), TargetRef::Tag("v4.2.1".into()));
        assert_eq!(TargetRef::from_user_input("MAIN"), TargetRef::Main);
        assert_eq!(
            TargetRef::from_user_input("stable-4.2"),
            TargetRef::Branch("stable-4.2".into())
        );
    }

    #[test]
    fn start_points_are_remote_qualified_for_branches() {
        assert_eq!(TargetRef::Tag("v4.2.0".into()).start_point("upstream", "main"), "v4.2.0");
        assert_eq!(
            TargetRef::Branch("stable-4.2".into()).start_point("upstream", "main"),
            "upstream/stable-4.2"
        );
        assert_eq!(TargetRef::Main.start_point("up", "main"), "up/main");
    }
}
