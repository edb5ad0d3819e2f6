//! Remote listing parser and fork/upstream classifier.
//!
//! Both functions are pure: they work on `git remote -v` text and the
//! configured identifiers only.

use serde::{Deserialize, Serialize};

/// Direction column of `git remote -v`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteDirection {
    /// `(fetch)`
    Fetch,
    /// `(push)`
    Push,
}

/// One line of `git remote -v`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Remote name
    pub name: String,
    /// Remote URL
    pub url: String,
    /// Fetch or push
    pub direction: RemoteDirection,
}

impl RemoteEntry {
    /// Build a fetch entry
    pub fn fetch(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            direction: RemoteDirection::Fetch,
        }
    }

    /// Build a push entry
    pub fn push(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            direction: RemoteDirection::Push,
        }
    }
}

/// Substrings identifying each side of the fork relationship
#[derive(Debug, Clone, Default)]
pub struct RemoteIdentifiers {
    /// Substring of the operator's fork URL, e.g. `alice/mastodon`
    pub fork: Option<String>,
    /// Substrings of the upstream URL, tried in order
    pub upstream: Vec<String>,
}

/// Outcome of [`classify_remotes`]; either side may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteClassification {
    /// Name of the remote pointing at the operator's fork
    pub fork: Option<String>,
    /// Name of the remote pointing at upstream
    pub upstream: Option<String>,
}

impl RemoteClassification {
    /// Both sides found
    pub fn is_complete(&self) -> bool {
        self.fork.is_some() && self.upstream.is_some()
    }
}

/// Parse `git remote -v` output, skipping lines that don't fit
/// `<name> <url> (fetch|push)`.
pub fn parse_remote_listing(output: &str) -> Vec<RemoteEntry> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let url = parts.next()?;
            let direction = match parts.next()? {
                "(fetch)" => RemoteDirection::Fetch,
                "(push)" => RemoteDirection::Push,
                _ => return None,
            };
            Some(RemoteEntry {
                name: name.to_string(),
                url: url.to_string(),
                direction,
            })
        })
        .collect()
}

/// Classify fetch remotes into fork and upstream.
///
/// The fork identifier is tested first for every entry, so a URL matching
/// both identifiers counts as the fork. The first match on each side wins.
pub fn classify_remotes(
    entries: &[RemoteEntry],
    identifiers: &RemoteIdentifiers,
) -> RemoteClassification {
    let fork_id = identifiers.fork.as_deref().filter(|id| !id.is_empty());
    let mut result = RemoteClassification::default();

    for entry in entries
        .iter()
        .filter(|e| e.direction == RemoteDirection::Fetch)
    {
        if fork_id.is_some_and(|id| entry.url.contains(id)) {
            if result.fork.is_none() {
                result.fork = Some(entry.name.clone());
            }
            continue;
        }

        let is_upstream = identifiers
            .upstream
            .iter()
            .filter(|id| !id.is_empty())
            .any(|id| entry.url.contains(id.as_str()));
        if is_upstream && result.upstream.is_none() {
            result.upstream = Some(entry.name.clone());
        }
    }

    result
}
