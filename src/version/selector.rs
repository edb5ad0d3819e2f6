//! Release tag and stable branch selection.

use crate::error::DetectionError;
use semver::Version;
use std::cmp::Ordering;

/// Pre-release markers filtered out unless configured otherwise
pub const DEFAULT_PRERELEASE_MARKERS: &[&str] = &["alpha", "beta", "rc"];

/// A release tag with its parsed version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag {
    /// Tag exactly as listed, e.g. `v4.2.0`
    pub raw: String,
    /// Tag contains one of the pre-release markers
    pub is_prerelease: bool,
    /// Parsed version
    pub version: Version,
}

impl VersionTag {
    /// Parse a tag of the form `vMAJOR.MINOR.PATCH[-suffix]` (leading `v`
    /// optional). Returns `None` for anything that isn't a full version.
    pub fn parse(raw: &str, markers: &[String]) -> Option<Self> {
        let trimmed = raw.trim();
        let bare = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let version = Version::parse(bare).ok()?;
        Some(Self {
            raw: trimmed.to_string(),
            is_prerelease: has_marker(trimmed, markers),
            version,
        })
    }

    /// `(major, minor, patch)`
    pub fn triple(&self) -> (u64, u64, u64) {
        (self.version.major, self.version.minor, self.version.patch)
    }
}

fn has_marker(tag: &str, markers: &[String]) -> bool {
    let lower = tag.to_lowercase();
    markers
        .iter()
        .filter(|m| !m.is_empty())
        .any(|m| lower.contains(&m.to_lowercase()))
}

/// Newest stable tag.
///
/// Tags containing a marker are dropped, the rest are parsed (unparseable
/// ones dropped) and the highest `(major, minor, patch)` wins. Among equal
/// triples the full semver order breaks the tie.
pub fn latest_stable_tag<S: AsRef<str>>(
    tags: &[S],
    markers: &[String],
) -> Result<VersionTag, DetectionError> {
    tags.iter()
        .filter(|t| !has_marker(t.as_ref(), markers))
        .filter_map(|t| VersionTag::parse(t.as_ref(), markers))
        .max_by(|a, b| {
            a.triple()
                .cmp(&b.triple())
                .then_with(|| a.version.cmp(&b.version))
        })
        .ok_or(DetectionError::NoStableTag {
            considered: tags.len(),
        })
}

/// Numeric components of a dotted suffix such as `4.2` or `v4.2.1`.
fn numeric_components(suffix: &str) -> Option<Vec<u64>> {
    let bare = suffix.strip_prefix('v').unwrap_or(suffix);
    if bare.is_empty() {
        return None;
    }
    bare.split('.').map(|part| part.parse().ok()).collect()
}

fn compare_suffixes(a: &str, b: &str) -> Ordering {
    match (numeric_components(a), numeric_components(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Newest branch carrying `prefix`, e.g. `stable-4.3` for prefix `stable-`.
///
/// Suffixes that look like versions compare numerically and outrank
/// suffixes that don't; the rest compare lexicographically. Returns the
/// full branch name.
pub fn latest_prefixed_branch<S: AsRef<str>>(
    branches: &[S],
    prefix: &str,
) -> Result<String, DetectionError> {
    branches
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|b| b.strip_prefix(prefix).map(|suffix| (b, suffix)))
        .filter(|(_, suffix)| !suffix.is_empty())
        .max_by(|(_, a), (_, b)| compare_suffixes(a, b))
        .map(|(branch, _)| branch.to_string())
        .ok_or_else(|| DetectionError::NoPrefixedBranch {
            prefix: prefix.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        DEFAULT_PRERELEASE_MARKERS.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn rc_tag_is_excluded() {
        let tags = ["v4.2.0", "v4.3.0-rc1", "v4.1.9"];
        let latest = latest_stable_tag(&tags, &markers()).unwrap();
        assert_eq!(latest.raw, "v4.2.0");
        assert_eq!(latest.triple(), (4, 2, 0));
        assert!(!latest.is_prerelease);
    }

    #[test]
    fn compares_numerically_not_lexically() {
        let tags = ["v4.9.0", "v4.10.0", "v4.2.11"];
        assert_eq!(latest_stable_tag(&tags, &markers()).unwrap().raw, "v4.10.0");
    }

    #[test]
    fn unparseable_and_prerelease_only_is_not_found() {
        let tags = ["v4.3.0-beta.1", "latest", "v4.2", "v4.4.0-alpha.3"];
        match latest_stable_tag(&tags, &markers()) {
            Err(DetectionError::NoStableTag { considered }) => assert_eq!(considered, 4),
            other => panic!("expected NoStableTag, got {other:?}"),
        }
    }

    #[test]
    fn empty_list_is_not_found() {
        let tags: [&str; 0] = [];
        assert!(latest_stable_tag(&tags, &markers()).is_err());
    }

    #[test]
    fn markers_match_case_insensitively() {
        let tags = ["v4.2.0", "v4.3.0-RC2"];
        assert_eq!(latest_stable_tag(&tags, &markers()).unwrap().raw, "v4.2.0");
    }

    #[test]
    fn leading_v_is_optional() {
        let tags = ["4.1.0", "v4.0.2"];
        assert_eq!(latest_stable_tag(&tags, &markers()).unwrap().raw, "4.1.0");
    }

    #[test]
    fn parse_marks_prerelease() {
        let tag = VersionTag::parse("v4.3.0-rc.1", &markers()).unwrap();
        assert!(tag.is_prerelease);
        assert_eq!(tag.triple(), (4, 3, 0));
    }

    #[test]
    fn picks_newest_stable_branch() {
        let branches = ["main", "stable-4.1", "stable-4.10", "stable-4.2", "feature-x"];
        assert_eq!(latest_prefixed_branch(&branches, "stable-").unwrap(), "stable-4.10");
    }

    #[test]
    fn version_suffixes_outrank_names() {
        let branches = ["stable-next", "stable-3.5"];
        assert_eq!(latest_prefixed_branch(&branches, "stable-").unwrap(), "stable-3.5");
    }

    #[test]
    fn non_version_suffixes_compare_lexically() {
        let branches = ["release-alpha", "release-beta"];
        assert_eq!(latest_prefixed_branch(&branches, "release-").unwrap(), "release-beta");
    }

    #[test]
    fn no_prefixed_branch_is_not_found() {
        let branches = ["main", "stable-"];
        assert!(matches!(
            latest_prefixed_branch(&branches, "stable-"),
            Err(DetectionError::NoPrefixedBranch { .. })
        ));
    }
}
