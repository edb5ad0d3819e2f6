//! Detect command implementation.
//!
//! Read-only report of what an upgrade would start from: remotes, the
//! newest stable tag and branch, distance from upstream and the running
//! version. Nothing is fetched.

use super::helpers::open_repository;
use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::git::{GitOperations, classify_remotes};
use crate::system::{InstanceApi, InstanceStatus};
use crate::version::{latest_prefixed_branch, latest_stable_tag};
use serde::Serialize;

/// What `detect` found
#[derive(Debug, Default, Serialize)]
struct DetectReport {
    current_branch: String,
    fork_remote: Option<String>,
    upstream_remote: Option<String>,
    latest_stable_tag: Option<String>,
    latest_stable_branch: Option<String>,
    commits_behind: Option<usize>,
    instance_version: Option<String>,
}

impl DetectReport {
    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Execute detect command
pub(super) async fn execute_detect(json: bool, config: &RuntimeConfig) -> Result<()> {
    let settings = &config.settings;
    let git = open_repository(config).await?;

    let mut report = DetectReport {
        current_branch: git.current_branch().await?,
        ..DetectReport::default()
    };

    let remotes = classify_remotes(&git.list_remotes().await?, &settings.remote_identifiers());
    report.fork_remote = remotes.fork;
    report.upstream_remote = remotes.upstream.clone();

    let tags = git.list_tags().await?;
    report.latest_stable_tag = latest_stable_tag(&tags, &settings.versions.prerelease_markers)
        .map(|t| t.raw)
        .ok();

    if let Some(upstream) = &remotes.upstream {
        let branches = git.list_remote_branches(upstream).await?;
        report.latest_stable_branch =
            latest_prefixed_branch(&branches, &settings.versions.stable_branch_prefix).ok();

        let main_line = format!("{}/{}", upstream, settings.remotes.main_branch);
        match git.commits_behind("HEAD", &main_line).await {
            Ok(n) => report.commits_behind = Some(n),
            Err(e) => log::warn!("Could not count commits behind {}: {}", main_line, e),
        }
    }

    let instance = InstanceApi::new(settings.instance_url.as_deref())?;
    report.instance_version = instance.current_version().await.ok();

    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    let unknown = || "not found".to_string();
    let _ = config.output().section("Detected");
    config.println(&format!("Branch:          {}", report.current_branch));
    config.println(&format!(
        "Upstream remote: {}",
        report.upstream_remote.clone().unwrap_or_else(unknown)
    ));
    config.println(&format!(
        "Fork remote:     {}",
        report.fork_remote.clone().unwrap_or_else(unknown)
    ));
    config.println(&format!(
        "Latest tag:      {}",
        report.latest_stable_tag.clone().unwrap_or_else(unknown)
    ));
    config.println(&format!(
        "Latest branch:   {}",
        report.latest_stable_branch.clone().unwrap_or_else(unknown)
    ));
    config.println(&format!(
        "Commits behind:  {}",
        report
            .commits_behind
            .map_or_else(unknown, |n| n.to_string())
    ));
    config.println(&format!(
        "Running version: {}",
        report.instance_version.clone().unwrap_or_else(unknown)
    ));

    if report.upstream_remote.is_none() {
        config.warning_println("No upstream remote matched; set remotes.upstream_identifiers");
    }
    Ok(())
}
