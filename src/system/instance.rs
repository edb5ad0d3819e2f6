//! Running instance version through the public API.

use crate::error::{CommandError, DetectionError, Result};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Reports the version the instance is currently serving
pub trait InstanceStatus {
    /// Version string as advertised by the instance
    fn current_version(&self) -> impl Future<Output = Result<String>>;
}

#[derive(Debug, Deserialize)]
struct InstanceInfo {
    version: String,
}

/// `GET /api/v1/instance`
#[derive(Debug, Clone)]
pub struct InstanceApi {
    client: reqwest::Client,
    base: Option<Url>,
}

impl InstanceApi {
    /// Query the instance at `base_url`; `None` disables the lookup
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let base = base_url
            .map(|raw| {
                Url::parse(raw)
                    .map(as_directory)
                    .map_err(|e| DetectionError::InstanceVersionUnavailable {
                        reason: format!("invalid instance URL '{}': {}", raw, e),
                    })
            })
            .transpose()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("mastodon_upgrade/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CommandError::Http {
                url: base_url.unwrap_or_default().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, base })
    }

    fn endpoint(&self) -> Result<Url> {
        let base = self
            .base
            .as_ref()
            .ok_or_else(|| DetectionError::InstanceVersionUnavailable {
                reason: "instance_url is not configured".to_string(),
            })?;
        base.join("api/v1/instance").map_err(|e| {
            DetectionError::InstanceVersionUnavailable {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Ensure the path ends in `/` so joins append instead of replacing the last segment
fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Strip build metadata such as `+glitch` from an advertised version.
pub fn normalize_instance_version(version: &str) -> String {
    version
        .split_once('+')
        .map_or(version, |(base, _)| base)
        .trim()
        .to_string()
}

impl InstanceStatus for InstanceApi {
    async fn current_version(&self) -> Result<String> {
        let url = self.endpoint()?;

        log::debug!("GET {}", url);
        let http_error = |e: reqwest::Error| CommandError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let info: InstanceInfo = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;

        Ok(normalize_instance_version(&info.version))
    }
}
