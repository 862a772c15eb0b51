//! Git hosting services

mod github;
mod gitlab;

pub use github::GitHubHost;
pub use gitlab::GitLabHost;

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use talos_core::types::{HostConfig, HostKind};

/// An opened merge (pull) request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub number: u64,
    pub url: String,
}

/// Merge-request operations on a hosting service
#[async_trait]
pub trait GitHost: Send + Sync {
    /// Whether an open merge request exists from `branch` in the repository at `remote_url`
    async fn has_open_merge_request_for_branch(&self, remote_url: &str, branch: &str)
        -> Result<bool>;

    /// Open a merge request from `branch` into `target`, or into the
    /// repository default branch when `target` is `None`
    async fn create_merge_request_for_branch(
        &self,
        remote_url: &str,
        branch: &str,
        target: Option<&str>,
        title: &str,
        body: &str,
    ) -> Result<MergeRequest>;
}

/// Build the [`GitHost`] for `config`
pub fn host_for(config: &HostConfig) -> Result<Arc<dyn GitHost>> {
    let client = http_client()?;
    let token = config.token.clone();
    Ok(match config.kind {
        HostKind::Github => Arc::new(GitHubHost::new(client, config.api_base(), token)),
        HostKind::Gitlab => Arc::new(GitLabHost::new(client, config.api_base(), token)),
    })
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(format!("talos/{}", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()?)
}

/// `owner/repo` (or `group/subgroup/repo`) from a remote URL
pub fn repository_path(remote_url: &str) -> Result<String> {
    let trimmed = remote_url.trim_end_matches('/');
    let path = if let Some(rest) = trimmed.strip_prefix("git@") {
        rest.split_once(':').map(|(_, path)| path)
    } else {
        trimmed
            .split_once("://")
            .and_then(|(_, rest)| rest.split_once('/'))
            .map(|(_, path)| path)
    };
    let path = path
        .map(|p| p.trim_end_matches(".git"))
        .filter(|p| p.contains('/') && !p.starts_with('/'))
        .ok_or_else(|| Error::invalid_repo_url(remote_url))?;
    Ok(path.to_string())
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<serde_json::Value>,
}

/// Turn a non-success response into [`Error::Host`]
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|b| b.message)
        .map(|m| match m {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or(text);
    Err(Error::host(status.as_u16(), message))
}
