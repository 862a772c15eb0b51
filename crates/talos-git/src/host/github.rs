use super::{check, repository_path, GitHost, MergeRequest};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const GITHUB_JSON: &str = "application/vnd.github+json";

/// GitHub REST API
pub struct GitHubHost {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    number: u64,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct Repository {
    default_branch: String,
}

#[derive(Debug, Serialize)]
struct NewPullRequest<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
}

impl GitHubHost {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(ACCEPT, GITHUB_JSON);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn default_branch(&self, repo: &str) -> Result<String> {
        let url = format!("{}/repos/{}", self.api_base, repo);
        let response = check(self.authorize(self.client.get(&url)).send().await?).await?;
        Ok(response.json::<Repository>().await?.default_branch)
    }
}

#[async_trait]
impl GitHost for GitHubHost {
    async fn has_open_merge_request_for_branch(
        &self,
        remote_url: &str,
        branch: &str,
    ) -> Result<bool> {
        let repo = repository_path(remote_url)?;
        let owner = repo.split('/').next().unwrap_or_default();
        let head = format!("{}:{}", owner, branch);
        let url = Url::parse_with_params(
            &format!("{}/repos/{}/pulls", self.api_base, repo),
            &[("state", "open"), ("head", head.as_str())],
        )
        .map_err(|_| Error::invalid_repo_url(remote_url))?;

        let response = check(self.authorize(self.client.get(url)).send().await?).await?;
        let open: Vec<PullRequest> = response.json().await?;
        debug!("{} open pull requests from {}", open.len(), head);
        Ok(!open.is_empty())
    }

    async fn create_merge_request_for_branch(
        &self,
        remote_url: &str,
        branch: &str,
        target: Option<&str>,
        title: &str,
        body: &str,
    ) -> Result<MergeRequest> {
        let repo = repository_path(remote_url)?;
        let base = match target {
            Some(target) => target.to_string(),
            None => self.default_branch(&repo).await?,
        };
        let url = format!("{}/repos/{}/pulls", self.api_base, repo);
        let request = NewPullRequest {
            title,
            head: branch,
            base: &base,
            body,
        };

        let response = check(self.authorize(self.client.post(&url)).json(&request).send().await?)
            .await?;
        let created: PullRequest = response.json().await?;
        info!("Opened pull request #{} ({})", created.number, created.html_url);
        Ok(MergeRequest {
            number: created.number,
            url: created.html_url,
        })
    }
}
