use super::{check, repository_path, GitHost, MergeRequest};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// GitLab REST API (v4)
pub struct GitLabHost {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabMergeRequest {
    iid: u64,
    web_url: String,
}

#[derive(Debug, Deserialize)]
struct Project {
    default_branch: String,
}

#[derive(Debug, Serialize)]
struct NewMergeRequest<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    description: &'a str,
    remove_source_branch: bool,
}

/// Project path as a URL-encoded project id
fn project_id(remote_url: &str) -> Result<String> {
    let path = repository_path(remote_url)?;
    Ok(url::form_urlencoded::byte_serialize(path.as_bytes()).collect())
}

impl GitLabHost {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("PRIVATE-TOKEN", token),
            None => request,
        }
    }

    async fn default_branch(&self, project: &str) -> Result<String> {
        let url = format!("{}/projects/{}", self.api_base, project);
        let response = check(self.authorize(self.client.get(&url)).send().await?).await?;
        Ok(response.json::<Project>().await?.default_branch)
    }
}

#[async_trait]
impl GitHost for GitLabHost {
    async fn has_open_merge_request_for_branch(
        &self,
        remote_url: &str,
        branch: &str,
    ) -> Result<bool> {
        let project = project_id(remote_url)?;
        let url = Url::parse_with_params(
            &format!("{}/projects/{}/merge_requests", self.api_base, project),
            &[("state", "opened"), ("source_branch", branch)],
        )
        .map_err(|_| Error::invalid_repo_url(remote_url))?;

        let response = check(self.authorize(self.client.get(url)).send().await?).await?;
        let open: Vec<GitLabMergeRequest> = response.json().await?;
        debug!("{} open merge requests from {}", open.len(), branch);
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
        let project = project_id(remote_url)?;
        let target = match target {
            Some(target) => target.to_string(),
            None => self.default_branch(&project).await?,
        };
        let url = format!("{}/projects/{}/merge_requests", self.api_base, project);
        let request = NewMergeRequest {
            source_branch: branch,
            target_branch: &target,
            title,
            description: body,
            remove_source_branch: true,
        };

        let response = check(self.authorize(self.client.post(&url)).json(&request).send().await?)
            .await?;
        let created: GitLabMergeRequest = response.json().await?;
        info!("Opened merge request !{} ({})", created.iid, created.web_url);
        Ok(MergeRequest {
            number: created.iid,
            url: created.web_url,
        })
    }
}
