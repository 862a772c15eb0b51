//! [`GitClient`] over the `git` binary

use super::{CommitAuthor, GitClient, GitCredentials, PushOptions};
use crate::error::{Error, Result};
use async_trait::async_trait;
use camino::Utf8Path;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

/// Drives the `git` executable with `tokio::process`
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    credentials: Option<GitCredentials>,
}

impl GitCli {
    /// Use the `git` found on PATH
    pub fn new() -> Result<Self> {
        let program = which::which("git").map_err(|_| Error::GitNotFound)?;
        Ok(Self {
            program,
            credentials: None,
        })
    }

    /// Authenticate HTTPS remotes with `credentials`
    pub fn with_credentials(mut self, credentials: Option<GitCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// `url` with the credentials embedded, for HTTP(S) remotes
    fn authenticated_url(&self, url: &str) -> Result<String> {
        if !is_valid_repo_url(url) {
            return Err(Error::invalid_repo_url(url));
        }
        let Some(credentials) = &self.credentials else {
            return Ok(url.to_string());
        };
        let Ok(mut parsed) = Url::parse(url) else {
            return Ok(url.to_string());
        };
        if !matches!(parsed.scheme(), "https" | "http") {
            return Ok(url.to_string());
        }
        parsed
            .set_username(&credentials.username)
            .and_then(|_| parsed.set_password(Some(&credentials.token)))
            .map_err(|_| Error::invalid_repo_url(url))?;
        Ok(parsed.to_string())
    }

    /// Remove the token from git output before it reaches logs or errors
    fn redact(&self, text: &str) -> String {
        match &self.credentials {
            Some(c) if !c.token.is_empty() => text.replace(&c.token, "***"),
            _ => text.to_string(),
        }
    }

    async fn output(&self, repo: Option<&Utf8Path>, args: &[&str]) -> Result<std::process::Output> {
        let mut cmd = Command::new(&self.program);
        if let Some(repo) = repo {
            cmd.current_dir(repo);
        }
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        debug!("Running: git {}", args.first().copied().unwrap_or_default());
        Ok(cmd.output().await?)
    }

    /// Run git and return trimmed stdout, failing on a non-zero exit
    async fn run(&self, repo: Option<&Utf8Path>, args: &[&str]) -> Result<String> {
        let output = self.output(repo, args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::git_operation(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                self.redact(stderr.trim())
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn is_valid_repo_url(url: &str) -> bool {
    url.starts_with("https://")
        || url.starts_with("http://")
        || url.starts_with("git@")
        || url.starts_with("ssh://")
        || url.starts_with("file://")
}

fn is_non_fast_forward(stderr: &str) -> bool {
    stderr.contains("non-fast-forward")
        || stderr.contains("fetch first")
        || stderr.contains("[rejected]")
}

#[async_trait]
impl GitClient for GitCli {
    async fn clone_repository(
        &self,
        url: &str,
        branch: Option<&str>,
        destination: &Utf8Path,
    ) -> Result<()> {
        info!("Cloning {} into {}", url, destination);
        let remote = self.authenticated_url(url)?;
        let mut args = vec!["clone", "--single-branch"];
        if let Some(branch) = branch {
            args.extend(["--branch", branch]);
        }
        args.extend([remote.as_str(), destination.as_str()]);
        self.run(None, &args).await?;
        Ok(())
    }

    async fn commit_all(
        &self,
        repo: &Utf8Path,
        message: &str,
        author: &CommitAuthor,
    ) -> Result<bool> {
        self.run(Some(repo), &["add", "--all"]).await?;
        if self.run(Some(repo), &["status", "--porcelain"]).await?.is_empty() {
            debug!("Nothing to commit in {}", repo);
            return Ok(false);
        }

        // Local identity; a later rebase replays commits under it
        self.run(Some(repo), &["config", "user.name", &author.name])
            .await?;
        self.run(Some(repo), &["config", "user.email", &author.email])
            .await?;
        self.run(Some(repo), &["commit", "--quiet", "-m", message])
            .await?;
        Ok(true)
    }

    async fn push(&self, repo: &Utf8Path, options: &PushOptions) -> Result<()> {
        let branch = self.current_branch(repo).await?;
        let mut args = vec!["push", "--porcelain"];
        if options.force {
            args.push("--force");
        }
        if options.set_upstream {
            args.push("--set-upstream");
        }
        args.extend(["origin", branch.as_str()]);

        let output = self.output(Some(repo), &args).await?;
        if output.status.success() {
            info!("Pushed {} to origin", branch);
            return Ok(());
        }

        let stderr = self.redact(&format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ));
        if is_non_fast_forward(&stderr) {
            return Err(Error::non_fast_forward(branch, stderr.trim()));
        }
        Err(Error::git_operation(format!(
            "git push failed: {}",
            stderr.trim()
        )))
    }

    async fn pull(&self, repo: &Utf8Path, rebase: bool) -> Result<()> {
        let mode = if rebase { "--rebase" } else { "--no-rebase" };
        if let Err(e) = self.run(Some(repo), &["pull", mode]).await {
            if rebase {
                // Abort a half-applied rebase
                let _ = self.run(Some(repo), &["rebase", "--abort"]).await;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn current_branch(&self, repo: &Utf8Path) -> Result<String> {
        self.run(Some(repo), &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
    }

    async fn has_upstream(&self, repo: &Utf8Path) -> Result<bool> {
        let output = self
            .output(
                Some(repo),
                &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
            )
            .await?;
        Ok(output.status.success())
    }

    async fn create_branch(&self, repo: &Utf8Path, name: &str) -> Result<()> {
        self.run(Some(repo), &["checkout", "-B", name]).await?;
        debug!("Switched to new branch {}", name);
        Ok(())
    }

    async fn checkout(&self, repo: &Utf8Path, name: &str) -> Result<()> {
        self.run(Some(repo), &["checkout", name]).await?;
        Ok(())
    }

    async fn discard_changes(&self, repo: &Utf8Path) -> Result<()> {
        self.run(Some(repo), &["reset", "--hard", "--quiet", "HEAD"])
            .await?;
        self.run(Some(repo), &["clean", "-fd", "--quiet"]).await?;
        Ok(())
    }
}
