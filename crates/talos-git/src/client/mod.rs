//! Working-clone operations

mod cli;

pub use cli::GitCli;

use crate::error::Result;
use async_trait::async_trait;
use camino::Utf8Path;

/// Author recorded on Talos commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

/// Credentials injected into HTTPS remotes
#[derive(Clone, PartialEq, Eq)]
pub struct GitCredentials {
    pub username: String,
    pub token: String,
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("token", &"***")
            .finish()
    }
}

/// How to push the current branch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Overwrite the remote branch
    pub force: bool,
    /// Record `origin/<branch>` as the upstream
    pub set_upstream: bool,
}

/// Operations Talos needs on a working clone
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Clone `url` into `destination`, checking out `branch` or the remote default
    async fn clone_repository(
        &self,
        url: &str,
        branch: Option<&str>,
        destination: &Utf8Path,
    ) -> Result<()>;

    /// Stage every change and commit it; returns false when nothing changed
    async fn commit_all(&self, repo: &Utf8Path, message: &str, author: &CommitAuthor)
        -> Result<bool>;

    /// Push the current branch to `origin`.
    ///
    /// A rejection because the remote moved is reported as
    /// [`Error::NonFastForward`](crate::Error::NonFastForward).
    async fn push(&self, repo: &Utf8Path, options: &PushOptions) -> Result<()>;

    /// Pull the current branch's upstream, rebasing local commits when `rebase`
    async fn pull(&self, repo: &Utf8Path, rebase: bool) -> Result<()>;

    async fn current_branch(&self, repo: &Utf8Path) -> Result<String>;

    /// Whether the current branch tracks a remote branch
    async fn has_upstream(&self, repo: &Utf8Path) -> Result<bool>;

    /// Create (or reset) `name` at HEAD and switch to it
    async fn create_branch(&self, repo: &Utf8Path, name: &str) -> Result<()>;

    async fn checkout(&self, repo: &Utf8Path, name: &str) -> Result<()>;

    /// Drop uncommitted changes and untracked files
    async fn discard_changes(&self, repo: &Utf8Path) -> Result<()>;
}
