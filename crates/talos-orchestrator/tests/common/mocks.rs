//! Test doubles for git, the hosting service and the interaction sink

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Mutex;
use std::time::Duration;
use talos_git::{CommitAuthor, Error, GitClient, GitHost, MergeRequest, PushOptions, Result};
use talos_locations::ScheduledPush;
use talos_orchestrator::InteractionSink;
use walkdir::WalkDir;

/// Copy every file under `from` into `to`
pub fn copy_tree(from: &Utf8Path, to: &Utf8Path) {
    for entry in WalkDir::new(from) {
        let entry = entry.unwrap();
        let relative = entry.path().strip_prefix(from).unwrap();
        let target = to.as_std_path().join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRecord {
    pub branch: String,
    pub force: bool,
    pub set_upstream: bool,
}

#[derive(Default)]
pub struct GitState {
    /// Pushes to reject as non-fast-forward before accepting
    pub rejections: usize,
    pub clone_delay: Option<Duration>,
    /// Commits whose message contains this fail
    pub failing_commit: Option<String>,
    pub branches: HashMap<Utf8PathBuf, String>,
    pub clones: usize,
    pub commits: Vec<String>,
    pub pushes: Vec<PushRecord>,
    pub pulls: usize,
    pub discards: usize,
}

/// Git client whose remote is a plain directory. Clones copy it; pushes
/// of `main` copy the clone back.
pub struct MockGit {
    remote: Utf8PathBuf,
    pub state: Mutex<GitState>,
}

impl MockGit {
    pub fn new(remote: impl Into<Utf8PathBuf>) -> Self {
        Self {
            remote: remote.into(),
            state: Mutex::new(GitState::default()),
        }
    }

    fn branch(&self, repo: &Utf8Path) -> String {
        self.state
            .lock()
            .unwrap()
            .branches
            .get(repo)
            .cloned()
            .unwrap_or_else(|| "main".to_string())
    }

    pub fn commits(&self) -> Vec<String> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn pushes(&self) -> Vec<PushRecord> {
        self.state.lock().unwrap().pushes.clone()
    }
}

#[async_trait]
impl GitClient for MockGit {
    async fn clone_repository(
        &self,
        _url: &str,
        branch: Option<&str>,
        destination: &Utf8Path,
    ) -> Result<()> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.clones += 1;
            state.branches.insert(
                destination.to_owned(),
                branch.unwrap_or("main").to_string(),
            );
            state.clone_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        fs::create_dir_all(destination)?;
        copy_tree(&self.remote, destination);
        Ok(())
    }

    async fn commit_all(&self, _repo: &Utf8Path, message: &str, _author: &CommitAuthor) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state
            .failing_commit
            .as_deref()
            .is_some_and(|needle| message.contains(needle))
        {
            return Err(Error::git_operation("pre-commit hook failed"));
        }
        state.commits.push(message.to_string());
        Ok(true)
    }

    async fn push(&self, repo: &Utf8Path, options: &PushOptions) -> Result<()> {
        let branch = self.branch(repo);
        {
            let mut state = self.state.lock().unwrap();
            if state.rejections > 0 {
                state.rejections -= 1;
                return Err(Error::non_fast_forward(branch, "[rejected] (fetch first)"));
            }
            state.pushes.push(PushRecord {
                branch: branch.clone(),
                force: options.force,
                set_upstream: options.set_upstream,
            });
        }
        if branch == "main" {
            copy_tree(repo, &self.remote);
        }
        Ok(())
    }

    async fn pull(&self, _repo: &Utf8Path, _rebase: bool) -> Result<()> {
        self.state.lock().unwrap().pulls += 1;
        Ok(())
    }

    async fn current_branch(&self, repo: &Utf8Path) -> Result<String> {
        Ok(self.branch(repo))
    }

    async fn has_upstream(&self, _repo: &Utf8Path) -> Result<bool> {
        Ok(true)
    }

    async fn create_branch(&self, repo: &Utf8Path, name: &str) -> Result<()> {
        self.checkout(repo, name).await
    }

    async fn checkout(&self, repo: &Utf8Path, name: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .branches
            .insert(repo.to_owned(), name.to_string());
        Ok(())
    }

    async fn discard_changes(&self, _repo: &Utf8Path) -> Result<()> {
        self.state.lock().unwrap().discards += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRequest {
    pub branch: String,
    pub target: Option<String>,
    pub title: String,
}

/// Hosting service keeping merge requests in memory
#[derive(Default)]
pub struct MockHost {
    pub open: Mutex<HashSet<String>>,
    pub created: Mutex<Vec<CreatedRequest>>,
}

impl MockHost {
    pub fn created(&self) -> Vec<CreatedRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitHost for MockHost {
    async fn has_open_merge_request_for_branch(&self, _remote_url: &str, branch: &str) -> Result<bool> {
        Ok(self.open.lock().unwrap().contains(branch))
    }

    async fn create_merge_request_for_branch(
        &self,
        _remote_url: &str,
        branch: &str,
        target: Option<&str>,
        title: &str,
        _body: &str,
    ) -> Result<MergeRequest> {
        self.open.lock().unwrap().insert(branch.to_string());
        let mut created = self.created.lock().unwrap();
        created.push(CreatedRequest {
            branch: branch.to_string(),
            target: target.map(str::to_string),
            title: title.to_string(),
        });
        Ok(MergeRequest {
            number: created.len() as u64,
            url: format!("https://git.example.com/acme/deploy/merge_requests/{}", created.len()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Notified(String),
    Created(String),
    Deleted(String),
}

/// Interaction sink that records every call
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl InteractionSink for RecordingSink {
    async fn create_interaction(&self, _push: &ScheduledPush) -> talos_orchestrator::Result<String> {
        let mut events = self.events.lock().unwrap();
        let id = format!("interaction-{}", events.len() + 1);
        events.push(SinkEvent::Created(id.clone()));
        Ok(id)
    }

    async fn delete_interaction(&self, id: &str) -> talos_orchestrator::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Deleted(id.to_string()));
        Ok(())
    }

    async fn notify(&self, push: &ScheduledPush) -> talos_orchestrator::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Notified(push.commit_title().to_string()));
        Ok(())
    }
}
