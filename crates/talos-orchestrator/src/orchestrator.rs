//! Scanning repositories and landing pushes

use crate::error::{Error, Result};
use crate::sink::InteractionSink;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use talos_core::types::RepositoryConfig;
use talos_core::BumpStrategy;
use talos_git::{CommitAuthor, GitClient, GitHost, MergeRequest, PushOptions};
use talos_image::CandidateSelector;
use talos_locations::{
    default_scanners, resolve_sync_groups, DeadLetter, IdentityBase, LocationScanner,
    ScheduledPush, StagingBuffer, UpdateLocation,
};
use talos_queue::{CapacityCalculator, EnqueueOutcome, ImageUpdateData, PushQueue, UpdateDataCache};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Git access for one configured host
#[derive(Clone)]
pub struct HostServices {
    pub git: Arc<dyn GitClient>,
    pub api: Arc<dyn GitHost>,
}

/// Where a scheduled push was routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Queued(EnqueueOutcome),
    Notified,
    Prompted,
    /// The same move was already notified or is awaiting approval
    AlreadyRaised,
    Skipped,
}

/// Counts from one repository scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub locations: usize,
    pub failures: usize,
    pub rejected_groups: usize,
    pub no_upgrade: usize,
    pub errors: usize,
    pub queued: usize,
    pub notified: usize,
    pub prompted: usize,
    pub already_raised: usize,
    pub skipped: usize,
}

/// What one batch did to the queue
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Storage keys of pushes that landed
    pub landed: Vec<String>,
    /// Storage keys of pushes moved to the dead letters
    pub dead_lettered: Vec<String>,
    pub merge_requests: Vec<MergeRequest>,
    /// Cancellation stopped the batch before every push was tried
    pub cancelled: bool,
}

/// Scans repositories, routes pushes by strategy and lands queued pushes
pub struct Orchestrator {
    selector: Arc<CandidateSelector>,
    scanners: Vec<Box<dyn LocationScanner>>,
    queue: Arc<PushQueue>,
    capacity: Arc<CapacityCalculator>,
    update_data: Arc<UpdateDataCache>,
    sink: Arc<dyn InteractionSink>,
    hosts: HashMap<String, HostServices>,
    work_dir: Utf8PathBuf,
}

impl Orchestrator {
    /// Clones are made in temporary directories under `work_dir`
    pub fn new(
        selector: Arc<CandidateSelector>,
        queue: Arc<PushQueue>,
        capacity: Arc<CapacityCalculator>,
        update_data: Arc<UpdateDataCache>,
        sink: Arc<dyn InteractionSink>,
        work_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        let scanners = default_scanners(selector.tag_parser());
        Self {
            selector,
            scanners,
            queue,
            capacity,
            update_data,
            sink,
            hosts: HashMap::new(),
            work_dir: work_dir.into(),
        }
    }

    pub fn with_host(mut self, name: impl Into<String>, services: HostServices) -> Self {
        self.hosts.insert(name.into(), services);
        self
    }

    pub fn with_scanners(mut self, scanners: Vec<Box<dyn LocationScanner>>) -> Self {
        self.scanners = scanners;
        self
    }

    pub fn queue(&self) -> &Arc<PushQueue> {
        &self.queue
    }

    pub fn capacity(&self) -> &Arc<CapacityCalculator> {
        &self.capacity
    }

    fn host(&self, repo: &RepositoryConfig) -> Result<&HostServices> {
        self.hosts
            .get(&repo.host)
            .ok_or_else(|| Error::unknown_host(&repo.name, &repo.host))
    }

    /// Fresh clone of `repo`; the directory lives as long as the returned guard
    async fn clone_repository(
        &self,
        repo: &RepositoryConfig,
        git: &dyn GitClient,
    ) -> Result<(TempDir, Utf8PathBuf)> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let temp = tempfile::Builder::new()
            .prefix("talos-")
            .tempdir_in(&self.work_dir)?;
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("repo")).map_err(|path| {
            Error::Io(std::io::Error::other(format!(
                "work directory is not UTF-8: {}",
                path.display()
            )))
        })?;
        git.clone_repository(&repo.url, repo.branch.as_deref(), &dir)
            .await?;
        Ok((temp, dir))
    }

    /// Clone `repo`, find every location, and route each available upgrade
    /// by the strategy configured for its bump size.
    ///
    /// Failed scan results, rejected sync groups and locations whose upgrade
    /// cannot be evaluated are logged and counted; they never stop the scan.
    pub async fn scan_repository(&self, repo: &RepositoryConfig) -> Result<ScanReport> {
        let host = self.host(repo)?;
        let (_clone, dir) = self.clone_repository(repo, host.git.as_ref()).await?;
        let base = IdentityBase::new(&repo.url, repo.branch.clone());

        let mut report = ScanReport::default();
        let mut found = Vec::new();
        for scanner in &self.scanners {
            for result in scanner.extract_locations(repo, &base, &dir) {
                match result {
                    Ok(location) => found.push(location),
                    Err(failure) => {
                        report.failures += 1;
                        warn!("{}: skipping {}", repo.name, failure);
                    }
                }
            }
            debug!("{}: {} scanner done", repo.name, scanner.name());
        }
        report.locations = found.len();

        let resolution = resolve_sync_groups(&base, found);
        report.rejected_groups = resolution.rejected.len();
        let locations = resolution
            .standalone
            .into_iter()
            .map(UpdateLocation::Subatomic)
            .chain(resolution.groups.into_iter().map(UpdateLocation::Atomic));

        for location in locations {
            let push = match location.create_scheduled_push(&self.selector).await {
                Ok(Some(push)) => push,
                Ok(None) => {
                    report.no_upgrade += 1;
                    continue;
                }
                Err(e) => {
                    report.errors += 1;
                    warn!("{}: cannot evaluate {}: {}", repo.name, location.identity(), e);
                    continue;
                }
            };

            let strategy = location.settings().strategy_for(push.bump_size);
            match self.route(&push, strategy).await {
                Ok(RouteOutcome::Queued(_)) => report.queued += 1,
                Ok(RouteOutcome::Notified) => report.notified += 1,
                Ok(RouteOutcome::Prompted) => report.prompted += 1,
                Ok(RouteOutcome::AlreadyRaised) => report.already_raised += 1,
                Ok(RouteOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.errors += 1;
                    warn!("{}: cannot route {}: {}", repo.name, push.identity, e);
                }
            }
        }

        info!(
            "{}: {} locations, {} queued, {} notified, {} prompted, {} failures",
            repo.name,
            report.locations,
            report.queued,
            report.notified,
            report.prompted,
            report.failures
        );
        Ok(report)
    }

    /// Act on `push` according to `strategy`
    pub async fn route(&self, push: &ScheduledPush, strategy: BumpStrategy) -> Result<RouteOutcome> {
        let id = push.storage_key();
        match strategy {
            BumpStrategy::Skip => Ok(RouteOutcome::Skipped),
            BumpStrategy::Push => Ok(RouteOutcome::Queued(
                self.queue.upsert_and_enqueue(push).await?,
            )),
            BumpStrategy::Notify => {
                let cached = self.update_data.get(&id).await?;
                if cached.as_ref().is_some_and(|d| d.was_notified_for(push)) {
                    return Ok(RouteOutcome::AlreadyRaised);
                }
                self.sink.notify(push).await?;

                let mut data = cached
                    .filter(|d| d.matches(push))
                    .unwrap_or_else(|| ImageUpdateData::for_push(push));
                data.last_notified = Some(Utc::now());
                self.update_data.put(&id, &data).await?;
                Ok(RouteOutcome::Notified)
            }
            BumpStrategy::Prompt => {
                let cached = self.update_data.get(&id).await?;
                if cached.as_ref().is_some_and(|d| d.has_interaction_for(push)) {
                    return Ok(RouteOutcome::AlreadyRaised);
                }
                if let Some(stale) = cached.and_then(|d| d.interaction) {
                    debug!("Withdrawing stale interaction {}", stale);
                    self.sink.delete_interaction(&stale).await?;
                }

                let interaction = self.sink.create_interaction(push).await?;
                let mut data = ImageUpdateData::for_push(push);
                data.interaction = Some(interaction);
                self.update_data.put(&id, &data).await?;
                Ok(RouteOutcome::Prompted)
            }
        }
    }

    /// Land `pushes`, all targeting `repo`, from one clone.
    ///
    /// A push whose write or commit fails is dead-lettered on its own. A
    /// failure to push to the remote fails the batch and leaves its pushes
    /// queued.
    pub async fn process_batch(
        &self,
        repo: &RepositoryConfig,
        pushes: Vec<ScheduledPush>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        if pushes.is_empty() {
            return Ok(BatchReport::default());
        }
        let host = self.host(repo)?;
        let (_clone, dir) = self.clone_repository(repo, host.git.as_ref()).await?;
        info!("{}: landing {} pushes", repo.name, pushes.len());

        if repo.merge_request {
            self.land_merge_requests(repo, host, &dir, pushes, cancel)
                .await
        } else {
            self.land_direct(repo, host.git.as_ref(), &dir, pushes, cancel)
                .await
        }
    }

    /// Commit the pushes one after another on the cloned branch. They share
    /// one staging buffer, so scan-time offsets stay valid after an earlier
    /// push in the batch changed the same file.
    async fn land_direct(
        &self,
        repo: &RepositoryConfig,
        git: &dyn GitClient,
        dir: &Utf8Path,
        pushes: Vec<ScheduledPush>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let author = author(repo);
        let mut report = BatchReport::default();
        let mut committed = Vec::new();
        let mut buffer = StagingBuffer::new(dir);

        for push in pushes {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match self.commit_push(git, dir, &mut buffer, &push, &author).await? {
                Ok(()) => committed.push(push),
                Err(e) => report.dead_lettered.push(self.dead_letter(push, &e).await?),
            }
        }
        if committed.is_empty() {
            return Ok(report);
        }

        push_with_retry(git, dir).await?;
        for push in committed {
            self.complete(repo, &push).await?;
            report.landed.push(push.storage_key());
        }
        Ok(report)
    }

    async fn land_merge_requests(
        &self,
        repo: &RepositoryConfig,
        host: &HostServices,
        dir: &Utf8Path,
        pushes: Vec<ScheduledPush>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let git = host.git.as_ref();
        let author = author(repo);
        let target = git.current_branch(dir).await?;
        let mut report = BatchReport::default();

        for push in pushes {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let branch = format!("talos/{}", push.identity.short_hash());
            git.checkout(dir, &target).await?;
            git.create_branch(dir, &branch).await?;

            let mut buffer = StagingBuffer::new(dir);
            if let Err(e) = self.commit_push(git, dir, &mut buffer, &push, &author).await? {
                report.dead_lettered.push(self.dead_letter(push, &e).await?);
                continue;
            }
            git.push(
                dir,
                &PushOptions {
                    force: true,
                    set_upstream: true,
                },
            )
            .await?;

            if host
                .api
                .has_open_merge_request_for_branch(&repo.url, &branch)
                .await?
            {
                debug!("Merge request for {} already open", branch);
            } else {
                let request = host
                    .api
                    .create_merge_request_for_branch(
                        &repo.url,
                        &branch,
                        Some(&target),
                        push.commit_title(),
                        push.commit_body().unwrap_or_default(),
                    )
                    .await?;
                report.merge_requests.push(request);
            }

            self.complete(repo, &push).await?;
            report.landed.push(push.storage_key());
        }
        Ok(report)
    }

    /// Stage, write and commit one push. The outer error is fatal for the
    /// batch; the inner one belongs to this push alone, and leaves `buffer`
    /// as it was before the push.
    async fn commit_push(
        &self,
        git: &dyn GitClient,
        dir: &Utf8Path,
        buffer: &mut StagingBuffer,
        push: &ScheduledPush,
        author: &CommitAuthor,
    ) -> Result<std::result::Result<(), Error>> {
        let checkpoint = buffer.clone();
        if let Err(e) = push.writer.stage(buffer) {
            *buffer = checkpoint;
            return Ok(Err(e.into()));
        }
        if let Err(e) = buffer.flush() {
            *buffer = checkpoint;
            git.discard_changes(dir).await?;
            return Ok(Err(e.into()));
        }
        match git.commit_all(dir, &push.commit_message, author).await {
            Ok(true) => Ok(Ok(())),
            Ok(false) => {
                debug!("{} changed nothing", push.commit_title());
                Ok(Ok(()))
            }
            Err(e) => {
                *buffer = checkpoint;
                git.discard_changes(dir).await?;
                Ok(Err(e.into()))
            }
        }
    }

    async fn dead_letter(&self, push: ScheduledPush, error: &Error) -> Result<String> {
        let id = push.storage_key();
        self.queue
            .dead_letter(DeadLetter::from_error(push, error))
            .await?;
        Ok(id)
    }

    /// Bookkeeping once `push` has landed: leave the queue unless a newer
    /// push replaced it meanwhile, count against the throttle windows, and
    /// drop any notification state for it
    pub async fn complete(&self, repo: &RepositoryConfig, push: &ScheduledPush) -> Result<()> {
        let id = push.storage_key();
        self.queue.remove_if_current(push).await?;
        self.capacity
            .record_landed(push, repo.cooldown())
            .await?;

        if let Some(data) = self.update_data.get(&id).await? {
            if let Some(interaction) = &data.interaction {
                if let Err(e) = self.sink.delete_interaction(interaction).await {
                    warn!("Cannot withdraw interaction {}: {}", interaction, e);
                }
            }
            self.update_data.remove(&id).await?;
        }
        info!("{}: landed {}", repo.name, push.commit_title());
        Ok(())
    }
}

fn author(repo: &RepositoryConfig) -> CommitAuthor {
    CommitAuthor {
        name: repo.git_user_name.clone(),
        email: repo.git_user_email.clone(),
    }
}

/// Push, and on a non-fast-forward rejection rebase onto the remote and push once more
async fn push_with_retry(git: &dyn GitClient, dir: &Utf8Path) -> Result<()> {
    match git.push(dir, &PushOptions::default()).await {
        Err(talos_git::Error::NonFastForward { branch, .. }) => {
            info!("{} moved on the remote, rebasing and retrying", branch);
            git.pull(dir, true).await?;
            git.push(dir, &PushOptions::default()).await?;
            Ok(())
        }
        result => Ok(result?),
    }
}
