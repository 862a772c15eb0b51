//! The scan loop and the queue consumer
//!
//! Both loops run until the cancellation token fires. A scan never overlaps
//! another scan, and every queue pass holds the queue lock for its whole
//! duration so that two Talos processes sharing a store never land the
//! same push twice.

use crate::error::Result;
use crate::orchestrator::{BatchReport, Orchestrator, ScanReport};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use talos_core::types::RepositoryConfig;
use talos_core::TalosConfig;
use talos_locations::ScheduledPush;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one queue pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// Repository batches attempted
    pub groups: usize,
    /// Pushes left queued by cooldown, capacity or a missing repository
    pub withheld: usize,
    pub landed: usize,
    pub dead_lettered: usize,
    /// Batches that failed as a whole; their pushes stay queued
    pub failed_groups: usize,
}

/// Runs the orchestrator on a schedule
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    config: Arc<TalosConfig>,
    scanning: AtomicBool,
}

/// Clears the scanning flag however the scan ends
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, config: Arc<TalosConfig>) -> Self {
        Self {
            orchestrator,
            config,
            scanning: AtomicBool::new(false),
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Scan every configured repository concurrently.
    ///
    /// Returns `None` without scanning when a scan is already running.
    /// A repository that fails to scan is logged and reported as an error.
    pub async fn scan_all(&self) -> Option<Vec<(String, Result<ScanReport>)>> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous scan still running, skipping this one");
            return None;
        }
        let _guard = ScanGuard(&self.scanning);

        let scans = self.config.repositories.iter().map(|repo| async move {
            let result = self.orchestrator.scan_repository(repo).await;
            if let Err(e) = &result {
                error!("Scan of {} failed: {}", repo.name, e);
            }
            (repo.name.clone(), result)
        });
        Some(join_all(scans).await)
    }

    /// One pass over the queue under the queue lock
    pub async fn drain(&self, cancel: &CancellationToken) -> Result<DrainReport> {
        let queue = self.orchestrator.queue();
        let lock = queue.acquire_lock().await?;
        let result = self.drain_locked(cancel).await;
        if !queue.release_lock(lock).await? {
            warn!("Queue lock expired before the pass finished");
        }
        result
    }

    async fn drain_locked(&self, cancel: &CancellationToken) -> Result<DrainReport> {
        let queued = self.orchestrator.queue().queued().await?;
        let mut report = DrainReport::default();
        if queued.is_empty() {
            return Ok(report);
        }

        let mut by_target: BTreeMap<(String, Option<String>), Vec<ScheduledPush>> = BTreeMap::new();
        for push in queued {
            let target = (
                push.identity.git_remote_url.clone(),
                push.identity.git_branch.clone(),
            );
            by_target.entry(target).or_default().push(push);
        }

        let capacity = self.orchestrator.capacity();
        let mut remaining = capacity.calculate().await?;
        let mut batches: Vec<(&RepositoryConfig, Vec<ScheduledPush>)> = Vec::new();

        for ((remote, branch), pushes) in by_target {
            let Some(repo) = self.repository_for(&remote, branch.as_deref()) else {
                warn!("No configured repository for {}, leaving {} pushes", remote, pushes.len());
                report.withheld += pushes.len();
                continue;
            };
            if capacity
                .in_cooldown(&remote, branch.as_deref(), repo.cooldown())
                .await?
            {
                debug!("{} is cooling down", repo.name);
                report.withheld += pushes.len();
                continue;
            }

            let (admitted, withheld): (Vec<_>, Vec<_>) =
                pushes.into_iter().partition(|p| remaining.try_reserve(p));
            if !withheld.is_empty() {
                debug!("{}: {} pushes over registry capacity", repo.name, withheld.len());
            }
            report.withheld += withheld.len();
            if !admitted.is_empty() {
                batches.push((repo, admitted));
            }
        }

        report.groups = batches.len();
        let runs = batches.into_iter().map(|(repo, pushes)| async move {
            let result = self.orchestrator.process_batch(repo, pushes, cancel).await;
            (repo, result)
        });

        for (repo, result) in join_all(runs).await {
            match result {
                Ok(BatchReport {
                    landed,
                    dead_lettered,
                    ..
                }) => {
                    report.landed += landed.len();
                    report.dead_lettered += dead_lettered.len();
                }
                Err(e) => {
                    error!("Batch for {} failed, pushes stay queued: {}", repo.name, e);
                    report.failed_groups += 1;
                }
            }
        }

        info!(
            "Queue pass: {} landed, {} dead-lettered, {} withheld",
            report.landed, report.dead_lettered, report.withheld
        );
        Ok(report)
    }

    fn repository_for(&self, remote: &str, branch: Option<&str>) -> Option<&RepositoryConfig> {
        self.config
            .repositories
            .iter()
            .find(|r| r.url == remote && r.branch.as_deref() == branch)
    }

    /// Run the scan loop and the queue consumer until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Scanning {} repositories every {:?}, polling the queue every {:?}",
            self.config.repositories.len(),
            self.config.scan.interval(),
            self.config.queue.poll_interval()
        );
        tokio::join!(self.scan_loop(&cancel), self.consumer_loop(&cancel));
        info!("Stopped");
    }

    async fn scan_loop(&self, cancel: &CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.scan_all() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.scan.interval()) => {}
            }
        }
    }

    async fn consumer_loop(&self, cancel: &CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.queue.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.drain(cancel).await {
                error!("Queue pass failed: {}", e);
            }
        }
    }
}
