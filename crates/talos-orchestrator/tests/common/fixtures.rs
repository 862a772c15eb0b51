//! Registry fixture and a fully wired orchestrator

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::Arc;
use super::mocks::{MockGit, MockHost, RecordingSink};
use talos_core::types::{FileGlobs, QueueConfig, RepositoryConfig, ThrottleLimit};
use talos_core::{MemoryStore, Store, TalosConfig};
use talos_image::{CandidateSelector, Error, ImageInspection, ImageRegistry, ParsedImage, Result, TagParser};
use talos_orchestrator::{HostServices, Orchestrator, Scheduler};
use talos_queue::{CapacityCalculator, PushQueue, UpdateDataCache};
use tempfile::TempDir;

pub const REMOTE: &str = "https://git.example.com/acme/deploy.git";

/// Registry answering from a fixed table of `untagged -> [(tag, digest)]`
pub struct StaticRegistry {
    images: HashMap<String, Vec<(String, String)>>,
}

impl StaticRegistry {
    pub fn standard() -> Self {
        let mut images = HashMap::new();
        for (name, tags) in [
            ("app", vec![("v1.0.0", "sha:020"), ("v1.1.0", "sha:021"), ("v2.0.0", "sha:022")]),
            ("cache", vec![("v3.0.0", "sha:040"), ("v3.1.0", "sha:041")]),
        ] {
            images.insert(
                name.to_string(),
                tags.into_iter()
                    .map(|(t, d)| (t.to_string(), d.to_string()))
                    .collect(),
            );
        }
        Self { images }
    }
}

pub fn created_at_for(digest: &str) -> DateTime<Utc> {
    let n: i64 = digest
        .rsplit(':')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    Utc.timestamp_opt(1_700_000_000 + n * 60, 0).unwrap()
}

#[async_trait]
impl ImageRegistry for StaticRegistry {
    async fn list_tags(&self, image: &ParsedImage) -> Result<Vec<String>> {
        self.images
            .get(image.untagged())
            .map(|tags| tags.iter().map(|(t, _)| t.clone()).collect())
            .ok_or_else(|| Error::registry(format!("unknown image {}", image.untagged())))
    }

    async fn inspect(&self, image: &ParsedImage) -> Result<ImageInspection> {
        let tag = image
            .tag()
            .map(|t| t.to_string())
            .ok_or_else(|| Error::registry("inspect without tag"))?;
        self.images
            .get(image.untagged())
            .and_then(|tags| tags.iter().find(|(t, _)| *t == tag))
            .map(|(_, digest)| ImageInspection {
                digest: digest.clone(),
                created_at: created_at_for(digest),
            })
            .ok_or_else(|| Error::registry(format!("unknown tag {}", image)))
    }
}

pub fn repository() -> RepositoryConfig {
    RepositoryConfig {
        name: "deploy".to_string(),
        url: REMOTE.to_string(),
        host: "example".to_string(),
        branch: Some("main".to_string()),
        merge_request: false,
        cooldown_secs: 0,
        git_user_name: "Talos".to_string(),
        git_user_email: "talos@localhost".to_string(),
        dockerfile: FileGlobs::including(&["**/Dockerfile"]),
        compose: FileGlobs::including(&["**/docker-compose.yml"]),
        yaml: FileGlobs::default(),
    }
}

/// Dockerfile moving `image` under the compact annotation `annotation`
pub fn dockerfile(annotation: &str, image: &str) -> String {
    format!("# talos {}\nFROM {}\n", annotation, image)
}

/// An orchestrator over a directory remote, a memory store and recording doubles
pub struct Harness {
    _remote: TempDir,
    _work: TempDir,
    pub remote: Utf8PathBuf,
    pub repo: RepositoryConfig,
    pub store: Arc<dyn Store>,
    pub git: Arc<MockGit>,
    pub host: Arc<MockHost>,
    pub sink: Arc<RecordingSink>,
    pub orchestrator: Arc<Orchestrator>,
    pub throttle: BTreeMap<String, ThrottleLimit>,
}

impl Harness {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self::build(files, repository(), BTreeMap::new())
    }

    pub fn build(
        files: &[(&str, &str)],
        repo: RepositoryConfig,
        throttle: BTreeMap<String, ThrottleLimit>,
    ) -> Self {
        let remote_dir = TempDir::new().unwrap();
        let work_dir = TempDir::new().unwrap();
        let remote = Utf8Path::from_path(remote_dir.path()).unwrap().to_owned();
        let work = Utf8Path::from_path(work_dir.path()).unwrap().to_owned();

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let git = Arc::new(MockGit::new(remote.clone()));
        let host = Arc::new(MockHost::default());
        let sink = Arc::new(RecordingSink::default());

        let selector = Arc::new(CandidateSelector::new(
            Arc::new(StaticRegistry::standard()),
            TagParser::default(),
        ));
        let queue = Arc::new(PushQueue::new(Arc::clone(&store), queue_config()));
        let capacity = Arc::new(CapacityCalculator::new(Arc::clone(&store), throttle.clone()));
        let update_data = Arc::new(UpdateDataCache::new(Arc::clone(&store)));

        let orchestrator = Orchestrator::new(selector, queue, capacity, update_data, sink.clone(), work)
            .with_host(
                "example",
                HostServices {
                    git: git.clone(),
                    api: host.clone(),
                },
            );

        let harness = Self {
            _remote: remote_dir,
            _work: work_dir,
            remote,
            repo,
            store,
            git,
            host,
            sink,
            orchestrator: Arc::new(orchestrator),
            throttle,
        };
        for (path, content) in files {
            harness.write_remote(path, content);
        }
        harness
    }

    pub fn write_remote(&self, path: &str, content: &str) {
        let full = self.remote.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    pub fn read_remote(&self, path: &str) -> String {
        fs::read_to_string(self.remote.join(path)).unwrap()
    }

    pub fn config(&self) -> TalosConfig {
        TalosConfig {
            queue: queue_config(),
            throttle: self.throttle.clone(),
            repositories: vec![self.repo.clone()],
            ..Default::default()
        }
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(Arc::clone(&self.orchestrator), Arc::new(self.config()))
    }
}

pub fn queue_config() -> QueueConfig {
    QueueConfig {
        poll_interval_secs: 1,
        lock_ttl_secs: 60,
        lock_timeout_secs: 1,
    }
}
