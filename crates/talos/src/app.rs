//! Wiring configuration into a running orchestrator

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::sync::Arc;
use talos_core::types::{HostConfig, HostKind};
use talos_core::{FileStore, LoadedConfig, Store};
use talos_git::{host_for, GitCli, GitCredentials};
use talos_image::{CachedRegistry, CandidateSelector, HttpRegistryClient, TagParser};
use talos_orchestrator::{HostServices, LoggingSink, Orchestrator, Scheduler};
use talos_queue::{CapacityCalculator, PushQueue, UpdateDataCache};
use tracing::debug;

/// Everything a command needs, built from one loaded configuration
pub struct App {
    pub loaded: LoadedConfig,
    pub queue: Arc<PushQueue>,
    pub orchestrator: Arc<Orchestrator>,
}

impl App {
    pub fn load(config: Option<&Utf8Path>) -> Result<Self> {
        let loaded = LoadedConfig::load(config).context("Failed to load configuration")?;
        Self::build(loaded)
    }

    pub fn build(loaded: LoadedConfig) -> Result<Self> {
        let config = &loaded.config;
        let store_path = loaded.store_path();
        let store: Arc<dyn Store> = Arc::new(
            FileStore::open(&store_path)
                .with_context(|| format!("Failed to open store at {}", store_path))?,
        );

        let http = HttpRegistryClient::new(&config.registry)
            .context("Failed to create registry client")?;
        let registry = CachedRegistry::new(
            Arc::new(http),
            Arc::clone(&store),
            config.registry.cache_ttl(),
        );
        let selector = Arc::new(CandidateSelector::new(
            Arc::new(registry),
            TagParser::from_config(&config.registry),
        ));

        let queue = Arc::new(PushQueue::new(Arc::clone(&store), config.queue.clone()));
        let capacity = Arc::new(CapacityCalculator::new(
            Arc::clone(&store),
            config.throttle.clone(),
        ));
        let update_data = Arc::new(UpdateDataCache::new(Arc::clone(&store)));

        let mut orchestrator = Orchestrator::new(
            selector,
            Arc::clone(&queue),
            capacity,
            update_data,
            Arc::new(LoggingSink),
            loaded.state_dir.join("work"),
        );
        for (name, host) in &config.hosts {
            let git = GitCli::new()
                .context("git is required")?
                .with_credentials(credentials(host));
            let api = host_for(host).with_context(|| format!("Failed to set up host '{}'", name))?;
            debug!("Host {} ({:?}) at {}", name, host.kind, host.api_base());
            orchestrator = orchestrator.with_host(
                name.clone(),
                HostServices {
                    git: Arc::new(git),
                    api,
                },
            );
        }

        Ok(Self {
            loaded,
            queue,
            orchestrator: Arc::new(orchestrator),
        })
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            Arc::clone(&self.orchestrator),
            Arc::new(self.loaded.config.clone()),
        )
    }
}

/// HTTPS credentials for a host token. Both services accept the token as
/// the password under a fixed user name.
fn credentials(host: &HostConfig) -> Option<GitCredentials> {
    let token = host.token.clone()?;
    let username = host.username.clone().unwrap_or_else(|| match host.kind {
        HostKind::Github => "x-access-token".to_string(),
        HostKind::Gitlab => "oauth2".to_string(),
    });
    Some(GitCredentials { username, token })
}
