//! Configuration types for talos.yaml

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root of talos.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TalosConfig {
    /// Directory holding the persistent store (defaults to ~/.talos)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<Utf8PathBuf>,

    /// Repository scan loop
    #[serde(default)]
    pub scan: ScanConfig,

    /// Push queue consumer
    #[serde(default)]
    pub queue: QueueConfig,

    /// Registry access and tag interpretation
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Per registry domain push limits
    #[serde(default)]
    pub throttle: BTreeMap<String, ThrottleLimit>,

    /// Git hosts, keyed by name
    #[serde(default)]
    pub hosts: BTreeMap<String, HostConfig>,

    /// Repositories to watch
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

/// Repository scan loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScanConfig {
    /// Delay between the end of one scan and the start of the next
    #[serde(default = "default_scan_interval")]
    pub interval_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_scan_interval(),
        }
    }
}

impl ScanConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_scan_interval() -> u64 {
    3600 // 1 hour
}

/// Push queue consumer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueueConfig {
    /// Interval between queue passes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Lifetime of the queue lock; a crashed holder releases it after this
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,

    /// How long to wait for the queue lock before giving up
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            lock_ttl_secs: default_lock_ttl(),
            lock_timeout_secs: default_lock_timeout(),
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

fn default_poll_interval() -> u64 {
    30
}
fn default_lock_ttl() -> u64 {
    900 // 15 minutes
}
fn default_lock_timeout() -> u64 {
    30
}

/// Registry access settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegistryConfig {
    /// Tags treated as named releases rather than versions
    #[serde(default = "default_release_names")]
    pub release_names: Vec<String>,

    /// Release followed by references that carry no tag
    #[serde(default = "default_release")]
    pub default_release: String,

    /// Lifetime of cached tag lists and inspections
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// HTTP timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// User agent string for registry requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Credentials keyed by registry domain
    #[serde(default)]
    pub credentials: BTreeMap<String, RegistryCredentials>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            release_names: default_release_names(),
            default_release: default_release(),
            cache_ttl_secs: default_cache_ttl(),
            http_timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
            credentials: BTreeMap::new(),
        }
    }
}

impl RegistryConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_release_names() -> Vec<String> {
    ["latest", "stable", "edge", "lts", "mainline", "nightly"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_release() -> String {
    "latest".to_string()
}
fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}
fn default_http_timeout() -> u64 {
    60
}
fn default_user_agent() -> String {
    format!(
        "talos/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Basic credentials for a registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

/// Push limit for one registry domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleLimit {
    /// Pushes allowed per period
    pub limit: u32,
    pub per: ThrottlePeriod,
}

impl ThrottleLimit {
    pub fn window(&self) -> Duration {
        self.per.as_duration()
    }
}

/// Sliding window length for a throttle limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottlePeriod {
    Second,
    Minute,
    Hour,
    Day,
}

impl ThrottlePeriod {
    pub fn as_duration(&self) -> Duration {
        match self {
            Self::Second => Duration::from_secs(1),
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(3600),
            Self::Day => Duration::from_secs(86_400),
        }
    }
}

/// Kind of git host API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Github,
    Gitlab,
}

/// A git host and the credentials Talos uses against it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostConfig {
    pub kind: HostKind,

    /// API base URL; defaults to the public service of `kind`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Username for HTTPS git operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Access token for git operations and the API
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl HostConfig {
    /// API base URL for this host
    pub fn api_base(&self) -> String {
        match (&self.api_url, self.kind) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, HostKind::Github) => "https://api.github.com".to_string(),
            (None, HostKind::Gitlab) => "https://gitlab.com/api/v4".to_string(),
        }
    }
}

/// Include/exclude glob lists for one file kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileGlobs {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl FileGlobs {
    pub fn including(patterns: &[&str]) -> Self {
        Self {
            include: patterns.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
        }
    }
}

/// A watched repository
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepositoryConfig {
    /// Display name
    pub name: String,

    /// Git remote URL
    pub url: String,

    /// Name of the entry in `hosts`
    pub host: String,

    /// Branch to update; the remote default branch when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Open a merge request per update instead of pushing directly
    #[serde(default)]
    pub merge_request: bool,

    /// Minimum delay between two landed pushes on this repository
    #[serde(default)]
    pub cooldown_secs: u64,

    /// Commit author name
    #[serde(default = "default_git_user_name")]
    pub git_user_name: String,

    /// Commit author email
    #[serde(default = "default_git_user_email")]
    pub git_user_email: String,

    #[serde(default = "default_dockerfile_globs")]
    pub dockerfile: FileGlobs,

    #[serde(default = "default_compose_globs")]
    pub compose: FileGlobs,

    /// Generic YAML files; nothing is scanned unless configured
    #[serde(default)]
    pub yaml: FileGlobs,
}

impl RepositoryConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

fn default_git_user_name() -> String {
    "Talos".to_string()
}
fn default_git_user_email() -> String {
    "talos@localhost".to_string()
}
fn default_dockerfile_globs() -> FileGlobs {
    FileGlobs::including(&["**/Dockerfile", "**/Dockerfile.*", "**/*.Dockerfile"])
}
fn default_compose_globs() -> FileGlobs {
    FileGlobs::including(&[
        "**/docker-compose*.yml",
        "**/docker-compose*.yaml",
        "**/compose*.yml",
        "**/compose*.yaml",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: TalosConfig = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(config.scan.interval_secs, 3600);
        assert_eq!(config.queue.poll_interval_secs, 30);
        assert_eq!(config.registry.default_release, "latest");
        assert!(config.registry.release_names.contains(&"stable".to_string()));
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn test_repository_defaults() {
        let yaml = r#"
repositories:
  - name: web
    url: https://github.com/acme/web.git
    host: github
"#;
        let config: TalosConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let repo = &config.repositories[0];
        assert!(!repo.merge_request);
        assert_eq!(repo.cooldown_secs, 0);
        assert!(repo.dockerfile.include.contains(&"**/Dockerfile".to_string()));
        assert!(repo.yaml.include.is_empty());
    }

    #[test]
    fn test_throttle_limits() {
        let yaml = r#"
throttle:
  docker.io:
    limit: 10
    per: hour
"#;
        let config: TalosConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let limit = config.throttle["docker.io"];
        assert_eq!(limit.limit, 10);
        assert_eq!(limit.window(), Duration::from_secs(3600));
    }

    #[test]
    fn test_host_api_base() {
        let github = HostConfig {
            kind: HostKind::Github,
            api_url: None,
            username: None,
            token: None,
        };
        assert_eq!(github.api_base(), "https://api.github.com");

        let gitlab = HostConfig {
            kind: HostKind::Gitlab,
            api_url: Some("https://git.example.com/api/v4/".to_string()),
            username: None,
            token: None,
        };
        assert_eq!(gitlab.api_base(), "https://git.example.com/api/v4");
    }
}
