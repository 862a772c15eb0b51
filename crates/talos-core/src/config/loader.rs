//! Configuration file loading and parsing
//!
//! Precedence (low to high):
//! 1. Serde defaults
//! 2. talos.yaml (explicit path, or searched upward from the working directory)
//! 3. Environment variables (TALOS_* prefix)

use crate::error::{Error, Result};
use crate::types::TalosConfig;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashSet;
use std::env;
use std::fs;
use tracing::debug;

/// Configuration file names to search for
pub const CONFIG_FILE_NAMES: &[&str] = &["talos.yaml", "talos.yml"];

/// Loaded and validated Talos configuration
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The parsed configuration, environment overrides applied
    pub config: TalosConfig,

    /// Path to the configuration file
    pub config_path: Utf8PathBuf,

    /// Resolved directory for persistent state
    pub state_dir: Utf8PathBuf,
}

impl LoadedConfig {
    /// Load configuration from the specified path or search for it
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let (config_path, content) = if let Some(p) = path {
            let content = fs::read_to_string(p).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::config_not_found(p.as_str())
                } else {
                    Error::Io(e)
                }
            })?;
            (p.to_owned(), content)
        } else {
            Self::find_config()?
        };

        Self::parse(&content, config_path)
    }

    /// Parse configuration text, apply environment overrides, and validate
    pub fn parse(content: &str, config_path: Utf8PathBuf) -> Result<Self> {
        let config: TalosConfig = serde_yaml_ng::from_str(content)?;
        let config = apply_env_overrides(config)?;
        validate(&config)?;

        let state_dir = match &config.state_dir {
            Some(dir) => dir.clone(),
            None => default_state_dir()?,
        };

        debug!(
            "Loaded configuration from {} ({} repositories)",
            config_path,
            config.repositories.len()
        );

        Ok(Self {
            config,
            config_path,
            state_dir,
        })
    }

    /// Find configuration file in current directory or parent directories
    fn find_config() -> Result<(Utf8PathBuf, String)> {
        let cwd = env::current_dir().map_err(Error::Io)?;
        let cwd = Utf8PathBuf::try_from(cwd)
            .map_err(|_| Error::invalid_config("Current directory path is not valid UTF-8"))?;

        let mut current = cwd.as_path();

        loop {
            for name in CONFIG_FILE_NAMES {
                let path = current.join(name);
                if path.exists() {
                    let content = fs::read_to_string(&path)?;
                    return Ok((path, content));
                }
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Err(Error::config_not_found(
            "talos.yaml (searched current and parent directories)",
        ))
    }

    /// Path of the file-backed store inside the state directory
    pub fn store_path(&self) -> Utf8PathBuf {
        self.state_dir.join("store.json")
    }
}

/// Default state directory (~/.talos)
fn default_state_dir() -> Result<Utf8PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
    let home = Utf8PathBuf::try_from(home)
        .map_err(|_| Error::invalid_config("Home directory path is not valid UTF-8"))?;
    Ok(home.join(".talos"))
}

/// Apply environment variable overrides
fn apply_env_overrides(mut config: TalosConfig) -> Result<TalosConfig> {
    if let Ok(val) = env::var("TALOS_STATE_DIR") {
        config.state_dir = Some(Utf8PathBuf::from(val));
    }

    if let Ok(val) = env::var("TALOS_SCAN_INTERVAL_SECS") {
        config.scan.interval_secs = val
            .parse()
            .map_err(|_| Error::invalid_config("TALOS_SCAN_INTERVAL_SECS must be a valid number"))?;
    }

    if let Ok(val) = env::var("TALOS_QUEUE_POLL_INTERVAL_SECS") {
        config.queue.poll_interval_secs = val.parse().map_err(|_| {
            Error::invalid_config("TALOS_QUEUE_POLL_INTERVAL_SECS must be a valid number")
        })?;
    }

    if let Ok(val) = env::var("TALOS_RELEASE_NAMES") {
        config.registry.release_names = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    // Host tokens: TALOS_HOST_<NAME>_TOKEN, name upper-cased with '-' as '_'
    for (name, host) in config.hosts.iter_mut() {
        let var = format!(
            "TALOS_HOST_{}_TOKEN",
            name.to_uppercase().replace(['-', '.'], "_")
        );
        if let Ok(token) = env::var(&var) {
            host.token = Some(token);
        }
    }

    Ok(config)
}

/// Reject configurations the daemon cannot act on
fn validate(config: &TalosConfig) -> Result<()> {
    let mut names = HashSet::new();
    for repo in &config.repositories {
        if !names.insert(repo.name.as_str()) {
            return Err(Error::invalid_config(format!(
                "Duplicate repository name: {}",
                repo.name
            )));
        }
        if !config.hosts.contains_key(&repo.host) {
            return Err(Error::invalid_config(format!(
                "Repository '{}' references unknown host '{}'",
                repo.name, repo.host
            )));
        }
    }

    if !config
        .registry
        .release_names
        .contains(&config.registry.default_release)
    {
        return Err(Error::invalid_config(format!(
            "Default release '{}' is not listed in release-names",
            config.registry.default_release
        )));
    }

    for (domain, limit) in &config.throttle {
        if limit.limit == 0 {
            return Err(Error::invalid_config(format!(
                "Throttle limit for {} must be greater than zero",
                domain
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
state-dir: /var/lib/talos
hosts:
  github:
    kind: github
repositories:
  - name: web
    url: https://github.com/acme/web.git
    host: github
    merge-request: true
"#;

    fn clear_env() {
        for var in [
            "TALOS_STATE_DIR",
            "TALOS_SCAN_INTERVAL_SECS",
            "TALOS_QUEUE_POLL_INTERVAL_SECS",
            "TALOS_RELEASE_NAMES",
            "TALOS_HOST_GITHUB_TOKEN",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("talos.yaml")).unwrap();
        fs::write(&path, SAMPLE).unwrap();

        let loaded = LoadedConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.state_dir, Utf8PathBuf::from("/var/lib/talos"));
        assert_eq!(loaded.store_path(), Utf8PathBuf::from("/var/lib/talos/store.json"));
        assert!(loaded.config.repositories[0].merge_request);
    }

    #[test]
    #[serial]
    fn test_missing_file() {
        let result = LoadedConfig::load(Some(Utf8Path::new("/nonexistent/talos.yaml")));
        assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("TALOS_STATE_DIR", "/tmp/talos-state");
        env::set_var("TALOS_QUEUE_POLL_INTERVAL_SECS", "5");
        env::set_var("TALOS_RELEASE_NAMES", "latest, stable ,");
        env::set_var("TALOS_HOST_GITHUB_TOKEN", "secret");

        let loaded = LoadedConfig::parse(SAMPLE, Utf8PathBuf::from("talos.yaml")).unwrap();
        clear_env();

        assert_eq!(loaded.state_dir, Utf8PathBuf::from("/tmp/talos-state"));
        assert_eq!(loaded.config.queue.poll_interval_secs, 5);
        assert_eq!(
            loaded.config.registry.release_names,
            vec!["latest".to_string(), "stable".to_string()]
        );
        assert_eq!(
            loaded.config.hosts["github"].token.as_deref(),
            Some("secret")
        );
    }

    #[test]
    #[serial]
    fn test_invalid_env_override() {
        clear_env();
        env::set_var("TALOS_SCAN_INTERVAL_SECS", "soon");
        let result = LoadedConfig::parse(SAMPLE, Utf8PathBuf::from("talos.yaml"));
        clear_env();
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    #[serial]
    fn test_unknown_host_rejected() {
        clear_env();
        let yaml = r#"
repositories:
  - name: web
    url: https://github.com/acme/web.git
    host: nowhere
"#;
        let err = LoadedConfig::parse(yaml, Utf8PathBuf::from("talos.yaml")).unwrap_err();
        assert!(err.to_string().contains("unknown host"));
    }

    #[test]
    #[serial]
    fn test_default_release_must_be_whitelisted() {
        clear_env();
        let yaml = r#"
registry:
  release-names: [stable]
  default-release: latest
"#;
        let err = LoadedConfig::parse(yaml, Utf8PathBuf::from("talos.yaml")).unwrap_err();
        assert!(err.to_string().contains("release-names"));
    }
}
