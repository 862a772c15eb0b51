//! Registry and working-tree fixtures

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use talos_core::types::{FileGlobs, RepositoryConfig};
use talos_image::{CandidateSelector, Error, ImageInspection, ImageRegistry, ParsedImage, Result, TagParser};
use talos_locations::{default_scanners, IdentityBase, SubatomicLocation};
use tempfile::TempDir;

/// Registry answering from a fixed table of `untagged -> [(tag, digest)]`
#[derive(Default)]
pub struct StaticRegistry {
    images: HashMap<String, Vec<(String, String)>>,
}

impl StaticRegistry {
    pub fn with_image(mut self, untagged: &str, tags: &[(&str, &str)]) -> Self {
        self.images.insert(
            untagged.to_string(),
            tags.iter()
                .map(|(t, d)| (t.to_string(), d.to_string()))
                .collect(),
        );
        self
    }

    pub fn standard() -> Self {
        Self::default()
            .with_image(
                "image2",
                &[("latest", "sha:001"), ("stable", "sha:002"), ("debian", "sha:003")],
            )
            .with_image(
                "image3",
                &[
                    ("v2.3.3", "sha:002"),
                    ("v2.3.4", "sha:006"),
                    ("v2.3.5", "sha:003"),
                    ("v2.4.0", "sha:004"),
                    ("v3.0.0", "sha:005"),
                ],
            )
            .with_image(
                "app",
                &[("v1.0.0", "sha:020"), ("v1.1.0", "sha:021"), ("v2.0.0", "sha:022")],
            )
            .with_image("app-worker", &[("v1.0.0", "sha:030"), ("v1.1.0", "sha:031")])
            .with_image("app-mirror", &[("v1.0.0", "sha:020"), ("v1.1.0", "sha:021")])
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

pub fn selector() -> CandidateSelector {
    CandidateSelector::new(Arc::new(StaticRegistry::standard()), TagParser::default())
}

pub fn base() -> IdentityBase {
    IdentityBase::new("https://git.example.com/acme/deploy.git", Some("main".to_string()))
}

/// Repository scanning the default Dockerfile and Compose globs plus `**/*.values.yaml`
pub fn repository() -> RepositoryConfig {
    RepositoryConfig {
        name: "deploy".to_string(),
        url: "https://git.example.com/acme/deploy.git".to_string(),
        host: "example".to_string(),
        branch: Some("main".to_string()),
        merge_request: false,
        cooldown_secs: 0,
        git_user_name: "Talos".to_string(),
        git_user_email: "talos@localhost".to_string(),
        dockerfile: FileGlobs::including(&["**/Dockerfile"]),
        compose: FileGlobs::including(&["**/docker-compose.yml"]),
        yaml: FileGlobs::including(&["**/*.values.yaml"]),
    }
}

/// A temporary working tree
pub struct WorkTree {
    _temp: TempDir,
    pub root: Utf8PathBuf,
}

impl WorkTree {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap().to_owned();
        let tree = Self { _temp: temp, root };
        for (path, content) in files {
            tree.write(path, content);
        }
        tree
    }

    pub fn write(&self, path: &str, content: &str) {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        fs::read_to_string(self.root.join(path)).unwrap()
    }

    /// Every location the default scanners find, panicking on scan failures
    pub fn scan(&self) -> Vec<SubatomicLocation> {
        let repo = repository();
        default_scanners(&TagParser::default())
            .iter()
            .flat_map(|s| s.extract_locations(&repo, &base(), &self.root))
            .map(|r| r.unwrap_or_else(|f| panic!("scan failure: {}", f)))
            .collect()
    }
}
