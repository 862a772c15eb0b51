use super::{scan_files, settings_above, split_lines, LocationScanner, ScanFailure, ScanResult};
use crate::identity::{IdentityBase, LocationKind, UpdateIdentity};
use crate::location::{DockerfileLocation, Snapshot, SubatomicLocation};
use camino::Utf8Path;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use talos_core::types::RepositoryConfig;
use talos_image::{ParsedImage, TagParser};
use tracing::trace;

static FROM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*FROM\s+(?:--\S+\s+)*(?P<image>\S+)(?:\s+AS\s+(?P<alias>\S+))?\s*$")
        .expect("FROM regex is valid")
});

/// Finds `FROM` images in Dockerfiles
pub struct DockerfileScanner {
    tags: TagParser,
}

impl DockerfileScanner {
    pub fn new(tags: TagParser) -> Self {
        Self { tags }
    }

    /// Scan one Dockerfile's content
    pub fn scan_content(&self, base: &IdentityBase, file: &Utf8Path, content: &str) -> Vec<ScanResult> {
        let lines = split_lines(content);
        let mut stages: HashSet<String> = HashSet::new();
        let mut results = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let Some(caps) = FROM_RE.captures(line) else {
                continue;
            };
            let Some(image) = caps.name("image") else {
                continue;
            };
            let text = image.as_str();
            let is_stage = stages.contains(&text.to_lowercase());
            if let Some(alias) = caps.name("alias") {
                stages.insert(alias.as_str().to_lowercase());
            }
            if is_stage || text.eq_ignore_ascii_case("scratch") {
                continue;
            }

            let failure = |reason: String| Err(ScanFailure::new(file, Some(index + 1), reason));

            let settings = match settings_above(&lines, index) {
                Ok(settings) => settings,
                Err(reason) => {
                    results.push(failure(reason));
                    continue;
                }
            };
            if settings.skip {
                trace!("Skipping {}:{}", file, index + 1);
                continue;
            }
            if ParsedImage::try_parse(text, false, &self.tags).is_none() {
                results.push(failure(format!("'{}' is not a usable image reference", text)));
                continue;
            }

            let identity = UpdateIdentity::new(
                base,
                LocationKind::Dockerfile,
                &[file.as_str(), &index.to_string()],
                format!("{}:{}", file, index + 1),
            );
            results.push(Ok(SubatomicLocation::Dockerfile(DockerfileLocation {
                identity,
                settings,
                file: file.to_owned(),
                line: index,
                column: image.start(),
                snapshot: Snapshot {
                    image: text.to_string(),
                    line: Some(line.to_string()),
                },
            })));
        }

        results
    }
}

impl LocationScanner for DockerfileScanner {
    fn name(&self) -> &'static str {
        "dockerfile"
    }

    fn extract_locations(
        &self,
        repo: &RepositoryConfig,
        base: &IdentityBase,
        working_dir: &Utf8Path,
    ) -> Vec<ScanResult> {
        scan_files(working_dir, &repo.dockerfile, |file, content| {
            self.scan_content(base, file, content)
        })
    }
}
