use super::{scan_files, settings_above, split_lines, LocationScanner, ScanFailure, ScanResult};
use crate::identity::{IdentityBase, LocationKind, UpdateIdentity};
use crate::location::compose::scan_services;
use crate::location::{ComposeLocation, Snapshot, SubatomicLocation};
use camino::Utf8Path;
use talos_core::types::RepositoryConfig;
use talos_image::{ParsedImage, TagParser};
use tracing::trace;

/// Finds service images in Compose files
pub struct ComposeScanner {
    tags: TagParser,
}

impl ComposeScanner {
    pub fn new(tags: TagParser) -> Self {
        Self { tags }
    }

    /// Scan one Compose file's content
    pub fn scan_content(&self, base: &IdentityBase, file: &Utf8Path, content: &str) -> Vec<ScanResult> {
        let lines = split_lines(content);
        let mut results = Vec::new();

        for found in scan_services(content).images {
            let line_number = Some(found.line + 1);
            let settings = match settings_above(&lines, found.line) {
                Ok(settings) => settings,
                Err(reason) => {
                    results.push(Err(ScanFailure::new(file, line_number, reason)));
                    continue;
                }
            };
            if settings.skip {
                trace!("Skipping service {} in {}", found.service, file);
                continue;
            }

            let (start, end) = match found.span {
                Ok(span) => span,
                Err(reason) => {
                    results.push(Err(ScanFailure::new(
                        file,
                        line_number,
                        format!("service '{}': {}", found.service, reason),
                    )));
                    continue;
                }
            };
            let text = &content[start..end];
            if ParsedImage::try_parse(text, false, &self.tags).is_none() {
                results.push(Err(ScanFailure::new(
                    file,
                    line_number,
                    format!("'{}' is not a usable image reference", text),
                )));
                continue;
            }

            let identity = UpdateIdentity::new(
                base,
                LocationKind::Compose,
                &[file.as_str(), &found.service],
                format!("{}#{}", file, found.service),
            );
            results.push(Ok(SubatomicLocation::Compose(ComposeLocation {
                identity,
                settings,
                file: file.to_owned(),
                service: found.service,
                snapshot: Snapshot::image(text),
            })));
        }

        results
    }
}

impl LocationScanner for ComposeScanner {
    fn name(&self) -> &'static str {
        "compose"
    }

    fn extract_locations(
        &self,
        repo: &RepositoryConfig,
        base: &IdentityBase,
        working_dir: &Utf8Path,
    ) -> Vec<ScanResult> {
        scan_files(working_dir, &repo.compose, |file, content| {
            self.scan_content(base, file, content)
        })
    }
}
