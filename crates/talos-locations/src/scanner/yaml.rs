use super::{
    annotation_body, scan_files, settings_above, split_lines, LocationScanner, ScanFailure,
    ScanResult,
};
use crate::identity::{IdentityBase, LocationKind, UpdateIdentity};
use crate::location::{scalar_span, Snapshot, SubatomicLocation, YamlLocation};
use camino::Utf8Path;
use talos_core::types::RepositoryConfig;
use talos_image::{ParsedImage, TagParser};
use tracing::trace;

/// Finds annotated image scalars in arbitrary YAML files.
///
/// Only lines directly below a `# talos` annotation are considered; the
/// line must be `key: value`, `- value` or `- key: value`.
pub struct YamlScanner {
    tags: TagParser,
}

/// Offset in `line` where the scalar value starts
fn value_offset(line: &str) -> Result<usize, String> {
    let trimmed = line.trim_start();
    let indent = line.len() - trimmed.len();
    let (body_offset, body) = match trimmed.strip_prefix("- ") {
        Some(item) => (indent + 2, item),
        None => (indent, trimmed),
    };

    if let Some(colon) = body.find(": ") {
        return Ok(body_offset + colon + 1);
    }
    if body.trim_end().ends_with(':') {
        return Err("key has no scalar value".to_string());
    }
    if body_offset > indent {
        return Ok(body_offset);
    }
    Err("not a key or list item".to_string())
}

impl YamlScanner {
    pub fn new(tags: TagParser) -> Self {
        Self { tags }
    }

    /// Scan one YAML file's content
    pub fn scan_content(&self, base: &IdentityBase, file: &Utf8Path, content: &str) -> Vec<ScanResult> {
        let lines = split_lines(content);
        let mut results = Vec::new();
        let mut line_start = 0;

        for (index, raw) in content.split_inclusive('\n').enumerate() {
            let start_of_line = line_start;
            line_start += raw.len();

            let line = lines[index];
            let annotated = index
                .checked_sub(1)
                .and_then(|above| annotation_body(lines[above]))
                .is_some();
            if !annotated || line.trim().is_empty() || annotation_body(line).is_some() {
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

            let span = value_offset(line).and_then(|offset| scalar_span(line, offset));
            let (start, end) = match span {
                Ok(span) => span,
                Err(reason) => {
                    results.push(failure(reason));
                    continue;
                }
            };
            let text = &line[start..end];
            if ParsedImage::try_parse(text, false, &self.tags).is_none() {
                results.push(failure(format!("'{}' is not a usable image reference", text)));
                continue;
            }

            let (start, end) = (start_of_line + start, start_of_line + end);
            let identity = UpdateIdentity::new(
                base,
                LocationKind::Yaml,
                &[file.as_str(), &start.to_string(), &end.to_string()],
                format!("{}:{}", file, index + 1),
            );
            results.push(Ok(SubatomicLocation::Yaml(YamlLocation {
                identity,
                settings,
                file: file.to_owned(),
                start,
                end,
                snapshot: Snapshot::image(text),
            })));
        }

        results
    }
}

impl LocationScanner for YamlScanner {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn extract_locations(
        &self,
        repo: &RepositoryConfig,
        base: &IdentityBase,
        working_dir: &Utf8Path,
    ) -> Vec<ScanResult> {
        scan_files(working_dir, &repo.yaml, |file, content| {
            self.scan_content(base, file, content)
        })
    }
}
