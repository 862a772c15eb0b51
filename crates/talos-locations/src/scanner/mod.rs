//! File scanners
//!
//! Each scanner globs the files of one kind, finds the image references in
//! them and reads the `# talos <settings>` annotation on the line directly
//! above each reference. A reference that cannot be used (no annotation, an
//! unparsable annotation or image, a value that cannot be edited safely) is
//! reported as a [`ScanFailure`] and never stops the scan.

mod compose;
mod dockerfile;
mod yaml;

pub use compose::ComposeScanner;
pub use dockerfile::DockerfileScanner;
pub use yaml::YamlScanner;

use crate::error::Result;
use crate::identity::IdentityBase;
use crate::location::SubatomicLocation;
use camino::{Utf8Path, Utf8PathBuf};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fmt;
use talos_core::types::{FileGlobs, RepositoryConfig};
use talos_core::TalosSettings;
use talos_image::TagParser;
use walkdir::WalkDir;

/// A reference found but not usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub file: Utf8PathBuf,
    /// 1-based line number, when the failure is tied to a line
    pub line: Option<usize>,
    pub reason: String,
}

impl ScanFailure {
    pub fn new(file: impl Into<Utf8PathBuf>, line: Option<usize>, reason: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.file, line, self.reason),
            None => write!(f, "{}: {}", self.file, self.reason),
        }
    }
}

pub type ScanResult = std::result::Result<SubatomicLocation, ScanFailure>;

/// Finds the locations of one file kind in a working tree
pub trait LocationScanner: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Every location (or failure) in the repository checked out at `working_dir`
    fn extract_locations(
        &self,
        repo: &RepositoryConfig,
        base: &IdentityBase,
        working_dir: &Utf8Path,
    ) -> Vec<ScanResult>;
}

/// The Dockerfile, Compose and YAML scanners
pub fn default_scanners(tags: &TagParser) -> Vec<Box<dyn LocationScanner>> {
    vec![
        Box::new(DockerfileScanner::new(tags.clone())),
        Box::new(ComposeScanner::new(tags.clone())),
        Box::new(YamlScanner::new(tags.clone())),
    ]
}

fn glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

/// Repository-relative files matching `globs`, sorted
pub(crate) fn matching_files(working_dir: &Utf8Path, globs: &FileGlobs) -> Result<Vec<Utf8PathBuf>> {
    if globs.include.is_empty() {
        return Ok(Vec::new());
    }
    let include = glob_set(&globs.include)?;
    let exclude = glob_set(&globs.exclude)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(working_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(working_dir) else {
            continue;
        };
        let Some(relative) = Utf8Path::from_path(relative) else {
            continue;
        };
        if include.is_match(relative) && !exclude.is_match(relative) {
            files.push(relative.to_owned());
        }
    }

    files.sort();
    Ok(files)
}

/// Run `scan` over every file matching `globs`, turning read errors into failures
pub(crate) fn scan_files(
    working_dir: &Utf8Path,
    globs: &FileGlobs,
    mut scan: impl FnMut(&Utf8Path, &str) -> Vec<ScanResult>,
) -> Vec<ScanResult> {
    let files = match matching_files(working_dir, globs) {
        Ok(files) => files,
        Err(e) => return vec![Err(ScanFailure::new(working_dir, None, e.to_string()))],
    };

    let mut results = Vec::new();
    for file in files {
        match std::fs::read_to_string(working_dir.join(&file)) {
            Ok(content) => results.extend(scan(&file, &content)),
            Err(e) => results.push(Err(ScanFailure::new(&file, None, e.to_string()))),
        }
    }
    results
}

/// Body of a `# talos ...` comment, if `line` is one
pub(crate) fn annotation_body(line: &str) -> Option<&str> {
    let comment = line.trim().strip_prefix('#')?.trim_start();
    let rest = comment.strip_prefix("talos")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

/// Settings from the annotation directly above line `index`
pub(crate) fn settings_above(lines: &[&str], index: usize) -> std::result::Result<TalosSettings, String> {
    let body = index
        .checked_sub(1)
        .and_then(|above| lines.get(above))
        .and_then(|line| annotation_body(line))
        .ok_or_else(|| "missing talos annotation".to_string())?;
    TalosSettings::parse_annotation(body).map_err(|e| e.to_string())
}

/// Lines without their endings
pub(crate) fn split_lines(content: &str) -> Vec<&str> {
    content
        .split_inclusive('\n')
        .map(|l| l.trim_end_matches('\n').trim_end_matches('\r'))
        .collect()
}
