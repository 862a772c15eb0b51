//! Tag interpretation
//!
//! A tag is either a numeric version (`1.25.3`, `v2`) or a whitelisted
//! release name (`latest`, `stable`), optionally followed by `-<variant>`
//! (`1.25.3-alpine`, `stable-bookworm`). Anything else is not a tag Talos
//! can reason about.

use crate::version::SemanticVersion;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use talos_core::types::RegistryConfig;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("tag regex is valid")
});

/// The version part of a tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagVersion {
    Semantic(SemanticVersion),
    Release(String),
}

impl fmt::Display for TagVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semantic(version) => version.fmt(f),
            Self::Release(name) => f.write_str(name),
        }
    }
}

/// A tag split into version and variant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedTag {
    pub version: TagVersion,
    pub variant: Option<String>,
}

impl ParsedTag {
    pub fn semantic(&self) -> Option<&SemanticVersion> {
        match &self.version {
            TagVersion::Semantic(version) => Some(version),
            TagVersion::Release(_) => None,
        }
    }

    pub fn release(&self) -> Option<&str> {
        match &self.version {
            TagVersion::Release(name) => Some(name),
            TagVersion::Semantic(_) => None,
        }
    }
}

impl fmt::Display for ParsedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)?;
        if let Some(variant) = &self.variant {
            write!(f, "-{}", variant)?;
        }
        Ok(())
    }
}

/// Parses tags against the configured release-name whitelist
#[derive(Debug, Clone)]
pub struct TagParser {
    release_names: Vec<String>,
    default_release: String,
}

impl Default for TagParser {
    fn default() -> Self {
        Self::from_config(&RegistryConfig::default())
    }
}

impl TagParser {
    pub fn new(release_names: Vec<String>, default_release: impl Into<String>) -> Self {
        Self {
            release_names,
            default_release: default_release.into(),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.release_names.clone(), config.default_release.clone())
    }

    /// Release followed by references without a tag
    pub fn default_release(&self) -> &str {
        &self.default_release
    }

    fn is_release(&self, name: &str) -> bool {
        self.release_names.iter().any(|release| release == name)
    }

    /// Parse a tag; returns `None` for anything that is neither a version
    /// nor a whitelisted release
    pub fn try_parse_tag(&self, text: &str) -> Option<ParsedTag> {
        if !TAG_RE.is_match(text) {
            return None;
        }

        if self.is_release(text) {
            return Some(ParsedTag {
                version: TagVersion::Release(text.to_string()),
                variant: None,
            });
        }

        // Release names may contain hyphens; the longest one wins
        let release = self
            .release_names
            .iter()
            .filter_map(|release| {
                let variant = text.strip_prefix(release.as_str())?.strip_prefix('-')?;
                (!variant.is_empty()).then_some((release, variant))
            })
            .max_by_key(|(release, _)| release.len());
        if let Some((release, variant)) = release {
            return Some(ParsedTag {
                version: TagVersion::Release(release.clone()),
                variant: Some(variant.to_string()),
            });
        }

        let (head, variant) = match text.split_once('-') {
            Some((head, variant)) if !variant.is_empty() => (head, Some(variant.to_string())),
            Some(_) => return None,
            None => (text, None),
        };

        let version = if self.is_release(head) {
            TagVersion::Release(head.to_string())
        } else {
            TagVersion::Semantic(SemanticVersion::try_parse(head)?)
        };

        Some(ParsedTag { version, variant })
    }
}
