//! Image references
//!
//! Format: `[domain/][namespace/]name[:tag][@digest]`, where the namespace
//! may span several path components (`ghcr.io/acme/tools/api:1.2`).

use crate::error::{Error, Result};
use crate::tag::{ParsedTag, TagParser};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Registry assumed for references that name none
pub const DEFAULT_DOMAIN: &str = "docker.io";

/// Namespace of official images on the default registry
pub const DEFAULT_NAMESPACE: &str = "library";

/// API host serving the default registry
const DEFAULT_REGISTRY_HOST: &str = "registry-1.docker.io";

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9.-]*[A-Za-z0-9])?(?::[0-9]+)?$")
        .expect("domain regex is valid")
});

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").expect("path regex is valid")
});

static DIGEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+._-]*:[A-Za-z0-9=_-]+$").expect("digest regex is valid")
});

/// Tag and/or digest of a reference; at least one is present
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedTagAndDigest {
    pub tag: Option<ParsedTag>,
    pub digest: Option<String>,
}

impl fmt::Display for ParsedTagAndDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            write!(f, "{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// A parsed image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedImage {
    domain: Option<String>,
    namespace: Option<String>,
    name: String,
    untagged: String,
    tag_and_digest: Option<ParsedTagAndDigest>,
}

fn looks_like_domain(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

impl ParsedImage {
    /// Parse an image reference, returning `None` when `text` is not one.
    ///
    /// With `insert_default_domain`, a reference without a domain gets
    /// `docker.io` (and `library` when it also has no namespace).
    pub fn try_parse(text: &str, insert_default_domain: bool, tags: &TagParser) -> Option<Self> {
        let (rest, digest) = match text.split_once('@') {
            Some((rest, digest)) if DIGEST_RE.is_match(digest) => (rest, Some(digest.to_string())),
            Some(_) => return None,
            None => (text, None),
        };

        let mut components: Vec<&str> = rest.split('/').collect();
        let last = components.pop()?;
        let (name, tag) = match last.split_once(':') {
            Some((name, tag)) => (name, Some(tags.try_parse_tag(tag)?)),
            None => (last, None),
        };
        if !PATH_RE.is_match(name) {
            return None;
        }

        let mut domain = match components.first() {
            Some(first) if looks_like_domain(first) => {
                if !DOMAIN_RE.is_match(first) {
                    return None;
                }
                Some(components.remove(0).to_string())
            }
            _ => None,
        };

        if !components.iter().all(|c| PATH_RE.is_match(c)) {
            return None;
        }
        let mut namespace = (!components.is_empty()).then(|| components.join("/"));

        if insert_default_domain && domain.is_none() {
            domain = Some(DEFAULT_DOMAIN.to_string());
            if namespace.is_none() {
                namespace = Some(DEFAULT_NAMESPACE.to_string());
            }
        }

        let untagged = [domain.as_deref(), namespace.as_deref(), Some(name)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("/");

        let tag_and_digest = (tag.is_some() || digest.is_some())
            .then_some(ParsedTagAndDigest { tag, digest });

        Some(Self {
            domain,
            namespace,
            name: name.to_string(),
            untagged,
            tag_and_digest,
        })
    }

    /// Parse an image reference, failing with [`Error::InvalidReference`]
    pub fn parse(text: &str, insert_default_domain: bool, tags: &TagParser) -> Result<Self> {
        Self::try_parse(text, insert_default_domain, tags)
            .ok_or_else(|| Error::invalid_reference(text, "not a valid image reference"))
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference without tag and digest; the registry cache key
    pub fn untagged(&self) -> &str {
        &self.untagged
    }

    pub fn tag_and_digest(&self) -> Option<&ParsedTagAndDigest> {
        self.tag_and_digest.as_ref()
    }

    pub fn tag(&self) -> Option<&ParsedTag> {
        self.tag_and_digest.as_ref().and_then(|td| td.tag.as_ref())
    }

    pub fn digest(&self) -> Option<&str> {
        self.tag_and_digest
            .as_ref()
            .and_then(|td| td.digest.as_deref())
    }

    /// Registry domain, `docker.io` when none was written
    pub fn domain_or_default(&self) -> &str {
        self.domain.as_deref().unwrap_or(DEFAULT_DOMAIN)
    }

    /// Host serving the registry API for this image
    pub fn registry_host(&self) -> &str {
        match self.domain_or_default() {
            DEFAULT_DOMAIN | "index.docker.io" => DEFAULT_REGISTRY_HOST,
            domain => domain,
        }
    }

    /// Repository path as used in registry API URLs
    pub fn repository_path(&self) -> String {
        match (&self.namespace, self.registry_host()) {
            (Some(namespace), _) => format!("{}/{}", namespace, self.name),
            (None, DEFAULT_REGISTRY_HOST) => format!("{}/{}", DEFAULT_NAMESPACE, self.name),
            (None, _) => self.name.clone(),
        }
    }

    /// Same repository with only the given tag
    pub fn with_tag(&self, tag: ParsedTag) -> Self {
        self.with_tag_and_digest(Some(tag), None)
    }

    /// Same repository with the given tag and digest
    pub fn with_tag_and_digest(&self, tag: Option<ParsedTag>, digest: Option<String>) -> Self {
        let tag_and_digest = (tag.is_some() || digest.is_some())
            .then_some(ParsedTagAndDigest { tag, digest });
        Self {
            tag_and_digest,
            ..self.clone()
        }
    }
}

impl fmt::Display for ParsedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.untagged)?;
        if let Some(td) = &self.tag_and_digest {
            if let Some(tag) = &td.tag {
                write!(f, ":{}", tag)?;
            }
            if let Some(digest) = &td.digest {
                write!(f, "@{}", digest)?;
            }
        }
        Ok(())
    }
}
