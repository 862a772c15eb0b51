//! Numeric versions as they appear in image tags
//!
//! Tags such as `1`, `1.25`, `v2.3.3` or `22.04` carry one to three numeric
//! components and an optional alphabetic prefix. The number of components is
//! the version's [`Precision`]; versions only compare when precisions match.

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>[A-Za-z]+)?(?P<major>\d+)(?:\.(?P<minor>\d+))?(?:\.(?P<patch>\d+))?$")
        .expect("version regex is valid")
});

/// How many numeric components a version carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    Major,
    Minor,
    Patch,
}

/// Result of comparing two versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticVersionSize {
    Equal,
    Patch,
    Minor,
    Major,
    Downgrade,
    PrecisionMismatch,
}

impl SemanticVersionSize {
    /// Bump size for a forward comparison; `Equal` counts as a digest bump
    pub fn as_bump(&self) -> Option<talos_core::BumpSize> {
        use talos_core::BumpSize;
        match self {
            Self::Equal => Some(BumpSize::Digest),
            Self::Patch => Some(BumpSize::Patch),
            Self::Minor => Some(BumpSize::Minor),
            Self::Major => Some(BumpSize::Major),
            Self::Downgrade | Self::PrecisionMismatch => None,
        }
    }
}

/// A one to three component numeric version with an optional prefix
///
/// The digits are kept exactly as written so that `22.04` formats back to
/// `22.04`, not `22.4`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticVersion {
    prefix: Option<String>,
    text: String,
    major: u64,
    minor: Option<u64>,
    patch: Option<u64>,
}

impl SemanticVersion {
    /// Parse a version such as `v2.3.3`; returns `None` for anything else
    pub fn try_parse(text: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(text)?;
        let number = |name: &str| -> Option<Option<u64>> {
            match caps.name(name) {
                Some(m) => m.as_str().parse().ok().map(Some),
                None => Some(None),
            }
        };

        let major = number("major")??;
        let minor = number("minor")?;
        let patch = number("patch")?;
        let prefix = caps.name("prefix").map(|m| m.as_str().to_string());
        let text = text[prefix.as_ref().map_or(0, String::len)..].to_string();

        Some(Self {
            prefix,
            text,
            major,
            minor,
            patch,
        })
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> Option<u64> {
        self.minor
    }

    pub fn patch(&self) -> Option<u64> {
        self.patch
    }

    pub fn precision(&self) -> Precision {
        match (self.minor, self.patch) {
            (Some(_), Some(_)) => Precision::Patch,
            (Some(_), None) => Precision::Minor,
            _ => Precision::Major,
        }
    }

    /// Classify the move from `from` to `to`
    pub fn compare(from: &Self, to: &Self) -> SemanticVersionSize {
        if from.precision() != to.precision() {
            return SemanticVersionSize::PrecisionMismatch;
        }

        match from.numeric_cmp(to) {
            Ordering::Equal => SemanticVersionSize::Equal,
            Ordering::Greater => SemanticVersionSize::Downgrade,
            Ordering::Less if from.major != to.major => SemanticVersionSize::Major,
            Ordering::Less if from.minor != to.minor => SemanticVersionSize::Minor,
            Ordering::Less => SemanticVersionSize::Patch,
        }
    }

    /// Order by (major, minor, patch), ignoring prefix and written form
    pub fn numeric_cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            f.write_str(prefix)?;
        }
        f.write_str(&self.text)
    }
}
