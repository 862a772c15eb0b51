//! Content-derived identities for update locations
//!
//! An identity names one logical location across scans: the same file
//! coordinates always hash to the same value, and any coordinate change
//! produces a different one. Queued pushes, dead letters and cached
//! notification state are all keyed by [`UpdateIdentity::storage_key`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Kind of location an identity refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Dockerfile,
    Compose,
    Yaml,
    Atomic,
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dockerfile => "dockerfile",
            Self::Compose => "compose",
            Self::Yaml => "yaml",
            Self::Atomic => "atomic",
        };
        f.write_str(name)
    }
}

/// Repository coordinates shared by every identity found in one scan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityBase {
    pub git_remote_url: String,
    /// Branch updated; the remote default branch when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
}

impl IdentityBase {
    pub fn new(git_remote_url: impl Into<String>, git_branch: Option<String>) -> Self {
        Self {
            git_remote_url: git_remote_url.into(),
            git_branch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIdentity {
    pub git_remote_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    pub kind: LocationKind,
    /// Hex SHA-256 of the kind-specific coordinates
    pub hash: String,
    /// Human-readable coordinates, for logs and commit messages
    pub short_friendly_hash_data: String,
}

fn sha256_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        // Separator keeps ("ab", "c") and ("a", "bc") apart
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

impl UpdateIdentity {
    /// Identity of a single location from its coordinates
    pub fn new(
        base: &IdentityBase,
        kind: LocationKind,
        coordinates: &[&str],
        friendly: impl Into<String>,
    ) -> Self {
        Self {
            git_remote_url: base.git_remote_url.clone(),
            git_branch: base.git_branch.clone(),
            kind,
            hash: sha256_hex(coordinates),
            short_friendly_hash_data: friendly.into(),
        }
    }

    /// Identity of a group, independent of member order
    pub fn atomic<'a>(
        base: &IdentityBase,
        members: impl IntoIterator<Item = &'a UpdateIdentity>,
        friendly: impl Into<String>,
    ) -> Self {
        let mut qualified: Vec<String> = members
            .into_iter()
            .map(|m| format!("{}:{}", m.kind, m.hash))
            .collect();
        qualified.sort();
        let joined = qualified.concat();
        Self::new(base, LocationKind::Atomic, &[&joined], friendly)
    }

    /// Key under which everything about this identity is stored
    pub fn storage_key(&self) -> String {
        sha256_hex(&[
            &self.git_remote_url,
            self.git_branch.as_deref().unwrap_or(""),
            &self.kind.to_string(),
            &self.hash,
        ])
    }

    /// First eight hex characters of the hash
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(8)]
    }
}

impl fmt::Display for UpdateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.short_friendly_hash_data)
    }
}
