//! Per-location update settings
//!
//! Every image reference Talos manages carries a `talos` annotation. The
//! annotation is either a compact one-word form such as `~:!?*.` or a
//! structured YAML flow mapping such as
//! `{bump: patch, strategy: {patch: push}}`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Magnitude of an image change, ordered `Digest < Patch < Minor < Major`.
///
/// Used both as the upgrade ceiling configured for a location and as the
/// classification of a selected upgrade.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum BumpSize {
    /// Same tag, different content
    Digest,
    Patch,
    #[default]
    Minor,
    Major,
}

impl BumpSize {
    /// Parse the compact bump marker (`+` major, `^` minor, `~` patch, `@` digest)
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '+' => Some(Self::Major),
            '^' => Some(Self::Minor),
            '~' => Some(Self::Patch),
            '@' => Some(Self::Digest),
            _ => None,
        }
    }

    /// Compact marker for this bump size
    pub fn marker(&self) -> char {
        match self {
            Self::Major => '+',
            Self::Minor => '^',
            Self::Patch => '~',
            Self::Digest => '@',
        }
    }
}

impl fmt::Display for BumpSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Digest => "digest",
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        };
        f.write_str(name)
    }
}

/// What to do once an upgrade of a given size has been found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BumpStrategy {
    /// Tell a human, change nothing
    #[default]
    Notify,
    /// Ask a human for approval before pushing
    Prompt,
    /// Ignore the upgrade
    Skip,
    /// Commit and push without asking
    Push,
}

impl BumpStrategy {
    /// Parse the compact strategy marker
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '*' => Some(Self::Notify),
            '.' => Some(Self::Skip),
            '?' => Some(Self::Prompt),
            '!' => Some(Self::Push),
            _ => None,
        }
    }

    /// Compact marker for this strategy
    pub fn marker(&self) -> char {
        match self {
            Self::Notify => '*',
            Self::Skip => '.',
            Self::Prompt => '?',
            Self::Push => '!',
        }
    }
}

/// Strategy per bump size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StrategySettings {
    pub digest: BumpStrategy,
    pub patch: BumpStrategy,
    pub minor: BumpStrategy,
    pub major: BumpStrategy,
}

impl StrategySettings {
    /// Same strategy for every bump size
    pub fn uniform(strategy: BumpStrategy) -> Self {
        Self {
            digest: strategy,
            patch: strategy,
            minor: strategy,
            major: strategy,
        }
    }

    /// Strategy configured for the given bump size
    pub fn for_bump(&self, bump: BumpSize) -> BumpStrategy {
        match bump {
            BumpSize::Digest => self.digest,
            BumpSize::Patch => self.patch,
            BumpSize::Minor => self.minor,
            BumpSize::Major => self.major,
        }
    }
}

/// Role of a location inside a sync group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRole {
    Parent,
    Child,
}

/// Membership of a location in a synchronized group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    pub role: SyncRole,
    /// Group name shared by every member
    pub group: String,
    /// Id of this member, unique within the group
    pub id: String,
    /// Ids of the expected children (parent only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
    /// Require every member to resolve to the same digest
    #[serde(default)]
    pub digest: bool,
}

/// Update policy attached to one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TalosSettings {
    pub skip: bool,
    /// Upgrade ceiling
    pub bump: BumpSize,
    pub strategy: StrategySettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncSettings>,
}

impl TalosSettings {
    /// Settings that ignore the location entirely
    pub fn skipped() -> Self {
        Self {
            skip: true,
            ..Default::default()
        }
    }

    /// Parse an annotation body in either form.
    ///
    /// A body starting with `{` is read as a YAML flow mapping, anything
    /// else as the compact grammar.
    pub fn parse_annotation(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.starts_with('{') {
            serde_yaml_ng::from_str(trimmed)
                .map_err(|e| Error::invalid_settings(trimmed, e.to_string()))
        } else {
            Self::parse_short_form(trimmed)
        }
    }

    /// Parse the compact grammar.
    ///
    /// `x` skips the location. Otherwise the first character is the bump
    /// ceiling (`+` major, `^` minor, `~` patch, `@` digest), optionally
    /// followed by either one strategy marker applied to every level or a
    /// colon and up to four markers for digest, patch, minor and major in
    /// that order. Missing trailing markers default to notify.
    pub fn parse_short_form(input: &str) -> Result<Self> {
        let input = input.trim();
        if input == "x" {
            return Ok(Self::skipped());
        }

        let mut chars = input.chars();
        let bump_marker = chars
            .next()
            .ok_or_else(|| Error::invalid_settings(input, "empty annotation"))?;
        let bump = BumpSize::from_marker(bump_marker).ok_or_else(|| {
            Error::invalid_settings(input, format!("unknown bump marker '{}'", bump_marker))
        })?;

        let rest = chars.as_str();
        let strategy = if rest.is_empty() {
            StrategySettings::default()
        } else if let Some(levels) = rest.strip_prefix(':') {
            let markers: Vec<char> = levels.chars().collect();
            if markers.len() > 4 {
                return Err(Error::invalid_settings(
                    input,
                    "at most four strategy markers may follow ':'",
                ));
            }
            let mut parsed = [BumpStrategy::Notify; 4];
            for (slot, marker) in parsed.iter_mut().zip(markers) {
                *slot = BumpStrategy::from_marker(marker).ok_or_else(|| {
                    Error::invalid_settings(input, format!("unknown strategy marker '{}'", marker))
                })?;
            }
            StrategySettings {
                digest: parsed[0],
                patch: parsed[1],
                minor: parsed[2],
                major: parsed[3],
            }
        } else {
            let mut markers = rest.chars();
            let marker = markers.next().unwrap_or('*');
            if markers.next().is_some() {
                return Err(Error::invalid_settings(
                    input,
                    "per-level strategies must be introduced with ':'",
                ));
            }
            let strategy = BumpStrategy::from_marker(marker).ok_or_else(|| {
                Error::invalid_settings(input, format!("unknown strategy marker '{}'", marker))
            })?;
            StrategySettings::uniform(strategy)
        };

        Ok(Self {
            skip: false,
            bump,
            strategy,
            sync: None,
        })
    }

    /// Format as compact grammar. Sync membership cannot be expressed and is dropped.
    pub fn to_short_form(&self) -> String {
        if self.skip {
            return "x".to_string();
        }
        let s = &self.strategy;
        format!(
            "{}:{}{}{}{}",
            self.bump.marker(),
            s.digest.marker(),
            s.patch.marker(),
            s.minor.marker(),
            s.major.marker()
        )
    }

    /// Strategy for an upgrade of the given size
    pub fn strategy_for(&self, bump: BumpSize) -> BumpStrategy {
        self.strategy.for_bump(bump)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_size_ordering() {
        assert!(BumpSize::Digest < BumpSize::Patch);
        assert!(BumpSize::Patch < BumpSize::Minor);
        assert!(BumpSize::Minor < BumpSize::Major);
    }

    #[test]
    fn test_parse_short_form_per_level() {
        let settings = TalosSettings::parse_short_form("~:!?*.").unwrap();
        assert!(!settings.skip);
        assert_eq!(settings.bump, BumpSize::Patch);
        assert_eq!(settings.strategy.digest, BumpStrategy::Push);
        assert_eq!(settings.strategy.patch, BumpStrategy::Prompt);
        assert_eq!(settings.strategy.minor, BumpStrategy::Notify);
        assert_eq!(settings.strategy.major, BumpStrategy::Skip);
    }

    #[test]
    fn test_parse_short_form_skip() {
        let settings = TalosSettings::parse_short_form("x").unwrap();
        assert!(settings.skip);
    }

    #[test]
    fn test_parse_short_form_uniform() {
        let settings = TalosSettings::parse_short_form("+!").unwrap();
        assert_eq!(settings.bump, BumpSize::Major);
        assert_eq!(settings.strategy, StrategySettings::uniform(BumpStrategy::Push));
    }

    #[test]
    fn test_parse_short_form_missing_levels_default_to_notify() {
        let settings = TalosSettings::parse_short_form("^:!").unwrap();
        assert_eq!(settings.bump, BumpSize::Minor);
        assert_eq!(settings.strategy.digest, BumpStrategy::Push);
        assert_eq!(settings.strategy.patch, BumpStrategy::Notify);
        assert_eq!(settings.strategy.minor, BumpStrategy::Notify);
        assert_eq!(settings.strategy.major, BumpStrategy::Notify);
    }

    #[test]
    fn test_parse_short_form_bump_only() {
        let settings = TalosSettings::parse_short_form("@").unwrap();
        assert_eq!(settings.bump, BumpSize::Digest);
        assert_eq!(settings.strategy, StrategySettings::default());
    }

    #[test]
    fn test_parse_short_form_rejects_garbage() {
        assert!(TalosSettings::parse_short_form("").is_err());
        assert!(TalosSettings::parse_short_form("q").is_err());
        assert!(TalosSettings::parse_short_form("~!!").is_err());
        assert!(TalosSettings::parse_short_form("~:!!!!!").is_err());
        assert!(TalosSettings::parse_short_form("~:z").is_err());
    }

    #[test]
    fn test_short_form_round_trip() {
        let settings = TalosSettings::parse_short_form("~:!?*.").unwrap();
        assert_eq!(settings.to_short_form(), "~:!?*.");
        let reparsed = TalosSettings::parse_short_form(&settings.to_short_form()).unwrap();
        assert_eq!(reparsed, settings);
    }

    #[test]
    fn test_parse_structured_annotation() {
        let settings = TalosSettings::parse_annotation(
            "{bump: major, strategy: {major: prompt}, sync: {role: parent, group: web, id: api, children: [worker], digest: true}}",
        )
        .unwrap();
        assert_eq!(settings.bump, BumpSize::Major);
        assert_eq!(settings.strategy.major, BumpStrategy::Prompt);
        assert_eq!(settings.strategy.patch, BumpStrategy::Notify);
        let sync = settings.sync.unwrap();
        assert_eq!(sync.role, SyncRole::Parent);
        assert_eq!(sync.group, "web");
        assert_eq!(sync.children, Some(vec!["worker".to_string()]));
        assert!(sync.digest);
    }

    #[test]
    fn test_parse_annotation_dispatches_compact() {
        let settings = TalosSettings::parse_annotation("  ~!  ").unwrap();
        assert_eq!(settings.bump, BumpSize::Patch);
        assert_eq!(settings.strategy_for(BumpSize::Major), BumpStrategy::Push);
    }

    #[test]
    fn test_parse_annotation_invalid_structured() {
        let err = TalosSettings::parse_annotation("{bump: enormous}").unwrap_err();
        assert!(err.to_string().contains("Invalid settings"));
    }
}
