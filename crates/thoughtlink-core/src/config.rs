//! Sharing configuration consumed by the filter and the sync client.
//!
//! Owned by the settings surface; every other component only reads it.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How much extracted content is eligible for sharing, 1 (minimal) to 5 (everything).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ContributionLevel(u8);

impl ContributionLevel {
    pub const MIN: ContributionLevel = ContributionLevel(1);
    pub const MAX: ContributionLevel = ContributionLevel(5);

    pub fn new(level: u8) -> Result<Self> {
        if (1..=5).contains(&level) {
            Ok(Self(level))
        } else {
            Err(Error::InvalidContributionLevel(level))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for ContributionLevel {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<u8> for ContributionLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ContributionLevel> for u8 {
    fn from(level: ContributionLevel) -> u8 {
        level.0
    }
}

/// Strength of the privacy pattern filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterSensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for FilterSensitivity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::config(format!("unknown filter sensitivity: {}", other))),
        }
    }
}

impl std::fmt::Display for FilterSensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShareConfig {
    pub auto_share: bool,
    pub contribution_level: ContributionLevel,
    pub anonymous_mode: bool,
    pub filter_sensitivity: FilterSensitivity,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            auto_share: true,
            contribution_level: ContributionLevel::default(),
            anonymous_mode: false,
            filter_sensitivity: FilterSensitivity::default(),
        }
    }
}
