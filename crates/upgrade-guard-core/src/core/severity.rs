// crates/upgrade-guard-core/src/core/severity.rs
// ============================================================================
// Module: Upgrade Guard Severity Scales
// Description: Issue severities, risk bands, and the rollup verdict.
// Purpose: Provide the ordered scales every engine reports against.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Issues carry a five-level [`Severity`]. Packages, plan candidates and
//! predictions are reported in the three-level [`RiskLevel`] band, and a run
//! as a whole ends in a [`Rollup`], which adds `unknown` for runs whose
//! mandatory inputs could not be read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Issue severity, ordered `info < low < medium < high < critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only.
    #[default]
    Info,
    /// Low severity.
    Low,
    /// Medium severity.
    Medium,
    /// High severity.
    High,
    /// Critical severity.
    Critical,
}

impl Severity {
    /// Parses severities as written by scanners (`HIGH`, `moderate`,
    /// `informational`, ...). Unrecognized labels yield `None`.
    #[must_use]
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" | "important" => Some(Self::High),
            "medium" | "moderate" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "info" | "informational" | "none" | "negligible" | "unknown" => Some(Self::Info),
            _ => None,
        }
    }

    /// Returns the next level up, saturating at `critical`.
    #[must_use]
    pub const fn escalate(self) -> Self {
        match self {
            Self::Info => Self::Low,
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }

    /// Maps severity onto the risk band: `critical`/`high` block,
    /// `medium`/`low` need review, `info` is safe.
    #[must_use]
    pub const fn risk(self) -> RiskLevel {
        match self {
            Self::Critical | Self::High => RiskLevel::Blocked,
            Self::Medium | Self::Low => RiskLevel::NeedsReview,
            Self::Info => RiskLevel::Safe,
        }
    }

    /// Returns the serialized label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Risk Level
// ============================================================================

/// Risk band, ordered `safe < needs-review < blocked`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    /// No action required.
    #[default]
    Safe,
    /// A human should look before proceeding.
    NeedsReview,
    /// Must not proceed.
    Blocked,
}

impl RiskLevel {
    /// Returns the next band up, saturating at `blocked`.
    #[must_use]
    pub const fn escalate(self) -> Self {
        match self {
            Self::Safe => Self::NeedsReview,
            Self::NeedsReview | Self::Blocked => Self::Blocked,
        }
    }

    /// Returns the serialized label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::NeedsReview => "needs-review",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Rollup
// ============================================================================

/// Exit code for a safe rollup.
pub const EXIT_SAFE: i32 = 0;
/// Exit code for a needs-review rollup.
pub const EXIT_NEEDS_REVIEW: i32 = 1;
/// Exit code for a blocked rollup.
pub const EXIT_BLOCKED: i32 = 2;
/// Default exit code for an unknown rollup.
pub const DEFAULT_EXIT_UNKNOWN: i32 = 3;

/// Run-level verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rollup {
    /// Every package is safe.
    Safe,
    /// At least one finding needs review.
    NeedsReview,
    /// At least one finding blocks.
    Blocked,
    /// A mandatory input failed, so no trustworthy verdict exists.
    Unknown,
}

impl Rollup {
    /// Returns the known risk band, or `None` for `unknown`.
    #[must_use]
    pub const fn risk(self) -> Option<RiskLevel> {
        match self {
            Self::Safe => Some(RiskLevel::Safe),
            Self::NeedsReview => Some(RiskLevel::NeedsReview),
            Self::Blocked => Some(RiskLevel::Blocked),
            Self::Unknown => None,
        }
    }

    /// Maps the rollup onto the automation exit-code convention.
    #[must_use]
    pub const fn exit_code(self, unknown_code: i32) -> i32 {
        match self {
            Self::Safe => EXIT_SAFE,
            Self::NeedsReview => EXIT_NEEDS_REVIEW,
            Self::Blocked => EXIT_BLOCKED,
            Self::Unknown => unknown_code,
        }
    }

    /// Returns the serialized label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::NeedsReview => "needs-review",
            Self::Blocked => "blocked",
            Self::Unknown => "unknown",
        }
    }
}

impl From<RiskLevel> for Rollup {
    fn from(value: RiskLevel) -> Self {
        match value {
            RiskLevel::Safe => Self::Safe,
            RiskLevel::NeedsReview => Self::NeedsReview,
            RiskLevel::Blocked => Self::Blocked,
        }
    }
}

impl fmt::Display for Rollup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
