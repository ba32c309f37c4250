// crates/upgrade-guard-core/src/core/risk.rs
// ============================================================================
// Module: Upgrade Guard Risk Model Types
// Description: Update feature vectors, outcomes, and risk scores.
// Purpose: Define the learned risk model's inputs, history, and outputs.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! [`UpdateFeatures`] describes one proposed move; [`HistoricalOutcome`]
//! records what happened when a move was applied; [`RiskScore`] is the
//! model's prediction. Outcomes are append-only and never rewritten.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::PackageName;
use crate::core::severity::RiskLevel;
use crate::core::version::Version;
use crate::core::version::VersionChange;

// ============================================================================
// SECTION: Features
// ============================================================================

/// Feature vector for one proposed update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFeatures {
    /// Package being updated.
    pub package: PackageName,
    /// Resolved version.
    pub from_version: Version,
    /// Target version.
    pub to_version: Version,
    /// Major version changes.
    pub is_major: bool,
    /// Minor version changes.
    pub is_minor: bool,
    /// Only the patch level changes.
    pub is_patch: bool,
    /// The move crosses an announced breaking change.
    pub breaking_changes: bool,
    /// The move fixes a known vulnerability.
    pub security_update: bool,
    /// Days since the target was released.
    pub days_since_last_update: Option<u32>,
    /// Popularity in `[0, 1]`.
    pub popularity: f64,
    /// The consuming project tests the package.
    pub has_test_coverage: bool,
    /// The package is a transitive dependency.
    pub is_transitive: bool,
    /// Number of packages depending on this one.
    pub dependency_count: u32,
}

impl UpdateFeatures {
    /// Derives change flags from the versions; every other feature starts
    /// neutral (no breaking change, median popularity, no coverage).
    #[must_use]
    pub fn from_versions(package: PackageName, from_version: Version, to_version: Version) -> Self {
        let change = from_version.change_to(&to_version);
        Self {
            package,
            is_major: change == VersionChange::Major,
            is_minor: change == VersionChange::Minor,
            is_patch: change == VersionChange::Patch,
            from_version,
            to_version,
            breaking_changes: false,
            security_update: false,
            days_since_last_update: None,
            popularity: 0.5,
            has_test_coverage: false,
            is_transitive: false,
            dependency_count: 0,
        }
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Recorded result of an applied update.
///
/// # Invariants
/// - Records are appended once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalOutcome {
    /// Package that was updated.
    pub package: PackageName,
    /// Version before the update.
    pub from_version: Version,
    /// Version after the update.
    pub to_version: Version,
    /// Time the outcome was recorded.
    #[serde(with = "crate::core::time::rfc3339")]
    pub recorded_at: OffsetDateTime,
    /// The update succeeded.
    pub success: bool,
    /// The update was rolled back.
    #[serde(default)]
    pub rolled_back: bool,
    /// Failure description.
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Features captured at prediction time, used for backtesting.
    #[serde(default)]
    pub features: Option<UpdateFeatures>,
}

impl HistoricalOutcome {
    /// Returns true when the update failed or was rolled back.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !self.success || self.rolled_back
    }
}

// ============================================================================
// SECTION: Scores
// ============================================================================

/// Model prediction for one update.
///
/// # Invariants
/// - `score` and `confidence` are in `[0, 1]`.
/// - `recommendation` is a pure function of `score` and the band limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Package being updated.
    pub package: PackageName,
    /// Resolved version.
    pub from_version: Version,
    /// Target version.
    pub to_version: Version,
    /// Risk score.
    pub score: f64,
    /// Confidence in the score.
    pub confidence: f64,
    /// Recommendation band.
    pub recommendation: RiskLevel,
    /// Signed contribution of each factor (including `base`).
    pub factors: BTreeMap<String, f64>,
    /// Outcomes considered for this package.
    pub history_samples: usize,
    /// False when the outcome repository could not be read.
    pub history_available: bool,
}

/// Backtest of the model against recorded outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Outcomes with captured features.
    pub samples: usize,
    /// Samples predicted safe or blocked (needs-review is not scored).
    pub decisive_samples: usize,
    /// Decisive samples whose band matched the outcome.
    pub correct: usize,
    /// `correct / decisive_samples`, or zero when nothing was decisive.
    pub accuracy: f64,
    /// Mean squared error between score and observed failure.
    pub brier_score: f64,
}
