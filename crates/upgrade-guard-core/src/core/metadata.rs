// crates/upgrade-guard-core/src/core/metadata.rs
// ============================================================================
// Module: Upgrade Guard Metadata Index
// Description: Package index snapshot used for drift and risk features.
// Purpose: Answer "what is the latest release" and "how healthy is it".
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The metadata snapshot maps each package to the releases the index knows
//! about plus health signals (popularity, test coverage, release dates).
//! Drift analysis reads the latest release from here; the risk predictor and
//! planner read the health signals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::PackageName;
use crate::core::version::Version;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Index knowledge about one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Latest release as reported by the index (may be a pre-release).
    #[serde(default)]
    pub latest: Option<Version>,
    /// Latest stable release as reported by the index.
    #[serde(default)]
    pub stable: Option<Version>,
    /// All known releases.
    #[serde(default)]
    pub versions: Vec<Version>,
    /// Release time of the latest release.
    #[serde(default, with = "crate::core::time::rfc3339_option")]
    pub released_at: Option<OffsetDateTime>,
    /// Popularity in `[0, 1]`, scaled from download statistics.
    #[serde(default)]
    pub popularity: Option<PopularityScore>,
    /// Whether the consuming project exercises the package in tests.
    #[serde(default)]
    pub has_test_coverage: Option<bool>,
    /// Number of packages depending on this one in the project.
    #[serde(default)]
    pub dependency_count: Option<u32>,
    /// Packages this package requires.
    #[serde(default)]
    pub requires: Vec<PackageName>,
    /// Releases that announced breaking changes.
    #[serde(default)]
    pub breaking_releases: Vec<Version>,
}

/// Popularity score stored as parts-per-million to keep equality exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct PopularityScore(u32);

impl PopularityScore {
    /// Scale factor for the stored representation.
    const SCALE: f64 = 1_000_000.0;

    /// Creates a score, clamping to `[0, 1]` and mapping NaN to zero.
    #[must_use]
    pub fn new(value: f64) -> Self {
        let clamped = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "Value is clamped to [0, 1] before scaling to at most 1e6."
        )]
        let scaled = (clamped * Self::SCALE).round() as u32;
        Self(scaled)
    }

    /// Returns the score in `[0, 1]`.
    #[must_use]
    pub fn value(self) -> f64 {
        f64::from(self.0) / Self::SCALE
    }
}

impl From<f64> for PopularityScore {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<PopularityScore> for f64 {
    fn from(value: PopularityScore) -> Self {
        value.value()
    }
}

impl MetadataEntry {
    /// Returns the newest release eligible as "latest". Pre-releases are
    /// only eligible when `allow_prerelease` is set.
    #[must_use]
    pub fn latest_release(&self, allow_prerelease: bool) -> Option<Version> {
        self.known_versions()
            .into_iter()
            .filter(|version| allow_prerelease || !version.is_prerelease())
            .max()
    }

    /// Returns every release the entry names, sorted and de-duplicated.
    #[must_use]
    pub fn known_versions(&self) -> Vec<Version> {
        let mut all: Vec<Version> = self.versions.clone();
        all.extend(self.latest.iter().cloned());
        all.extend(self.stable.iter().cloned());
        all.sort();
        all.dedup();
        all
    }

    /// Returns true when a breaking release lies in `(from, to]`.
    #[must_use]
    pub fn crosses_breaking_release(&self, from: &Version, to: &Version) -> bool {
        self.breaking_releases.iter().any(|release| release > from && release <= to)
    }
}

/// Package index snapshot keyed by canonical package name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataIndex {
    /// Time the snapshot was generated.
    #[serde(default, with = "crate::core::time::rfc3339_option")]
    pub generated_at: Option<OffsetDateTime>,
    /// Entries by package.
    #[serde(default)]
    pub packages: BTreeMap<PackageName, MetadataEntry>,
}

impl MetadataIndex {
    /// Returns the entry for a package.
    #[must_use]
    pub fn get(&self, name: &PackageName) -> Option<&MetadataEntry> {
        self.packages.get(name)
    }

    /// Returns true when the index has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
