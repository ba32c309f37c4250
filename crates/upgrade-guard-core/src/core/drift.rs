// crates/upgrade-guard-core/src/core/drift.rs
// ============================================================================
// Module: Upgrade Guard Drift Report
// Description: Freshness classification of resolved versions.
// Purpose: Define the drift document consumed by the planner and summary.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Drift is the gap between the resolved version of a package and the
//! latest release the metadata index knows about.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::PackageName;
use crate::core::version::Version;
use crate::core::version::VersionChange;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Drift classification, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DriftClass {
    /// Resolved version is the latest eligible release.
    #[serde(rename = "up-to-date")]
    UpToDate,
    /// A newer patch release exists.
    #[serde(rename = "patch_available")]
    PatchAvailable,
    /// A newer minor release exists.
    #[serde(rename = "minor_available")]
    MinorAvailable,
    /// A newer major release exists.
    #[serde(rename = "major_available")]
    MajorAvailable,
    /// The declared constraint cannot be satisfied by the index.
    #[serde(rename = "conflict")]
    Conflict,
    /// The index has no usable metadata for the package.
    #[serde(rename = "unknown")]
    Unknown,
}

impl DriftClass {
    /// Maps a version change onto a drift class.
    #[must_use]
    pub const fn from_change(change: VersionChange) -> Self {
        match change {
            VersionChange::None | VersionChange::Downgrade => Self::UpToDate,
            VersionChange::Patch => Self::PatchAvailable,
            VersionChange::Minor => Self::MinorAvailable,
            VersionChange::Major => Self::MajorAvailable,
        }
    }

    /// Returns true when an upgrade is available.
    #[must_use]
    pub const fn has_upgrade(self) -> bool {
        matches!(self, Self::PatchAvailable | Self::MinorAvailable | Self::MajorAvailable)
    }

    /// Returns the serialized label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpToDate => "up-to-date",
            Self::PatchAvailable => "patch_available",
            Self::MinorAvailable => "minor_available",
            Self::MajorAvailable => "major_available",
            Self::Conflict => "conflict",
            Self::Unknown => "unknown",
        }
    }
}

/// Drift of one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDrift {
    /// Canonical package name.
    pub name: PackageName,
    /// Ecosystem tag.
    pub ecosystem: String,
    /// Resolved version.
    pub current: Version,
    /// Latest eligible release.
    pub latest: Option<Version>,
    /// Classification.
    pub classification: DriftClass,
    /// Explanatory notes.
    pub notes: Vec<String>,
    /// True when a pending update has outlived its update window.
    pub window_exceeded: bool,
    /// True when the package is a transitive dependency.
    pub transitive: bool,
}

/// Count of packages per drift class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftCounts {
    /// Up-to-date packages.
    pub up_to_date: usize,
    /// Packages with a patch available.
    pub patch_available: usize,
    /// Packages with a minor available.
    pub minor_available: usize,
    /// Packages with a major available.
    pub major_available: usize,
    /// Packages in conflict.
    pub conflict: usize,
    /// Packages without metadata.
    pub unknown: usize,
}

impl DriftCounts {
    /// Counts one package of the given class.
    pub const fn add(&mut self, class: DriftClass) {
        match class {
            DriftClass::UpToDate => self.up_to_date += 1,
            DriftClass::PatchAvailable => self.patch_available += 1,
            DriftClass::MinorAvailable => self.minor_available += 1,
            DriftClass::MajorAvailable => self.major_available += 1,
            DriftClass::Conflict => self.conflict += 1,
            DriftClass::Unknown => self.unknown += 1,
        }
    }
}

/// Drift analysis output.
///
/// # Invariants
/// - `packages` is sorted by name.
/// - `overall` is the worst class in `packages` (`up-to-date` when empty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Analysis time.
    #[serde(with = "crate::core::time::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Worst classification.
    pub overall: DriftClass,
    /// Per-class counts.
    pub counts: DriftCounts,
    /// Per-package drift.
    pub packages: Vec<PackageDrift>,
    /// Report-level notes.
    pub notes: Vec<String>,
}

impl DriftReport {
    /// Returns the drift for a package.
    #[must_use]
    pub fn package(&self, name: &PackageName) -> Option<&PackageDrift> {
        self.packages.iter().find(|package| &package.name == name)
    }
}
