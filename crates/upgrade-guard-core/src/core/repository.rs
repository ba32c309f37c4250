// crates/upgrade-guard-core/src/core/repository.rs
// ============================================================================
// Module: Upgrade Guard Cross-Repository Types
// Description: Repository dependency maps, conflicts, and resolution plans.
// Purpose: Define the documents exchanged with the cross-repo coordinator.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Each registered repository declares the version it requires for each
//! package. Packages whose requirements diverge become conflicts; the
//! resolution plan records the strategy, the chosen version, and an
//! execution order that applies dependencies before their dependents.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::PackageName;
use crate::core::version::Version;

// ============================================================================
// SECTION: Repositories
// ============================================================================

/// A repository taking part in coordinated upgrades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Repository name (unique).
    pub name: String,
    /// Repository location.
    pub path: String,
    /// Required version (or requirement) per package.
    #[serde(default)]
    pub dependencies: BTreeMap<PackageName, String>,
    /// Priority; higher wins when repositories must be dropped.
    #[serde(default)]
    pub priority: i32,
}

impl RepositoryInfo {
    /// Creates a repository with no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            dependencies: BTreeMap::new(),
            priority: 0,
        }
    }

    /// Adds a dependency requirement.
    #[must_use]
    pub fn with_dependency(mut self, package: &str, requirement: &str) -> Self {
        self.dependencies.insert(PackageName::new(package), requirement.trim().to_string());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

// ============================================================================
// SECTION: Conflicts
// ============================================================================

/// Conflict resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStrategy {
    /// Pick the highest version satisfying every repository.
    HighestVersion,
    /// Pick the lowest version satisfying every repository.
    LowestCompatible,
    /// Prefer the highest non-prerelease version.
    LockToStable,
    /// Search repository subsets for a common version.
    Backtrack,
    /// Drop the package and flag it for manual resolution.
    ExcludeConflicting,
}

impl ResolutionStrategy {
    /// Per-conflict risk of the strategy.
    #[must_use]
    pub const fn base_risk(self) -> f64 {
        match self {
            Self::HighestVersion => 0.2,
            Self::LockToStable => 0.25,
            Self::LowestCompatible => 0.3,
            Self::Backtrack => 0.7,
            Self::ExcludeConflicting => 1.0,
        }
    }

    /// Weight of the strategy in the aggregate risk.
    #[must_use]
    pub const fn risk_weight(self) -> f64 {
        match self {
            Self::Backtrack => 3.0,
            Self::ExcludeConflicting => 2.0,
            Self::HighestVersion | Self::LowestCompatible | Self::LockToStable => 1.0,
        }
    }

    /// Returns the serialized label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HighestVersion => "HIGHEST_VERSION",
            Self::LowestCompatible => "LOWEST_COMPATIBLE",
            Self::LockToStable => "LOCK_TO_STABLE",
            Self::Backtrack => "BACKTRACK",
            Self::ExcludeConflicting => "EXCLUDE_CONFLICTING",
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package whose requirements diverge across repositories.
///
/// # Invariants
/// - `resolved_version` is set exactly when `resolvable` is true.
/// - `risk` is in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyConflict {
    /// Package in conflict.
    pub package: PackageName,
    /// Requirement per repository.
    pub required_versions: BTreeMap<String, String>,
    /// A version was found.
    pub resolvable: bool,
    /// Strategy applied.
    pub strategy: ResolutionStrategy,
    /// Chosen version.
    pub resolved_version: Option<Version>,
    /// Repositories left out of the resolution (backtracking).
    pub excluded_repositories: Vec<String>,
    /// Per-conflict risk.
    pub risk: f64,
    /// Explanatory notes.
    pub notes: Vec<String>,
}

/// Conflict resolution plan.
///
/// # Invariants
/// - `execution_order` lists each resolved package once, dependencies
///   before dependents (cycles excepted, see `cycles`).
/// - `estimated_risk` is in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPlan {
    /// Planning time.
    #[serde(with = "crate::core::time::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Repository names, sorted.
    pub repositories: Vec<String>,
    /// Conflicts, sorted by package.
    pub conflicts: Vec<DependencyConflict>,
    /// Resolved version per package.
    pub resolutions: BTreeMap<PackageName, Version>,
    /// Order in which resolutions should be applied.
    pub execution_order: Vec<PackageName>,
    /// Dependency cycles that were broken by name order.
    pub cycles: Vec<Vec<PackageName>>,
    /// Packages requiring manual resolution.
    pub manual_resolution: Vec<PackageName>,
    /// Weighted aggregate risk.
    pub estimated_risk: f64,
}

impl ResolutionPlan {
    /// Returns the conflict for a package.
    #[must_use]
    pub fn conflict(&self, package: &PackageName) -> Option<&DependencyConflict> {
        self.conflicts.iter().find(|conflict| &conflict.package == package)
    }
}

/// Impact of a proposed version on each repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCoordination {
    /// Package being updated.
    pub package: PackageName,
    /// Proposed version.
    pub version: Version,
    /// Repositories whose requirement already admits the version.
    pub compatible: Vec<String>,
    /// Repositories that must change their requirement.
    pub requires_change: Vec<String>,
    /// Repositories whose requirement could not be parsed.
    pub unparseable: Vec<String>,
    /// True when any repository must cross a major boundary.
    pub crosses_major: bool,
}
