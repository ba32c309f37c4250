// crates/upgrade-guard-core/src/core/health.rs
// ============================================================================
// Module: Upgrade Guard Health & Rollback Types
// Description: Post-deploy health observations and rollback decisions.
// Purpose: Define the rollback engine's inputs and decision documents.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Health metrics observed after a deployment are correlated with the
//! package updates applied shortly before them. The decision document names
//! every breached metric, the packages it was correlated with, and whether a
//! full or partial rollback is recommended.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::PackageName;
use crate::core::version::Version;

// ============================================================================
// SECTION: Observations
// ============================================================================

/// Severity of a health metric breach.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricSeverity {
    /// Degradation worth a scoped response.
    #[default]
    Warning,
    /// Degradation warranting a full response.
    Critical,
}

/// One post-deploy health observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetric {
    /// Metric name (`error-rate`, `p99-latency`, ...).
    pub name: String,
    /// Observed value.
    pub value: f64,
    /// Alert threshold; values above it breach.
    pub threshold: f64,
    /// Breach flag reported by the monitoring system.
    #[serde(default)]
    pub breached: bool,
    /// Breach severity.
    #[serde(default)]
    pub severity: MetricSeverity,
    /// Observation time.
    #[serde(with = "crate::core::time::rfc3339")]
    pub observed_at: OffsetDateTime,
    /// Packages the monitoring system attributes the metric to; empty means
    /// any update in the window is a suspect.
    #[serde(default)]
    pub suspects: Vec<PackageName>,
}

impl MetricSeverity {
    /// Returns the snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl HealthMetric {
    /// Returns true when the metric is flagged or exceeds its threshold.
    #[must_use]
    pub fn is_breached(&self) -> bool {
        self.breached || self.value > self.threshold
    }
}

/// A package update applied to the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedUpdate {
    /// Updated package.
    pub package: PackageName,
    /// Version before the update.
    #[serde(default)]
    pub from_version: Option<Version>,
    /// Version after the update.
    pub to_version: Version,
    /// Time the update was applied.
    #[serde(with = "crate::core::time::rfc3339")]
    pub applied_at: OffsetDateTime,
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Rollback action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackAction {
    /// Nothing breached.
    None,
    /// Breaches exist but none correlate with a recent update.
    Monitor,
    /// Roll back the suspect packages only.
    PartialRollback,
    /// Roll back every update in the window.
    FullRollback,
}

impl RollbackAction {
    /// Returns the snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Monitor => "monitor",
            Self::PartialRollback => "partial_rollback",
            Self::FullRollback => "full_rollback",
        }
    }
}

impl fmt::Display for RollbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A breached metric and the updates it correlated with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreachedMetric {
    /// Metric name.
    pub name: String,
    /// Observed value.
    pub value: f64,
    /// Threshold.
    pub threshold: f64,
    /// Breach severity.
    pub severity: MetricSeverity,
    /// Correlated packages, sorted.
    pub correlated_packages: Vec<PackageName>,
}

/// Rollback decision document.
///
/// # Invariants
/// - `confidence` is in `[0, 1]`.
/// - `partial_packages` is set only for partial rollbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackDecision {
    /// Decision time.
    #[serde(with = "crate::core::time::rfc3339")]
    pub decided_at: OffsetDateTime,
    /// A rollback is recommended.
    pub should_rollback: bool,
    /// Recommended action.
    pub action: RollbackAction,
    /// Confidence in the decision.
    pub confidence: f64,
    /// Human-readable reason.
    pub reason: String,
    /// Breached metrics.
    pub breached_metrics: Vec<BreachedMetric>,
    /// Package set for a partial rollback.
    pub partial_packages: Option<Vec<PackageName>>,
    /// Packages a full or partial rollback would revert.
    pub rollback_packages: Vec<PackageName>,
    /// Updates that fell inside the correlation window.
    pub correlated_updates: Vec<PackageName>,
    /// True when the decision was produced in dry-run mode.
    pub dry_run: bool,
}

/// Result of acting on a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackExecution {
    /// Decision acted upon.
    pub decision: RollbackDecision,
    /// True when the executor was invoked.
    pub executed: bool,
    /// Executor error, if any.
    pub error: Option<String>,
}
