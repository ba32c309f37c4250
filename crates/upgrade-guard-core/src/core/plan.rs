// crates/upgrade-guard-core/src/core/plan.rs
// ============================================================================
// Module: Upgrade Guard Upgrade Plan
// Description: Scored upgrade candidates and batched update commands.
// Purpose: Define the explainable plan document produced by the planner.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Every candidate carries its score together with the contribution of each
//! named factor, so the ranking can be explained line by line. Commands are
//! opaque strings for the automation layer; nothing here executes them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::drift::DriftClass;
use crate::core::identifiers::PackageName;
use crate::core::severity::RiskLevel;
use crate::core::version::Version;

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Contribution of one factor to a candidate score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    /// Factor value in `[0, 1]`.
    pub value: f64,
    /// Factor weight.
    pub weight: f64,
    /// Share of the final score (`value * weight / total weight`).
    pub contribution: f64,
}

/// Outcome of a resolver dry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverStatus {
    /// Resolution succeeded.
    Ok,
    /// Resolution failed.
    Failed,
    /// Validation was not attempted.
    Skipped,
}

/// One upgrade candidate.
///
/// # Invariants
/// - `score` is in `[0, 1]` and equals the sum of factor contributions.
/// - `recommended_command` is set only for validated, non-blocked candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradePlanCandidate {
    /// Package to upgrade.
    pub package: PackageName,
    /// Ecosystem tag.
    pub ecosystem: String,
    /// Resolved version.
    pub from_version: Version,
    /// Target version.
    pub to_version: Version,
    /// Drift class of the move.
    pub drift: DriftClass,
    /// Weighted score.
    pub score: f64,
    /// Named factor contributions.
    pub factors: BTreeMap<String, FactorContribution>,
    /// True when a resolver dry run succeeded.
    pub resolver_validated: bool,
    /// Resolver outcome.
    pub resolver_status: ResolverStatus,
    /// Resolver detail (error text or summary).
    pub resolver_detail: Option<String>,
    /// Update command for this candidate alone.
    pub recommended_command: Option<String>,
    /// Final status.
    pub status: RiskLevel,
    /// Reasons behind the status.
    pub reasons: Vec<String>,
}

// ============================================================================
// SECTION: Plan
// ============================================================================

/// A batched update command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanBatch {
    /// Ecosystem shared by the batch.
    pub ecosystem: String,
    /// Status shared by the batch.
    pub status: RiskLevel,
    /// Packages in the batch.
    pub packages: Vec<PackageName>,
    /// Command string.
    pub command: String,
}

/// Resolver outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSummary {
    /// Successful dry runs.
    pub ok: usize,
    /// Failed dry runs.
    pub failed: usize,
    /// Candidates not validated.
    pub skipped: usize,
}

/// Planner output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradePlan {
    /// Planning time.
    #[serde(with = "crate::core::time::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Candidates sorted by score descending.
    pub candidates: Vec<UpgradePlanCandidate>,
    /// Batched commands.
    pub batches: Vec<PlanBatch>,
    /// Resolver outcome counts.
    pub resolver: ResolverSummary,
    /// Informational notes.
    pub notes: Vec<String>,
}

impl UpgradePlan {
    /// Returns the candidate for a package.
    #[must_use]
    pub fn candidate(&self, name: &str) -> Option<&UpgradePlanCandidate> {
        let name = PackageName::new(name);
        self.candidates.iter().find(|candidate| candidate.package == name)
    }

    /// Returns every batched command in order.
    #[must_use]
    pub fn commands(&self) -> Vec<&str> {
        self.batches.iter().map(|batch| batch.command.as_str()).collect()
    }
}
