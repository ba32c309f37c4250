// crates/upgrade-guard-core/src/core/assessment.rs
// ============================================================================
// Module: Upgrade Guard Assessment
// Description: Per-package risk verdicts and the run-level rollup document.
// Purpose: Define the Assessment document persisted with every snapshot.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The assessment is the guard's output: one [`PackageAssessment`] per
//! package with ordered reasons, the rollup verdict, contract freshness, the
//! escalations that moved the verdict, and evidence references back to every
//! source that was consulted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::contract::SnoozeStatus;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::PackageName;
use crate::core::severity::RiskLevel;
use crate::core::severity::Rollup;
use crate::core::severity::Severity;
use crate::core::source::IssueKind;
use crate::core::source::SourceKind;
use crate::core::source::SourceState;
use crate::core::version::Version;

// ============================================================================
// SECTION: Contract Freshness
// ============================================================================

/// Freshness of the evidence a contract verdict depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessStatus {
    /// Within threshold.
    Fresh,
    /// Past threshold but within the block threshold.
    Stale,
    /// Past the block threshold.
    Expired,
    /// No timestamp to judge by.
    Unknown,
}

impl FreshnessStatus {
    /// Ranks known statuses for "worse of" comparisons; `unknown` ranks
    /// lowest so any known status wins.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Fresh => 1,
            Self::Stale => 2,
            Self::Expired => 3,
        }
    }

    /// Classifies an age against a threshold and block threshold.
    #[must_use]
    pub fn from_age(age_days: i64, threshold_days: u32, block_threshold_days: f64) -> Self {
        if age_days <= i64::from(threshold_days) {
            Self::Fresh
        } else if age_days_as_f64(age_days) <= block_threshold_days {
            Self::Stale
        } else {
            Self::Expired
        }
    }

    /// Returns the serialized label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

/// Converts whole days to `f64` for threshold comparisons.
#[allow(clippy::cast_precision_loss, reason = "Day counts are far below 2^52.")]
fn age_days_as_f64(age_days: i64) -> f64 {
    age_days as f64
}

/// Freshness measurements behind the contract status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractFreshness {
    /// Worse of the SBOM and contract-review statuses.
    pub status: FreshnessStatus,
    /// Age of the SBOM (or metadata snapshot) in whole days.
    pub sbom_age_days: Option<i64>,
    /// SBOM age threshold.
    pub sbom_threshold_days: u32,
    /// SBOM age past which the run blocks.
    pub sbom_block_threshold_days: f64,
    /// Status derived from SBOM age alone.
    pub sbom_status: FreshnessStatus,
    /// Days since the contract was last validated.
    pub contract_age_days: Option<i64>,
    /// Contract review interval.
    pub contract_review_days: u32,
    /// Status derived from contract review age alone.
    pub contract_status: FreshnessStatus,
}

// ============================================================================
// SECTION: Package Verdicts
// ============================================================================

/// Snooze attribution for a suppressed or formerly suppressed issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnoozeNote {
    /// Snooze identifier.
    pub id: String,
    /// Snooze state at assessment time.
    pub status: SnoozeStatus,
    /// Snooze justification.
    pub reason: String,
    /// Snooze expiry.
    #[serde(default, with = "crate::core::time::rfc3339_option")]
    pub expires_at: Option<OffsetDateTime>,
}

/// An issue as the guard evaluated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessedIssue {
    /// Source that reported the issue.
    pub source: SourceKind,
    /// Issue category.
    pub kind: IssueKind,
    /// Issue identifier.
    pub id: String,
    /// Issue summary.
    pub summary: String,
    /// Severity as reported.
    pub severity: Severity,
    /// Severity after snoozes.
    pub effective_severity: Severity,
    /// Matching snooze, if any.
    pub snooze: Option<SnoozeNote>,
}

/// Guard verdict for one package.
///
/// # Invariants
/// - `risk >= severity.risk()`.
/// - `reasons` lists every rule that contributed to `risk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAssessment {
    /// Canonical package name.
    pub name: PackageName,
    /// Ecosystem tag.
    pub ecosystem: String,
    /// Resolved version.
    pub current: Option<Version>,
    /// Candidate version suggested by a feed.
    pub candidate: Option<Version>,
    /// Severity after snoozes and escalations.
    pub severity: Severity,
    /// Risk band.
    pub risk: RiskLevel,
    /// Ordered reasons.
    pub reasons: Vec<String>,
    /// Evaluated issues, most severe first.
    pub issues: Vec<AssessedIssue>,
    /// Sources that reported the package.
    pub sources: Vec<SourceKind>,
}

// ============================================================================
// SECTION: Escalations & Evidence
// ============================================================================

/// Rule that moved a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationRule {
    /// SBOM/metadata past its age threshold.
    SbomStale,
    /// SBOM/metadata past its block threshold.
    SbomExpired,
    /// Contract review overdue.
    ContractStale,
    /// Contract review far overdue.
    ContractExpired,
    /// Required signature missing.
    MissingSignature,
    /// Required binary artifact missing.
    MissingBinary,
    /// Snooze lapsed and the original severity applies.
    SnoozeExpired,
    /// Environment out of its sync window.
    EnvironmentOutOfSync,
    /// Mandatory source failed.
    MandatorySourceError,
}

/// One escalation with its concrete reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    /// Rule that fired.
    pub rule: EscalationRule,
    /// Package scope; `None` for run-level escalations.
    pub package: Option<PackageName>,
    /// Human-readable reason.
    pub reason: String,
}

/// Reference to a source consulted by the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Source identity.
    pub source: SourceKind,
    /// Availability state.
    pub state: SourceState,
    /// Raw payload location.
    pub raw_path: Option<String>,
    /// Raw payload digest.
    pub digest: Option<HashDigest>,
    /// Missing/error diagnostic.
    pub diagnostic: Option<String>,
}

// ============================================================================
// SECTION: Assessment
// ============================================================================

/// Guard output for one run.
///
/// # Invariants
/// - Package names are unique.
/// - `packages` is ordered by risk, then severity (both descending), then
///   name.
/// - Unless `rollup` is `unknown`, it is at least the maximum package risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Assessment time.
    #[serde(with = "crate::core::time::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Run-level verdict.
    pub rollup: Rollup,
    /// Highest package severity, if any package was assessed.
    pub highest_severity: Option<Severity>,
    /// Number of packages not assessed as safe.
    pub packages_flagged: usize,
    /// Package verdicts.
    pub packages: Vec<PackageAssessment>,
    /// Sources that were missing.
    pub inputs_missing: Vec<SourceKind>,
    /// Sources that failed validation.
    pub inputs_errored: Vec<SourceKind>,
    /// Contract freshness.
    pub contract_freshness: ContractFreshness,
    /// Escalations in the order they were applied.
    pub escalations: Vec<Escalation>,
    /// Informational notes.
    pub notes: Vec<String>,
    /// One reference per source.
    pub evidence: Vec<EvidenceRef>,
}

impl Assessment {
    /// Returns the verdict for a package.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&PackageAssessment> {
        let name = PackageName::new(name);
        self.packages.iter().find(|package| package.name == name)
    }

    /// Maps the rollup onto the exit-code convention.
    #[must_use]
    pub const fn exit_code(&self, unknown_code: i32) -> i32 {
        self.rollup.exit_code(unknown_code)
    }
}
