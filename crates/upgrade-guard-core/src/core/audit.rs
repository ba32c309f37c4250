// crates/upgrade-guard-core/src/core/audit.rs
// ============================================================================
// Module: Upgrade Guard Audit Events
// Description: Structured audit event payloads emitted by every engine stage.
// Purpose: Give the run a machine-readable trail without a logging backend.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each stage emits one [`AuditEvent`] through an injected sink. Records are
//! serialized as one JSON object per line with an `event` discriminator, a
//! millisecond timestamp, and the run id when one is active.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::PackageName;
use crate::core::identifiers::RunId;
use crate::core::plan::ResolverStatus;
use crate::core::severity::RiskLevel;
use crate::core::severity::Rollup;
use crate::core::source::SourceKind;
use crate::core::source::SourceState;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Audit event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A source was fetched and normalized.
    SourceCollected {
        /// Source kind.
        source: SourceKind,
        /// Resulting state.
        state: SourceState,
        /// Normalized package count.
        packages: usize,
        /// Payload digest.
        digest: Option<HashDigest>,
        /// Diagnostic for missing or errored sources.
        diagnostic: Option<String>,
    },
    /// The guard produced an assessment.
    AssessmentComputed {
        /// Rollup verdict.
        rollup: Rollup,
        /// Packages above `safe`.
        packages_flagged: usize,
        /// Rollup-level escalations.
        escalations: usize,
    },
    /// The planner produced a plan.
    PlanGenerated {
        /// Candidate count.
        candidates: usize,
        /// Batched command count.
        batches: usize,
    },
    /// A resolver dry run finished.
    ResolverChecked {
        /// Candidate package.
        package: PackageName,
        /// Target version.
        version: String,
        /// Resolver outcome.
        status: ResolverStatus,
    },
    /// The risk model scored an update.
    RiskPredicted {
        /// Package.
        package: PackageName,
        /// Score.
        score: f64,
        /// Recommendation band.
        recommendation: RiskLevel,
    },
    /// An update outcome was appended to history.
    OutcomeRecorded {
        /// Package.
        package: PackageName,
        /// Success flag.
        success: bool,
        /// Rolled-back flag.
        rolled_back: bool,
    },
    /// The rollback engine decided.
    RollbackDecided {
        /// Recommended action label.
        action: String,
        /// Confidence.
        confidence: f64,
        /// Dry-run flag.
        dry_run: bool,
    },
    /// A rollback was handed to the executor.
    RollbackExecuted {
        /// Reverted packages.
        packages: Vec<PackageName>,
        /// Executor error.
        error: Option<String>,
    },
    /// Cross-repository conflicts were resolved.
    ConflictsResolved {
        /// Conflict count.
        conflicts: usize,
        /// Packages needing manual resolution.
        manual: usize,
        /// Aggregate risk.
        estimated_risk: f64,
    },
    /// A snapshot directory was written.
    SnapshotWritten {
        /// Snapshot path.
        path: String,
        /// Manifest root digest.
        root_digest: HashDigest,
    },
    /// Old snapshots were pruned.
    SnapshotPruned {
        /// Pruned run ids.
        removed: Vec<RunId>,
    },
}

impl AuditEvent {
    /// Returns the event discriminator.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SourceCollected {
                ..
            } => "source_collected",
            Self::AssessmentComputed {
                ..
            } => "assessment_computed",
            Self::PlanGenerated {
                ..
            } => "plan_generated",
            Self::ResolverChecked {
                ..
            } => "resolver_checked",
            Self::RiskPredicted {
                ..
            } => "risk_predicted",
            Self::OutcomeRecorded {
                ..
            } => "outcome_recorded",
            Self::RollbackDecided {
                ..
            } => "rollback_decided",
            Self::RollbackExecuted {
                ..
            } => "rollback_executed",
            Self::ConflictsResolved {
                ..
            } => "conflicts_resolved",
            Self::SnapshotWritten {
                ..
            } => "snapshot_written",
            Self::SnapshotPruned {
                ..
            } => "snapshot_pruned",
        }
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Timestamped audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Active run identifier.
    pub run_id: Option<RunId>,
    /// Event payload.
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl AuditRecord {
    /// Creates a record stamped with the current wall clock.
    #[must_use]
    pub fn new(run_id: Option<RunId>, event: AuditEvent) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            timestamp_ms,
            run_id,
            event,
        }
    }
}
