// crates/upgrade-guard-core/src/core/mod.rs
// ============================================================================
// Module: Upgrade Guard Core Types
// Description: Canonical data model for dependency risk decisions.
// Purpose: Provide stable, serializable types for every engine document.
// Dependencies: serde, serde_jcs, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! Core types define package records, version algebra, contract policy, and
//! the documents produced by each engine stage (assessment, drift, plan,
//! risk, rollback, conflict resolution, snapshot manifest). They are the
//! canonical source of truth for anything persisted or exported.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod assessment;
pub mod audit;
pub mod contract;
pub mod drift;
pub mod hashing;
pub mod health;
pub mod identifiers;
pub mod metadata;
pub mod payloads;
pub mod plan;
pub mod repository;
pub mod risk;
pub mod severity;
pub mod snapshot;
pub mod source;
pub mod time;
pub mod version;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use assessment::AssessedIssue;
pub use assessment::Assessment;
pub use assessment::ContractFreshness;
pub use assessment::Escalation;
pub use assessment::EscalationRule;
pub use assessment::EvidenceRef;
pub use assessment::FreshnessStatus;
pub use assessment::PackageAssessment;
pub use assessment::SnoozeNote;
pub use audit::AuditEvent;
pub use audit::AuditRecord;
pub use contract::ContractHeader;
pub use contract::ContractPolicy;
pub use contract::EnvironmentAlignment;
pub use contract::EnvironmentRule;
pub use contract::Governance;
pub use contract::PackageOverride;
pub use contract::PolicyError;
pub use contract::PolicySet;
pub use contract::SignaturePolicy;
pub use contract::Snooze;
pub use contract::SnoozeStatus;
pub use contract::UpdatePolicy;
pub use contract::WheelPolicy;
pub use drift::DriftClass;
pub use drift::DriftCounts;
pub use drift::DriftReport;
pub use drift::PackageDrift;
pub use hashing::DIGEST_ALGORITHM;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use health::AppliedUpdate;
pub use health::BreachedMetric;
pub use health::HealthMetric;
pub use health::MetricSeverity;
pub use health::RollbackAction;
pub use health::RollbackDecision;
pub use health::RollbackExecution;
pub use identifiers::PackageName;
pub use identifiers::RunId;
pub use metadata::MetadataEntry;
pub use metadata::MetadataIndex;
pub use metadata::PopularityScore;
pub use plan::FactorContribution;
pub use plan::PlanBatch;
pub use plan::ResolverStatus;
pub use plan::ResolverSummary;
pub use plan::UpgradePlan;
pub use plan::UpgradePlanCandidate;
pub use repository::DependencyConflict;
pub use repository::RepositoryInfo;
pub use repository::ResolutionPlan;
pub use repository::ResolutionStrategy;
pub use repository::UpdateCoordination;
pub use risk::BacktestReport;
pub use risk::HistoricalOutcome;
pub use risk::RiskScore;
pub use risk::UpdateFeatures;
pub use severity::DEFAULT_EXIT_UNKNOWN;
pub use severity::EXIT_BLOCKED;
pub use severity::EXIT_NEEDS_REVIEW;
pub use severity::EXIT_SAFE;
pub use severity::RiskLevel;
pub use severity::Rollup;
pub use severity::Severity;
pub use snapshot::RetentionPolicy;
pub use snapshot::SnapshotCadence;
pub use snapshot::SnapshotEntry;
pub use snapshot::SnapshotFile;
pub use snapshot::SnapshotManifest;
pub use source::Issue;
pub use source::IssueKind;
pub use source::PackageEntry;
pub use source::PackageRecord;
pub use source::SignatureEvidence;
pub use source::SourceInput;
pub use source::SourceKind;
pub use source::SourceState;
pub use version::PreRelease;
pub use version::PreReleaseKind;
pub use version::Version;
pub use version::VersionChange;
pub use version::VersionError;
pub use version::VersionReq;
