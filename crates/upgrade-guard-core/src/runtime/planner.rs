// crates/upgrade-guard-core/src/runtime/planner.rs
// ============================================================================
// Module: Upgrade Guard Upgrade Planner
// Description: Weighted candidate scoring with resolver-validated batching.
// Purpose: Rank upgrades, validate the best of them, and emit update commands.
// Dependencies: crate::core, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! Candidates come from the drift report (move to the latest eligible
//! release) and, for packages drift could not place, from the candidate
//! version a source proposed. Each candidate is scored as the weighted mean
//! of five factors in `[0, 1]`:
//!
//! - `recency`: how close the target is to the latest known release.
//! - `inverse_severity`: small moves score high, and moves away from a
//!   version the guard flagged are lifted by the severity of its findings.
//! - `contract`: whether the contract allows the move.
//! - `historical_success`: recency-weighted success rate of past updates.
//! - `test_coverage`: whether the consuming project tests the package.
//!
//! Guard findings describe the installed version, so they raise a
//! candidate's priority and never block it. Blocking comes from the
//! contract, unresolvable cross-repo conflicts, and the resolver.
//!
//! The top-N non-blocked candidates are dry-run through the injected
//! resolver. A failed dry run blocks the candidate regardless of score. Only
//! validated candidates receive commands; safe ones are batched per
//! ecosystem, needs-review ones get a command each.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::Assessment;
use crate::core::ContractPolicy;
use crate::core::DriftClass;
use crate::core::DriftReport;
use crate::core::FactorContribution;
use crate::core::HistoricalOutcome;
use crate::core::MetadataIndex;
use crate::core::PackageName;
use crate::core::PlanBatch;
use crate::core::ResolutionPlan;
use crate::core::ResolverStatus;
use crate::core::ResolverSummary;
use crate::core::RiskLevel;
use crate::core::Severity;
use crate::core::UpgradePlan;
use crate::core::UpgradePlanCandidate;
use crate::core::Version;
use crate::core::time::elapsed_days;
use crate::interfaces::DependencyResolver;
use crate::interfaces::ResolverError;
use crate::interfaces::ResolverRequest;
use crate::interfaces::ResolverVerdict;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Factor key for recency.
pub const FACTOR_RECENCY: &str = "recency";
/// Factor key for inverse severity.
pub const FACTOR_INVERSE_SEVERITY: &str = "inverse_severity";
/// Factor key for contract allowance.
pub const FACTOR_CONTRACT: &str = "contract";
/// Factor key for historical success.
pub const FACTOR_HISTORICAL_SUCCESS: &str = "historical_success";
/// Factor key for test coverage.
pub const FACTOR_TEST_COVERAGE: &str = "test_coverage";

/// Default number of candidates validated by the resolver.
pub const DEFAULT_TOP_N: usize = 10;
/// Default number of packages per batched command.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;
/// Default update command prefix.
pub const DEFAULT_COMMAND_PREFIX: &str = "pip install --upgrade";
/// Default half-life for outcome decay.
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 30.0;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Planner configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// Configuration is invalid.
    #[error("invalid planner configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Factor weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerWeights {
    /// Recency weight.
    pub recency: f64,
    /// Inverse severity weight.
    pub inverse_severity: f64,
    /// Contract allowance weight.
    pub contract: f64,
    /// Historical success weight.
    pub historical_success: f64,
    /// Test coverage weight.
    pub test_coverage: f64,
}

impl Default for PlannerWeights {
    fn default() -> Self {
        Self {
            recency: 3.0,
            inverse_severity: 5.0,
            contract: 4.0,
            historical_success: 2.0,
            test_coverage: 1.0,
        }
    }
}

impl PlannerWeights {
    /// Returns the weights keyed by factor name.
    fn named(&self) -> [(&'static str, f64); 5] {
        [
            (FACTOR_RECENCY, self.recency),
            (FACTOR_INVERSE_SEVERITY, self.inverse_severity),
            (FACTOR_CONTRACT, self.contract),
            (FACTOR_HISTORICAL_SUCCESS, self.historical_success),
            (FACTOR_TEST_COVERAGE, self.test_coverage),
        ]
    }

    /// Returns the sum of all weights.
    fn total(&self) -> f64 {
        self.named().iter().map(|(_, weight)| weight).sum()
    }
}

/// Planner configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Factor weights.
    pub weights: PlannerWeights,
    /// Number of non-blocked candidates to validate.
    pub top_n: usize,
    /// Maximum packages per batched command.
    pub max_batch_size: usize,
    /// Allows major-version candidates.
    pub allow_major: bool,
    /// Disables resolver validation entirely.
    pub skip_resolver: bool,
    /// Command prefix for update commands.
    pub command_prefix: String,
    /// Half-life for outcome decay in days.
    pub half_life_days: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            weights: PlannerWeights::default(),
            top_n: DEFAULT_TOP_N,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            allow_major: true,
            skip_resolver: false,
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            half_life_days: DEFAULT_HALF_LIFE_DAYS,
        }
    }
}

impl PlannerConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Invalid`] for negative or non-finite weights,
    /// an all-zero weight vector, a zero batch size, a non-positive
    /// half-life, or an empty command prefix.
    pub fn validate(&self) -> Result<(), PlannerError> {
        for (name, weight) in self.weights.named() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(PlannerError::Invalid(format!(
                    "weight {name} must be a finite non-negative number"
                )));
            }
        }
        if self.weights.total() <= 0.0 {
            return Err(PlannerError::Invalid("at least one weight must be positive".to_string()));
        }
        if self.max_batch_size == 0 {
            return Err(PlannerError::Invalid("max_batch_size must be at least 1".to_string()));
        }
        if !self.half_life_days.is_finite() || self.half_life_days <= 0.0 {
            return Err(PlannerError::Invalid("half_life_days must be positive".to_string()));
        }
        if self.command_prefix.trim().is_empty() {
            return Err(PlannerError::Invalid("command_prefix must be set".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Documents the planner reads.
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    /// Guard assessment.
    pub assessment: &'a Assessment,
    /// Drift report.
    pub drift: &'a DriftReport,
    /// Contract policy.
    pub policy: &'a ContractPolicy,
    /// Metadata index.
    pub metadata: &'a MetadataIndex,
    /// Recorded outcomes.
    pub history: &'a [HistoricalOutcome],
    /// Cross-repo resolution, when repositories are registered.
    pub conflicts: Option<&'a ResolutionPlan>,
}

/// Candidate before scoring.
struct Proposal {
    /// Package name.
    package: PackageName,
    /// Ecosystem tag.
    ecosystem: String,
    /// Resolved version.
    from_version: Version,
    /// Target version.
    to_version: Version,
    /// Latest known release.
    latest: Option<Version>,
}

// ============================================================================
// SECTION: Planner
// ============================================================================

/// Upgrade planner.
#[derive(Debug, Clone)]
pub struct Planner {
    /// Validated configuration.
    config: PlannerConfig,
}

impl Planner {
    /// Creates a planner.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Invalid`] when the configuration is invalid.
    pub fn new(config: PlannerConfig) -> Result<Self, PlannerError> {
        config.validate()?;
        Ok(Self {
            config,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Builds the upgrade plan.
    pub fn plan<R: DependencyResolver + ?Sized>(
        &self,
        inputs: &PlanInputs<'_>,
        resolver: &R,
        now: OffsetDateTime,
    ) -> UpgradePlan {
        let mut notes = Vec::new();
        let mut candidates: Vec<UpgradePlanCandidate> = collect_proposals(inputs)
            .into_iter()
            .filter_map(|proposal| retarget(proposal, inputs.conflicts, &mut notes))
            .map(|(proposal, blocked_reason)| self.score(proposal, blocked_reason, inputs, now))
            .collect();
        candidates.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.drift.cmp(&right.drift))
                .then_with(|| left.package.cmp(&right.package))
        });

        let resolver_summary = self.validate_candidates(&mut candidates, resolver, &mut notes);
        for candidate in &mut candidates {
            if candidate.resolver_status == ResolverStatus::Ok && candidate.status != RiskLevel::Blocked {
                candidate.recommended_command = Some(format!(
                    "{} {}",
                    self.config.command_prefix,
                    pin(&candidate.package, &candidate.to_version)
                ));
            }
        }
        let batches = self.batch(&candidates);
        if candidates.is_empty() {
            notes.push("no upgrade candidates".to_string());
        }
        UpgradePlan {
            generated_at: now,
            candidates,
            batches,
            resolver: resolver_summary,
            notes,
        }
    }

    /// Scores one proposal.
    fn score(
        &self,
        proposal: Proposal,
        blocked_reason: Option<String>,
        inputs: &PlanInputs<'_>,
        now: OffsetDateTime,
    ) -> UpgradePlanCandidate {
        let drift = DriftClass::from_change(proposal.from_version.change_to(&proposal.to_version));
        let assessed = inputs.assessment.package(proposal.package.as_str());
        let severity = assessed.map_or(Severity::Info, |package| package.severity);
        let mut status = RiskLevel::Safe;
        let mut reasons = Vec::new();
        if let Some(reason) = blocked_reason {
            status = RiskLevel::Blocked;
            reasons.push(reason);
        }
        if let Some(package) = assessed
            && package.severity > Severity::Info
        {
            reasons.push(format!(
                "upgrade addresses {} findings on {} {}",
                package.severity, package.name, proposal.from_version
            ));
        }

        let (contract, contract_status, contract_reason) =
            self.contract_factor(&proposal, drift, inputs.policy);
        status = status.max(contract_status);
        reasons.extend(contract_reason);

        let values = [
            (FACTOR_RECENCY, recency_factor(&proposal.to_version, proposal.latest.as_ref())),
            (FACTOR_INVERSE_SEVERITY, inverse_severity_factor(drift, severity)),
            (FACTOR_CONTRACT, contract),
            (
                FACTOR_HISTORICAL_SUCCESS,
                success_factor(&proposal.package, inputs.history, self.config.half_life_days, now),
            ),
            (
                FACTOR_TEST_COVERAGE,
                coverage_factor(inputs.metadata, &proposal.package),
            ),
        ];
        let total_weight = self.config.weights.total();
        let mut factors = BTreeMap::new();
        let mut score = 0.0;
        for ((name, value), (_, weight)) in values.into_iter().zip(self.config.weights.named()) {
            let contribution = value * weight / total_weight;
            score += contribution;
            factors.insert(
                name.to_string(),
                FactorContribution {
                    value,
                    weight,
                    contribution,
                },
            );
        }

        UpgradePlanCandidate {
            package: proposal.package,
            ecosystem: proposal.ecosystem,
            from_version: proposal.from_version,
            to_version: proposal.to_version,
            drift,
            score: score.clamp(0.0, 1.0),
            factors,
            resolver_validated: false,
            resolver_status: ResolverStatus::Skipped,
            resolver_detail: None,
            recommended_command: None,
            status,
            reasons,
        }
    }

    /// Returns the contract factor, the status it implies, and its reason.
    fn contract_factor(
        &self,
        proposal: &Proposal,
        drift: DriftClass,
        policy: &ContractPolicy,
    ) -> (f64, RiskLevel, Option<String>) {
        if drift != DriftClass::MajorAvailable {
            return (1.0, RiskLevel::Safe, None);
        }
        if policy.stays_on_major(&proposal.package) {
            let reason = format!(
                "stay_on_major pins {} to major {}",
                proposal.package,
                proposal.from_version.major()
            );
            return (0.0, RiskLevel::Blocked, Some(reason));
        }
        if !self.config.allow_major {
            return (
                0.0,
                RiskLevel::Blocked,
                Some("major upgrades disabled by planner configuration".to_string()),
            );
        }
        if policy.policies.updates.major_review_required {
            return (
                0.5,
                RiskLevel::NeedsReview,
                Some(format!(
                    "major upgrade {} -> {} requires review",
                    proposal.from_version, proposal.to_version
                )),
            );
        }
        (1.0, RiskLevel::Safe, None)
    }

    /// Runs resolver dry runs over the top-N non-blocked candidates.
    fn validate_candidates<R: DependencyResolver + ?Sized>(
        &self,
        candidates: &mut [UpgradePlanCandidate],
        resolver: &R,
        notes: &mut Vec<String>,
    ) -> ResolverSummary {
        let mut summary = ResolverSummary::default();
        if self.config.skip_resolver {
            notes.push("resolver validation skipped by configuration".to_string());
        }
        let mut attempted = 0usize;
        for candidate in candidates.iter_mut() {
            let detail = if self.config.skip_resolver {
                Some("resolver verification skipped by configuration".to_string())
            } else if candidate.status == RiskLevel::Blocked {
                Some("blocked before validation".to_string())
            } else if attempted >= self.config.top_n {
                Some(format!("outside top {} candidates", self.config.top_n))
            } else {
                attempted += 1;
                let request = ResolverRequest {
                    package: candidate.package.clone(),
                    ecosystem: candidate.ecosystem.clone(),
                    from_version: candidate.from_version.clone(),
                    to_version: candidate.to_version.clone(),
                };
                apply_verdict(candidate, resolver.dry_run(&request));
                None
            };
            if let Some(detail) = detail {
                candidate.resolver_status = ResolverStatus::Skipped;
                candidate.resolver_detail = Some(detail);
            }
            match candidate.resolver_status {
                ResolverStatus::Ok => summary.ok += 1,
                ResolverStatus::Failed => summary.failed += 1,
                ResolverStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    /// Groups validated candidates into commands.
    fn batch(&self, candidates: &[UpgradePlanCandidate]) -> Vec<PlanBatch> {
        let validated = candidates.iter().filter(|candidate| candidate.recommended_command.is_some());
        let mut safe: BTreeMap<&str, Vec<&UpgradePlanCandidate>> = BTreeMap::new();
        let mut review = Vec::new();
        for candidate in validated {
            match candidate.status {
                RiskLevel::Safe => safe.entry(candidate.ecosystem.as_str()).or_default().push(candidate),
                RiskLevel::NeedsReview => review.push(candidate),
                RiskLevel::Blocked => {}
            }
        }
        let mut batches = Vec::new();
        for (ecosystem, members) in safe {
            for chunk in members.chunks(self.config.max_batch_size) {
                let pins: Vec<String> =
                    chunk.iter().map(|candidate| pin(&candidate.package, &candidate.to_version)).collect();
                batches.push(PlanBatch {
                    ecosystem: ecosystem.to_string(),
                    status: RiskLevel::Safe,
                    packages: chunk.iter().map(|candidate| candidate.package.clone()).collect(),
                    command: format!("{} {}", self.config.command_prefix, pins.join(" ")),
                });
            }
        }
        for candidate in review {
            batches.push(PlanBatch {
                ecosystem: candidate.ecosystem.clone(),
                status: RiskLevel::NeedsReview,
                packages: vec![candidate.package.clone()],
                command: format!(
                    "{} {}",
                    self.config.command_prefix,
                    pin(&candidate.package, &candidate.to_version)
                ),
            });
        }
        batches
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Collects one proposal per package with an available upgrade.
fn collect_proposals(inputs: &PlanInputs<'_>) -> Vec<Proposal> {
    let mut proposals: BTreeMap<PackageName, Proposal> = BTreeMap::new();
    for package in &inputs.drift.packages {
        if !package.classification.has_upgrade() {
            continue;
        }
        let Some(latest) = package.latest.clone() else {
            continue;
        };
        proposals.insert(
            package.name.clone(),
            Proposal {
                package: package.name.clone(),
                ecosystem: package.ecosystem.clone(),
                from_version: package.current.clone(),
                to_version: latest.clone(),
                latest: Some(latest),
            },
        );
    }
    for package in &inputs.assessment.packages {
        if proposals.contains_key(&package.name) {
            continue;
        }
        let (Some(current), Some(candidate)) = (&package.current, &package.candidate) else {
            continue;
        };
        if candidate <= current {
            continue;
        }
        let latest = inputs
            .drift
            .package(&package.name)
            .and_then(|drift| drift.latest.clone());
        proposals.insert(
            package.name.clone(),
            Proposal {
                package: package.name.clone(),
                ecosystem: package.ecosystem.clone(),
                from_version: current.clone(),
                to_version: candidate.clone(),
                latest,
            },
        );
    }
    proposals.into_values().collect()
}

/// Applies the cross-repo resolution to a proposal. Returns the proposal
/// and a blocking reason, or `None` when resolution holds the package at
/// or below its current version.
fn retarget(
    mut proposal: Proposal,
    conflicts: Option<&ResolutionPlan>,
    notes: &mut Vec<String>,
) -> Option<(Proposal, Option<String>)> {
    let Some(conflict) = conflicts.and_then(|plan| plan.conflict(&proposal.package)) else {
        return Some((proposal, None));
    };
    if !conflict.resolvable {
        let reason = format!(
            "cross-repo conflict on {} requires manual resolution ({})",
            proposal.package, conflict.strategy
        );
        return Some((proposal, Some(reason)));
    }
    let resolved = conflict.resolved_version.as_ref()?;
    if resolved <= &proposal.from_version {
        notes.push(format!(
            "{} held at {} by cross-repo resolution ({resolved})",
            proposal.package, proposal.from_version
        ));
        return None;
    }
    if resolved != &proposal.to_version {
        proposal.to_version = resolved.clone();
    }
    Some((proposal, None))
}

/// Applies a resolver result to a candidate.
fn apply_verdict(
    candidate: &mut UpgradePlanCandidate,
    result: Result<ResolverVerdict, ResolverError>,
) {
    match result {
        Ok(verdict) => {
            candidate.resolver_status = verdict.status;
            candidate.resolver_detail = verdict.detail;
            match verdict.status {
                ResolverStatus::Ok => candidate.resolver_validated = true,
                ResolverStatus::Failed => {
                    candidate.status = RiskLevel::Blocked;
                    candidate.reasons.push(format!(
                        "resolver dry run failed: {}",
                        candidate.resolver_detail.as_deref().unwrap_or("no detail")
                    ));
                }
                ResolverStatus::Skipped => {}
            }
        }
        Err(ResolverError::Unavailable(message)) => {
            candidate.resolver_status = ResolverStatus::Skipped;
            candidate.resolver_detail = Some(format!("resolver unavailable: {message}"));
        }
        Err(ResolverError::Failed(message)) => {
            candidate.resolver_status = ResolverStatus::Failed;
            candidate.status = RiskLevel::Blocked;
            candidate.reasons.push(format!("resolver dry run failed: {message}"));
            candidate.resolver_detail = Some(message);
        }
    }
}

/// Formats a `name==version` pin.
fn pin(package: &PackageName, version: &Version) -> String {
    format!("{package}=={version}")
}

/// Closeness of the target to the latest release.
fn recency_factor(target: &Version, latest: Option<&Version>) -> f64 {
    let Some(latest) = latest else {
        return 0.5;
    };
    if target >= latest {
        1.0
    } else if target.shares_prefix(latest, 2) {
        0.8
    } else if target.shares_prefix(latest, 1) {
        0.5
    } else {
        0.2
    }
}

/// Small moves score highest; findings on the current version lift the
/// factor toward 1.
fn inverse_severity_factor(drift: DriftClass, severity: Severity) -> f64 {
    let base = match drift {
        DriftClass::PatchAvailable => 1.0,
        DriftClass::MinorAvailable => 0.6,
        DriftClass::MajorAvailable => 0.2,
        DriftClass::UpToDate | DriftClass::Conflict | DriftClass::Unknown => 0.0,
    };
    let urgency = match severity {
        Severity::Info => 0.0,
        Severity::Low => 0.1,
        Severity::Medium => 0.25,
        Severity::High => 0.5,
        Severity::Critical => 0.75,
    };
    base + (1.0 - base) * urgency
}

/// Recency-weighted Laplace-smoothed success rate for a package.
fn success_factor(
    package: &PackageName,
    history: &[HistoricalOutcome],
    half_life_days: f64,
    now: OffsetDateTime,
) -> f64 {
    let mut weighted_success = 0.0;
    let mut weighted_total = 0.0;
    for outcome in history.iter().filter(|outcome| &outcome.package == package) {
        let weight = 0.5_f64.powf(elapsed_days(outcome.recorded_at, now) / half_life_days);
        weighted_total += weight;
        if !outcome.is_failure() {
            weighted_success += weight;
        }
    }
    (weighted_success + 1.0) / (weighted_total + 2.0)
}

/// Test coverage signal from the metadata index.
fn coverage_factor(metadata: &MetadataIndex, package: &PackageName) -> f64 {
    let covered = metadata.get(package).and_then(|entry| entry.has_test_coverage).unwrap_or(false);
    if covered { 1.0 } else { 0.0 }
}
