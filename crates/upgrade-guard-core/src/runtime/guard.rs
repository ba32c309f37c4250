// crates/upgrade-guard-core/src/runtime/guard.rs
// ============================================================================
// Module: Upgrade Guard Risk Scoring Engine
// Description: Fuses normalized sources and contract policy into an assessment.
// Purpose: Produce deterministic per-package risk and the run rollup.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The guard computes each package's severity as the maximum effective
//! severity across every source, after snoozes are applied, then applies the
//! contract escalations: binary wheel policy, signature policy, contract
//! freshness, and environment alignment. The rollup is the worst package
//! risk, raised further by stale or expired contract inputs, and becomes
//! `unknown` when a mandatory source errored and nothing already blocks.
//!
//! Missing or partial data never raises; only a structurally invalid policy
//! is fatal.
//!
//! Security posture: inputs are untrusted collaborator output; the guard
//! fails closed (unverified signatures count as missing).

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::AssessedIssue;
use crate::core::Assessment;
use crate::core::ContractFreshness;
use crate::core::ContractPolicy;
use crate::core::Escalation;
use crate::core::EscalationRule;
use crate::core::EvidenceRef;
use crate::core::FreshnessStatus;
use crate::core::IssueKind;
use crate::core::PackageAssessment;
use crate::core::PolicyError;
use crate::core::RiskLevel;
use crate::core::Rollup;
use crate::core::Severity;
use crate::core::SnoozeNote;
use crate::core::SnoozeStatus;
use crate::core::SourceInput;
use crate::core::SourceKind;
use crate::core::SourceState;
use crate::core::time::format_timestamp;
use crate::core::time::whole_days_between;
use crate::runtime::normalizer::MergedPackage;
use crate::runtime::normalizer::merge_packages;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Guard errors. Only policy misconfiguration is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// The contract policy is structurally invalid.
    #[error("policy misconfigured: {0}")]
    PolicyMisconfigured(String),
}

impl From<PolicyError> for GuardError {
    fn from(error: PolicyError) -> Self {
        match error {
            PolicyError::Invalid(message) => Self::PolicyMisconfigured(message),
        }
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Guard configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    /// Sources whose `error` state makes the rollup `unknown`.
    pub mandatory_sources: Vec<SourceKind>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            mandatory_sources: vec![SourceKind::Contract],
        }
    }
}

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Risk scoring engine.
#[derive(Debug, Clone, Default)]
pub struct Guard {
    /// Guard configuration.
    config: GuardConfig,
}

impl Guard {
    /// Creates a guard.
    #[must_use]
    pub const fn new(config: GuardConfig) -> Self {
        Self {
            config,
        }
    }

    /// Assesses the run.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::PolicyMisconfigured`] when the policy fails
    /// validation.
    pub fn assess(
        &self,
        sources: &[SourceInput],
        policy: &ContractPolicy,
        now: OffsetDateTime,
    ) -> Result<Assessment, GuardError> {
        policy.validate()?;
        let mut ordered: Vec<&SourceInput> = sources.iter().collect();
        ordered.sort_by_key(|input| input.source);

        let mut escalations = Vec::new();
        let mut notes = Vec::new();
        let mut inputs_missing = Vec::new();
        let mut inputs_errored = Vec::new();
        let mut evidence = Vec::with_capacity(ordered.len());
        for input in &ordered {
            match input.state {
                SourceState::Missing => {
                    push_unique(&mut inputs_missing, input.source);
                    notes.push(format!(
                        "Input unavailable: {} ({})",
                        input.source,
                        input.diagnostic.as_deref().unwrap_or("no diagnostic")
                    ));
                }
                SourceState::Error => {
                    push_unique(&mut inputs_errored, input.source);
                    notes.push(format!(
                        "Input malformed: {} ({})",
                        input.source,
                        input.diagnostic.as_deref().unwrap_or("no diagnostic")
                    ));
                }
                SourceState::Ok => {}
            }
            notes.extend(input.warnings.iter().map(|warning| format!("{}: {warning}", input.source)));
            evidence.push(EvidenceRef {
                source: input.source,
                state: input.state,
                raw_path: input.raw_path.clone(),
                digest: input.digest.clone(),
                diagnostic: input.diagnostic.clone(),
            });
        }

        let mut packages: Vec<PackageAssessment> = merge_packages(sources)
            .into_values()
            .map(|merged| assess_package(merged, policy, now, &mut escalations))
            .collect();
        packages.sort_by(|left, right| {
            right
                .risk
                .cmp(&left.risk)
                .then_with(|| right.severity.cmp(&left.severity))
                .then_with(|| left.name.cmp(&right.name))
        });

        let mut level = packages.iter().map(|package| package.risk).max().unwrap_or(RiskLevel::Safe);
        let contract_freshness = evaluate_freshness(&ordered, policy, now);
        level = apply_freshness(level, &contract_freshness, &mut escalations, &mut notes);
        level = apply_environment_alignment(level, policy, now, &mut escalations, &mut notes);

        let mut rollup = Rollup::from(level);
        for input in &ordered {
            if input.state == SourceState::Error
                && self.config.mandatory_sources.contains(&input.source)
            {
                escalations.push(Escalation {
                    rule: EscalationRule::MandatorySourceError,
                    package: None,
                    reason: format!(
                        "Mandatory source {} errored: {}",
                        input.source,
                        input.diagnostic.as_deref().unwrap_or("no diagnostic")
                    ),
                });
                if level != RiskLevel::Blocked {
                    rollup = Rollup::Unknown;
                }
            }
        }

        Ok(Assessment {
            generated_at: now,
            rollup,
            highest_severity: packages.iter().map(|package| package.severity).max(),
            packages_flagged: packages.iter().filter(|package| package.risk != RiskLevel::Safe).count(),
            packages,
            inputs_missing,
            inputs_errored,
            contract_freshness,
            escalations,
            notes,
            evidence,
        })
    }
}

// ============================================================================
// SECTION: Package Assessment
// ============================================================================

/// Assesses one merged package.
fn assess_package(
    merged: MergedPackage,
    policy: &ContractPolicy,
    now: OffsetDateTime,
    escalations: &mut Vec<Escalation>,
) -> PackageAssessment {
    let MergedPackage {
        record,
        issues,
        sources,
    } = merged;
    let name = record.name.clone();
    let mut reasons = Vec::new();
    let mut assessed = Vec::with_capacity(issues.len());
    for (source, issue) in issues {
        let snooze = policy.snooze_for(&name, &issue.id);
        let status = snooze.map(|snooze| snooze.status(now));
        let effective_severity = if status.is_some_and(SnoozeStatus::suppresses) {
            Severity::Info
        } else {
            issue.severity
        };
        match (snooze, status) {
            (Some(snooze), Some(status)) if status.suppresses() => {
                let until = snooze.expires_at.map_or_else(|| "unknown".to_string(), format_timestamp);
                reasons.push(format!("{} snoozed by {} until {until} ({status})", issue.id, snooze.id));
            }
            (Some(snooze), Some(SnoozeStatus::Expired)) => {
                let reason = format!(
                    "Snooze {} for {} expired; original severity {} applies",
                    snooze.id, issue.id, issue.severity
                );
                reasons.push(reason.clone());
                escalations.push(Escalation {
                    rule: EscalationRule::SnoozeExpired,
                    package: Some(name.clone()),
                    reason,
                });
            }
            (Some(snooze), Some(_)) => {
                reasons.push(format!("Snooze {} for {} has no expiry and is not applied", snooze.id, issue.id));
            }
            _ => {}
        }
        if effective_severity > Severity::Info {
            reasons.push(format!("{} severity={effective_severity}: {}", issue.id, issue.summary));
        }
        assessed.push(AssessedIssue {
            source,
            kind: issue.kind,
            id: issue.id,
            summary: issue.summary,
            severity: issue.severity,
            effective_severity,
            snooze: snooze.zip(status).map(|(snooze, status)| SnoozeNote {
                id: snooze.id.clone(),
                status,
                reason: snooze.reason.clone(),
                expires_at: snooze.expires_at,
            }),
        });
    }

    let mut severity =
        assessed.iter().map(|issue| issue.effective_severity).max().unwrap_or(Severity::Info);
    let mut risk = severity.risk();

    let binary_missing = assessed.iter().any(|issue| {
        issue.kind == IssueKind::MissingBinary && issue.effective_severity > Severity::Info
    });
    if binary_missing && policy.requires_binary(&name) {
        severity = severity.max(Severity::High);
        risk = RiskLevel::Blocked;
        reasons.insert(0, "missing binary wheel".to_string());
        escalations.push(Escalation {
            rule: EscalationRule::MissingBinary,
            package: Some(name.clone()),
            reason: format!("{name}: missing binary wheel under binary-only contract"),
        });
    }

    if policy.signature_required_for(&name, now) && !policy.signature_trusted(record.signature.as_ref()) {
        severity = severity.escalate();
        risk = risk.max(severity.risk()).max(RiskLevel::NeedsReview);
        let publisher = record
            .signature
            .as_ref()
            .and_then(|evidence| evidence.publisher.clone())
            .or_else(|| {
                let trusted = &policy.policies.signatures.trusted_publishers;
                (!trusted.is_empty()).then(|| trusted.join("/"))
            })
            .unwrap_or_else(|| "unknown".to_string());
        let reason = format!("Missing signature for publisher {publisher}");
        reasons.push(reason.clone());
        escalations.push(Escalation {
            rule: EscalationRule::MissingSignature,
            package: Some(name.clone()),
            reason: format!("{name}: {reason}"),
        });
    }

    PackageAssessment {
        name,
        ecosystem: record.ecosystem,
        current: Some(record.current),
        candidate: record.candidate,
        severity,
        risk,
        reasons,
        issues: assessed,
        sources,
    }
}

// ============================================================================
// SECTION: Contract Freshness
// ============================================================================

/// Computes SBOM and contract freshness.
fn evaluate_freshness(
    sources: &[&SourceInput],
    policy: &ContractPolicy,
    now: OffsetDateTime,
) -> ContractFreshness {
    let generated_at = |kind: SourceKind| {
        sources
            .iter()
            .filter(|input| input.source == kind && input.is_ok())
            .find_map(|input| input.generated_at)
    };
    let sbom_threshold_days = policy.policies.updates.sbom_max_age_days;
    let sbom_block_threshold_days = policy.block_threshold_days(sbom_threshold_days);
    let sbom_age_days = generated_at(SourceKind::Sbom)
        .or_else(|| generated_at(SourceKind::Metadata))
        .map(|timestamp| whole_days_between(timestamp, now));
    let sbom_status = sbom_age_days.map_or(FreshnessStatus::Unknown, |age| {
        FreshnessStatus::from_age(age, sbom_threshold_days, sbom_block_threshold_days)
    });

    let contract_review_days = policy.contract.default_review_days;
    let contract_age_days =
        policy.contract.last_validated.map(|timestamp| whole_days_between(timestamp, now));
    let contract_status = contract_age_days.map_or(FreshnessStatus::Unknown, |age| {
        FreshnessStatus::from_age(age, contract_review_days, policy.block_threshold_days(contract_review_days))
    });

    let status =
        if sbom_status.rank() >= contract_status.rank() { sbom_status } else { contract_status };
    ContractFreshness {
        status,
        sbom_age_days,
        sbom_threshold_days,
        sbom_block_threshold_days,
        sbom_status,
        contract_age_days,
        contract_review_days,
        contract_status,
    }
}

/// Applies freshness escalations to the rollup level.
fn apply_freshness(
    level: RiskLevel,
    freshness: &ContractFreshness,
    escalations: &mut Vec<Escalation>,
    notes: &mut Vec<String>,
) -> RiskLevel {
    if let Some(age) = freshness.sbom_age_days {
        match freshness.sbom_status {
            FreshnessStatus::Stale => escalations.push(Escalation {
                rule: EscalationRule::SbomStale,
                package: None,
                reason: format!(
                    "SBOM age {age}d exceeds {}d threshold",
                    freshness.sbom_threshold_days
                ),
            }),
            FreshnessStatus::Expired => escalations.push(Escalation {
                rule: EscalationRule::SbomExpired,
                package: None,
                reason: format!(
                    "SBOM age {age}d exceeds {}d block threshold",
                    freshness.sbom_block_threshold_days
                ),
            }),
            FreshnessStatus::Fresh | FreshnessStatus::Unknown => {}
        }
    } else {
        notes.push("SBOM freshness unknown: no SBOM or metadata timestamp".to_string());
    }
    if let Some(age) = freshness.contract_age_days {
        match freshness.contract_status {
            FreshnessStatus::Stale => escalations.push(Escalation {
                rule: EscalationRule::ContractStale,
                package: None,
                reason: format!(
                    "Contract last validated {age}d ago exceeds {}d review window",
                    freshness.contract_review_days
                ),
            }),
            FreshnessStatus::Expired => escalations.push(Escalation {
                rule: EscalationRule::ContractExpired,
                package: None,
                reason: format!(
                    "Contract last validated {age}d ago is past its {}d review window and expired",
                    freshness.contract_review_days
                ),
            }),
            FreshnessStatus::Fresh | FreshnessStatus::Unknown => {}
        }
    } else {
        notes.push("Contract freshness unknown: no last_validated timestamp".to_string());
    }
    match freshness.status {
        FreshnessStatus::Stale => level.escalate().max(RiskLevel::NeedsReview),
        FreshnessStatus::Expired => RiskLevel::Blocked,
        FreshnessStatus::Fresh | FreshnessStatus::Unknown => level,
    }
}

/// Raises the rollup for environments outside their sync window.
fn apply_environment_alignment(
    mut level: RiskLevel,
    policy: &ContractPolicy,
    now: OffsetDateTime,
    escalations: &mut Vec<Escalation>,
    notes: &mut Vec<String>,
) -> RiskLevel {
    let alignment = &policy.environment_alignment;
    for environment in &alignment.environments {
        let window = environment.sync_window_days.unwrap_or(alignment.default_sync_window_days);
        let Some(last_synced) = environment.last_synced else {
            notes.push(format!("Environment {} has no sync timestamp", environment.name));
            continue;
        };
        let age = whole_days_between(last_synced, now);
        if age > i64::from(window) {
            level = level.max(RiskLevel::NeedsReview);
            escalations.push(Escalation {
                rule: EscalationRule::EnvironmentOutOfSync,
                package: None,
                reason: format!(
                    "Environment {} last synced {age}d ago exceeds {window}d sync window",
                    environment.name
                ),
            });
        }
    }
    level
}

/// Pushes a source kind once.
fn push_unique(list: &mut Vec<SourceKind>, kind: SourceKind) {
    if !list.contains(&kind) {
        list.push(kind);
    }
}
