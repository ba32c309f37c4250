// crates/upgrade-guard-core/tests/guard.rs
// ============================================================================
// Module: Risk Scoring Engine Tests
// Description: Contract escalations, freshness, snoozes, and rollup rules.
// ============================================================================
//! ## Overview
//! Exercises the guard against hand-built source inputs. Covers binary and
//! signature enforcement, SBOM and contract staleness, snooze handling,
//! mandatory-source errors, determinism, and severity monotonicity.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only panic-based assertions are permitted."
)]

use proptest::prelude::*;
use time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;
use upgrade_guard_core::ContractPolicy;
use upgrade_guard_core::EnvironmentRule;
use upgrade_guard_core::EscalationRule;
use upgrade_guard_core::FreshnessStatus;
use upgrade_guard_core::Guard;
use upgrade_guard_core::GuardConfig;
use upgrade_guard_core::GuardError;
use upgrade_guard_core::Issue;
use upgrade_guard_core::IssueKind;
use upgrade_guard_core::PackageEntry;
use upgrade_guard_core::PackageName;
use upgrade_guard_core::PackageRecord;
use upgrade_guard_core::RiskLevel;
use upgrade_guard_core::Rollup;
use upgrade_guard_core::Severity;
use upgrade_guard_core::SignatureEvidence;
use upgrade_guard_core::Snooze;
use upgrade_guard_core::SnoozeStatus;
use upgrade_guard_core::SourceInput;
use upgrade_guard_core::SourceKind;
use upgrade_guard_core::Version;

/// Fixed evaluation clock.
const NOW: OffsetDateTime = datetime!(2026-10-19 12:00 UTC);

/// Builds a package entry with the given issues.
fn entry(name: &str, version: &str, issues: Vec<Issue>) -> PackageEntry {
    PackageEntry {
        record: PackageRecord::new(name, Version::parse(version).unwrap(), "pypi"),
        issues,
    }
}

/// Builds an issue.
fn issue(kind: IssueKind, id: &str, severity: Severity) -> Issue {
    Issue {
        kind,
        id: id.to_string(),
        severity,
        summary: format!("{id} summary"),
    }
}

/// Builds an available source with packages.
fn source(kind: SourceKind, packages: Vec<PackageEntry>) -> SourceInput {
    let mut input = SourceInput::ok(kind, Some(format!("{kind}.json")));
    input.packages = packages;
    input
}

/// Builds an SBOM generated `age_days` before [`NOW`].
fn sbom_aged(age_days: i64) -> SourceInput {
    let mut input = source(SourceKind::Sbom, vec![entry("requests", "2.31.0", Vec::new())]);
    input.generated_at = Some(NOW - Duration::days(age_days));
    input
}

/// Assesses with the default guard.
fn assess(sources: &[SourceInput], policy: &ContractPolicy) -> upgrade_guard_core::Assessment {
    Guard::new(GuardConfig::default()).assess(sources, policy, NOW).unwrap()
}

/// Verifies a missing binary wheel under a binary-only contract blocks the
/// package with a concrete reason.
#[test]
fn missing_binary_under_binary_contract_blocks_package() {
    let mut policy = ContractPolicy::default();
    policy.policies.wheels.binary_required = true;
    let preflight = source(
        SourceKind::Preflight,
        vec![entry(
            "numpy",
            "1.26.4",
            vec![issue(IssueKind::MissingBinary, "missing-binary-numpy", Severity::Medium)],
        )],
    );
    let assessment = assess(&[preflight], &policy);
    let numpy = assessment.package("numpy").unwrap();
    assert_eq!(numpy.risk, RiskLevel::Blocked);
    assert_eq!(numpy.reasons[0], "missing binary wheel");
    assert_eq!(assessment.rollup, Rollup::Blocked);
    assert!(assessment.escalations.iter().any(|escalation| escalation.rule == EscalationRule::MissingBinary));
}

/// Verifies packages on the sdist allowlist are not escalated.
#[test]
fn sdist_allowlist_skips_binary_escalation() {
    let mut policy = ContractPolicy::default();
    policy.policies.wheels.binary_required = true;
    policy.policies.wheels.allow_sdist = vec![PackageName::new("numpy")];
    let preflight = source(
        SourceKind::Preflight,
        vec![entry("numpy", "1.26.4", vec![issue(IssueKind::MissingBinary, "mb", Severity::Low)])],
    );
    let assessment = assess(&[preflight], &policy);
    assert_eq!(assessment.package("numpy").unwrap().risk, RiskLevel::NeedsReview);
}

/// Verifies a ten-day-old SBOM under a seven-day limit is stale and lifts
/// the rollup to at least needs-review.
#[test]
fn stale_sbom_raises_rollup() {
    let assessment = assess(&[sbom_aged(10)], &ContractPolicy::default());
    assert_eq!(assessment.contract_freshness.sbom_status, FreshnessStatus::Stale);
    assert_eq!(assessment.contract_freshness.status, FreshnessStatus::Stale);
    assert_eq!(assessment.contract_freshness.sbom_age_days, Some(10));
    assert_eq!(assessment.rollup, Rollup::NeedsReview);
    let escalation = assessment
        .escalations
        .iter()
        .find(|escalation| escalation.rule == EscalationRule::SbomStale)
        .unwrap();
    assert_eq!(escalation.reason, "SBOM age 10d exceeds 7d threshold");
}

/// Verifies an SBOM past the block multiplier blocks the run, and that the
/// multiplier is configurable.
#[test]
fn expired_sbom_blocks_and_multiplier_is_configurable() {
    let assessment = assess(&[sbom_aged(15)], &ContractPolicy::default());
    assert_eq!(assessment.contract_freshness.sbom_status, FreshnessStatus::Expired);
    assert_eq!(assessment.rollup, Rollup::Blocked);

    let mut relaxed = ContractPolicy::default();
    relaxed.policies.updates.stale_block_multiplier = 3.0;
    let assessment = assess(&[sbom_aged(15)], &relaxed);
    assert_eq!(assessment.contract_freshness.sbom_status, FreshnessStatus::Stale);
    assert_eq!(assessment.rollup, Rollup::NeedsReview);
}

/// Verifies unknown freshness does not escalate but is noted.
#[test]
fn unknown_freshness_is_noted_not_escalated() {
    let assessment = assess(&[source(SourceKind::Sbom, Vec::new())], &ContractPolicy::default());
    assert_eq!(assessment.contract_freshness.status, FreshnessStatus::Unknown);
    assert_eq!(assessment.rollup, Rollup::Safe);
    assert!(assessment.notes.iter().any(|note| note.starts_with("SBOM freshness unknown")));
}

/// Verifies a stale contract escalates with the review window in the reason.
#[test]
fn stale_contract_escalates() {
    let mut policy = ContractPolicy::default();
    policy.contract.last_validated = Some(NOW - Duration::days(45));
    let assessment = assess(&[sbom_aged(1)], &policy);
    assert_eq!(assessment.contract_freshness.contract_status, FreshnessStatus::Stale);
    assert_eq!(assessment.rollup, Rollup::NeedsReview);
    assert!(
        assessment
            .escalations
            .iter()
            .any(|escalation| escalation.reason == "Contract last validated 45d ago exceeds 30d review window")
    );
}

/// Verifies a required but missing signature always yields a non-safe
/// verdict, even for packages without issues.
#[test]
fn missing_signature_is_never_safe() {
    let mut policy = ContractPolicy::default();
    policy.policies.signatures.required = true;
    policy.policies.signatures.trusted_publishers = vec!["pypa".to_string()];
    let mut signed = entry("pip", "24.0", Vec::new());
    signed.record.signature = Some(SignatureEvidence {
        verified: true,
        publisher: Some("PyPA".to_string()),
    });
    let mut unverified = entry("attrs", "23.2.0", Vec::new());
    unverified.record.signature = Some(SignatureEvidence {
        verified: false,
        publisher: Some("pypa".to_string()),
    });
    let unsigned = entry("six", "1.16.0", Vec::new());
    let assessment = assess(&[source(SourceKind::Sbom, vec![signed, unverified, unsigned])], &policy);

    assert_eq!(assessment.package("pip").unwrap().risk, RiskLevel::Safe);
    for name in ["attrs", "six"] {
        let package = assessment.package(name).unwrap();
        assert_ne!(package.risk, RiskLevel::Safe, "{name} must not be safe");
        assert!(package.reasons.iter().any(|reason| reason.starts_with("Missing signature for publisher")));
    }
}

/// Verifies the signature grace period delays enforcement.
#[test]
fn signature_grace_period_delays_enforcement() {
    let mut policy = ContractPolicy::default();
    policy.policies.signatures.required = true;
    policy.policies.signatures.effective_from = Some(NOW - Duration::days(5));
    policy.policies.signatures.grace_period_days = 14;
    let assessment = assess(&[source(SourceKind::Sbom, vec![entry("six", "1.16.0", Vec::new())])], &policy);
    assert_eq!(assessment.package("six").unwrap().risk, RiskLevel::Safe);
}

/// Builds a snooze for `package`.
fn snooze(package: &str, issue: &str, expires_at: Option<OffsetDateTime>) -> Snooze {
    Snooze {
        id: "SNZ-1".to_string(),
        package: PackageName::new(package),
        issue: Some(issue.to_string()),
        reason: "vendor fix pending".to_string(),
        expires_at,
        requested_by: None,
        approver: Some("security".to_string()),
    }
}

/// Verifies an active snooze suppresses the issue to info.
#[test]
fn active_snooze_suppresses_issue() {
    let mut policy = ContractPolicy::default();
    policy.governance.snoozes = vec![snooze("urllib3", "CVE-2026-1", Some(NOW + Duration::days(20)))];
    let feed = source(
        SourceKind::VulnerabilityFeed,
        vec![entry("urllib3", "1.26.0", vec![issue(IssueKind::Vulnerability, "CVE-2026-1", Severity::High)])],
    );
    let assessment = assess(&[feed], &policy);
    let urllib3 = assessment.package("urllib3").unwrap();
    assert_eq!(urllib3.risk, RiskLevel::Safe);
    assert_eq!(urllib3.issues[0].effective_severity, Severity::Info);
    assert_eq!(urllib3.issues[0].snooze.as_ref().unwrap().status, SnoozeStatus::Active);
}

/// Verifies an expired snooze restores the original severity and escalates.
#[test]
fn expired_snooze_restores_severity() {
    let mut policy = ContractPolicy::default();
    policy.governance.snoozes = vec![snooze("urllib3", "CVE-2026-1", Some(NOW - Duration::days(1)))];
    let feed = source(
        SourceKind::VulnerabilityFeed,
        vec![entry("urllib3", "1.26.0", vec![issue(IssueKind::Vulnerability, "CVE-2026-1", Severity::High)])],
    );
    let assessment = assess(&[feed], &policy);
    assert_eq!(assessment.package("urllib3").unwrap().risk, RiskLevel::Blocked);
    assert!(assessment.escalations.iter().any(|escalation| escalation.rule == EscalationRule::SnoozeExpired));
}

/// Verifies a snooze without expiry is reported and not applied.
#[test]
fn snooze_without_expiry_is_not_applied() {
    let mut policy = ContractPolicy::default();
    policy.governance.snoozes = vec![snooze("urllib3", "CVE-2026-1", None)];
    let feed = source(
        SourceKind::VulnerabilityFeed,
        vec![entry("urllib3", "1.26.0", vec![issue(IssueKind::Vulnerability, "CVE-2026-1", Severity::Medium)])],
    );
    let assessment = assess(&[feed], &policy);
    let urllib3 = assessment.package("urllib3").unwrap();
    assert_eq!(urllib3.risk, RiskLevel::NeedsReview);
    assert!(urllib3.reasons.iter().any(|reason| reason.ends_with("has no expiry and is not applied")));
}

/// Verifies an errored mandatory source makes the rollup unknown unless a
/// package already blocks.
#[test]
fn mandatory_source_error_makes_rollup_unknown() {
    let errored = SourceInput::error(SourceKind::Contract, None, "contract did not parse");
    let assessment = assess(&[errored.clone()], &ContractPolicy::default());
    assert_eq!(assessment.rollup, Rollup::Unknown);
    assert_eq!(assessment.inputs_errored, vec![SourceKind::Contract]);
    assert_eq!(assessment.exit_code(3), 3);

    let feed = source(
        SourceKind::VulnerabilityFeed,
        vec![entry("jinja2", "3.1.2", vec![issue(IssueKind::Vulnerability, "CVE-2", Severity::Critical)])],
    );
    let assessment = assess(&[errored, feed], &ContractPolicy::default());
    assert_eq!(assessment.rollup, Rollup::Blocked);
}

/// Verifies missing sources never fail the assessment.
#[test]
fn missing_sources_are_reported_not_fatal() {
    let sources = vec![
        SourceInput::missing(SourceKind::Preflight, None, "source not provided"),
        SourceInput::missing(SourceKind::Sbom, Some("sbom.json".to_string()), "fetch timed out"),
    ];
    let assessment = assess(&sources, &ContractPolicy::default());
    assert_eq!(assessment.rollup, Rollup::Safe);
    assert_eq!(assessment.inputs_missing, vec![SourceKind::Preflight, SourceKind::Sbom]);
    assert_eq!(assessment.evidence.len(), 2);
}

/// Verifies an environment outside its sync window needs review.
#[test]
fn environment_out_of_sync_needs_review() {
    let mut policy = ContractPolicy::default();
    policy.environment_alignment.environments = vec![EnvironmentRule {
        name: "staging".to_string(),
        profiles: Vec::new(),
        lockfiles: vec!["requirements-staging.txt".to_string()],
        last_synced: Some(NOW - Duration::days(20)),
        sync_window_days: None,
    }];
    let assessment = assess(&[sbom_aged(0)], &policy);
    assert_eq!(assessment.rollup, Rollup::NeedsReview);
    assert!(
        assessment
            .escalations
            .iter()
            .any(|escalation| escalation.rule == EscalationRule::EnvironmentOutOfSync)
    );
}

/// Verifies a structurally invalid policy is the only fatal error.
#[test]
fn invalid_policy_is_fatal() {
    let mut policy = ContractPolicy::default();
    policy.policies.updates.sbom_max_age_days = 0;
    let result = Guard::default().assess(&[], &policy, NOW);
    assert!(matches!(result, Err(GuardError::PolicyMisconfigured(_))));
}

/// Verifies identical inputs yield byte-identical assessments regardless
/// of source order.
#[test]
fn assessment_is_deterministic() {
    let feed = source(
        SourceKind::VulnerabilityFeed,
        vec![
            entry("urllib3", "1.26.0", vec![issue(IssueKind::Vulnerability, "CVE-1", Severity::High)]),
            entry("idna", "3.4", vec![issue(IssueKind::Vulnerability, "CVE-2", Severity::Low)]),
        ],
    );
    let forward = assess(&[sbom_aged(3), feed.clone()], &ContractPolicy::default());
    let reverse = assess(&[feed, sbom_aged(3)], &ContractPolicy::default());
    assert_eq!(serde_json::to_string(&forward).unwrap(), serde_json::to_string(&reverse).unwrap());
    assert_eq!(forward.packages[0].name.as_str(), "urllib3");
}

/// Strategy over issue severities.
fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Info),
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

proptest! {
    /// Verifies adding an issue never lowers a package's risk.
    #[test]
    fn adding_issues_never_lowers_risk(
        severities in prop::collection::vec(severity_strategy(), 1..6),
        split in 0_usize..6,
    ) {
        let split = split.min(severities.len());
        let issues: Vec<Issue> = severities
            .iter()
            .enumerate()
            .map(|(index, severity)| issue(IssueKind::Vulnerability, &format!("CVE-{index}"), *severity))
            .collect();
        let partial = source(SourceKind::VulnerabilityFeed, vec![entry("pkg", "1.0.0", issues[..split].to_vec())]);
        let full = source(SourceKind::VulnerabilityFeed, vec![entry("pkg", "1.0.0", issues)]);
        let policy = ContractPolicy::default();
        let before = assess(&[partial], &policy).package("pkg").unwrap().risk;
        let after = assess(&[full], &policy).package("pkg").unwrap().risk;
        prop_assert!(after >= before);
    }
}
