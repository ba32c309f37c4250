// crates/upgrade-guard-core/tests/summary.rs
// ============================================================================
// Module: Summary Renderer Tests
// Description: Markdown summary sections for assessments and drift.
// ============================================================================
//! ## Overview
//! Renders summaries from real guard and drift runs and checks headings,
//! escalation reasons, and that absent reports produce no section.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only panic-based assertions are permitted."
)]

use time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;
use upgrade_guard_core::ContractPolicy;
use upgrade_guard_core::DriftAnalyzer;
use upgrade_guard_core::Guard;
use upgrade_guard_core::GuardConfig;
use upgrade_guard_core::Issue;
use upgrade_guard_core::IssueKind;
use upgrade_guard_core::MetadataEntry;
use upgrade_guard_core::MetadataIndex;
use upgrade_guard_core::PackageEntry;
use upgrade_guard_core::PackageName;
use upgrade_guard_core::PackageRecord;
use upgrade_guard_core::Severity;
use upgrade_guard_core::SourceInput;
use upgrade_guard_core::SourceKind;
use upgrade_guard_core::Version;
use upgrade_guard_core::runtime::render_summary;

/// Fixed evaluation clock.
const NOW: OffsetDateTime = datetime!(2026-10-19 12:00 UTC);

/// Builds an available source with one package and optional issue.
fn source(kind: SourceKind, name: &str, version: &str, issues: Vec<Issue>) -> SourceInput {
    let mut input = SourceInput::ok(kind, Some(format!("{kind}.json")));
    input.packages = vec![PackageEntry {
        record: PackageRecord::new(name, Version::parse(version).unwrap(), "pypi"),
        issues,
    }];
    input
}

/// Verifies a blocked run lists every escalation with its reason.
#[test]
fn blocked_summary_lists_escalations() {
    let mut policy = ContractPolicy::default();
    policy.policies.wheels.binary_required = true;
    let preflight = source(
        SourceKind::Preflight,
        "numpy",
        "1.26.4",
        vec![Issue {
            kind: IssueKind::MissingBinary,
            id: "missing-binary-numpy".to_string(),
            severity: Severity::Medium,
            summary: "no wheel for cp312-manylinux".to_string(),
        }],
    );
    let mut sbom = source(SourceKind::Sbom, "numpy", "1.26.4", Vec::new());
    sbom.generated_at = Some(NOW - Duration::days(10));
    let assessment = Guard::new(GuardConfig::default()).assess(&[preflight, sbom], &policy, NOW).unwrap();

    let summary = render_summary(&assessment, None, None);
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines[0], "# Upgrade Guard Assessment");
    assert!(lines.contains(&"Rollup: **blocked**"));
    assert!(lines.contains(&"## Escalations"));
    assert!(!lines.contains(&"- None"));
    for escalation in &assessment.escalations {
        let expected = match &escalation.package {
            Some(package) => format!("- {package}: {}", escalation.reason),
            None => format!("- {}", escalation.reason),
        };
        assert!(lines.contains(&expected.as_str()), "missing escalation line {expected}");
    }
    assert!(lines.contains(&"- SBOM age: 10d (threshold 7d, block after 14d): stale"));
    assert!(lines.contains(&"  - missing binary wheel"));
    assert!(lines.iter().any(|line| line.starts_with("- preflight (ok): `preflight.json`")));
    assert!(!summary.contains("## Drift Analysis"));
    assert!(!summary.contains("## Upgrade Plan"));
}

/// Verifies an empty run says so and lists missing inputs.
#[test]
fn empty_run_has_no_escalations() {
    let sources = [
        SourceInput::missing(SourceKind::Preflight, None, "source not provided"),
        SourceInput::missing(SourceKind::Sbom, None, "source not provided"),
    ];
    let assessment = Guard::new(GuardConfig::default()).assess(&sources, &ContractPolicy::default(), NOW).unwrap();
    let summary = render_summary(&assessment, None, None);
    let lines: Vec<&str> = summary.lines().collect();
    assert!(lines.contains(&"Rollup: **safe**"));
    assert!(lines.contains(&"- None"));
    assert!(lines.contains(&"- Missing inputs: preflight, sbom"));
    assert!(lines.contains(&"- No packages assessed"));
    assert!(lines.contains(&"- Highest severity: **none**"));
}

/// Verifies the drift section lists drifted packages only.
#[test]
fn drift_section_lists_drifted_packages() {
    let sources = [
        source(SourceKind::Sbom, "requests", "2.31.0", Vec::new()),
    ];
    let mut index = MetadataIndex::default();
    index.packages.insert(
        PackageName::new("requests"),
        MetadataEntry {
            latest: Some(Version::parse("2.31.1").unwrap()),
            ..MetadataEntry::default()
        },
    );
    let policy = ContractPolicy::default();
    let assessment = Guard::new(GuardConfig::default()).assess(&sources, &policy, NOW).unwrap();
    let drift = DriftAnalyzer::new().analyze(&sources, &index, &policy, NOW);
    let summary = render_summary(&assessment, Some(&drift), None);
    let lines: Vec<&str> = summary.lines().collect();
    assert!(lines.contains(&"## Drift Analysis"));
    assert!(lines.contains(&"- Severity: patch_available"));
    assert!(lines.contains(&"- **requests** (2.31.0 -> 2.31.1): patch_available"));
    assert!(lines.contains(&"- Drift severity: **patch_available**"));
}
