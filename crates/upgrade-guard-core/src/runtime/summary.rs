// crates/upgrade-guard-core/src/runtime/summary.rs
// ============================================================================
// Module: Upgrade Guard Summary Renderer
// Description: Markdown rendering of an assessment and its companion reports.
// Purpose: Give reviewers every escalation and reason in readable form.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Rendering is a pure function of the documents; sections for absent
//! reports are omitted. Every escalation appears with its concrete reason.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::Assessment;
use crate::core::DIGEST_ALGORITHM;
use crate::core::DriftClass;
use crate::core::DriftReport;
use crate::core::UpgradePlan;
use crate::core::Version;
use crate::core::time::format_timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Drifted packages listed in the drift section.
const MAX_DRIFT_ROWS: usize = 10;
/// Notes listed per drifted package.
const MAX_DRIFT_NOTES: usize = 3;

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders the Markdown summary.
#[must_use]
pub fn render_summary(
    assessment: &Assessment,
    drift: Option<&DriftReport>,
    plan: Option<&UpgradePlan>,
) -> String {
    let mut lines = vec![
        "# Upgrade Guard Assessment".to_string(),
        String::new(),
        format!("Generated: {}", format_timestamp(assessment.generated_at)),
        format!("Rollup: **{}**", assessment.rollup),
        String::new(),
    ];
    summary_section(&mut lines, assessment, drift);
    escalation_section(&mut lines, assessment);
    contract_section(&mut lines, assessment);
    if let Some(drift) = drift {
        drift_section(&mut lines, drift);
    }
    package_section(&mut lines, assessment);
    if let Some(plan) = plan {
        plan_section(&mut lines, plan);
    }
    evidence_section(&mut lines, assessment);
    lines.join("\n")
}

/// Summary section.
fn summary_section(lines: &mut Vec<String>, assessment: &Assessment, drift: Option<&DriftReport>) {
    lines.push("## Summary".to_string());
    lines.push(String::new());
    let highest = assessment.highest_severity.map_or("none", |severity| severity.as_str());
    lines.push(format!("- Highest severity: **{highest}**"));
    lines.push(format!("- Packages flagged: **{}**", assessment.packages_flagged));
    lines.push(format!(
        "- Contract status: **{}**",
        assessment.contract_freshness.status.as_str()
    ));
    if let Some(drift) = drift {
        lines.push(format!("- Drift severity: **{}**", drift.overall.as_str()));
    }
    if !assessment.inputs_missing.is_empty() {
        let missing: Vec<&str> = assessment.inputs_missing.iter().map(|kind| kind.as_str()).collect();
        lines.push(format!("- Missing inputs: {}", missing.join(", ")));
    }
    if !assessment.inputs_errored.is_empty() {
        let errored: Vec<&str> = assessment.inputs_errored.iter().map(|kind| kind.as_str()).collect();
        lines.push(format!("- Errored inputs: {}", errored.join(", ")));
    }
    if !assessment.notes.is_empty() {
        lines.push("- Notes:".to_string());
        lines.extend(assessment.notes.iter().map(|note| format!("  - {note}")));
    }
    lines.push(String::new());
}

/// Escalation section.
fn escalation_section(lines: &mut Vec<String>, assessment: &Assessment) {
    lines.push("## Escalations".to_string());
    lines.push(String::new());
    if assessment.escalations.is_empty() {
        lines.push("- None".to_string());
    }
    for escalation in &assessment.escalations {
        match &escalation.package {
            Some(package) => lines.push(format!("- {package}: {}", escalation.reason)),
            None => lines.push(format!("- {}", escalation.reason)),
        }
    }
    lines.push(String::new());
}

/// Contract status section.
fn contract_section(lines: &mut Vec<String>, assessment: &Assessment) {
    let freshness = &assessment.contract_freshness;
    lines.push("## Contract Status".to_string());
    lines.push(String::new());
    lines.push(format!(
        "- SBOM age: {} (threshold {}d, block after {}d): {}",
        days(freshness.sbom_age_days),
        freshness.sbom_threshold_days,
        freshness.sbom_block_threshold_days,
        freshness.sbom_status.as_str()
    ));
    lines.push(format!(
        "- Contract age: {} (review every {}d): {}",
        days(freshness.contract_age_days),
        freshness.contract_review_days,
        freshness.contract_status.as_str()
    ));
    lines.push(String::new());
}

/// Drift section.
fn drift_section(lines: &mut Vec<String>, drift: &DriftReport) {
    lines.push("## Drift Analysis".to_string());
    lines.push(String::new());
    lines.push(format!("- Severity: {}", drift.overall.as_str()));
    let counts = &drift.counts;
    lines.push(format!(
        "- Counts: {} up-to-date, {} patch, {} minor, {} major, {} conflict, {} unknown",
        counts.up_to_date,
        counts.patch_available,
        counts.minor_available,
        counts.major_available,
        counts.conflict,
        counts.unknown
    ));
    if !drift.notes.is_empty() {
        lines.push("- Notes:".to_string());
        lines.extend(drift.notes.iter().map(|note| format!("  - {note}")));
    }
    let drifted: Vec<_> =
        drift.packages.iter().filter(|package| package.classification != DriftClass::UpToDate).collect();
    if !drifted.is_empty() {
        lines.push(String::new());
        lines.push("### Drifted Packages".to_string());
        lines.push(String::new());
        for package in drifted.iter().take(MAX_DRIFT_ROWS) {
            lines.push(format!(
                "- **{}** ({} -> {}): {}",
                package.name,
                package.current,
                version_or_na(package.latest.as_ref()),
                package.classification.as_str()
            ));
            lines.extend(package.notes.iter().take(MAX_DRIFT_NOTES).map(|note| format!("  - {note}")));
        }
    }
    lines.push(String::new());
}

/// Package risk section.
fn package_section(lines: &mut Vec<String>, assessment: &Assessment) {
    lines.push("## Package Risk".to_string());
    lines.push(String::new());
    if assessment.packages.is_empty() {
        lines.push("- No packages assessed".to_string());
    }
    for package in &assessment.packages {
        lines.push(format!(
            "- **{}** ({} -> {}): {}",
            package.name,
            version_or_na(package.current.as_ref()),
            version_or_na(package.candidate.as_ref()),
            package.risk
        ));
        lines.extend(package.reasons.iter().map(|reason| format!("  - {reason}")));
    }
    lines.push(String::new());
}

/// Upgrade plan section.
fn plan_section(lines: &mut Vec<String>, plan: &UpgradePlan) {
    lines.push("## Upgrade Plan".to_string());
    lines.push(String::new());
    lines.push(format!(
        "- Resolver: {} ok, {} failed, {} skipped",
        plan.resolver.ok, plan.resolver.failed, plan.resolver.skipped
    ));
    for candidate in &plan.candidates {
        lines.push(format!(
            "- **{}** {} -> {} score {:.2}: {}",
            candidate.package, candidate.from_version, candidate.to_version, candidate.score, candidate.status
        ));
        lines.extend(candidate.reasons.iter().map(|reason| format!("  - {reason}")));
    }
    if !plan.batches.is_empty() {
        lines.push(String::new());
        lines.push("### Commands".to_string());
        lines.push(String::new());
        lines.extend(plan.batches.iter().map(|batch| format!("- `{}` ({})", batch.command, batch.status)));
    }
    lines.extend(plan.notes.iter().map(|note| format!("- Note: {note}")));
    lines.push(String::new());
}

/// Evidence section.
fn evidence_section(lines: &mut Vec<String>, assessment: &Assessment) {
    lines.push("## Evidence".to_string());
    lines.push(String::new());
    for evidence in &assessment.evidence {
        let path = evidence.raw_path.as_deref().map(|path| format!(": `{path}`")).unwrap_or_default();
        let digest = evidence
            .digest
            .as_ref()
            .map(|digest| format!(" {DIGEST_ALGORITHM}:{}", digest.short()))
            .unwrap_or_default();
        lines.push(format!("- {} ({}){path}{digest}", evidence.source, evidence.state.as_str()));
    }
    lines.push(String::new());
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Formats an optional day count.
fn days(value: Option<i64>) -> String {
    value.map_or_else(|| "unknown".to_string(), |days| format!("{days}d"))
}

/// Formats an optional version.
fn version_or_na(version: Option<&Version>) -> String {
    version.map_or_else(|| "n/a".to_string(), ToString::to_string)
}
