// crates/upgrade-guard-runner/src/features.rs
// ============================================================================
// Module: Update Feature Extraction
// Description: Builds risk-model features for planned upgrade candidates.
// Purpose: Join plan, assessment, sources, and metadata into one vector.
// Dependencies: upgrade-guard-core
// ============================================================================

//! ## Overview
//! Features start from the version change and are enriched with what the
//! run observed: breaking-change issues or breaking releases crossed,
//! vulnerability issues resolved by the move, release age, popularity, test
//! coverage, dependent count, and whether any feed marked the package as
//! transitive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;
use upgrade_guard_core::Assessment;
use upgrade_guard_core::IssueKind;
use upgrade_guard_core::MetadataIndex;
use upgrade_guard_core::SourceInput;
use upgrade_guard_core::UpdateFeatures;
use upgrade_guard_core::UpgradePlanCandidate;
use upgrade_guard_core::time::whole_days_between;

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Builds the feature vector for one plan candidate.
#[must_use]
pub fn features_for_candidate(
    candidate: &UpgradePlanCandidate,
    assessment: &Assessment,
    sources: &[SourceInput],
    metadata: &MetadataIndex,
    now: OffsetDateTime,
) -> UpdateFeatures {
    let mut features = UpdateFeatures::from_versions(
        candidate.package.clone(),
        candidate.from_version.clone(),
        candidate.to_version.clone(),
    );
    let verdict = assessment.packages.iter().find(|package| package.name == candidate.package);
    let has_issue =
        |kind: IssueKind| verdict.is_some_and(|package| package.issues.iter().any(|issue| issue.kind == kind));
    let entry = metadata.get(&candidate.package);

    features.breaking_changes = has_issue(IssueKind::BreakingChange)
        || entry.is_some_and(|entry| {
            entry.crosses_breaking_release(&candidate.from_version, &candidate.to_version)
        });
    features.security_update = has_issue(IssueKind::Vulnerability);
    features.is_transitive = sources.iter().flat_map(|input| input.packages.iter()).any(|entry| {
        entry.record.name == candidate.package && entry.record.direct == Some(false)
    });
    if let Some(entry) = entry {
        features.days_since_last_update = entry
            .released_at
            .map(|released| u32::try_from(whole_days_between(released, now).max(0)).unwrap_or(u32::MAX));
        if let Some(popularity) = entry.popularity {
            features.popularity = popularity.value();
        }
        features.has_test_coverage = entry.has_test_coverage.unwrap_or(false);
        features.dependency_count = entry.dependency_count.unwrap_or(0);
    }
    features
}
