// crates/upgrade-guard-core/src/runtime/drift.rs
// ============================================================================
// Module: Upgrade Guard Drift Analyzer
// Description: Classifies resolved versions against the metadata index.
// Purpose: Report how far each package lags its latest eligible release.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! For each package seen in any usable source, the analyzer compares the
//! resolved version against the newest release the index knows about,
//! excluding pre-releases unless the contract allows them for that package.
//! A declared constraint that no indexed release satisfies is a conflict;
//! a package the index does not know is `unknown`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

use crate::core::ContractPolicy;
use crate::core::DriftClass;
use crate::core::DriftCounts;
use crate::core::DriftReport;
use crate::core::MetadataIndex;
use crate::core::PackageDrift;
use crate::core::PackageRecord;
use crate::core::SourceInput;
use crate::core::VersionChange;
use crate::core::time::whole_days_between;
use crate::runtime::normalizer::merge_packages;

// ============================================================================
// SECTION: Analyzer
// ============================================================================

/// Drift analyzer. Stateless; the policy and clock are passed per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftAnalyzer;

impl DriftAnalyzer {
    /// Creates a drift analyzer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classifies every package found in `sources`.
    #[must_use]
    pub fn analyze(
        &self,
        sources: &[SourceInput],
        index: &MetadataIndex,
        policy: &ContractPolicy,
        now: OffsetDateTime,
    ) -> DriftReport {
        let merged = merge_packages(sources);
        let mut counts = DriftCounts::default();
        let mut overall = DriftClass::UpToDate;
        let mut packages = Vec::with_capacity(merged.len());
        for package in merged.into_values() {
            let drift = classify(&package.record, index, policy, now);
            counts.add(drift.classification);
            overall = overall.max(drift.classification);
            packages.push(drift);
        }
        let mut notes = Vec::new();
        if index.is_empty() {
            notes.push("metadata snapshot missing or empty; drift may be inaccurate".to_string());
        }
        DriftReport {
            generated_at: now,
            overall,
            counts,
            packages,
            notes,
        }
    }
}

/// Classifies one package.
fn classify(
    record: &PackageRecord,
    index: &MetadataIndex,
    policy: &ContractPolicy,
    now: OffsetDateTime,
) -> PackageDrift {
    let mut drift = PackageDrift {
        name: record.name.clone(),
        ecosystem: record.ecosystem.clone(),
        current: record.current.clone(),
        latest: None,
        classification: DriftClass::Unknown,
        notes: Vec::new(),
        window_exceeded: false,
        transitive: record.is_transitive(),
    };
    let Some(entry) = index.get(&record.name) else {
        drift.notes.push("missing metadata".to_string());
        return drift;
    };
    let allow_prerelease = policy.allows_prerelease(&record.name);
    let Some(latest) = entry.latest_release(allow_prerelease) else {
        drift.notes.push("no eligible releases in metadata".to_string());
        return drift;
    };

    if let Some(constraint) = record.constraint.as_ref().filter(|constraint| !constraint.is_any()) {
        let satisfiable = entry
            .known_versions()
            .iter()
            .chain(std::iter::once(&record.current))
            .filter(|version| allow_prerelease || !version.is_prerelease())
            .any(|version| constraint.matches(version));
        if !satisfiable {
            drift.classification = DriftClass::Conflict;
            drift.notes.push(format!("constraint `{constraint}` unsatisfiable against metadata index"));
            if drift.transitive && policy.policies.updates.allow_transitive_conflicts {
                drift.notes.push("transitive conflict allowed by contract".to_string());
            }
            drift.latest = Some(latest);
            return drift;
        }
    }

    let change = record.current.change_to(&latest);
    drift.classification = DriftClass::from_change(change);
    let label = match change {
        VersionChange::Major => Some("major"),
        VersionChange::Minor => Some("minor"),
        VersionChange::Patch => Some("patch"),
        VersionChange::None | VersionChange::Downgrade => None,
    };
    if let Some(label) = label {
        drift.notes.push(format!("{label} upgrade available ({} -> {latest})", record.current));
    } else if change == VersionChange::Downgrade {
        drift.notes.push(format!("resolved version {} is ahead of index latest {latest}", record.current));
    }

    if change == VersionChange::Major {
        if policy.stays_on_major(&record.name) {
            drift.notes.push(format!("stay_on_major pins {} to major {}", record.name, record.current.major()));
        } else if policy.policies.updates.major_review_required {
            drift.notes.push("major upgrades require review".to_string());
        }
    }

    if drift.classification.has_upgrade()
        && let Some(released_at) = entry.released_at
    {
        let updates = &policy.policies.updates;
        let window = if change == VersionChange::Patch {
            updates.default_update_window_days
        } else {
            updates.minor_update_window_days
        };
        let pending = whole_days_between(released_at, now);
        if pending > i64::from(window) {
            drift.window_exceeded = true;
            drift.notes.push(format!("update pending {pending}d exceeds {window}d window"));
        }
    }
    drift.latest = Some(latest);
    drift
}
