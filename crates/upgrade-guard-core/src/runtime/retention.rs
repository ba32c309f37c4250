// crates/upgrade-guard-core/src/runtime/retention.rs
// ============================================================================
// Module: Upgrade Guard Snapshot Retention
// Description: Selects snapshots eligible for pruning.
// Purpose: Keep the retention decision pure so hosts only delete.
// Dependencies: crate::core, time
// ============================================================================

//! ## Overview
//! Snapshots are ranked newest first by the timestamp encoded in their run
//! id. The newest `retain_latest` are always kept; every other snapshot
//! older than `retention_days` is selected. Directory names that do not
//! parse as run ids never become entries, so they are never selected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::Duration;
use time::OffsetDateTime;

use crate::core::RetentionPolicy;
use crate::core::RunId;
use crate::core::SnapshotEntry;

// ============================================================================
// SECTION: Selection
// ============================================================================

/// Builds entries from snapshot directory names, skipping names that do not
/// encode a run timestamp.
#[must_use]
pub fn entries_from_names<I, S>(names: I) -> Vec<SnapshotEntry>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .filter_map(|name| {
            let run_id = RunId::new(name);
            run_id.started_at().map(|created_at| SnapshotEntry {
                run_id,
                created_at,
            })
        })
        .collect()
}

/// Returns the run ids to prune, oldest first.
#[must_use]
pub fn select_for_pruning(
    entries: &[SnapshotEntry],
    policy: &RetentionPolicy,
    now: OffsetDateTime,
) -> Vec<RunId> {
    let mut ranked: Vec<&SnapshotEntry> = entries.iter().collect();
    ranked.sort_by(|left, right| {
        right.created_at.cmp(&left.created_at).then_with(|| right.run_id.cmp(&left.run_id))
    });
    // A cutoff before the representable range keeps everything.
    let Some(cutoff) = now.checked_sub(Duration::days(i64::from(policy.retention_days))) else {
        return Vec::new();
    };
    let mut selected: Vec<RunId> = ranked
        .into_iter()
        .skip(policy.retain_latest)
        .filter(|entry| entry.created_at < cutoff)
        .map(|entry| entry.run_id.clone())
        .collect();
    selected.reverse();
    selected
}
