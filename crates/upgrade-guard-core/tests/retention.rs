// crates/upgrade-guard-core/tests/retention.rs
// ============================================================================
// Module: Snapshot Retention Tests
// Description: Pruning selection over run-id encoded snapshots.
// ============================================================================
//! ## Overview
//! Checks that the newest snapshots survive regardless of age, that only
//! snapshots past the retention window are selected, and that directory
//! names without a run timestamp are ignored.

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
use upgrade_guard_core::RetentionPolicy;
use upgrade_guard_core::RunId;
use upgrade_guard_core::runtime::entries_from_names;
use upgrade_guard_core::runtime::select_for_pruning;

/// Fixed evaluation clock.
const NOW: OffsetDateTime = datetime!(2026-10-19 12:00 UTC);

/// Builds a run directory name created `days_ago` before [`NOW`].
fn run_name(days_ago: i64, suffix: &str) -> String {
    RunId::from_parts(NOW - Duration::days(days_ago), Some("nightly"), suffix).as_str().to_string()
}

/// Verifies run-id directory names parse and foreign names are skipped.
#[test]
fn entries_skip_foreign_directories() {
    let names = vec![run_name(3, "a1b2"), "latest.json".to_string(), "notes".to_string(), "2026XX19T000000Z".to_string()];
    let entries = entries_from_names(names);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].created_at, NOW - Duration::days(3));
}

/// Verifies old snapshots are pruned oldest first while the newest are kept.
#[test]
fn old_snapshots_pruned_newest_retained() {
    let names: Vec<String> = [1, 5, 40, 60, 90].iter().map(|days| run_name(*days, "0000")).collect();
    let entries = entries_from_names(names.clone());
    let policy = RetentionPolicy {
        retention_days: 30,
        retain_latest: 3,
    };
    let pruned = select_for_pruning(&entries, &policy, NOW);
    assert_eq!(pruned, vec![RunId::new(names[4].clone()), RunId::new(names[3].clone())]);
}

/// Verifies retain-latest protects snapshots past the retention window.
#[test]
fn retain_latest_protects_old_snapshots() {
    let entries = entries_from_names([run_name(100, "aa"), run_name(200, "bb")]);
    let policy = RetentionPolicy {
        retention_days: 7,
        retain_latest: 2,
    };
    assert!(select_for_pruning(&entries, &policy, NOW).is_empty());
    assert!(select_for_pruning(&[], &RetentionPolicy::default(), NOW).is_empty());
}

/// Verifies a retention window reaching past the representable time range
/// keeps every snapshot.
#[test]
fn retention_beyond_time_range_keeps_everything() {
    let entries = entries_from_names([run_name(100, "aa"), run_name(200, "bb")]);
    let policy = RetentionPolicy {
        retention_days: u32::MAX,
        retain_latest: 0,
    };
    assert!(select_for_pruning(&entries, &policy, NOW).is_empty());
}

proptest! {
    /// Verifies the newest `retain_latest` are never selected and every
    /// selected snapshot is older than the cutoff.
    #[test]
    fn selection_respects_window_and_floor(
        ages in prop::collection::btree_set(0_i64..400, 0..20),
        retention_days in 0_u32..120,
        retain_latest in 0_usize..8,
    ) {
        let names: Vec<String> = ages.iter().map(|days| run_name(*days, "ff")).collect();
        let entries = entries_from_names(names);
        let policy = RetentionPolicy {
            retention_days,
            retain_latest,
        };
        let pruned = select_for_pruning(&entries, &policy, NOW);
        let cutoff = NOW - Duration::days(i64::from(retention_days));

        let mut newest: Vec<_> = entries.iter().collect();
        newest.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        for kept in newest.iter().take(retain_latest) {
            prop_assert!(!pruned.contains(&kept.run_id));
        }
        for run_id in &pruned {
            let created = run_id.started_at().unwrap();
            prop_assert!(created < cutoff);
        }
        let eligible = newest.iter().skip(retain_latest).filter(|entry| entry.created_at < cutoff).count();
        prop_assert_eq!(pruned.len(), eligible);
    }
}
