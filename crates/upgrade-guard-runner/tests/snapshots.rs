// crates/upgrade-guard-runner/tests/snapshots.rs
// ============================================================================
// Module: Snapshot Writer Tests
// Description: Atomic snapshot writes, verification, and retention pruning.
// Purpose: Validate the on-disk evidence layout independent of runs.
// ============================================================================

//! ## Overview
//! - Writes produce a manifest, the files, and a latest pointer.
//! - Unsafe, duplicate, and reserved paths are rejected before writing.
//! - Tampered and deleted files fail verification.
//! - Pruning honors both the age cutoff and the newest-K floor.
//! - Overlapping writers on one root never fail each other.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::fs;

use tempfile::TempDir;
use time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;
use upgrade_guard_core::RetentionPolicy;
use upgrade_guard_core::Rollup;
use upgrade_guard_core::RunId;
use upgrade_guard_core::SnapshotCadence;
use upgrade_guard_runner::SnapshotBundle;
use upgrade_guard_runner::SnapshotError;
use upgrade_guard_runner::SnapshotWriter;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fixed evaluation clock.
const NOW: OffsetDateTime = datetime!(2026-10-19 12:00 UTC);

/// Builds a bundle started `days_ago` days before [`NOW`].
fn bundle(days_ago: i64, suffix: &str, files: &[(&str, &str)]) -> SnapshotBundle {
    let started = NOW - Duration::days(days_ago);
    SnapshotBundle {
        run_id: RunId::from_parts(started, None, suffix),
        generated_at: started,
        tag: None,
        files: files.iter().map(|(path, body)| ((*path).to_string(), body.as_bytes().to_vec())).collect(),
        cadence: SnapshotCadence {
            sbom_age_days: Some(1),
            sbom_threshold_days: 7,
            contract_age_days: None,
            contract_review_days: 30,
            duration_ms: 12,
        },
        rollup: Rollup::Safe,
    }
}

/// Creates a writer keeping 30 days and at least two snapshots.
fn writer(dir: &TempDir) -> SnapshotWriter {
    SnapshotWriter::new(
        dir.path().join("snapshots"),
        RetentionPolicy {
            retention_days: 30,
            retain_latest: 2,
        },
    )
}

/// Asserts that `result` is an invalid-snapshot error.
fn assert_invalid<T>(result: Result<T, SnapshotError>, needle: &str) {
    match result {
        Err(SnapshotError::Invalid(message)) => assert!(message.contains(needle), "{message}"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected invalid snapshot"),
    }
}

// ============================================================================
// SECTION: Writes
// ============================================================================

/// Verifies a write lays out files, manifest, and the latest pointer.
#[test]
fn write_lays_out_files_and_pointer() {
    let dir = TempDir::new().unwrap();
    let writer = writer(&dir);
    let manifest = writer
        .write(bundle(0, "aaaa0001", &[("reports/summary.md", "# Summary\n"), ("inputs/sbom.json", "{}")]))
        .unwrap();

    let paths: Vec<&str> = manifest.files.iter().map(|file| file.path.as_str()).collect();
    assert_eq!(paths, vec!["inputs/sbom.json", "reports/summary.md"]);
    let snapshot = writer.snapshot_dir(&manifest.run_id);
    assert_eq!(fs::read_to_string(snapshot.join("reports/summary.md")).unwrap(), "# Summary\n");
    assert_eq!(writer.read_manifest(&manifest.run_id).unwrap(), manifest);

    let latest = writer.latest().unwrap().unwrap();
    assert_eq!(latest.run_id, manifest.run_id);
    assert_eq!(latest.root_digest, manifest.root_digest);
    let leftovers: Vec<String> = fs::read_dir(writer.root())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with('.') || name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "staging left behind: {leftovers:?}");
}

/// Verifies the root digest depends only on file content.
#[test]
fn root_digest_ignores_file_order() {
    let dir = TempDir::new().unwrap();
    let writer = writer(&dir);
    let first = writer.write(bundle(0, "aaaa0001", &[("a.json", "1"), ("b.json", "2")])).unwrap();
    let second = writer.write(bundle(0, "aaaa0002", &[("b.json", "2"), ("a.json", "1")])).unwrap();
    assert_eq!(first.root_digest, second.root_digest);
    let changed = writer.write(bundle(0, "aaaa0003", &[("a.json", "1"), ("b.json", "3")])).unwrap();
    assert_ne!(first.root_digest, changed.root_digest);
}

/// Verifies unsafe requests are rejected and leave nothing behind.
#[test]
fn unsafe_requests_are_rejected() {
    let dir = TempDir::new().unwrap();
    let writer = writer(&dir);
    assert_invalid(writer.write(bundle(0, "aaaa0001", &[("../escape.json", "{}")])), "unsafe snapshot path");
    assert_invalid(writer.write(bundle(0, "aaaa0001", &[("/etc/passwd", "x")])), "unsafe snapshot path");
    assert_invalid(writer.write(bundle(0, "aaaa0001", &[("manifest.json", "{}")])), "unsafe snapshot path");
    assert_invalid(
        writer.write(bundle(0, "aaaa0001", &[("a.json", "1"), ("a.json", "2")])),
        "duplicate snapshot path",
    );
    let mut untimed = bundle(0, "aaaa0001", &[("a.json", "1")]);
    untimed.run_id = RunId::new("adhoc");
    assert_invalid(writer.write(untimed), "has no timestamp");
    assert!(writer.list().unwrap().is_empty());
    assert!(writer.latest().unwrap().is_none());
}

/// Verifies a run id is never overwritten.
#[test]
fn existing_snapshot_is_not_overwritten() {
    let dir = TempDir::new().unwrap();
    let writer = writer(&dir);
    writer.write(bundle(0, "aaaa0001", &[("a.json", "1")])).unwrap();
    assert_invalid(writer.write(bundle(0, "aaaa0001", &[("a.json", "2")])), "already exists");
}

/// Verifies overlapping writers on one root all succeed and leave a
/// readable latest pointer with no temporary files behind.
#[test]
fn concurrent_writers_share_a_root() {
    let dir = TempDir::new().unwrap();
    let writer = writer(&dir);
    let failures: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8u32)
            .map(|thread| {
                let writer = &writer;
                scope.spawn(move || {
                    (0..10u32)
                        .filter_map(|index| {
                            let suffix = format!("{thread:02x}{index:06x}");
                            writer.write(bundle(0, &suffix, &[("a.json", "1")])).err().map(|err| err.to_string())
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|handle| handle.join().unwrap()).collect()
    });
    assert!(failures.is_empty(), "{failures:?}");

    let written = writer.list().unwrap();
    assert_eq!(written.len(), 80);
    let latest = writer.latest().unwrap().unwrap();
    assert!(written.iter().any(|entry| entry.run_id == latest.run_id));
    let leftovers: Vec<String> = fs::read_dir(writer.root())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp") || name.starts_with(".staging-"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Verifies tampering and deletion are detected offline.
#[test]
fn verify_detects_tampering() {
    let dir = TempDir::new().unwrap();
    let writer = writer(&dir);
    let manifest = writer.write(bundle(0, "aaaa0001", &[("a.json", "1"), ("b.json", "2")])).unwrap();
    let clean = writer.verify(&manifest.run_id).unwrap();
    assert!(clean.passed());
    assert_eq!(clean.checked_files, 2);

    let snapshot = writer.snapshot_dir(&manifest.run_id);
    fs::write(snapshot.join("a.json"), "tampered").unwrap();
    fs::remove_file(snapshot.join("b.json")).unwrap();
    let report = writer.verify(&manifest.run_id).unwrap();
    assert!(!report.passed());
    assert_eq!(report.errors, vec!["hash mismatch for a.json".to_string(), "missing file b.json".to_string()]);
}

// ============================================================================
// SECTION: Retention
// ============================================================================

/// Verifies pruning removes old snapshots beyond the newest-K floor.
#[test]
fn prune_keeps_recent_and_newest() {
    let dir = TempDir::new().unwrap();
    let writer = writer(&dir);
    let ancient = writer.write(bundle(90, "aaaa0001", &[("a.json", "1")])).unwrap();
    let old = writer.write(bundle(60, "aaaa0002", &[("a.json", "1")])).unwrap();
    let older_kept = writer.write(bundle(45, "aaaa0003", &[("a.json", "1")])).unwrap();
    let recent = writer.write(bundle(1, "aaaa0004", &[("a.json", "1")])).unwrap();

    let pruned = writer.prune(NOW).unwrap();
    assert_eq!(pruned, vec![ancient.run_id.clone(), old.run_id.clone()]);
    let remaining: Vec<RunId> = writer.list().unwrap().into_iter().map(|entry| entry.run_id).collect();
    assert_eq!(remaining, vec![older_kept.run_id, recent.run_id]);
    assert!(!writer.snapshot_dir(&ancient.run_id).exists());
}

/// Verifies unrelated directories under the root are never pruned.
#[test]
fn prune_ignores_foreign_directories() {
    let dir = TempDir::new().unwrap();
    let writer = writer(&dir);
    fs::create_dir_all(writer.root().join("notes")).unwrap();
    writer.write(bundle(120, "aaaa0001", &[("a.json", "1")])).unwrap();
    assert!(writer.prune(NOW).unwrap().is_empty());
    assert!(writer.root().join("notes").exists());
}
