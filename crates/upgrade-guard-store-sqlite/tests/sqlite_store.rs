// crates/upgrade-guard-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Outcome Store Tests
// Description: Append-only persistence, integrity checks, and path safety.
// Purpose: Validate the durable outcome log against the repository contract.
// ============================================================================

//! ## Overview
//! - Appends survive reopening and load in append order.
//! - Per-package loads partition the full log.
//! - Tampered rows and unknown schema versions fail closed.
//! - Path validation rejects directories and empty paths.
//! - Concurrent appenders never lose records.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::path::Path;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;
use time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;
use upgrade_guard_core::HistoricalOutcome;
use upgrade_guard_core::OutcomeRepository;
use upgrade_guard_core::OutcomeStoreError;
use upgrade_guard_core::PackageName;
use upgrade_guard_core::PredictorConfig;
use upgrade_guard_core::RiskPredictor;
use upgrade_guard_core::UpdateFeatures;
use upgrade_guard_core::Version;
use upgrade_guard_store_sqlite::SqliteOutcomeStore;
use upgrade_guard_store_sqlite::SqliteStoreConfig;
use upgrade_guard_store_sqlite::SqliteStoreError;
use upgrade_guard_store_sqlite::SqliteStoreMode;
use upgrade_guard_store_sqlite::SqliteSyncMode;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fixed evaluation clock.
const NOW: OffsetDateTime = datetime!(2026-10-19 12:00 UTC);

/// Opens a store at `path` with explicit pragmas.
fn store_at(path: &Path) -> SqliteOutcomeStore {
    let config = SqliteStoreConfig {
        path: path.to_path_buf(),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    };
    SqliteOutcomeStore::new(&config).unwrap()
}

/// Builds an outcome for `package` recorded `minutes` after a base time.
fn outcome(package: &str, minutes: i64, success: bool) -> HistoricalOutcome {
    let from = Version::parse("1.0.0").unwrap();
    let to = Version::parse("1.1.0").unwrap();
    HistoricalOutcome {
        package: PackageName::new(package),
        from_version: from.clone(),
        to_version: to.clone(),
        recorded_at: NOW - Duration::days(1) + Duration::minutes(minutes),
        success,
        rolled_back: !success,
        failure_reason: (!success).then(|| "import error after upgrade".to_string()),
        features: Some(UpdateFeatures::from_versions(PackageName::new(package), from, to)),
    }
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

/// Verifies appends survive reopening and load in append order.
#[test]
fn appends_survive_reopen_in_order() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("history").join("outcomes.sqlite");
    let written = vec![outcome("celery", 3, true), outcome("django", 1, false), outcome("celery", 2, false)];
    {
        let store = store_at(&path);
        assert!(store.is_empty().unwrap());
        for record in &written {
            store.append(record).unwrap();
        }
    }
    let reopened = store_at(&path);
    assert_eq!(reopened.len().unwrap(), 3);
    assert_eq!(reopened.load_all().unwrap(), written);
    let celery = reopened.load_for_package(&PackageName::new("Celery")).unwrap();
    assert_eq!(celery, vec![written[0].clone(), written[2].clone()]);
    assert!(reopened.load_for_package(&PackageName::new("flask")).unwrap().is_empty());
}

/// Verifies the store feeds the predictor's history.
#[test]
fn predictor_reads_history_from_store() {
    let temp = TempDir::new().unwrap();
    let store = store_at(&temp.path().join("outcomes.sqlite"));
    let predictor = RiskPredictor::new(PredictorConfig::default(), store.clone()).unwrap();
    let features = outcome("celery", 0, false).features.unwrap();
    predictor.record_outcome(&outcome("celery", 0, false)).unwrap();
    let score = predictor.predict(&features, NOW);
    assert_eq!(score.history_samples, 1);
    assert!(score.history_available);
    assert_eq!(store.len().unwrap(), 1);
}

/// Verifies outcomes without a package are rejected.
#[test]
fn empty_package_rejected() {
    let temp = TempDir::new().unwrap();
    let store = store_at(&temp.path().join("outcomes.sqlite"));
    let mut record = outcome("celery", 0, true);
    record.package = PackageName::new("");
    assert!(matches!(store.append(&record), Err(OutcomeStoreError::Invalid(_))));
}

// ============================================================================
// SECTION: Integrity
// ============================================================================

/// Verifies a tampered payload fails the load.
#[test]
fn tampered_row_fails_closed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("outcomes.sqlite");
    let store = store_at(&path);
    store.append(&outcome("celery", 0, true)).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute("UPDATE outcomes SET outcome_hash = ?1 WHERE seq = 1", params!["00".repeat(32)])
        .unwrap();
    drop(conn);

    let Err(err) = store.load_all() else {
        panic!("expected tampered row to fail");
    };
    assert!(matches!(err, OutcomeStoreError::Corrupt(_)));
}

/// Verifies an unknown hash algorithm label is invalid.
#[test]
fn unknown_hash_algorithm_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("outcomes.sqlite");
    let store = store_at(&path);
    store.append(&outcome("celery", 0, true)).unwrap();
    let conn = Connection::open(&path).unwrap();
    conn.execute("UPDATE outcomes SET hash_algorithm = 'md5'", params![]).unwrap();
    drop(conn);
    assert!(matches!(store.load_for_package(&PackageName::new("celery")), Err(OutcomeStoreError::Invalid(_))));
}

/// Verifies an unknown schema version is refused.
#[test]
fn unknown_schema_version_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("outcomes.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE store_meta (version INTEGER NOT NULL);").unwrap();
    conn.execute("INSERT INTO store_meta (version) VALUES (?1)", params![999_i64]).unwrap();
    drop(conn);

    let Err(err) = SqliteOutcomeStore::new(&SqliteStoreConfig::new(path)) else {
        panic!("expected schema mismatch to fail");
    };
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

// ============================================================================
// SECTION: Path Validation
// ============================================================================

/// Verifies directory and empty paths are rejected.
#[test]
fn invalid_paths_rejected() {
    let temp = TempDir::new().unwrap();
    let Err(err) = SqliteOutcomeStore::new(&SqliteStoreConfig::new(temp.path())) else {
        panic!("expected directory path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));

    let Err(err) = SqliteOutcomeStore::new(&SqliteStoreConfig::new("")) else {
        panic!("expected empty path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));

    let Err(err) = SqliteOutcomeStore::new(&SqliteStoreConfig::new(temp.path().join("a".repeat(300)))) else {
        panic!("expected overlong component to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

/// Verifies concurrent appenders through one store lose nothing.
#[test]
fn concurrent_appends_are_serialized() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(store_at(&temp.path().join("outcomes.sqlite")));
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for index in 0..10 {
                    store.append(&outcome(&format!("pkg-{worker}"), index, index % 3 != 0)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.len().unwrap(), 40);
    for worker in 0..4 {
        let records = store.load_for_package(&PackageName::new(format!("pkg-{worker}"))).unwrap();
        assert_eq!(records.len(), 10);
        assert!(records.windows(2).all(|pair| pair[0].recorded_at < pair[1].recorded_at));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Verifies per-package loads partition the full log in append order.
    #[test]
    fn package_loads_partition_full_log(packages in prop::collection::vec(0_usize..3, 0..12)) {
        let temp = TempDir::new().unwrap();
        let store = store_at(&temp.path().join("outcomes.sqlite"));
        let names = ["celery", "django", "kombu"];
        for (index, package) in packages.iter().enumerate() {
            let minutes = i64::try_from(index).unwrap();
            store.append(&outcome(names[*package], minutes, index % 2 == 0)).unwrap();
        }
        let all = store.load_all().unwrap();
        prop_assert_eq!(all.len(), packages.len());
        for name in names {
            let expected: Vec<HistoricalOutcome> =
                all.iter().filter(|record| record.package.as_str() == name).cloned().collect();
            prop_assert_eq!(store.load_for_package(&PackageName::new(name)).unwrap(), expected);
        }
    }
}
