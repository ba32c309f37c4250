// crates/upgrade-guard-runner/tests/collaborators.rs
// ============================================================================
// Module: Runner Collaborator Tests
// Description: Source fetching, history, resolver, audit, and repositories.
// Purpose: Validate each side-effecting collaborator in isolation.
// ============================================================================

//! ## Overview
//! - Unreadable or oversized sources become missing inputs, never errors.
//! - The JSON lines history is append-only, concurrent-safe, and fails
//!   closed on corruption.
//! - The command resolver maps exit status, timeouts, and absent programs.
//! - File audit sinks write one JSON object per line.
//! - Requirements files merge under inline repository dependencies.
//! - Risk features join plan, assessment, sources, and metadata.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use tempfile::TempDir;
use time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;
use upgrade_guard_config::AuditConfig;
use upgrade_guard_config::EngineConfig;
use upgrade_guard_config::RepositoryConfig;
use upgrade_guard_config::ResolverConfig;
use upgrade_guard_config::SourcesConfig;
use upgrade_guard_core::AuditEvent;
use upgrade_guard_core::AuditRecord;
use upgrade_guard_core::AuditSink;
use upgrade_guard_core::ContractPolicy;
use upgrade_guard_core::DependencyResolver;
use upgrade_guard_core::DriftAnalyzer;
use upgrade_guard_core::Guard;
use upgrade_guard_core::GuardConfig;
use upgrade_guard_core::HistoricalOutcome;
use upgrade_guard_core::OutcomeRepository;
use upgrade_guard_core::OutcomeStoreError;
use upgrade_guard_core::PackageName;
use upgrade_guard_core::PlanInputs;
use upgrade_guard_core::Planner;
use upgrade_guard_core::PlannerConfig;
use upgrade_guard_core::ResolverError;
use upgrade_guard_core::ResolverRequest;
use upgrade_guard_core::ResolverStatus;
use upgrade_guard_core::RunId;
use upgrade_guard_core::SourceKind;
use upgrade_guard_core::SourceState;
use upgrade_guard_core::Version;
use upgrade_guard_core::runtime::DisabledResolver;
use upgrade_guard_core::runtime::RawSource;
use upgrade_guard_core::runtime::normalize_all;
use upgrade_guard_runner::CommandResolver;
use upgrade_guard_runner::FEED_KINDS;
use upgrade_guard_runner::FileAuditSink;
use upgrade_guard_runner::HistoryBackend;
use upgrade_guard_runner::JsonlOutcomeLog;
use upgrade_guard_runner::audit_sink_from_config;
use upgrade_guard_runner::collect_sources;
use upgrade_guard_runner::features_for_candidate;
use upgrade_guard_runner::load_repositories;
use upgrade_guard_runner::parse_requirements;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fixed evaluation clock.
const NOW: OffsetDateTime = datetime!(2026-10-19 12:00 UTC);

/// Builds an outcome recorded `minutes` after a day before [`NOW`].
fn outcome(package: &str, minutes: i64, success: bool) -> HistoricalOutcome {
    HistoricalOutcome {
        package: PackageName::new(package),
        from_version: Version::parse("1.0.0").unwrap(),
        to_version: Version::parse("1.1.0").unwrap(),
        recorded_at: NOW - Duration::days(1) + Duration::minutes(minutes),
        success,
        rolled_back: !success,
        failure_reason: (!success).then(|| "import error after upgrade".to_string()),
        features: None,
    }
}

/// Builds a resolver request for `requests`.
fn request() -> ResolverRequest {
    ResolverRequest {
        package: PackageName::new("requests"),
        ecosystem: "pypi".to_string(),
        from_version: Version::parse("2.31.0").unwrap(),
        to_version: Version::parse("2.32.0").unwrap(),
    }
}

/// Builds a resolver around `command` with a short timeout.
fn resolver(command: &[&str], timeout_ms: u64) -> CommandResolver {
    CommandResolver::new(&ResolverConfig {
        enabled: true,
        command: command.iter().map(|part| (*part).to_string()).collect(),
        timeout_ms,
    })
}

// ============================================================================
// SECTION: Source Collection
// ============================================================================

/// Verifies unconfigured, absent, and oversized sources become missing.
#[tokio::test]
async fn unreadable_sources_become_missing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("preflight.json"), r#"{"packages": []}"#).unwrap();
    fs::write(dir.path().join("sbom.json"), vec![b' '; 512]).unwrap();
    let config = SourcesConfig {
        root: Some(dir.path().to_path_buf()),
        preflight: Some("preflight.json".into()),
        sbom: Some("sbom.json".into()),
        metadata: Some("metadata.json".into()),
        max_bytes: 256,
        ..SourcesConfig::default()
    };
    let collected = collect_sources(&config).await.unwrap();
    let state = |kind: SourceKind| {
        collected.normalized.sources.iter().find(|input| input.source == kind).unwrap().clone()
    };
    assert_eq!(collected.normalized.sources.len(), 6);
    assert_eq!(state(SourceKind::Preflight).state, SourceState::Ok);
    assert_eq!(state(SourceKind::UpdateBot).state, SourceState::Missing);
    assert_eq!(state(SourceKind::Metadata).state, SourceState::Missing);
    assert_eq!(state(SourceKind::Contract).state, SourceState::Missing);
    let sbom = state(SourceKind::Sbom);
    assert_eq!(sbom.state, SourceState::Missing);
    assert!(sbom.diagnostic.unwrap().contains("exceeds size limit"));
    assert_eq!(collected.raw.keys().copied().collect::<Vec<_>>(), vec![SourceKind::Preflight]);
    assert_eq!(collected.policy, ContractPolicy::default());

    let kinds: Vec<SourceKind> = collected.normalized.sources.iter().map(|input| input.source).collect();
    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted);
}

/// Verifies the contract's raw bytes are kept for snapshotting.
#[tokio::test]
async fn contract_bytes_are_retained() {
    let dir = TempDir::new().unwrap();
    let body = "[contract]\ndefault_review_days = 14\n";
    fs::write(dir.path().join("contract.toml"), body).unwrap();
    let config = SourcesConfig {
        root: Some(dir.path().to_path_buf()),
        contract: Some("contract.toml".into()),
        ..SourcesConfig::default()
    };
    let collected = collect_sources(&config).await.unwrap();
    assert_eq!(collected.raw.get(&SourceKind::Contract).unwrap(), body.as_bytes());
    assert_eq!(collected.policy.contract.default_review_days, 14);
}

// ============================================================================
// SECTION: JSON Lines History
// ============================================================================

/// Verifies appends survive reopening and load in append order.
#[test]
fn jsonl_history_persists_in_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/history.jsonl");
    let log = JsonlOutcomeLog::new(&path).unwrap();
    log.append(&outcome("celery", 1, true)).unwrap();
    log.append(&outcome("django", 2, false)).unwrap();
    log.append(&outcome("celery", 3, false)).unwrap();

    let reopened = JsonlOutcomeLog::new(&path).unwrap();
    let all = reopened.load_all().unwrap();
    assert_eq!(all, vec![outcome("celery", 1, true), outcome("django", 2, false), outcome("celery", 3, false)]);
    let celery = reopened.load_for_package(&PackageName::new("celery")).unwrap();
    assert_eq!(celery.len(), 2);
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
}

/// Verifies a corrupt line fails the whole load.
#[test]
fn jsonl_history_fails_closed_on_corruption() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");
    let log = JsonlOutcomeLog::new(&path).unwrap();
    log.append(&outcome("celery", 1, true)).unwrap();
    let mut content = fs::read_to_string(&path).unwrap();
    content.push_str("{\"package\": \"celery\"\n");
    fs::write(&path, content).unwrap();
    match log.load_all() {
        Err(OutcomeStoreError::Corrupt(message)) => assert!(message.starts_with("history line 2")),
        other => panic!("expected corruption, got {other:?}"),
    }
}

/// Verifies invalid records and directory paths are rejected.
#[test]
fn jsonl_history_rejects_invalid_input() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(JsonlOutcomeLog::new(dir.path()), Err(OutcomeStoreError::Io(_))));
    let log = JsonlOutcomeLog::new(dir.path().join("history.jsonl")).unwrap();
    assert!(matches!(log.append(&outcome("", 1, true)), Err(OutcomeStoreError::Invalid(_))));
    assert!(log.load_all().unwrap().is_empty());
}

/// Verifies concurrent appenders never lose or interleave records.
#[test]
fn jsonl_history_survives_concurrent_appends() {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(JsonlOutcomeLog::new(dir.path().join("history.jsonl")).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for index in 0..25 {
                    log.append(&outcome(&format!("pkg-{worker}"), index, index % 3 != 0)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let all = log.load_all().unwrap();
    assert_eq!(all.len(), 100);
    for worker in 0..4 {
        let package = PackageName::new(format!("pkg-{worker}"));
        assert_eq!(log.load_for_package(&package).unwrap().len(), 25);
    }
}

/// Verifies separately opened logs on one path append whole lines.
#[test]
fn jsonl_history_separate_instances_append_whole_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let log = JsonlOutcomeLog::new(path.clone()).unwrap();
            thread::spawn(move || {
                for index in 0..50 {
                    log.append(&outcome(&format!("pkg-{worker}"), index, true)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let reader = JsonlOutcomeLog::new(path).unwrap();
    assert_eq!(reader.load_all().unwrap().len(), 200);
}

/// Verifies configuration selects the history backend.
#[test]
fn history_backend_follows_configuration() {
    let dir = TempDir::new().unwrap();
    let jsonl_path = dir.path().join("history.jsonl");
    let config =
        EngineConfig::from_toml_str(&format!("[history]\ntype = \"jsonl\"\npath = \"{}\"\n", jsonl_path.display()))
            .unwrap();
    let backend = HistoryBackend::from_config(&config.history).unwrap();
    assert!(matches!(backend, HistoryBackend::Jsonl(_)));
    backend.append(&outcome("celery", 1, true)).unwrap();
    assert!(jsonl_path.exists());

    let sqlite_path = dir.path().join("history.db");
    let config =
        EngineConfig::from_toml_str(&format!("[history]\ntype = \"sqlite\"\npath = \"{}\"\n", sqlite_path.display()))
            .unwrap();
    let backend = HistoryBackend::from_config(&config.history).unwrap();
    backend.append(&outcome("celery", 1, false)).unwrap();
    assert_eq!(backend.load_all().unwrap().len(), 1);

    let memory = HistoryBackend::from_config(&EngineConfig::default().history).unwrap();
    assert!(matches!(memory, HistoryBackend::Memory(_)));
}

// ============================================================================
// SECTION: Command Resolver
// ============================================================================

/// Verifies the requested pin is appended to the configured command.
#[test]
fn resolver_appends_pin() {
    let resolver = resolver(&["pip", "install", "--dry-run"], 1_000);
    assert_eq!(resolver.arguments(&request()), vec!["install", "--dry-run", "requests==2.32.0"]);
}

/// Verifies exit status maps to ok and failed verdicts.
#[cfg(unix)]
#[test]
fn resolver_maps_exit_status() {
    assert_eq!(resolver(&["true"], 5_000).dry_run(&request()).unwrap().status, ResolverStatus::Ok);

    let silent = resolver(&["false"], 5_000).dry_run(&request()).unwrap();
    assert_eq!(silent.status, ResolverStatus::Failed);
    assert_eq!(silent.detail.as_deref(), Some("resolver exited with status 1"));

    let noisy = resolver(&["sh", "-c", "echo \"cannot install $1\" >&2; exit 1", "sh"], 5_000)
        .dry_run(&request())
        .unwrap();
    assert_eq!(noisy.detail.as_deref(), Some("cannot install requests==2.32.0"));
}

/// Verifies a hung resolver is killed at its timeout.
#[cfg(unix)]
#[test]
fn resolver_times_out() {
    match resolver(&["sh", "-c", "sleep 5", "sh"], 200).dry_run(&request()) {
        Err(ResolverError::Failed(message)) => assert!(message.contains("timed out after 200 ms")),
        other => panic!("expected timeout, got {other:?}"),
    }
}

/// Verifies a missing program or empty command is unavailable.
#[test]
fn resolver_reports_unavailable_program() {
    let missing = resolver(&["upgrade-guard-no-such-resolver"], 1_000).dry_run(&request());
    assert!(matches!(missing, Err(ResolverError::Unavailable(_))));
    let empty = resolver(&[], 1_000).dry_run(&request());
    assert!(matches!(empty, Err(ResolverError::Unavailable(_))));
}

// ============================================================================
// SECTION: Audit Sinks
// ============================================================================

/// Verifies the file sink appends one JSON object per record.
#[test]
fn file_audit_sink_writes_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logs/audit.jsonl");
    let sink = FileAuditSink::new(&path).unwrap();
    let run_id = RunId::new("20261019T120000Z-abcd1234");
    sink.record(&AuditRecord::new(Some(run_id.clone()), AuditEvent::PlanGenerated {
        candidates: 3,
        batches: 1,
    }));
    sink.record(&AuditRecord::new(None, AuditEvent::SnapshotPruned {
        removed: vec![run_id],
    }));

    let lines: Vec<serde_json::Value> = fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "plan_generated");
    assert_eq!(lines[0]["run_id"], "20261019T120000Z-abcd1234");
    assert_eq!(lines[1]["event"], "snapshot_pruned");
}

/// Verifies configuration selects the audit sink.
#[test]
fn audit_sink_follows_configuration() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    let sink = audit_sink_from_config(&AuditConfig {
        enabled: true,
        path: Some(path.clone()),
    })
    .unwrap();
    sink.record(&AuditRecord::new(None, AuditEvent::PlanGenerated {
        candidates: 0,
        batches: 0,
    }));
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);

    let disabled_path = dir.path().join("disabled.jsonl");
    let disabled = audit_sink_from_config(&AuditConfig {
        enabled: false,
        path: Some(disabled_path.clone()),
    })
    .unwrap();
    disabled.record(&AuditRecord::new(None, AuditEvent::PlanGenerated {
        candidates: 0,
        batches: 0,
    }));
    assert!(!disabled_path.exists());
}

// ============================================================================
// SECTION: Repositories
// ============================================================================

/// Verifies requirements parsing ignores options, markers, and extras.
#[test]
fn requirements_parse_pins_and_ranges() {
    let parsed = parse_requirements(
        "# pinned\n\
         -r base.txt\n\
         --index-url https://example.invalid/simple\n\
         Requests[socks] == 2.31.0  # http\n\
         flask>=3.0 ; python_version > '3.8'\n\
         celery\n\
         \n",
    );
    let expected: BTreeMap<PackageName, String> = BTreeMap::from([
        (PackageName::new("celery"), "*".to_string()),
        (PackageName::new("flask"), ">=3.0".to_string()),
        (PackageName::new("requests"), "==2.31.0".to_string()),
    ]);
    assert_eq!(parsed, expected);
}

/// Verifies inline dependencies win over the requirements file.
#[tokio::test]
async fn inline_dependencies_override_requirements() {
    let dir = TempDir::new().unwrap();
    let billing = dir.path().join("billing");
    fs::create_dir_all(&billing).unwrap();
    fs::write(billing.join("requirements.txt"), "requests==2.31.0\nflask>=3.0\n").unwrap();
    let configs = vec![
        RepositoryConfig {
            name: "web".to_string(),
            path: dir.path().join("web"),
            priority: 0,
            requirements: Some("requirements.txt".into()),
            dependencies: BTreeMap::new(),
        },
        RepositoryConfig {
            name: "billing".to_string(),
            path: billing,
            priority: 3,
            requirements: Some("requirements.txt".into()),
            dependencies: BTreeMap::from([("requests".to_string(), ">=2.0".to_string())]),
        },
    ];
    let loaded = load_repositories(&configs).await;
    let names: Vec<&str> = loaded.repositories.iter().map(|repository| repository.name.as_str()).collect();
    assert_eq!(names, vec!["billing", "web"]);
    let billing = &loaded.repositories[0];
    assert_eq!(billing.priority, 3);
    assert_eq!(billing.dependencies.get(&PackageName::new("requests")).unwrap(), ">=2.0");
    assert_eq!(billing.dependencies.get(&PackageName::new("flask")).unwrap(), ">=3.0");
    assert_eq!(loaded.warnings.len(), 1);
    assert!(loaded.warnings[0].starts_with("web: requirements unreadable"));
    assert!(loaded.repositories[1].dependencies.is_empty());
}

proptest! {
    /// Verifies every parsed requirement names a non-empty canonical package.
    #[test]
    fn requirements_never_yield_empty_names(lines in prop::collection::vec("[a-zA-Z0-9_.=<>!~ #;-]{0,24}", 0..12)) {
        let parsed = parse_requirements(&lines.join("\n"));
        for (name, requirement) in parsed {
            prop_assert!(!name.is_empty());
            prop_assert!(!requirement.is_empty());
        }
    }
}

// ============================================================================
// SECTION: Risk Features
// ============================================================================

/// Verifies features combine issues, transitivity, and metadata.
#[test]
fn features_join_run_evidence() {
    let preflight = r#"{"packages": [
        {"name": "urllib3", "version": "1.26.0", "ecosystem": "pypi", "direct": false}
    ]}"#;
    let vulns = r#"{"vulnerabilities": [
        {"id": "CVE-2026-0001", "package": "urllib3", "installed_version": "1.26.0",
         "fixed_version": "2.0.0", "severity": "low", "summary": "header injection"}
    ]}"#;
    let metadata = r#"{"generated_at": "2026-10-18T00:00:00Z", "packages": {"urllib3": {
        "latest": "2.0.0", "versions": ["1.26.0", "2.0.0"], "released_at": "2026-10-09T00:00:00Z",
        "popularity": 0.4, "has_test_coverage": false, "dependency_count": 12,
        "breaking_releases": ["2.0.0"]
    }}}"#;
    let raws = vec![
        RawSource::present(SourceKind::Preflight, None, preflight.as_bytes().to_vec()),
        RawSource::present(SourceKind::VulnerabilityFeed, None, vulns.as_bytes().to_vec()),
        RawSource::present(SourceKind::Metadata, None, metadata.as_bytes().to_vec()),
    ];
    let normalized = normalize_all(raws, &FEED_KINDS);
    let policy = ContractPolicy::default();
    let assessment = Guard::new(GuardConfig::default()).assess(&normalized.sources, &policy, NOW).unwrap();
    let drift = DriftAnalyzer::new().analyze(&normalized.sources, &normalized.metadata, &policy, NOW);
    let planner = Planner::new(PlannerConfig::default()).unwrap();
    let plan = planner.plan(
        &PlanInputs {
            assessment: &assessment,
            drift: &drift,
            policy: &policy,
            metadata: &normalized.metadata,
            history: &[],
            conflicts: None,
        },
        &DisabledResolver,
        NOW,
    );
    let candidate = plan.candidates.iter().find(|candidate| candidate.package.as_str() == "urllib3").unwrap();

    let features = features_for_candidate(candidate, &assessment, &normalized.sources, &normalized.metadata, NOW);
    assert!(features.is_major);
    assert!(features.breaking_changes);
    assert!(features.security_update);
    assert!(features.is_transitive);
    assert_eq!(features.days_since_last_update, Some(10));
    assert!((features.popularity - 0.4).abs() < 1e-9);
    assert!(!features.has_test_coverage);
    assert_eq!(features.dependency_count, 12);
}
