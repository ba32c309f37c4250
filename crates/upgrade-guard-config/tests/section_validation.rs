//! Section validation tests for upgrade-guard-config.
// crates/upgrade-guard-config/tests/section_validation.rs
// =============================================================================
// Module: Config Section Validation Tests
// Description: Validate per-section ranges and engine config conversion.
// Purpose: Ensure every section fails closed and maps onto engine configs.
// =============================================================================

use std::path::PathBuf;

use upgrade_guard_config::EngineConfig;
use upgrade_guard_config::HistoryStoreType;
use upgrade_guard_config::RepositoryConfig;
use upgrade_guard_core::PackageName;
use upgrade_guard_core::SourceKind;

mod common;

use common::TestResult;
use common::assert_invalid;
use common::minimal_config;

/// Builds a repository entry with no inline dependencies.
fn repository(name: &str) -> RepositoryConfig {
    RepositoryConfig {
        name: name.to_string(),
        path: PathBuf::from(format!("../{name}")),
        priority: 0,
        requirements: None,
        dependencies: std::collections::BTreeMap::new(),
    }
}

#[test]
fn defaults_match_engine_defaults() -> TestResult {
    let config = minimal_config()?;
    let planner = config.planner_config();
    if planner.top_n != 10 || planner.max_batch_size != 10 || planner.command_prefix != "pip install --upgrade" {
        return Err("planner defaults drifted".to_string());
    }
    if !planner.skip_resolver {
        return Err("resolver is disabled by default so planner must skip it".to_string());
    }
    let predictor = config.predictor_config();
    if (predictor.safe_below - 0.3).abs() > f64::EPSILON || (predictor.blocked_above - 0.7).abs() > f64::EPSILON {
        return Err("predictor bands drifted".to_string());
    }
    if config.guard_config().mandatory_sources != vec![SourceKind::Contract] {
        return Err("mandatory sources must default to the contract".to_string());
    }
    if config.guard.exit_unknown != 3 || config.rollback_config().window_seconds != 3600 {
        return Err("guard or rollback defaults drifted".to_string());
    }
    let retention = config.retention_policy();
    if retention.retention_days != 30 || retention.retain_latest != 5 {
        return Err("retention defaults drifted".to_string());
    }
    if config.history.store_type != HistoryStoreType::Memory || !config.audit.enabled {
        return Err("history or audit defaults drifted".to_string());
    }
    Ok(())
}

#[test]
fn source_paths_resolve_against_root() -> TestResult {
    let config = EngineConfig::from_toml_str(
        "[sources]\nroot = \"reports\"\nsbom = \"sbom.json\"\npreflight = \"/abs/preflight.json\"\n",
    )
    .map_err(|err| err.to_string())?;
    if config.sources.path_for(SourceKind::Sbom) != Some(PathBuf::from("reports/sbom.json")) {
        return Err("relative source path did not join root".to_string());
    }
    if config.sources.path_for(SourceKind::Preflight) != Some(PathBuf::from("/abs/preflight.json")) {
        return Err("absolute source path was rewritten".to_string());
    }
    if config.sources.path_for(SourceKind::Metadata).is_some() {
        return Err("unconfigured source must have no path".to_string());
    }
    Ok(())
}

#[test]
fn source_timeout_out_of_range_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.sources.timeout_ms = 10;
    assert_invalid(config.validate(), "sources.timeout_ms must be between")
}

#[test]
fn exit_unknown_must_not_collide() -> TestResult {
    let mut config = minimal_config()?;
    config.guard.exit_unknown = 2;
    assert_invalid(config.validate(), "guard.exit_unknown must differ")
}

#[test]
fn duplicate_mandatory_sources_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.guard.mandatory_sources = vec![SourceKind::Contract, SourceKind::Contract];
    assert_invalid(config.validate(), "guard.mandatory_sources contains duplicates")
}

#[test]
fn negative_planner_weight_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.planner.weights.recency = -1.0;
    assert_invalid(config.validate(), "weight recency must be a finite non-negative number")
}

#[test]
fn inverted_predictor_bands_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.predictor.safe_below = 0.8;
    config.predictor.blocked_above = 0.4;
    assert_invalid(config.validate(), "bands must satisfy")
}

#[test]
fn rollback_weight_out_of_range_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.rollback.critical_weight = 1.5;
    assert_invalid(config.validate(), "critical_weight must be within (0, 1]")
}

#[test]
fn zero_retention_days_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.snapshots.retention_days = 0;
    assert_invalid(config.validate(), "snapshots.retention_days must be greater than zero")
}

#[test]
fn unbounded_retention_days_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.snapshots.retention_days = u32::MAX;
    assert_invalid(config.validate(), "snapshots.retention_days must be at most 36500")
}

#[test]
fn overlong_snapshot_tag_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.snapshots.tag = Some("t".repeat(65));
    assert_invalid(config.validate(), "snapshots.tag must be")
}

#[test]
fn memory_history_rejects_path() -> TestResult {
    let mut config = minimal_config()?;
    config.history.path = Some(PathBuf::from("history.jsonl"));
    assert_invalid(config.validate(), "memory history must not set path")
}

#[test]
fn file_history_requires_path() -> TestResult {
    let mut config = minimal_config()?;
    config.history.store_type = HistoryStoreType::Jsonl;
    assert_invalid(config.validate(), "file-backed history requires path")
}

#[test]
fn sqlite_history_exposes_store_config() -> TestResult {
    let config = EngineConfig::from_toml_str(
        "[history]\ntype = \"sqlite\"\npath = \"history.db\"\nbusy_timeout_ms = 250\n",
    )
    .map_err(|err| err.to_string())?;
    let Some(sqlite) = config.history.sqlite_config() else {
        return Err("sqlite history must produce a store config".to_string());
    };
    if sqlite.path != PathBuf::from("history.db") || sqlite.busy_timeout_ms != 250 {
        return Err("sqlite store config lost its settings".to_string());
    }
    Ok(())
}

#[test]
fn enabled_resolver_requires_command() -> TestResult {
    let mut config = minimal_config()?;
    config.resolver.enabled = true;
    config.resolver.command.clear();
    assert_invalid(config.validate(), "resolver.command must have")
}

#[test]
fn enabled_resolver_runs_in_planner() -> TestResult {
    let mut config = minimal_config()?;
    config.resolver.enabled = true;
    config.validate().map_err(|err| err.to_string())?;
    if config.planner_config().skip_resolver {
        return Err("enabled resolver must not be skipped".to_string());
    }
    Ok(())
}

#[test]
fn duplicate_repository_names_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.repositories = vec![repository("billing"), repository("billing")];
    assert_invalid(config.validate(), "duplicate repository name: billing")
}

#[test]
fn empty_repository_name_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.repositories = vec![repository(" ")];
    assert_invalid(config.validate(), "repository name must be")
}

#[test]
fn repository_info_carries_inline_dependencies() -> TestResult {
    let config = EngineConfig::from_toml_str(
        "[[repositories]]\nname = \"billing\"\npath = \"../billing\"\npriority = 7\nrequirements = \"requirements.txt\"\n\n[repositories.dependencies]\nRequests = \"2.28.0\"\n",
    )
    .map_err(|err| err.to_string())?;
    let Some(entry) = config.repositories.first() else {
        return Err("expected one repository".to_string());
    };
    let info = entry.repository_info();
    if info.priority != 7 || info.dependencies.get(&PackageName::new("requests")).map(String::as_str) != Some("2.28.0") {
        return Err("repository info lost priority or dependency".to_string());
    }
    if entry.requirements_path() != Some(PathBuf::from("../billing/requirements.txt")) {
        return Err("requirements path must resolve against the repository".to_string());
    }
    Ok(())
}
