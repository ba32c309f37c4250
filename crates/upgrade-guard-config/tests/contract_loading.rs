//! Contract policy loading tests for upgrade-guard-config.
// crates/upgrade-guard-config/tests/contract_loading.rs
// =============================================================================
// Module: Contract Loading Tests
// Description: Validate contract source states and policy misconfiguration.
// Purpose: Ensure absent contracts degrade and malformed ones fail closed.
// =============================================================================

use std::fs;

use tempfile::TempDir;
use upgrade_guard_config::contract_toml_example;
use upgrade_guard_config::load_contract;
use upgrade_guard_config::parse_contract;
use upgrade_guard_core::ContractPolicy;
use upgrade_guard_core::PackageName;
use upgrade_guard_core::SourceState;
use upgrade_guard_core::time::parse_timestamp;

mod common;

use common::TestResult;
use common::assert_invalid;

#[test]
fn example_contract_parses() -> TestResult {
    let policy = parse_contract(&contract_toml_example()).map_err(|err| err.to_string())?;
    if !policy.stays_on_major(&PackageName::new("Django")) {
        return Err("django override must pin the major version".to_string());
    }
    if !policy.policies.wheels.binary_required || policy.governance.snoozes.len() != 1 {
        return Err("wheel policy or snoozes lost".to_string());
    }
    if policy.policies.signatures.effective_from != parse_timestamp("2026-01-01") {
        return Err("bare effective_from date must parse as midnight UTC".to_string());
    }
    Ok(())
}

#[test]
fn absent_path_is_missing_with_default_policy() -> TestResult {
    let load = load_contract(None).map_err(|err| err.to_string())?;
    if load.source.state != SourceState::Missing || load.policy != ContractPolicy::default() {
        return Err("absent contract must be missing with the default policy".to_string());
    }
    Ok(())
}

#[test]
fn absent_file_is_missing() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let load = load_contract(Some(&dir.path().join("contract.toml"))).map_err(|err| err.to_string())?;
    if load.source.state != SourceState::Missing || load.raw.is_some() {
        return Err("absent contract file must be missing".to_string());
    }
    Ok(())
}

#[test]
fn unreadable_contract_is_error_state() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let load = load_contract(Some(dir.path())).map_err(|err| err.to_string())?;
    if load.source.state != SourceState::Error || load.source.diagnostic.is_none() {
        return Err("directory contract path must be an error state".to_string());
    }
    Ok(())
}

#[test]
fn non_utf8_contract_is_error_state() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("contract.toml");
    fs::write(&path, [0xFF, 0xFE]).map_err(|err| err.to_string())?;
    let load = load_contract(Some(&path)).map_err(|err| err.to_string())?;
    if load.source.state != SourceState::Error {
        return Err("non-utf8 contract must be an error state".to_string());
    }
    Ok(())
}

#[test]
fn valid_contract_carries_digest_and_validation_time() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("contract.toml");
    fs::write(&path, contract_toml_example()).map_err(|err| err.to_string())?;
    let load = load_contract(Some(&path)).map_err(|err| err.to_string())?;
    if load.source.state != SourceState::Ok || load.source.digest.is_none() {
        return Err("valid contract must be ok with a digest".to_string());
    }
    if load.source.generated_at != parse_timestamp("2026-01-01T00:00:00Z") {
        return Err("contract source must carry last_validated".to_string());
    }
    Ok(())
}

#[test]
fn malformed_contract_is_misconfigured() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("contract.toml");
    fs::write(&path, "[policies.updates]\nsbom_max_age_days = \"seven\"\n").map_err(|err| err.to_string())?;
    assert_invalid(load_contract(Some(&path)), "policy misconfigured")
}

#[test]
fn multiplier_below_one_is_misconfigured() -> TestResult {
    assert_invalid(
        parse_contract("[policies.updates]\nstale_block_multiplier = 0.5\n"),
        "stale_block_multiplier must be a finite value >= 1.0",
    )
}

#[test]
fn snooze_without_package_is_misconfigured() -> TestResult {
    assert_invalid(
        parse_contract("[[governance.snoozes]]\nid = \"SNZ-1\"\nreason = \"pending\"\n"),
        "policy misconfigured",
    )
}

#[test]
fn unparseable_timestamp_is_misconfigured() -> TestResult {
    assert_invalid(parse_contract("[contract]\nlast_validated = \"last tuesday\"\n"), "policy misconfigured")
}
