// crates/upgrade-guard-config/src/contract.rs
// ============================================================================
// Module: Contract Policy Loading
// Description: Reads the TOML contract policy into a SourceInput and policy.
// Purpose: Separate missing or unreadable contracts from misconfigured ones.
// Dependencies: upgrade-guard-core, toml
// ============================================================================

//! ## Overview
//! The contract policy is both an input source and the rule set the guard
//! applies. Loading never fails for an absent or unreadable file: those are
//! recorded on the returned [`SourceInput`] and the default policy applies.
//! A file that reads but does not parse or validate is a fatal
//! misconfiguration and is returned as [`ConfigError::Invalid`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use upgrade_guard_core::ContractPolicy;
use upgrade_guard_core::GuardError;
use upgrade_guard_core::HashDigest;
use upgrade_guard_core::SourceInput;
use upgrade_guard_core::SourceKind;

use crate::config::ConfigError;
use crate::config::MAX_CONFIG_FILE_SIZE;
use crate::config::validate_path;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of loading the contract policy.
#[derive(Debug, Clone)]
pub struct ContractLoad {
    /// Source record for the contract input.
    pub source: SourceInput,
    /// Policy in force for this run.
    pub policy: ContractPolicy,
    /// Raw bytes when the file was read.
    pub raw: Option<Vec<u8>>,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads the contract policy from `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the file reads but is not a valid
/// contract policy.
pub fn load_contract(path: Option<&Path>) -> Result<ContractLoad, ConfigError> {
    let Some(path) = path else {
        return Ok(fallback(SourceInput::missing(
            SourceKind::Contract,
            None,
            "no contract path configured",
        )));
    };
    let raw_path = Some(path.display().to_string());
    if let Err(err) = validate_path(path) {
        return Ok(fallback(SourceInput::error(SourceKind::Contract, raw_path, err.to_string())));
    }
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Ok(fallback(SourceInput::missing(
                SourceKind::Contract,
                raw_path,
                "contract file not found",
            )));
        }
        Err(err) => {
            return Ok(fallback(SourceInput::error(
                SourceKind::Contract,
                raw_path,
                format!("contract unreadable: {err}"),
            )));
        }
    };
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Ok(fallback(SourceInput::error(
            SourceKind::Contract,
            raw_path,
            "contract file exceeds size limit",
        )));
    }
    let Ok(text) = std::str::from_utf8(&bytes) else {
        return Ok(fallback(SourceInput::error(
            SourceKind::Contract,
            raw_path,
            "contract file must be utf-8",
        )));
    };
    let policy = parse_contract(text)?;
    let mut source = SourceInput::ok(SourceKind::Contract, raw_path);
    source.generated_at = policy.contract.last_validated;
    source.digest = Some(HashDigest::of_bytes(&bytes));
    Ok(ContractLoad {
        source,
        policy,
        raw: Some(bytes),
    })
}

/// Parses and validates a contract policy from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] carrying the policy misconfiguration.
pub fn parse_contract(text: &str) -> Result<ContractPolicy, ConfigError> {
    let policy: ContractPolicy = toml::from_str(text).map_err(|err| misconfigured(&err.to_string()))?;
    policy
        .validate()
        .map_err(|err| ConfigError::Invalid(GuardError::from(err).to_string()))?;
    Ok(policy)
}

/// Builds a load result carrying the default policy.
fn fallback(source: SourceInput) -> ContractLoad {
    ContractLoad {
        source,
        policy: ContractPolicy::default(),
        raw: None,
    }
}

/// Wraps a parse failure as a policy misconfiguration.
fn misconfigured(detail: &str) -> ConfigError {
    ConfigError::Invalid(GuardError::PolicyMisconfigured(format!("contract parse error: {detail}")).to_string())
}
