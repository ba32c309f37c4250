// crates/upgrade-guard-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for upgrade-guard-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use upgrade_guard_config::ConfigError;
use upgrade_guard_config::EngineConfig;

/// Result type for tests that report failures as strings.
pub type TestResult = Result<(), String>;

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<EngineConfig, String> {
    EngineConfig::from_toml_str("").map_err(|err| err.to_string())
}

/// Asserts that a validation result fails with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
