// crates/upgrade-guard-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical examples for the engine configuration and the contract policy.
//! Both parse and validate with the loaders in this crate.

/// Returns a canonical example `upgrade-guard.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[sources]
root = "reports"
preflight = "preflight.json"
update_bot = "dependabot.json"
vulnerability_feed = "osv.json"
sbom = "sbom.json"
metadata = "metadata.json"
contract = "dependency-contract.toml"
timeout_ms = 10000

[guard]
mandatory_sources = ["contract"]
exit_unknown = 3

[planner]
top_n = 10
max_batch_size = 10
allow_major = true
command_prefix = "pip install --upgrade"
half_life_days = 30.0

[planner.weights]
recency = 3.0
inverse_severity = 5.0
contract = 4.0
historical_success = 2.0
test_coverage = 1.0

[predictor]
safe_below = 0.3
blocked_above = 0.7

[rollback]
window_seconds = 3600
critical_weight = 0.6
warning_weight = 0.35

[snapshots]
enabled = true
root = "snapshots"
tag = "nightly"
retention_days = 30
retain_latest = 5

[history]
type = "sqlite"
path = "upgrade-guard-history.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[resolver]
enabled = true
command = ["pip", "install", "--dry-run", "--quiet"]
timeout_ms = 60000

[audit]
enabled = true
path = "upgrade-guard-audit.jsonl"

[[repositories]]
name = "billing"
path = "../billing"
priority = 10
requirements = "requirements.txt"

[[repositories]]
name = "search"
path = "../search"

[repositories.dependencies]
requests = "2.31.0"
"#,
    )
}

/// Returns a canonical example contract policy document.
#[must_use]
pub fn contract_toml_example() -> String {
    String::from(
        r#"[contract]
last_validated = "2026-01-01T00:00:00Z"
default_review_days = 30

[policies.updates]
sbom_max_age_days = 7
stale_block_multiplier = 2.0
default_update_window_days = 14
minor_update_window_days = 30
major_review_required = true
allow_transitive_conflicts = false
allow_prerelease = false

[[policies.updates.package_overrides]]
name = "django"
stay_on_major = true

[policies.wheels]
binary_required = true
allow_sdist = []

[policies.signatures]
required = true
trusted_publishers = ["pypi-publisher"]
enforced_packages = []
grace_period_days = 0
effective_from = "2026-01-01"

[[governance.snoozes]]
id = "SNZ-1"
package = "urllib3"
issue = "CVE-2026-0001"
reason = "vendor patch pending"
expires_at = "2026-12-01T00:00:00Z"

[environment_alignment]
default_sync_window_days = 14

[[environment_alignment.environments]]
name = "prod"
last_synced = "2026-10-01T00:00:00Z"
"#,
    )
}
