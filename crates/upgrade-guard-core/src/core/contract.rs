// crates/upgrade-guard-core/src/core/contract.rs
// ============================================================================
// Module: Upgrade Guard Contract Policy
// Description: Declarative dependency contract and its structural validation.
// Purpose: Carry signature, snooze, alignment, and update-window rules.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! The contract policy is an immutable value threaded into every engine
//! call. It is deserialized strictly (`deny_unknown_fields`) and then
//! validated; any structural problem is a fatal misconfiguration because no
//! trustworthy rollup can be computed without a valid policy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;

use crate::core::identifiers::PackageName;
use crate::core::source::SignatureEvidence;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default SBOM age threshold in days.
pub const DEFAULT_SBOM_MAX_AGE_DAYS: u32 = 7;
/// Default multiplier applied to a freshness threshold before blocking.
pub const DEFAULT_STALE_BLOCK_MULTIPLIER: f64 = 2.0;
/// Default contract review interval in days.
pub const DEFAULT_REVIEW_DAYS: u32 = 30;
/// Default patch update window in days.
pub const DEFAULT_UPDATE_WINDOW_DAYS: u32 = 14;
/// Default minor update window in days.
pub const DEFAULT_MINOR_UPDATE_WINDOW_DAYS: u32 = 30;
/// Default environment sync window in days.
pub const DEFAULT_SYNC_WINDOW_DAYS: u32 = 14;
/// Days before expiry at which a snooze is reported as expiring soon.
pub const SNOOZE_EXPIRING_SOON_DAYS: i64 = 3;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Structural contract policy errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The policy is structurally invalid.
    #[error("contract policy misconfigured: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Policy Document
// ============================================================================

/// Dependency contract policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractPolicy {
    /// Contract header (validation cadence).
    #[serde(default)]
    pub contract: ContractHeader,
    /// Policy rule sets.
    #[serde(default)]
    pub policies: PolicySet,
    /// Governance records (snoozes).
    #[serde(default)]
    pub governance: Governance,
    /// Environment alignment rules.
    #[serde(default)]
    pub environment_alignment: EnvironmentAlignment,
}

/// Contract header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractHeader {
    /// Free-form status label.
    #[serde(default)]
    pub status: Option<String>,
    /// Last time the contract was reviewed.
    #[serde(default, with = "crate::core::time::rfc3339_option")]
    pub last_validated: Option<OffsetDateTime>,
    /// Review interval in days.
    #[serde(default = "default_review_days")]
    pub default_review_days: u32,
}

impl Default for ContractHeader {
    fn default() -> Self {
        Self {
            status: None,
            last_validated: None,
            default_review_days: DEFAULT_REVIEW_DAYS,
        }
    }
}

/// Policy rule sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySet {
    /// Update-window and freshness rules.
    #[serde(default)]
    pub updates: UpdatePolicy,
    /// Binary wheel rules.
    #[serde(default)]
    pub wheels: WheelPolicy,
    /// Signature rules.
    #[serde(default)]
    pub signatures: SignaturePolicy,
}

/// Update-window and freshness rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePolicy {
    /// Maximum SBOM/metadata age in days before the contract is stale.
    #[serde(default = "default_sbom_max_age_days")]
    pub sbom_max_age_days: u32,
    /// Threshold multiplier past which staleness blocks.
    #[serde(default = "default_stale_block_multiplier")]
    pub stale_block_multiplier: f64,
    /// Days a pending patch update may wait.
    #[serde(default = "default_update_window_days")]
    pub default_update_window_days: u32,
    /// Days a pending minor update may wait.
    #[serde(default = "default_minor_update_window_days")]
    pub minor_update_window_days: u32,
    /// Major upgrades require human review.
    #[serde(default = "default_true")]
    pub major_review_required: bool,
    /// Whether transitive constraint conflicts are tolerated.
    #[serde(default)]
    pub allow_transitive_conflicts: bool,
    /// Whether pre-releases count as "latest".
    #[serde(default)]
    pub allow_prerelease: bool,
    /// Per-package overrides.
    #[serde(default)]
    pub package_overrides: Vec<PackageOverride>,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            sbom_max_age_days: DEFAULT_SBOM_MAX_AGE_DAYS,
            stale_block_multiplier: DEFAULT_STALE_BLOCK_MULTIPLIER,
            default_update_window_days: DEFAULT_UPDATE_WINDOW_DAYS,
            minor_update_window_days: DEFAULT_MINOR_UPDATE_WINDOW_DAYS,
            major_review_required: true,
            allow_transitive_conflicts: false,
            allow_prerelease: false,
            package_overrides: Vec::new(),
        }
    }
}

/// Per-package update override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageOverride {
    /// Package the override applies to.
    pub name: PackageName,
    /// Pin the package to its current major version.
    #[serde(default)]
    pub stay_on_major: bool,
    /// Package-specific pre-release allowance.
    #[serde(default)]
    pub allow_prerelease: Option<bool>,
}

/// Binary wheel rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WheelPolicy {
    /// Every package must ship binary artifacts for all targets.
    #[serde(default)]
    pub binary_required: bool,
    /// Packages allowed to build from source distributions.
    #[serde(default)]
    pub allow_sdist: Vec<PackageName>,
}

/// Signature rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignaturePolicy {
    /// Signatures are required.
    #[serde(default)]
    pub required: bool,
    /// Publishers whose signatures are accepted (empty accepts any verified
    /// signature).
    #[serde(default)]
    pub trusted_publishers: Vec<String>,
    /// Packages the requirement applies to (empty applies to all).
    #[serde(default)]
    pub enforced_packages: Vec<PackageName>,
    /// Days after `effective_from` before enforcement starts.
    #[serde(default)]
    pub grace_period_days: u32,
    /// Start of the signature requirement.
    #[serde(default, with = "crate::core::time::rfc3339_option")]
    pub effective_from: Option<OffsetDateTime>,
}

/// Governance records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Governance {
    /// Issue snoozes.
    #[serde(default)]
    pub snoozes: Vec<Snooze>,
}

/// Time-boxed suppression of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snooze {
    /// Snooze identifier.
    pub id: String,
    /// Package the snooze covers.
    pub package: PackageName,
    /// Issue identifier; `None` covers every issue on the package.
    #[serde(default)]
    pub issue: Option<String>,
    /// Justification.
    pub reason: String,
    /// Expiry; a snooze without expiry is never active.
    #[serde(default, with = "crate::core::time::rfc3339_option")]
    pub expires_at: Option<OffsetDateTime>,
    /// Who asked for the snooze.
    #[serde(default)]
    pub requested_by: Option<String>,
    /// Who approved the snooze.
    #[serde(default)]
    pub approver: Option<String>,
}

/// Evaluated state of a snooze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnoozeStatus {
    /// Active with more than the warning window remaining.
    Active,
    /// Active and expiring within the warning window.
    ExpiringSoon,
    /// Past its expiry.
    Expired,
    /// No expiry recorded.
    Unknown,
}

impl SnoozeStatus {
    /// Returns true when the snooze currently suppresses its issue.
    #[must_use]
    pub const fn suppresses(self) -> bool {
        matches!(self, Self::Active | Self::ExpiringSoon)
    }
}

impl fmt::Display for SnoozeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::ExpiringSoon => "expiring-soon",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        })
    }
}

impl Snooze {
    /// Evaluates the snooze at `now`.
    #[must_use]
    pub fn status(&self, now: OffsetDateTime) -> SnoozeStatus {
        let Some(expires_at) = self.expires_at else {
            return SnoozeStatus::Unknown;
        };
        if expires_at <= now {
            SnoozeStatus::Expired
        } else if expires_at - now <= Duration::days(SNOOZE_EXPIRING_SOON_DAYS) {
            SnoozeStatus::ExpiringSoon
        } else {
            SnoozeStatus::Active
        }
    }

    /// Returns true when the snooze covers `issue_id` on `package`.
    #[must_use]
    pub fn covers(&self, package: &PackageName, issue_id: &str) -> bool {
        &self.package == package
            && self.issue.as_deref().is_none_or(|issue| issue.eq_ignore_ascii_case(issue_id))
    }
}

/// Environment alignment rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentAlignment {
    /// Sync window applied when an environment sets none.
    #[serde(default = "default_sync_window_days")]
    pub default_sync_window_days: u32,
    /// Tracked environments.
    #[serde(default)]
    pub environments: Vec<EnvironmentRule>,
}

impl Default for EnvironmentAlignment {
    fn default() -> Self {
        Self {
            default_sync_window_days: DEFAULT_SYNC_WINDOW_DAYS,
            environments: Vec::new(),
        }
    }
}

/// One tracked deployment environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentRule {
    /// Environment name.
    pub name: String,
    /// Dependency profiles installed in the environment.
    #[serde(default)]
    pub profiles: Vec<String>,
    /// Lockfiles the environment is built from.
    #[serde(default)]
    pub lockfiles: Vec<String>,
    /// Last time the environment was synced with the lockfiles.
    #[serde(default, with = "crate::core::time::rfc3339_option")]
    pub last_synced: Option<OffsetDateTime>,
    /// Environment-specific sync window.
    #[serde(default)]
    pub sync_window_days: Option<u32>,
}

// ============================================================================
// SECTION: Policy Queries
// ============================================================================

impl ContractPolicy {
    /// Validates structural constraints.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Invalid`] when thresholds are zero or
    /// non-finite, the staleness multiplier is below one, a snooze lacks an
    /// identifier, package, or reason, or an environment lacks a name.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let updates = &self.policies.updates;
        if updates.sbom_max_age_days == 0 {
            return Err(PolicyError::Invalid("sbom_max_age_days must be greater than zero".into()));
        }
        if !updates.stale_block_multiplier.is_finite() || updates.stale_block_multiplier < 1.0 {
            return Err(PolicyError::Invalid(
                "stale_block_multiplier must be a finite value >= 1.0".into(),
            ));
        }
        if self.contract.default_review_days == 0 {
            return Err(PolicyError::Invalid(
                "default_review_days must be greater than zero".into(),
            ));
        }
        if self.environment_alignment.default_sync_window_days == 0 {
            return Err(PolicyError::Invalid(
                "default_sync_window_days must be greater than zero".into(),
            ));
        }
        for override_rule in &updates.package_overrides {
            if override_rule.name.is_empty() {
                return Err(PolicyError::Invalid("package override requires a name".into()));
            }
        }
        for snooze in &self.governance.snoozes {
            if snooze.id.trim().is_empty() {
                return Err(PolicyError::Invalid("snooze requires an id".into()));
            }
            if snooze.package.is_empty() {
                return Err(PolicyError::Invalid(format!("snooze {} requires a package", snooze.id)));
            }
            if snooze.reason.trim().is_empty() {
                return Err(PolicyError::Invalid(format!("snooze {} requires a reason", snooze.id)));
            }
        }
        for environment in &self.environment_alignment.environments {
            if environment.name.trim().is_empty() {
                return Err(PolicyError::Invalid("environment requires a name".into()));
            }
            if environment.sync_window_days == Some(0) {
                return Err(PolicyError::Invalid(format!(
                    "environment {} sync_window_days must be greater than zero",
                    environment.name
                )));
            }
        }
        Ok(())
    }

    /// Returns the override for a package, if any.
    #[must_use]
    pub fn package_override(&self, name: &PackageName) -> Option<&PackageOverride> {
        self.policies.updates.package_overrides.iter().find(|rule| &rule.name == name)
    }

    /// Returns true when the package is pinned to its current major.
    #[must_use]
    pub fn stays_on_major(&self, name: &PackageName) -> bool {
        self.package_override(name).is_some_and(|rule| rule.stay_on_major)
    }

    /// Returns true when pre-releases count as "latest" for the package.
    #[must_use]
    pub fn allows_prerelease(&self, name: &PackageName) -> bool {
        self.package_override(name)
            .and_then(|rule| rule.allow_prerelease)
            .unwrap_or(self.policies.updates.allow_prerelease)
    }

    /// Returns true when binary artifacts are mandatory for the package.
    #[must_use]
    pub fn requires_binary(&self, name: &PackageName) -> bool {
        let wheels = &self.policies.wheels;
        wheels.binary_required && !wheels.allow_sdist.contains(name)
    }

    /// Returns true when a signature is enforced for the package at `now`.
    #[must_use]
    pub fn signature_required_for(&self, name: &PackageName, now: OffsetDateTime) -> bool {
        let signatures = &self.policies.signatures;
        if !signatures.required {
            return false;
        }
        if !signatures.enforced_packages.is_empty() && !signatures.enforced_packages.contains(name) {
            return false;
        }
        signatures.effective_from.is_none_or(|start| {
            now >= start + Duration::days(i64::from(signatures.grace_period_days))
        })
    }

    /// Returns true when the evidence satisfies the signature policy.
    #[must_use]
    pub fn signature_trusted(&self, evidence: Option<&SignatureEvidence>) -> bool {
        let Some(evidence) = evidence.filter(|evidence| evidence.verified) else {
            return false;
        };
        let trusted = &self.policies.signatures.trusted_publishers;
        trusted.is_empty()
            || evidence.publisher.as_deref().is_some_and(|publisher| {
                trusted.iter().any(|candidate| candidate.eq_ignore_ascii_case(publisher))
            })
    }

    /// Returns the first snooze covering the issue.
    #[must_use]
    pub fn snooze_for(&self, package: &PackageName, issue_id: &str) -> Option<&Snooze> {
        self.governance.snoozes.iter().find(|snooze| snooze.covers(package, issue_id))
    }

    /// Returns the freshness block threshold in days for a base threshold.
    #[must_use]
    pub fn block_threshold_days(&self, threshold_days: u32) -> f64 {
        f64::from(threshold_days) * self.policies.updates.stale_block_multiplier
    }
}

// ============================================================================
// SECTION: Serde Defaults
// ============================================================================

/// Default review interval.
const fn default_review_days() -> u32 {
    DEFAULT_REVIEW_DAYS
}

/// Default SBOM age threshold.
const fn default_sbom_max_age_days() -> u32 {
    DEFAULT_SBOM_MAX_AGE_DAYS
}

/// Default staleness multiplier.
const fn default_stale_block_multiplier() -> f64 {
    DEFAULT_STALE_BLOCK_MULTIPLIER
}

/// Default patch window.
const fn default_update_window_days() -> u32 {
    DEFAULT_UPDATE_WINDOW_DAYS
}

/// Default minor window.
const fn default_minor_update_window_days() -> u32 {
    DEFAULT_MINOR_UPDATE_WINDOW_DAYS
}

/// Default environment sync window.
const fn default_sync_window_days() -> u32 {
    DEFAULT_SYNC_WINDOW_DAYS
}

/// Serde helper returning `true`.
const fn default_true() -> bool {
    true
}
