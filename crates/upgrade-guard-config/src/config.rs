// crates/upgrade-guard-config/src/config.rs
// ============================================================================
// Module: Upgrade Guard Configuration
// Description: Engine configuration loading and validation.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: upgrade-guard-core, upgrade-guard-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section maps onto the immutable configuration value of one engine
//! or host collaborator. Missing sections take their defaults; unknown keys,
//! out-of-range values, and invalid engine settings fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use upgrade_guard_core::DEFAULT_EXIT_UNKNOWN;
use upgrade_guard_core::EXIT_BLOCKED;
use upgrade_guard_core::EXIT_NEEDS_REVIEW;
use upgrade_guard_core::EXIT_SAFE;
use upgrade_guard_core::GuardConfig;
use upgrade_guard_core::PlannerConfig;
use upgrade_guard_core::PredictorConfig;
use upgrade_guard_core::RepositoryInfo;
use upgrade_guard_core::RetentionPolicy;
use upgrade_guard_core::RollbackConfig;
use upgrade_guard_core::SourceKind;
use upgrade_guard_core::runtime::PlannerWeights;
use upgrade_guard_core::runtime::RiskModelWeights;
use upgrade_guard_core::snapshot::DEFAULT_RETAIN_LATEST;
use upgrade_guard_core::snapshot::DEFAULT_RETENTION_DAYS;
use upgrade_guard_store_sqlite::SqliteStoreConfig;
use upgrade_guard_store_sqlite::SqliteStoreMode;
use upgrade_guard_store_sqlite::SqliteSyncMode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "upgrade-guard.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "UPGRADE_GUARD_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default per-source fetch timeout in milliseconds.
const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 10_000;
/// Minimum per-source fetch timeout in milliseconds.
const MIN_SOURCE_TIMEOUT_MS: u64 = 100;
/// Maximum per-source fetch timeout in milliseconds.
const MAX_SOURCE_TIMEOUT_MS: u64 = 300_000;
/// Default maximum raw source payload size in bytes.
const DEFAULT_MAX_SOURCE_BYTES: usize = 16 * 1024 * 1024;
/// Largest raw source payload size that may be configured.
const MAX_SOURCE_BYTES_LIMIT: usize = 256 * 1024 * 1024;
/// Default snapshot root directory.
const DEFAULT_SNAPSHOT_ROOT: &str = "snapshots";
/// Maximum snapshot tag length.
const MAX_TAG_LENGTH: usize = 64;
/// Maximum snapshot retention in days.
const MAX_RETENTION_DAYS: u32 = 36_500;
/// Default resolver dry-run timeout in milliseconds.
const DEFAULT_RESOLVER_TIMEOUT_MS: u64 = 60_000;
/// Maximum resolver dry-run timeout in milliseconds.
const MAX_RESOLVER_TIMEOUT_MS: u64 = 600_000;
/// Maximum number of resolver command arguments.
const MAX_RESOLVER_ARGS: usize = 32;
/// Maximum number of registered repositories.
const MAX_REPOSITORIES: usize = 256;
/// Maximum repository name length.
const MAX_REPOSITORY_NAME_LENGTH: usize = 128;
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Largest planner `top_n`.
const MAX_TOP_N: usize = 1_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Upgrade Guard engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Input source locations and fetch limits.
    pub sources: SourcesConfig,
    /// Guard settings.
    pub guard: GuardSection,
    /// Upgrade planner settings.
    pub planner: PlannerSection,
    /// Risk predictor settings.
    pub predictor: PredictorSection,
    /// Rollback engine settings.
    pub rollback: RollbackSection,
    /// Snapshot writer and retention settings.
    pub snapshots: SnapshotConfig,
    /// Historical-outcome store settings.
    pub history: HistoryConfig,
    /// Dry-run resolver settings.
    pub resolver: ResolverConfig,
    /// Audit log settings.
    pub audit: AuditConfig,
    /// Repositories for cross-repo coordination.
    pub repositories: Vec<RepositoryConfig>,
}

impl EngineConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// explicit path, then `UPGRADE_GUARD_CONFIG`, then
    /// `upgrade-guard.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sources.validate()?;
        self.guard.validate()?;
        self.planner_config().validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        self.predictor_config().validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        self.rollback_config().validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if self.planner.top_n > MAX_TOP_N {
            return Err(ConfigError::Invalid(format!("planner.top_n must be at most {MAX_TOP_N}")));
        }
        self.snapshots.validate()?;
        self.history.validate()?;
        self.resolver.validate()?;
        self.audit.validate()?;
        validate_repositories(&self.repositories)
    }

    /// Returns the guard configuration.
    #[must_use]
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            mandatory_sources: self.guard.mandatory_sources.clone(),
        }
    }

    /// Returns the planner configuration.
    #[must_use]
    pub fn planner_config(&self) -> PlannerConfig {
        let planner = &self.planner;
        PlannerConfig {
            weights: planner.weights.into(),
            top_n: planner.top_n,
            max_batch_size: planner.max_batch_size,
            allow_major: planner.allow_major,
            skip_resolver: planner.skip_resolver || !self.resolver.enabled,
            command_prefix: planner.command_prefix.clone(),
            half_life_days: planner.half_life_days,
        }
    }

    /// Returns the predictor configuration.
    #[must_use]
    pub fn predictor_config(&self) -> PredictorConfig {
        let predictor = &self.predictor;
        PredictorConfig {
            weights: predictor.weights.into(),
            safe_below: predictor.safe_below,
            blocked_above: predictor.blocked_above,
            half_life_days: predictor.half_life_days,
            confidence_base: predictor.confidence_base,
            confidence_step: predictor.confidence_step,
        }
    }

    /// Returns the rollback configuration.
    #[must_use]
    pub const fn rollback_config(&self) -> RollbackConfig {
        RollbackConfig {
            window_seconds: self.rollback.window_seconds,
            critical_weight: self.rollback.critical_weight,
            warning_weight: self.rollback.warning_weight,
        }
    }

    /// Returns the snapshot retention policy.
    #[must_use]
    pub const fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            retention_days: self.snapshots.retention_days,
            retain_latest: self.snapshots.retain_latest,
        }
    }
}

// ============================================================================
// SECTION: Sources
// ============================================================================

/// Input source locations.
///
/// # Invariants
/// - Relative source paths resolve against `root` when it is set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    /// Base directory for relative source paths.
    pub root: Option<PathBuf>,
    /// Preflight report path.
    pub preflight: Option<PathBuf>,
    /// Update-bot export path.
    pub update_bot: Option<PathBuf>,
    /// Vulnerability feed export path.
    pub vulnerability_feed: Option<PathBuf>,
    /// SBOM export path.
    pub sbom: Option<PathBuf>,
    /// Metadata snapshot path.
    pub metadata: Option<PathBuf>,
    /// Contract policy path.
    pub contract: Option<PathBuf>,
    /// Per-source fetch timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum raw payload size in bytes.
    pub max_bytes: usize,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            root: None,
            preflight: None,
            update_bot: None,
            vulnerability_feed: None,
            sbom: None,
            metadata: None,
            contract: None,
            timeout_ms: DEFAULT_SOURCE_TIMEOUT_MS,
            max_bytes: DEFAULT_MAX_SOURCE_BYTES,
        }
    }
}

impl SourcesConfig {
    /// Returns the configured path for a source, resolved against `root`.
    #[must_use]
    pub fn path_for(&self, kind: SourceKind) -> Option<PathBuf> {
        let path = match kind {
            SourceKind::Preflight => self.preflight.as_ref(),
            SourceKind::UpdateBot => self.update_bot.as_ref(),
            SourceKind::VulnerabilityFeed => self.vulnerability_feed.as_ref(),
            SourceKind::Sbom => self.sbom.as_ref(),
            SourceKind::Metadata => self.metadata.as_ref(),
            SourceKind::Contract => self.contract.as_ref(),
        }?;
        match &self.root {
            Some(root) if path.is_relative() => Some(root.join(path)),
            _ => Some(path.clone()),
        }
    }

    /// Validates source configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(root) = &self.root {
            validate_path_field("sources.root", root)?;
        }
        for kind in SourceKind::ALL {
            if let Some(path) = self.path_for(kind) {
                validate_path_field(&format!("sources.{}", kind.as_str()), &path)?;
            }
        }
        if !(MIN_SOURCE_TIMEOUT_MS..=MAX_SOURCE_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "sources.timeout_ms must be between {MIN_SOURCE_TIMEOUT_MS} and {MAX_SOURCE_TIMEOUT_MS}"
            )));
        }
        if self.max_bytes == 0 || self.max_bytes > MAX_SOURCE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "sources.max_bytes must be between 1 and {MAX_SOURCE_BYTES_LIMIT}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Engines
// ============================================================================

/// Guard section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardSection {
    /// Sources whose `error` state makes the rollup `unknown`.
    pub mandatory_sources: Vec<SourceKind>,
    /// Exit code reported for an `unknown` rollup.
    pub exit_unknown: i32,
}

impl Default for GuardSection {
    fn default() -> Self {
        Self {
            mandatory_sources: GuardConfig::default().mandatory_sources,
            exit_unknown: DEFAULT_EXIT_UNKNOWN,
        }
    }
}

impl GuardSection {
    /// Validates guard configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if [EXIT_SAFE, EXIT_NEEDS_REVIEW, EXIT_BLOCKED].contains(&self.exit_unknown) {
            return Err(ConfigError::Invalid(
                "guard.exit_unknown must differ from the safe, needs-review, and blocked codes"
                    .to_string(),
            ));
        }
        if !(0..=255).contains(&self.exit_unknown) {
            return Err(ConfigError::Invalid("guard.exit_unknown must be within 0..=255".to_string()));
        }
        let unique: BTreeSet<SourceKind> = self.mandatory_sources.iter().copied().collect();
        if unique.len() != self.mandatory_sources.len() {
            return Err(ConfigError::Invalid("guard.mandatory_sources contains duplicates".to_string()));
        }
        Ok(())
    }
}

/// Planner factor weights.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerWeightsSection {
    /// Recency weight.
    pub recency: f64,
    /// Inverse severity weight.
    pub inverse_severity: f64,
    /// Contract allowance weight.
    pub contract: f64,
    /// Historical success weight.
    pub historical_success: f64,
    /// Test coverage weight.
    pub test_coverage: f64,
}

impl Default for PlannerWeightsSection {
    fn default() -> Self {
        let weights = PlannerWeights::default();
        Self {
            recency: weights.recency,
            inverse_severity: weights.inverse_severity,
            contract: weights.contract,
            historical_success: weights.historical_success,
            test_coverage: weights.test_coverage,
        }
    }
}

impl From<PlannerWeightsSection> for PlannerWeights {
    fn from(section: PlannerWeightsSection) -> Self {
        Self {
            recency: section.recency,
            inverse_severity: section.inverse_severity,
            contract: section.contract,
            historical_success: section.historical_success,
            test_coverage: section.test_coverage,
        }
    }
}

/// Planner section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerSection {
    /// Factor weights.
    pub weights: PlannerWeightsSection,
    /// Number of candidates validated by the resolver.
    pub top_n: usize,
    /// Maximum packages per batched command.
    pub max_batch_size: usize,
    /// Allows major-version candidates.
    pub allow_major: bool,
    /// Disables resolver validation.
    pub skip_resolver: bool,
    /// Prefix of recommended update commands.
    pub command_prefix: String,
    /// Outcome decay half-life in days.
    pub half_life_days: f64,
}

impl Default for PlannerSection {
    fn default() -> Self {
        let defaults = PlannerConfig::default();
        Self {
            weights: PlannerWeightsSection::default(),
            top_n: defaults.top_n,
            max_batch_size: defaults.max_batch_size,
            allow_major: defaults.allow_major,
            skip_resolver: defaults.skip_resolver,
            command_prefix: defaults.command_prefix,
            half_life_days: defaults.half_life_days,
        }
    }
}

/// Risk model weights.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskWeightsSection {
    /// Base risk.
    pub base: f64,
    /// Major version change.
    pub major: f64,
    /// Minor version change.
    pub minor: f64,
    /// Patch version change.
    pub patch: f64,
    /// Breaking change.
    pub breaking: f64,
    /// Security fix.
    pub security: f64,
    /// Recently released target.
    pub recent_activity: f64,
    /// Long-unreleased target.
    pub stale: f64,
    /// Unpopular package.
    pub unpopularity: f64,
    /// No test coverage.
    pub no_test_coverage: f64,
    /// Transitive dependency.
    pub transitive: f64,
    /// Many dependents.
    pub high_dependency_count: f64,
    /// Historical failure rate.
    pub historical_failure: f64,
}

impl Default for RiskWeightsSection {
    fn default() -> Self {
        let weights = RiskModelWeights::default();
        Self {
            base: weights.base,
            major: weights.major,
            minor: weights.minor,
            patch: weights.patch,
            breaking: weights.breaking,
            security: weights.security,
            recent_activity: weights.recent_activity,
            stale: weights.stale,
            unpopularity: weights.unpopularity,
            no_test_coverage: weights.no_test_coverage,
            transitive: weights.transitive,
            high_dependency_count: weights.high_dependency_count,
            historical_failure: weights.historical_failure,
        }
    }
}

impl From<RiskWeightsSection> for RiskModelWeights {
    fn from(section: RiskWeightsSection) -> Self {
        Self {
            base: section.base,
            major: section.major,
            minor: section.minor,
            patch: section.patch,
            breaking: section.breaking,
            security: section.security,
            recent_activity: section.recent_activity,
            stale: section.stale,
            unpopularity: section.unpopularity,
            no_test_coverage: section.no_test_coverage,
            transitive: section.transitive,
            high_dependency_count: section.high_dependency_count,
            historical_failure: section.historical_failure,
        }
    }
}

/// Predictor section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredictorSection {
    /// Feature weights.
    pub weights: RiskWeightsSection,
    /// Scores below this are safe.
    pub safe_below: f64,
    /// Scores above this are blocked.
    pub blocked_above: f64,
    /// Outcome emphasis half-life in days.
    pub half_life_days: f64,
    /// Confidence with no history.
    pub confidence_base: f64,
    /// Confidence gained per outcome.
    pub confidence_step: f64,
}

impl Default for PredictorSection {
    fn default() -> Self {
        let defaults = PredictorConfig::default();
        Self {
            weights: RiskWeightsSection::default(),
            safe_below: defaults.safe_below,
            blocked_above: defaults.blocked_above,
            half_life_days: defaults.half_life_days,
            confidence_base: defaults.confidence_base,
            confidence_step: defaults.confidence_step,
        }
    }
}

/// Rollback section.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RollbackSection {
    /// Correlation window in seconds.
    pub window_seconds: u32,
    /// Confidence weight of a critical breach.
    pub critical_weight: f64,
    /// Confidence weight of a warning breach.
    pub warning_weight: f64,
}

impl Default for RollbackSection {
    fn default() -> Self {
        let defaults = RollbackConfig::default();
        Self {
            window_seconds: defaults.window_seconds,
            critical_weight: defaults.critical_weight,
            warning_weight: defaults.warning_weight,
        }
    }
}

// ============================================================================
// SECTION: Host Collaborators
// ============================================================================

/// Snapshot writer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotConfig {
    /// Writes snapshots when true.
    pub enabled: bool,
    /// Snapshot root directory.
    pub root: PathBuf,
    /// Optional tag embedded in run ids.
    pub tag: Option<String>,
    /// Snapshots older than this many days are pruned.
    pub retention_days: u32,
    /// The newest snapshots always kept.
    pub retain_latest: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from(DEFAULT_SNAPSHOT_ROOT),
            tag: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            retain_latest: DEFAULT_RETAIN_LATEST,
        }
    }
}

impl SnapshotConfig {
    /// Validates snapshot configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_field("snapshots.root", &self.root)?;
        if let Some(tag) = &self.tag {
            let trimmed = tag.trim();
            if trimmed.is_empty() || trimmed.len() > MAX_TAG_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "snapshots.tag must be 1..={MAX_TAG_LENGTH} characters"
                )));
            }
        }
        if self.retention_days == 0 {
            return Err(ConfigError::Invalid(
                "snapshots.retention_days must be greater than zero".to_string(),
            ));
        }
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid(format!(
                "snapshots.retention_days must be at most {MAX_RETENTION_DAYS}"
            )));
        }
        Ok(())
    }
}

/// Historical-outcome store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStoreType {
    /// In-memory log discarded at exit.
    #[default]
    Memory,
    /// Append-only JSON lines file.
    Jsonl,
    /// `SQLite` database.
    Sqlite,
}

/// Historical-outcome store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Store backend type.
    #[serde(rename = "type")]
    pub store_type: HistoryStoreType,
    /// File path for the jsonl and sqlite backends.
    pub path: Option<PathBuf>,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    pub sync_mode: SqliteSyncMode,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            store_type: HistoryStoreType::default(),
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl HistoryConfig {
    /// Returns the `SQLite` store configuration for the sqlite backend.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        if self.store_type != HistoryStoreType::Sqlite {
            return None;
        }
        self.path.as_ref().map(|path| SqliteStoreConfig {
            path: path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        })
    }

    /// Validates history configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            HistoryStoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory history must not set path".to_string()));
                }
                Ok(())
            }
            HistoryStoreType::Jsonl | HistoryStoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("file-backed history requires path".to_string())
                })?;
                validate_path_field("history.path", path)
            }
        }
    }
}

/// Dry-run resolver configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Runs the resolver for top-N candidates when true.
    pub enabled: bool,
    /// Program and leading arguments; `name==version` is appended.
    pub command: Vec<String>,
    /// Per-invocation timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: ["pip", "install", "--dry-run", "--quiet"].map(String::from).to_vec(),
            timeout_ms: DEFAULT_RESOLVER_TIMEOUT_MS,
        }
    }
}

impl ResolverConfig {
    /// Validates resolver configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.command.is_empty() || self.command.len() > MAX_RESOLVER_ARGS {
            return Err(ConfigError::Invalid(format!(
                "resolver.command must have 1..={MAX_RESOLVER_ARGS} entries"
            )));
        }
        if self.command.iter().any(|arg| arg.trim().is_empty()) {
            return Err(ConfigError::Invalid("resolver.command entries must be non-empty".to_string()));
        }
        if self.timeout_ms == 0 || self.timeout_ms > MAX_RESOLVER_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "resolver.timeout_ms must be between 1 and {MAX_RESOLVER_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Enables structured audit logging.
    pub enabled: bool,
    /// Optional JSON lines file; stderr when unset.
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_field("audit.path", path)?;
        }
        Ok(())
    }
}

/// One repository registered for cross-repo coordination.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Unique repository name.
    pub name: String,
    /// Repository checkout path.
    pub path: PathBuf,
    /// Backtracking priority; higher wins.
    #[serde(default)]
    pub priority: i32,
    /// Requirements file relative to `path`.
    #[serde(default)]
    pub requirements: Option<PathBuf>,
    /// Inline requirements by package.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl RepositoryConfig {
    /// Returns the repository with its inline requirements.
    #[must_use]
    pub fn repository_info(&self) -> RepositoryInfo {
        self.dependencies
            .iter()
            .fold(
                RepositoryInfo::new(self.name.trim(), self.path.to_string_lossy()),
                |info, (package, requirement)| info.with_dependency(package, requirement),
            )
            .with_priority(self.priority)
    }

    /// Returns the resolved requirements file path, if configured.
    #[must_use]
    pub fn requirements_path(&self) -> Option<PathBuf> {
        self.requirements.as_ref().map(|file| {
            if file.is_relative() { self.path.join(file) } else { file.clone() }
        })
    }
}

/// Validates the repository list.
fn validate_repositories(repositories: &[RepositoryConfig]) -> Result<(), ConfigError> {
    if repositories.len() > MAX_REPOSITORIES {
        return Err(ConfigError::Invalid(format!(
            "at most {MAX_REPOSITORIES} repositories may be registered"
        )));
    }
    let mut names = BTreeSet::new();
    for repository in repositories {
        let name = repository.name.trim();
        if name.is_empty() || name.len() > MAX_REPOSITORY_NAME_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "repository name must be 1..={MAX_REPOSITORY_NAME_LENGTH} characters"
            )));
        }
        if !names.insert(name) {
            return Err(ConfigError::Invalid(format!("duplicate repository name: {name}")));
        }
        validate_path_field(&format!("repositories.{name}.path"), &repository.path)?;
        if let Some(requirements) = repository.requirements_path() {
            validate_path_field(&format!("repositories.{name}.requirements"), &requirements)?;
        }
        if let Some((package, _)) =
            repository.dependencies.iter().find(|(package, requirement)| {
                package.trim().is_empty() || requirement.trim().is_empty()
            })
        {
            return Err(ConfigError::Invalid(format!(
                "repositories.{name}.dependencies has an empty entry near '{package}'"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved config path against length limits.
pub(crate) fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path field against length limits.
fn validate_path_field(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
