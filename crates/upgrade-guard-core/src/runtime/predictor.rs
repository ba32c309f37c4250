// crates/upgrade-guard-core/src/runtime/predictor.rs
// ============================================================================
// Module: Upgrade Guard Risk Predictor
// Description: Weighted linear risk model fed by the outcome repository.
// Purpose: Score proposed updates and learn from recorded outcomes.
// Dependencies: crate::core, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! The predictor sums signed feature weights onto a base risk and clamps the
//! result to `[0, 1]`. Past outcomes for the same package add a failure term
//! weighted by exponential recency decay, so a recent failure counts more
//! than an old one. Recording an outcome only appends to the repository;
//! nothing already recorded is rewritten.
//!
//! Weights are tunable defaults. [`RiskPredictor::backtest`] replays every
//! outcome that captured its feature vector so a weight set can be checked
//! against what actually happened.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::BacktestReport;
use crate::core::HistoricalOutcome;
use crate::core::RiskLevel;
use crate::core::RiskScore;
use crate::core::UpdateFeatures;
use crate::core::time::elapsed_days;
use crate::interfaces::OutcomeRepository;
use crate::interfaces::OutcomeStoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Target releases younger than this count as recent activity.
pub const RECENT_ACTIVITY_DAYS: u32 = 7;
/// Target releases older than this count as stale.
pub const STALE_RELEASE_DAYS: u32 = 180;
/// Dependency counts above this add risk.
pub const HIGH_DEPENDENCY_COUNT: u32 = 10;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Predictor configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictorError {
    /// Configuration is invalid.
    #[error("invalid predictor configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Signed feature weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskModelWeights {
    /// Risk every update starts with.
    pub base: f64,
    /// Major version change.
    pub major: f64,
    /// Minor version change.
    pub minor: f64,
    /// Patch version change.
    pub patch: f64,
    /// Announced breaking change.
    pub breaking: f64,
    /// Security fix (negative reduces risk).
    pub security: f64,
    /// Target released very recently.
    pub recent_activity: f64,
    /// Target released long ago.
    pub stale: f64,
    /// Multiplied by `1 - popularity`.
    pub unpopularity: f64,
    /// No test coverage in the consuming project.
    pub no_test_coverage: f64,
    /// Transitive dependency.
    pub transitive: f64,
    /// Many dependents.
    pub high_dependency_count: f64,
    /// Multiplied by the decayed historical failure rate.
    pub historical_failure: f64,
}

impl Default for RiskModelWeights {
    fn default() -> Self {
        Self {
            base: 0.3,
            major: 0.6,
            minor: 0.3,
            patch: 0.1,
            breaking: 0.8,
            security: -0.3,
            recent_activity: 0.2,
            stale: 0.3,
            unpopularity: 0.2,
            no_test_coverage: 0.4,
            transitive: 0.1,
            high_dependency_count: 0.3,
            historical_failure: 0.5,
        }
    }
}

impl RiskModelWeights {
    /// Returns the weights keyed by factor name.
    fn named(&self) -> [(&'static str, f64); 13] {
        [
            ("base", self.base),
            ("major", self.major),
            ("minor", self.minor),
            ("patch", self.patch),
            ("breaking", self.breaking),
            ("security", self.security),
            ("recent_activity", self.recent_activity),
            ("stale", self.stale),
            ("unpopularity", self.unpopularity),
            ("no_test_coverage", self.no_test_coverage),
            ("transitive", self.transitive),
            ("high_dependency_count", self.high_dependency_count),
            ("historical_failure", self.historical_failure),
        ]
    }
}

/// Predictor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorConfig {
    /// Feature weights.
    pub weights: RiskModelWeights,
    /// Scores below this are safe.
    pub safe_below: f64,
    /// Scores above this are blocked.
    pub blocked_above: f64,
    /// Half-life of outcome emphasis in days.
    pub half_life_days: f64,
    /// Confidence with no history.
    pub confidence_base: f64,
    /// Confidence gained per recorded outcome.
    pub confidence_step: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            weights: RiskModelWeights::default(),
            safe_below: 0.3,
            blocked_above: 0.7,
            half_life_days: 30.0,
            confidence_base: 0.5,
            confidence_step: 0.1,
        }
    }
}

impl PredictorConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PredictorError::Invalid`] for non-finite weights, band
    /// limits outside `0 <= safe_below <= blocked_above <= 1`, a
    /// non-positive half-life, or confidence parameters outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), PredictorError> {
        if let Some((name, _)) = self.weights.named().iter().find(|(_, weight)| !weight.is_finite()) {
            return Err(PredictorError::Invalid(format!("weight {name} must be finite")));
        }
        let bands_ordered = (0.0..=1.0).contains(&self.safe_below)
            && (0.0..=1.0).contains(&self.blocked_above)
            && self.safe_below <= self.blocked_above;
        if !bands_ordered {
            return Err(PredictorError::Invalid(
                "bands must satisfy 0 <= safe_below <= blocked_above <= 1".to_string(),
            ));
        }
        if !self.half_life_days.is_finite() || self.half_life_days <= 0.0 {
            return Err(PredictorError::Invalid("half_life_days must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.confidence_base) || !(0.0..=1.0).contains(&self.confidence_step) {
            return Err(PredictorError::Invalid(
                "confidence_base and confidence_step must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Predictor
// ============================================================================

/// Learned risk predictor over an injected outcome repository.
#[derive(Debug, Clone)]
pub struct RiskPredictor<R> {
    /// Validated configuration.
    config: PredictorConfig,
    /// Append-only outcome log.
    repository: R,
}

impl<R: OutcomeRepository> RiskPredictor<R> {
    /// Creates a predictor.
    ///
    /// # Errors
    ///
    /// Returns [`PredictorError::Invalid`] when the configuration is invalid.
    pub fn new(config: PredictorConfig, repository: R) -> Result<Self, PredictorError> {
        config.validate()?;
        Ok(Self {
            config,
            repository,
        })
    }

    /// Returns the outcome repository.
    #[must_use]
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// Returns the recommendation band for a score.
    #[must_use]
    pub fn band(&self, score: f64) -> RiskLevel {
        band_for(score, &self.config)
    }

    /// Scores one proposed update. A repository read failure scores the
    /// update without history and marks the result accordingly.
    #[must_use]
    pub fn predict(&self, features: &UpdateFeatures, now: OffsetDateTime) -> RiskScore {
        let (history, history_available) = match self.repository.load_for_package(&features.package) {
            Ok(history) => (history, true),
            Err(_) => (Vec::new(), false),
        };
        self.score_with_history(features, &history, history_available, now)
    }

    /// Appends an outcome; future predictions for the package include it.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeStoreError`] when the repository rejects the record.
    pub fn record_outcome(&self, outcome: &HistoricalOutcome) -> Result<(), OutcomeStoreError> {
        self.repository.append(outcome)
    }

    /// Replays every outcome that captured its features. Each replay only
    /// sees the package history recorded before that outcome.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeStoreError`] when the log cannot be read.
    pub fn backtest(&self, now: OffsetDateTime) -> Result<BacktestReport, OutcomeStoreError> {
        let outcomes = self.repository.load_all()?;
        let mut samples = 0usize;
        let mut decisive = 0usize;
        let mut correct = 0usize;
        let mut squared_error = 0.0;
        for outcome in &outcomes {
            let Some(features) = &outcome.features else {
                continue;
            };
            let prior: Vec<HistoricalOutcome> = outcomes
                .iter()
                .filter(|other| other.package == outcome.package && other.recorded_at < outcome.recorded_at)
                .cloned()
                .collect();
            let score = self.score_with_history(features, &prior, true, outcome.recorded_at.min(now));
            samples += 1;
            let failed = outcome.is_failure();
            let observed = if failed { 1.0 } else { 0.0 };
            squared_error += (score.score - observed).powi(2);
            match score.recommendation {
                RiskLevel::Safe => {
                    decisive += 1;
                    if !failed {
                        correct += 1;
                    }
                }
                RiskLevel::Blocked => {
                    decisive += 1;
                    if failed {
                        correct += 1;
                    }
                }
                RiskLevel::NeedsReview => {}
            }
        }
        Ok(BacktestReport {
            samples,
            decisive_samples: decisive,
            correct,
            accuracy: if decisive == 0 { 0.0 } else { count_as_f64(correct) / count_as_f64(decisive) },
            brier_score: if samples == 0 { 0.0 } else { squared_error / count_as_f64(samples) },
        })
    }

    /// Scores features against an explicit history.
    fn score_with_history(
        &self,
        features: &UpdateFeatures,
        history: &[HistoricalOutcome],
        history_available: bool,
        now: OffsetDateTime,
    ) -> RiskScore {
        let weights = &self.config.weights;
        let mut factors = BTreeMap::new();
        let mut add = |name: &str, value: f64| {
            if value != 0.0 {
                factors.insert(name.to_string(), value);
            }
        };
        add("base", weights.base);
        if features.is_major {
            add("major", weights.major);
        } else if features.is_minor {
            add("minor", weights.minor);
        } else if features.is_patch {
            add("patch", weights.patch);
        }
        if features.breaking_changes {
            add("breaking", weights.breaking);
        }
        if features.security_update {
            add("security", weights.security);
        }
        if let Some(days) = features.days_since_last_update {
            if days < RECENT_ACTIVITY_DAYS {
                add("recent_activity", weights.recent_activity);
            } else if days > STALE_RELEASE_DAYS {
                add("stale", weights.stale);
            }
        }
        let popularity = if features.popularity.is_finite() { features.popularity.clamp(0.0, 1.0) } else { 0.0 };
        add("unpopularity", weights.unpopularity * (1.0 - popularity));
        if !features.has_test_coverage {
            add("no_test_coverage", weights.no_test_coverage);
        }
        if features.is_transitive {
            add("transitive", weights.transitive);
        }
        if features.dependency_count > HIGH_DEPENDENCY_COUNT {
            add("high_dependency_count", weights.high_dependency_count);
        }
        let relevant: Vec<&HistoricalOutcome> =
            history.iter().filter(|outcome| outcome.package == features.package).collect();
        add(
            "historical_failure",
            weights.historical_failure * decayed_failure_rate(&relevant, self.config.half_life_days, now),
        );

        let raw: f64 = factors.values().sum();
        let score = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 1.0 };
        let confidence = (self.config.confidence_step.mul_add(count_as_f64(relevant.len()), self.config.confidence_base))
            .clamp(0.0, 1.0);
        RiskScore {
            package: features.package.clone(),
            from_version: features.from_version.clone(),
            to_version: features.to_version.clone(),
            score,
            confidence,
            recommendation: band_for(score, &self.config),
            factors,
            history_samples: relevant.len(),
            history_available,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a score onto the recommendation bands. Limits are inclusive on the
/// needs-review side.
fn band_for(score: f64, config: &PredictorConfig) -> RiskLevel {
    if score < config.safe_below {
        RiskLevel::Safe
    } else if score > config.blocked_above {
        RiskLevel::Blocked
    } else {
        RiskLevel::NeedsReview
    }
}

/// Failure rate with each outcome weighted by `0.5^(age / half_life)`.
fn decayed_failure_rate(history: &[&HistoricalOutcome], half_life_days: f64, now: OffsetDateTime) -> f64 {
    let mut failures = 0.0;
    let mut total = 0.0;
    for outcome in history {
        let weight = 0.5_f64.powf(elapsed_days(outcome.recorded_at, now) / half_life_days);
        total += weight;
        if outcome.is_failure() {
            failures += weight;
        }
    }
    if total > 0.0 { failures / total } else { 0.0 }
}

/// Converts a count to `f64`.
#[allow(clippy::cast_precision_loss, reason = "Outcome counts are far below 2^52.")]
fn count_as_f64(count: usize) -> f64 {
    count as f64
}
