// crates/upgrade-guard-core/src/runtime/rollback.rs
// ============================================================================
// Module: Upgrade Guard Rollback Decision Engine
// Description: Correlates health breaches with applied updates.
// Purpose: Decide between no action, monitoring, partial and full rollback.
// Dependencies: crate::core, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! A breached metric correlates with an applied update when it was observed
//! inside `[applied_at, applied_at + window]`; a metric naming suspects only
//! correlates with those packages. Decision rule:
//!
//! - a correlated critical breach rolls back every update in its window;
//! - otherwise a correlated warning breach rolls back the correlated
//!   packages only;
//! - breaches nothing correlates with are monitored;
//! - no breach means no action.
//!
//! Decisions are values. [`RollbackEngine::execute`] is the only place an
//! executor is called, and it never calls one for a dry run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;

use crate::core::AppliedUpdate;
use crate::core::BreachedMetric;
use crate::core::HealthMetric;
use crate::core::MetricSeverity;
use crate::core::PackageName;
use crate::core::RollbackAction;
use crate::core::RollbackDecision;
use crate::core::RollbackExecution;
use crate::interfaces::RollbackExecutor;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Confidence reported when no metric breached.
const NO_BREACH_CONFIDENCE: f64 = 0.9;

/// Rollback configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollbackConfigError {
    /// Configuration is invalid.
    #[error("invalid rollback configuration: {0}")]
    Invalid(String),
}

/// Rollback engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollbackConfig {
    /// Correlation window after an update, in seconds.
    pub window_seconds: u32,
    /// Confidence weight of one critical breach.
    pub critical_weight: f64,
    /// Confidence weight of one warning breach.
    pub warning_weight: f64,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            window_seconds: 3600,
            critical_weight: 0.6,
            warning_weight: 0.35,
        }
    }
}

impl RollbackConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RollbackConfigError::Invalid`] for a zero window or weights
    /// outside `(0, 1]`.
    pub fn validate(&self) -> Result<(), RollbackConfigError> {
        if self.window_seconds == 0 {
            return Err(RollbackConfigError::Invalid("window_seconds must be positive".to_string()));
        }
        for (name, weight) in [("critical_weight", self.critical_weight), ("warning_weight", self.warning_weight)] {
            if !(weight > 0.0 && weight <= 1.0) {
                return Err(RollbackConfigError::Invalid(format!("{name} must be within (0, 1]")));
            }
        }
        Ok(())
    }

    /// Returns the correlation window.
    fn window(&self) -> Duration {
        Duration::seconds(i64::from(self.window_seconds))
    }

    /// Returns the confidence weight for a severity.
    const fn weight(&self, severity: MetricSeverity) -> f64 {
        match severity {
            MetricSeverity::Critical => self.critical_weight,
            MetricSeverity::Warning => self.warning_weight,
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Rollback decision engine.
#[derive(Debug, Clone, Copy)]
pub struct RollbackEngine {
    /// Validated configuration.
    config: RollbackConfig,
}

impl RollbackEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`RollbackConfigError::Invalid`] when the configuration is
    /// invalid.
    pub fn new(config: RollbackConfig) -> Result<Self, RollbackConfigError> {
        config.validate()?;
        Ok(Self {
            config,
        })
    }

    /// Decides how to respond to the observed metrics.
    #[must_use]
    pub fn decide(
        &self,
        metrics: &[HealthMetric],
        updates: &[AppliedUpdate],
        now: OffsetDateTime,
        dry_run: bool,
    ) -> RollbackDecision {
        let breaches: Vec<&HealthMetric> = metrics.iter().filter(|metric| metric.is_breached()).collect();
        if breaches.is_empty() {
            return RollbackDecision {
                decided_at: now,
                should_rollback: false,
                action: RollbackAction::None,
                confidence: NO_BREACH_CONFIDENCE,
                reason: "all health metrics within thresholds".to_string(),
                breached_metrics: Vec::new(),
                partial_packages: None,
                rollback_packages: Vec::new(),
                correlated_updates: Vec::new(),
                dry_run,
            };
        }

        let mut breached_metrics = Vec::with_capacity(breaches.len());
        let mut correlated_all = BTreeSet::new();
        let mut full_scope = BTreeSet::new();
        let mut partial_scope = BTreeSet::new();
        let mut critical_names = Vec::new();
        let mut warning_names = Vec::new();
        let mut survival = 1.0;
        for metric in &breaches {
            survival *= 1.0 - self.config.weight(metric.severity);
            let correlated = self.correlate(metric, updates, true);
            correlated_all.extend(correlated.iter().cloned());
            if !correlated.is_empty() {
                match metric.severity {
                    MetricSeverity::Critical => {
                        full_scope.extend(self.correlate(metric, updates, false));
                        critical_names.push(metric.name.clone());
                    }
                    MetricSeverity::Warning => {
                        partial_scope.extend(correlated.iter().cloned());
                        warning_names.push(metric.name.clone());
                    }
                }
            }
            breached_metrics.push(BreachedMetric {
                name: metric.name.clone(),
                value: metric.value,
                threshold: metric.threshold,
                severity: metric.severity,
                correlated_packages: correlated.into_iter().collect(),
            });
        }
        let confidence = (1.0 - survival).clamp(0.0, 1.0);
        let correlated_updates: Vec<PackageName> = correlated_all.into_iter().collect();

        let (action, rollback_packages, reason) = if !full_scope.is_empty() {
            let packages: Vec<PackageName> = full_scope.into_iter().collect();
            let reason = format!(
                "critical breach of {} correlated with updates in window; rolling back {}",
                critical_names.join(", "),
                join_names(&packages)
            );
            (RollbackAction::FullRollback, packages, reason)
        } else if !partial_scope.is_empty() {
            let packages: Vec<PackageName> = partial_scope.into_iter().collect();
            let reason = format!(
                "warning breach of {} correlated with {}; rolling back suspects only",
                warning_names.join(", "),
                join_names(&packages)
            );
            (RollbackAction::PartialRollback, packages, reason)
        } else {
            let reason = format!(
                "{} metric(s) breached with no correlated update in window; monitoring",
                breached_metrics.len()
            );
            (RollbackAction::Monitor, Vec::new(), reason)
        };

        RollbackDecision {
            decided_at: now,
            should_rollback: !rollback_packages.is_empty(),
            partial_packages: (action == RollbackAction::PartialRollback).then(|| rollback_packages.clone()),
            action,
            confidence,
            reason,
            breached_metrics,
            rollback_packages,
            correlated_updates,
            dry_run,
        }
    }

    /// Carries out a decision. Dry runs and decisions without a rollback
    /// never reach the executor.
    pub fn execute<E: RollbackExecutor + ?Sized>(
        &self,
        decision: RollbackDecision,
        executor: &E,
    ) -> RollbackExecution {
        if decision.dry_run || !decision.should_rollback {
            return RollbackExecution {
                decision,
                executed: false,
                error: None,
            };
        }
        match executor.rollback(&decision.rollback_packages) {
            Ok(()) => RollbackExecution {
                decision,
                executed: true,
                error: None,
            },
            Err(err) => RollbackExecution {
                decision,
                executed: false,
                error: Some(err.to_string()),
            },
        }
    }

    /// Returns the packages whose update window contains the observation.
    /// A window ending past the representable range is unbounded.
    /// `honor_suspects` narrows the set to the metric's suspects.
    fn correlate(
        &self,
        metric: &HealthMetric,
        updates: &[AppliedUpdate],
        honor_suspects: bool,
    ) -> BTreeSet<PackageName> {
        let window = self.config.window();
        updates
            .iter()
            .filter(|update| {
                metric.observed_at >= update.applied_at
                    && update.applied_at.checked_add(window).is_none_or(|end| metric.observed_at <= end)
            })
            .filter(|update| {
                !honor_suspects || metric.suspects.is_empty() || metric.suspects.contains(&update.package)
            })
            .map(|update| update.package.clone())
            .collect()
    }
}

/// Joins package names for a reason string.
fn join_names(packages: &[PackageName]) -> String {
    packages.iter().map(PackageName::as_str).collect::<Vec<_>>().join(", ")
}
