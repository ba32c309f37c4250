// crates/upgrade-guard-core/src/runtime/mod.rs
// ============================================================================
// Module: Upgrade Guard Runtime
// Description: Decision engines and in-memory collaborators.
// Purpose: Turn normalized inputs into assessments, plans, and decisions.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Engines run leaf-first: the normalizer feeds the drift analyzer and the
//! guard, whose outputs feed the planner. The predictor, rollback engine and
//! cross-repo coordinator stand alone. Every engine takes its configuration
//! and clock explicitly and performs no I/O of its own.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod conflicts;
pub mod drift;
pub mod guard;
pub mod normalizer;
pub mod planner;
pub mod predictor;
pub mod retention;
pub mod rollback;
pub mod store;
pub mod summary;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use conflicts::CrossRepoCoordinator;
pub use drift::DriftAnalyzer;
pub use guard::Guard;
pub use guard::GuardConfig;
pub use guard::GuardError;
pub use normalizer::NormalizeError;
pub use normalizer::Normalized;
pub use normalizer::NormalizedSources;
pub use normalizer::RawBody;
pub use normalizer::RawSource;
pub use normalizer::SourcePayload;
pub use normalizer::normalize_all;
pub use normalizer::normalize_source;
pub use planner::PlanInputs;
pub use planner::Planner;
pub use planner::PlannerConfig;
pub use planner::PlannerError;
pub use planner::PlannerWeights;
pub use predictor::PredictorConfig;
pub use predictor::PredictorError;
pub use predictor::RiskModelWeights;
pub use predictor::RiskPredictor;
pub use retention::entries_from_names;
pub use retention::select_for_pruning;
pub use rollback::RollbackConfig;
pub use rollback::RollbackConfigError;
pub use rollback::RollbackEngine;
pub use store::DisabledResolver;
pub use store::InMemoryAuditSink;
pub use store::InMemoryOutcomeLog;
pub use store::InMemoryResolver;
pub use store::NoopAuditSink;
pub use store::RecordingRollbackExecutor;
pub use store::UnavailableOutcomeLog;
pub use summary::render_summary;
