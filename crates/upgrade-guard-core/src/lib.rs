// crates/upgrade-guard-core/src/lib.rs
// ============================================================================
// Module: Upgrade Guard Core Library
// Description: Public API surface for the dependency upgrade decision engine.
// Purpose: Expose core types, collaborator interfaces, and runtime engines.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Upgrade Guard core fuses dependency-health signals into per-package risk
//! verdicts, plans resolver-validated upgrades, predicts update risk from
//! recorded outcomes, decides on post-deploy rollback, and resolves version
//! conflicts across repositories. It performs no I/O; storage, resolvers,
//! rollback execution and audit logging are injected through
//! [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AuditSink;
pub use interfaces::DependencyResolver;
pub use interfaces::OutcomeRepository;
pub use interfaces::OutcomeStoreError;
pub use interfaces::ResolverError;
pub use interfaces::ResolverRequest;
pub use interfaces::ResolverVerdict;
pub use interfaces::RollbackError;
pub use interfaces::RollbackExecutor;
pub use runtime::CrossRepoCoordinator;
pub use runtime::DriftAnalyzer;
pub use runtime::Guard;
pub use runtime::GuardConfig;
pub use runtime::GuardError;
pub use runtime::PlanInputs;
pub use runtime::Planner;
pub use runtime::PlannerConfig;
pub use runtime::PlannerError;
pub use runtime::PredictorConfig;
pub use runtime::PredictorError;
pub use runtime::RiskPredictor;
pub use runtime::RollbackConfig;
pub use runtime::RollbackEngine;
