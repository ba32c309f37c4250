// crates/upgrade-guard-core/src/interfaces/mod.rs
// ============================================================================
// Module: Upgrade Guard Interfaces
// Description: Collaborator seams for history, resolution, rollback, audit.
// Purpose: Keep the engines free of storage, process, and logging backends.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! The engines never reach a database, a package manager, or a log file
//! directly. Each of those collaborators is a trait here; hosts inject real
//! implementations and tests inject the in-memory ones from
//! [`crate::runtime::store`]. Failures are returned as values so callers can
//! degrade the single candidate or source involved.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::AuditRecord;
use crate::core::HistoricalOutcome;
use crate::core::PackageName;
use crate::core::ResolverStatus;
use crate::core::Version;

// ============================================================================
// SECTION: Outcome Repository
// ============================================================================

/// Outcome repository errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutcomeStoreError {
    /// I/O failure.
    #[error("outcome store io error: {0}")]
    Io(String),
    /// Stored data failed integrity checks.
    #[error("outcome store corruption: {0}")]
    Corrupt(String),
    /// Record failed validation.
    #[error("outcome store invalid data: {0}")]
    Invalid(String),
    /// Backend error.
    #[error("outcome store error: {0}")]
    Store(String),
}

/// Append-only log of update outcomes.
pub trait OutcomeRepository {
    /// Appends one outcome. Existing records are never modified.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeStoreError`] when the record cannot be persisted.
    fn append(&self, outcome: &HistoricalOutcome) -> Result<(), OutcomeStoreError>;

    /// Loads every outcome for a package in append order.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeStoreError`] when the log cannot be read.
    fn load_for_package(
        &self,
        package: &PackageName,
    ) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError>;

    /// Loads every outcome in append order.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeStoreError`] when the log cannot be read.
    fn load_all(&self) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError>;
}

// ============================================================================
// SECTION: Dependency Resolver
// ============================================================================

/// Dry-run resolution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverRequest {
    /// Package to move.
    pub package: PackageName,
    /// Ecosystem tag.
    pub ecosystem: String,
    /// Resolved version.
    pub from_version: Version,
    /// Target version.
    pub to_version: Version,
}

/// Dry-run resolution verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverVerdict {
    /// Outcome.
    pub status: ResolverStatus,
    /// Resolver output or explanation.
    pub detail: Option<String>,
}

impl ResolverVerdict {
    /// Successful resolution.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            status: ResolverStatus::Ok,
            detail: None,
        }
    }

    /// Failed resolution with a detail message.
    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: ResolverStatus::Failed,
            detail: Some(detail.into()),
        }
    }
}

/// Resolver invocation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// Resolver is not installed or not configured.
    #[error("resolver unavailable: {0}")]
    Unavailable(String),
    /// Resolver could not be run to completion.
    #[error("resolver failed: {0}")]
    Failed(String),
}

/// Dependency resolver run in dry-run mode. Implementations must not mutate
/// any environment.
pub trait DependencyResolver {
    /// Simulates resolving the requested move.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] when the resolver itself cannot run; a
    /// resolver that runs and rejects the move returns a failed verdict.
    fn dry_run(&self, request: &ResolverRequest) -> Result<ResolverVerdict, ResolverError>;
}

// ============================================================================
// SECTION: Rollback Executor
// ============================================================================

/// Rollback executor errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollbackError {
    /// Executor failed.
    #[error("rollback failed: {0}")]
    Failed(String),
}

/// Reverts applied updates.
pub trait RollbackExecutor {
    /// Reverts the listed packages.
    ///
    /// # Errors
    ///
    /// Returns [`RollbackError`] when the rollback fails.
    fn rollback(&self, packages: &[PackageName]) -> Result<(), RollbackError>;
}

// ============================================================================
// SECTION: Audit Sink
// ============================================================================

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    /// Records one audit record. Sinks swallow their own failures.
    fn record(&self, record: &AuditRecord);
}
