// crates/upgrade-guard-core/src/runtime/store.rs
// ============================================================================
// Module: Upgrade Guard In-Memory Collaborators
// Description: In-memory outcome log, resolvers, audit sinks, and executor.
// Purpose: Provide deterministic collaborators for tests and local runs.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! In-memory implementations of every collaborator trait. Clones share state
//! so a test can hand one clone to an engine and inspect the other. None of
//! these are intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::AuditRecord;
use crate::core::HistoricalOutcome;
use crate::core::PackageName;
use crate::interfaces::AuditSink;
use crate::interfaces::DependencyResolver;
use crate::interfaces::OutcomeRepository;
use crate::interfaces::OutcomeStoreError;
use crate::interfaces::ResolverError;
use crate::interfaces::ResolverRequest;
use crate::interfaces::ResolverVerdict;
use crate::interfaces::RollbackError;
use crate::interfaces::RollbackExecutor;

// ============================================================================
// SECTION: Outcome Log
// ============================================================================

/// In-memory append-only outcome log.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOutcomeLog {
    /// Outcomes in append order.
    outcomes: Arc<Mutex<Vec<HistoricalOutcome>>>,
}

impl InMemoryOutcomeLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log seeded with outcomes.
    #[must_use]
    pub fn with_outcomes(outcomes: Vec<HistoricalOutcome>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes)),
        }
    }
}

impl OutcomeRepository for InMemoryOutcomeLog {
    fn append(&self, outcome: &HistoricalOutcome) -> Result<(), OutcomeStoreError> {
        self.outcomes
            .lock()
            .map_err(|_| OutcomeStoreError::Store("outcome log mutex poisoned".to_string()))?
            .push(outcome.clone());
        Ok(())
    }

    fn load_for_package(
        &self,
        package: &PackageName,
    ) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError> {
        let guard = self
            .outcomes
            .lock()
            .map_err(|_| OutcomeStoreError::Store("outcome log mutex poisoned".to_string()))?;
        Ok(guard.iter().filter(|outcome| &outcome.package == package).cloned().collect())
    }

    fn load_all(&self) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError> {
        let guard = self
            .outcomes
            .lock()
            .map_err(|_| OutcomeStoreError::Store("outcome log mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }
}

/// Outcome repository that always fails to read or write.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableOutcomeLog;

impl OutcomeRepository for UnavailableOutcomeLog {
    fn append(&self, _outcome: &HistoricalOutcome) -> Result<(), OutcomeStoreError> {
        Err(OutcomeStoreError::Io("outcome log unavailable".to_string()))
    }

    fn load_for_package(
        &self,
        _package: &PackageName,
    ) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError> {
        Err(OutcomeStoreError::Io("outcome log unavailable".to_string()))
    }

    fn load_all(&self) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError> {
        Err(OutcomeStoreError::Io("outcome log unavailable".to_string()))
    }
}

// ============================================================================
// SECTION: Resolvers
// ============================================================================

/// Scripted resolver: succeeds unless the package was marked failing.
#[derive(Debug, Default, Clone)]
pub struct InMemoryResolver {
    /// Failure detail per package.
    failures: BTreeMap<PackageName, String>,
    /// Requests seen, in order.
    requests: Arc<Mutex<Vec<ResolverRequest>>>,
}

impl InMemoryResolver {
    /// Creates a resolver that accepts every move.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a package as failing resolution.
    #[must_use]
    pub fn failing(mut self, package: &str, detail: &str) -> Self {
        self.failures.insert(PackageName::new(package), detail.to_string());
        self
    }

    /// Returns the requests seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ResolverRequest> {
        self.requests.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

impl DependencyResolver for InMemoryResolver {
    fn dry_run(&self, request: &ResolverRequest) -> Result<ResolverVerdict, ResolverError> {
        self.requests
            .lock()
            .map_err(|_| ResolverError::Failed("resolver mutex poisoned".to_string()))?
            .push(request.clone());
        Ok(self
            .failures
            .get(&request.package)
            .map_or_else(ResolverVerdict::ok, |detail| ResolverVerdict::failed(detail.clone())))
    }
}

/// Resolver used when validation is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledResolver;

impl DependencyResolver for DisabledResolver {
    fn dry_run(&self, _request: &ResolverRequest) -> Result<ResolverVerdict, ResolverError> {
        Err(ResolverError::Unavailable("no resolver configured".to_string()))
    }
}

// ============================================================================
// SECTION: Audit Sinks
// ============================================================================

/// Audit sink that discards records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: &AuditRecord) {}
}

/// Audit sink that keeps records in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditSink {
    /// Records in emission order.
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl InMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the records seen so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    /// Returns the event names seen so far.
    #[must_use]
    pub fn event_names(&self) -> Vec<&'static str> {
        self.records().iter().map(|record| record.event.name()).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Ok(mut guard) = self.records.lock() {
            guard.push(record.clone());
        }
    }
}

// ============================================================================
// SECTION: Rollback Executor
// ============================================================================

/// Rollback executor that records invocations.
#[derive(Debug, Default, Clone)]
pub struct RecordingRollbackExecutor {
    /// Package lists passed to `rollback`.
    calls: Arc<Mutex<Vec<Vec<PackageName>>>>,
    /// Error returned by every call, when set.
    failure: Option<String>,
}

impl RecordingRollbackExecutor {
    /// Creates an executor that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor that fails with `message`.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            calls: Arc::default(),
            failure: Some(message.to_string()),
        }
    }

    /// Returns the recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<PackageName>> {
        self.calls.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

impl RollbackExecutor for RecordingRollbackExecutor {
    fn rollback(&self, packages: &[PackageName]) -> Result<(), RollbackError> {
        self.calls
            .lock()
            .map_err(|_| RollbackError::Failed("executor mutex poisoned".to_string()))?
            .push(packages.to_vec());
        match &self.failure {
            Some(message) => Err(RollbackError::Failed(message.clone())),
            None => Ok(()),
        }
    }
}
