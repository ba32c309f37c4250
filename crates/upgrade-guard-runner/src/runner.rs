// crates/upgrade-guard-runner/src/runner.rs
// ============================================================================
// Module: Guard Runner
// Description: One-shot orchestration of every engine for a single run.
// Purpose: Wire configuration, collaborators, and engines into run_once.
// Dependencies: upgrade-guard-core, upgrade-guard-config, tokio, rand
// ============================================================================

//! ## Overview
//! [`GuardRunner::run_once`] collects sources, assesses them, analyzes drift,
//! resolves cross-repository conflicts, plans and validates upgrades, scores
//! every candidate with the risk model, renders the summary, and writes a
//! snapshot. Each call is independent: it reads the configured files afresh
//! and writes a new snapshot under a fresh run id, so repeating a run with
//! unchanged inputs repeats its verdicts. Blocking work (file reads, resolver
//! dry runs, history I/O, snapshot writes) runs on the blocking pool.
//!
//! Rollback decisions and outcome recording are separate entry points since
//! they happen after deployment rather than during planning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use upgrade_guard_config::ConfigError;
use upgrade_guard_config::EngineConfig;
use upgrade_guard_core::AppliedUpdate;
use upgrade_guard_core::Assessment;
use upgrade_guard_core::AuditEvent;
use upgrade_guard_core::AuditRecord;
use upgrade_guard_core::AuditSink;
use upgrade_guard_core::BacktestReport;
use upgrade_guard_core::CrossRepoCoordinator;
use upgrade_guard_core::DependencyResolver;
use upgrade_guard_core::DriftAnalyzer;
use upgrade_guard_core::DriftReport;
use upgrade_guard_core::Guard;
use upgrade_guard_core::GuardError;
use upgrade_guard_core::HealthMetric;
use upgrade_guard_core::HistoricalOutcome;
use upgrade_guard_core::MetadataIndex;
use upgrade_guard_core::OutcomeRepository;
use upgrade_guard_core::OutcomeStoreError;
use upgrade_guard_core::PackageName;
use upgrade_guard_core::PlanInputs;
use upgrade_guard_core::Planner;
use upgrade_guard_core::PlannerError;
use upgrade_guard_core::PredictorError;
use upgrade_guard_core::ResolutionPlan;
use upgrade_guard_core::ResolverStatus;
use upgrade_guard_core::RiskPredictor;
use upgrade_guard_core::RiskScore;
use upgrade_guard_core::RollbackEngine;
use upgrade_guard_core::RollbackExecution;
use upgrade_guard_core::RollbackExecutor;
use upgrade_guard_core::RunId;
use upgrade_guard_core::SnapshotCadence;
use upgrade_guard_core::SnapshotManifest;
use upgrade_guard_core::SourceInput;
use upgrade_guard_core::SourceKind;
use upgrade_guard_core::UpdateCoordination;
use upgrade_guard_core::UpgradePlan;
use upgrade_guard_core::Version;
use upgrade_guard_core::runtime::DisabledResolver;
use upgrade_guard_core::runtime::RollbackConfigError;
use upgrade_guard_core::runtime::render_summary;

use crate::audit::audit_sink_from_config;
use crate::features::features_for_candidate;
use crate::history::HistoryBackend;
use crate::repositories::load_repositories;
use crate::resolver::CommandResolver;
use crate::snapshot::SnapshotBundle;
use crate::snapshot::SnapshotError;
use crate::snapshot::SnapshotWriter;
use crate::sources::collect_sources;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Runner errors. Missing or malformed inputs never surface here; they are
/// recorded on the run's source inputs instead.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Configuration or contract policy is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The guard rejected the contract policy.
    #[error(transparent)]
    Guard(#[from] GuardError),
    /// Planner configuration is invalid.
    #[error(transparent)]
    Planner(#[from] PlannerError),
    /// Predictor configuration is invalid.
    #[error(transparent)]
    Predictor(#[from] PredictorError),
    /// Rollback configuration is invalid.
    #[error(transparent)]
    Rollback(#[from] RollbackConfigError),
    /// History store failure.
    #[error(transparent)]
    History(#[from] OutcomeStoreError),
    /// Snapshot writer failure.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// Audit sink could not be opened.
    #[error("audit sink error: {0}")]
    Audit(String),
    /// A blocking task panicked or was cancelled.
    #[error("runner task failed: {0}")]
    Task(String),
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Everything one run decided.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: RunId,
    /// Normalized inputs, sorted by kind.
    pub sources: Vec<SourceInput>,
    /// Guard assessment.
    pub assessment: Assessment,
    /// Drift report.
    pub drift: DriftReport,
    /// Upgrade plan.
    pub plan: UpgradePlan,
    /// Risk score per plan candidate, in plan order.
    pub risks: Vec<RiskScore>,
    /// Cross-repository resolution, when repositories are registered.
    pub conflicts: Option<ResolutionPlan>,
    /// Markdown summary.
    pub summary: String,
    /// Snapshot manifest, when snapshots are enabled.
    pub manifest: Option<SnapshotManifest>,
    /// Snapshots pruned after the write.
    pub pruned: Vec<RunId>,
    /// Non-fatal problems met during the run.
    pub warnings: Vec<String>,
    /// Process exit code for the rollup.
    pub exit_code: i32,
}

/// Planning output computed on the blocking pool.
struct PlanningOutput {
    /// Upgrade plan.
    plan: UpgradePlan,
    /// Risk score per candidate.
    risks: Vec<RiskScore>,
    /// History read failure, if any.
    history_warning: Option<String>,
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Shared resolver handle.
pub type SharedResolver = Arc<dyn DependencyResolver + Send + Sync>;

/// Orchestrates one run across every engine.
pub struct GuardRunner {
    /// Validated configuration.
    config: EngineConfig,
    /// Risk scoring engine.
    guard: Guard,
    /// Upgrade planner.
    planner: Planner,
    /// Risk predictor over the configured history.
    predictor: Arc<RiskPredictor<HistoryBackend>>,
    /// Rollback decision engine.
    rollback: RollbackEngine,
    /// Dry-run resolver.
    resolver: SharedResolver,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Snapshot writer, when enabled.
    snapshots: Option<SnapshotWriter>,
}

impl GuardRunner {
    /// Builds a runner whose collaborators come from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when the configuration is invalid or a
    /// collaborator cannot be opened.
    pub fn from_config(config: EngineConfig) -> Result<Self, RunnerError> {
        config.validate()?;
        let history = HistoryBackend::from_config(&config.history)?;
        let audit = audit_sink_from_config(&config.audit).map_err(|err| RunnerError::Audit(err.to_string()))?;
        let resolver: SharedResolver = if config.resolver.enabled {
            Arc::new(CommandResolver::new(&config.resolver))
        } else {
            Arc::new(DisabledResolver)
        };
        Self::new(config, history, resolver, audit)
    }

    /// Builds a runner with explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when the configuration is invalid.
    pub fn new(
        config: EngineConfig,
        history: HistoryBackend,
        resolver: SharedResolver,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, RunnerError> {
        config.validate()?;
        let planner = Planner::new(config.planner_config())?;
        let predictor = RiskPredictor::new(config.predictor_config(), history)?;
        let rollback = RollbackEngine::new(config.rollback_config())?;
        let snapshots = config
            .snapshots
            .enabled
            .then(|| SnapshotWriter::new(config.snapshots.root.clone(), config.retention_policy()));
        Ok(Self {
            guard: Guard::new(config.guard_config()),
            planner,
            predictor: Arc::new(predictor),
            rollback,
            resolver,
            audit,
            snapshots,
            config,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the snapshot writer, when snapshots are enabled.
    #[must_use]
    pub const fn snapshots(&self) -> Option<&SnapshotWriter> {
        self.snapshots.as_ref()
    }

    /// Runs every engine once at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when the contract policy is misconfigured or
    /// the snapshot cannot be written.
    pub async fn run_once(&self, now: OffsetDateTime) -> Result<RunReport, RunnerError> {
        let started = Instant::now();
        let run_id = RunId::from_parts(now, self.config.snapshots.tag.as_deref(), &run_suffix());
        let mut warnings = Vec::new();

        let collected = collect_sources(&self.config.sources).await?;
        let sources = collected.normalized.sources;
        let metadata = collected.normalized.metadata;
        for input in &sources {
            self.emit(Some(&run_id), AuditEvent::SourceCollected {
                source: input.source,
                state: input.state,
                packages: input.packages.len(),
                digest: input.digest.clone(),
                diagnostic: input.diagnostic.clone(),
            });
        }

        let assessment = self.guard.assess(&sources, &collected.policy, now)?;
        self.emit(Some(&run_id), AuditEvent::AssessmentComputed {
            rollup: assessment.rollup,
            packages_flagged: assessment.packages_flagged,
            escalations: assessment.escalations.len(),
        });
        let drift = DriftAnalyzer::new().analyze(&sources, &metadata, &collected.policy, now);
        let conflicts = self.resolve_conflicts(&metadata, now, &mut warnings).await;
        if let Some(resolution) = &conflicts {
            self.emit(Some(&run_id), AuditEvent::ConflictsResolved {
                conflicts: resolution.conflicts.len(),
                manual: resolution.manual_resolution.len(),
                estimated_risk: resolution.estimated_risk,
            });
        }

        let planning = {
            let planner = self.planner.clone();
            let predictor = Arc::clone(&self.predictor);
            let resolver = Arc::clone(&self.resolver);
            let assessment = assessment.clone();
            let drift = drift.clone();
            let policy = collected.policy.clone();
            let metadata = metadata.clone();
            let conflicts = conflicts.clone();
            let sources = sources.clone();
            tokio::task::spawn_blocking(move || {
                let (history, history_warning) = match predictor.repository().load_all() {
                    Ok(history) => (history, None),
                    Err(err) => (Vec::new(), Some(format!("history unavailable: {err}"))),
                };
                let inputs = PlanInputs {
                    assessment: &assessment,
                    drift: &drift,
                    policy: &policy,
                    metadata: &metadata,
                    history: &history,
                    conflicts: conflicts.as_ref(),
                };
                let plan = planner.plan(&inputs, resolver.as_ref(), now);
                let risks = plan
                    .candidates
                    .iter()
                    .map(|candidate| {
                        let features = features_for_candidate(candidate, &assessment, &sources, &metadata, now);
                        predictor.predict(&features, now)
                    })
                    .collect();
                PlanningOutput {
                    plan,
                    risks,
                    history_warning,
                }
            })
            .await
            .map_err(|err| RunnerError::Task(format!("planning join failed: {err}")))?
        };
        warnings.extend(planning.history_warning);
        let plan = planning.plan;
        let risks = planning.risks;
        for candidate in plan.candidates.iter().filter(|candidate| candidate.resolver_status != ResolverStatus::Skipped) {
            self.emit(Some(&run_id), AuditEvent::ResolverChecked {
                package: candidate.package.clone(),
                version: candidate.to_version.to_string(),
                status: candidate.resolver_status,
            });
        }
        self.emit(Some(&run_id), AuditEvent::PlanGenerated {
            candidates: plan.candidates.len(),
            batches: plan.batches.len(),
        });
        for risk in &risks {
            self.emit(Some(&run_id), AuditEvent::RiskPredicted {
                package: risk.package.clone(),
                score: risk.score,
                recommendation: risk.recommendation,
            });
        }

        let summary = render_summary(&assessment, Some(&drift), Some(&plan));
        let mut report = RunReport {
            exit_code: assessment.exit_code(self.config.guard.exit_unknown),
            run_id,
            sources,
            assessment,
            drift,
            plan,
            risks,
            conflicts,
            summary,
            manifest: None,
            pruned: Vec::new(),
            warnings,
        };
        if let Some(writer) = &self.snapshots {
            let bundle = self.snapshot_bundle(&report, &collected.raw, started)?;
            let writer = writer.clone();
            let (manifest, pruned) = tokio::task::spawn_blocking(move || {
                let manifest = writer.write(bundle)?;
                let pruned = writer.prune(now)?;
                Ok::<_, SnapshotError>((manifest, pruned))
            })
            .await
            .map_err(|err| RunnerError::Task(format!("snapshot join failed: {err}")))??;
            self.emit(Some(&report.run_id), AuditEvent::SnapshotWritten {
                path: self.snapshot_path(&report.run_id),
                root_digest: manifest.root_digest.clone(),
            });
            if !pruned.is_empty() {
                self.emit(Some(&report.run_id), AuditEvent::SnapshotPruned {
                    removed: pruned.clone(),
                });
            }
            report.manifest = Some(manifest);
            report.pruned = pruned;
        }
        Ok(report)
    }

    /// Decides whether to roll back and hands the decision to `executor`.
    /// The executor is never called for dry runs.
    pub fn decide_rollback<E: RollbackExecutor + ?Sized>(
        &self,
        metrics: &[HealthMetric],
        updates: &[AppliedUpdate],
        now: OffsetDateTime,
        dry_run: bool,
        executor: &E,
    ) -> RollbackExecution {
        let decision = self.rollback.decide(metrics, updates, now, dry_run);
        self.emit(None, AuditEvent::RollbackDecided {
            action: decision.action.to_string(),
            confidence: decision.confidence,
            dry_run: decision.dry_run,
        });
        let execution = self.rollback.execute(decision, executor);
        if execution.executed {
            self.emit(None, AuditEvent::RollbackExecuted {
                packages: execution.decision.rollback_packages.clone(),
                error: execution.error.clone(),
            });
        }
        execution
    }

    /// Appends an update outcome to history.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::History`] when the outcome cannot be stored.
    pub fn record_outcome(&self, outcome: &HistoricalOutcome) -> Result<(), RunnerError> {
        self.predictor.record_outcome(outcome)?;
        self.emit(None, AuditEvent::OutcomeRecorded {
            package: outcome.package.clone(),
            success: outcome.success,
            rolled_back: outcome.rolled_back,
        });
        Ok(())
    }

    /// Replays recorded outcomes through the risk model.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::History`] when history cannot be read.
    pub fn backtest(&self, now: OffsetDateTime) -> Result<BacktestReport, RunnerError> {
        Ok(self.predictor.backtest(now)?)
    }

    /// Reports which registered repositories must change to adopt `version`.
    pub async fn coordinate_update(&self, package: &PackageName, version: &Version) -> UpdateCoordination {
        let loaded = load_repositories(&self.config.repositories).await;
        let mut coordinator = CrossRepoCoordinator::new();
        for repository in loaded.repositories {
            coordinator.register_repository(repository);
        }
        coordinator.coordinate_update(package, version)
    }

    /// Loads registered repositories and resolves their conflicts.
    async fn resolve_conflicts(
        &self,
        metadata: &MetadataIndex,
        now: OffsetDateTime,
        warnings: &mut Vec<String>,
    ) -> Option<ResolutionPlan> {
        if self.config.repositories.is_empty() {
            return None;
        }
        let loaded = load_repositories(&self.config.repositories).await;
        warnings.extend(loaded.warnings);
        let mut coordinator = CrossRepoCoordinator::new();
        for repository in loaded.repositories {
            coordinator.register_repository(repository);
        }
        coordinator.load_metadata(metadata);
        Some(coordinator.resolve(now))
    }

    /// Collects the files of a run's snapshot.
    fn snapshot_bundle(
        &self,
        report: &RunReport,
        raw: &BTreeMap<SourceKind, Vec<u8>>,
        started: Instant,
    ) -> Result<SnapshotBundle, RunnerError> {
        let mut files = Vec::new();
        for input in &report.sources {
            files.push((format!("inputs/{}.json", input.source), to_json(input)?));
        }
        for (kind, bytes) in raw {
            let extension = if *kind == SourceKind::Contract { "toml" } else { "json" };
            files.push((format!("inputs/raw/{kind}.{extension}"), bytes.clone()));
        }
        files.push(("reports/assessment.json".to_string(), to_json(&report.assessment)?));
        files.push(("reports/summary.md".to_string(), report.summary.clone().into_bytes()));
        files.push(("reports/drift.json".to_string(), to_json(&report.drift)?));
        files.push(("reports/plan.json".to_string(), to_json(&report.plan)?));
        files.push(("reports/risk.json".to_string(), to_json(&report.risks)?));
        if let Some(conflicts) = &report.conflicts {
            files.push(("reports/conflicts.json".to_string(), to_json(conflicts)?));
        }
        let freshness = &report.assessment.contract_freshness;
        Ok(SnapshotBundle {
            run_id: report.run_id.clone(),
            generated_at: report.assessment.generated_at,
            tag: self.config.snapshots.tag.clone(),
            files,
            cadence: SnapshotCadence {
                sbom_age_days: freshness.sbom_age_days,
                sbom_threshold_days: freshness.sbom_threshold_days,
                contract_age_days: freshness.contract_age_days,
                contract_review_days: freshness.contract_review_days,
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            },
            rollup: report.assessment.rollup,
        })
    }

    /// Returns the display path of a snapshot.
    fn snapshot_path(&self, run_id: &RunId) -> String {
        self.snapshots
            .as_ref()
            .map(|writer| writer.snapshot_dir(run_id).display().to_string())
            .unwrap_or_default()
    }

    /// Sends one audit record.
    fn emit(&self, run_id: Option<&RunId>, event: AuditEvent) {
        self.audit.record(&AuditRecord::new(run_id.cloned(), event));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns an 8-hex-digit random run id suffix.
fn run_suffix() -> String {
    let mut bytes = [0u8; 4];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Serializes a report document as pretty JSON.
fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, RunnerError> {
    serde_json::to_vec_pretty(value)
        .map_err(|err| RunnerError::Snapshot(SnapshotError::Serialization(err.to_string())))
}
