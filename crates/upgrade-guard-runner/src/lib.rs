// crates/upgrade-guard-runner/src/lib.rs
// ============================================================================
// Module: Upgrade Guard Runner
// Description: Host layer that runs every engine against configured inputs.
// Purpose: Fetch sources, orchestrate engines, and persist run evidence.
// Dependencies: upgrade-guard-core, upgrade-guard-config, tokio
// ============================================================================

//! ## Overview
//! The runner owns everything with side effects: concurrent source fetching,
//! requirements loading for registered repositories, the resolver dry-run
//! subprocess, history backends, audit sinks, and atomic snapshot writes.
//! [`GuardRunner`] ties them to the pure engines in `upgrade-guard-core`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod features;
pub mod history;
pub mod repositories;
pub mod resolver;
pub mod runner;
pub mod snapshot;
pub mod sources;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::StderrAuditSink;
pub use audit::audit_sink_from_config;
pub use features::features_for_candidate;
pub use history::HistoryBackend;
pub use history::JsonlOutcomeLog;
pub use repositories::LoadedRepositories;
pub use repositories::load_repositories;
pub use repositories::parse_requirements;
pub use resolver::CommandResolver;
pub use runner::GuardRunner;
pub use runner::RunReport;
pub use runner::RunnerError;
pub use runner::SharedResolver;
pub use snapshot::LatestPointer;
pub use snapshot::SnapshotBundle;
pub use snapshot::SnapshotError;
pub use snapshot::SnapshotVerification;
pub use snapshot::SnapshotWriter;
pub use sources::CollectedSources;
pub use sources::FEED_KINDS;
pub use sources::collect_sources;
