// crates/upgrade-guard-core/src/core/snapshot.rs
// ============================================================================
// Module: Upgrade Guard Snapshot Manifest
// Description: Manifest and retention types for per-run snapshots.
// Purpose: Describe the immutable record each run leaves behind.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A snapshot is a directory named by run id holding copies of every source
//! input and every derived report. The manifest lists each file with its
//! digest, a root digest over the file list, and the cadence measurements
//! taken during the run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::RunId;
use crate::core::severity::Rollup;

// ============================================================================
// SECTION: Retention
// ============================================================================

/// Default snapshot retention window in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
/// Default count of snapshots always retained.
pub const DEFAULT_RETAIN_LATEST: usize = 5;

/// Retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Snapshots older than this are eligible for pruning.
    pub retention_days: u32,
    /// The newest K snapshots are never pruned.
    pub retain_latest: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            retain_latest: DEFAULT_RETAIN_LATEST,
        }
    }
}

/// A snapshot found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Run identifier (directory name).
    pub run_id: RunId,
    /// Creation time parsed from the run id.
    pub created_at: OffsetDateTime,
}

// ============================================================================
// SECTION: Manifest
// ============================================================================

/// One file recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// Snapshot-relative path.
    pub path: String,
    /// Digest of the file bytes.
    pub digest: HashDigest,
}

/// Cadence measurements taken during the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotCadence {
    /// SBOM age in whole days.
    pub sbom_age_days: Option<i64>,
    /// SBOM age threshold.
    pub sbom_threshold_days: u32,
    /// Contract age in whole days.
    pub contract_age_days: Option<i64>,
    /// Contract review window.
    pub contract_review_days: u32,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
}

/// Snapshot manifest.
///
/// # Invariants
/// - `files` is sorted by path.
/// - `root_digest` is the canonical JSON hash of `files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// Run identifier.
    pub run_id: RunId,
    /// Run start time.
    #[serde(with = "crate::core::time::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Optional run tag.
    pub tag: Option<String>,
    /// Recorded files.
    pub files: Vec<SnapshotFile>,
    /// Digest over `files`.
    pub root_digest: HashDigest,
    /// Retention applied after the write.
    pub retention: RetentionPolicy,
    /// Cadence measurements.
    pub cadence: SnapshotCadence,
    /// Run rollup.
    pub rollup: Rollup,
}
