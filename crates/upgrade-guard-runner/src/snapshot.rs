// crates/upgrade-guard-runner/src/snapshot.rs
// ============================================================================
// Module: Snapshot Writer
// Description: Atomic snapshot directories, latest pointer, and retention.
// Purpose: Persist each run's inputs and reports immutably and verifiably.
// Dependencies: upgrade-guard-core, serde, serde_json
// ============================================================================

//! ## Overview
//! A snapshot is staged in a hidden directory under the snapshot root and
//! renamed into place once every file and the manifest are written, so a
//! reader never sees a partial snapshot. The manifest records a digest per
//! file and a root digest over the sorted file list. `latest.json` is
//! replaced atomically after the rename. Pruning only ever removes
//! directories whose names parse as run ids and never the newest
//! `retain_latest` of them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use upgrade_guard_core::HashDigest;
use upgrade_guard_core::RetentionPolicy;
use upgrade_guard_core::Rollup;
use upgrade_guard_core::RunId;
use upgrade_guard_core::SnapshotCadence;
use upgrade_guard_core::SnapshotEntry;
use upgrade_guard_core::SnapshotFile;
use upgrade_guard_core::SnapshotManifest;
use upgrade_guard_core::runtime::entries_from_names;
use upgrade_guard_core::runtime::select_for_pruning;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Manifest filename inside a snapshot directory.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Latest-snapshot pointer filename under the root.
pub const LATEST_FILE: &str = "latest.json";
/// Prefix of staging directories.
const STAGING_PREFIX: &str = ".staging-";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Snapshot writer errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Filesystem failure.
    #[error("snapshot io error: {0}")]
    Io(String),
    /// Serialization or hashing failure.
    #[error("snapshot serialization error: {0}")]
    Serialization(String),
    /// Invalid snapshot request.
    #[error("invalid snapshot: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Content of one snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotBundle {
    /// Run identifier (directory name).
    pub run_id: RunId,
    /// Run start time.
    pub generated_at: OffsetDateTime,
    /// Optional run tag.
    pub tag: Option<String>,
    /// Files as snapshot-relative path and bytes.
    pub files: Vec<(String, Vec<u8>)>,
    /// Cadence measurements.
    pub cadence: SnapshotCadence,
    /// Run rollup.
    pub rollup: Rollup,
}

/// Pointer to the most recent snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestPointer {
    /// Run identifier.
    pub run_id: RunId,
    /// Run start time.
    #[serde(with = "upgrade_guard_core::time::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Manifest root digest.
    pub root_digest: HashDigest,
}

/// Offline verification result for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVerification {
    /// Count of checked files.
    pub checked_files: usize,
    /// Error messages, if any.
    pub errors: Vec<String>,
}

impl SnapshotVerification {
    /// Returns true when no errors were found.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Writes, lists, verifies, and prunes snapshots under a root directory.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    /// Snapshot root directory.
    root: PathBuf,
    /// Retention applied by [`SnapshotWriter::prune`].
    retention: RetentionPolicy,
}

impl SnapshotWriter {
    /// Creates a writer.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, retention: RetentionPolicy) -> Self {
        Self {
            root: root.into(),
            retention,
        }
    }

    /// Returns the snapshot root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of a snapshot.
    #[must_use]
    pub fn snapshot_dir(&self, run_id: &RunId) -> PathBuf {
        self.root.join(run_id.as_str())
    }

    /// Writes a snapshot and updates the latest pointer.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Invalid`] for unsafe file paths or an
    /// existing snapshot with the same run id, and [`SnapshotError::Io`] or
    /// [`SnapshotError::Serialization`] when writing fails.
    pub fn write(&self, bundle: SnapshotBundle) -> Result<SnapshotManifest, SnapshotError> {
        if bundle.run_id.started_at().is_none() {
            return Err(SnapshotError::Invalid(format!("run id {} has no timestamp", bundle.run_id)));
        }
        let final_dir = self.snapshot_dir(&bundle.run_id);
        if final_dir.exists() {
            return Err(SnapshotError::Invalid(format!("snapshot {} already exists", bundle.run_id)));
        }
        let mut seen = BTreeSet::new();
        for (path, _) in &bundle.files {
            validate_relative(path)?;
            if !seen.insert(path.as_str()) {
                return Err(SnapshotError::Invalid(format!("duplicate snapshot path: {path}")));
            }
        }
        fs::create_dir_all(&self.root)?;
        let staging = self.root.join(format!("{STAGING_PREFIX}{}", bundle.run_id));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let result = self.write_staged(&staging, bundle);
        let manifest = match result {
            Ok(manifest) => manifest,
            Err(err) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(err);
            }
        };
        fs::rename(&staging, &final_dir)?;
        let pointer = LatestPointer {
            run_id: manifest.run_id.clone(),
            generated_at: manifest.generated_at,
            root_digest: manifest.root_digest.clone(),
        };
        write_atomic(&self.root.join(LATEST_FILE), &manifest.run_id, &to_json(&pointer)?)?;
        Ok(manifest)
    }

    /// Writes files and manifest into the staging directory.
    fn write_staged(&self, staging: &Path, bundle: SnapshotBundle) -> Result<SnapshotManifest, SnapshotError> {
        let mut files = Vec::with_capacity(bundle.files.len());
        for (path, bytes) in bundle.files {
            let target = staging.join(&path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &bytes)?;
            files.push(SnapshotFile {
                path,
                digest: HashDigest::of_bytes(&bytes),
            });
        }
        files.sort_by(|left, right| left.path.cmp(&right.path));
        let root_digest = HashDigest::of_canonical_json(&files)
            .map_err(|err| SnapshotError::Serialization(err.to_string()))?;
        let manifest = SnapshotManifest {
            run_id: bundle.run_id,
            generated_at: bundle.generated_at,
            tag: bundle.tag,
            files,
            root_digest,
            retention: self.retention,
            cadence: bundle.cadence,
            rollup: bundle.rollup,
        };
        write_synced(&staging.join(MANIFEST_FILE), &to_json(&manifest)?)?;
        Ok(manifest)
    }

    /// Lists snapshots whose directory names parse as run ids.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] when the root cannot be read.
    pub fn list(&self) -> Result<Vec<SnapshotEntry>, SnapshotError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        let mut listed = entries_from_names(names);
        listed.sort_by(|left, right| left.created_at.cmp(&right.created_at).then_with(|| left.run_id.cmp(&right.run_id)));
        Ok(listed)
    }

    /// Reads the latest pointer, if one was written.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when the pointer exists but cannot be read.
    pub fn latest(&self) -> Result<Option<LatestPointer>, SnapshotError> {
        match fs::read(self.root.join(LATEST_FILE)) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|err| SnapshotError::Serialization(err.to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads a snapshot manifest.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when the manifest is missing or malformed.
    pub fn read_manifest(&self, run_id: &RunId) -> Result<SnapshotManifest, SnapshotError> {
        let bytes = fs::read(self.snapshot_dir(run_id).join(MANIFEST_FILE))?;
        serde_json::from_slice(&bytes).map_err(|err| SnapshotError::Serialization(err.to_string()))
    }

    /// Recomputes every file digest and the root digest of a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when the manifest cannot be read.
    pub fn verify(&self, run_id: &RunId) -> Result<SnapshotVerification, SnapshotError> {
        let manifest = self.read_manifest(run_id)?;
        let dir = self.snapshot_dir(run_id);
        let mut errors = Vec::new();
        let mut checked = 0usize;
        for file in &manifest.files {
            match fs::read(dir.join(&file.path)) {
                Ok(bytes) => {
                    if !file.digest.matches(&bytes) {
                        errors.push(format!("hash mismatch for {}", file.path));
                    }
                    checked = checked.saturating_add(1);
                }
                Err(_) => errors.push(format!("missing file {}", file.path)),
            }
        }
        match HashDigest::of_canonical_json(&manifest.files) {
            Ok(root) if root == manifest.root_digest => {}
            Ok(_) => errors.push("root digest mismatch".to_string()),
            Err(_) => errors.push("failed to compute root digest".to_string()),
        }
        Ok(SnapshotVerification {
            checked_files: checked,
            errors,
        })
    }

    /// Deletes snapshots selected by the retention policy.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] when listing or deletion fails.
    pub fn prune(&self, now: OffsetDateTime) -> Result<Vec<RunId>, SnapshotError> {
        let entries = self.list()?;
        let selected = select_for_pruning(&entries, &self.retention, now);
        for run_id in &selected {
            fs::remove_dir_all(self.snapshot_dir(run_id))?;
        }
        Ok(selected)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects absolute, empty, or parent-escaping snapshot paths.
fn validate_relative(path: &str) -> Result<(), SnapshotError> {
    let candidate = Path::new(path);
    let safe = !path.trim().is_empty()
        && candidate.components().all(|component| matches!(component, Component::Normal(_)));
    if !safe || path == MANIFEST_FILE {
        return Err(SnapshotError::Invalid(format!("unsafe snapshot path: {path}")));
    }
    Ok(())
}

/// Serializes a value as pretty JSON.
fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, SnapshotError> {
    serde_json::to_vec_pretty(value).map_err(|err| SnapshotError::Serialization(err.to_string()))
}

/// Writes a file and syncs it to disk.
fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Replaces a file atomically through a temporary sibling named for the
/// run, so concurrent writers never share a temporary file. The last rename
/// wins.
fn write_atomic(path: &Path, run_id: &RunId, bytes: &[u8]) -> Result<(), SnapshotError> {
    let file_name = path.file_name().map_or_else(String::new, |name| name.to_string_lossy().into_owned());
    let temp_path = path.with_file_name(format!(".{file_name}.{run_id}.tmp"));
    let written = write_synced(&temp_path, bytes)
        .and_then(|()| fs::rename(&temp_path, path).map_err(SnapshotError::from));
    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}
