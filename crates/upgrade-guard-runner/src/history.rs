// crates/upgrade-guard-runner/src/history.rs
// ============================================================================
// Module: Outcome History Backends
// Description: JSON-lines outcome log and the configured history backend.
// Purpose: Persist update outcomes append-only for the risk predictor.
// Dependencies: upgrade-guard-core, upgrade-guard-store-sqlite, serde_json
// ============================================================================

//! ## Overview
//! [`JsonlOutcomeLog`] appends one JSON object per outcome under a
//! process-level mutex so concurrent appenders never interleave lines.
//! [`HistoryBackend`] selects the memory, JSON-lines, or `SQLite` backend from
//! configuration behind a single [`OutcomeRepository`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use upgrade_guard_config::HistoryConfig;
use upgrade_guard_config::HistoryStoreType;
use upgrade_guard_core::HistoricalOutcome;
use upgrade_guard_core::OutcomeRepository;
use upgrade_guard_core::OutcomeStoreError;
use upgrade_guard_core::PackageName;
use upgrade_guard_core::runtime::InMemoryOutcomeLog;
use upgrade_guard_store_sqlite::MAX_OUTCOME_BYTES;
use upgrade_guard_store_sqlite::SqliteOutcomeStore;
use upgrade_guard_store_sqlite::SqliteStoreConfig;

// ============================================================================
// SECTION: JSON Lines Log
// ============================================================================

/// Append-only JSON lines outcome log.
///
/// # Invariants
/// - Lines are only ever appended; existing lines are never rewritten.
#[derive(Debug, Clone)]
pub struct JsonlOutcomeLog {
    /// Log file path.
    path: PathBuf,
    /// Serializes appends made through this log and its clones. Separate
    /// instances on the same path rely on each record being one append-mode
    /// write.
    lock: Arc<Mutex<()>>,
}

impl JsonlOutcomeLog {
    /// Creates a log at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeStoreError::Io`] when the parent directory cannot be
    /// created or the path names a directory.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, OutcomeStoreError> {
        let path = path.into();
        if path.is_dir() {
            return Err(OutcomeStoreError::Io(format!("history path is a directory: {}", path.display())));
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| OutcomeStoreError::Io(err.to_string()))?;
        }
        Ok(Self {
            path,
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// Returns the log path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses every line.
    fn read_all(&self) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(OutcomeStoreError::Io(err.to_string())),
        };
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|err| {
                    OutcomeStoreError::Corrupt(format!("history line {}: {err}", index + 1))
                })
            })
            .collect()
    }
}

impl OutcomeRepository for JsonlOutcomeLog {
    fn append(&self, outcome: &HistoricalOutcome) -> Result<(), OutcomeStoreError> {
        if outcome.package.is_empty() {
            return Err(OutcomeStoreError::Invalid("outcome package must be set".to_string()));
        }
        let mut line = serde_json::to_string(outcome).map_err(|err| OutcomeStoreError::Invalid(err.to_string()))?;
        if line.len() > MAX_OUTCOME_BYTES {
            return Err(OutcomeStoreError::Invalid(format!(
                "outcome exceeds size limit ({} > {MAX_OUTCOME_BYTES} bytes)",
                line.len()
            )));
        }
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| OutcomeStoreError::Io(err.to_string()))?;
        line.push('\n');
        file.write_all(line.as_bytes()).map_err(|err| OutcomeStoreError::Io(err.to_string()))?;
        file.flush().map_err(|err| OutcomeStoreError::Io(err.to_string()))
    }

    fn load_for_package(
        &self,
        package: &PackageName,
    ) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError> {
        Ok(self.read_all()?.into_iter().filter(|outcome| &outcome.package == package).collect())
    }

    fn load_all(&self) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError> {
        self.read_all()
    }
}

/// Error for a poisoned append lock.
fn poisoned() -> OutcomeStoreError {
    OutcomeStoreError::Store("history lock poisoned".to_string())
}

// ============================================================================
// SECTION: Configured Backend
// ============================================================================

/// History backend selected by configuration.
#[derive(Clone)]
pub enum HistoryBackend {
    /// In-memory log.
    Memory(InMemoryOutcomeLog),
    /// JSON lines file.
    Jsonl(JsonlOutcomeLog),
    /// `SQLite` database.
    Sqlite(SqliteOutcomeStore),
}

impl HistoryBackend {
    /// Opens the backend named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeStoreError`] when the backing store cannot be opened.
    pub fn from_config(config: &HistoryConfig) -> Result<Self, OutcomeStoreError> {
        match config.store_type {
            HistoryStoreType::Memory => Ok(Self::Memory(InMemoryOutcomeLog::new())),
            HistoryStoreType::Jsonl => {
                let path = config
                    .path
                    .as_ref()
                    .ok_or_else(|| OutcomeStoreError::Invalid("jsonl history requires path".to_string()))?;
                Ok(Self::Jsonl(JsonlOutcomeLog::new(path.clone())?))
            }
            HistoryStoreType::Sqlite => {
                let store_config: SqliteStoreConfig = config
                    .sqlite_config()
                    .ok_or_else(|| OutcomeStoreError::Invalid("sqlite history requires path".to_string()))?;
                Ok(Self::Sqlite(SqliteOutcomeStore::new(&store_config)?))
            }
        }
    }
}

impl OutcomeRepository for HistoryBackend {
    fn append(&self, outcome: &HistoricalOutcome) -> Result<(), OutcomeStoreError> {
        match self {
            Self::Memory(log) => log.append(outcome),
            Self::Jsonl(log) => log.append(outcome),
            Self::Sqlite(store) => store.append(outcome),
        }
    }

    fn load_for_package(
        &self,
        package: &PackageName,
    ) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError> {
        match self {
            Self::Memory(log) => log.load_for_package(package),
            Self::Jsonl(log) => log.load_for_package(package),
            Self::Sqlite(store) => store.load_for_package(package),
        }
    }

    fn load_all(&self) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError> {
        match self {
            Self::Memory(log) => log.load_all(),
            Self::Jsonl(log) => log.load_all(),
            Self::Sqlite(store) => store.load_all(),
        }
    }
}
