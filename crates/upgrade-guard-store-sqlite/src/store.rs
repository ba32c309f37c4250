// crates/upgrade-guard-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Outcome Store
// Description: Append-only historical-outcome log backed by SQLite WAL.
// Purpose: Persist update outcomes with integrity-checked canonical rows.
// Dependencies: upgrade-guard-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Each appended [`HistoricalOutcome`] is stored as canonical JSON together
//! with its digest and a monotonically increasing sequence number. Nothing
//! updates or deletes rows, so the table is the append-only log. Loads
//! return rows in sequence order, re-hash every payload and fail closed on
//! any mismatch. A single connection behind a mutex serializes writers
//! within a process; `SQLite` locking serializes writers across processes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use upgrade_guard_core::HashDigest;
use upgrade_guard_core::HistoricalOutcome;
use upgrade_guard_core::OutcomeRepository;
use upgrade_guard_core::OutcomeStoreError;
use upgrade_guard_core::PackageName;
use upgrade_guard_core::hashing::DIGEST_ALGORITHM;
use upgrade_guard_core::hashing::canonical_json_bytes;
use upgrade_guard_core::time::format_timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum canonical size of one outcome row.
pub const MAX_OUTCOME_BYTES: usize = 256 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` outcome store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Outcome payload exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for OutcomeStoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => {
                Self::Store(format!("version mismatch: {message}"))
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "outcome_json exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed append-only outcome log.
#[derive(Clone)]
pub struct SqliteOutcomeStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

/// One stored row before verification.
struct StoredRow {
    /// Append sequence number.
    seq: i64,
    /// Package column.
    package: String,
    /// Canonical JSON payload.
    bytes: Vec<u8>,
    /// Stored digest value.
    hash: String,
    /// Stored digest algorithm label.
    algorithm: String,
}

impl SqliteOutcomeStore {
    /// Opens an `SQLite`-backed outcome store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the number of stored outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the count query fails.
    pub fn len(&self) -> Result<usize, SqliteStoreError> {
        let guard =
            self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
        let count: i64 = guard
            .query_row("SELECT COUNT(*) FROM outcomes", params![], |row| row.get(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        usize::try_from(count).map_err(|_| SqliteStoreError::Corrupt("negative outcome count".to_string()))
    }

    /// Returns true when no outcome has been stored.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the count query fails.
    pub fn is_empty(&self) -> Result<bool, SqliteStoreError> {
        self.len().map(|count| count == 0)
    }

    /// Appends one outcome row.
    fn append_outcome(&self, outcome: &HistoricalOutcome) -> Result<(), SqliteStoreError> {
        if outcome.package.is_empty() {
            return Err(SqliteStoreError::Invalid("outcome package must be set".to_string()));
        }
        let canonical_json =
            canonical_json_bytes(outcome).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if canonical_json.len() > MAX_OUTCOME_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_OUTCOME_BYTES,
                actual_bytes: canonical_json.len(),
            });
        }
        let digest = HashDigest::of_bytes(&canonical_json);
        let mut guard =
            self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.execute(
            "INSERT INTO outcomes (package, recorded_at, outcome_json, outcome_hash, hash_algorithm, \
             saved_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                outcome.package.as_str(),
                format_timestamp(outcome.recorded_at),
                canonical_json,
                digest.hex(),
                DIGEST_ALGORITHM,
                unix_millis()
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(())
    }

    /// Loads and verifies rows, optionally for one package.
    fn load_outcomes(
        &self,
        package: Option<&PackageName>,
    ) -> Result<Vec<HistoricalOutcome>, SqliteStoreError> {
        let rows = {
            let guard = self
                .connection
                .lock()
                .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
            let sql = if package.is_some() {
                "SELECT seq, package, outcome_json, outcome_hash, hash_algorithm FROM outcomes \
                 WHERE package = ?1 ORDER BY seq"
            } else {
                "SELECT seq, package, outcome_json, outcome_hash, hash_algorithm FROM outcomes \
                 ORDER BY seq"
            };
            let mut statement =
                guard.prepare(sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let mapped = match package {
                Some(package) => statement.query_map(params![package.as_str()], read_row),
                None => statement.query_map(params![], read_row),
            }
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = mapped
                .collect::<Result<Vec<StoredRow>, _>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            drop(statement);
            drop(guard);
            rows
        };
        rows.into_iter().map(verify_row).collect()
    }
}

impl OutcomeRepository for SqliteOutcomeStore {
    fn append(&self, outcome: &HistoricalOutcome) -> Result<(), OutcomeStoreError> {
        self.append_outcome(outcome).map_err(OutcomeStoreError::from)
    }

    fn load_for_package(
        &self,
        package: &PackageName,
    ) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError> {
        self.load_outcomes(Some(package)).map_err(OutcomeStoreError::from)
    }

    fn load_all(&self) -> Result<Vec<HistoricalOutcome>, OutcomeStoreError> {
        self.load_outcomes(None).map_err(OutcomeStoreError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads one row of the outcome query.
fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        seq: row.get(0)?,
        package: row.get(1)?,
        bytes: row.get(2)?,
        hash: row.get(3)?,
        algorithm: row.get(4)?,
    })
}

/// Verifies a row's digest and decodes the outcome.
fn verify_row(row: StoredRow) -> Result<HistoricalOutcome, SqliteStoreError> {
    if row.bytes.len() > MAX_OUTCOME_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_OUTCOME_BYTES,
            actual_bytes: row.bytes.len(),
        });
    }
    if row.algorithm != DIGEST_ALGORITHM {
        return Err(SqliteStoreError::Invalid(format!("unsupported hash algorithm: {}", row.algorithm)));
    }
    let stored = HashDigest::from_hex(&row.hash)
        .map_err(|err| SqliteStoreError::Corrupt(format!("outcome {}: {err}", row.seq)))?;
    if !stored.matches(&row.bytes) {
        return Err(SqliteStoreError::Corrupt(format!("hash mismatch for outcome {}", row.seq)));
    }
    let outcome: HistoricalOutcome =
        serde_json::from_slice(&row.bytes).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if outcome.package.as_str() != row.package {
        return Err(SqliteStoreError::Invalid(format!(
            "package mismatch between column and payload for outcome {}",
            row.seq
        )));
    }
    Ok(outcome)
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must be set".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies journal, sync, and busy-timeout pragmas.
fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS outcomes (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    package TEXT NOT NULL,
                    recorded_at TEXT NOT NULL,
                    outcome_json BLOB NOT NULL,
                    outcome_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    saved_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_outcomes_package ON outcomes (package, seq);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
