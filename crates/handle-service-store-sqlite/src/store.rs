// crates/handle-service-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Handle Store
// Description: Durable HandleStore backed by SQLite WAL.
// Purpose: Persist handle records with parameterized, whitelisted lookups.
// Dependencies: handle-service-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`HandleStore`] using `SQLite`. Field
//! lookups map [`HandleField`] onto a fixed column whitelist and bind every
//! value as a parameter, so caller input never reaches SQL text.
//! Security posture: database contents are untrusted and rows with empty
//! required columns are reported as corruption.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use handle_service_core::Handle;
use handle_service_core::HandleField;
use handle_service_core::HandleId;
use handle_service_core::HandleStore;
use handle_service_core::NodeId;
use handle_service_core::Projection;
use handle_service_core::StoreError;
use handle_service_core::StoredHandle;
use handle_service_core::UserId;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use rusqlite::params_from_iter;
use serde::Deserialize;
use thiserror::Error;

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
/// Maximum bound parameters per lookup statement.
const LOOKUP_CHUNK: usize = 500;
/// Columns selected for every handle read, in row order.
const HANDLE_COLUMNS: &str = "storage_key, hid, node_id, file_name, backend_type, url, \
                              remote_md5, remote_sha1, created_by, creation_date";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
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
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
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

/// Configuration for the `SQLite` handle store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
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
    /// Creates a config with default tuning for `path`.
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
    /// Store corruption.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration.
    #[error("sqlite store invalid config: {0}")]
    Invalid(String),
    /// Insert collided with an existing handle id.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Update targeted a missing handle id.
    #[error("sqlite store missing record: {0}")]
    NotFound(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) | SqliteStoreError::Invalid(message) => {
                Self::Store(message)
            }
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
        }
    }
}

/// Maps a generic `SQLite` error.
fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed handle store with WAL support.
#[derive(Clone)]
pub struct SqliteHandleStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteHandleStore {
    /// Opens an `SQLite`-backed handle store.
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
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    /// Returns the number of stored handles.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the count query fails.
    pub fn count(&self) -> Result<u64, SqliteStoreError> {
        let guard = self.lock()?;
        let count: i64 = guard
            .query_row("SELECT COUNT(*) FROM handles", params![], |row| row.get(0))
            .map_err(|err| db_error(&err))?;
        drop(guard);
        u64::try_from(count).map_err(|_| SqliteStoreError::Corrupt("negative row count".into()))
    }

    /// Acquires the connection lock.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Reads handles whose `field` matches any of `values`.
    fn find_rows(
        &self,
        field: HandleField,
        values: &BTreeSet<String>,
    ) -> Result<Vec<(i64, Handle)>, SqliteStoreError> {
        let column = column_for(field);
        let values: Vec<&String> = values.iter().collect();
        let mut rows = Vec::new();
        let guard = self.lock()?;
        for chunk in values.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("SELECT {HANDLE_COLUMNS} FROM handles WHERE {column} IN ({placeholders})");
            let mut statement = guard.prepare(&sql).map_err(|err| db_error(&err))?;
            let mapped = statement
                .query_map(params_from_iter(chunk.iter()), read_row)
                .map_err(|err| db_error(&err))?;
            for row in mapped {
                rows.push(row.map_err(|err| db_error(&err))??);
            }
        }
        drop(guard);
        rows.sort_by_key(|(key, _)| *key);
        rows.dedup_by_key(|(key, _)| *key);
        Ok(rows)
    }

    /// Inserts a new handle row.
    fn insert_row(&self, handle: &Handle) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        let result = guard.execute(
            "INSERT INTO handles (hid, node_id, file_name, backend_type, url, remote_md5, \
             remote_sha1, created_by, creation_date) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                handle.hid.as_str(),
                handle.id.as_str(),
                handle.file_name,
                handle.backend_type,
                handle.url,
                handle.remote_md5,
                handle.remote_sha1,
                handle.created_by.as_str(),
                handle.creation_date,
            ],
        );
        drop(guard);
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Err(SqliteStoreError::Conflict(format!("handle {} already exists", handle.hid)))
            }
            Err(err) => Err(db_error(&err)),
        }
    }

    /// Replaces the row stored under the handle id.
    fn update_row(&self, handle: &Handle) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        let changed = guard
            .execute(
                "UPDATE handles SET node_id = ?2, file_name = ?3, backend_type = ?4, url = ?5, \
                 remote_md5 = ?6, remote_sha1 = ?7, created_by = ?8, creation_date = ?9 WHERE \
                 hid = ?1",
                params![
                    handle.hid.as_str(),
                    handle.id.as_str(),
                    handle.file_name,
                    handle.backend_type,
                    handle.url,
                    handle.remote_md5,
                    handle.remote_sha1,
                    handle.created_by.as_str(),
                    handle.creation_date,
                ],
            )
            .map_err(|err| db_error(&err))?;
        drop(guard);
        if changed == 0 {
            return Err(SqliteStoreError::NotFound(format!("handle {} not stored", handle.hid)));
        }
        Ok(())
    }

    /// Deletes rows by handle id in one transaction.
    fn delete_rows(&self, hids: &BTreeSet<HandleId>) -> Result<u64, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        let mut removed = 0_u64;
        for hid in hids {
            let changed = tx
                .execute("DELETE FROM handles WHERE hid = ?1", params![hid.as_str()])
                .map_err(|err| db_error(&err))?;
            removed += u64::try_from(changed).unwrap_or(0);
        }
        tx.commit().map_err(|err| db_error(&err))?;
        drop(guard);
        Ok(removed)
    }
}

impl HandleStore for SqliteHandleStore {
    fn find_by_field(
        &self,
        field: HandleField,
        values: &BTreeSet<String>,
        projection: Projection,
    ) -> Result<Vec<StoredHandle>, StoreError> {
        let rows = self.find_rows(field, values)?;
        Ok(rows
            .into_iter()
            .map(|(key, handle)| StoredHandle {
                storage_key: match projection {
                    Projection::Public => None,
                    Projection::WithStorageKey => Some(key),
                },
                handle,
            })
            .collect())
    }

    fn insert(&self, handle: &Handle) -> Result<(), StoreError> {
        self.insert_row(handle).map_err(StoreError::from)
    }

    fn update(&self, handle: &Handle) -> Result<(), StoreError> {
        self.update_row(handle).map_err(StoreError::from)
    }

    fn delete_by_hids(&self, hids: &BTreeSet<HandleId>) -> Result<u64, StoreError> {
        self.delete_rows(hids).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Returns the column backing a handle field.
const fn column_for(field: HandleField) -> &'static str {
    match field {
        HandleField::Hid => "hid",
        HandleField::Id => "node_id",
        HandleField::FileName => "file_name",
        HandleField::Type => "backend_type",
        HandleField::Url => "url",
        HandleField::RemoteMd5 => "remote_md5",
        HandleField::RemoteSha1 => "remote_sha1",
        HandleField::CreatedBy => "created_by",
        HandleField::CreationDate => "creation_date",
    }
}

/// Maps a row to its storage key and handle, flagging corrupt rows.
fn read_row(row: &Row<'_>) -> rusqlite::Result<Result<(i64, Handle), SqliteStoreError>> {
    let key: i64 = row.get(0)?;
    let hid: String = row.get(1)?;
    let node_id: String = row.get(2)?;
    let file_name: String = row.get(3)?;
    let backend_type: String = row.get(4)?;
    let url: String = row.get(5)?;
    let remote_md5: Option<String> = row.get(6)?;
    let remote_sha1: Option<String> = row.get(7)?;
    let created_by: String = row.get(8)?;
    let creation_date: String = row.get(9)?;
    if [&hid, &node_id, &file_name, &backend_type, &url, &created_by]
        .iter()
        .any(|value| value.is_empty())
    {
        return Ok(Err(SqliteStoreError::Corrupt(format!(
            "row {key} has an empty required column"
        ))));
    }
    Ok(Ok((
        key,
        Handle {
            hid: HandleId::new(hid),
            id: NodeId::new(node_id),
            file_name,
            backend_type,
            url,
            remote_md5: remote_md5.filter(|value| !value.is_empty()),
            remote_sha1: remote_sha1.filter(|value| !value.is_empty()),
            created_by: UserId::new(created_by),
            creation_date,
        },
    )))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

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

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS handles (
                    storage_key INTEGER PRIMARY KEY AUTOINCREMENT,
                    hid TEXT NOT NULL UNIQUE,
                    node_id TEXT NOT NULL,
                    file_name TEXT NOT NULL,
                    backend_type TEXT NOT NULL,
                    url TEXT NOT NULL,
                    remote_md5 TEXT,
                    remote_sha1 TEXT,
                    created_by TEXT NOT NULL,
                    creation_date TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_handles_node_id ON handles (node_id);
                CREATE INDEX IF NOT EXISTS idx_handles_created_by ON handles (created_by);",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}
