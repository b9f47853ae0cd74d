// crates/ontocore-sync/src/state.rs
// ============================================================================
// Module: Projection Sync State
// Description: Per-row sync status tracking, independent of the ledger
//              schema itself.
// Purpose: Give the batch scanner a durable answer to "has this row been
//          projected, and if not, is it due for a retry yet".
// Dependencies: ontocore-core, rusqlite
// ============================================================================

//! ## Overview
//! Spec §4.6 calls for "a ledger flag `neo4j_synced=true`" per projected
//! row, but the ledger's own tables (§3) carry no such flag. Rather than
//! widen `catalog`/`assignment`/`axial` with a projection-specific column,
//! this module keeps a small side table keyed by
//! `(project_id, entity_kind, entity_key)`, mirroring the pluggable,
//! typed-error backend trait `decision-gate-mcp`'s runpack storage uses for
//! its own side-channel persistence.

use std::path::Path;
use std::sync::Mutex;

use ontocore_core::error::ErrorKind;
use ontocore_core::error::OntoError;
use ontocore_core::identifiers::ProjectId;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

/// The kind of entity a sync-state row tracks, per §4.6's ordering
/// (fragments, then codes, then axial relations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEntityKind {
    /// A transcript fragment node.
    Fragment,
    /// A catalog code node.
    Code,
    /// A category-to-code axial edge.
    Axial,
}

impl SyncEntityKind {
    /// Stable label used as the state table's discriminator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fragment => "fragment",
            Self::Code => "code",
            Self::Axial => "axial",
        }
    }
}

/// Tracks whether a given entity has been projected, and when it may next
/// be retried after a transient failure.
pub trait SyncStateStore: Send + Sync {
    /// Returns `true` once `key` has been successfully projected.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn is_synced(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        key: &str,
    ) -> Result<bool, OntoError>;

    /// Returns `true` if `key` has never been attempted, or its last
    /// recorded retry deadline has passed.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn due_for_retry(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        key: &str,
        now_ms: i64,
    ) -> Result<bool, OntoError>;

    /// Records a successful projection.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn mark_synced(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        key: &str,
        at_ms: i64,
    ) -> Result<(), OntoError>;

    /// Records a failed attempt, along with the next moment it may be
    /// retried (`None` once retries are exhausted).
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn record_failure(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        key: &str,
        attempts: u32,
        error: &str,
        next_retry_at_ms: Option<i64>,
    ) -> Result<(), OntoError>;

    /// Returns the number of attempts already recorded for `key`, or `0`
    /// if it has never failed or been synced.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn attempts_for(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        key: &str,
    ) -> Result<u32, OntoError>;
}

/// `SQLite`-backed [`SyncStateStore`], independent of the ledger database.
pub struct SqliteSyncStateStore {
    connection: Mutex<Connection>,
}

impl SqliteSyncStateStore {
    /// Opens (or creates) the sync-state database at `path`.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` if the database cannot
    /// be opened or initialized.
    pub fn open(path: &Path) -> Result<Self, OntoError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|err| OntoError::new(ErrorKind::Dependency, err.to_string()))?;
        }
        let connection = Connection::open(path)
            .map_err(|err| OntoError::new(ErrorKind::Dependency, err.to_string()))?;
        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sync_state (
                    project_id        INTEGER NOT NULL,
                    kind              TEXT NOT NULL,
                    key               TEXT NOT NULL,
                    synced_at_ms      INTEGER,
                    attempts          INTEGER NOT NULL DEFAULT 0,
                    last_error        TEXT,
                    next_retry_at_ms  INTEGER,
                    PRIMARY KEY (project_id, kind, key)
                );",
            )
            .map_err(|err| OntoError::new(ErrorKind::Dependency, err.to_string()))?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Opens an in-memory sync-state store, for tests and single-run CLI
    /// invocations that do not need to remember state across processes.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` if the schema cannot be
    /// initialized.
    pub fn open_in_memory() -> Result<Self, OntoError> {
        let connection = Connection::open_in_memory()
            .map_err(|err| OntoError::new(ErrorKind::Dependency, err.to_string()))?;
        connection
            .execute_batch(
                "CREATE TABLE sync_state (
                    project_id        INTEGER NOT NULL,
                    kind              TEXT NOT NULL,
                    key               TEXT NOT NULL,
                    synced_at_ms      INTEGER,
                    attempts          INTEGER NOT NULL DEFAULT 0,
                    last_error        TEXT,
                    next_retry_at_ms  INTEGER,
                    PRIMARY KEY (project_id, kind, key)
                );",
            )
            .map_err(|err| OntoError::new(ErrorKind::Dependency, err.to_string()))?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

impl SyncStateStore for SqliteSyncStateStore {
    fn is_synced(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        key: &str,
    ) -> Result<bool, OntoError> {
        let connection = self
            .connection
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let synced: Option<i64> = connection
            .query_row(
                "SELECT synced_at_ms FROM sync_state WHERE project_id = ?1 AND kind = ?2 AND key = ?3",
                params![project_id.get(), kind.as_str(), key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| OntoError::new(ErrorKind::Dependency, err.to_string()))?
            .flatten();
        Ok(synced.is_some())
    }

    fn due_for_retry(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        key: &str,
        now_ms: i64,
    ) -> Result<bool, OntoError> {
        let connection = self
            .connection
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let row: Option<(Option<i64>, Option<i64>)> = connection
            .query_row(
                "SELECT synced_at_ms, next_retry_at_ms FROM sync_state \
                 WHERE project_id = ?1 AND kind = ?2 AND key = ?3",
                params![project_id.get(), kind.as_str(), key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|err| OntoError::new(ErrorKind::Dependency, err.to_string()))?;
        Ok(match row {
            None => true,
            Some((Some(_), _)) => false,
            Some((None, None)) => true,
            Some((None, Some(next_retry_at_ms))) => now_ms >= next_retry_at_ms,
        })
    }

    fn mark_synced(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        key: &str,
        at_ms: i64,
    ) -> Result<(), OntoError> {
        let connection = self
            .connection
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        connection
            .execute(
                "INSERT INTO sync_state (project_id, kind, key, synced_at_ms, attempts, \
                 last_error, next_retry_at_ms) VALUES (?1, ?2, ?3, ?4, 0, NULL, NULL) \
                 ON CONFLICT (project_id, kind, key) DO UPDATE SET \
                 synced_at_ms = excluded.synced_at_ms, last_error = NULL, next_retry_at_ms = NULL",
                params![project_id.get(), kind.as_str(), key, at_ms],
            )
            .map_err(|err| OntoError::new(ErrorKind::Dependency, err.to_string()))?;
        Ok(())
    }

    fn record_failure(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        key: &str,
        attempts: u32,
        error: &str,
        next_retry_at_ms: Option<i64>,
    ) -> Result<(), OntoError> {
        let connection = self
            .connection
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        connection
            .execute(
                "INSERT INTO sync_state (project_id, kind, key, synced_at_ms, attempts, \
                 last_error, next_retry_at_ms) VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6) \
                 ON CONFLICT (project_id, kind, key) DO UPDATE SET \
                 attempts = excluded.attempts, last_error = excluded.last_error, \
                 next_retry_at_ms = excluded.next_retry_at_ms",
                params![project_id.get(), kind.as_str(), key, attempts, error, next_retry_at_ms],
            )
            .map_err(|err| OntoError::new(ErrorKind::Dependency, err.to_string()))?;
        Ok(())
    }

    fn attempts_for(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        key: &str,
    ) -> Result<u32, OntoError> {
        let connection = self
            .connection
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let attempts: Option<i64> = connection
            .query_row(
                "SELECT attempts FROM sync_state WHERE project_id = ?1 AND kind = ?2 AND key = ?3",
                params![project_id.get(), kind.as_str(), key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| OntoError::new(ErrorKind::Dependency, err.to_string()))?;
        Ok(attempts.unwrap_or(0).try_into().unwrap_or(u32::MAX))
    }
}
