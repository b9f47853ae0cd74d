// crates/ontocore-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Ledger Store (C1)
// Description: Durable, project-scoped LedgerStore backed by SQLite WAL, a
//              serialized writer thread and a round-robin read pool.
// Purpose: The sole authoritative store for catalog, candidate, assignment,
//          axial, freeze, idempotency and version rows.
// Dependencies: ontocore-core, ontocore-config, rusqlite, serde_json,
//               thiserror
// ============================================================================

//! ## Overview
//! Mirrors `decision-gate-store-sqlite::store::SqliteRunStateStore`: a
//! single writer connection owned exclusively by a dedicated thread,
//! reached through a bounded [`std::sync::mpsc::sync_channel`] gateway, and
//! a small pool of read-only connections selected round-robin so readers
//! are never blocked by the writer under WAL. Unlike the teacher, which
//! threads a closed set of typed command variants (`Save`/`Register`/
//! `Readiness`) through the channel, this store's [`LedgerStore`] surface
//! has many more write operations, so the gateway carries a boxed
//! `FnOnce(&Connection)` job instead of growing a matching enum variant per
//! method.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::SyncSender;
use std::thread;

use ontocore_config::JournalMode;
use ontocore_config::LedgerConfig;
use ontocore_core::error::ErrorKind;
use ontocore_core::error::OntoError;
use ontocore_core::identifiers::CandidateId;
use ontocore_core::identifiers::CodeId;
use ontocore_core::identifiers::FragmentId;
use ontocore_core::identifiers::IdempotencyKey;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::interfaces::LedgerStore;
use ontocore_core::interfaces::ReadinessInputs;
use ontocore_core::model::AssignmentRow;
use ontocore_core::model::AxialRelationType;
use ontocore_core::model::AxialRow;
use ontocore_core::model::AxialState;
use ontocore_core::model::CandidateRow;
use ontocore_core::model::CandidateSource;
use ontocore_core::model::CandidateState;
use ontocore_core::model::CatalogRow;
use ontocore_core::model::CatalogStatus;
use ontocore_core::model::FreezeRow;
use ontocore_core::model::VersionAction;
use ontocore_core::model::VersionEvent;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use thiserror::Error;

use crate::schema;

/// A boxed unit of work run exclusively by the writer thread.
type WriterJob = Box<dyn FnOnce(&Connection) + Send>;

/// Errors internal to this store, before folding into [`OntoError`].
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Filesystem or connection-setup failure.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Row not found.
    #[error("sqlite store: {0} not found")]
    NotFound(String),
    /// A uniqueness or invariant check failed.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Stored data could not be decoded back into the domain model.
    #[error("sqlite store invalid stored data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for OntoError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => {
                OntoError::new(ErrorKind::Dependency, message)
            }
            SqliteStoreError::NotFound(message) => OntoError::not_found(message),
            SqliteStoreError::Conflict(message) => OntoError::conflict(message),
            SqliteStoreError::Invalid(message) => OntoError::new(ErrorKind::Internal, message),
        }
    }
}

/// Wraps a [`SqliteStoreError`] as a `rusqlite::Error` so row-mapping
/// closures (which `rusqlite` constrains to return `rusqlite::Result`) can
/// surface our own conversion failures without losing them.
fn to_rusqlite_error(error: SqliteStoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(error))
}

/// Opens a connection with the configured journal mode and busy timeout,
/// then ensures the schema exists.
fn open_connection(config: &LedgerConfig) -> Result<Connection, SqliteStoreError> {
    if let Some(parent) = config.path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    let connection =
        Connection::open(&config.path).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    let journal_mode = match config.journal_mode {
        JournalMode::Wal => "wal",
        JournalMode::Delete => "delete",
    };
    connection
        .pragma_update(None, "journal_mode", journal_mode)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    schema::initialize(&connection)?;
    Ok(connection)
}

/// Spawns the dedicated writer thread, returning the bounded sender jobs
/// are submitted through. The thread exits once every sender clone is
/// dropped.
fn spawn_writer(connection: Connection, capacity: usize) -> SyncSender<WriterJob> {
    let (sender, receiver) = mpsc::sync_channel::<WriterJob>(capacity);
    thread::spawn(move || {
        while let Ok(job) = receiver.recv() {
            job(&connection);
        }
    });
    sender
}

/// `SQLite`-backed [`LedgerStore`] (C1).
///
/// # Invariants
/// - All mutations run on a single dedicated writer thread, serializing
///   every write without relying on `SQLite`'s own locking.
/// - Reads are served from a round-robin pool of read-only connections and
///   are never blocked by the writer under WAL.
pub struct SqliteLedgerStore {
    read_connections: Vec<Mutex<Connection>>,
    read_cursor: AtomicUsize,
    writer: SyncSender<WriterJob>,
}

impl SqliteLedgerStore {
    /// Opens (or creates) the ledger database described by `config`.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] if the database cannot be opened or the
    /// schema cannot be initialized.
    pub fn open(config: &LedgerConfig) -> Result<Self, SqliteStoreError> {
        let write_connection = open_connection(config)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size.max(1));
        for _ in 0 .. config.read_pool_size.max(1) {
            read_connections.push(Mutex::new(open_connection(config)?));
        }
        let writer = spawn_writer(write_connection, config.writer_queue_capacity.max(1));
        Ok(Self {
            read_connections,
            read_cursor: AtomicUsize::new(0),
            writer,
        })
    }

    /// Opens an ephemeral on-disk store for tests, at `path`.
    ///
    /// # Errors
    /// Returns [`SqliteStoreError`] if the database cannot be opened.
    pub fn open_at(path: &Path) -> Result<Self, SqliteStoreError> {
        Self::open(&LedgerConfig {
            path: path.to_path_buf(),
            ..LedgerConfig::default()
        })
    }

    fn read_connection(&self) -> &Mutex<Connection> {
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % self.read_connections.len();
        &self.read_connections[index]
    }

    /// Runs `query` against a pooled read connection.
    fn with_read<T>(
        &self,
        query: impl FnOnce(&Connection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, OntoError> {
        let guard = self
            .read_connection()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        query(&guard).map_err(OntoError::from)
    }

    /// Submits `job` to the writer thread and blocks for its result.
    fn with_write<T: Send + 'static>(
        &self,
        job: impl FnOnce(&Connection) -> Result<T, SqliteStoreError> + Send + 'static,
    ) -> Result<T, OntoError> {
        let (tx, rx) = mpsc::channel();
        let boxed: WriterJob = Box::new(move |connection| {
            let _ = tx.send(job(connection));
        });
        self.writer
            .send(boxed)
            .map_err(|_| OntoError::dependency("ledger writer thread is gone"))?;
        rx.recv()
            .map_err(|_| OntoError::dependency("ledger writer thread dropped its response"))?
            .map_err(OntoError::from)
    }
}

// ============================================================================
// SECTION: Row (de)serialization
// ============================================================================

fn catalog_status_to_str(status: CatalogStatus) -> &'static str {
    match status {
        CatalogStatus::Active => "active",
        CatalogStatus::Merged => "merged",
        CatalogStatus::Deprecated => "deprecated",
    }
}

fn catalog_status_from_str(value: &str) -> Result<CatalogStatus, SqliteStoreError> {
    match value {
        "active" => Ok(CatalogStatus::Active),
        "merged" => Ok(CatalogStatus::Merged),
        "deprecated" => Ok(CatalogStatus::Deprecated),
        other => Err(SqliteStoreError::Invalid(format!("unknown catalog status {other}"))),
    }
}

fn candidate_source_to_str(source: CandidateSource) -> &'static str {
    match source {
        CandidateSource::Manual => "manual",
        CandidateSource::Llm => "llm",
        CandidateSource::Discovery => "discovery",
        CandidateSource::Semantic => "semantic",
        CandidateSource::Legacy => "legacy",
    }
}

fn candidate_source_from_str(value: &str) -> Result<CandidateSource, SqliteStoreError> {
    match value {
        "manual" => Ok(CandidateSource::Manual),
        "llm" => Ok(CandidateSource::Llm),
        "discovery" => Ok(CandidateSource::Discovery),
        "semantic" => Ok(CandidateSource::Semantic),
        "legacy" => Ok(CandidateSource::Legacy),
        other => Err(SqliteStoreError::Invalid(format!("unknown candidate source {other}"))),
    }
}

fn candidate_state_to_str(state: CandidateState) -> &'static str {
    match state {
        CandidateState::Pending => "pending",
        CandidateState::Validated => "validated",
        CandidateState::Rejected => "rejected",
        CandidateState::Merged => "merged",
    }
}

fn candidate_state_from_str(value: &str) -> Result<CandidateState, SqliteStoreError> {
    match value {
        "pending" => Ok(CandidateState::Pending),
        "validated" => Ok(CandidateState::Validated),
        "rejected" => Ok(CandidateState::Rejected),
        "merged" => Ok(CandidateState::Merged),
        other => Err(SqliteStoreError::Invalid(format!("unknown candidate state {other}"))),
    }
}

fn axial_relation_to_str(relation: AxialRelationType) -> &'static str {
    match relation {
        AxialRelationType::Cause => "cause",
        AxialRelationType::Condition => "condition",
        AxialRelationType::Consequence => "consequence",
        AxialRelationType::PartOf => "part_of",
    }
}

fn axial_relation_from_str(value: &str) -> Result<AxialRelationType, SqliteStoreError> {
    match value {
        "cause" => Ok(AxialRelationType::Cause),
        "condition" => Ok(AxialRelationType::Condition),
        "consequence" => Ok(AxialRelationType::Consequence),
        "part_of" => Ok(AxialRelationType::PartOf),
        other => Err(SqliteStoreError::Invalid(format!("unknown axial relation {other}"))),
    }
}

fn axial_state_to_str(state: AxialState) -> &'static str {
    match state {
        AxialState::Pending => "pending",
        AxialState::Validated => "validated",
        AxialState::Rejected => "rejected",
    }
}

fn axial_state_from_str(value: &str) -> Result<AxialState, SqliteStoreError> {
    match value {
        "pending" => Ok(AxialState::Pending),
        "validated" => Ok(AxialState::Validated),
        "rejected" => Ok(AxialState::Rejected),
        other => Err(SqliteStoreError::Invalid(format!("unknown axial state {other}"))),
    }
}

fn version_action_to_str(action: VersionAction) -> &'static str {
    match action {
        VersionAction::Create => "create",
        VersionAction::Rename => "rename",
        VersionAction::Merge => "merge",
        VersionAction::Unmerge => "unmerge",
        VersionAction::Promote => "promote",
        VersionAction::Deprecate => "deprecate",
        VersionAction::RepairCycle => "repair_cycle",
    }
}

fn version_action_from_str(value: &str) -> Result<VersionAction, SqliteStoreError> {
    match value {
        "create" => Ok(VersionAction::Create),
        "rename" => Ok(VersionAction::Rename),
        "merge" => Ok(VersionAction::Merge),
        "unmerge" => Ok(VersionAction::Unmerge),
        "promote" => Ok(VersionAction::Promote),
        "deprecate" => Ok(VersionAction::Deprecate),
        "repair_cycle" => Ok(VersionAction::RepairCycle),
        other => Err(SqliteStoreError::Invalid(format!("unknown version action {other}"))),
    }
}

fn code_id_from_i64(raw: i64) -> Result<CodeId, SqliteStoreError> {
    let raw = u64::try_from(raw).map_err(|_| SqliteStoreError::Invalid("negative code_id".to_string()))?;
    CodeId::from_raw(raw).ok_or_else(|| SqliteStoreError::Invalid("code_id must be non-zero".to_string()))
}

fn candidate_id_from_i64(raw: i64) -> Result<CandidateId, SqliteStoreError> {
    let raw =
        u64::try_from(raw).map_err(|_| SqliteStoreError::Invalid("negative candidate id".to_string()))?;
    CandidateId::from_raw(raw)
        .ok_or_else(|| SqliteStoreError::Invalid("candidate id must be non-zero".to_string()))
}

fn project_id_from_i64(raw: i64) -> Result<ProjectId, SqliteStoreError> {
    let raw =
        u64::try_from(raw).map_err(|_| SqliteStoreError::Invalid("negative project id".to_string()))?;
    ProjectId::from_raw(raw)
        .ok_or_else(|| SqliteStoreError::Invalid("project id must be non-zero".to_string()))
}

fn row_to_catalog(row: &Row<'_>) -> rusqlite::Result<CatalogRow> {
    let code_id: i64 = row.get("code_id")?;
    let project_id: i64 = row.get("project_id")?;
    let codigo: String = row.get("codigo")?;
    let status: String = row.get("status")?;
    let canonical_code_id: Option<i64> = row.get("canonical_code_id")?;
    let memo: Option<String> = row.get("memo")?;
    let created_at_ms: i64 = row.get("created_at_ms")?;
    let updated_at_ms: i64 = row.get("updated_at_ms")?;
    (|| {
        Ok(CatalogRow {
            code_id: code_id_from_i64(code_id)?,
            project_id: project_id_from_i64(project_id)?,
            codigo,
            status: catalog_status_from_str(&status)?,
            canonical_code_id: canonical_code_id.map(code_id_from_i64).transpose()?,
            memo,
            created_at_ms,
            updated_at_ms,
        })
    })()
    .map_err(to_rusqlite_error)
}

fn row_to_candidate(row: &Row<'_>) -> rusqlite::Result<CandidateRow> {
    let id: i64 = row.get("id")?;
    let project_id: i64 = row.get("project_id")?;
    let codigo: String = row.get("codigo")?;
    let fragment_id: Option<String> = row.get("fragment_id")?;
    let source: String = row.get("source")?;
    let confidence: f64 = row.get("confidence")?;
    let state: String = row.get("state")?;
    let merged_into: Option<String> = row.get("merged_into")?;
    let memo: Option<String> = row.get("memo")?;
    let validator: Option<String> = row.get("validator")?;
    let created_at_ms: i64 = row.get("created_at_ms")?;
    let updated_at_ms: i64 = row.get("updated_at_ms")?;
    (|| {
        Ok(CandidateRow {
            id: candidate_id_from_i64(id)?,
            project_id: project_id_from_i64(project_id)?,
            codigo,
            fragment_id: fragment_id.map(FragmentId::new),
            source: candidate_source_from_str(&source)?,
            confidence,
            state: candidate_state_from_str(&state)?,
            merged_into,
            memo,
            validator,
            created_at_ms,
            updated_at_ms,
        })
    })()
    .map_err(to_rusqlite_error)
}

fn row_to_assignment(row: &Row<'_>) -> rusqlite::Result<AssignmentRow> {
    let project_id: i64 = row.get("project_id")?;
    let fragment_id: String = row.get("fragment_id")?;
    let codigo: String = row.get("codigo")?;
    let code_id: Option<i64> = row.get("code_id")?;
    let cita: String = row.get("cita")?;
    let source_file: Option<String> = row.get("source_file")?;
    (|| {
        Ok(AssignmentRow {
            project_id: project_id_from_i64(project_id)?,
            fragment_id: FragmentId::new(fragment_id),
            codigo,
            code_id: code_id.map(code_id_from_i64).transpose()?,
            cita,
            source_file,
        })
    })()
    .map_err(to_rusqlite_error)
}

fn row_to_axial(row: &Row<'_>) -> rusqlite::Result<AxialRow> {
    let project_id: i64 = row.get("project_id")?;
    let categoria: String = row.get("categoria")?;
    let codigo: String = row.get("codigo")?;
    let code_id: i64 = row.get("code_id")?;
    let relation: String = row.get("relation")?;
    let memo: Option<String> = row.get("memo")?;
    let evidence_json: String = row.get("evidence_json")?;
    let state: String = row.get("state")?;
    (|| {
        let evidence: Vec<String> = serde_json::from_str(&evidence_json)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        Ok(AxialRow {
            project_id: project_id_from_i64(project_id)?,
            categoria,
            codigo,
            code_id: code_id_from_i64(code_id)?,
            relation: axial_relation_from_str(&relation)?,
            memo,
            evidence: evidence.into_iter().map(FragmentId::new).collect(),
            state: axial_state_from_str(&state)?,
        })
    })()
    .map_err(to_rusqlite_error)
}

fn row_to_version_event(project_id: ProjectId, row: &Row<'_>) -> rusqlite::Result<VersionEvent> {
    let code_id: Option<i64> = row.get("code_id")?;
    let action: String = row.get("action")?;
    let previous_json: Option<String> = row.get("previous_json")?;
    let next_json: Option<String> = row.get("next_json")?;
    let codigo: String = row.get("codigo")?;
    let actor: String = row.get("actor")?;
    let at_ms: i64 = row.get("at_ms")?;
    (|| {
        Ok(VersionEvent {
            project_id,
            codigo,
            code_id: code_id.map(code_id_from_i64).transpose()?,
            action: version_action_from_str(&action)?,
            actor,
            previous: previous_json
                .map(|text| serde_json::from_str(&text))
                .transpose()
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            next: next_json
                .map(|text| serde_json::from_str(&text))
                .transpose()
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?,
            at_ms,
        })
    })()
    .map_err(to_rusqlite_error)
}

// ============================================================================
// SECTION: LedgerStore
// ============================================================================

impl LedgerStore for SqliteLedgerStore {
    fn get_catalog_row(
        &self,
        project_id: ProjectId,
        code_id: CodeId,
    ) -> Result<Option<CatalogRow>, OntoError> {
        self.with_read(|connection| {
            connection
                .query_row(
                    "SELECT * FROM catalog WHERE project_id = ?1 AND code_id = ?2",
                    params![project_id.get(), code_id.get()],
                    row_to_catalog,
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    fn get_catalog_row_by_label(
        &self,
        project_id: ProjectId,
        codigo: &str,
    ) -> Result<Option<CatalogRow>, OntoError> {
        self.with_read(|connection| {
            connection
                .query_row(
                    "SELECT * FROM catalog WHERE project_id = ?1 AND codigo_lower = lower(?2)",
                    params![project_id.get(), codigo],
                    row_to_catalog,
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    fn insert_catalog_row(
        &self,
        project_id: ProjectId,
        codigo: &str,
        memo: Option<&str>,
        now_ms: i64,
    ) -> Result<CatalogRow, OntoError> {
        let codigo = codigo.to_string();
        let memo = memo.map(str::to_string);
        self.with_write(move |connection| {
            let exists: Option<i64> = connection
                .query_row(
                    "SELECT code_id FROM catalog WHERE project_id = ?1 AND codigo_lower = lower(?2)",
                    params![project_id.get(), codigo],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            if exists.is_some() {
                return Err(SqliteStoreError::Conflict(format!(
                    "codigo {codigo} already exists for project {project_id}"
                )));
            }
            connection
                .execute(
                    "INSERT INTO catalog (project_id, codigo, codigo_lower, status, \
                     canonical_code_id, memo, created_at_ms, updated_at_ms) \
                     VALUES (?1, ?2, lower(?2), 'active', NULL, ?3, ?4, ?4)",
                    params![project_id.get(), codigo, memo, now_ms],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let code_id = code_id_from_i64(connection.last_insert_rowid())?;
            connection
                .execute(
                    "UPDATE catalog SET canonical_code_id = ?1 WHERE code_id = ?1",
                    params![code_id.get()],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(CatalogRow {
                code_id,
                project_id,
                codigo,
                status: CatalogStatus::Active,
                canonical_code_id: Some(code_id),
                memo,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            })
        })
    }

    fn update_catalog_row(&self, row: &CatalogRow) -> Result<(), OntoError> {
        let row = row.clone();
        self.with_write(move |connection| {
            let changed = connection
                .execute(
                    "UPDATE catalog SET codigo = ?2, codigo_lower = lower(?2), status = ?3, \
                     canonical_code_id = ?4, memo = ?5, updated_at_ms = ?6 WHERE code_id = ?1",
                    params![
                        row.code_id.get(),
                        row.codigo,
                        catalog_status_to_str(row.status),
                        row.canonical_code_id.map(CodeId::get),
                        row.memo,
                        row.updated_at_ms,
                    ],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            if changed == 0 {
                return Err(SqliteStoreError::NotFound(format!("catalog row {}", row.code_id)));
            }
            Ok(())
        })
    }

    fn list_catalog_rows(&self, project_id: ProjectId) -> Result<Vec<CatalogRow>, OntoError> {
        self.with_read(|connection| {
            let mut stmt = connection
                .prepare("SELECT * FROM catalog WHERE project_id = ?1 ORDER BY code_id")
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            stmt.query_map(params![project_id.get()], row_to_catalog)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    fn upsert_candidate(&self, candidate: &CandidateRow) -> Result<CandidateRow, OntoError> {
        let candidate = candidate.clone();
        self.with_write(move |connection| {
            let fragment_id = candidate.fragment_id.as_ref().map(FragmentId::as_str);
            let existing: Option<(i64, f64)> = connection
                .query_row(
                    "SELECT id, confidence FROM candidate WHERE project_id = ?1 AND \
                     codigo_lower = lower(?2) AND fragment_id IS ?3",
                    params![candidate.project_id.get(), candidate.codigo, fragment_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

            if let Some((existing_id, existing_confidence)) = existing {
                let confidence = existing_confidence.max(candidate.confidence);
                connection
                    .execute(
                        "UPDATE candidate SET confidence = ?2, updated_at_ms = ?3 WHERE id = ?1",
                        params![existing_id, confidence, candidate.updated_at_ms],
                    )
                    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                let mut row = candidate;
                row.id = candidate_id_from_i64(existing_id)?;
                row.confidence = confidence;
                return Ok(row);
            }

            connection
                .execute(
                    "INSERT INTO candidate (project_id, codigo, codigo_lower, fragment_id, \
                     source, confidence, state, merged_into, memo, validator, created_at_ms, \
                     updated_at_ms) \
                     VALUES (?1, ?2, lower(?2), ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        candidate.project_id.get(),
                        candidate.codigo,
                        fragment_id,
                        candidate_source_to_str(candidate.source),
                        candidate.confidence,
                        candidate_state_to_str(candidate.state),
                        candidate.merged_into,
                        candidate.memo,
                        candidate.validator,
                        candidate.created_at_ms,
                        candidate.updated_at_ms,
                    ],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let mut row = candidate;
            row.id = candidate_id_from_i64(connection.last_insert_rowid())?;
            Ok(row)
        })
    }

    fn get_candidate(
        &self,
        project_id: ProjectId,
        id: CandidateId,
    ) -> Result<Option<CandidateRow>, OntoError> {
        self.with_read(|connection| {
            connection
                .query_row(
                    "SELECT * FROM candidate WHERE id = ?1 AND project_id = ?2",
                    params![id.get(), project_id.get()],
                    row_to_candidate,
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    fn list_candidates_by_label(
        &self,
        project_id: ProjectId,
        codigo: &str,
    ) -> Result<Vec<CandidateRow>, OntoError> {
        self.with_read(|connection| {
            let mut stmt = connection
                .prepare(
                    "SELECT * FROM candidate WHERE project_id = ?1 AND codigo_lower = lower(?2)",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            stmt.query_map(params![project_id.get(), codigo], row_to_candidate)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    fn list_recent_candidates(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<CandidateRow>, OntoError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_read(|connection| {
            let mut stmt = connection
                .prepare(
                    "SELECT * FROM candidate WHERE project_id = ?1 ORDER BY created_at_ms DESC \
                     LIMIT ?2",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            stmt.query_map(params![project_id.get(), limit], row_to_candidate)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    fn update_candidate(&self, candidate: &CandidateRow) -> Result<(), OntoError> {
        let candidate = candidate.clone();
        self.with_write(move |connection| {
            let changed = connection
                .execute(
                    "UPDATE candidate SET codigo = ?2, codigo_lower = lower(?2), state = ?3, \
                     merged_into = ?4, memo = ?5, validator = ?6, updated_at_ms = ?7 \
                     WHERE id = ?1",
                    params![
                        candidate.id.get(),
                        candidate.codigo,
                        candidate_state_to_str(candidate.state),
                        candidate.merged_into,
                        candidate.memo,
                        candidate.validator,
                        candidate.updated_at_ms,
                    ],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            if changed == 0 {
                return Err(SqliteStoreError::NotFound(format!("candidate {}", candidate.id)));
            }
            Ok(())
        })
    }

    fn upsert_assignment(&self, assignment: &AssignmentRow) -> Result<(), OntoError> {
        let assignment = assignment.clone();
        self.with_write(move |connection| {
            connection
                .execute(
                    "INSERT INTO assignment (project_id, fragment_id, codigo, code_id, cita, \
                     source_file) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT (project_id, fragment_id, codigo) DO UPDATE SET \
                     code_id = excluded.code_id, cita = excluded.cita, \
                     source_file = excluded.source_file",
                    params![
                        assignment.project_id.get(),
                        assignment.fragment_id.as_str(),
                        assignment.codigo,
                        assignment.code_id.map(CodeId::get),
                        assignment.cita,
                        assignment.source_file,
                    ],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(())
        })
    }

    fn list_assignments(&self, project_id: ProjectId) -> Result<Vec<AssignmentRow>, OntoError> {
        self.with_read(|connection| {
            let mut stmt = connection
                .prepare("SELECT * FROM assignment WHERE project_id = ?1")
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            stmt.query_map(params![project_id.get()], row_to_assignment)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    fn upsert_axial(&self, axial: &AxialRow) -> Result<(), OntoError> {
        let axial = axial.clone();
        self.with_write(move |connection| {
            let evidence_json = serde_json::to_string(
                &axial.evidence.iter().map(FragmentId::as_str).collect::<Vec<_>>(),
            )
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
            connection
                .execute(
                    "INSERT INTO axial (project_id, categoria, codigo, code_id, relation, memo, \
                     evidence_json, state) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                     ON CONFLICT (project_id, categoria, codigo, relation) DO UPDATE SET \
                     code_id = excluded.code_id, memo = excluded.memo, \
                     evidence_json = excluded.evidence_json, state = excluded.state",
                    params![
                        axial.project_id.get(),
                        axial.categoria,
                        axial.codigo,
                        axial.code_id.get(),
                        axial_relation_to_str(axial.relation),
                        axial.memo,
                        evidence_json,
                        axial_state_to_str(axial.state),
                    ],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(())
        })
    }

    fn list_axial_rows(&self, project_id: ProjectId) -> Result<Vec<AxialRow>, OntoError> {
        self.with_read(|connection| {
            let mut stmt = connection
                .prepare("SELECT * FROM axial WHERE project_id = ?1")
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            stmt.query_map(params![project_id.get()], row_to_axial)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    fn readiness_inputs(&self, project_id: ProjectId) -> Result<ReadinessInputs, OntoError> {
        self.with_read(|connection| {
            let mut catalog_stmt = connection
                .prepare("SELECT * FROM catalog WHERE project_id = ?1 ORDER BY code_id")
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let catalog_rows = catalog_stmt
                .query_map(params![project_id.get()], row_to_catalog)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

            let mut assignment_stmt = connection
                .prepare("SELECT * FROM assignment WHERE project_id = ?1")
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let assignment_rows = assignment_stmt
                .query_map(params![project_id.get()], row_to_assignment)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

            let mut missing_assignment_stmt = connection
                .prepare(
                    "SELECT assignment.* FROM assignment JOIN catalog \
                     ON catalog.project_id = assignment.project_id \
                     AND catalog.codigo_lower = lower(assignment.codigo) \
                     WHERE assignment.project_id = ?1 AND assignment.code_id IS NULL",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let assignments_missing_code_id = missing_assignment_stmt
                .query_map(params![project_id.get()], row_to_assignment)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

            let mut missing_canonical_stmt = connection
                .prepare(
                    "SELECT * FROM catalog WHERE project_id = ?1 AND status = 'merged' AND \
                     (canonical_code_id IS NULL OR canonical_code_id NOT IN \
                     (SELECT code_id FROM catalog WHERE project_id = ?1))",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let catalog_missing_canonical = missing_canonical_stmt
                .query_map(params![project_id.get()], row_to_catalog)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

            Ok(ReadinessInputs {
                assignments_missing_code_id,
                catalog_missing_canonical,
                catalog_rows,
                assignment_rows,
            })
        })
    }

    fn get_freeze(&self, project_id: ProjectId) -> Result<FreezeRow, OntoError> {
        self.with_read(|connection| {
            let row = connection
                .query_row(
                    "SELECT * FROM freeze WHERE project_id = ?1",
                    params![project_id.get()],
                    |row| {
                        let is_frozen: i64 = row.get("is_frozen")?;
                        Ok(FreezeRow {
                            project_id,
                            is_frozen: is_frozen != 0,
                            frozen_at_ms: row.get("frozen_at_ms")?,
                            frozen_by: row.get("frozen_by")?,
                            broken_at_ms: row.get("broken_at_ms")?,
                            broken_by: row.get("broken_by")?,
                            note: row.get("note")?,
                        })
                    },
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(row.unwrap_or(FreezeRow {
                project_id,
                is_frozen: false,
                frozen_at_ms: None,
                frozen_by: None,
                broken_at_ms: None,
                broken_by: None,
                note: None,
            }))
        })
    }

    fn put_freeze(&self, freeze: &FreezeRow) -> Result<(), OntoError> {
        let freeze = freeze.clone();
        self.with_write(move |connection| {
            connection
                .execute(
                    "INSERT INTO freeze (project_id, is_frozen, frozen_at_ms, frozen_by, \
                     broken_at_ms, broken_by, note) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                     ON CONFLICT (project_id) DO UPDATE SET is_frozen = excluded.is_frozen, \
                     frozen_at_ms = excluded.frozen_at_ms, frozen_by = excluded.frozen_by, \
                     broken_at_ms = excluded.broken_at_ms, broken_by = excluded.broken_by, \
                     note = excluded.note",
                    params![
                        freeze.project_id.get(),
                        i64::from(freeze.is_frozen),
                        freeze.frozen_at_ms,
                        freeze.frozen_by,
                        freeze.broken_at_ms,
                        freeze.broken_by,
                        freeze.note,
                    ],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(())
        })
    }

    fn append_version_event(&self, event: &VersionEvent) -> Result<(), OntoError> {
        let event = event.clone();
        self.with_write(move |connection| {
            let previous_json = event
                .previous
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
            let next_json = event
                .next
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
            connection
                .execute(
                    "INSERT INTO version (project_id, codigo, code_id, action, actor, \
                     previous_json, next_json, at_ms) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        event.project_id.get(),
                        event.codigo,
                        event.code_id.map(CodeId::get),
                        version_action_to_str(event.action),
                        event.actor,
                        previous_json,
                        next_json,
                        event.at_ms,
                    ],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(())
        })
    }

    fn list_version_events(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<VersionEvent>, OntoError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_read(|connection| {
            let mut stmt = connection
                .prepare(
                    "SELECT * FROM version WHERE project_id = ?1 ORDER BY seq DESC LIMIT ?2",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            stmt.query_map(params![project_id.get(), limit], |row| {
                row_to_version_event(project_id, row)
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    fn get_idempotent_response(
        &self,
        project_id: ProjectId,
        key: &IdempotencyKey,
    ) -> Result<Option<serde_json::Value>, OntoError> {
        let key = key.as_str().to_string();
        self.with_read(|connection| {
            let stored: Option<String> = connection
                .query_row(
                    "SELECT response_json FROM idem WHERE project_id = ?1 AND idem_key = ?2",
                    params![project_id.get(), key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            stored
                .map(|text| serde_json::from_str(&text))
                .transpose()
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))
        })
    }

    fn put_idempotent_response(
        &self,
        project_id: ProjectId,
        key: &IdempotencyKey,
        response: &serde_json::Value,
        ttl_secs: u64,
        now_ms: i64,
    ) -> Result<(), OntoError> {
        let key = key.as_str().to_string();
        let response = response.clone();
        self.with_write(move |connection| {
            let response_json = serde_json::to_string(&response)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
            let expires_at_ms = now_ms.saturating_add(
                i64::try_from(ttl_secs.saturating_mul(1_000)).unwrap_or(i64::MAX),
            );
            connection
                .execute(
                    "INSERT INTO idem (project_id, idem_key, response_json, expires_at_ms) \
                     VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT (project_id, idem_key) DO UPDATE SET \
                     response_json = excluded.response_json, \
                     expires_at_ms = excluded.expires_at_ms",
                    params![project_id.get(), key, response_json, expires_at_ms],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions use unwrap/expect for clarity."
    )]

    use std::num::NonZeroU64;

    use ontocore_core::model::CandidateSource as Source;
    use ontocore_core::model::CandidateState as State;

    use super::*;

    fn project() -> ProjectId {
        ProjectId::new(NonZeroU64::new(1).expect("non-zero"))
    }

    fn temp_store() -> (tempfile::TempDir, SqliteLedgerStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteLedgerStore::open_at(&dir.path().join("ledger.sqlite3")).expect("open");
        (dir, store)
    }

    #[test]
    fn insert_then_get_catalog_row_round_trips() {
        let (_dir, store) = temp_store();
        let row = store.insert_catalog_row(project(), "escasez_agua", None, 1_000).expect("insert");
        assert_eq!(row.canonical_code_id, Some(row.code_id));
        let fetched = store.get_catalog_row(project(), row.code_id).expect("get").expect("present");
        assert_eq!(fetched, row);
    }

    #[test]
    fn insert_catalog_row_is_case_insensitively_unique() {
        let (_dir, store) = temp_store();
        store.insert_catalog_row(project(), "Escasez", None, 1_000).expect("first insert");
        let err = store.insert_catalog_row(project(), "escasez", None, 2_000).expect_err("conflict");
        assert_eq!(err.kind, ontocore_core::error::ErrorKind::Conflict);
    }

    #[test]
    fn upsert_candidate_takes_max_confidence_on_collision() {
        let (_dir, store) = temp_store();
        let draft = CandidateRow {
            id: CandidateId::PLACEHOLDER,
            project_id: project(),
            codigo: "escasez".to_string(),
            fragment_id: Some(FragmentId::new("f1")),
            source: Source::Manual,
            confidence: 0.4,
            state: State::Pending,
            merged_into: None,
            memo: None,
            validator: None,
            created_at_ms: 1_000,
            updated_at_ms: 1_000,
        };
        let first = store.upsert_candidate(&draft).expect("first upsert");
        let mut second = draft;
        second.confidence = 0.9;
        second.updated_at_ms = 2_000;
        let updated = store.upsert_candidate(&second).expect("second upsert");
        assert_eq!(updated.id, first.id);
        assert_eq!(updated.confidence, 0.9);
    }

    #[test]
    fn readiness_inputs_finds_assignment_missing_code_id() {
        let (_dir, store) = temp_store();
        store.insert_catalog_row(project(), "escasez", None, 1_000).expect("catalog");
        store
            .upsert_assignment(&AssignmentRow {
                project_id: project(),
                fragment_id: FragmentId::new("f1"),
                codigo: "escasez".to_string(),
                code_id: None,
                cita: "...".to_string(),
                source_file: None,
            })
            .expect("assignment");
        let inputs = store.readiness_inputs(project()).expect("inputs");
        assert_eq!(inputs.assignments_missing_code_id.len(), 1);
    }

    #[test]
    fn freeze_round_trips() {
        let (_dir, store) = temp_store();
        assert!(!store.get_freeze(project()).expect("default").is_frozen);
        store
            .put_freeze(&FreezeRow {
                project_id: project(),
                is_frozen: true,
                frozen_at_ms: Some(1_000),
                frozen_by: Some("admin".to_string()),
                broken_at_ms: None,
                broken_by: None,
                note: None,
            })
            .expect("put freeze");
        assert!(store.get_freeze(project()).expect("get").is_frozen);
    }

    #[test]
    fn idempotent_response_round_trips() {
        let (_dir, store) = temp_store();
        let key = IdempotencyKey::new("k1");
        assert!(store.get_idempotent_response(project(), &key).expect("get").is_none());
        let payload = serde_json::json!({ "would_move": 2 });
        store.put_idempotent_response(project(), &key, &payload, 3_600, 1_000).expect("put");
        let fetched = store.get_idempotent_response(project(), &key).expect("get").expect("present");
        assert_eq!(fetched, payload);
    }

    #[test]
    fn upsert_and_list_axial_rows() {
        let (_dir, store) = temp_store();
        let row = store.insert_catalog_row(project(), "escasez", None, 1_000).expect("catalog");
        store
            .upsert_axial(&AxialRow {
                project_id: project(),
                categoria: "recursos".to_string(),
                codigo: row.codigo.clone(),
                code_id: row.code_id,
                relation: AxialRelationType::Cause,
                memo: None,
                evidence: vec![FragmentId::new("f1")],
                state: AxialState::Pending,
            })
            .expect("upsert axial");
        let rows = store.list_axial_rows(project()).expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].evidence, vec![FragmentId::new("f1")]);
    }

    #[test]
    fn append_and_list_version_events() {
        let (_dir, store) = temp_store();
        let row = store.insert_catalog_row(project(), "escasez", None, 1_000).expect("catalog");
        store
            .append_version_event(&VersionEvent {
                project_id: project(),
                codigo: row.codigo.clone(),
                code_id: Some(row.code_id),
                action: VersionAction::Create,
                actor: "system".to_string(),
                previous: None,
                next: Some(serde_json::json!({ "codigo": row.codigo })),
                at_ms: 1_000,
            })
            .expect("append");
        let events = store.list_version_events(project(), 10).expect("list");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, VersionAction::Create);
    }
}
