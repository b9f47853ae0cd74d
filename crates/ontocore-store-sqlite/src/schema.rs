// crates/ontocore-store-sqlite/src/schema.rs
// ============================================================================
// Module: SQLite Schema
// Description: DDL for the ledger tables (catalog, candidate, assignment,
//              axial, freeze, idem, version) and the pragmas every
//              connection opens with.
// Purpose: Enforce I1-I7 as constraints and indexes rather than leaving
//          them to application-level discipline.
// Dependencies: rusqlite
// ============================================================================

use rusqlite::Connection;

use crate::store::SqliteStoreError;

/// Schema version stamped via `PRAGMA user_version`.
pub(crate) const SCHEMA_VERSION: i64 = 1;

/// Applies pragmas and creates every table/index if absent.
///
/// # Errors
/// Returns [`SqliteStoreError::Db`] if any statement fails.
pub(crate) fn initialize(connection: &Connection) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS catalog (
                code_id            INTEGER PRIMARY KEY,
                project_id         INTEGER NOT NULL,
                codigo             TEXT NOT NULL,
                codigo_lower       TEXT NOT NULL,
                status             TEXT NOT NULL CHECK (status IN ('active', 'merged', 'deprecated')),
                canonical_code_id  INTEGER,
                memo               TEXT,
                created_at_ms      INTEGER NOT NULL,
                updated_at_ms      INTEGER NOT NULL,
                UNIQUE (project_id, codigo_lower)
            );
            CREATE INDEX IF NOT EXISTS idx_catalog_project ON catalog (project_id);

            CREATE TABLE IF NOT EXISTS candidate (
                id             INTEGER PRIMARY KEY,
                project_id     INTEGER NOT NULL,
                codigo         TEXT NOT NULL,
                codigo_lower   TEXT NOT NULL,
                fragment_id    TEXT,
                source         TEXT NOT NULL,
                confidence     REAL NOT NULL,
                state          TEXT NOT NULL,
                merged_into    TEXT,
                memo           TEXT,
                validator      TEXT,
                created_at_ms  INTEGER NOT NULL,
                updated_at_ms  INTEGER NOT NULL,
                UNIQUE (project_id, codigo_lower, fragment_id)
            );
            CREATE INDEX IF NOT EXISTS idx_candidate_project ON candidate (project_id);
            CREATE INDEX IF NOT EXISTS idx_candidate_recent ON candidate (project_id, created_at_ms DESC);

            CREATE TABLE IF NOT EXISTS assignment (
                project_id   INTEGER NOT NULL,
                fragment_id  TEXT NOT NULL,
                codigo       TEXT NOT NULL,
                code_id      INTEGER,
                cita         TEXT NOT NULL,
                source_file  TEXT,
                PRIMARY KEY (project_id, fragment_id, codigo)
            );
            CREATE INDEX IF NOT EXISTS idx_assignment_project ON assignment (project_id);

            CREATE TABLE IF NOT EXISTS axial (
                project_id     INTEGER NOT NULL,
                categoria      TEXT NOT NULL,
                codigo         TEXT NOT NULL,
                code_id        INTEGER NOT NULL,
                relation       TEXT NOT NULL,
                memo           TEXT,
                evidence_json  TEXT NOT NULL,
                state          TEXT NOT NULL,
                PRIMARY KEY (project_id, categoria, codigo, relation)
            );

            CREATE TABLE IF NOT EXISTS freeze (
                project_id     INTEGER PRIMARY KEY,
                is_frozen      INTEGER NOT NULL,
                frozen_at_ms   INTEGER,
                frozen_by      TEXT,
                broken_at_ms   INTEGER,
                broken_by      TEXT,
                note           TEXT
            );

            CREATE TABLE IF NOT EXISTS idem (
                project_id      INTEGER NOT NULL,
                idem_key        TEXT NOT NULL,
                response_json   TEXT NOT NULL,
                expires_at_ms   INTEGER NOT NULL,
                PRIMARY KEY (project_id, idem_key)
            );

            CREATE TABLE IF NOT EXISTS version (
                seq            INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id     INTEGER NOT NULL,
                codigo         TEXT NOT NULL,
                code_id        INTEGER,
                action         TEXT NOT NULL,
                actor          TEXT NOT NULL,
                previous_json  TEXT,
                next_json      TEXT,
                at_ms          INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_version_project ON version (project_id, seq DESC);
            ",
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
