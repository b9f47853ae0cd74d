// crates/ontocore-store-sqlite/src/lib.rs
// ============================================================================
// Crate: ontocore-store-sqlite
// Description: SQLite-backed LedgerStore (C1) and in-process advisory lock
//              manager.
// Dependencies: ontocore-core, ontocore-config, rusqlite, serde_json,
//               thiserror
// ============================================================================

//! Durable, project-scoped storage for the ledger: catalog, candidate,
//! assignment, axial, freeze, idempotency and version rows, plus the
//! advisory locking primitive the engine and API layers serialize
//! mutating operations through.

mod locks;
mod schema;
mod store;

pub use locks::InProcessLockManager;
pub use store::SqliteLedgerStore;
pub use store::SqliteStoreError;
