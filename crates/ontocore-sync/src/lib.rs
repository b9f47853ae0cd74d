// crates/ontocore-sync/src/lib.rs
// ============================================================================
// Crate: ontocore-sync
// Description: Projection synchronizer (C6): an HTTP-backed GraphProjector
//              and a batch-scan driver with exponential backoff.
// Dependencies: ontocore-core, ontocore-config, reqwest, rusqlite, tokio
// ============================================================================

//! Projects definitive ledger rows (catalog, assignment, axial relation)
//! into an external graph store. The ledger is the only source of identity;
//! this crate only ever pushes forward, never reads identity back.

pub mod client;
pub mod runner;
pub mod state;

pub use client::HttpGraphProjector;
pub use runner::RetryPolicy;
pub use runner::SyncOutcome;
pub use runner::SyncRunner;
pub use state::SqliteSyncStateStore;
pub use state::SyncEntityKind;
pub use state::SyncStateStore;
