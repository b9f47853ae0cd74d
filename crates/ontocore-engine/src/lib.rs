// crates/ontocore-engine/src/lib.rs
// ============================================================================
// Crate: ontocore-engine
// Description: Pure business logic for canonical resolution, candidate
//              lifecycle, the readiness gate and the freeze controller.
// Purpose: Keep every I/O-free decision (C2-C5) testable without a real
//          store or transport, and reusable from both ontocore-api and
//          ontocore-cli.
// Dependencies: ontocore-core, serde_json
// ============================================================================

//! ## Overview
//! Every public type here is either a pure function over a snapshot
//! ([`resolver`], [`readiness`]) or a thin orchestrator over
//! [`ontocore_core::interfaces::LedgerStore`] ([`lifecycle`], [`freeze`]).
//! None of it depends on SQLite, HTTP, or `tokio` — those concerns live in
//! `ontocore-store-sqlite`, `ontocore-sync` and `ontocore-api`.

pub mod freeze;
pub mod lifecycle;
pub mod readiness;
pub mod repair;
pub mod resolver;

#[cfg(test)]
mod test_support;
