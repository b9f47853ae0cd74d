// crates/ontocore-api/src/lib.rs
// ============================================================================
// Crate: ontocore-api
// Description: C7 HTTP admin surface over the identity & ontology core.
// Purpose: Expose readiness, freeze, candidate-lifecycle, axial-relation,
//          sync and audit operations under one dry-run/confirm/advisory-
//          lock/idempotency discipline (§4.7, §6).
// Dependencies: axum, ontocore-core, ontocore-config, ontocore-engine,
//               ontocore-sync, tokio, tower-http, tracing
// ============================================================================

//! ## Overview
//! Mirrors `decision-gate-mcp`'s crate shape: a thin `server` module wires
//! [`state::AppState`] and [`routes::build_router`] onto a bound TCP
//! listener, while every other module ([`error`], [`telemetry`],
//! [`audit`], [`correlation`], [`discipline`]) is reusable independently —
//! `ontocore-cli` links against them directly rather than going through
//! HTTP for admin-tool invocations.

pub mod audit;
pub mod correlation;
pub mod discipline;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use audit::AuditEntry;
pub use audit::AuditLog;
pub use audit::AuditQuery;
pub use audit::InMemoryAuditLog;
pub use correlation::RequestIdGenerator;
pub use discipline::MutationOutcome;
pub use discipline::MutationRequest;
pub use discipline::run_mutation;
pub use error::ApiError;
pub use routes::build_router;
pub use server::serve;
pub use state::AppState;
