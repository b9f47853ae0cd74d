// crates/ontocore-api/src/routes/mod.rs
// ============================================================================
// Module: Route Table
// Description: Wires every handler in this directory onto the paths named
//              in §6, in the style of `this-rs-project-orchestrator`'s
//              `api::routes::create_router`.
// Purpose: One place to see the full external HTTP surface at a glance.
// Dependencies: axum, tower-http
// ============================================================================

mod axial;
mod candidates;
mod freeze;
mod ops;
mod readiness;
mod sync;

use axum::Router;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full Axum router over `state` (§6 "External Interfaces").
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/readiness", get(readiness::get_readiness))
        .route("/freeze", get(freeze::get_freeze).post(freeze::post_freeze))
        .route("/freeze/break", post(freeze::post_freeze_break))
        .route("/candidates/check-batch", post(candidates::post_check_batch))
        .route("/candidates", post(candidates::post_submit))
        .route("/candidates/batch", post(candidates::post_submit_batch))
        .route("/candidates/{id}/validate", put(candidates::put_validate))
        .route("/candidates/{id}/reject", put(candidates::put_reject))
        .route("/candidates/{id}/promote", post(candidates::post_promote))
        .route("/candidates/merge", post(candidates::post_merge))
        .route("/candidates/auto-merge", post(candidates::post_auto_merge))
        .route("/axial/relations", post(axial::post_axial_relation))
        .route("/sync/fragments", post(sync::post_sync_fragments))
        .route("/sync/axial", post(sync::post_sync_axial))
        .route("/sync/predictions", post(sync::post_sync_predictions))
        .route("/ops/recent", get(ops::get_ops_recent))
        .route("/ops/log", get(ops::get_ops_log))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// SECTION: Shared extraction helpers
// ============================================================================

use axum::http::HeaderMap;
use ontocore_core::error::OntoError;
use ontocore_core::identifiers::IdempotencyKey;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::identifiers::SessionId;

/// Parses a raw `project`/`project_id` value into a [`ProjectId`].
pub(crate) fn project_id(raw: u64) -> Result<ProjectId, OntoError> {
    ProjectId::from_raw(raw).ok_or_else(|| OntoError::invalid_request("project_id must be non-zero"))
}

/// Reads `X-Session-ID`, when present and valid UTF-8.
pub(crate) fn session_id_header(headers: &HeaderMap) -> Option<SessionId> {
    headers.get("x-session-id").and_then(|value| value.to_str().ok()).map(SessionId::new)
}

/// Reads `X-Idempotency-Key`, when present and valid UTF-8.
pub(crate) fn idempotency_key_header(headers: &HeaderMap) -> Option<IdempotencyKey> {
    headers.get("x-idempotency-key").and_then(|value| value.to_str().ok()).map(IdempotencyKey::new)
}
