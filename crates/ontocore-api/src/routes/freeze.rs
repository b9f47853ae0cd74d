// crates/ontocore-api/src/routes/freeze.rs
// ============================================================================
// Module: Freeze Routes
// Description: GET /freeze, POST /freeze, POST /freeze/break (§4.5, §6).
// Purpose: Let an admin engage or lift the per-project freeze lock under
//          the full C7 discipline.
// Dependencies: axum, ontocore-core, ontocore-engine
// ============================================================================

use axum::Json;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use ontocore_core::interfaces::LockClass;
use ontocore_engine::freeze::FreezeController;
use serde::Deserialize;
use serde::Serialize;

use crate::discipline::MutationOutcome;
use crate::discipline::MutationRequest;
use crate::discipline::run_mutation;
use crate::error::ApiError;
use crate::state::AppState;

use super::idempotency_key_header;
use super::project_id;
use super::session_id_header;

/// Query parameters for `GET /freeze`.
#[derive(Debug, Deserialize)]
pub struct FreezeQuery {
    project: u64,
}

/// Response body shared by every freeze route.
#[derive(Debug, Serialize, Deserialize)]
pub struct FreezeResponse {
    project_id: u64,
    is_frozen: bool,
    frozen_at_ms: Option<i64>,
    frozen_by: Option<String>,
    broken_at_ms: Option<i64>,
    broken_by: Option<String>,
    note: Option<String>,
}

/// Request body for `POST /freeze` / `POST /freeze/break`.
#[derive(Debug, Deserialize)]
pub struct FreezeToggleRequest {
    project: u64,
    actor: String,
    note: Option<String>,
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    confirm: bool,
}

/// Handles `GET /freeze?project=…`. Read-only.
///
/// # Errors
/// Returns [`ApiError`] if `project` is missing/zero or storage fails.
pub async fn get_freeze(State(state): State<AppState>, Query(query): Query<FreezeQuery>) -> Result<Json<FreezeResponse>, ApiError> {
    let project = project_id(query.project)?;
    let row = state.with_ledger(move |store, _clock| store.get_freeze(project)).await?;
    Ok(Json(FreezeResponse {
        project_id: row.project_id.get(),
        is_frozen: row.is_frozen,
        frozen_at_ms: row.frozen_at_ms,
        frozen_by: row.frozen_by,
        broken_at_ms: row.broken_at_ms,
        broken_by: row.broken_by,
        note: row.note,
    }))
}

/// Handles `POST /freeze`. Audited, admin-scoped (§4.5).
///
/// # Errors
/// Returns [`ApiError`] on a discipline violation or storage failure.
pub async fn post_freeze(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<FreezeToggleRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    toggle(state, headers, body, true).await
}

/// Handles `POST /freeze/break`. Audited, admin-scoped (§4.5).
///
/// # Errors
/// Returns [`ApiError`] on a discipline violation or storage failure.
pub async fn post_freeze_break(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<FreezeToggleRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    toggle(state, headers, body, false).await
}

async fn toggle(state: AppState, headers: HeaderMap, body: FreezeToggleRequest, engage: bool) -> Result<Json<serde_json::Value>, ApiError> {
    let project = project_id(body.project)?;
    let request = MutationRequest {
        project_id: project,
        operation: if engage { "freeze.engage" } else { "freeze.break" },
        lock_class: LockClass::Freeze,
        dry_run: body.dry_run,
        confirm: body.confirm,
        session_id: session_id_header(&headers),
        idempotency_key: idempotency_key_header(&headers),
        request_id: state.next_request_id(),
    };

    let actor = body.actor;
    let note = body.note;
    let (_status, response_body) = run_mutation(&state, request, move |store, clock| {
        let controller = FreezeController::new(store, clock);
        let row = if engage {
            controller.freeze(project, &actor, note.as_deref())?
        } else {
            controller.unfreeze(project, &actor, note.as_deref())?
        };
        Ok(MutationOutcome {
            body: serde_json::json!({
                "project_id": row.project_id.get(),
                "is_frozen": row.is_frozen,
                "frozen_at_ms": row.frozen_at_ms,
                "frozen_by": row.frozen_by,
                "broken_at_ms": row.broken_at_ms,
                "broken_by": row.broken_by,
                "note": row.note,
            }),
            batch_size: 1,
            updated_rows: 1,
        })
    })
    .await?;

    Ok(Json(response_body))
}
