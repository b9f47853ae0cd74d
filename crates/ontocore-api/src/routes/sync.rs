// crates/ontocore-api/src/routes/sync.rs
// ============================================================================
// Module: Sync Routes
// Description: POST /sync/fragments, /sync/axial, /sync/predictions (§4.6, §6).
// Purpose: Drive a C6 projection pass from HTTP under the same confirm/
//          session-id/lock discipline as the other mutating routes, bridged
//          by hand since GraphProjector is async and discipline::run_mutation
//          is not.
// Dependencies: axum, ontocore-core, ontocore-sync, tokio, tracing
// ============================================================================

//! ## Overview
//! [`ontocore_sync::runner::SyncRunner::run`] has no public per-kind entry
//! point — one pass always projects fragments, then codes, then axial
//! relations together (§4.6's ordering). So `/sync/fragments` and
//! `/sync/axial` both drive the same full pass and return the same
//! [`SyncResponse`]; the path a caller hits names the kind they care about,
//! it does not scope what gets projected. `/sync/predictions` has no
//! backing pipeline (no `VectorIndex` implementation exists anywhere in
//! this workspace) and always reports a zeroed outcome.
//!
//! This module hand-rolls the confirm/session-id gate and the
//! `request.start`/`request.end`/audit-log triad that
//! [`crate::discipline::run_mutation`] provides for synchronous
//! mutations, because a sync pass needs to hold its advisory lock across
//! `.await` points while it talks to the async [`GraphProjector`] — a
//! shape `run_mutation`'s synchronous closure cannot express.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use ontocore_core::error::OntoError;
use ontocore_core::interfaces::LockClass;
use ontocore_sync::RetryPolicy;
use ontocore_sync::SyncEntityKind;
use ontocore_sync::SyncOutcome;
use ontocore_sync::SyncRunner;
use serde::Deserialize;
use serde::Serialize;

use crate::audit::entry_from_context;
use crate::error::ApiError;
use crate::state::AppState;
use crate::state::RequestTimer;
use crate::telemetry::OutcomeClass;
use crate::telemetry::RequestContext;

use super::project_id;
use super::session_id_header;

/// Request body shared by every sync route.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    project: u64,
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    confirm: bool,
}

/// Response body shared by every sync route (§4.6): `scanned` counts rows
/// attempted this pass, `synced` counts those that succeeded, `remaining`
/// counts rows still due for projection once the pass (or preview)
/// completes. Also echoes the fields every mutating endpoint must (§6).
#[derive(Debug, Serialize, Default)]
pub struct SyncResponse {
    scanned: usize,
    synced: usize,
    remaining: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

/// Handles `POST /sync/fragments`. See the module overview: this drives
/// the same full pass as [`post_sync_axial`].
///
/// # Errors
/// Returns [`ApiError`] on a discipline violation, a lock timeout, or a
/// storage failure.
pub async fn post_sync_fragments(state: State<AppState>, headers: HeaderMap, body: Json<SyncRequest>) -> Result<Json<SyncResponse>, ApiError> {
    run_sync(state, headers, body, "sync.fragments").await
}

/// Handles `POST /sync/axial`. See the module overview: this drives the
/// same full pass as [`post_sync_fragments`].
///
/// # Errors
/// Returns [`ApiError`] on a discipline violation, a lock timeout, or a
/// storage failure.
pub async fn post_sync_axial(state: State<AppState>, headers: HeaderMap, body: Json<SyncRequest>) -> Result<Json<SyncResponse>, ApiError> {
    run_sync(state, headers, body, "sync.axial").await
}

/// Handles `POST /sync/predictions`. Always a no-op: no semantic-prediction
/// pipeline or `VectorIndex` implementation exists in this core.
///
/// # Errors
/// Returns [`ApiError`] if `project` is missing/zero.
pub async fn post_sync_predictions(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<SyncRequest>) -> Result<Json<SyncResponse>, ApiError> {
    let project = project_id(body.project)?;
    Ok(Json(SyncResponse {
        project_id: Some(project.get()),
        session_id: session_id_header(&headers).map(|id| id.as_str().to_string()),
        request_id: Some(state.next_request_id().into_string()),
        ..SyncResponse::default()
    }))
}

fn retry_policy(config: &ontocore_config::OntocoreConfig) -> RetryPolicy {
    RetryPolicy {
        base_ms: config.sync_retry_base_ms,
        factor: config.sync_retry_factor,
        cap_ms: config.sync_retry_cap_ms,
        max_attempts: config.sync_retry_max_attempts,
    }
}

async fn run_sync(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<SyncRequest>, operation: &'static str) -> Result<Json<SyncResponse>, ApiError> {
    let project = project_id(body.project)?;
    let session_id = session_id_header(&headers);

    let context = RequestContext {
        project_id: Some(project.get()),
        session_id: session_id.as_ref().map(|id| id.as_str().to_string()),
        request_id: state.next_request_id().into_string(),
        operation,
        dry_run: body.dry_run,
        confirm: body.confirm,
    };
    context.log_start();
    let timer = RequestTimer::start();

    let result = run_sync_inner(&state, project, session_id, body.dry_run, body.confirm).await;

    let outcome_class = match &result {
        Ok(_) if body.dry_run => OutcomeClass::Noop,
        Ok(_) => OutcomeClass::Ok,
        Err(_) => OutcomeClass::Error,
    };
    let (status_code, batch_size, updated_rows) = match &result {
        Ok((outcome, _remaining)) => (200, outcome.fragments_synced + outcome.codes_synced + outcome.axial_synced + outcome.failed, outcome.fragments_synced + outcome.codes_synced + outcome.axial_synced),
        Err(err) => (crate::error::status_for(err.kind).as_u16(), 0, 0),
    };
    context.log_end(batch_size, updated_rows, timer.elapsed_ms(), status_code, outcome_class);
    state.audit.record(entry_from_context(
        Some(project.get()),
        context.session_id.clone(),
        context.request_id.clone(),
        operation,
        body.dry_run,
        body.confirm,
        outcome_class,
        state.clock.now_ms(),
    ));

    let (outcome, remaining) = result?;
    Ok(Json(SyncResponse {
        scanned: outcome.fragments_synced + outcome.codes_synced + outcome.axial_synced + outcome.failed,
        synced: outcome.fragments_synced + outcome.codes_synced + outcome.axial_synced,
        remaining,
        project_id: Some(project.get()),
        session_id: context.session_id.clone(),
        request_id: Some(context.request_id.clone()),
    }))
}

async fn run_sync_inner(
    state: &AppState,
    project: ontocore_core::identifiers::ProjectId,
    session_id: Option<ontocore_core::identifiers::SessionId>,
    dry_run: bool,
    confirm: bool,
) -> Result<(SyncOutcome, usize), OntoError> {
    if !dry_run && (!confirm || session_id.is_none()) {
        return Err(OntoError::invalid_request("a non-dry-run sync requires confirm=true and a fresh X-Session-ID"));
    }

    if dry_run {
        let outcome = preview_sync(state, project).await?;
        let remaining = outcome.fragments_synced + outcome.codes_synced + outcome.axial_synced;
        return Ok((outcome, remaining));
    }

    let timeout_ms = state.config.advisory_lock_timeout_ms;
    let locks = Arc::clone(&state.locks);
    let session_id_owned = session_id.as_ref().map(|id| id.as_str().to_string());
    let guard = tokio::task::spawn_blocking(move || locks.acquire(project, LockClass::Sync, session_id_owned.as_deref(), timeout_ms))
        .await
        .map_err(|_join_err| OntoError::internal("lock task panicked or was cancelled"))??;

    let batch_size = usize::try_from(state.config.sync_batch_size).unwrap_or(usize::MAX);
    let retry = retry_policy(&state.config);
    let runner = SyncRunner::new(state.store.as_ref(), state.projector.as_ref(), state.sync_state.as_ref(), state.clock.as_ref(), batch_size, retry);
    let outcome = runner.run(project).await;
    drop(guard);
    let outcome = outcome?;
    let remaining_outcome = preview_sync(state, project).await?;
    let remaining = remaining_outcome.fragments_synced + remaining_outcome.codes_synced + remaining_outcome.axial_synced;
    Ok((outcome, remaining))
}

/// Counts rows due for projection without touching the projector, for a
/// dry-run preview. Reads the ledger through [`AppState::with_ledger`];
/// checks the sync-state store directly afterward, since it is a small
/// side table independent of the ledger connection.
async fn preview_sync(state: &AppState, project: ontocore_core::identifiers::ProjectId) -> Result<SyncOutcome, OntoError> {
    let (fragment_ids, code_keys, axial_keys) = state
        .with_ledger(move |store, _clock| {
            let fragment_ids: std::collections::HashSet<String> =
                store.list_assignments(project)?.into_iter().map(|assignment| assignment.fragment_id.into_string()).collect();
            let code_keys: std::collections::HashSet<String> = store
                .list_catalog_rows(project)?
                .into_iter()
                .filter(|row| row.status == ontocore_core::model::CatalogStatus::Active)
                .map(|row| row.code_id.get().to_string())
                .collect();
            let axial_keys: std::collections::HashSet<String> = store
                .list_axial_rows(project)?
                .into_iter()
                .map(|row| format!("{}/{}/{}", row.project_id.get(), row.categoria, row.codigo))
                .collect();
            Ok((fragment_ids, code_keys, axial_keys))
        })
        .await?;

    let now_ms = state.clock.now_ms();
    let sync_state = state.sync_state.as_ref();
    Ok(SyncOutcome {
        fragments_synced: count_due(sync_state, project, SyncEntityKind::Fragment, &fragment_ids, now_ms),
        codes_synced: count_due(sync_state, project, SyncEntityKind::Code, &code_keys, now_ms),
        axial_synced: count_due(sync_state, project, SyncEntityKind::Axial, &axial_keys, now_ms),
        failed: 0,
    })
}

fn count_due(
    sync_state: &dyn ontocore_sync::SyncStateStore,
    project: ontocore_core::identifiers::ProjectId,
    kind: SyncEntityKind,
    keys: &std::collections::HashSet<String>,
    now_ms: i64,
) -> usize {
    keys.iter().filter(|key| sync_state.due_for_retry(project, kind, key, now_ms).unwrap_or(true)).count()
}
