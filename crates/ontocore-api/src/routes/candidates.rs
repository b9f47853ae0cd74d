// crates/ontocore-api/src/routes/candidates.rs
// ============================================================================
// Module: Candidate Lifecycle Routes
// Description: check-batch, submit, submit-batch, validate/reject, merge,
//              auto-merge, and promote (§4.3, §6).
// Purpose: Expose C3 over HTTP, keeping the merge-shaped routes under the
//          C7 discipline and analyst actions (submit/validate/reject/
//          promote) lock-free per §4.5.
// Dependencies: axum, ontocore-core, ontocore-engine
// ============================================================================

//! ## Overview
//! `merge`/`auto-merge` pass their client-supplied idempotency key straight
//! through to [`CandidateLifecycleEngine`]'s own request structs rather
//! than through [`crate::discipline::MutationRequest`]'s idempotency field:
//! the engine already reads/writes the idempotent-response cache itself for
//! these two operations (so it can cache the pre-freeze-check plan), and
//! caching the same key twice under two different response shapes would
//! make a replayed call return whichever of the two happened to run last.

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use ontocore_core::identifiers::CandidateId;
use ontocore_core::identifiers::FragmentId;
use ontocore_core::interfaces::LockClass;
use ontocore_core::model::AssignmentRow;
use ontocore_core::model::CandidateRow;
use ontocore_core::model::CandidateSource;
use ontocore_core::model::CandidateState;
use ontocore_core::model::CatalogRow;
use ontocore_engine::lifecycle::CandidateLifecycleEngine;
use ontocore_engine::lifecycle::DuplicateSuggestion;
use ontocore_engine::lifecycle::MergeIdsRequest;
use ontocore_engine::lifecycle::MergePair;
use ontocore_engine::lifecycle::MergePairsRequest;
use ontocore_engine::lifecycle::PromoteRequest;
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

// ============================================================================
// SECTION: Check-batch
// ============================================================================

/// Request body for `POST /candidates/check-batch`.
#[derive(Debug, Deserialize)]
pub struct CheckBatchRequest {
    project: u64,
    labels: Vec<String>,
}

/// Handles `POST /candidates/check-batch` (§4.3 "Pre-hoc check"). Never mutates.
///
/// # Errors
/// Returns [`ApiError`] if `project` is missing/zero or storage fails.
pub async fn post_check_batch(State(state): State<AppState>, Json(body): Json<CheckBatchRequest>) -> Result<Json<Vec<DuplicateSuggestion>>, ApiError> {
    let project = project_id(body.project)?;
    let allow_catalog_row_merge = state.config.allow_catalog_row_merge;
    let suggestions = state
        .with_ledger(move |store, clock| {
            let engine = CandidateLifecycleEngine::new(store, clock, allow_catalog_row_merge);
            engine.check_batch(project, &body.labels)
        })
        .await?;
    Ok(Json(suggestions))
}

// ============================================================================
// SECTION: Submit / submit-batch
// ============================================================================

/// One proposed code, shared by `POST /candidates` and the items of
/// `POST /candidates/batch`.
#[derive(Debug, Deserialize)]
pub struct SubmitItem {
    codigo: String,
    fragment_id: Option<String>,
    source: CandidateSource,
    confidence: f64,
    memo: Option<String>,
}

/// Request body for `POST /candidates`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    project: u64,
    #[serde(flatten)]
    item: SubmitItem,
}

/// Request body for `POST /candidates/batch`.
#[derive(Debug, Deserialize)]
pub struct SubmitBatchRequest {
    project: u64,
    items: Vec<SubmitItem>,
}

/// Handles `POST /candidates` (§4.3 "Submit"). Lock-free: a candidate
/// insert never touches an existing identity chain (§4.5).
///
/// # Errors
/// Returns [`ApiError`] if `project` is missing/zero or storage fails.
pub async fn post_submit(State(state): State<AppState>, Json(body): Json<SubmitRequest>) -> Result<Json<CandidateRow>, ApiError> {
    let project = project_id(body.project)?;
    let item = body.item;
    let allow_catalog_row_merge = state.config.allow_catalog_row_merge;
    let row = state
        .with_ledger(move |store, clock| {
            let engine = CandidateLifecycleEngine::new(store, clock, allow_catalog_row_merge);
            engine.submit(
                project,
                &item.codigo,
                item.fragment_id.map(FragmentId::new),
                item.source,
                item.confidence,
                item.memo,
            )
        })
        .await?;
    Ok(Json(row))
}

/// Handles `POST /candidates/batch`. Lock-free, same rationale as
/// [`post_submit`].
///
/// # Errors
/// Returns [`ApiError`] if `project` is missing/zero or storage fails.
pub async fn post_submit_batch(State(state): State<AppState>, Json(body): Json<SubmitBatchRequest>) -> Result<Json<Vec<CandidateRow>>, ApiError> {
    let project = project_id(body.project)?;
    let items = body.items;
    let allow_catalog_row_merge = state.config.allow_catalog_row_merge;
    let rows = state
        .with_ledger(move |store, clock| {
            let engine = CandidateLifecycleEngine::new(store, clock, allow_catalog_row_merge);
            items
                .into_iter()
                .map(|item| {
                    engine.submit(
                        project,
                        &item.codigo,
                        item.fragment_id.map(FragmentId::new),
                        item.source,
                        item.confidence,
                        item.memo,
                    )
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .await?;
    Ok(Json(rows))
}

// ============================================================================
// SECTION: Validate / reject
// ============================================================================

/// Request body for `PUT /candidates/{id}/validate` and `/reject`.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    project: u64,
    actor: String,
    memo: Option<String>,
}

/// Handles `PUT /candidates/{id}/validate`. Not freeze-gated (§4.3).
///
/// # Errors
/// Returns [`ApiError`] if the candidate does not exist or is already merged.
pub async fn put_validate(state: State<AppState>, path: Path<u64>, body: Json<TransitionRequest>) -> Result<Json<CandidateRow>, ApiError> {
    transition(state, path, body, CandidateState::Validated).await
}

/// Handles `PUT /candidates/{id}/reject`. Not freeze-gated (§4.3).
///
/// # Errors
/// Returns [`ApiError`] if the candidate does not exist or is already merged.
pub async fn put_reject(state: State<AppState>, path: Path<u64>, body: Json<TransitionRequest>) -> Result<Json<CandidateRow>, ApiError> {
    transition(state, path, body, CandidateState::Rejected).await
}

async fn transition(
    State(state): State<AppState>,
    Path(raw_id): Path<u64>,
    Json(body): Json<TransitionRequest>,
    new_state: CandidateState,
) -> Result<Json<CandidateRow>, ApiError> {
    let project = project_id(body.project)?;
    let candidate_id = CandidateId::from_raw(raw_id).ok_or_else(|| ontocore_core::error::OntoError::invalid_request("candidate id must be non-zero"))?;
    let allow_catalog_row_merge = state.config.allow_catalog_row_merge;
    let row = state
        .with_ledger(move |store, clock| {
            let engine = CandidateLifecycleEngine::new(store, clock, allow_catalog_row_merge);
            engine.transition(project, candidate_id, new_state, &body.actor, body.memo.as_deref())
        })
        .await?;
    Ok(Json(row))
}

// ============================================================================
// SECTION: Promote
// ============================================================================

/// Request body for `POST /candidates/{id}/promote`.
#[derive(Debug, Deserialize)]
pub struct PromoteRequestBody {
    project: u64,
    cita: String,
    source_file: Option<String>,
    actor: String,
}

/// Response body for `POST /candidates/{id}/promote`.
#[derive(Debug, Serialize)]
pub struct PromoteResponse {
    catalog: CatalogRow,
    assignment: AssignmentRow,
}

/// Handles `POST /candidates/{id}/promote`. Not named in the distilled
/// route table but required by the testable "submit → validate → promote"
/// property; lock-free and not freeze-gated, same as validate/reject (§4.3).
///
/// # Errors
/// Returns [`ApiError`] if the candidate is not `validated` or has no
/// `fragment_id`.
pub async fn post_promote(State(state): State<AppState>, Path(raw_id): Path<u64>, Json(body): Json<PromoteRequestBody>) -> Result<Json<PromoteResponse>, ApiError> {
    let project = project_id(body.project)?;
    let candidate_id = CandidateId::from_raw(raw_id).ok_or_else(|| ontocore_core::error::OntoError::invalid_request("candidate id must be non-zero"))?;
    let allow_catalog_row_merge = state.config.allow_catalog_row_merge;
    let (catalog, assignment) = state
        .with_ledger(move |store, clock| {
            let engine = CandidateLifecycleEngine::new(store, clock, allow_catalog_row_merge);
            engine.promote(PromoteRequest {
                project_id: project,
                candidate_id,
                cita: &body.cita,
                source_file: body.source_file.as_deref(),
                actor: &body.actor,
            })
        })
        .await?;
    Ok(Json(PromoteResponse { catalog, assignment }))
}

// ============================================================================
// SECTION: Merge / auto-merge
// ============================================================================

/// Request body for `POST /candidates/merge`.
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    project: u64,
    source_ids: Vec<u64>,
    target_codigo: String,
    memo: Option<String>,
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    confirm: bool,
    actor: String,
}

/// Handles `POST /candidates/merge` (§4.3 "Merge by ids").
///
/// # Errors
/// Returns [`ApiError`] on a discipline violation, a frozen project, or a
/// missing source candidate.
pub async fn post_merge(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<MergeRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let project = project_id(body.project)?;
    let source_ids = body
        .source_ids
        .iter()
        .map(|raw| CandidateId::from_raw(*raw).ok_or_else(|| ontocore_core::error::OntoError::invalid_request("source id must be non-zero")))
        .collect::<Result<Vec<_>, _>>()?;
    let engine_idempotency_key = idempotency_key_header(&headers);
    let idempotency_ttl_secs = state.config.idempotency_ttl_secs;
    let allow_catalog_row_merge = state.config.allow_catalog_row_merge;

    let request = MutationRequest {
        project_id: project,
        operation: "candidates.merge",
        lock_class: LockClass::Catalog,
        dry_run: body.dry_run,
        confirm: body.confirm,
        session_id: session_id_header(&headers),
        idempotency_key: None,
        request_id: state.next_request_id(),
    };

    let (_status, response_body) = run_mutation(&state, request, move |store, clock| {
        let engine = CandidateLifecycleEngine::new(store, clock, allow_catalog_row_merge);
        let result = engine.merge_ids(MergeIdsRequest {
            project_id: project,
            source_ids: &source_ids,
            target_codigo: &body.target_codigo,
            memo: body.memo.as_deref(),
            dry_run: body.dry_run,
            idempotency_key: engine_idempotency_key.as_ref(),
            idempotency_ttl_secs,
            actor: &body.actor,
        })?;
        Ok(MutationOutcome {
            body: serde_json::to_value(&result).map_err(|err| ontocore_core::error::OntoError::internal(err.to_string()))?,
            batch_size: result.would_move,
            updated_rows: result.moved,
        })
    })
    .await?;

    Ok(Json(response_body))
}

/// One `(source_codigo, target_codigo)` pair in `POST /candidates/auto-merge`.
#[derive(Debug, Deserialize)]
pub struct AutoMergePair {
    source_codigo: String,
    target_codigo: String,
}

/// Request body for `POST /candidates/auto-merge`.
#[derive(Debug, Deserialize)]
pub struct AutoMergeRequest {
    project: u64,
    pairs: Vec<AutoMergePair>,
    memo: Option<String>,
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    confirm: bool,
    actor: String,
}

/// Handles `POST /candidates/auto-merge` (§4.3 "Auto-merge by pairs").
/// Admin-scoped; same disciplines as [`post_merge`] (§6).
///
/// # Errors
/// Returns [`ApiError`] on a discipline violation or a frozen project.
pub async fn post_auto_merge(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<AutoMergeRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let project = project_id(body.project)?;
    let pairs: Vec<MergePair> = body
        .pairs
        .into_iter()
        .map(|pair| MergePair { source_codigo: pair.source_codigo, target_codigo: pair.target_codigo })
        .collect();
    let engine_idempotency_key = idempotency_key_header(&headers);
    let idempotency_ttl_secs = state.config.idempotency_ttl_secs;
    let allow_catalog_row_merge = state.config.allow_catalog_row_merge;

    let request = MutationRequest {
        project_id: project,
        operation: "candidates.auto_merge",
        lock_class: LockClass::Catalog,
        dry_run: body.dry_run,
        confirm: body.confirm,
        session_id: session_id_header(&headers),
        idempotency_key: None,
        request_id: state.next_request_id(),
    };

    let (_status, response_body) = run_mutation(&state, request, move |store, clock| {
        let engine = CandidateLifecycleEngine::new(store, clock, allow_catalog_row_merge);
        let results = engine.merge_pairs(MergePairsRequest {
            project_id: project,
            pairs: &pairs,
            memo: body.memo.as_deref(),
            dry_run: body.dry_run,
            idempotency_key: engine_idempotency_key.as_ref(),
            idempotency_ttl_secs,
            actor: &body.actor,
        })?;
        let batch_size = results.iter().map(|result| result.would_move).sum();
        let updated_rows = results.iter().map(|result| result.moved).sum();
        Ok(MutationOutcome {
            body: serde_json::to_value(&results).map_err(|err| ontocore_core::error::OntoError::internal(err.to_string()))?,
            batch_size,
            updated_rows,
        })
    })
    .await?;

    Ok(Json(response_body))
}
