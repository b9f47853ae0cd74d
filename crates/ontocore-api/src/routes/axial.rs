// crates/ontocore-api/src/routes/axial.rs
// ============================================================================
// Module: Axial Relation Route
// Description: POST /axial/relations (§4.4, §6).
// Purpose: Record a category-to-code axial relation once the identity
//          layer is C4-ready, under the full C7 discipline.
// Dependencies: axum, ontocore-core, ontocore-engine
// ============================================================================

//! ## Overview
//! A dry run always reports the relation it would write, whether or not
//! the project is axial-ready, so an operator can see what a write would
//! look like before the identity backlog is cleared. A confirmed write is
//! refused with `not_ready` (409) unless [`compute_readiness`] reports
//! `axial_ready`.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use ontocore_core::error::OntoError;
use ontocore_core::identifiers::FragmentId;
use ontocore_core::interfaces::LockClass;
use ontocore_core::model::AxialRelationType;
use ontocore_core::model::AxialRow;
use ontocore_core::model::AxialState;
use ontocore_engine::readiness::compute_readiness;
use ontocore_engine::resolver::CatalogIndex;
use serde::Deserialize;

use crate::discipline::MutationOutcome;
use crate::discipline::MutationRequest;
use crate::discipline::run_mutation;
use crate::error::ApiError;
use crate::state::AppState;

use super::idempotency_key_header;
use super::project_id;
use super::session_id_header;

/// Minimum supporting fragments an axial relation must cite (§3 "Axial Relation").
const MIN_EVIDENCE: usize = 2;

/// Request body for `POST /axial/relations`.
#[derive(Debug, Deserialize)]
pub struct AxialRelationRequest {
    project: u64,
    categoria: String,
    codigo: String,
    relation: AxialRelationType,
    memo: Option<String>,
    evidence: Vec<String>,
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    confirm: bool,
}

/// Handles `POST /axial/relations` (§4.4).
///
/// # Errors
/// Returns [`ApiError`] if `codigo` is not catalogued, if `evidence` has
/// fewer than two entries, or if a confirmed write is attempted while the
/// project is not axial-ready.
pub async fn post_axial_relation(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<AxialRelationRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let project = project_id(body.project)?;
    if body.evidence.len() < MIN_EVIDENCE {
        return Err(OntoError::invalid_request(format!("axial relations require at least {MIN_EVIDENCE} supporting fragments")).into());
    }

    let max_hops = state.config.readiness_max_hops;
    let request = MutationRequest {
        project_id: project,
        operation: "axial.relate",
        lock_class: LockClass::Axial,
        dry_run: body.dry_run,
        confirm: body.confirm,
        session_id: session_id_header(&headers),
        idempotency_key: idempotency_key_header(&headers),
        request_id: state.next_request_id(),
    };

    let dry_run = body.dry_run;
    let categoria = body.categoria;
    let codigo = body.codigo;
    let relation = body.relation;
    let memo = body.memo;
    let evidence: Vec<FragmentId> = body.evidence.into_iter().map(FragmentId::new).collect();

    let (_status, response_body) = run_mutation(&state, request, move |store, clock| {
        let rows = store.list_catalog_rows(project)?;
        let index = CatalogIndex::build(&rows);
        let raw_code_id = index
            .code_id_of_label(&codigo)
            .ok_or_else(|| OntoError::not_found(format!("code '{codigo}' is not catalogued in project {project}")))?;
        let code_id = index
            .resolve_canonical(raw_code_id, max_hops)
            .code_id()
            .ok_or_else(|| OntoError::conflict(format!("code '{codigo}' does not resolve to a canonical code_id")))?;

        if !dry_run {
            let inputs = store.readiness_inputs(project)?;
            let readiness = compute_readiness(&inputs, max_hops);
            if !readiness.axial_ready {
                return Err(OntoError::not_ready(&readiness.blocking_reasons));
            }
        }

        let row = AxialRow {
            project_id: project,
            categoria,
            codigo,
            code_id,
            relation,
            memo,
            evidence,
            state: AxialState::Pending,
        };

        if !dry_run {
            store.upsert_axial(&row)?;
        }
        let _ = clock;

        Ok(MutationOutcome {
            body: serde_json::to_value(&row).map_err(|err| OntoError::internal(err.to_string()))?,
            batch_size: 1,
            updated_rows: usize::from(!dry_run),
        })
    })
    .await?;

    Ok(Json(response_body))
}
