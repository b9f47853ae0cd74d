// crates/ontocore-api/src/routes/readiness.rs
// ============================================================================
// Module: Readiness Route
// Description: GET /readiness?project=… (§6).
// Purpose: Surface the C4 gate's four counters and axial_ready verdict.
// Dependencies: axum, ontocore-core, ontocore-engine
// ============================================================================

use axum::Json;
use axum::extract::Query;
use axum::extract::State;
use ontocore_engine::readiness::compute_readiness;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

use super::project_id;

/// Query parameters for `GET /readiness`.
#[derive(Debug, Deserialize)]
pub struct ReadinessQuery {
    project: u64,
}

/// Response body for `GET /readiness` (§4.4).
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    missing_code_id: u64,
    missing_canonical_code_id: u64,
    divergences_text_vs_id: u64,
    cycles_non_trivial: u64,
    axial_ready: bool,
    blocking_reasons: Vec<&'static str>,
}

/// Handles `GET /readiness?project=…`. Read-only; never takes a lock.
///
/// # Errors
/// Returns [`ApiError`] if `project` is missing/zero or storage fails.
pub async fn get_readiness(State(state): State<AppState>, Query(query): Query<ReadinessQuery>) -> Result<Json<ReadinessResponse>, ApiError> {
    let project = project_id(query.project)?;
    let max_hops = state.config.readiness_max_hops;

    let readiness = state
        .with_ledger(move |store, _clock| {
            let inputs = store.readiness_inputs(project)?;
            Ok(compute_readiness(&inputs, max_hops))
        })
        .await?;

    Ok(Json(ReadinessResponse {
        missing_code_id: readiness.missing_code_id,
        missing_canonical_code_id: readiness.missing_canonical_code_id,
        divergences_text_vs_id: readiness.divergences_text_vs_id,
        cycles_non_trivial: readiness.cycles_non_trivial,
        axial_ready: readiness.axial_ready,
        blocking_reasons: readiness.blocking_reasons,
    }))
}
