// crates/ontocore-api/src/routes/ops.rs
// ============================================================================
// Module: Operational Audit Routes
// Description: GET /ops/recent, GET /ops/log (§6).
// Purpose: Let an operator inspect the admin-operation history recorded
//          by every mutating route's discipline envelope.
// Dependencies: axum, ontocore-core
// ============================================================================

use axum::Json;
use axum::extract::Query;
use axum::extract::State;
use serde::Deserialize;
use serde::Serialize;

use crate::audit::AuditEntry;
use crate::audit::AuditQuery;
use crate::error::ApiError;
use crate::state::AppState;

/// Default cap on entries returned when `limit` is not supplied.
const DEFAULT_LIMIT: usize = 50;

/// Query parameters shared by `GET /ops/recent` and `GET /ops/log`.
#[derive(Debug, Deserialize)]
pub struct OpsQuery {
    kind: Option<String>,
    op: Option<String>,
    intent: Option<String>,
    since_ms: Option<i64>,
    until_ms: Option<i64>,
    limit: Option<usize>,
}

/// Response body for both ops routes.
#[derive(Debug, Serialize)]
pub struct OpsResponse {
    entries: Vec<AuditEntry>,
}

impl From<OpsQuery> for AuditQuery {
    fn from(query: OpsQuery) -> Self {
        Self {
            kind: query.kind,
            op: query.op,
            intent: query.intent,
            since_ms: query.since_ms,
            until_ms: query.until_ms,
            limit: query.limit.unwrap_or(DEFAULT_LIMIT),
        }
    }
}

/// Handles `GET /ops/recent`. Shorthand for `GET /ops/log` with the
/// default limit and no filters beyond what the caller supplies.
///
/// # Errors
/// Never returns an error; present for symmetry with the other routes.
pub async fn get_ops_recent(State(state): State<AppState>, Query(query): Query<OpsQuery>) -> Result<Json<OpsResponse>, ApiError> {
    let entries = state.audit.query(&AuditQuery::from(query));
    Ok(Json(OpsResponse { entries }))
}

/// Handles `GET /ops/log`. Same shape as [`get_ops_recent`]; kept as a
/// distinct path per §6 for operators who want the full filterable query
/// surface under a separate name from the "recent activity" shorthand.
///
/// # Errors
/// Never returns an error; present for symmetry with the other routes.
pub async fn get_ops_log(State(state): State<AppState>, Query(query): Query<OpsQuery>) -> Result<Json<OpsResponse>, ApiError> {
    let entries = state.audit.query(&AuditQuery::from(query));
    Ok(Json(OpsResponse { entries }))
}
