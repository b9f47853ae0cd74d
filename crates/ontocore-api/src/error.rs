// crates/ontocore-api/src/error.rs
// ============================================================================
// Module: API Error Mapping
// Description: Maps OntoError onto the HTTP error shape from spec §6/§7.
// Purpose: Give every handler a single `?`-friendly conversion into a
//          well-formed JSON error response.
// Dependencies: axum, ontocore-core, serde_json
// ============================================================================

//! ## Overview
//! `409 not_ready` is distinguished from `423 frozen` and from `409
//! conflict` by the `error` kind in the body, not by status code alone,
//! per §7 — the status codes below are the HTTP-idiomatic nearest
//! neighbor, never the sole signal a client should branch on.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use ontocore_core::error::ErrorKind;
use ontocore_core::error::OntoError;
use serde_json::json;

/// Wraps [`OntoError`] so it can be returned directly from an Axum handler.
#[derive(Debug)]
pub struct ApiError(
    /// The underlying taxonomy-classified error.
    pub OntoError,
);

impl From<OntoError> for ApiError {
    fn from(err: OntoError) -> Self {
        Self(err)
    }
}

/// Maps an error kind onto its nearest-neighbor HTTP status code.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::NotReady => StatusCode::CONFLICT,
        ErrorKind::Frozen => StatusCode::LOCKED,
        ErrorKind::Busy => StatusCode::CONFLICT,
        ErrorKind::Dependency => StatusCode::BAD_GATEWAY,
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind);
        let body = json!({
            "error": self.0.kind.as_str(),
            "message": self.0.message,
            "details": self.0.details,
        });
        (status, Json(body)).into_response()
    }
}
