// crates/ontocore-api/src/discipline.rs
// ============================================================================
// Module: Mutation Discipline
// Description: The shared dry-run/confirm/advisory-lock/idempotency
//              envelope every mutating endpoint runs its operation
//              through (§4.7).
// Purpose: Enforce the C7 discipline in one place instead of re-deriving
//          it per handler.
// Dependencies: ontocore-core, ontocore-config, tokio
// ============================================================================

//! ## Overview
//! Every mutating route builds a [`MutationRequest`] describing its
//! identity (project, operation name, lock class) and discipline flags,
//! then calls [`run_mutation`] with a closure that performs the actual
//! ledger work. `run_mutation` enforces, in order: (1) the confirm+
//! session-id gate for non-dry-run calls, (2) idempotency-key replay,
//! (3) advisory lock acquisition, (4) structured `request.start`/
//! `request.end` logging and audit-log recording.
//!
//! Per §4.7 "any violation → safe NOOP": a discipline violation (missing
//! confirm, missing session id on a confirmed call) never reaches the
//! closure — it fails closed as `invalid_request` before any lock is
//! taken or any row touched, which is the safest possible NOOP.

use ontocore_core::error::ErrorKind;
use ontocore_core::error::OntoError;
use ontocore_core::identifiers::IdempotencyKey;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::identifiers::RequestId;
use ontocore_core::identifiers::SessionId;
use ontocore_core::interfaces::Clock;
use ontocore_core::interfaces::LedgerStore;
use ontocore_core::interfaces::LockClass;

use crate::audit::entry_from_context;
use crate::state::AppState;
use crate::state::RequestTimer;
use crate::telemetry::OutcomeClass;
use crate::telemetry::RequestContext;

/// Declares the identity and discipline flags for one mutating call.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    /// Project the call is scoped to.
    pub project_id: ProjectId,
    /// Stable operation name (e.g. `"candidates.merge"`), used for
    /// telemetry and audit filtering.
    pub operation: &'static str,
    /// Advisory lock class this operation takes (§5 catalog-before-axial
    /// ordering is the caller's responsibility when a single request
    /// needs more than one class).
    pub lock_class: LockClass,
    /// Whether this call runs in dry-run mode.
    pub dry_run: bool,
    /// Whether the caller declared `confirm=true`.
    pub confirm: bool,
    /// Operator session id (`X-Session-ID`), when supplied.
    pub session_id: Option<SessionId>,
    /// Client-supplied idempotency key (`X-Idempotency-Key`), when supplied.
    pub idempotency_key: Option<IdempotencyKey>,
    /// Per-request correlation id.
    pub request_id: RequestId,
}

/// What a mutation closure reports back to [`run_mutation`] on success.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    /// JSON response body to return to the caller (and to cache under the
    /// idempotency key, if one was supplied).
    pub body: serde_json::Value,
    /// Size of the batch the operation touched, for telemetry.
    pub batch_size: usize,
    /// Number of rows actually updated (0 for a dry run or a no-op).
    pub updated_rows: usize,
}

/// Runs `f` under the full C7 discipline envelope, returning the HTTP
/// status and JSON body to send.
///
/// # Errors
/// Returns [`OntoError`] with kind `invalid_request` if the confirm/
/// session-id gate is violated; kind `busy` if the advisory lock cannot
/// be acquired; kind `internal` if the blocking task panics; otherwise
/// propagates `f`'s error.
pub async fn run_mutation<F>(
    state: &AppState,
    request: MutationRequest,
    f: F,
) -> Result<(axum::http::StatusCode, serde_json::Value), OntoError>
where
    F: FnOnce(&dyn LedgerStore, &dyn Clock) -> Result<MutationOutcome, OntoError> + Send + 'static,
{
    let timer = RequestTimer::start();
    let context = RequestContext {
        project_id: Some(request.project_id.get()),
        session_id: request.session_id.as_ref().map(|id| id.as_str().to_string()),
        request_id: request.request_id.as_str().to_string(),
        operation: request.operation,
        dry_run: request.dry_run,
        confirm: request.confirm,
    };
    context.log_start();

    let result = run_mutation_inner(state, &request, f).await;

    let outcome_class = match &result {
        Ok((_, replay)) if *replay || request.dry_run => OutcomeClass::Noop,
        Ok(_) => OutcomeClass::Ok,
        Err(_) => OutcomeClass::Error,
    };
    let (status_code, batch_size, updated_rows) = match &result {
        Ok((outcome, _replay)) => (axum::http::StatusCode::OK.as_u16(), outcome.batch_size, outcome.updated_rows),
        Err(err) => (crate::error::status_for(err.kind).as_u16(), 0, 0),
    };
    context.log_end(batch_size, updated_rows, timer.elapsed_ms(), status_code, outcome_class);
    let project_id = request.project_id;
    let session_id_str = request.session_id.as_ref().map(|id| id.as_str().to_string());
    let request_id_str = request.request_id.as_str().to_string();
    state.audit.record(entry_from_context(
        Some(request.project_id.get()),
        request.session_id.as_ref().map(|id| id.as_str().to_string()),
        request.request_id.into_string(),
        request.operation,
        request.dry_run,
        request.confirm,
        outcome_class,
        state.clock.now_ms(),
    ));

    result.map(|(outcome, _replay)| {
        (axum::http::StatusCode::OK, envelope(outcome.body, project_id, session_id_str.as_deref(), &request_id_str))
    })
}

/// Folds the fields every mutating endpoint must echo (§6: `project_id`,
/// `session_id`, `request_id`) into a mutation's response body. Merges
/// them onto an object body (overwriting a same-named field the handler
/// already set, e.g. `FreezeResponse::project_id`, with the identical
/// value) or nests a non-object body (a batch array) under `result`.
#[must_use]
pub fn envelope(body: serde_json::Value, project_id: ProjectId, session_id: Option<&str>, request_id: &str) -> serde_json::Value {
    match body {
        serde_json::Value::Object(mut map) => {
            map.insert("project_id".to_string(), serde_json::json!(project_id.get()));
            map.insert("session_id".to_string(), serde_json::json!(session_id));
            map.insert("request_id".to_string(), serde_json::json!(request_id));
            serde_json::Value::Object(map)
        }
        other => serde_json::json!({
            "project_id": project_id.get(),
            "session_id": session_id,
            "request_id": request_id,
            "result": other,
        }),
    }
}

/// The body of [`run_mutation`] before telemetry/audit wrapping, split out
/// so the outer function can observe the result once for both concerns.
/// The returned `bool` is `true` when the response was served from an
/// idempotency-key cache hit rather than by running `f`.
async fn run_mutation_inner<F>(
    state: &AppState,
    request: &MutationRequest,
    f: F,
) -> Result<(MutationOutcome, bool), OntoError>
where
    F: FnOnce(&dyn LedgerStore, &dyn Clock) -> Result<MutationOutcome, OntoError> + Send + 'static,
{
    if !request.dry_run && (!request.confirm || request.session_id.is_none()) {
        return Err(OntoError::new(
            ErrorKind::InvalidRequest,
            "a non-dry-run call requires confirm=true and a fresh X-Session-ID",
        ));
    }

    if let Some(key) = request.idempotency_key.clone() {
        let project_id = request.project_id;
        let cached = state.with_ledger(move |store, _clock| store.get_idempotent_response(project_id, &key)).await?;
        if let Some(body) = cached {
            return Ok((MutationOutcome { body, batch_size: 0, updated_rows: 0 }, true));
        }
    }

    let project_id = request.project_id;
    let lock_class = request.lock_class;
    let session_id = request.session_id.as_ref().map(|id| id.as_str().to_string());
    let timeout_ms = state.config.advisory_lock_timeout_ms;
    let idempotency_ttl_secs = state.config.idempotency_ttl_secs;
    let idempotency_key = request.idempotency_key.clone();

    let outcome = state
        .with_locked_ledger(project_id, lock_class, session_id, timeout_ms, move |store, clock| {
            let outcome = f(store, clock)?;
            if let Some(key) = &idempotency_key {
                store.put_idempotent_response(project_id, key, &outcome.body, idempotency_ttl_secs, clock.now_ms())?;
            }
            Ok(outcome)
        })
        .await?;

    Ok((outcome, false))
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions use unwrap/expect for clarity."
    )]

    use std::num::NonZeroU64;
    use std::sync::Arc;

    use async_trait::async_trait;
    use ontocore_config::OntocoreConfig;
    use ontocore_core::identifiers::ProjectId;
    use ontocore_core::interfaces::AxialEdge;
    use ontocore_core::interfaces::CodeNode;
    use ontocore_core::interfaces::FragmentNode;
    use ontocore_core::interfaces::GraphProjector;
    use ontocore_core::interfaces::SystemClock;
    use ontocore_store_sqlite::InProcessLockManager;
    use ontocore_store_sqlite::SqliteLedgerStore;
    use ontocore_sync::SqliteSyncStateStore;

    use super::*;

    struct NoopProjector;

    #[async_trait]
    impl GraphProjector for NoopProjector {
        async fn upsert_fragments(&self, _fragments: &[FragmentNode]) -> Result<(), OntoError> {
            Ok(())
        }

        async fn upsert_codes(&self, _codes: &[CodeNode]) -> Result<(), OntoError> {
            Ok(())
        }

        async fn upsert_axial_edges(&self, _edges: &[AxialEdge]) -> Result<(), OntoError> {
            Ok(())
        }
    }

    fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteLedgerStore::open_at(&dir.path().join("ledger.sqlite3")).expect("open store");
        let sync_state = SqliteSyncStateStore::open_in_memory().expect("open sync state");
        let state = AppState::new(
            Arc::new(store),
            Arc::new(InProcessLockManager::default()),
            Arc::new(SystemClock),
            Arc::new(OntocoreConfig::default()),
            Arc::new(NoopProjector),
            Arc::new(sync_state),
        );
        (state, dir)
    }

    fn project(raw: u64) -> ProjectId {
        ProjectId::new(NonZeroU64::new(raw).expect("non-zero"))
    }

    #[tokio::test]
    async fn non_dry_run_without_confirm_is_rejected_before_touching_the_store() {
        let (state, _dir) = test_state();
        let request = MutationRequest {
            project_id: project(1),
            operation: "candidates.merge",
            lock_class: LockClass::Catalog,
            dry_run: false,
            confirm: false,
            session_id: None,
            idempotency_key: None,
            request_id: state.next_request_id(),
        };
        let err = run_mutation(&state, request, |_store, _clock| {
            panic!("closure must not run when the discipline gate rejects the call")
        })
        .await
        .expect_err("must reject");
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn dry_run_call_reaches_the_closure_and_succeeds() {
        let (state, _dir) = test_state();
        let request = MutationRequest {
            project_id: project(1),
            operation: "candidates.check_batch",
            lock_class: LockClass::Catalog,
            dry_run: true,
            confirm: false,
            session_id: None,
            idempotency_key: None,
            request_id: state.next_request_id(),
        };
        let (status, body) = run_mutation(&state, request, |store, _clock| {
            let rows = store.list_catalog_rows(project(1))?;
            Ok(MutationOutcome {
                body: serde_json::json!({ "catalog_rows": rows.len() }),
                batch_size: 0,
                updated_rows: 0,
            })
        })
        .await
        .expect("dry run succeeds");
        assert_eq!(status, axum::http::StatusCode::OK);
        assert_eq!(body["catalog_rows"], serde_json::json!(0));
    }

    #[tokio::test]
    async fn idempotency_key_replays_the_cached_response_without_rerunning_the_closure() {
        let (state, _dir) = test_state();
        let key = ontocore_core::identifiers::IdempotencyKey::new("merge-1");
        let request_one = MutationRequest {
            project_id: project(1),
            operation: "candidates.merge",
            lock_class: LockClass::Catalog,
            dry_run: false,
            confirm: true,
            session_id: Some(ontocore_core::identifiers::SessionId::new("sess-1")),
            idempotency_key: Some(key.clone()),
            request_id: state.next_request_id(),
        };
        let (_status, first_body) = run_mutation(&state, request_one, |_store, _clock| {
            Ok(MutationOutcome { body: serde_json::json!({ "merged": 1 }), batch_size: 1, updated_rows: 1 })
        })
        .await
        .expect("first call succeeds");

        let request_two = MutationRequest {
            project_id: project(1),
            operation: "candidates.merge",
            lock_class: LockClass::Catalog,
            dry_run: false,
            confirm: true,
            session_id: Some(ontocore_core::identifiers::SessionId::new("sess-2")),
            idempotency_key: Some(key),
            request_id: state.next_request_id(),
        };
        let (_status, second_body) = run_mutation(&state, request_two, |_store, _clock| {
            panic!("idempotent replay must not rerun the closure")
        })
        .await
        .expect("replay succeeds");

        assert_eq!(first_body["merged"], second_body["merged"], "the cached closure result must replay unchanged");
        assert_eq!(second_body["session_id"], serde_json::json!("sess-2"), "the envelope echoes the replaying request's own session_id");
        assert_ne!(first_body["request_id"], second_body["request_id"], "each call gets its own request_id even on idempotent replay");
    }
}
