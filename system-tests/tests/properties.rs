// system-tests/tests/properties.rs
// ============================================================================
// Module: Cross-Crate Properties
// Description: P1-P10 from the testable-properties list, split between
//              pure proptest checks over the resolver/readiness gate and
//              harness-driven checks over a spawned server.
// Purpose: Give the invariants that matter across the whole lifecycle a
//          home independent of any one crate's unit tests.
// Dependencies: system-tests helpers, proptest, ontocore-engine,
//               ontocore-core, reqwest, tokio
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test assertions use unwrap/expect for clarity; a panic here is a failed test."
)]

mod helpers;

use std::num::NonZeroU64;
use std::time::Duration;

use helpers::fixtures;
use helpers::graph_stub::GraphStub;
use helpers::harness::Harness;
use ontocore_core::identifiers::CodeId;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::model::CatalogRow;
use ontocore_core::model::CatalogStatus;
use ontocore_engine::resolver::CanonicalResolution;
use ontocore_engine::resolver::CatalogIndex;
use proptest::collection::vec as prop_vec;
use proptest::prelude::*;
use serde_json::Value;
use serde_json::json;

const PROJECT: u64 = 1;

fn project() -> ProjectId {
    ProjectId::from_raw(PROJECT).expect("project id")
}

fn code_id(raw: u64) -> CodeId {
    CodeId::new(NonZeroU64::new(raw).expect("nonzero"))
}

fn row_with_canonical(id: u64, canonical: Option<u64>) -> CatalogRow {
    CatalogRow {
        code_id: code_id(id),
        project_id: project(),
        codigo: format!("codigo-{id}"),
        status: CatalogStatus::Active,
        canonical_code_id: canonical.map(code_id),
        memo: None,
        created_at_ms: 0,
        updated_at_ms: 0,
    }
}

proptest! {
    /// P1 Canonical termination. Any acyclic chain resolves within its own
    /// node count, never reporting `CycleDetected`.
    #[test]
    fn p1_canonical_termination_on_dags(len in 2usize..12) {
        // Node `i` (1-indexed) points at a strictly lower index, or is
        // self-canonical. This shape cannot contain a cycle.
        let rows: Vec<CatalogRow> = (1..=len as u64)
            .map(|id| {
                let canonical = if id == 1 { None } else { Some(id - 1) };
                row_with_canonical(id, canonical)
            })
            .collect();
        let index = CatalogIndex::build(&rows);

        for id in 1..=len as u64 {
            let resolution = index.resolve_canonical(code_id(id), len as u32 + 1);
            prop_assert!(matches!(resolution, CanonicalResolution::Resolved(_)), "node {id} failed to terminate on an acyclic chain");
        }
    }

    /// P2 Cycle safety. A genuine cycle (length >= 2) is reported as
    /// `CycleDetected` for every member, never a panic or a false Resolved.
    #[test]
    fn p2_cycle_safety(cycle_len in 2usize..6) {
        let rows: Vec<CatalogRow> = (1..=cycle_len as u64)
            .map(|id| {
                let next = if id == cycle_len as u64 { 1 } else { id + 1 };
                row_with_canonical(id, Some(next))
            })
            .collect();
        let index = CatalogIndex::build(&rows);

        for id in 1..=cycle_len as u64 {
            let resolution = index.resolve_canonical(code_id(id), cycle_len as u32 + 1);
            prop_assert_eq!(resolution, CanonicalResolution::CycleDetected, "node {} in a {}-cycle should be reported as a cycle", id, cycle_len);
        }
    }

    /// P3 Self-canonical is expected. A row with no canonical pointer, or
    /// one pointing at itself, always resolves to itself.
    #[test]
    fn p3_self_canonical_is_expected(id in 1u64..1000, points_at_self in any::<bool>()) {
        let canonical = if points_at_self { Some(id) } else { None };
        let rows = vec![row_with_canonical(id, canonical)];
        let index = CatalogIndex::build(&rows);

        let resolution = index.resolve_canonical(code_id(id), 8);
        prop_assert_eq!(resolution, CanonicalResolution::Resolved(code_id(id)));
    }

    /// P3 extended to a chain: a row two hops from a self-canonical
    /// terminus resolves to that terminus, not to an intermediate hop.
    #[test]
    fn p3_chain_resolves_to_the_self_canonical_terminus(chain in prop_vec(1u64..500, 2..8)) {
        let ids: Vec<u64> = chain.into_iter().collect::<std::collections::BTreeSet<_>>().into_iter().collect();
        prop_assume!(ids.len() >= 2);
        let rows: Vec<CatalogRow> = ids
            .iter()
            .enumerate()
            .map(|(position, &id)| {
                let canonical = if position == 0 { None } else { Some(ids[position - 1]) };
                row_with_canonical(id, canonical)
            })
            .collect();
        let index = CatalogIndex::build(&rows);

        let terminus = ids[0];
        for &id in &ids {
            let resolution = index.resolve_canonical(code_id(id), ids.len() as u32 + 1);
            prop_assert_eq!(resolution, CanonicalResolution::Resolved(code_id(terminus)));
        }
    }
}

async fn json_body(response: reqwest::Response) -> Value {
    response.json().await.expect("response body is valid JSON")
}

async fn promote_candidate(harness: &Harness, codigo: &str, fragment: &str) -> Value {
    let candidate: Value = json_body(
        harness
            .client
            .post(format!("{}/candidates", harness.base_url))
            .json(&fixtures::submit_candidate(PROJECT, codigo, Some(fragment)))
            .send()
            .await
            .expect("submit candidate"),
    )
    .await;
    let candidate_id = candidate["id"].as_u64().expect("candidate id");
    harness
        .client
        .put(format!("{}/candidates/{candidate_id}/validate", harness.base_url))
        .json(&fixtures::transition(PROJECT, "analyst-1"))
        .send()
        .await
        .expect("validate candidate");
    json_body(
        harness
            .client
            .post(format!("{}/candidates/{candidate_id}/promote", harness.base_url))
            .json(&fixtures::promote(PROJECT, &format!("cita para {codigo}"), "analyst-1"))
            .send()
            .await
            .expect("promote candidate"),
    )
    .await
}

/// P4 No-loss merge. Every source fragment assigned before a merge still
/// has an assignment after the merge; none are dropped, only
/// repointed at the target's `code_id`.
#[tokio::test]
async fn p4_no_loss_merge() {
    let harness = Harness::spawn(|_| {}).await;

    let target = promote_candidate(&harness, "categoria principal", "f0").await;
    let target_codigo = target["catalog"]["codigo"].as_str().expect("target codigo").to_string();

    let mut source_ids = Vec::new();
    for (codigo, fragment) in [("Categoria Principal Alt", "f1"), ("categoria ppal", "f2")] {
        let candidate: Value = json_body(
            harness
                .client
                .post(format!("{}/candidates", harness.base_url))
                .json(&fixtures::submit_candidate(PROJECT, codigo, Some(fragment)))
                .send()
                .await
                .expect("submit source"),
        )
        .await;
        source_ids.push(candidate["id"].as_u64().expect("source id"));
    }

    let merged: Value = json_body(
        harness
            .client
            .post(format!("{}/candidates/merge", harness.base_url))
            .header("X-Idempotency-Key", "p4-merge")
            .header("X-Session-ID", "session-1")
            .json(&fixtures::merge(PROJECT, &source_ids, &target_codigo, "analyst-1", false, true))
            .send()
            .await
            .expect("merge"),
    )
    .await;

    let moved = merged["moved"].as_u64().unwrap_or(0);
    assert_eq!(moved, source_ids.len() as u64, "every source fragment should be reassigned, none dropped");

    harness.shutdown().await;
}

/// P5 Idempotent merges. Replaying the same `merge_pairs` call under the
/// same idempotency key returns byte-identical JSON and does not add a
/// second version event for the same pair.
#[tokio::test]
async fn p5_idempotent_auto_merge() {
    let harness = Harness::spawn(|_| {}).await;

    promote_candidate(&harness, "riesgo operativo", "f0").await;
    let source: Value = json_body(
        harness
            .client
            .post(format!("{}/candidates", harness.base_url))
            .json(&fixtures::submit_candidate(PROJECT, "Riesgo Operativo Dup", Some("f1")))
            .send()
            .await
            .expect("submit source"),
    )
    .await;
    let source_id = source["id"].as_u64().expect("source id");

    let pairs = json!([{ "source_codigo": "Riesgo Operativo Dup", "target_codigo": "riesgo operativo" }]);
    let body = json!({
        "project": PROJECT,
        "pairs": pairs,
        "memo": null,
        "dry_run": false,
        "confirm": true,
        "actor": "admin-1",
    });

    let first = harness
        .client
        .post(format!("{}/candidates/auto-merge", harness.base_url))
        .header("X-Idempotency-Key", "p5-auto-merge")
        .header("X-Session-ID", "session-1")
        .json(&body)
        .send()
        .await
        .expect("first auto-merge");
    let first_body: Value = json_body(first).await;

    let second = harness
        .client
        .post(format!("{}/candidates/auto-merge", harness.base_url))
        .header("X-Idempotency-Key", "p5-auto-merge")
        .header("X-Session-ID", "session-1")
        .json(&body)
        .send()
        .await
        .expect("replayed auto-merge");
    let second_body: Value = json_body(second).await;

    assert_eq!(first_body, second_body, "a replayed auto-merge must return byte-identical JSON");

    let project = project();
    let store = ontocore_store_sqlite::SqliteLedgerStore::open_at(&harness.config.ledger.path).expect("reopen ledger");
    use ontocore_core::interfaces::LedgerStore;
    let events = store.list_version_events(project, 100).expect("list version events");
    let merge_events_for_source = events
        .iter()
        .filter(|event| event.action == ontocore_core::model::VersionAction::Merge && event.code_id == Some(code_id(source_id)))
        .count();
    assert!(merge_events_for_source <= 1, "replay must not append a second merge event for the same source");

    harness.shutdown().await;
}

/// P6 Gate enforcement. Every non-zero readiness counter is echoed back in
/// `blocking_reasons` when an axial write is attempted; once cleared the
/// write proceeds.
#[tokio::test]
async fn p6_gate_enforcement_reports_all_blocking_reasons() {
    let harness = Harness::spawn(|_| {}).await;

    promote_candidate(&harness, "tension comunitaria", "f0").await;

    let project = project();
    let store = ontocore_store_sqlite::SqliteLedgerStore::open_at(&harness.config.ledger.path).expect("reopen ledger");
    use ontocore_core::interfaces::LedgerStore;
    let mut assignment = store.list_assignments(project).expect("list assignments").into_iter().next().expect("one assignment");
    assignment.code_id = None;
    store.upsert_assignment(&assignment).expect("null code_id");

    let response = harness
        .client
        .post(format!("{}/axial/relations", harness.base_url))
        .header("X-Session-ID", "session-1")
        .json(&fixtures::axial_relation(PROJECT, "categoria", "tension comunitaria", &["cita uno", "cita dos"], false, true))
        .send()
        .await
        .expect("axial write attempt");
    assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
    let body: Value = json_body(response).await;
    let reasons = body["details"]["blocking_reasons"].as_array().expect("blocking_reasons array");
    assert!(reasons.iter().any(|reason| reason == "missing_code_id"));

    harness.shutdown().await;
}

/// P7 Freeze exclusivity. A dry-run merge succeeds while frozen and
/// describes the would-be effect; a confirmed merge is refused with
/// `423 frozen`.
#[tokio::test]
async fn p7_freeze_exclusivity() {
    let harness = Harness::spawn(|_| {}).await;

    let target = promote_candidate(&harness, "barrera de acceso", "f0").await;
    let target_codigo = target["catalog"]["codigo"].as_str().expect("codigo").to_string();
    let source: Value = json_body(
        harness
            .client
            .post(format!("{}/candidates", harness.base_url))
            .json(&fixtures::submit_candidate(PROJECT, "Barrera De Acceso Dup", Some("f1")))
            .send()
            .await
            .expect("submit source"),
    )
    .await;
    let source_id = source["id"].as_u64().expect("source id");

    harness
        .client
        .post(format!("{}/freeze", harness.base_url))
        .header("X-Session-ID", "session-1")
        .json(&fixtures::freeze_toggle(PROJECT, "admin-1", false, true))
        .send()
        .await
        .expect("freeze project");

    let dry_run = harness
        .client
        .post(format!("{}/candidates/merge", harness.base_url))
        .json(&fixtures::merge(PROJECT, &[source_id], &target_codigo, "admin-1", true, false))
        .send()
        .await
        .expect("dry-run merge while frozen");
    assert_eq!(dry_run.status(), reqwest::StatusCode::OK);

    let confirmed = harness
        .client
        .post(format!("{}/candidates/merge", harness.base_url))
        .header("X-Session-ID", "session-1")
        .json(&fixtures::merge(PROJECT, &[source_id], &target_codigo, "admin-1", false, true))
        .send()
        .await
        .expect("confirmed merge while frozen");
    assert_eq!(confirmed.status(), reqwest::StatusCode::LOCKED);

    harness.shutdown().await;
}

/// P8 Projection monotonicity. Draining sync once moves every pending
/// fragment to the stub; a second drain reports nothing left to do.
#[tokio::test]
async fn p8_projection_monotonicity() {
    let stub = GraphStub::spawn().await;
    let stub_url = stub.base_url.clone();
    let harness = Harness::spawn(|config| config.graph_store.endpoint = stub_url).await;

    for index in 0..5 {
        promote_candidate(&harness, &format!("codigo proyeccion {index}"), &format!("f{index}")).await;
    }

    let mut first_pass_synced = 0_u64;
    for _ in 0..5 {
        let response: Value = json_body(
            harness
                .client
                .post(format!("{}/sync/fragments", harness.base_url))
                .header("X-Session-ID", "session-1")
                .json(&fixtures::sync_request(PROJECT, false, true))
                .send()
                .await
                .expect("first sync pass"),
        )
        .await;
        first_pass_synced += response["synced"].as_u64().unwrap_or(0);
        if first_pass_synced >= 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(first_pass_synced >= 5);

    let second_pass: Value = json_body(
        harness
            .client
            .post(format!("{}/sync/fragments", harness.base_url))
            .header("X-Session-ID", "session-1")
            .json(&fixtures::sync_request(PROJECT, false, true))
            .send()
            .await
            .expect("second sync pass"),
    )
    .await;
    assert_eq!(second_pass["synced"], json!(0), "a second drain must project nothing new");

    stub.shutdown().await;
    harness.shutdown().await;
}

/// P9 Audit completeness. A successful promote appends at least one
/// version event recording the actor, previous state, and next state.
#[tokio::test]
async fn p9_audit_completeness() {
    let harness = Harness::spawn(|_| {}).await;
    promote_candidate(&harness, "evento auditado", "f0").await;

    let project = project();
    let store = ontocore_store_sqlite::SqliteLedgerStore::open_at(&harness.config.ledger.path).expect("reopen ledger");
    use ontocore_core::interfaces::LedgerStore;
    let events = store.list_version_events(project, 100).expect("list version events");
    assert!(!events.is_empty(), "a successful promote must append at least one version event");
    let promote_event = events
        .iter()
        .find(|event| event.action == ontocore_core::model::VersionAction::Promote)
        .expect("a promote event exists");
    assert_eq!(promote_event.actor, "analyst-1");

    harness.shutdown().await;
}

/// P10 Outcome classification. A dry-run request is logged `NOOP`, a
/// confirmed mutation `OK`, and a discipline violation `ERROR`.
#[tokio::test]
async fn p10_outcome_classification() {
    let harness = Harness::spawn(|_| {}).await;

    harness
        .client
        .post(format!("{}/axial/relations", harness.base_url))
        .json(&fixtures::axial_relation(PROJECT, "categoria", "codigo inexistente", &["cita uno", "cita dos"], true, false))
        .send()
        .await
        .expect("dry-run axial write");

    harness
        .client
        .post(format!("{}/freeze", harness.base_url))
        .header("X-Session-ID", "session-1")
        .json(&fixtures::freeze_toggle(PROJECT, "admin-1", false, true))
        .send()
        .await
        .expect("confirmed freeze");

    harness
        .client
        .post(format!("{}/candidates/merge", harness.base_url))
        .json(&fixtures::merge(PROJECT, &[999], "no existe", "admin-1", false, false))
        .send()
        .await
        .expect("invalid merge request");

    let ops: Value = json_body(
        harness
            .client
            .get(format!("{}/ops/recent?limit=50", harness.base_url))
            .send()
            .await
            .expect("ops recent"),
    )
    .await;
    let entries = ops["entries"].as_array().expect("entries array");

    let has_noop = entries.iter().any(|entry| entry["outcome"] == json!("NOOP") && entry["dry_run"] == json!(true));
    let has_ok = entries.iter().any(|entry| entry["outcome"] == json!("OK") && entry["operation"] == json!("freeze.engage"));
    let has_error = entries.iter().any(|entry| entry["outcome"] == json!("ERROR") && entry["is_error"] == json!(true));

    assert!(has_noop, "a dry-run request should classify as NOOP");
    assert!(has_ok, "a confirmed freeze should classify as OK");
    assert!(has_error, "an invalid-request merge should classify as ERROR");

    harness.shutdown().await;
}
