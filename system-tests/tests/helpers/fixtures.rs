// system-tests/tests/helpers/fixtures.rs
// ============================================================================
// Module: Request Fixtures
// Description: Small JSON builders for the request bodies every route
//              expects, so scenario tests read as a sequence of actions
//              rather than a wall of object literals.
// Purpose: Keep scenarios.rs and properties.rs focused on what a test
//          asserts, not on each route's field names.
// Dependencies: serde_json
// ============================================================================

use serde_json::Value;
use serde_json::json;

/// Body for `POST /candidates`.
#[must_use]
pub fn submit_candidate(project: u64, codigo: &str, fragment_id: Option<&str>) -> Value {
    json!({
        "project": project,
        "codigo": codigo,
        "fragment_id": fragment_id,
        "source": "manual",
        "confidence": 0.9,
        "memo": null,
    })
}

/// Body for `PUT /candidates/{id}/validate` and `/reject`.
#[must_use]
pub fn transition(project: u64, actor: &str) -> Value {
    json!({ "project": project, "actor": actor, "memo": null })
}

/// Body for `POST /candidates/{id}/promote`.
#[must_use]
pub fn promote(project: u64, cita: &str, actor: &str) -> Value {
    json!({ "project": project, "cita": cita, "source_file": null, "actor": actor })
}

/// Body for `POST /candidates/merge`.
#[must_use]
pub fn merge(project: u64, source_ids: &[u64], target_codigo: &str, actor: &str, dry_run: bool, confirm: bool) -> Value {
    json!({
        "project": project,
        "source_ids": source_ids,
        "target_codigo": target_codigo,
        "memo": null,
        "dry_run": dry_run,
        "confirm": confirm,
        "actor": actor,
    })
}

/// Body for `POST /axial/relations`.
#[must_use]
pub fn axial_relation(project: u64, categoria: &str, codigo: &str, evidence: &[&str], dry_run: bool, confirm: bool) -> Value {
    json!({
        "project": project,
        "categoria": categoria,
        "codigo": codigo,
        "relation": "cause",
        "memo": null,
        "evidence": evidence,
        "dry_run": dry_run,
        "confirm": confirm,
    })
}

/// Body for `POST /freeze` and `POST /freeze/break`.
#[must_use]
pub fn freeze_toggle(project: u64, actor: &str, dry_run: bool, confirm: bool) -> Value {
    json!({ "project": project, "actor": actor, "note": null, "dry_run": dry_run, "confirm": confirm })
}

/// Body for `POST /sync/fragments` and `POST /sync/axial`.
#[must_use]
pub fn sync_request(project: u64, dry_run: bool, confirm: bool) -> Value {
    json!({ "project": project, "dry_run": dry_run, "confirm": confirm })
}
