// crates/ontocore-engine/src/test_support.rs
// ============================================================================
// Module: Test Support (cfg(test) only)
// Description: In-memory LedgerStore double shared by this crate's unit
//              tests.
// Purpose: Avoid duplicating a full LedgerStore impl in every test module.
// Dependencies: ontocore-core
// ============================================================================

#![cfg(test)]

use std::cell::RefCell;
use std::collections::HashMap;

use ontocore_core::error::OntoError;
use ontocore_core::identifiers::CandidateId;
use ontocore_core::identifiers::CodeId;
use ontocore_core::identifiers::IdempotencyKey;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::interfaces::Clock;
use ontocore_core::interfaces::LedgerStore;
use ontocore_core::interfaces::ReadinessInputs;
use ontocore_core::model::AssignmentRow;
use ontocore_core::model::AxialRow;
use ontocore_core::model::CandidateRow;
use ontocore_core::model::CatalogRow;
use ontocore_core::model::FreezeRow;
use ontocore_core::model::VersionEvent;

/// A clock that always returns the same instant.
pub(crate) struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// A single-threaded, in-memory [`LedgerStore`] double. Not a realistic
/// concurrency model (no locking, no transactions) — it exists only to
/// exercise the pure decision logic in this crate against plausible data.
#[derive(Default)]
pub(crate) struct MemoryLedgerStore {
    next_code_id: RefCell<u64>,
    next_candidate_id: RefCell<u64>,
    catalog: RefCell<HashMap<CodeId, CatalogRow>>,
    candidates: RefCell<HashMap<CandidateId, CandidateRow>>,
    assignments: RefCell<Vec<AssignmentRow>>,
    freeze: RefCell<Option<FreezeRow>>,
    versions: RefCell<Vec<VersionEvent>>,
    idempotency: RefCell<HashMap<String, serde_json::Value>>,
}

impl MemoryLedgerStore {
    pub(crate) fn insert_seed_catalog_row(&self, row: CatalogRow) {
        let mut next = self.next_code_id.borrow_mut();
        *next = (*next).max(row.code_id.get());
        self.catalog.borrow_mut().insert(row.code_id, row);
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn get_catalog_row(&self, _: ProjectId, code_id: CodeId) -> Result<Option<CatalogRow>, OntoError> {
        Ok(self.catalog.borrow().get(&code_id).cloned())
    }

    fn get_catalog_row_by_label(&self, _: ProjectId, codigo: &str) -> Result<Option<CatalogRow>, OntoError> {
        Ok(self
            .catalog
            .borrow()
            .values()
            .find(|row| row.codigo.eq_ignore_ascii_case(codigo))
            .cloned())
    }

    fn insert_catalog_row(
        &self,
        project_id: ProjectId,
        codigo: &str,
        memo: Option<&str>,
        now_ms: i64,
    ) -> Result<CatalogRow, OntoError> {
        if self
            .catalog
            .borrow()
            .values()
            .any(|row| row.codigo.eq_ignore_ascii_case(codigo))
        {
            return Err(OntoError::conflict(format!("codigo {codigo} already exists")));
        }
        let mut next = self.next_code_id.borrow_mut();
        *next += 1;
        let code_id = CodeId::from_raw(*next).ok_or_else(|| OntoError::internal("code id overflow"))?;
        let row = CatalogRow {
            code_id,
            project_id,
            codigo: codigo.to_string(),
            status: ontocore_core::model::CatalogStatus::Active,
            canonical_code_id: Some(code_id),
            memo: memo.map(str::to_string),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };
        self.catalog.borrow_mut().insert(code_id, row.clone());
        Ok(row)
    }

    fn update_catalog_row(&self, row: &CatalogRow) -> Result<(), OntoError> {
        if !self.catalog.borrow().contains_key(&row.code_id) {
            return Err(OntoError::not_found("catalog row not found"));
        }
        self.catalog.borrow_mut().insert(row.code_id, row.clone());
        Ok(())
    }

    fn list_catalog_rows(&self, _: ProjectId) -> Result<Vec<CatalogRow>, OntoError> {
        Ok(self.catalog.borrow().values().cloned().collect())
    }

    fn upsert_candidate(&self, candidate: &CandidateRow) -> Result<CandidateRow, OntoError> {
        let existing = self.candidates.borrow().values().find(|row| {
            row.project_id == candidate.project_id
                && row.codigo.eq_ignore_ascii_case(&candidate.codigo)
                && row.fragment_id == candidate.fragment_id
        }).cloned();

        if let Some(mut existing) = existing {
            existing.confidence = existing.confidence.max(candidate.confidence);
            existing.updated_at_ms = candidate.updated_at_ms;
            self.candidates.borrow_mut().insert(existing.id, existing.clone());
            return Ok(existing);
        }

        let mut next = self.next_candidate_id.borrow_mut();
        *next += 1;
        let id = CandidateId::from_raw(*next).ok_or_else(|| OntoError::internal("candidate id overflow"))?;
        let mut row = candidate.clone();
        row.id = id;
        self.candidates.borrow_mut().insert(id, row.clone());
        Ok(row)
    }

    fn get_candidate(&self, _: ProjectId, id: CandidateId) -> Result<Option<CandidateRow>, OntoError> {
        Ok(self.candidates.borrow().get(&id).cloned())
    }

    fn list_candidates_by_label(&self, _: ProjectId, codigo: &str) -> Result<Vec<CandidateRow>, OntoError> {
        Ok(self
            .candidates
            .borrow()
            .values()
            .filter(|row| row.codigo.eq_ignore_ascii_case(codigo))
            .cloned()
            .collect())
    }

    fn list_recent_candidates(&self, _: ProjectId, limit: usize) -> Result<Vec<CandidateRow>, OntoError> {
        let mut rows: Vec<CandidateRow> = self.candidates.borrow().values().cloned().collect();
        rows.sort_by_key(|row| std::cmp::Reverse(row.created_at_ms));
        rows.truncate(limit);
        Ok(rows)
    }

    fn update_candidate(&self, candidate: &CandidateRow) -> Result<(), OntoError> {
        if !self.candidates.borrow().contains_key(&candidate.id) {
            return Err(OntoError::not_found("candidate not found"));
        }
        self.candidates.borrow_mut().insert(candidate.id, candidate.clone());
        Ok(())
    }

    fn upsert_assignment(&self, assignment: &AssignmentRow) -> Result<(), OntoError> {
        let mut assignments = self.assignments.borrow_mut();
        if let Some(existing) = assignments.iter_mut().find(|row| {
            row.project_id == assignment.project_id
                && row.fragment_id == assignment.fragment_id
                && row.codigo == assignment.codigo
        }) {
            *existing = assignment.clone();
        } else {
            assignments.push(assignment.clone());
        }
        Ok(())
    }

    fn list_assignments(&self, _: ProjectId) -> Result<Vec<AssignmentRow>, OntoError> {
        Ok(self.assignments.borrow().clone())
    }

    fn upsert_axial(&self, _: &AxialRow) -> Result<(), OntoError> {
        Ok(())
    }

    fn list_axial_rows(&self, _: ProjectId) -> Result<Vec<AxialRow>, OntoError> {
        Ok(Vec::new())
    }

    fn readiness_inputs(&self, project_id: ProjectId) -> Result<ReadinessInputs, OntoError> {
        let catalog_rows = self.list_catalog_rows(project_id)?;
        let assignment_rows = self.list_assignments(project_id)?;
        Ok(ReadinessInputs {
            assignments_missing_code_id: Vec::new(),
            catalog_missing_canonical: Vec::new(),
            catalog_rows,
            assignment_rows,
        })
    }

    fn get_freeze(&self, project_id: ProjectId) -> Result<FreezeRow, OntoError> {
        Ok(self.freeze.borrow().clone().unwrap_or(FreezeRow {
            project_id,
            is_frozen: false,
            frozen_at_ms: None,
            frozen_by: None,
            broken_at_ms: None,
            broken_by: None,
            note: None,
        }))
    }

    fn put_freeze(&self, freeze: &FreezeRow) -> Result<(), OntoError> {
        *self.freeze.borrow_mut() = Some(freeze.clone());
        Ok(())
    }

    fn append_version_event(&self, event: &VersionEvent) -> Result<(), OntoError> {
        self.versions.borrow_mut().push(event.clone());
        Ok(())
    }

    fn list_version_events(&self, _: ProjectId, limit: usize) -> Result<Vec<VersionEvent>, OntoError> {
        let mut events = self.versions.borrow().clone();
        events.reverse();
        events.truncate(limit);
        Ok(events)
    }

    fn get_idempotent_response(
        &self,
        _: ProjectId,
        key: &IdempotencyKey,
    ) -> Result<Option<serde_json::Value>, OntoError> {
        Ok(self.idempotency.borrow().get(key.as_str()).cloned())
    }

    fn put_idempotent_response(
        &self,
        _: ProjectId,
        key: &IdempotencyKey,
        response: &serde_json::Value,
        _: u64,
        _: i64,
    ) -> Result<(), OntoError> {
        self.idempotency.borrow_mut().insert(key.as_str().to_string(), response.clone());
        Ok(())
    }
}
