// crates/ontocore-engine/src/lifecycle.rs
// ============================================================================
// Module: Candidate Lifecycle Engine (C3)
// Description: Pre-hoc duplicate check, submission, validation, merges and
//              promotion of candidate codes.
// Purpose: The only place candidate/catalog mutations happen, so the
//          no-loss invariant (I7) and the freeze gate (C5) are enforced in
//          exactly one spot.
// Dependencies: ontocore-core
// ============================================================================

//! ## Overview
//! `CandidateLifecycleEngine` holds references to a [`LedgerStore`] and a
//! [`Clock`] and composes [`crate::freeze::FreezeController`] for the
//! merge-shaped operations that must respect the freeze gate. Every
//! mutating method here either fully applies or fully skips its planned
//! changes — no operation leaves a partially applied merge, since the plan
//! is computed and validated before any store write happens.

use std::collections::HashSet;

use ontocore_core::error::OntoError;
use ontocore_core::identifiers::CandidateId;
use ontocore_core::identifiers::CodeId;
use ontocore_core::identifiers::FragmentId;
use ontocore_core::identifiers::IdempotencyKey;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::interfaces::Clock;
use ontocore_core::interfaces::LedgerStore;
use ontocore_core::model::AssignmentRow;
use ontocore_core::model::CandidateRow;
use ontocore_core::model::CandidateSource;
use ontocore_core::model::CandidateState;
use ontocore_core::model::CatalogRow;
use ontocore_core::model::CatalogStatus;
use ontocore_core::model::VersionAction;
use ontocore_core::model::VersionEvent;
use serde::Deserialize;
use serde::Serialize;

use crate::freeze::FreezeController;

/// A duplicate-check result for one proposed label (§4.3 "Pre-hoc check").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSuggestion {
    /// The label as submitted.
    pub label: String,
    /// An exact, case-sensitive catalog match, if any.
    pub exact_match: Option<CodeId>,
    /// A case-folded catalog match, if any (and not identical to `exact_match`).
    pub case_fold_match: Option<CodeId>,
    /// Token-overlap similar entries, highest score first, capped at 5.
    pub similar: Vec<SimilarMatch>,
}

/// A token-overlap similarity hit against either a catalog row or a pending
/// candidate (§4.3 "token-overlap similarity against recent catalog entries").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMatch {
    /// The matched label.
    pub codigo: String,
    /// The matched catalog row's id, when the match is catalog-backed.
    pub code_id: Option<CodeId>,
    /// Jaccard similarity of whitespace-separated, lowercased tokens, in `[0, 1]`.
    pub score: f64,
}

/// The outcome of a single merge-by-label target (§4.3 `merge_ids`/`merge_pairs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    /// The destination label.
    pub target_codigo: String,
    /// The destination's `code_id`, `None` only for a dry run against a
    /// not-yet-existing target.
    pub target_code_id: Option<CodeId>,
    /// Whether the target catalog row was newly minted by this call.
    pub target_is_new: bool,
    /// Number of rows that would move (always populated).
    pub would_move: usize,
    /// Number of rows actually moved; `0` on a dry run.
    pub moved: usize,
}

/// Request for [`CandidateLifecycleEngine::merge_ids`] (§4.3).
pub struct MergeIdsRequest<'a> {
    /// Owning project.
    pub project_id: ProjectId,
    /// Candidate rows to merge.
    pub source_ids: &'a [CandidateId],
    /// Destination label.
    pub target_codigo: &'a str,
    /// Free-text annotation.
    pub memo: Option<&'a str>,
    /// If `true`, compute and return the plan without writing.
    pub dry_run: bool,
    /// Optional idempotency key binding this call to a single execution.
    pub idempotency_key: Option<&'a IdempotencyKey>,
    /// TTL, in seconds, for the idempotent response if one is recorded.
    pub idempotency_ttl_secs: u64,
    /// Identity of the caller, recorded on version events.
    pub actor: &'a str,
}

/// One `(source_codigo, target_codigo)` pair for [`CandidateLifecycleEngine::merge_pairs`].
#[derive(Debug, Clone)]
pub struct MergePair {
    /// Label whose candidates (and, if enabled, catalog row) move to `target_codigo`.
    pub source_codigo: String,
    /// Destination label.
    pub target_codigo: String,
}

/// Request for [`CandidateLifecycleEngine::merge_pairs`] (§4.3).
pub struct MergePairsRequest<'a> {
    /// Owning project.
    pub project_id: ProjectId,
    /// Pairs to merge, applied independently.
    pub pairs: &'a [MergePair],
    /// Free-text annotation.
    pub memo: Option<&'a str>,
    /// If `true`, compute and return the plan without writing.
    pub dry_run: bool,
    /// Optional idempotency key binding this call to a single execution.
    pub idempotency_key: Option<&'a IdempotencyKey>,
    /// TTL, in seconds, for the idempotent response if one is recorded.
    pub idempotency_ttl_secs: u64,
    /// Identity of the caller, recorded on version events.
    pub actor: &'a str,
}

/// Request for [`CandidateLifecycleEngine::promote`] (§4.3 "Promote").
pub struct PromoteRequest<'a> {
    /// Owning project.
    pub project_id: ProjectId,
    /// The validated candidate to promote.
    pub candidate_id: CandidateId,
    /// Verbatim extract grounding the resulting assignment, capped at 60 words by the caller.
    pub cita: &'a str,
    /// Originating source file, for provenance.
    pub source_file: Option<&'a str>,
    /// Identity of the caller, recorded on version events.
    pub actor: &'a str,
}

/// Operations over the candidate→catalog lifecycle (§4.3).
pub struct CandidateLifecycleEngine<'a> {
    store: &'a dyn LedgerStore,
    clock: &'a dyn Clock,
    freeze: FreezeController<'a>,
    /// Whether `merge_pairs` may rewrite catalog rows directly (Open
    /// Question resolution: gated behind this flag, default `false`, and
    /// never honored while frozen regardless of this setting).
    allow_catalog_row_merge: bool,
}

impl<'a> CandidateLifecycleEngine<'a> {
    /// Builds an engine over a store and clock.
    #[must_use]
    pub fn new(store: &'a dyn LedgerStore, clock: &'a dyn Clock, allow_catalog_row_merge: bool) -> Self {
        Self {
            store,
            clock,
            freeze: FreezeController::new(store, clock),
            allow_catalog_row_merge,
        }
    }

    /// Pre-hoc duplicate check (§4.3). Never mutates.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    pub fn check_batch(&self, project_id: ProjectId, labels: &[String]) -> Result<Vec<DuplicateSuggestion>, OntoError> {
        let catalog = self.store.list_catalog_rows(project_id)?;
        let recent = self.store.list_recent_candidates(project_id, 200)?;

        let mut out = Vec::with_capacity(labels.len());
        for label in labels {
            let exact_match = catalog.iter().find(|row| row.codigo == *label).map(|row| row.code_id);
            let case_fold_match = catalog
                .iter()
                .find(|row| row.codigo.eq_ignore_ascii_case(label))
                .map(|row| row.code_id)
                .filter(|code_id| Some(*code_id) != exact_match);

            let label_tokens = token_set(label);
            let mut similar: Vec<SimilarMatch> = catalog
                .iter()
                .filter(|row| !row.codigo.eq_ignore_ascii_case(label))
                .map(|row| SimilarMatch {
                    codigo: row.codigo.clone(),
                    code_id: Some(row.code_id),
                    score: jaccard(&label_tokens, &token_set(&row.codigo)),
                })
                .filter(|candidate_match| candidate_match.score > SIMILARITY_THRESHOLD)
                .collect();

            for candidate in &recent {
                if candidate.codigo.eq_ignore_ascii_case(label) {
                    continue;
                }
                let score = jaccard(&label_tokens, &token_set(&candidate.codigo));
                if score > SIMILARITY_THRESHOLD {
                    similar.push(SimilarMatch {
                        codigo: candidate.codigo.clone(),
                        code_id: None,
                        score,
                    });
                }
            }

            similar.sort_by(|left, right| right.score.total_cmp(&left.score));
            similar.truncate(5);

            out.push(DuplicateSuggestion {
                label: label.clone(),
                exact_match,
                case_fold_match,
                similar,
            });
        }
        Ok(out)
    }

    /// Submits a proposed code (§4.3 "Submit candidate").
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    pub fn submit(
        &self,
        project_id: ProjectId,
        codigo: &str,
        fragment_id: Option<FragmentId>,
        source: CandidateSource,
        confidence: f64,
        memo: Option<String>,
    ) -> Result<CandidateRow, OntoError> {
        let now = self.clock.now_ms();
        let draft = CandidateRow {
            id: CandidateId::PLACEHOLDER,
            project_id,
            codigo: codigo.to_string(),
            fragment_id,
            source,
            confidence: confidence.clamp(0.0, 1.0),
            state: CandidateState::Pending,
            merged_into: None,
            memo,
            validator: None,
            created_at_ms: now,
            updated_at_ms: now,
        };
        self.store.upsert_candidate(&draft)
    }

    /// Validates or rejects a candidate (§4.3 "Validate / reject"). Not
    /// freeze-gated: it does not alter an existing identity chain.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `invalid_request` if `new_state` is
    /// not `validated`/`rejected`, `not_found` if the candidate does not
    /// exist, and `conflict` if it is already `merged`.
    pub fn transition(
        &self,
        project_id: ProjectId,
        candidate_id: CandidateId,
        new_state: CandidateState,
        actor: &str,
        memo: Option<&str>,
    ) -> Result<CandidateRow, OntoError> {
        if !matches!(new_state, CandidateState::Validated | CandidateState::Rejected) {
            return Err(OntoError::invalid_request(
                "transition target must be validated or rejected",
            ));
        }
        let mut candidate = self
            .store
            .get_candidate(project_id, candidate_id)?
            .ok_or_else(|| OntoError::not_found(format!("candidate {candidate_id} not found")))?;
        if matches!(candidate.state, CandidateState::Merged) {
            return Err(OntoError::conflict("candidate is already merged"));
        }
        candidate.state = new_state;
        candidate.validator = Some(actor.to_string());
        if let Some(memo_text) = memo {
            candidate.memo = Some(memo_text.to_string());
        }
        candidate.updated_at_ms = self.clock.now_ms();
        self.store.update_candidate(&candidate)?;
        Ok(candidate)
    }

    /// Merges candidates by id into a target label (§4.3 "Merge by ids").
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `frozen` if the project is frozen
    /// and `dry_run=false`; `not_found` if a source id does not exist.
    pub fn merge_ids(&self, request: MergeIdsRequest<'_>) -> Result<MergeResult, OntoError> {
        if let Some(key) = request.idempotency_key {
            if let Some(cached) = self.store.get_idempotent_response(request.project_id, key)? {
                return deserialize_cached(cached);
            }
        }
        self.freeze.ensure_merge_allowed(request.project_id, request.dry_run)?;

        let result = self.execute_merge(
            request.project_id,
            request.source_ids,
            request.target_codigo,
            request.memo,
            request.dry_run,
            request.actor,
        )?;

        if let Some(key) = request.idempotency_key {
            if !request.dry_run {
                self.cache_response(request.project_id, key, &result, request.idempotency_ttl_secs)?;
            }
        }
        Ok(result)
    }

    /// Merges candidates (and, if enabled, catalog rows) by label pairs
    /// (§4.3 "Auto-merge by pairs").
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `frozen` if the project is frozen
    /// and `dry_run=false`.
    pub fn merge_pairs(&self, request: MergePairsRequest<'_>) -> Result<Vec<MergeResult>, OntoError> {
        if let Some(key) = request.idempotency_key {
            if let Some(cached) = self.store.get_idempotent_response(request.project_id, key)? {
                return deserialize_cached(cached);
            }
        }
        self.freeze.ensure_merge_allowed(request.project_id, request.dry_run)?;

        let mut results = Vec::with_capacity(request.pairs.len());
        for pair in request.pairs {
            let source_ids: Vec<CandidateId> = self
                .store
                .list_candidates_by_label(request.project_id, &pair.source_codigo)?
                .into_iter()
                .filter(|candidate| !matches!(candidate.state, CandidateState::Merged))
                .map(|candidate| candidate.id)
                .collect();

            let mut result = self.execute_merge(
                request.project_id,
                &source_ids,
                &pair.target_codigo,
                request.memo,
                request.dry_run,
                request.actor,
            )?;

            if self.allow_catalog_row_merge && !request.dry_run {
                self.merge_catalog_row_if_enabled(request.project_id, pair, request.memo, request.actor, &mut result)?;
            }

            results.push(result);
        }

        if let Some(key) = request.idempotency_key {
            if !request.dry_run {
                self.cache_response(request.project_id, key, &results, request.idempotency_ttl_secs)?;
            }
        }
        Ok(results)
    }

    /// Promotes a validated candidate into the catalog (§4.3 "Promote").
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `not_found` if the candidate does
    /// not exist; `conflict` if it is not yet `validated`; `invalid_request`
    /// if it has no `fragment_id`.
    pub fn promote(&self, request: PromoteRequest<'_>) -> Result<(CatalogRow, AssignmentRow), OntoError> {
        let candidate = self
            .store
            .get_candidate(request.project_id, request.candidate_id)?
            .ok_or_else(|| OntoError::not_found(format!("candidate {} not found", request.candidate_id)))?;
        if !matches!(candidate.state, CandidateState::Validated) {
            return Err(OntoError::conflict("candidate must be validated before promotion"));
        }
        let fragment_id = candidate
            .fragment_id
            .clone()
            .ok_or_else(|| OntoError::invalid_request("promote requires a fragment_id"))?;

        let now = self.clock.now_ms();
        let catalog_row = match self.store.get_catalog_row_by_label(request.project_id, &candidate.codigo)? {
            Some(row) => row,
            None => self
                .store
                .insert_catalog_row(request.project_id, &candidate.codigo, candidate.memo.as_deref(), now)?,
        };

        let assignment = AssignmentRow {
            project_id: request.project_id,
            fragment_id,
            codigo: candidate.codigo.clone(),
            code_id: Some(catalog_row.code_id),
            cita: request.cita.to_string(),
            source_file: request.source_file.map(str::to_string),
        };
        self.store.upsert_assignment(&assignment)?;

        let event = VersionEvent {
            project_id: request.project_id,
            codigo: candidate.codigo.clone(),
            code_id: Some(catalog_row.code_id),
            action: VersionAction::Promote,
            actor: request.actor.to_string(),
            previous: None,
            next: serde_json::to_value(&catalog_row).ok(),
            at_ms: now,
        };
        self.store.append_version_event(&event)?;

        Ok((catalog_row, assignment))
    }

    /// Shared planning + application logic for `merge_ids` and each pair of
    /// `merge_pairs`: plans every row move first, validates the whole
    /// batch, and only then writes, so a mid-batch failure can only be a
    /// genuine storage fault rather than a half-applied merge.
    fn execute_merge(
        &self,
        project_id: ProjectId,
        source_ids: &[CandidateId],
        target_codigo: &str,
        memo: Option<&str>,
        dry_run: bool,
        actor: &str,
    ) -> Result<MergeResult, OntoError> {
        let existing_target = self.store.get_catalog_row_by_label(project_id, target_codigo)?;
        let target_is_new_before_write = existing_target.is_none();
        let mut target_code_id = existing_target.map(|row| row.code_id);

        let mut plan = Vec::with_capacity(source_ids.len());
        for &source_id in source_ids {
            let candidate = self
                .store
                .get_candidate(project_id, source_id)?
                .ok_or_else(|| OntoError::not_found(format!("candidate {source_id} not found")))?;
            if matches!(candidate.state, CandidateState::Merged) {
                continue;
            }
            let duplicate_exists =
                self.fragment_already_under_target(project_id, candidate.fragment_id.as_ref(), target_codigo, source_id)?;
            let mut next = candidate.clone();
            next.state = CandidateState::Merged;
            next.merged_into = Some(target_codigo.to_string());
            next.updated_at_ms = self.clock.now_ms();
            if !duplicate_exists {
                next.codigo = target_codigo.to_string();
            }
            plan.push((candidate, next));
        }

        let mut moved = 0usize;
        let mut target_is_new = false;
        if !dry_run {
            if target_code_id.is_none() {
                let now = self.clock.now_ms();
                let created = self.store.insert_catalog_row(project_id, target_codigo, memo, now)?;
                target_code_id = Some(created.code_id);
                target_is_new = target_is_new_before_write;
            }
            for (previous, next) in &plan {
                self.store.update_candidate(next)?;
                self.append_version_event(project_id, &next.codigo, None, VersionAction::Merge, actor, previous, next)?;
                moved += 1;
            }
        }

        Ok(MergeResult {
            target_codigo: target_codigo.to_string(),
            target_code_id,
            target_is_new,
            would_move: plan.len(),
            moved,
        })
    }

    fn merge_catalog_row_if_enabled(
        &self,
        project_id: ProjectId,
        pair: &MergePair,
        memo: Option<&str>,
        actor: &str,
        result: &mut MergeResult,
    ) -> Result<(), OntoError> {
        let Some(source_row) = self.store.get_catalog_row_by_label(project_id, &pair.source_codigo)? else {
            return Ok(());
        };
        if source_row.codigo.eq_ignore_ascii_case(&pair.target_codigo) || !matches!(source_row.status, CatalogStatus::Active) {
            return Ok(());
        }

        let target_code_id = match result.target_code_id {
            Some(id) => id,
            None => {
                let now = self.clock.now_ms();
                let created = self.store.insert_catalog_row(project_id, &pair.target_codigo, memo, now)?;
                result.target_code_id = Some(created.code_id);
                result.target_is_new = true;
                created.code_id
            }
        };

        let mut next = source_row.clone();
        next.status = CatalogStatus::Merged;
        next.canonical_code_id = Some(target_code_id);
        next.updated_at_ms = self.clock.now_ms();
        self.store.update_catalog_row(&next)?;

        let event = VersionEvent {
            project_id,
            codigo: next.codigo.clone(),
            code_id: Some(next.code_id),
            action: VersionAction::Merge,
            actor: actor.to_string(),
            previous: serde_json::to_value(&source_row).ok(),
            next: serde_json::to_value(&next).ok(),
            at_ms: self.clock.now_ms(),
        };
        self.store.append_version_event(&event)
    }

    fn fragment_already_under_target(
        &self,
        project_id: ProjectId,
        fragment_id: Option<&FragmentId>,
        target_codigo: &str,
        exclude: CandidateId,
    ) -> Result<bool, OntoError> {
        let Some(fragment_id) = fragment_id else {
            return Ok(false);
        };
        let under_target = self.store.list_candidates_by_label(project_id, target_codigo)?;
        if under_target
            .iter()
            .any(|candidate| candidate.id != exclude && candidate.fragment_id.as_ref() == Some(fragment_id))
        {
            return Ok(true);
        }
        let assignments = self.store.list_assignments(project_id)?;
        Ok(assignments
            .iter()
            .any(|assignment| assignment.codigo.eq_ignore_ascii_case(target_codigo) && &assignment.fragment_id == fragment_id))
    }

    #[allow(clippy::too_many_arguments)]
    fn append_version_event(
        &self,
        project_id: ProjectId,
        codigo: &str,
        code_id: Option<CodeId>,
        action: VersionAction,
        actor: &str,
        previous: &CandidateRow,
        next: &CandidateRow,
    ) -> Result<(), OntoError> {
        let event = VersionEvent {
            project_id,
            codigo: codigo.to_string(),
            code_id,
            action,
            actor: actor.to_string(),
            previous: serde_json::to_value(previous).ok(),
            next: serde_json::to_value(next).ok(),
            at_ms: self.clock.now_ms(),
        };
        self.store.append_version_event(&event)
    }

    fn cache_response<T: Serialize>(
        &self,
        project_id: ProjectId,
        key: &IdempotencyKey,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), OntoError> {
        let snapshot =
            serde_json::to_value(value).map_err(|err| OntoError::internal(format!("cannot serialize merge result: {err}")))?;
        self.store.put_idempotent_response(project_id, key, &snapshot, ttl_secs, self.clock.now_ms())
    }
}

fn deserialize_cached<T: for<'de> Deserialize<'de>>(cached: serde_json::Value) -> Result<T, OntoError> {
    serde_json::from_value(cached).map_err(|err| OntoError::internal(format!("corrupt idempotent response: {err}")))
}

const SIMILARITY_THRESHOLD: f64 = 0.3;

fn token_set(label: &str) -> HashSet<String> {
    label.to_lowercase().split_whitespace().map(str::to_string).collect()
}

fn jaccard(left: &HashSet<String>, right: &HashSet<String>) -> f64 {
    if left.is_empty() && right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(right).count() as f64;
    let union = left.union(right).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
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

    use ontocore_core::model::CatalogStatus;

    use crate::test_support::FixedClock;
    use crate::test_support::MemoryLedgerStore;

    use super::*;

    fn project() -> ProjectId {
        ProjectId::new(NonZeroU64::new(1).expect("non-zero"))
    }

    fn engine<'a>(store: &'a MemoryLedgerStore, clock: &'a FixedClock) -> CandidateLifecycleEngine<'a> {
        CandidateLifecycleEngine::new(store, clock, false)
    }

    #[test]
    fn submit_then_transition_then_promote() {
        let store = MemoryLedgerStore::default();
        let clock = FixedClock(1_000);
        let lifecycle = engine(&store, &clock);

        let candidate = lifecycle
            .submit(
                project(),
                "escasez de agua",
                Some(FragmentId::from("f1")),
                CandidateSource::Manual,
                1.0,
                None,
            )
            .expect("submit");

        let validated = lifecycle
            .transition(project(), candidate.id, CandidateState::Validated, "analyst-1", None)
            .expect("validate");
        assert_eq!(validated.state, CandidateState::Validated);

        let (catalog_row, assignment) = lifecycle
            .promote(PromoteRequest {
                project_id: project(),
                candidate_id: validated.id,
                cita: "la gente no tiene agua",
                source_file: None,
                actor: "analyst-1",
            })
            .expect("promote");

        assert_eq!(catalog_row.codigo, "escasez de agua");
        assert_eq!(assignment.code_id, Some(catalog_row.code_id));
        assert_eq!(assignment.fragment_id.as_str(), "f1");
    }

    #[test]
    fn merge_ids_preserves_every_fragment_link() {
        let store = MemoryLedgerStore::default();
        let clock = FixedClock(2_000);
        let lifecycle = engine(&store, &clock);

        store.insert_seed_catalog_row(CatalogRow {
            code_id: CodeId::from_raw(1).expect("non-zero"),
            project_id: project(),
            codigo: "escasez_agua".to_string(),
            status: CatalogStatus::Active,
            canonical_code_id: Some(CodeId::from_raw(1).expect("non-zero")),
            memo: None,
            created_at_ms: 0,
            updated_at_ms: 0,
        });

        let c2 = lifecycle
            .submit(project(), "Escasez De Agua", Some(FragmentId::from("f2")), CandidateSource::Manual, 1.0, None)
            .expect("submit c2");
        let c3 = lifecycle
            .submit(project(), "falta agua", Some(FragmentId::from("f3")), CandidateSource::Manual, 1.0, None)
            .expect("submit c3");

        let dry_run_result = lifecycle
            .merge_ids(MergeIdsRequest {
                project_id: project(),
                source_ids: &[c2.id, c3.id],
                target_codigo: "escasez_agua",
                memo: None,
                dry_run: true,
                idempotency_key: None,
                idempotency_ttl_secs: 86_400,
                actor: "admin-1",
            })
            .expect("dry run merge");
        assert_eq!(dry_run_result.would_move, 2);
        assert_eq!(dry_run_result.moved, 0);

        let key = IdempotencyKey::from("merge-k1");
        let result = lifecycle
            .merge_ids(MergeIdsRequest {
                project_id: project(),
                source_ids: &[c2.id, c3.id],
                target_codigo: "escasez_agua",
                memo: None,
                dry_run: false,
                idempotency_key: Some(&key),
                idempotency_ttl_secs: 86_400,
                actor: "admin-1",
            })
            .expect("confirmed merge");
        assert_eq!(result.moved, 2);

        let fragments_under_target: HashSet<String> = store
            .list_candidates_by_label(project(), "escasez_agua")
            .expect("list")
            .into_iter()
            .filter_map(|row| row.fragment_id.map(|id| id.into_string()))
            .collect();
        assert!(fragments_under_target.contains("f2"));
        assert!(fragments_under_target.contains("f3"));

        let replay = lifecycle
            .merge_ids(MergeIdsRequest {
                project_id: project(),
                source_ids: &[c2.id, c3.id],
                target_codigo: "escasez_agua",
                memo: None,
                dry_run: false,
                idempotency_key: Some(&key),
                idempotency_ttl_secs: 86_400,
                actor: "admin-1",
            })
            .expect("idempotent replay");
        assert_eq!(replay, result);
    }

    #[test]
    fn merge_ids_refused_while_frozen_unless_dry_run() {
        let store = MemoryLedgerStore::default();
        let clock = FixedClock(3_000);
        let lifecycle = engine(&store, &clock);
        let freeze = FreezeController::new(&store, &clock);
        freeze.freeze(project(), "admin", None).expect("freeze");

        let c1 = lifecycle
            .submit(project(), "ruido", Some(FragmentId::from("f1")), CandidateSource::Manual, 1.0, None)
            .expect("submit");

        let dry_run = lifecycle.merge_ids(MergeIdsRequest {
            project_id: project(),
            source_ids: &[c1.id],
            target_codigo: "ruido-ambiental",
            memo: None,
            dry_run: true,
            idempotency_key: None,
            idempotency_ttl_secs: 86_400,
            actor: "admin",
        });
        assert!(dry_run.is_ok());

        let confirmed = lifecycle.merge_ids(MergeIdsRequest {
            project_id: project(),
            source_ids: &[c1.id],
            target_codigo: "ruido-ambiental",
            memo: None,
            dry_run: false,
            idempotency_key: None,
            idempotency_ttl_secs: 86_400,
            actor: "admin",
        });
        assert_eq!(confirmed.expect_err("must be frozen").kind, OntoError::frozen(project()).kind);
    }

    #[test]
    fn check_batch_finds_case_fold_and_similar_matches() {
        let store = MemoryLedgerStore::default();
        let clock = FixedClock(4_000);
        let lifecycle = engine(&store, &clock);
        store.insert_seed_catalog_row(CatalogRow {
            code_id: CodeId::from_raw(1).expect("non-zero"),
            project_id: project(),
            codigo: "escasez de agua".to_string(),
            status: CatalogStatus::Active,
            canonical_code_id: Some(CodeId::from_raw(1).expect("non-zero")),
            memo: None,
            created_at_ms: 0,
            updated_at_ms: 0,
        });

        let suggestions = lifecycle
            .check_batch(project(), &["Escasez De Agua".to_string(), "falta de agua".to_string()])
            .expect("check batch");

        assert!(suggestions[0].case_fold_match.is_some());
        assert!(!suggestions[1].similar.is_empty());
    }
}
