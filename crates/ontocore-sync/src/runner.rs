// crates/ontocore-sync/src/runner.rs
// ============================================================================
// Module: Sync Runner
// Description: Batch-scans the ledger for unsynced rows and projects them,
//              in order, with exponential-backoff retry on transient
//              graph-store failures.
// Purpose: Drive C6 end to end: list candidates for projection, batch them,
//          push them through a GraphProjector, and record outcomes in a
//          SyncStateStore.
// Dependencies: ontocore-core, tokio
// ============================================================================

//! ## Overview
//! Ordering follows §4.6 exactly: fragments before codes, codes before
//! axial relations. Each kind is scanned, filtered down to rows that are
//! either never-synced or past their retry deadline, chunked into batches
//! of `batch_size`, and pushed through the projector. A batch that fails
//! with a `dependency` error is retried with exponential backoff (capped)
//! up to `retry_max_attempts`; any other error, or exhausting retries,
//! halts that batch's rows until a future run reconsiders them.
//!
//! Fragment projection has no backing `fragment` table in the ledger (§3
//! only defines catalog/candidate/assignment/axial/freeze/idem/version);
//! fragment text for projection is taken from the evidentiary quote
//! (`cita`) of the first assignment referencing that fragment, since full
//! transcript metadata (paragraph index, speaker) is owned by the
//! upstream interview-ingestion collaborator, out of this core's scope.

use std::collections::HashMap;
use std::time::Duration;

use ontocore_core::error::ErrorKind;
use ontocore_core::error::OntoError;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::interfaces::AxialEdge;
use ontocore_core::interfaces::Clock;
use ontocore_core::interfaces::CodeNode;
use ontocore_core::interfaces::FragmentNode;
use ontocore_core::interfaces::GraphProjector;
use ontocore_core::interfaces::LedgerStore;
use ontocore_core::model::AxialRelationType;
use ontocore_core::model::AxialRow;
use ontocore_core::model::CatalogStatus;

use crate::state::SyncEntityKind;
use crate::state::SyncStateStore;

fn axial_relation_label(relation: AxialRelationType) -> &'static str {
    match relation {
        AxialRelationType::Cause => "cause",
        AxialRelationType::Condition => "condition",
        AxialRelationType::Consequence => "consequence",
        AxialRelationType::PartOf => "part_of",
    }
}

fn axial_key(row: &AxialRow) -> String {
    format!("{}/{}/{}", row.project_id.get(), row.categoria, row.codigo)
}

/// Tallies what a single [`SyncRunner::run`] call accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Fragments successfully projected.
    pub fragments_synced: usize,
    /// Codes successfully projected.
    pub codes_synced: usize,
    /// Axial relations successfully projected.
    pub axial_synced: usize,
    /// Rows that failed and were recorded for a later retry or halted.
    pub failed: usize,
}

/// Retry policy for transient graph-store failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Initial delay before the first retry, in milliseconds.
    pub base_ms: u64,
    /// Multiplicative backoff factor applied after each attempt.
    pub factor: u32,
    /// Upper bound on the delay between attempts, in milliseconds.
    pub cap_ms: u64,
    /// Maximum number of attempts (including the first) before halting.
    pub max_attempts: u32,
}

/// Drives a single projection pass over one project's unsynced rows.
pub struct SyncRunner<'a> {
    store: &'a dyn LedgerStore,
    projector: &'a dyn GraphProjector,
    state: &'a dyn SyncStateStore,
    clock: &'a dyn Clock,
    batch_size: usize,
    retry: RetryPolicy,
}

impl<'a> SyncRunner<'a> {
    /// Builds a runner wired to its store, projector, state tracker and
    /// clock.
    #[must_use]
    pub const fn new(
        store: &'a dyn LedgerStore,
        projector: &'a dyn GraphProjector,
        state: &'a dyn SyncStateStore,
        clock: &'a dyn Clock,
        batch_size: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            projector,
            state,
            clock,
            batch_size: if batch_size == 0 { 1 } else { batch_size },
            retry,
        }
    }

    /// Runs one projection pass for `project_id`: fragments, then codes,
    /// then axial relations.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` if the ledger itself
    /// cannot be read; per-batch projection failures are recorded in the
    /// sync-state store instead of aborting the whole run.
    pub async fn run(&self, project_id: ProjectId) -> Result<SyncOutcome, OntoError> {
        let mut outcome = SyncOutcome::default();

        self.run_fragments(project_id, &mut outcome).await?;
        self.run_codes(project_id, &mut outcome).await?;
        self.run_axial(project_id, &mut outcome).await?;

        Ok(outcome)
    }

    async fn run_fragments(
        &self,
        project_id: ProjectId,
        outcome: &mut SyncOutcome,
    ) -> Result<(), OntoError> {
        let assignments = self.store.list_assignments(project_id)?;
        let mut first_seen: HashMap<String, FragmentNode> = HashMap::new();
        for assignment in assignments {
            let key = assignment.fragment_id.as_str().to_string();
            first_seen.entry(key).or_insert_with(|| FragmentNode {
                id: assignment.fragment_id.clone(),
                project_id,
                text: assignment.cita.clone(),
                par_idx: 0,
                char_len: u32::try_from(assignment.cita.len()).unwrap_or(u32::MAX),
                speaker: None,
            });
        }
        let due: Vec<FragmentNode> = first_seen
            .into_values()
            .filter(|fragment| {
                self.state
                    .due_for_retry(project_id, SyncEntityKind::Fragment, fragment.id.as_str(), self.clock.now_ms())
                    .unwrap_or(true)
            })
            .collect();

        for batch in due.chunks(self.batch_size) {
            let keys: Vec<String> = batch.iter().map(|fragment| fragment.id.as_str().to_string()).collect();
            self.project_batch(
                project_id,
                SyncEntityKind::Fragment,
                &keys,
                self.projector.upsert_fragments(batch),
                outcome,
                |outcome| &mut outcome.fragments_synced,
            )
            .await?;
        }
        Ok(())
    }

    async fn run_codes(&self, project_id: ProjectId, outcome: &mut SyncOutcome) -> Result<(), OntoError> {
        let codes: Vec<CodeNode> = self
            .store
            .list_catalog_rows(project_id)?
            .into_iter()
            .filter(|row| row.status == CatalogStatus::Active)
            .filter(|row| {
                self.state
                    .due_for_retry(project_id, SyncEntityKind::Code, &row.code_id.get().to_string(), self.clock.now_ms())
                    .unwrap_or(true)
            })
            .map(|row| CodeNode {
                code_id: row.code_id,
                codigo: row.codigo,
                project_id: row.project_id,
            })
            .collect();

        for batch in codes.chunks(self.batch_size) {
            let keys: Vec<String> = batch.iter().map(|code| code.code_id.get().to_string()).collect();
            self.project_batch(
                project_id,
                SyncEntityKind::Code,
                &keys,
                self.projector.upsert_codes(batch),
                outcome,
                |outcome| &mut outcome.codes_synced,
            )
            .await?;
        }
        Ok(())
    }

    async fn run_axial(&self, project_id: ProjectId, outcome: &mut SyncOutcome) -> Result<(), OntoError> {
        let rows: Vec<AxialRow> = self
            .store
            .list_axial_rows(project_id)?
            .into_iter()
            .filter(|row| {
                self.state
                    .due_for_retry(project_id, SyncEntityKind::Axial, &axial_key(row), self.clock.now_ms())
                    .unwrap_or(true)
            })
            .collect();
        let now_ms = self.clock.now_ms();
        let edges: Vec<AxialEdge> = rows
            .iter()
            .map(|row| AxialEdge {
                project_id: row.project_id,
                categoria: row.categoria.clone(),
                code_id: row.code_id,
                relation: axial_relation_label(row.relation).to_string(),
                memo: row.memo.clone(),
                evidence: row.evidence.clone(),
                updated_at_ms: now_ms,
            })
            .collect();

        for (edge_batch, row_batch) in edges.chunks(self.batch_size).zip(rows.chunks(self.batch_size)) {
            let keys: Vec<String> = row_batch.iter().map(axial_key).collect();
            self.project_batch(
                project_id,
                SyncEntityKind::Axial,
                &keys,
                self.projector.upsert_axial_edges(edge_batch),
                outcome,
                |outcome| &mut outcome.axial_synced,
            )
            .await?;
        }
        Ok(())
    }

    /// Runs a single batch through the projector with backoff, then
    /// records the outcome for every key in the batch.
    async fn project_batch<Fut>(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        keys: &[String],
        call: Fut,
        outcome: &mut SyncOutcome,
        succeeded: impl Fn(&mut SyncOutcome) -> &mut usize,
    ) -> Result<(), OntoError>
    where
        Fut: std::future::Future<Output = Result<(), OntoError>>,
    {
        match call.await {
            Ok(()) => {
                let now_ms = self.clock.now_ms();
                for key in keys {
                    self.state.mark_synced(project_id, kind, key, now_ms)?;
                }
                *succeeded(outcome) += keys.len();
                Ok(())
            }
            Err(err) => {
                self.record_batch_failure(project_id, kind, keys, &err)?;
                outcome.failed += keys.len();
                Ok(())
            }
        }
    }

    /// Records a batch failure, reading each key's prior attempt count
    /// first so backoff escalates (and eventually halts) per §4.6 rather
    /// than resetting to the first-attempt delay on every failure.
    fn record_batch_failure(
        &self,
        project_id: ProjectId,
        kind: SyncEntityKind,
        keys: &[String],
        error: &OntoError,
    ) -> Result<(), OntoError> {
        for key in keys {
            let previous_attempts = self.state.attempts_for(project_id, kind, key)?;
            let attempts = previous_attempts.saturating_add(1);
            let retryable = error.kind == ErrorKind::Dependency && attempts < self.retry.max_attempts;
            let next_retry_at_ms = retryable.then(|| {
                let delay = self
                    .retry
                    .base_ms
                    .saturating_mul(u64::from(self.retry.factor.saturating_pow(attempts.saturating_sub(1))))
                    .min(self.retry.cap_ms);
                self.clock.now_ms().saturating_add(i64::try_from(delay).unwrap_or(i64::MAX))
            });
            self.state.record_failure(project_id, kind, key, attempts, &error.message, next_retry_at_ms)?;
        }
        Ok(())
    }
}

/// Sleeps for `duration`, used by callers driving repeated [`SyncRunner`]
/// passes on a fixed cadence.
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}
