// crates/ontocore-engine/src/freeze.rs
// ============================================================================
// Module: Freeze Controller (C5)
// Description: Project-scoped operational lock over ontology-mutating
//              maintenance, orthogonal to readiness.
// Purpose: Let an operator eliminate identity churn during a coordinated
//          axial pass without touching C4's readiness signal.
// Dependencies: ontocore-core
// ============================================================================

//! ## Overview
//! Thin wrapper over [`LedgerStore::get_freeze`]/[`LedgerStore::put_freeze`]
//! that also exposes [`FreezeController::ensure_merge_allowed`], the single
//! gate every merge-shaped operation in [`crate::lifecycle`] calls before
//! writing.

use ontocore_core::error::OntoError;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::interfaces::Clock;
use ontocore_core::interfaces::LedgerStore;
use ontocore_core::model::FreezeRow;

/// Operations over the per-project freeze lock (§4.5).
pub struct FreezeController<'a> {
    store: &'a dyn LedgerStore,
    clock: &'a dyn Clock,
}

impl<'a> FreezeController<'a> {
    /// Builds a controller over a store and clock.
    #[must_use]
    pub fn new(store: &'a dyn LedgerStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Returns the current freeze state, defaulting to not-frozen.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    pub fn get(&self, project_id: ProjectId) -> Result<FreezeRow, OntoError> {
        self.store.get_freeze(project_id)
    }

    /// Engages the freeze.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    pub fn freeze(&self, project_id: ProjectId, actor: &str, note: Option<&str>) -> Result<FreezeRow, OntoError> {
        let now = self.clock.now_ms();
        let row = FreezeRow {
            project_id,
            is_frozen: true,
            frozen_at_ms: Some(now),
            frozen_by: Some(actor.to_string()),
            broken_at_ms: None,
            broken_by: None,
            note: note.map(str::to_string),
        };
        self.store.put_freeze(&row)?;
        Ok(row)
    }

    /// Lifts the freeze.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    pub fn unfreeze(&self, project_id: ProjectId, actor: &str, note: Option<&str>) -> Result<FreezeRow, OntoError> {
        let mut row = self.store.get_freeze(project_id)?;
        let now = self.clock.now_ms();
        row.is_frozen = false;
        row.broken_at_ms = Some(now);
        row.broken_by = Some(actor.to_string());
        if note.is_some() {
            row.note = note.map(str::to_string);
        }
        self.store.put_freeze(&row)?;
        Ok(row)
    }

    /// Refuses mutating maintenance when frozen and `dry_run=false` (§4.5).
    /// Dry runs are always allowed so operators can preview effects while
    /// frozen. Individual analyst actions (submit/validate/reject/promote)
    /// do not go through this gate at all; only merge-shaped and
    /// maintenance operations do.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `frozen` if the project is frozen
    /// and `dry_run` is `false`.
    pub fn ensure_merge_allowed(&self, project_id: ProjectId, dry_run: bool) -> Result<(), OntoError> {
        if dry_run {
            return Ok(());
        }
        let row = self.store.get_freeze(project_id)?;
        if row.is_frozen {
            return Err(OntoError::frozen(project_id));
        }
        Ok(())
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

    use crate::test_support::FixedClock;
    use crate::test_support::MemoryLedgerStore;

    use super::*;

    fn project() -> ProjectId {
        ProjectId::new(NonZeroU64::new(1).expect("non-zero"))
    }

    #[test]
    fn dry_run_is_always_allowed_while_frozen() {
        let store = MemoryLedgerStore::default();
        let clock = FixedClock(1_000);
        let controller = FreezeController::new(&store, &clock);
        controller.freeze(project(), "admin", None).expect("freeze");
        assert!(controller.ensure_merge_allowed(project(), true).is_ok());
    }

    #[test]
    fn confirmed_merge_is_refused_while_frozen() {
        let store = MemoryLedgerStore::default();
        let clock = FixedClock(1_000);
        let controller = FreezeController::new(&store, &clock);
        controller.freeze(project(), "admin", None).expect("freeze");
        let err = controller
            .ensure_merge_allowed(project(), false)
            .expect_err("must refuse");
        assert_eq!(err.kind, OntoError::frozen(project()).kind);
    }

    #[test]
    fn unfreeze_restores_merges() {
        let store = MemoryLedgerStore::default();
        let clock = FixedClock(1_000);
        let controller = FreezeController::new(&store, &clock);
        controller.freeze(project(), "admin", None).expect("freeze");
        controller.unfreeze(project(), "admin", None).expect("unfreeze");
        assert!(controller.ensure_merge_allowed(project(), false).is_ok());
    }
}
