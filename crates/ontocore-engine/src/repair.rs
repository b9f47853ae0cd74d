// crates/ontocore-engine/src/repair.rs
// ============================================================================
// Module: Cycle Repair (C2 maintenance)
// Description: Breaks non-trivial canonical-chain cycles.
// Purpose: Give admins a deterministic, auditable way to clear the
//          cycles_non_trivial readiness blocker (§8 P3).
// Dependencies: ontocore-core
// ============================================================================

//! ## Overview
//! Per the design notes' "oldest `code_id` wins" policy: within each
//! non-trivial cycle the lowest `code_id` becomes the self-canonical
//! survivor and every other member is repointed at it and marked
//! `merged`. A dry run reports the same plan without writing anything.

use std::collections::HashSet;

use ontocore_core::error::OntoError;
use ontocore_core::identifiers::CodeId;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::interfaces::Clock;
use ontocore_core::interfaces::LedgerStore;
use ontocore_core::model::CatalogStatus;
use ontocore_core::model::VersionAction;
use ontocore_core::model::VersionEvent;
use serde::Serialize;

use crate::resolver::CanonicalResolution;
use crate::resolver::CatalogIndex;

/// One cycle broken (or, on a dry run, merely identified) by a repair pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairedCycle {
    /// The surviving, self-canonical `code_id` (lowest in the cycle).
    pub survivor: CodeId,
    /// Every other `code_id` in the cycle, repointed at `survivor`.
    pub repointed: Vec<CodeId>,
}

/// Outcome of a [`repair_cycles`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    /// Every cycle found, whether or not it was actually applied.
    pub cycles: Vec<RepairedCycle>,
    /// `true` if the plan was written; `false` for a dry run or a no-op pass.
    pub applied: bool,
}

/// Breaks every non-trivial canonical-chain cycle in `project_id`'s catalog.
///
/// # Errors
/// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
pub fn repair_cycles(
    store: &dyn LedgerStore,
    clock: &dyn Clock,
    project_id: ProjectId,
    max_hops: u32,
    dry_run: bool,
    actor: &str,
) -> Result<RepairOutcome, OntoError> {
    let rows = store.list_catalog_rows(project_id)?;
    let index = CatalogIndex::build(&rows);

    let mut settled: HashSet<CodeId> = HashSet::new();
    let mut cycles = Vec::new();

    for row in &rows {
        if settled.contains(&row.code_id) {
            continue;
        }
        if !matches!(index.resolve_canonical(row.code_id, max_hops), CanonicalResolution::CycleDetected) {
            settled.insert(row.code_id);
            continue;
        }

        let mut members = Vec::new();
        let mut seen = HashSet::new();
        let mut current = row.code_id;
        loop {
            if !seen.insert(current) {
                break;
            }
            members.push(current);
            match index.get(current).and_then(|member_row| member_row.canonical_code_id) {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        for member in &members {
            settled.insert(*member);
        }

        members.sort_by_key(CodeId::get);
        let Some(&survivor) = members.first() else { continue };
        let repointed: Vec<CodeId> = members.into_iter().filter(|id| *id != survivor).collect();
        cycles.push(RepairedCycle { survivor, repointed });
    }

    if dry_run || cycles.is_empty() {
        return Ok(RepairOutcome { cycles, applied: false });
    }

    let now = clock.now_ms();
    for cycle in &cycles {
        if let Some(mut survivor_row) = store.get_catalog_row(project_id, cycle.survivor)? {
            if survivor_row.canonical_code_id != Some(cycle.survivor) || survivor_row.status != CatalogStatus::Active {
                survivor_row.canonical_code_id = Some(cycle.survivor);
                survivor_row.status = CatalogStatus::Active;
                survivor_row.updated_at_ms = now;
                store.update_catalog_row(&survivor_row)?;
            }
        }
        for &member in &cycle.repointed {
            let Some(mut member_row) = store.get_catalog_row(project_id, member)? else {
                continue;
            };
            let previous = serde_json::to_value(&member_row).ok();
            member_row.canonical_code_id = Some(cycle.survivor);
            member_row.status = CatalogStatus::Merged;
            member_row.updated_at_ms = now;
            store.update_catalog_row(&member_row)?;
            store.append_version_event(&VersionEvent {
                project_id,
                codigo: member_row.codigo.clone(),
                code_id: Some(member_row.code_id),
                action: VersionAction::RepairCycle,
                actor: actor.to_string(),
                previous,
                next: serde_json::to_value(&member_row).ok(),
                at_ms: now,
            })?;
        }
    }

    Ok(RepairOutcome { cycles, applied: true })
}
