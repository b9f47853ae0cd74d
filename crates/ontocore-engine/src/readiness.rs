// crates/ontocore-engine/src/readiness.rs
// ============================================================================
// Module: Readiness Gate (C4)
// Description: Computes axial_ready and the four blocking counters.
// Purpose: Give every axial write path a single, shared enforcement point.
// Dependencies: ontocore-core
// ============================================================================

//! ## Overview
//! Pure over [`ReadinessInputs`]: the store gathers the raw candidate rows
//! (already filtered where cheap to filter in SQL), and this module derives
//! the four counters and the `axial_ready` signal from them plus a full
//! catalog snapshot for cycle detection.

use std::collections::HashMap;
use std::collections::HashSet;

use ontocore_core::identifiers::CodeId;
use ontocore_core::interfaces::ReadinessInputs;
use serde::Serialize;

use crate::resolver::CanonicalResolution;
use crate::resolver::CatalogIndex;

/// Stable blocking-reason labels, echoed verbatim in API responses (§4.4,
/// §6 error shape).
pub const REASON_MISSING_CODE_ID: &str = "missing_code_id";
/// See [`REASON_MISSING_CODE_ID`].
pub const REASON_MISSING_CANONICAL_CODE_ID: &str = "missing_canonical_code_id";
/// See [`REASON_MISSING_CODE_ID`].
pub const REASON_DIVERGENCES_TEXT_VS_ID: &str = "divergences_text_vs_id";
/// See [`REASON_MISSING_CODE_ID`].
pub const REASON_CYCLES_NON_TRIVIAL: &str = "cycles_non_trivial";

/// Readiness verdict for a project (§4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    /// Assignments whose `code_id` is null but whose `codigo` exists in
    /// the catalog.
    pub missing_code_id: u64,
    /// Catalog rows with `status=merged` but an absent/dangling
    /// `canonical_code_id`.
    pub missing_canonical_code_id: u64,
    /// Assignments whose label and id resolve to different canonicals.
    pub divergences_text_vs_id: u64,
    /// Distinct codes participating in a non-trivial (length > 1) cycle.
    pub cycles_non_trivial: u64,
    /// `true` iff every counter above is zero.
    pub axial_ready: bool,
    /// Non-zero counters, by stable name, in a fixed enumeration order.
    pub blocking_reasons: Vec<&'static str>,
}

/// Computes readiness from gathered inputs (§4.4).
#[must_use]
pub fn compute_readiness(inputs: &ReadinessInputs, max_hops: u32) -> Readiness {
    let missing_code_id = inputs.assignments_missing_code_id.len() as u64;
    let missing_canonical_code_id = inputs.catalog_missing_canonical.len() as u64;

    let index = CatalogIndex::build(&inputs.catalog_rows);

    let divergences_text_vs_id = inputs
        .assignment_rows
        .iter()
        .filter(|assignment| {
            let Some(code_id) = assignment.code_id else {
                return false;
            };
            let by_id = index.resolve_canonical(code_id, max_hops).code_id();
            let by_label = index
                .code_id_of_label(&assignment.codigo)
                .and_then(|label_code_id| index.resolve_canonical(label_code_id, max_hops).code_id());
            by_id != by_label
        })
        .count() as u64;

    let cycles_non_trivial = count_cyclic_nodes(&index, &inputs.catalog_rows, max_hops);

    let mut blocking_reasons = Vec::new();
    if missing_code_id > 0 {
        blocking_reasons.push(REASON_MISSING_CODE_ID);
    }
    if missing_canonical_code_id > 0 {
        blocking_reasons.push(REASON_MISSING_CANONICAL_CODE_ID);
    }
    if divergences_text_vs_id > 0 {
        blocking_reasons.push(REASON_DIVERGENCES_TEXT_VS_ID);
    }
    if cycles_non_trivial > 0 {
        blocking_reasons.push(REASON_CYCLES_NON_TRIVIAL);
    }

    Readiness {
        missing_code_id,
        missing_canonical_code_id,
        divergences_text_vs_id,
        cycles_non_trivial,
        axial_ready: blocking_reasons.is_empty(),
        blocking_reasons,
    }
}

/// Counts distinct `code_id`s participating in a cycle of length > 1.
/// Self-loops (`canonical_code_id == code_id`) are excluded by definition:
/// they terminate a chain rather than extending it.
fn count_cyclic_nodes(index: &CatalogIndex<'_>, rows: &[ontocore_core::model::CatalogRow], max_hops: u32) -> u64 {
    let mut cyclic = HashSet::new();
    let mut settled: HashMap<CodeId, bool> = HashMap::new();

    for row in rows {
        if settled.contains_key(&row.code_id) {
            continue;
        }
        match index.resolve_canonical(row.code_id, max_hops) {
            CanonicalResolution::CycleDetected => {
                // Walk the chain again, this time recording every node on
                // the path until we loop back, so we mark the whole cycle
                // rather than just its entry point.
                let mut path = Vec::new();
                let mut seen = HashSet::new();
                let mut current = row.code_id;
                loop {
                    if !seen.insert(current) {
                        break;
                    }
                    path.push(current);
                    match index.get(current).and_then(|catalog_row| catalog_row.canonical_code_id) {
                        Some(next) if next != current => current = next,
                        _ => break,
                    }
                }
                for node in &path {
                    cyclic.insert(*node);
                    settled.insert(*node, true);
                }
            }
            CanonicalResolution::Resolved(_) | CanonicalResolution::Missing => {
                settled.insert(row.code_id, false);
            }
        }
    }
    cyclic.len() as u64
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

    use ontocore_core::identifiers::CodeId;
    use ontocore_core::identifiers::ProjectId;
    use ontocore_core::model::CatalogRow;
    use ontocore_core::model::CatalogStatus;

    use super::*;

    fn code(id: u64) -> CodeId {
        CodeId::from_raw(id).expect("non-zero")
    }

    fn project() -> ProjectId {
        ProjectId::new(NonZeroU64::new(1).expect("non-zero"))
    }

    fn row(id: u64, canonical: Option<u64>, status: CatalogStatus) -> CatalogRow {
        CatalogRow {
            code_id: code(id),
            project_id: project(),
            codigo: format!("code-{id}"),
            status,
            canonical_code_id: canonical.map(code),
            memo: None,
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn all_zero_counters_means_ready() {
        let inputs = ReadinessInputs {
            catalog_rows: vec![row(1, Some(1), CatalogStatus::Active)],
            ..ReadinessInputs::default()
        };
        let readiness = compute_readiness(&inputs, 10);
        assert!(readiness.axial_ready);
        assert!(readiness.blocking_reasons.is_empty());
    }

    #[test]
    fn two_cycle_blocks_with_exact_reason() {
        let inputs = ReadinessInputs {
            catalog_rows: vec![
                row(1, Some(2), CatalogStatus::Merged),
                row(2, Some(1), CatalogStatus::Merged),
            ],
            ..ReadinessInputs::default()
        };
        let readiness = compute_readiness(&inputs, 10);
        assert!(!readiness.axial_ready);
        assert_eq!(readiness.cycles_non_trivial, 2);
        assert_eq!(readiness.blocking_reasons, vec![REASON_CYCLES_NON_TRIVIAL]);
    }

    #[test]
    fn counters_reflect_precomputed_inputs() {
        let inputs = ReadinessInputs {
            assignments_missing_code_id: vec![],
            catalog_missing_canonical: vec![row(1, None, CatalogStatus::Merged)],
            catalog_rows: vec![row(1, None, CatalogStatus::Merged)],
            assignment_rows: vec![],
        };
        let readiness = compute_readiness(&inputs, 10);
        assert_eq!(readiness.missing_canonical_code_id, 1);
        assert!(!readiness.axial_ready);
    }
}
