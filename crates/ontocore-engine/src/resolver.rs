// crates/ontocore-engine/src/resolver.rs
// ============================================================================
// Module: Canonical Resolver (C2)
// Description: Follows canonical_code_id chains to a fixed point.
// Purpose: Give every other component a single, pure source of truth for
//          "what code does this id/label really mean right now".
// Dependencies: ontocore-core
// ============================================================================

//! ## Overview
//! Pure over a catalog snapshot: no I/O, no mutation. Callers fetch the
//! snapshot once (typically via `LedgerStore::list_catalog_rows` or the
//! `catalog_rows` field of `ReadinessInputs`) and resolve as many ids as
//! they need against it without repeated trips to storage.

use std::collections::HashMap;
use std::collections::HashSet;

use ontocore_core::identifiers::CodeId;
use ontocore_core::model::CatalogRow;

/// Outcome of a canonical resolution attempt (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalResolution {
    /// The chain terminated at this `code_id` (possibly the input itself).
    Resolved(CodeId),
    /// `code_id` is not present in the catalog snapshot.
    Missing,
    /// The chain did not terminate within the hop budget; a cycle.
    CycleDetected,
}

impl CanonicalResolution {
    /// Returns the resolved id, or `None` for any non-resolved outcome.
    #[must_use]
    pub const fn code_id(self) -> Option<CodeId> {
        match self {
            Self::Resolved(id) => Some(id),
            Self::Missing | Self::CycleDetected => None,
        }
    }
}

/// Indexes a catalog snapshot by `code_id` for repeated resolution.
#[derive(Debug, Default)]
pub struct CatalogIndex<'a> {
    by_id: HashMap<CodeId, &'a CatalogRow>,
    by_label: HashMap<String, CodeId>,
}

impl<'a> CatalogIndex<'a> {
    /// Builds an index over a catalog snapshot.
    #[must_use]
    pub fn build(rows: &'a [CatalogRow]) -> Self {
        let mut by_id = HashMap::with_capacity(rows.len());
        let mut by_label = HashMap::with_capacity(rows.len());
        for row in rows {
            by_id.insert(row.code_id, row);
            by_label.insert(row.codigo.to_lowercase(), row.code_id);
        }
        Self { by_id, by_label }
    }

    /// Resolves `code_id` to its canonical terminus (§4.2).
    ///
    /// A missing input returns [`CanonicalResolution::Missing`]. A
    /// self-canonical row (`canonical_code_id == code_id` or `None`)
    /// returns itself. Exceeding `max_hops` without terminating returns
    /// [`CanonicalResolution::CycleDetected`].
    #[must_use]
    pub fn resolve_canonical(&self, code_id: CodeId, max_hops: u32) -> CanonicalResolution {
        let Some(_) = self.by_id.get(&code_id) else {
            return CanonicalResolution::Missing;
        };
        let mut current = code_id;
        let mut visited = HashSet::new();
        visited.insert(current);
        for _ in 0..max_hops {
            let Some(row) = self.by_id.get(&current) else {
                return CanonicalResolution::Missing;
            };
            match row.canonical_code_id {
                None => return CanonicalResolution::Resolved(current),
                Some(next) if next == current => return CanonicalResolution::Resolved(current),
                Some(next) => {
                    if !visited.insert(next) {
                        return CanonicalResolution::CycleDetected;
                    }
                    current = next;
                }
            }
        }
        CanonicalResolution::CycleDetected
    }

    /// Resolves a label to a `code_id`, case-insensitively and stable
    /// across case-only renames.
    #[must_use]
    pub fn code_id_of_label(&self, codigo: &str) -> Option<CodeId> {
        self.by_label.get(&codigo.to_lowercase()).copied()
    }

    /// Returns the raw row for `code_id`, if present.
    #[must_use]
    pub fn get(&self, code_id: CodeId) -> Option<&'a CatalogRow> {
        self.by_id.get(&code_id).copied()
    }
}

/// Free-function convenience wrapper over a one-off snapshot (§4.2).
#[must_use]
pub fn resolve_canonical(
    catalog_rows: &[CatalogRow],
    code_id: CodeId,
    max_hops: u32,
) -> CanonicalResolution {
    CatalogIndex::build(catalog_rows).resolve_canonical(code_id, max_hops)
}

/// Free-function convenience wrapper over a one-off snapshot (§4.2).
#[must_use]
pub fn code_id_of_label(catalog_rows: &[CatalogRow], codigo: &str) -> Option<CodeId> {
    CatalogIndex::build(catalog_rows).code_id_of_label(codigo)
}
