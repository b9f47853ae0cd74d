// crates/ontocore-core/src/model.rs
// ============================================================================
// Module: Ontocore Domain Model
// Description: Entities of the identity & ontology ledger.
// Purpose: Define the wire/storage shape of catalog, candidate, assignment,
//          axial, freeze, idempotency and audit-version rows.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every entity here is scoped by [`ProjectId`] and, transitively, by
//! [`OrganizationId`]. Catalog rows are never deleted; they are marked
//! `merged` or `deprecated`. The audit version log is append-only and is
//! best-effort but never suppressed on a success path.

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::CandidateId;
use crate::identifiers::CodeId;
use crate::identifiers::FragmentId;
use crate::identifiers::ProjectId;

/// Catalog row status.
///
/// # Invariants
/// - See I2/I3 on [`CatalogRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogStatus {
    /// The code is live and may be assigned to new fragments.
    Active,
    /// The code has been subsumed by another; `canonical_code_id` points at
    /// the survivor.
    Merged,
    /// The code is retired but kept for historical reference.
    Deprecated,
}

/// A definitive code in the project catalog (§3 "Code Catalog").
///
/// # Invariants
/// - (I1) `codigo` is unique per `(project_id, codigo)` case-insensitively.
/// - (I2) if `status = Active` then `canonical_code_id` is `None` or equals
///   `code_id` (self-canonical).
/// - (I3) if `status = Merged` then `canonical_code_id` is `Some` and points
///   (directly or transitively) to an `Active` row.
/// - (I4) the `code_id -> canonical_code_id` graph has no cycles of length
///   greater than 1; self-loops are allowed and mean "I am canonical".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    /// Stable code identifier, minted once and never reused.
    pub code_id: CodeId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Human-readable label. Unique per project, case-insensitively.
    pub codigo: String,
    /// Lifecycle status.
    pub status: CatalogStatus,
    /// Self-reference chain toward the canonical survivor.
    pub canonical_code_id: Option<CodeId>,
    /// Free-text annotation.
    pub memo: Option<String>,
    /// Row creation time (Unix milliseconds).
    pub created_at_ms: i64,
    /// Last row mutation time (Unix milliseconds).
    pub updated_at_ms: i64,
}

/// Producer of a proposed code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Entered directly by a human analyst.
    Manual,
    /// Proposed by an LLM-backed collaborator.
    Llm,
    /// Surfaced by an automated discovery pass.
    Discovery,
    /// Proposed by semantic similarity search.
    Semantic,
    /// Imported from a legacy dataset.
    Legacy,
}

/// Lifecycle state of a [`CandidateRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateState {
    /// Awaiting human validation.
    Pending,
    /// Validated by an analyst; eligible for promotion.
    Validated,
    /// Rejected by an analyst; terminal.
    Rejected,
    /// Merged into another candidate or catalog row; terminal.
    Merged,
}

/// A proposed code pending validation (§3 "Candidate").
///
/// # Invariants
/// - Unique per `(project_id, codigo, fragment_id)`; collisions upsert
///   rather than duplicate (see `submit`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRow {
    /// Row identifier.
    pub id: CandidateId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Proposed label.
    pub codigo: String,
    /// Fragment this candidate was extracted from, when known.
    pub fragment_id: Option<FragmentId>,
    /// Producer that proposed this candidate.
    pub source: CandidateSource,
    /// Producer confidence in `[0, 1]`.
    pub confidence: f64,
    /// Lifecycle state.
    pub state: CandidateState,
    /// Label of the destination this row was merged into, when `state = Merged`.
    pub merged_into: Option<String>,
    /// Free-text annotation.
    pub memo: Option<String>,
    /// Identity of the analyst who last transitioned this row.
    pub validator: Option<String>,
    /// Row creation time (Unix milliseconds).
    pub created_at_ms: i64,
    /// Last row mutation time (Unix milliseconds).
    pub updated_at_ms: i64,
}

/// A definitive code-to-fragment link (§3 "Coding Assignment").
///
/// # Invariants
/// - Unique per `(project_id, fragment_id, codigo)`.
/// - (I5) `code_id` resolves via the canonical resolver to an `Active`
///   catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRow {
    /// Owning project.
    pub project_id: ProjectId,
    /// Fragment carrying this assignment.
    pub fragment_id: FragmentId,
    /// Label at the time of assignment (may drift from the catalog on rename
    /// until reconciled).
    pub codigo: String,
    /// Denormalized code identity; `None` only in the anomalous state that
    /// the readiness gate's `missing_code_id` counter tracks.
    pub code_id: Option<CodeId>,
    /// Verbatim extract grounding this assignment, capped at 60 words.
    pub cita: String,
    /// Originating source file, for provenance.
    pub source_file: Option<String>,
}

/// Axial relation type between a category and a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxialRelationType {
    /// The code is a cause within the category.
    Cause,
    /// The code is a condition within the category.
    Condition,
    /// The code is a consequence within the category.
    Consequence,
    /// The code is part of the category.
    PartOf,
}

/// Lifecycle state of an [`AxialRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxialState {
    /// Awaiting validation.
    Pending,
    /// Validated by an analyst.
    Validated,
    /// Rejected by an analyst.
    Rejected,
}

/// A category-to-code relation with evidence (§3 "Axial Relation").
///
/// # Invariants
/// - Unique per `(project_id, categoria, codigo, relation)`.
/// - `evidence.len() >= 2`.
/// - (I6) `code_id` resolves to canonical before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxialRow {
    /// Owning project.
    pub project_id: ProjectId,
    /// Category label.
    pub categoria: String,
    /// Code label at relation time.
    pub codigo: String,
    /// Canonical code identity.
    pub code_id: CodeId,
    /// Relation kind.
    pub relation: AxialRelationType,
    /// Free-text annotation.
    pub memo: Option<String>,
    /// Supporting fragments; must contain at least two entries.
    pub evidence: Vec<FragmentId>,
    /// Lifecycle state.
    pub state: AxialState,
}

/// Per-project operational freeze lock (§3 "Freeze", §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeRow {
    /// Owning project; also the primary key.
    pub project_id: ProjectId,
    /// Whether ontology-mutating maintenance is currently inhibited.
    pub is_frozen: bool,
    /// When the freeze was last engaged.
    pub frozen_at_ms: Option<i64>,
    /// Who engaged the freeze.
    pub frozen_by: Option<String>,
    /// When the freeze was last lifted.
    pub broken_at_ms: Option<i64>,
    /// Who lifted the freeze.
    pub broken_by: Option<String>,
    /// Free-text annotation.
    pub note: Option<String>,
}

/// Audit action recorded in the append-only version log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionAction {
    /// A catalog row was created.
    Create,
    /// A catalog row's label changed.
    Rename,
    /// A candidate or catalog row was merged into another.
    Merge,
    /// A merge was reversed.
    Unmerge,
    /// A candidate was promoted into the catalog.
    Promote,
    /// A catalog row was deprecated.
    Deprecate,
    /// A canonical chain cycle was broken by `repair`.
    RepairCycle,
}

/// An append-only audit event (§3 "Audit Version").
///
/// # Invariants
/// - Never deleted or mutated after insertion.
/// - Emitted best-effort on every success path named in §8 P9; never
///   suppressed when the owning operation itself succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEvent {
    /// Owning project.
    pub project_id: ProjectId,
    /// Label at the time of the event.
    pub codigo: String,
    /// Code identity at the time of the event, when known.
    pub code_id: Option<CodeId>,
    /// Action recorded.
    pub action: VersionAction,
    /// Identity of the actor (analyst, admin, or a system process name).
    pub actor: String,
    /// Serialized previous value, when applicable.
    pub previous: Option<serde_json::Value>,
    /// Serialized next value, when applicable.
    pub next: Option<serde_json::Value>,
    /// Event time (Unix milliseconds).
    pub at_ms: i64,
}
