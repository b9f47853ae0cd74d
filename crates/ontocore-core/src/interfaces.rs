// crates/ontocore-core/src/interfaces.rs
// ============================================================================
// Module: Ontocore Interfaces
// Description: Trait seams separating business logic from backend storage.
// Purpose: Let ontocore-engine and ontocore-api depend on behavior, not on a
//          concrete SQLite/HTTP backend.
// Dependencies: async-trait, serde
// ============================================================================

//! ## Overview
//! Mirrors the teacher's `decision-gate-core::interfaces` module: every
//! external dependency (durable storage, the graph store, the vector
//! store, wall-clock time, advisory locking) is a trait here, with a
//! concrete implementation living in a downstream crate
//! (`ontocore-store-sqlite`, `ontocore-sync`). The ledger store is
//! synchronous by design — it is backed by a dedicated writer thread, the
//! same shape as the teacher's `SqliteRunStateStore` — so async callers
//! reach it through `tokio::task::spawn_blocking`.

use async_trait::async_trait;

use crate::error::OntoError;
use crate::identifiers::CandidateId;
use crate::identifiers::CodeId;
use crate::identifiers::FragmentId;
use crate::identifiers::IdempotencyKey;
use crate::identifiers::ProjectId;
use crate::model::AssignmentRow;
use crate::model::AxialRow;
use crate::model::CandidateRow;
use crate::model::CatalogRow;
use crate::model::FreezeRow;
use crate::model::VersionEvent;

// ============================================================================
// SECTION: Ledger Store (C1)
// ============================================================================

/// Project-scoped snapshot of the four readiness counters' raw inputs,
/// returned by the store for the gate (C4) to interpret.
#[derive(Debug, Clone, Default)]
pub struct ReadinessInputs {
    /// Assignments whose `code_id` is `None` but whose `codigo` exists in
    /// the catalog.
    pub assignments_missing_code_id: Vec<AssignmentRow>,
    /// Catalog rows with `status = Merged` but `canonical_code_id` `None`,
    /// or pointing at a non-existent row.
    pub catalog_missing_canonical: Vec<CatalogRow>,
    /// All catalog rows, used by the resolver to walk canonical chains and
    /// detect cycles.
    pub catalog_rows: Vec<CatalogRow>,
    /// All assignments, used to compute `divergences_text_vs_id`.
    pub assignment_rows: Vec<AssignmentRow>,
}

/// Authoritative, transactional, project-scoped storage for the ledger
/// (catalog, candidate, assignment, axial, freeze, idempotency, version).
///
/// # Invariants
/// - Every write occurs inside a transaction that is atomic: either every
///   row changes or none does.
/// - Readers are never blocked by readers.
/// - Implementations enforce I1-I7 as constraints, not as advisory checks
///   left to callers.
pub trait LedgerStore: Send + Sync {
    /// Fetches a catalog row by code id.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn get_catalog_row(
        &self,
        project_id: ProjectId,
        code_id: CodeId,
    ) -> Result<Option<CatalogRow>, OntoError>;

    /// Fetches a catalog row by case-insensitive label.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn get_catalog_row_by_label(
        &self,
        project_id: ProjectId,
        codigo: &str,
    ) -> Result<Option<CatalogRow>, OntoError>;

    /// Inserts a new catalog row, minting its `code_id`.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `conflict` if `codigo` already exists
    /// case-insensitively for `project_id` (I1).
    fn insert_catalog_row(
        &self,
        project_id: ProjectId,
        codigo: &str,
        memo: Option<&str>,
        now_ms: i64,
    ) -> Result<CatalogRow, OntoError>;

    /// Replaces a catalog row in place. Callers are responsible for I1-I4.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `not_found` if the row does not
    /// exist, or `conflict`/`invariant_violation`-shaped `conflict` errors
    /// when the replacement would break I1-I4.
    fn update_catalog_row(&self, row: &CatalogRow) -> Result<(), OntoError>;

    /// Lists all catalog rows for a project (bounded by ledger size; callers
    /// needing pagination page at the API layer).
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn list_catalog_rows(&self, project_id: ProjectId) -> Result<Vec<CatalogRow>, OntoError>;

    /// Upserts a candidate row by `(project_id, codigo, fragment_id)`,
    /// taking the max of old/new confidence on collision.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn upsert_candidate(&self, candidate: &CandidateRow) -> Result<CandidateRow, OntoError>;

    /// Fetches a candidate row by id.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn get_candidate(
        &self,
        project_id: ProjectId,
        id: CandidateId,
    ) -> Result<Option<CandidateRow>, OntoError>;

    /// Lists candidates matching a label, case-insensitively.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn list_candidates_by_label(
        &self,
        project_id: ProjectId,
        codigo: &str,
    ) -> Result<Vec<CandidateRow>, OntoError>;

    /// Lists the most recent candidates for a project, for duplicate
    /// suggestion scans; bounded by `limit`.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn list_recent_candidates(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<CandidateRow>, OntoError>;

    /// Replaces a candidate row in place.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `not_found` if the row does not
    /// exist.
    fn update_candidate(&self, candidate: &CandidateRow) -> Result<(), OntoError>;

    /// Inserts or replaces an assignment row, keyed by
    /// `(project_id, fragment_id, codigo)`.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn upsert_assignment(&self, assignment: &AssignmentRow) -> Result<(), OntoError>;

    /// Lists all assignments for a project.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn list_assignments(&self, project_id: ProjectId) -> Result<Vec<AssignmentRow>, OntoError>;

    /// Inserts or replaces an axial relation, keyed by
    /// `(project_id, categoria, codigo, relation)`.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `conflict` on a uniqueness collision.
    fn upsert_axial(&self, axial: &AxialRow) -> Result<(), OntoError>;

    /// Lists all axial relations for a project, for C6 projection scans.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn list_axial_rows(&self, project_id: ProjectId) -> Result<Vec<AxialRow>, OntoError>;

    /// Gathers the raw inputs the readiness gate needs to compute its four
    /// counters.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn readiness_inputs(&self, project_id: ProjectId) -> Result<ReadinessInputs, OntoError>;

    /// Fetches the freeze row for a project, defaulting to not-frozen if
    /// absent.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn get_freeze(&self, project_id: ProjectId) -> Result<FreezeRow, OntoError>;

    /// Persists a freeze row.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn put_freeze(&self, freeze: &FreezeRow) -> Result<(), OntoError>;

    /// Appends a version event. Best-effort: implementations should log and
    /// swallow failures here rather than fail the owning operation, per
    /// spec §3 "best-effort but never suppressed on success paths" — the
    /// owning operation must already have committed before this is called.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn append_version_event(&self, event: &VersionEvent) -> Result<(), OntoError>;

    /// Lists version events for a project, most recent first, bounded by
    /// `limit`.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn list_version_events(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<VersionEvent>, OntoError>;

    /// Looks up a previously recorded idempotent response by key.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn get_idempotent_response(
        &self,
        project_id: ProjectId,
        key: &IdempotencyKey,
    ) -> Result<Option<serde_json::Value>, OntoError>;

    /// Records a response under an idempotency key with the given TTL.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on storage I/O failure.
    fn put_idempotent_response(
        &self,
        project_id: ProjectId,
        key: &IdempotencyKey,
        response: &serde_json::Value,
        ttl_secs: u64,
        now_ms: i64,
    ) -> Result<(), OntoError>;
}

// ============================================================================
// SECTION: Advisory Locking
// ============================================================================

/// Operation class an advisory lock is scoped to, per spec §5 ("catalog
/// lock before axial lock" ordering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockClass {
    /// Guards catalog/candidate mutations (merges, promotions, repair).
    Catalog,
    /// Guards axial relation writes.
    Axial,
    /// Guards freeze toggling.
    Freeze,
    /// Guards a projection sync run.
    Sync,
}

impl LockClass {
    /// Returns a stable label for telemetry and lock-table keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Axial => "axial",
            Self::Freeze => "freeze",
            Self::Sync => "sync",
        }
    }
}

/// An acquired advisory lock; dropping it releases the lock.
pub trait LockGuard: Send {}

/// Project-scoped advisory locking over `(project_id, operation_class)`.
///
/// # Invariants
/// - Double-acquisition by the same caller without releasing the first
///   guard is rejected with `busy`, not a deadlock.
/// - Acquisition honors `ADVISORY_LOCK_TIMEOUT_MS`: callers that cannot
///   acquire within the timeout receive `busy`.
pub trait AdvisoryLockManager: Send + Sync {
    /// Attempts to acquire the lock, blocking up to `timeout_ms`.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `busy` if the lock is held past the
    /// timeout; the error details carry the holder's session id when known.
    fn acquire(
        &self,
        project_id: ProjectId,
        class: LockClass,
        session_id: Option<&str>,
        timeout_ms: u64,
    ) -> Result<Box<dyn LockGuard>, OntoError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock abstraction so tests can inject deterministic timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time in Unix milliseconds.
    fn now_ms(&self) -> i64;
}

/// Real wall-clock implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
    }
}

// ============================================================================
// SECTION: Projection (C6)
// ============================================================================

/// A fragment node ready for projection (§4.6 "Fragment node").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentNode {
    /// Fragment identity.
    pub id: FragmentId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Verbatim text.
    pub text: String,
    /// Paragraph index within the source interview.
    pub par_idx: u32,
    /// Character length of `text`.
    pub char_len: u32,
    /// Speaker label, when known.
    pub speaker: Option<String>,
}

/// A code node ready for projection (§4.6 "Code node").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeNode {
    /// Stable code identity; the preferred match key.
    pub code_id: CodeId,
    /// Current label.
    pub codigo: String,
    /// Owning project.
    pub project_id: ProjectId,
}

/// A category-to-code edge ready for projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxialEdge {
    /// Owning project.
    pub project_id: ProjectId,
    /// Category label.
    pub categoria: String,
    /// Target code identity.
    pub code_id: CodeId,
    /// Relation kind label.
    pub relation: String,
    /// Free-text annotation.
    pub memo: Option<String>,
    /// Supporting fragment identities.
    pub evidence: Vec<FragmentId>,
    /// Last update time (Unix milliseconds); carried so the projector can
    /// enforce monotonicity (O2).
    pub updated_at_ms: i64,
}

/// Graph-store projection target (§4.6).
///
/// # Invariants
/// - Every upsert is MERGE-by-identity: `code_id` for codes, the composite
///   `(id, project_id)` for fragments.
/// - The graph store never originates identity; it only reflects the
///   ledger (O2 monotonicity is the caller's responsibility via
///   `updated_at_ms` ordering).
#[async_trait]
pub trait GraphProjector: Send + Sync {
    /// Upserts fragment nodes, MERGE-by-`(id, project_id)`.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on transient failure.
    async fn upsert_fragments(&self, fragments: &[FragmentNode]) -> Result<(), OntoError>;

    /// Upserts code nodes, MERGE-by-`code_id`.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on transient failure.
    async fn upsert_codes(&self, codes: &[CodeNode]) -> Result<(), OntoError>;

    /// Upserts category-to-code axial edges.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on transient failure.
    async fn upsert_axial_edges(&self, edges: &[AxialEdge]) -> Result<(), OntoError>;
}

/// Vector-store projection target, keyed by `fragment_id` with `project_id`
/// carried as an indexed payload field (§6 "Persisted state layout").
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upserts an embedding for a fragment.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `dependency` on transient failure.
    async fn upsert_embedding(
        &self,
        project_id: ProjectId,
        fragment_id: &FragmentId,
        embedding: &[f32],
    ) -> Result<(), OntoError>;
}
