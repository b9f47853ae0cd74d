// crates/ontocore-api/src/state.rs
// ============================================================================
// Module: Application State
// Description: Shared handles every Axum handler needs, plus the
//              spawn_blocking bridge onto the synchronous ledger/lock
//              traits.
// Purpose: One place to construct the server's dependency graph and one
//          place to cross the sync/async boundary consistently.
// Dependencies: axum, ontocore-core, ontocore-config, ontocore-engine,
//               ontocore-sync, tokio
// ============================================================================

//! ## Overview
//! `LedgerStore` and `AdvisoryLockManager` are synchronous traits backed
//! by a dedicated writer thread (see `ontocore_core::interfaces`'s module
//! doc). Every handler reaches them through [`AppState::with_ledger`] or
//! [`AppState::with_locked_ledger`], which move `Arc` clones onto a
//! `tokio::task::spawn_blocking` thread rather than holding the async
//! runtime hostage on a blocking call.

use std::sync::Arc;
use std::time::Instant;

use ontocore_config::OntocoreConfig;
use ontocore_core::error::OntoError;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::identifiers::RequestId;
use ontocore_core::interfaces::AdvisoryLockManager;
use ontocore_core::interfaces::Clock;
use ontocore_core::interfaces::GraphProjector;
use ontocore_core::interfaces::LedgerStore;
use ontocore_core::interfaces::LockClass;
use ontocore_sync::SyncStateStore;

use crate::audit::AuditLog;
use crate::audit::InMemoryAuditLog;
use crate::correlation::RequestIdGenerator;

/// Shared, cheaply cloneable application state handed to Axum's router.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative ledger storage.
    pub store: Arc<dyn LedgerStore>,
    /// Advisory lock manager over `(project_id, operation_class)`.
    pub locks: Arc<dyn AdvisoryLockManager>,
    /// Wall-clock abstraction.
    pub clock: Arc<dyn Clock>,
    /// Resolved runtime configuration.
    pub config: Arc<OntocoreConfig>,
    /// Graph-store projection target for the sync routes.
    pub projector: Arc<dyn GraphProjector>,
    /// Sync-state side table tracking per-entity projection progress.
    pub sync_state: Arc<dyn SyncStateStore>,
    /// In-process operational audit log backing `/ops/recent` and `/ops/log`.
    pub audit: Arc<dyn AuditLog>,
    /// Per-request correlation id generator.
    pub request_ids: Arc<RequestIdGenerator>,
}

impl AppState {
    /// Builds application state from its constituent handles, seeding a
    /// fresh in-memory audit log and request-id generator.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        locks: Arc<dyn AdvisoryLockManager>,
        clock: Arc<dyn Clock>,
        config: Arc<OntocoreConfig>,
        projector: Arc<dyn GraphProjector>,
        sync_state: Arc<dyn SyncStateStore>,
    ) -> Self {
        Self {
            store,
            locks,
            clock,
            config,
            projector,
            sync_state,
            audit: Arc::new(InMemoryAuditLog::default()),
            request_ids: Arc::new(RequestIdGenerator::new("ontocore")),
        }
    }

    /// Issues a fresh [`RequestId`].
    #[must_use]
    pub fn next_request_id(&self) -> RequestId {
        self.request_ids.issue()
    }

    /// Runs `f` against the ledger store and clock on a blocking-pool
    /// thread, without taking an advisory lock. Use for reads and for
    /// writes that are already lock-free by design (candidate inserts,
    /// per spec §5).
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `internal` if the blocking task
    /// panics or is cancelled; otherwise propagates `f`'s result.
    pub async fn with_ledger<F, T>(&self, f: F) -> Result<T, OntoError>
    where
        F: FnOnce(&dyn LedgerStore, &dyn Clock) -> Result<T, OntoError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        tokio::task::spawn_blocking(move || f(store.as_ref(), clock.as_ref()))
            .await
            .map_err(|_join_err| OntoError::internal("ledger task panicked or was cancelled"))?
    }

    /// Acquires an advisory lock for `class` on `project_id`, then runs
    /// `f` against the ledger store and clock while holding it, all on a
    /// blocking-pool thread. The lock is released when `f` returns,
    /// whichever way it returns (success, error, or the surrounding
    /// future being dropped on cancellation).
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `busy` if the lock cannot be
    /// acquired within `timeout_ms`; kind `internal` if the blocking task
    /// panics or is cancelled; otherwise propagates `f`'s result.
    pub async fn with_locked_ledger<F, T>(
        &self,
        project_id: ProjectId,
        class: LockClass,
        session_id: Option<String>,
        timeout_ms: u64,
        f: F,
    ) -> Result<T, OntoError>
    where
        F: FnOnce(&dyn LedgerStore, &dyn Clock) -> Result<T, OntoError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let locks = Arc::clone(&self.locks);
        tokio::task::spawn_blocking(move || {
            let _guard = locks.acquire(project_id, class, session_id.as_deref(), timeout_ms)?;
            f(store.as_ref(), clock.as_ref())
        })
        .await
        .map_err(|_join_err| OntoError::internal("locked ledger task panicked or was cancelled"))?
    }
}

/// A simple monotonic stopwatch for the `duration_ms` telemetry field.
#[derive(Debug)]
pub struct RequestTimer(Instant);

impl RequestTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self(Instant::now())
    }

    /// Returns elapsed milliseconds, saturating rather than overflowing.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.0.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for RequestTimer {
    fn default() -> Self {
        Self::start()
    }
}
