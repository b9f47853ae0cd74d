// crates/ontocore-store-sqlite/src/locks.rs
// ============================================================================
// Module: In-Process Advisory Lock Manager
// Description: Project-scoped advisory locking over (project_id,
//              operation_class), per spec §5 and §4.1.
// Purpose: Give C3/C4/C7 a single in-process mutual-exclusion point without
//          a dedicated lock table; a single ontocore-api process owns this
//          state, so a condvar-guarded map is sufficient (no cross-process
//          coordination is required by the spec).
// Dependencies: ontocore-core
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use ontocore_core::error::OntoError;
use ontocore_core::identifiers::ProjectId;
use ontocore_core::interfaces::AdvisoryLockManager;
use ontocore_core::interfaces::LockClass;
use ontocore_core::interfaces::LockGuard;

/// Key identifying a single advisory lock slot.
type LockKey = (ProjectId, LockClass);

/// Shared table of currently-held locks, mapping each key to the session id
/// of its holder (when supplied).
struct LockTable {
    held: Mutex<HashMap<LockKey, Option<String>>>,
    released: Condvar,
}

/// In-process [`AdvisoryLockManager`] backed by a mutex-guarded map and a
/// condvar, woken on every release.
///
/// # Invariants
/// - A key is present in the table if and only if it is currently held.
/// - Acquisition blocks at most `timeout_ms`, then returns `busy`.
pub struct InProcessLockManager {
    table: Arc<LockTable>,
}

impl Default for InProcessLockManager {
    fn default() -> Self {
        Self {
            table: Arc::new(LockTable {
                held: Mutex::new(HashMap::new()),
                released: Condvar::new(),
            }),
        }
    }
}

impl AdvisoryLockManager for InProcessLockManager {
    fn acquire(
        &self,
        project_id: ProjectId,
        class: LockClass,
        session_id: Option<&str>,
        timeout_ms: u64,
    ) -> Result<Box<dyn LockGuard>, OntoError> {
        let key = (project_id, class);
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut held = self.table.held.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        loop {
            if let std::collections::hash_map::Entry::Vacant(entry) = held.entry(key) {
                entry.insert(session_id.map(str::to_string));
                return Ok(Box::new(InProcessLockGuard {
                    table: Arc::clone(&self.table),
                    key,
                }));
            }
            let now = Instant::now();
            if now >= deadline {
                let holder = held.get(&key).and_then(Option::as_deref).map(str::to_string);
                return Err(OntoError::busy(holder.as_deref()));
            }
            let wait_for = deadline - now;
            let (guard, timeout_result) = self
                .table
                .released
                .wait_timeout(held, wait_for)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            held = guard;
            if timeout_result.timed_out() && held.contains_key(&key) {
                let holder = held.get(&key).and_then(Option::as_deref).map(str::to_string);
                return Err(OntoError::busy(holder.as_deref()));
            }
        }
    }
}

/// RAII guard releasing its slot in [`LockTable`] on drop.
struct InProcessLockGuard {
    table: Arc<LockTable>,
    key: LockKey,
}

impl LockGuard for InProcessLockGuard {}

impl Drop for InProcessLockGuard {
    fn drop(&mut self) {
        let mut held =
            self.table.held.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        held.remove(&self.key);
        drop(held);
        self.table.released.notify_all();
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
    use std::thread;

    use super::*;

    fn project() -> ProjectId {
        ProjectId::new(NonZeroU64::new(1).expect("non-zero"))
    }

    #[test]
    fn second_acquisition_is_busy_until_released() {
        let manager = InProcessLockManager::default();
        let guard = manager.acquire(project(), LockClass::Catalog, Some("s1"), 10).expect("first");
        let err = manager
            .acquire(project(), LockClass::Catalog, Some("s2"), 50)
            .expect_err("must be busy");
        assert_eq!(err.kind, ontocore_core::error::ErrorKind::Busy);
        drop(guard);
        assert!(manager.acquire(project(), LockClass::Catalog, Some("s2"), 10).is_ok());
    }

    #[test]
    fn different_classes_do_not_contend() {
        let manager = InProcessLockManager::default();
        let _catalog = manager.acquire(project(), LockClass::Catalog, None, 10).expect("catalog");
        assert!(manager.acquire(project(), LockClass::Axial, None, 10).is_ok());
    }

    #[test]
    fn release_from_another_thread_unblocks_waiter() {
        let manager = Arc::new(InProcessLockManager::default());
        let guard = manager.acquire(project(), LockClass::Sync, None, 10).expect("first");
        let waiter = Arc::clone(&manager);
        let handle = thread::spawn(move || {
            waiter.acquire(project(), LockClass::Sync, None, 2_000).is_ok()
        });
        thread::sleep(Duration::from_millis(20));
        drop(guard);
        assert!(handle.join().expect("waiter thread"));
    }
}
