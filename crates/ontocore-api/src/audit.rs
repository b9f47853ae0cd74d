// crates/ontocore-api/src/audit.rs
// ============================================================================
// Module: Operational Audit Log
// Description: In-process ring buffer backing GET /ops/recent and
//              GET /ops/log (§6).
// Purpose: Give operators a queryable history of admin operations without
//          standing up a separate audit store.
// Dependencies: ontocore-core
// ============================================================================

//! ## Overview
//! A pluggable trait over a simple default implementation, the same shape
//! as the teacher's `McpMetrics`/`NoopMetrics` and `TenantAuthorizer`/
//! `NoopTenantAuthorizer` pairs: a narrow interface so a future deployment
//! can swap in a durable sink (e.g. appending to the ledger's own
//! `version` table, or an external log aggregator) without touching
//! call sites.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

use crate::telemetry::OutcomeClass;

/// A single completed admin-operation record (§6 `GET /ops/recent`).
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// Unix milliseconds the operation completed at.
    pub at_ms: i64,
    /// Owning project, when scoped.
    pub project_id: Option<u64>,
    /// Operator session id, when supplied.
    pub session_id: Option<String>,
    /// Per-request correlation id.
    pub request_id: String,
    /// Stable operation name (e.g. `"candidates.merge"`).
    pub operation: &'static str,
    /// Whether the call ran in dry-run mode.
    pub dry_run: bool,
    /// Whether the call declared `confirm=true` (a genuine write intent,
    /// regardless of whether it ultimately mutated anything).
    pub write_intent: bool,
    /// Outcome classification.
    pub outcome: &'static str,
    /// `true` if the outcome was `ERROR`.
    pub is_error: bool,
}

/// Query filters for [`AuditLog::query`] (§6 `GET /ops/recent`/`GET /ops/log`).
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// `kind` filter: `None`/`"all"` for every entry, `"errors"` for
    /// `is_error` entries only, `"mutations"` for `write_intent` entries
    /// only.
    pub kind: Option<String>,
    /// Exact operation name filter.
    pub op: Option<String>,
    /// `intent` filter: `None`/`"all"`, or `"write_intent_post"` to keep
    /// only entries that declared a write intent.
    pub intent: Option<String>,
    /// Lower bound (inclusive) on `at_ms`.
    pub since_ms: Option<i64>,
    /// Upper bound (inclusive) on `at_ms`.
    pub until_ms: Option<i64>,
    /// Maximum number of entries to return, most recent first.
    pub limit: usize,
}

impl AuditQuery {
    fn matches(&self, entry: &AuditEntry) -> bool {
        match self.kind.as_deref() {
            Some("errors") if !entry.is_error => return false,
            Some("mutations") if !entry.write_intent => return false,
            _ => {}
        }
        if let Some(op) = &self.op
            && entry.operation != op
        {
            return false;
        }
        if matches!(self.intent.as_deref(), Some("write_intent_post")) && !entry.write_intent {
            return false;
        }
        if let Some(since_ms) = self.since_ms
            && entry.at_ms < since_ms
        {
            return false;
        }
        if let Some(until_ms) = self.until_ms
            && entry.at_ms > until_ms
        {
            return false;
        }
        true
    }
}

/// Sink for completed admin-operation records.
pub trait AuditLog: Send + Sync {
    /// Appends a completed operation to the log.
    fn record(&self, entry: AuditEntry);

    /// Returns entries matching `query`, most recent first, capped at
    /// `query.limit`.
    fn query(&self, query: &AuditQuery) -> Vec<AuditEntry>;
}

/// Bounded in-memory [`AuditLog`], oldest entries dropped once `capacity`
/// is exceeded.
pub struct InMemoryAuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl InMemoryAuditLog {
    /// Builds a log retaining at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl AuditLog for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut out: Vec<AuditEntry> = entries.iter().rev().filter(|entry| query.matches(entry)).cloned().collect();
        if query.limit > 0 {
            out.truncate(query.limit);
        }
        out
    }
}

/// Builds an [`AuditEntry`] from a completed request's context and outcome.
#[must_use]
pub fn entry_from_context(
    project_id: Option<u64>,
    session_id: Option<String>,
    request_id: String,
    operation: &'static str,
    dry_run: bool,
    confirm: bool,
    outcome: OutcomeClass,
    at_ms: i64,
) -> AuditEntry {
    AuditEntry {
        at_ms,
        project_id,
        session_id,
        request_id,
        operation,
        dry_run,
        write_intent: confirm && !dry_run,
        outcome: outcome.as_str(),
        is_error: matches!(outcome, OutcomeClass::Error),
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

    use super::*;

    fn sample(operation: &'static str, is_error: bool, write_intent: bool) -> AuditEntry {
        AuditEntry {
            at_ms: 1_000,
            project_id: Some(1),
            session_id: Some("s1".to_string()),
            request_id: "r1".to_string(),
            operation,
            dry_run: !write_intent,
            write_intent,
            outcome: if is_error { "ERROR" } else { "OK" },
            is_error,
        }
    }

    #[test]
    fn query_filters_by_kind_errors() {
        let log = InMemoryAuditLog::default();
        log.record(sample("candidates.merge", false, true));
        log.record(sample("candidates.merge", true, true));
        let results = log.query(&AuditQuery {
            kind: Some("errors".to_string()),
            limit: 10,
            ..AuditQuery::default()
        });
        assert_eq!(results.len(), 1);
        assert!(results[0].is_error);
    }

    #[test]
    fn query_respects_limit_and_recency_order() {
        let log = InMemoryAuditLog::default();
        for i in 0..5 {
            log.record(AuditEntry { at_ms: i, ..sample("axial.create", false, true) });
        }
        let results = log.query(&AuditQuery { limit: 2, ..AuditQuery::default() });
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].at_ms, 4);
        assert_eq!(results[1].at_ms, 3);
    }

    #[test]
    fn capacity_drops_oldest() {
        let log = InMemoryAuditLog::new(2);
        log.record(sample("a", false, false));
        log.record(sample("b", false, false));
        log.record(sample("c", false, false));
        let results = log.query(&AuditQuery { limit: 10, ..AuditQuery::default() });
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].operation, "c");
        assert_eq!(results[1].operation, "b");
    }
}
