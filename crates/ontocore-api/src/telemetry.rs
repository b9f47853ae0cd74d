// crates/ontocore-api/src/telemetry.rs
// ============================================================================
// Module: Request Telemetry
// Description: Structured request.start/request.end event emission for
//              every mutating endpoint (§4.7).
// Purpose: Give operators a single, greppable log shape instead of
//          hand-formatted strings scattered across handlers.
// Dependencies: ontocore-core, tracing
// ============================================================================

//! ## Overview
//! Mirrors the event-struct-then-sink shape of `decision-gate-mcp`'s
//! `McpMetricEvent`/`McpMetrics`, but emits through `tracing` instead of a
//! counter/histogram trait: this spec calls for human- and log-pipeline-
//! readable `request.start`/`request.end` lines, not a metrics surface, so
//! `tracing`'s structured `info!`/`warn!` fields are the better fit (the
//! other stack this pack draws from, e.g. `this-rs-project-orchestrator`,
//! reaches for `tracing` the same way).

use ontocore_core::error::ErrorKind;

/// Outcome classification for a completed request (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    /// The operation completed and mutated state.
    Ok,
    /// The operation completed but changed nothing (e.g. a dry run, or an
    /// idempotent replay).
    Noop,
    /// The operation failed with a classified [`OntoError`](ontocore_core::error::OntoError).
    Error,
    /// The operation's outcome could not be classified (a panic boundary or
    /// unexpected early return).
    Unknown,
}

impl OutcomeClass {
    /// Returns the stable label used in the `outcome` log field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Noop => "NOOP",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Classifies an operation's outcome from its result and whether it
    /// was a dry run.
    #[must_use]
    pub fn classify<T>(result: &Result<T, ErrorKind>, dry_run: bool) -> Self {
        match result {
            Ok(_) if dry_run => Self::Noop,
            Ok(_) => Self::Ok,
            Err(_) => Self::Error,
        }
    }
}

/// Fields common to every `request.start`/`request.end` log line (§4.7).
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Project the request is scoped to, when known at start.
    pub project_id: Option<u64>,
    /// Operator session id (`X-Session-ID`), when supplied.
    pub session_id: Option<String>,
    /// Per-request correlation id.
    pub request_id: String,
    /// Stable operation name (e.g. `"candidates.merge"`).
    pub operation: &'static str,
    /// Whether the call ran in dry-run mode.
    pub dry_run: bool,
    /// Whether the call carried `confirm=true`.
    pub confirm: bool,
}

impl RequestContext {
    /// Emits the `request.start` event.
    pub fn log_start(&self) {
        tracing::info!(
            event = "request.start",
            project_id = self.project_id,
            session_id = self.session_id.as_deref(),
            request_id = %self.request_id,
            operation = self.operation,
            dry_run = self.dry_run,
            confirm = self.confirm,
        );
    }

    /// Emits the `request.end` event.
    #[allow(clippy::too_many_arguments, reason = "Every field is required by spec \u{a7}4.7's fixed log shape.")]
    pub fn log_end(&self, batch_size: usize, updated_rows: usize, duration_ms: u64, status_code: u16, outcome: OutcomeClass) {
        tracing::info!(
            event = "request.end",
            project_id = self.project_id,
            session_id = self.session_id.as_deref(),
            request_id = %self.request_id,
            operation = self.operation,
            dry_run = self.dry_run,
            confirm = self.confirm,
            batch_size = batch_size,
            updated_rows = updated_rows,
            duration_ms = duration_ms,
            status_code = status_code,
            outcome = outcome.as_str(),
        );
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

    #[test]
    fn dry_run_success_is_noop() {
        let result: Result<(), ErrorKind> = Ok(());
        assert_eq!(OutcomeClass::classify(&result, true), OutcomeClass::Noop);
    }

    #[test]
    fn confirmed_success_is_ok() {
        let result: Result<(), ErrorKind> = Ok(());
        assert_eq!(OutcomeClass::classify(&result, false), OutcomeClass::Ok);
    }

    #[test]
    fn failure_is_error_regardless_of_dry_run() {
        let result: Result<(), ErrorKind> = Err(ErrorKind::Conflict);
        assert_eq!(OutcomeClass::classify(&result, true), OutcomeClass::Error);
    }
}
