// crates/ontocore-core/src/error.rs
// ============================================================================
// Module: Ontocore Error Taxonomy
// Description: The stable error kinds surfaced across the HTTP and CLI surface.
// Purpose: Give every crate a single place to converge on (spec §7).
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every trait seam in this workspace (`LedgerStore`, the resolver, the
//! lifecycle engine, the readiness gate, the freeze controller, the
//! synchronizer) defines its own narrow error enum, the way the teacher
//! repo layers `SqliteStoreError` under `StoreError` and `BrokerError`
//! under `DispatchError`. [`OntoError`] is the taxonomy all of those fold
//! into at the API boundary.

use std::fmt;

use thiserror::Error;

/// Stable error kind, drawn from spec §7. Appears verbatim in API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Project/code/candidate/fragment absent.
    NotFound,
    /// Uniqueness or invariant (I1-I7) would be violated.
    Conflict,
    /// Axial write refused; response carries `blocking_reasons`.
    NotReady,
    /// Freeze gate refused a mutating maintenance op.
    Frozen,
    /// Advisory lock held.
    Busy,
    /// External store (graph/vector) failed transiently.
    Dependency,
    /// Schema/validation error.
    InvalidRequest,
    /// Unclassified.
    Internal,
}

impl ErrorKind {
    /// Returns the stable wire label for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::NotReady => "not_ready",
            Self::Frozen => "frozen",
            Self::Busy => "busy",
            Self::Dependency => "dependency",
            Self::InvalidRequest => "invalid_request",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A taxonomy-classified error with an optional machine-readable detail
/// payload (e.g. `blocking_reasons`, the `busy` holder's session id).
///
/// # Invariants
/// - `kind` is always one of the eight stable values; new variants must not
///   be added without updating every HTTP/CLI mapping.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct OntoError {
    /// Stable error kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details (e.g. `blocking_reasons`, lock holder).
    pub details: Option<serde_json::Value>,
}

impl OntoError {
    /// Constructs a new error with no structured detail payload.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Attaches a structured detail payload.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Shorthand for [`ErrorKind::NotFound`].
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for [`ErrorKind::Conflict`].
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Shorthand for [`ErrorKind::NotReady`], carrying `blocking_reasons`.
    #[must_use]
    pub fn not_ready(blocking_reasons: &[&str]) -> Self {
        Self::new(ErrorKind::NotReady, "axial write refused: ontology not ready").with_details(
            serde_json::json!({ "blocking_reasons": blocking_reasons }),
        )
    }

    /// Shorthand for [`ErrorKind::Frozen`].
    #[must_use]
    pub fn frozen(project_id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Frozen, format!("project {project_id} is frozen"))
    }

    /// Shorthand for [`ErrorKind::Busy`], carrying the lock holder's session id
    /// when known.
    #[must_use]
    pub fn busy(holder_session_id: Option<&str>) -> Self {
        let mut err = Self::new(ErrorKind::Busy, "advisory lock is held");
        if let Some(holder) = holder_session_id {
            err = err.with_details(serde_json::json!({ "holder_session_id": holder }));
        }
        err
    }

    /// Shorthand for [`ErrorKind::Dependency`].
    #[must_use]
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dependency, message)
    }

    /// Shorthand for [`ErrorKind::InvalidRequest`].
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Shorthand for [`ErrorKind::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}
