// crates/ontocore-core/src/identifiers.rs
// ============================================================================
// Module: Ontocore Identifiers
// Description: Canonical opaque identifiers for the identity & ontology core.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout the
//! identity & ontology core. Identifiers are opaque and serialize as
//! numbers or strings on the wire. Numeric identifiers enforce non-zero,
//! 1-based invariants at construction boundaries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Numeric Identifiers
// ============================================================================

/// Organization identifier; the top level of the tenancy hierarchy.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(NonZeroU64);

impl OrganizationId {
    /// Creates a new organization identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates an organization identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

/// Project identifier; the scoping key for every entity in the ledger.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
/// - Every catalog/candidate/assignment/axial/freeze/idempotency row carries
///   exactly one `ProjectId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(NonZeroU64);

impl ProjectId {
    /// Creates a new project identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a project identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

/// Stable catalog code identifier, monotonically assigned and immutable for
/// the life of the row.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
/// - Never reused, even after the row transitions to `merged`/`deprecated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeId(NonZeroU64);

impl CodeId {
    /// Creates a new code identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a code identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

/// Candidate row identifier.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(NonZeroU64);

impl CandidateId {
    /// Sentinel value used by callers building a draft [`crate::model::CandidateRow`]
    /// for insertion; storage implementations mint the real id and echo it
    /// back on the returned row rather than trusting this value.
    pub const PLACEHOLDER: Self = Self(NonZeroU64::MIN);

    /// Creates a new candidate identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a candidate identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

// ============================================================================
// SECTION: Opaque String Identifiers
// ============================================================================

/// Declares an opaque, string-backed identifier newtype with the standard
/// display/conversion impls used throughout this crate.
macro_rules! string_identifier {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        ///
        /// # Invariants
        /// - Opaque UTF-8 string; no normalization or validation is applied by
        ///   this type.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from an owned or borrowed string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the owned string.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_identifier!(FragmentId, "Transcript fragment identifier (owned by interview ingestion).");
string_identifier!(SessionId, "Operator session identifier (`X-Session-ID`).");
string_identifier!(RequestId, "Per-request correlation identifier.");
string_identifier!(IdempotencyKey, "Client-supplied idempotency key (`X-Idempotency-Key`).");
string_identifier!(InterviewId, "Source interview identifier.");

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
    fn numeric_identifier_round_trips_through_json() {
        let id = ProjectId::from_raw(7).expect("non-zero");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "7");
        let back: ProjectId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn zero_is_rejected_for_numeric_identifiers() {
        assert!(ProjectId::from_raw(0).is_none());
        assert!(CodeId::from_raw(0).is_none());
        assert!(CandidateId::from_raw(0).is_none());
    }

    #[test]
    fn string_identifier_preserves_case() {
        let fragment = FragmentId::from("F-0001");
        assert_eq!(fragment.as_str(), "F-0001");
        assert_eq!(fragment.to_string(), "F-0001");
    }
}
