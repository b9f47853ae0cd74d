// crates/ontocore-core/src/hashing.rs
// ============================================================================
// Module: Ontocore Hashing
// Description: Canonical JSON hashing for idempotency keys and integrity checks.
// Purpose: Give identical logical payloads an identical digest regardless of
//          field ordering.
// Dependencies: serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Mirrors the teacher's `decision-gate-core::hashing` module (used by
//! `decision-gate-store-sqlite` for row integrity and by
//! `decision-gate-broker` for payload hash verification): JSON values are
//! canonicalized per RFC 8785 (JCS) before hashing so two requests that
//! differ only in key order or whitespace hash identically.

use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

/// Errors raised while canonicalizing or hashing a JSON value.
#[derive(Debug, Error)]
pub enum HashError {
    /// The value could not be canonicalized (e.g. contained `NaN`).
    #[error("canonicalization failed: {0}")]
    Canonicalize(String),
}

/// Hash algorithm identifier, stored alongside digests for forward
/// compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Returns a stable label for the algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

/// The default algorithm used when none is specified.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// A hex-encoded digest paired with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashDigest {
    /// Algorithm used.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

/// Hashes raw bytes with the given algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let digest = Sha256::digest(bytes);
            HashDigest {
                algorithm,
                value: hex_encode(&digest),
            }
        }
    }
}

/// Canonicalizes a JSON value to its JCS byte form.
///
/// # Errors
/// Returns [`HashError::Canonicalize`] when `value` cannot be canonicalized
/// (e.g. it contains a non-finite float).
pub fn canonical_json_bytes(value: &serde_json::Value) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_string(value).map(String::into_bytes).map_err(|err| HashError::Canonicalize(err.to_string()))
}

/// Hashes a JSON value after canonicalizing it.
///
/// # Errors
/// Returns [`HashError::Canonicalize`] when `value` cannot be canonicalized.
pub fn hash_canonical_json(
    algorithm: HashAlgorithm,
    value: &serde_json::Value,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Derives a stable request fingerprint from an operation name and its
/// logical request body, used to detect idempotency-key reuse against a
/// differing payload.
///
/// # Errors
/// Returns [`HashError::Canonicalize`] when `body` cannot be canonicalized.
pub fn request_fingerprint(
    operation: &str,
    body: &serde_json::Value,
) -> Result<HashDigest, HashError> {
    let envelope = serde_json::json!({ "operation": operation, "body": body });
    hash_canonical_json(DEFAULT_HASH_ALGORITHM, &envelope)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
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
    fn canonical_hash_ignores_key_order() {
        let a = serde_json::json!({ "b": 2, "a": 1 });
        let b = serde_json::json!({ "a": 1, "b": 2 });
        let digest_a = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &a).expect("hash a");
        let digest_b = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &b).expect("hash b");
        assert_eq!(digest_a.value, digest_b.value);
    }

    #[test]
    fn request_fingerprint_distinguishes_payloads() {
        let a = request_fingerprint("merge_ids", &serde_json::json!({ "target": "x" }))
            .expect("hash a");
        let b = request_fingerprint("merge_ids", &serde_json::json!({ "target": "y" }))
            .expect("hash b");
        assert_ne!(a.value, b.value);
    }
}
