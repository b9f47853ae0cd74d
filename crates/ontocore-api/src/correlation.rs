// crates/ontocore-api/src/correlation.rs
// ============================================================================
// Module: Request Correlation
// Description: Boot-scoped generation of per-request correlation identifiers.
// Purpose: Give every request.start/request.end log line and audit entry a
//          unique, cheaply generated id without a UUID dependency.
// Dependencies: rand, ontocore-core
// ============================================================================

//! ## Overview
//! Carried over from `decision-gate-mcp`'s `CorrelationIdGenerator`: a
//! random 64-bit boot id plus a monotonic per-process counter, formatted
//! as `{prefix}-{boot_id:016x}-{counter:016x}`. Unique within the process
//! lifetime, which is all a `request_id` needs to be.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use ontocore_core::identifiers::RequestId;
use rand::RngCore;
use rand::rngs::OsRng;

/// Boot-scoped [`RequestId`] generator.
#[derive(Debug)]
pub struct RequestIdGenerator {
    /// Prefix included in every generated id.
    prefix: &'static str,
    /// Boot-scoped random identifier for entropy.
    boot_id: u64,
    /// Monotonic counter for ids issued in this process.
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Creates a new generator with the given prefix.
    #[must_use]
    pub fn new(prefix: &'static str) -> Self {
        let mut bytes = [0_u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self { prefix, boot_id: u64::from_be_bytes(bytes), counter: AtomicU64::new(1) }
    }

    /// Issues a new [`RequestId`].
    #[must_use]
    pub fn issue(&self) -> RequestId {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        RequestId::new(format!("{}-{:016x}-{:016x}", self.prefix, self.boot_id, seq))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new("req")
    }
}
