// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for ontocore system-tests.
// Purpose: Provide a server harness, graph-store stub, and fixtures reused
//          by every scenario and property test.
// Dependencies: system-tests
// ============================================================================

#![allow(dead_code, reason = "Shared helpers are reused across multiple test binaries.")]

pub mod fixtures;
pub mod graph_stub;
pub mod harness;
