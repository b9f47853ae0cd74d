// crates/ontocore-core/src/lib.rs
// ============================================================================
// Crate: ontocore-core
// Description: Domain model, trait seams and error taxonomy for the
//              identity & ontology core.
// Purpose: Shared foundation depended on by every other crate in the
//          workspace; no crate in this workspace depends on a concrete
//          storage or transport backend except through the traits here.
// Dependencies: async-trait, serde, serde_jcs, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! `ontocore-core` defines the identifiers, entities, trait seams and
//! error taxonomy shared by every other crate in this workspace. It has
//! no dependency on SQLite, HTTP, or any concrete transport: those live in
//! `ontocore-store-sqlite`, `ontocore-sync` and `ontocore-api`
//! respectively, and depend back on the traits defined here.

pub mod error;
pub mod hashing;
pub mod identifiers;
pub mod interfaces;
pub mod model;

pub use error::ErrorKind;
pub use error::OntoError;
