// crates/upgrade-guard-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Outcome Store
// Description: Durable OutcomeRepository backend using SQLite WAL.
// Purpose: Persist the historical-outcome log across runs.
// Dependencies: upgrade-guard-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`OutcomeRepository`] that stores one
//! canonical JSON row per recorded update outcome. Rows are only ever
//! inserted; loads verify each row's digest and fail closed on corruption.
//!
//! [`OutcomeRepository`]: upgrade_guard_core::OutcomeRepository

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_OUTCOME_BYTES;
pub use store::SqliteOutcomeStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
