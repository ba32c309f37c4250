// crates/upgrade-guard-config/src/lib.rs
// ============================================================================
// Module: Upgrade Guard Config Library
// Description: Engine configuration model, validation, and contract loading.
// Purpose: Single source of truth for upgrade-guard.toml semantics.
// Dependencies: upgrade-guard-core, upgrade-guard-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `upgrade-guard-config` defines the configuration model for the upgrade
//! guard host. It provides strict, fail-closed validation, conversion into
//! the immutable engine configurations, contract policy loading, and a
//! canonical example configuration.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod contract;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use contract::ContractLoad;
pub use contract::load_contract;
pub use contract::parse_contract;
pub use examples::config_toml_example;
pub use examples::contract_toml_example;
