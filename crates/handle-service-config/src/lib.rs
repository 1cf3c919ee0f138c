// crates/handle-service-config/src/lib.rs
// ============================================================================
// Module: Handle Service Config
// Description: TOML configuration model with fail-closed validation.
// Purpose: Turn one operator file into typed backend and engine settings.
// Dependencies: handle-service-core, handle-service-providers, handle-service-store-sqlite, toml
// ============================================================================

//! ## Overview
//! Loads `handle-service.toml`, validates every section, and converts the
//! result into the configuration types the store, providers, and engine
//! expect. Invalid input is rejected at load time so a running service never
//! sees a half-valid configuration.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AuthConfig;
pub use config::ConfigError;
pub use config::HandleServiceConfig;
pub use config::ObjectStoreConfig;
pub use config::ServerConfig;
pub use config::StoreConfig;
pub use config::StoreType;
