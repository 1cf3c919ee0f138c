// crates/handle-service-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Handle Store
// Description: Durable HandleStore backend using SQLite.
// Purpose: Provide production persistence for handle records.
// Dependencies: handle-service-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`HandleStore`] implementation. Each
//! handle is one row keyed by its handle id; the row id doubles as the
//! internal storage key exposed only through
//! [`handle_service_core::Projection::WithStorageKey`].
//!
//! [`HandleStore`]: handle_service_core::HandleStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteHandleStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
