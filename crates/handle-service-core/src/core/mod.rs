// crates/handle-service-core/src/core/mod.rs
// ============================================================================
// Module: Handle Service Core Types
// Description: Canonical handle records, identifiers, and audit shapes.
// Purpose: Provide stable, serializable types shared by every service surface.
// Dependencies: serde, sha2, thiserror, time, uuid
// ============================================================================

//! ## Overview
//! Core types define the handle record and the identities that act on it.
//! These types are the source of truth for the storage schema and the
//! JSON-RPC surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod caller;
pub mod handle;
pub mod identifiers;
pub mod timestamp;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditEventKind;
pub use audit::AuditOutcome;
pub use audit::HandleAuditEvent;
pub use caller::Caller;
pub use caller::RoleGrant;
pub use handle::BackendKind;
pub use handle::Handle;
pub use handle::HandleField;
pub use identifiers::Credential;
pub use identifiers::HandleId;
pub use identifiers::NodeId;
pub use identifiers::UserId;
pub use timestamp::format_creation_date;
pub use validation::ValidationError;
