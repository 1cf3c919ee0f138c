// crates/handle-service-core/src/lib.rs
// ============================================================================
// Module: Handle Service Core Library
// Description: Public API surface for the handle service core.
// Purpose: Expose handle types, backend interfaces, and the lifecycle engine.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The handle service keeps a registry of small metadata records ("handles")
//! that point at objects held by a remote object store, and mediates
//! ownership, readability, and read-grant checks against that store.
//!
//! The core is backend-agnostic: storage, the remote store, the identity
//! service, wall-clock time, and audit logging are reached only through the
//! traits in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::Clock;
pub use interfaces::GatewayError;
pub use interfaces::HandleAuditSink;
pub use interfaces::HandleStore;
pub use interfaces::IdentityError;
pub use interfaces::IdentityService;
pub use interfaces::ObjectStoreGateway;
pub use interfaces::Projection;
pub use interfaces::ReadPrincipal;
pub use interfaces::StoreError;
pub use interfaces::StoredHandle;
pub use runtime::AuthorizationCache;
pub use runtime::FetchRequest;
pub use runtime::HandleRef;
pub use runtime::HandleService;
pub use runtime::HandleServiceError;
pub use runtime::InMemoryHandleStore;
pub use runtime::InMemoryObjectStore;
pub use runtime::LifecycleConfig;
pub use runtime::ManualClock;
pub use runtime::NoopAuditSink;
pub use runtime::RecordingAuditSink;
pub use runtime::ServiceStatus;
pub use runtime::SharedHandleStore;
pub use runtime::StaticIdentityService;
pub use runtime::SystemClock;
pub use runtime::UpstreamError;
