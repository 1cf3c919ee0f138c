// crates/handle-service-core/src/runtime/mod.rs
// ============================================================================
// Module: Handle Service Runtime
// Description: Lifecycle engine, normalizer, cache, and in-memory backends.
// Purpose: Execute handle operations against injected backends.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the handle lifecycle, request parsing, and the
//! authorization cache. In-memory backends live here too so every host and
//! test drives the same engine code.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod cache;
pub mod clock;
pub mod engine;
pub mod memory;
pub mod normalize;
pub mod params;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::NoopAuditSink;
pub use audit::RecordingAuditSink;
pub use cache::AuthorizationCache;
pub use cache::DEFAULT_CACHE_CAPACITY;
pub use cache::DEFAULT_CACHE_TTL_MILLIS;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use engine::HandleService;
pub use engine::HandleServiceError;
pub use engine::LifecycleConfig;
pub use engine::ServiceStatus;
pub use engine::UpstreamError;
pub use memory::GrantRecord;
pub use memory::InMemoryObjectStore;
pub use memory::MemoryNode;
pub use memory::StaticIdentityService;
pub use normalize::HandleDraft;
pub use normalize::normalize_handle;
pub use normalize::normalize_payload;
pub use params::FetchRequest;
pub use params::HandleRef;
pub use params::parse_hid;
pub use params::parse_hid_list;
pub use params::parse_string_list;
pub use store::InMemoryHandleStore;
pub use store::SharedHandleStore;
