// crates/handle-service-providers/src/lib.rs
// ============================================================================
// Module: Handle Service Providers
// Description: HTTP implementations of the remote object store and identity ports.
// Purpose: Connect the lifecycle engine to Shock and KBase auth2.
// Dependencies: handle-service-core, reqwest, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate ships the production backends the lifecycle engine reaches over
//! the network: [`ShockGateway`] for the Shock node API and
//! [`KBaseAuthClient`] for the KBase auth2 token and profile endpoints. Both
//! share the bounded blocking client in [`http`].
//! Invariants:
//! - Redirects are never followed.
//! - Response bodies are read under a hard size limit.
//! - Cleartext `http://` endpoints require an explicit opt-in.
//!
//! Security posture: remote responses are untrusted and are parsed into typed
//! values before they reach the engine.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod http;
pub mod kbase_auth;
pub mod shock;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use http::HttpClientConfig;
pub use http::HttpError;
pub use kbase_auth::KBaseAuthClient;
pub use kbase_auth::KBaseAuthConfig;
pub use shock::ShockConfig;
pub use shock::ShockGateway;
