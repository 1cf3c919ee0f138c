// crates/handle-service-server/src/lib.rs
// ============================================================================
// Module: Handle Service Server
// Description: JSON-RPC surface, backend wiring, and tracing audit sink.
// Purpose: Expose the handle lifecycle engine over HTTP.
// Dependencies: axum, tokio, tracing, handle-service-*
// ============================================================================

//! ## Overview
//! This crate turns a validated configuration into a running service:
//! [`build_service`] wires the store, Shock gateway, and auth2 client into the
//! engine, [`RpcRouter`] maps `AbstractHandle.*` methods onto engine calls,
//! and [`HandleServer`] serves them as KBase-style JSON-RPC 1.1 over HTTP.
//!
//! Security posture: request bodies are untrusted, size-limited, and parsed
//! into typed parameters before reaching the engine.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod rpc;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::TracingAuditSink;
pub use rpc::RpcError;
pub use rpc::RpcMethod;
pub use rpc::RpcRouter;
pub use server::HandleServer;
pub use server::ProductionService;
pub use server::ServerError;
pub use server::build_service;
pub use server::build_store;
