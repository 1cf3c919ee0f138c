// crates/handle-service-server/src/audit.rs
// ============================================================================
// Module: Tracing Audit Sink
// Description: Emits handle audit events through `tracing`.
// Purpose: Route engine audit records into the process log pipeline.
// Dependencies: handle-service-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! Each [`HandleAuditEvent`] is serialized to one JSON object and logged on
//! the `handle_service::audit` target. Refusals and unexpected parameters are
//! logged at `warn`, everything else at `info`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use handle_service_core::AuditOutcome;
use handle_service_core::HandleAuditEvent;
use handle_service_core::HandleAuditSink;

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Audit sink writing JSON events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl HandleAuditSink for TracingAuditSink {
    fn record(&self, event: &HandleAuditEvent) {
        let payload = serde_json::to_string(event)
            .unwrap_or_else(|_| format!("{{\"event\":\"{}\"}}", event.event.as_str()));
        match event.outcome {
            AuditOutcome::Allow => {
                tracing::info!(target: "handle_service::audit", event = event.event.as_str(), "{payload}");
            }
            AuditOutcome::Deny | AuditOutcome::Notice => {
                tracing::warn!(target: "handle_service::audit", event = event.event.as_str(), "{payload}");
            }
        }
    }
}
