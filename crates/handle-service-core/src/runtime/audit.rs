// crates/handle-service-core/src/runtime/audit.rs
// ============================================================================
// Module: Audit Sinks
// Description: Built-in audit sinks for silent and recorded operation.
// Purpose: Provide sinks for hosts that do not log and for test assertions.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Production hosts plug in a logging sink; these two cover the remaining
//! cases. [`RecordingAuditSink`] keeps every event for later inspection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::core::AuditEventKind;
use crate::core::HandleAuditEvent;
use crate::interfaces::HandleAuditSink;

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl HandleAuditSink for NoopAuditSink {
    fn record(&self, _event: &HandleAuditEvent) {}
}

/// Audit sink that keeps events in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingAuditSink {
    /// Recorded events in arrival order.
    events: Arc<Mutex<Vec<HandleAuditEvent>>>,
}

impl RecordingAuditSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<HandleAuditEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the recorded events of one kind.
    #[must_use]
    pub fn events_of(&self, kind: AuditEventKind) -> Vec<HandleAuditEvent> {
        self.events().into_iter().filter(|event| event.event == kind).collect()
    }
}

impl HandleAuditSink for RecordingAuditSink {
    fn record(&self, event: &HandleAuditEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}
