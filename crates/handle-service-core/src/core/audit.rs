// crates/handle-service-core/src/core/audit.rs
// ============================================================================
// Module: Handle Audit Events
// Description: Structured audit records for lifecycle and authorization events.
// Purpose: Give hosts a stable, serializable event shape for log sinks.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The runtime reports every lifecycle mutation, ownership rejection, admin
//! check, and tolerated-but-unexpected parameter as a [`HandleAuditEvent`].
//! Events never carry raw credentials; callers are labelled by user id and
//! a SHA-256 token fingerprint.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::identifiers::Credential;
use crate::core::identifiers::HandleId;
use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Event Kinds
// ============================================================================

/// Audit event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// A handle was inserted or updated.
    HandlePersisted,
    /// A lifecycle mutation was refused.
    HandleRejected,
    /// A batch of handles was removed.
    HandlesDeleted,
    /// A request carried keys outside the expected set.
    UnexpectedParameter,
    /// Read access was granted on remote nodes.
    ReadAclGranted,
    /// An administrative privilege check was evaluated.
    AdminCheck,
}

impl AuditEventKind {
    /// Returns the stable event label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HandlePersisted => "handle_persisted",
            Self::HandleRejected => "handle_rejected",
            Self::HandlesDeleted => "handles_deleted",
            Self::UnexpectedParameter => "unexpected_parameter",
            Self::ReadAclGranted => "read_acl_granted",
            Self::AdminCheck => "admin_check",
        }
    }
}

/// Outcome attached to an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The operation went ahead.
    Allow,
    /// The operation was refused.
    Deny,
    /// Informational only; the operation continued.
    Notice,
}

// ============================================================================
// SECTION: Audit Event
// ============================================================================

/// Structured audit record emitted by the handle runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandleAuditEvent {
    /// Event category.
    pub event: AuditEventKind,
    /// Decision outcome.
    pub outcome: AuditOutcome,
    /// Operation name that produced the event.
    pub operation: &'static str,
    /// Acting user, when known.
    pub subject: Option<UserId>,
    /// SHA-256 fingerprint of the acting credential, when known.
    pub token_fingerprint: Option<String>,
    /// Handle ids affected by the operation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hids: Vec<HandleId>,
    /// Free-form detail (reason, mode, or offending key).
    pub detail: Option<String>,
}

impl HandleAuditEvent {
    /// Creates an event with no subject or detail.
    #[must_use]
    pub const fn new(event: AuditEventKind, outcome: AuditOutcome, operation: &'static str) -> Self {
        Self {
            event,
            outcome,
            operation,
            subject: None,
            token_fingerprint: None,
            hids: Vec::new(),
            detail: None,
        }
    }

    /// Attaches the acting user and credential fingerprint.
    #[must_use]
    pub fn with_caller(mut self, user_id: &UserId, credential: &Credential) -> Self {
        self.subject = Some(user_id.clone());
        self.token_fingerprint = Some(credential.fingerprint());
        self
    }

    /// Attaches the affected handle ids.
    #[must_use]
    pub fn with_hids(mut self, hids: impl IntoIterator<Item = HandleId>) -> Self {
        self.hids = hids.into_iter().collect();
        self
    }

    /// Attaches a detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
