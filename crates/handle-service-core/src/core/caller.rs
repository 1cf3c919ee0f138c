// crates/handle-service-core/src/core/caller.rs
// ============================================================================
// Module: Caller Identity
// Description: Authenticated caller context and resolved role grants.
// Purpose: Carry the acting identity through lifecycle operations.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Caller`] is produced once per request by authenticating a credential.
//! The runtime threads it through every operation that checks ownership or
//! calls the remote store on the caller's behalf.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::Credential;
use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Caller
// ============================================================================

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Resolved user identity.
    pub user_id: UserId,
    /// Credential presented by the caller.
    pub credential: Credential,
}

impl Caller {
    /// Creates a caller context.
    #[must_use]
    pub const fn new(user_id: UserId, credential: Credential) -> Self {
        Self { user_id, credential }
    }
}

// ============================================================================
// SECTION: Role Grants
// ============================================================================

/// Role set resolved for a credential.
///
/// # Invariants
/// - `expires_at` is the credential's own expiry in unix milliseconds, when
///   the identity service reports one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Custom roles held by the credential owner.
    pub roles: BTreeSet<String>,
    /// Credential expiry (unix millis).
    pub expires_at: Option<i64>,
}

impl RoleGrant {
    /// Creates a grant from role names.
    #[must_use]
    pub fn new(roles: impl IntoIterator<Item = String>, expires_at: Option<i64>) -> Self {
        Self { roles: roles.into_iter().collect(), expires_at }
    }

    /// Returns true when any held role is in `admin_roles`.
    #[must_use]
    pub fn intersects(&self, admin_roles: &BTreeSet<String>) -> bool {
        self.roles.iter().any(|role| admin_roles.contains(role))
    }

    /// Returns true when the credential has expired at `now_millis`.
    #[must_use]
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now_millis)
    }
}
