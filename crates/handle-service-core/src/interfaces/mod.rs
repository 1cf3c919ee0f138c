// crates/handle-service-core/src/interfaces/mod.rs
// ============================================================================
// Module: Handle Service Interfaces
// Description: Backend-agnostic ports for storage, remote store, and identity.
// Purpose: Define the seams between the lifecycle runtime and its backends.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The runtime reaches every external system through these traits. Storage,
//! the remote object store, the identity service, wall-clock time, and audit
//! logging are all injected, so the same engine runs against SQLite and real
//! HTTP services in production and against in-memory fakes in tests.
//!
//! Security posture: gateway and identity responses are untrusted input and
//! must be validated by implementations before they reach the runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use thiserror::Error;

use crate::core::Credential;
use crate::core::Handle;
use crate::core::HandleAuditEvent;
use crate::core::HandleField;
use crate::core::HandleId;
use crate::core::NodeId;
use crate::core::RoleGrant;
use crate::core::UserId;

// ============================================================================
// SECTION: Handle Store
// ============================================================================

/// Field projection applied to store reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Only the canonical handle fields.
    #[default]
    Public,
    /// Canonical fields plus the store's internal storage key.
    WithStorageKey,
}

/// Handle returned by a store read, with an optional internal storage key.
///
/// # Invariants
/// - `storage_key` is `None` unless [`Projection::WithStorageKey`] was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHandle {
    /// Internal storage key (never exposed to API callers).
    pub storage_key: Option<i64>,
    /// Stored handle record.
    pub handle: Handle,
}

/// Handle store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("handle store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("handle store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("handle store version mismatch: {0}")]
    VersionMismatch(String),
    /// Insert collided with an existing handle id.
    #[error("handle store conflict: {0}")]
    Conflict(String),
    /// Update targeted a handle id that is not stored.
    #[error("handle store missing record: {0}")]
    NotFound(String),
    /// Store reported an error.
    #[error("handle store error: {0}")]
    Store(String),
}

/// Persistent collection of handle records keyed by handle id.
pub trait HandleStore {
    /// Returns every record whose `field` equals one of `values`.
    ///
    /// Records with a null value for `field` never match.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_by_field(
        &self,
        field: HandleField,
        values: &BTreeSet<String>,
        projection: Projection,
    ) -> Result<Vec<StoredHandle>, StoreError>;

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the handle id already exists.
    fn insert(&self, handle: &Handle) -> Result<(), StoreError>;

    /// Replaces the record stored under `handle.hid`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no record has that handle id.
    fn update(&self, handle: &Handle) -> Result<(), StoreError>;

    /// Removes every record whose handle id is in `hids`.
    ///
    /// Returns the number of records actually removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_by_hids(&self, hids: &BTreeSet<HandleId>) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Object Store Gateway
// ============================================================================

/// Principal receiving read access on a remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadPrincipal {
    /// A single named user.
    User(UserId),
    /// Everyone (public read).
    Public,
}

/// Remote object store errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The remote store could not be reached.
    #[error("object store unavailable: {0}")]
    Unavailable(String),
    /// The remote store refused the request.
    #[error("object store rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code returned by the store.
        status: u16,
        /// Response summary.
        message: String,
    },
    /// The remote store returned a response that could not be interpreted.
    #[error("object store response malformed: {0}")]
    Malformed(String),
}

/// Gateway to the remote object store that owns referenced nodes.
pub trait ObjectStoreGateway {
    /// Returns the owner of `node` as seen with `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the owner cannot be determined.
    fn node_owner(&self, node: &NodeId, credential: &Credential) -> Result<UserId, GatewayError>;

    /// Returns whether `node` can be read with `credential`.
    ///
    /// A refusal from the store is reported as `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the store cannot be reached.
    fn is_readable(&self, node: &NodeId, credential: &Credential) -> Result<bool, GatewayError>;

    /// Grants read access on `node` to `principal`, acting as `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the grant is refused or fails.
    fn grant_read(
        &self,
        node: &NodeId,
        principal: &ReadPrincipal,
        credential: &Credential,
    ) -> Result<(), GatewayError>;
}

// ============================================================================
// SECTION: Identity Service
// ============================================================================

/// Identity service errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The credential is unknown, revoked, or expired.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    /// The identity service could not be reached.
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
    /// The identity service returned an unexpected response.
    #[error("identity service response malformed: {0}")]
    Malformed(String),
}

/// External identity service resolving credentials to users and roles.
pub trait IdentityService {
    /// Resolves the user identity behind `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when the credential cannot be resolved.
    fn resolve_user(&self, credential: &Credential) -> Result<UserId, IdentityError>;

    /// Resolves the role set and expiry for `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when the roles cannot be resolved.
    fn resolve_roles(&self, credential: &Credential) -> Result<RoleGrant, IdentityError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock source injected into the runtime.
pub trait Clock {
    /// Returns the current time as unix milliseconds.
    fn now_millis(&self) -> i64;
}

// ============================================================================
// SECTION: Audit Sink
// ============================================================================

/// Sink receiving structured audit events.
pub trait HandleAuditSink {
    /// Records an audit event.
    fn record(&self, event: &HandleAuditEvent);
}
