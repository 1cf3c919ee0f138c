// crates/handle-service-core/src/runtime/engine.rs
// ============================================================================
// Module: Handle Lifecycle Engine
// Description: Persist, fetch, delete, and authorization-mediation operations.
// Purpose: Apply every handle operation through one backend-agnostic engine.
// Dependencies: crate::{core, interfaces, runtime}, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`HandleService`] owns the lifecycle rules for handle records and mediates
//! access checks against the remote object store. Every surface (JSON-RPC,
//! CLI import, tests) calls into the same engine so ownership and validation
//! rules cannot drift between entry points.
//!
//! Security posture: callers are authenticated before any operation that
//! mutates records or talks to the remote store. Only the credential
//! fingerprint ever reaches audit output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::AuditEventKind;
use crate::core::AuditOutcome;
use crate::core::Caller;
use crate::core::Credential;
use crate::core::Handle;
use crate::core::HandleAuditEvent;
use crate::core::HandleField;
use crate::core::HandleId;
use crate::core::NodeId;
use crate::core::RoleGrant;
use crate::core::UserId;
use crate::core::ValidationError;
use crate::interfaces::Clock;
use crate::interfaces::GatewayError;
use crate::interfaces::HandleAuditSink;
use crate::interfaces::HandleStore;
use crate::interfaces::IdentityError;
use crate::interfaces::IdentityService;
use crate::interfaces::ObjectStoreGateway;
use crate::interfaces::Projection;
use crate::interfaces::ReadPrincipal;
use crate::interfaces::StoreError;
use crate::runtime::cache::AuthorizationCache;
use crate::runtime::cache::DEFAULT_CACHE_CAPACITY;
use crate::runtime::cache::DEFAULT_CACHE_TTL_MILLIS;
use crate::runtime::normalize::normalize_payload;
use crate::runtime::params::FetchRequest;
use crate::runtime::params::HandleRef;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Roles that grant administrative operations.
    pub admin_roles: BTreeSet<String>,
    /// Service credential used for ACL grants; the caller's own is used when unset.
    pub service_credential: Option<Credential>,
    /// Authorization cache capacity.
    pub cache_capacity: usize,
    /// Authorization cache time-to-live in milliseconds.
    pub cache_ttl_millis: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            admin_roles: BTreeSet::new(),
            service_credential: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl_millis: DEFAULT_CACHE_TTL_MILLIS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures from backends the engine depends on.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Handle store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Remote object store failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Identity service failure.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Handle service errors.
#[derive(Debug, Error)]
pub enum HandleServiceError {
    /// Caller input was malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Caller does not own the records it tried to change.
    #[error("ownership check failed: {0}")]
    Ownership(String),
    /// A handle names a backend the engine cannot mediate.
    #[error("unsupported backend type: {0}")]
    UnsupportedBackend(String),
    /// Caller is unauthenticated or lacks the required privilege.
    #[error("not authorized: {0}")]
    Authorization(String),
    /// A dependency failed.
    #[error("upstream failure: {0}")]
    Upstream(#[from] UpstreamError),
}

impl From<StoreError> for HandleServiceError {
    fn from(error: StoreError) -> Self {
        Self::Upstream(UpstreamError::Store(error))
    }
}

impl From<GatewayError> for HandleServiceError {
    fn from(error: GatewayError) -> Self {
        Self::Upstream(UpstreamError::Gateway(error))
    }
}

impl From<IdentityError> for HandleServiceError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::InvalidCredential(reason) => Self::Authorization(reason),
            other => Self::Upstream(UpstreamError::Identity(other)),
        }
    }
}

// ============================================================================
// SECTION: Status
// ============================================================================

/// Service health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    /// Health state label.
    pub state: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Service version.
    pub version: &'static str,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Handle lifecycle and authorization-mediation engine.
pub struct HandleService<S, G, I> {
    /// Handle record store.
    store: S,
    /// Remote object store gateway.
    gateway: G,
    /// Identity service.
    identity: I,
    /// Wall-clock source.
    clock: Arc<dyn Clock + Send + Sync>,
    /// Audit sink.
    audit: Arc<dyn HandleAuditSink + Send + Sync>,
    /// Role grant cache for admin checks.
    cache: AuthorizationCache,
    /// Engine configuration.
    config: LifecycleConfig,
}

impl<S, G, I> HandleService<S, G, I>
where
    S: HandleStore,
    G: ObjectStoreGateway,
    I: IdentityService,
{
    /// Creates a new engine.
    #[must_use]
    pub fn new(
        store: S,
        gateway: G,
        identity: I,
        clock: Arc<dyn Clock + Send + Sync>,
        audit: Arc<dyn HandleAuditSink + Send + Sync>,
        config: LifecycleConfig,
    ) -> Self {
        let cache = AuthorizationCache::new(config.cache_capacity, config.cache_ttl_millis);
        Self { store, gateway, identity, clock, audit, cache, config }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Reports service health.
    #[must_use]
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            state: "OK",
            message: String::new(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    // ------------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------------

    /// Resolves a presented credential to a caller.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::Authorization`] when the credential is
    /// missing, blank, or rejected, and [`HandleServiceError::Upstream`] when
    /// the identity service fails.
    pub fn authenticate(
        &self,
        credential: Option<Credential>,
    ) -> Result<Caller, HandleServiceError> {
        let Some(credential) = credential.filter(|credential| !credential.is_blank()) else {
            return Err(HandleServiceError::Authorization("credential required".to_string()));
        };
        let user_id = self.identity.resolve_user(&credential)?;
        Ok(Caller::new(user_id, credential))
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Creates or updates a handle from a raw payload and returns its id.
    ///
    /// An owner update replaces the stored record with the normalized payload.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::Validation`] for malformed payloads and
    /// [`HandleServiceError::Ownership`] when an existing record belongs to
    /// someone else.
    pub fn persist_handle(
        &self,
        caller: &Caller,
        payload: &Value,
    ) -> Result<HandleId, HandleServiceError> {
        let handle = normalize_payload(payload, &caller.user_id, self.clock.now_millis())?;
        let existing = self.hids_to_handles(std::slice::from_ref(&handle.hid))?;
        if let Some(stored) = existing.into_iter().next() {
            if stored.created_by != caller.user_id || handle.created_by != caller.user_id {
                self.audit(
                    HandleAuditEvent::new(
                        AuditEventKind::HandleRejected,
                        AuditOutcome::Deny,
                        "persist_handle",
                    )
                    .with_caller(&caller.user_id, &caller.credential)
                    .with_hids([handle.hid.clone()])
                    .with_detail("caller does not own the stored record"),
                );
                return Err(HandleServiceError::Ownership(format!(
                    "user {} may not update handle {} created by {}",
                    caller.user_id, handle.hid, stored.created_by
                )));
            }
            self.store.update(&handle)?;
            self.audit_persisted(caller, &handle.hid, "update");
        } else {
            self.store.insert(&handle)?;
            self.audit_persisted(caller, &handle.hid, "insert");
        }
        Ok(handle.hid)
    }

    /// Inserts a handle only when its id is not already stored.
    ///
    /// Returns `false` when a record with the same id exists. Used by bulk
    /// import, which keeps the creator recorded in the source data.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::Upstream`] when the store fails.
    pub fn insert_if_absent(&self, handle: &Handle) -> Result<bool, HandleServiceError> {
        if !self.hids_to_handles(std::slice::from_ref(&handle.hid))?.is_empty() {
            return Ok(false);
        }
        self.store.insert(handle)?;
        Ok(true)
    }

    /// Returns every handle whose requested field matches one of the values.
    ///
    /// Unrecognized field names match nothing. Unexpected parameter keys are
    /// reported to the audit sink and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::Upstream`] when the store fails.
    pub fn fetch_handles_by(
        &self,
        request: &FetchRequest,
    ) -> Result<Vec<Handle>, HandleServiceError> {
        for key in &request.unexpected_keys {
            self.audit(
                HandleAuditEvent::new(
                    AuditEventKind::UnexpectedParameter,
                    AuditOutcome::Notice,
                    "fetch_handles_by",
                )
                .with_detail(key.clone()),
            );
        }
        match request.field() {
            Some(field) => self.find(field, &request.elements),
            None => Ok(Vec::new()),
        }
    }

    /// Returns the handles referencing any of the given remote node ids.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::Upstream`] when the store fails.
    pub fn ids_to_handles(&self, ids: &[NodeId]) -> Result<Vec<Handle>, HandleServiceError> {
        let values = ids.iter().map(|id| id.as_str().to_string()).collect();
        self.find(HandleField::Id, &values)
    }

    /// Returns the handles with any of the given handle ids.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::Upstream`] when the store fails.
    pub fn hids_to_handles(&self, hids: &[HandleId]) -> Result<Vec<Handle>, HandleServiceError> {
        let values = hids.iter().map(|hid| hid.as_str().to_string()).collect();
        self.find(HandleField::Hid, &values)
    }

    /// Deletes a batch of handles created by the caller and returns the
    /// number actually removed.
    ///
    /// The batch must be non-empty and every submitted and stored record must
    /// name the caller as creator; otherwise nothing is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::Ownership`] when any record belongs to
    /// someone else.
    pub fn delete_handles(
        &self,
        caller: &Caller,
        records: &[HandleRef],
    ) -> Result<u64, HandleServiceError> {
        let creators: BTreeSet<Option<&UserId>> =
            records.iter().map(|record| record.created_by.as_ref()).collect();
        let hids: BTreeSet<HandleId> = records.iter().map(|record| record.hid.clone()).collect();
        let submitted_ok = creators.len() == 1 && creators.contains(&Some(&caller.user_id));
        let stored_ok = submitted_ok && {
            let hid_list: Vec<HandleId> = hids.iter().cloned().collect();
            self.hids_to_handles(&hid_list)?
                .iter()
                .all(|stored| stored.created_by == caller.user_id)
        };
        if !stored_ok {
            self.audit(
                HandleAuditEvent::new(
                    AuditEventKind::HandleRejected,
                    AuditOutcome::Deny,
                    "delete_handles",
                )
                .with_caller(&caller.user_id, &caller.credential)
                .with_hids(hids)
                .with_detail("batch contains handles not created by caller"),
            );
            return Err(HandleServiceError::Ownership(format!(
                "user {} may only delete handles they created",
                caller.user_id
            )));
        }
        let deleted = self.store.delete_by_hids(&hids)?;
        self.audit(
            HandleAuditEvent::new(
                AuditEventKind::HandlesDeleted,
                AuditOutcome::Allow,
                "delete_handles",
            )
            .with_caller(&caller.user_id, &caller.credential)
            .with_hids(hids)
            .with_detail(format!("deleted {deleted}")),
        );
        Ok(deleted)
    }

    // ------------------------------------------------------------------------
    // Authorization Mediation
    // ------------------------------------------------------------------------

    /// Returns true when the caller owns every remote node referenced by the
    /// given handles. Unknown handle ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::UnsupportedBackend`] when a handle names
    /// an unsupported backend, or [`HandleServiceError::Upstream`] when the
    /// remote store fails.
    pub fn is_owner(&self, caller: &Caller, hids: &[HandleId]) -> Result<bool, HandleServiceError> {
        let handles = self.supported_handles(hids)?;
        for handle in &handles {
            let owner = self.gateway.node_owner(&handle.id, &caller.credential)?;
            if owner != caller.user_id {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns true when every referenced remote node is readable by the
    /// caller. Unknown handle ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::UnsupportedBackend`] when a handle names
    /// an unsupported backend, or [`HandleServiceError::Upstream`] when the
    /// remote store fails.
    pub fn are_readable(
        &self,
        caller: &Caller,
        hids: &[HandleId],
    ) -> Result<bool, HandleServiceError> {
        let handles = self.supported_handles(hids)?;
        for handle in &handles {
            if !self.gateway.is_readable(&handle.id, &caller.credential)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns true when the node behind a single handle is readable by the
    /// caller. An unknown handle id is not readable.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::UnsupportedBackend`] when the handle
    /// names an unsupported backend, or [`HandleServiceError::Upstream`] when
    /// the remote store fails.
    pub fn is_readable(&self, caller: &Caller, hid: &HandleId) -> Result<bool, HandleServiceError> {
        let handles = self.supported_handles(std::slice::from_ref(hid))?;
        match handles.first() {
            Some(handle) => Ok(self.gateway.is_readable(&handle.id, &caller.credential)?),
            None => Ok(false),
        }
    }

    /// Grants read access on every referenced node to `username`, or to
    /// everyone when no username is given. Requires an admin role.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::Authorization`] when the caller is not
    /// an administrator, [`HandleServiceError::UnsupportedBackend`] when a
    /// handle names an unsupported backend, or
    /// [`HandleServiceError::Upstream`] when a dependency fails.
    pub fn add_read_acl(
        &self,
        caller: &Caller,
        hids: &[HandleId],
        username: Option<UserId>,
    ) -> Result<bool, HandleServiceError> {
        self.require_admin(caller, "add_read_acl")?;
        let principal = username.map_or(ReadPrincipal::Public, ReadPrincipal::User);
        self.grant_read(caller, hids, principal, "add_read_acl")
    }

    /// Makes every referenced node world-readable. Requires an admin role.
    ///
    /// # Errors
    ///
    /// Same as [`HandleService::add_read_acl`].
    pub fn set_public_read(
        &self,
        caller: &Caller,
        hids: &[HandleId],
    ) -> Result<bool, HandleServiceError> {
        self.require_admin(caller, "set_public_read")?;
        self.grant_read(caller, hids, ReadPrincipal::Public, "set_public_read")
    }

    /// Returns true when the caller holds one of the configured admin roles.
    ///
    /// Role lookups go through the authorization cache.
    ///
    /// # Errors
    ///
    /// Returns [`HandleServiceError::Upstream`] when the identity service
    /// fails.
    pub fn is_admin(&self, caller: &Caller) -> Result<bool, HandleServiceError> {
        let (grant, _) = self.resolve_roles(&caller.credential)?;
        Ok(grant.intersects(&self.config.admin_roles))
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Runs a field lookup with the public projection.
    fn find(
        &self,
        field: HandleField,
        values: &BTreeSet<String>,
    ) -> Result<Vec<Handle>, HandleServiceError> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let stored = self.store.find_by_field(field, values, Projection::Public)?;
        Ok(stored.into_iter().map(|record| record.handle).collect())
    }

    /// Loads handles and rejects the batch when any names an unsupported backend.
    fn supported_handles(&self, hids: &[HandleId]) -> Result<Vec<Handle>, HandleServiceError> {
        let handles = self.hids_to_handles(hids)?;
        if let Some(unsupported) = handles.iter().find(|handle| handle.backend().is_none()) {
            return Err(HandleServiceError::UnsupportedBackend(format!(
                "handle {} has type {}",
                unsupported.hid, unsupported.backend_type
            )));
        }
        Ok(handles)
    }

    /// Applies a read grant to every referenced node.
    fn grant_read(
        &self,
        caller: &Caller,
        hids: &[HandleId],
        principal: ReadPrincipal,
        operation: &'static str,
    ) -> Result<bool, HandleServiceError> {
        let handles = self.supported_handles(hids)?;
        let acting = self.config.service_credential.as_ref().unwrap_or(&caller.credential);
        for handle in &handles {
            self.gateway.grant_read(&handle.id, &principal, acting)?;
        }
        let detail = match &principal {
            ReadPrincipal::User(user) => format!("user {user}"),
            ReadPrincipal::Public => "public".to_string(),
        };
        self.audit(
            HandleAuditEvent::new(
                AuditEventKind::ReadAclGranted,
                AuditOutcome::Allow,
                operation,
            )
            .with_caller(&caller.user_id, &caller.credential)
            .with_hids(handles.into_iter().map(|handle| handle.hid))
            .with_detail(detail),
        );
        Ok(true)
    }

    /// Fails unless the caller holds an admin role.
    fn require_admin(
        &self,
        caller: &Caller,
        operation: &'static str,
    ) -> Result<(), HandleServiceError> {
        let (grant, cache_hit) = self.resolve_roles(&caller.credential)?;
        let allowed = grant.intersects(&self.config.admin_roles);
        let outcome = if allowed { AuditOutcome::Allow } else { AuditOutcome::Deny };
        self.audit(
            HandleAuditEvent::new(AuditEventKind::AdminCheck, outcome, operation)
                .with_caller(&caller.user_id, &caller.credential)
                .with_detail(if cache_hit { "cache hit" } else { "cache miss" }),
        );
        if allowed {
            Ok(())
        } else {
            Err(HandleServiceError::Authorization(format!(
                "user {} may not run {operation} method",
                caller.user_id
            )))
        }
    }

    /// Returns cached roles, resolving and caching them on a miss. The flag
    /// is true when the cache answered.
    fn resolve_roles(
        &self,
        credential: &Credential,
    ) -> Result<(RoleGrant, bool), HandleServiceError> {
        let now = self.clock.now_millis();
        if let Some(grant) = self.cache.get(credential, now) {
            return Ok((grant, true));
        }
        let grant = self.identity.resolve_roles(credential)?;
        self.cache.put(credential, grant.clone(), now);
        Ok((grant, false))
    }

    /// Records a successful persist.
    fn audit_persisted(&self, caller: &Caller, hid: &HandleId, mode: &str) {
        self.audit(
            HandleAuditEvent::new(
                AuditEventKind::HandlePersisted,
                AuditOutcome::Allow,
                "persist_handle",
            )
            .with_caller(&caller.user_id, &caller.credential)
            .with_hids([hid.clone()])
            .with_detail(mode),
        );
    }

    /// Forwards an event to the audit sink.
    fn audit(&self, event: HandleAuditEvent) {
        self.audit.record(&event);
    }
}
