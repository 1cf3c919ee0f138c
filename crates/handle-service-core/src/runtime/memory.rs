// crates/handle-service-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Backends
// Description: In-memory identity service and remote object store.
// Purpose: Run the full lifecycle engine without network services.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`StaticIdentityService`] maps tokens to users and roles.
//! [`InMemoryObjectStore`] resolves credentials through the same identity
//! table and enforces owner/reader/public visibility the way the remote store
//! does. Both can be switched to an unavailable state to exercise upstream
//! failure paths, and both count their calls so cache behavior is observable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use crate::core::Credential;
use crate::core::NodeId;
use crate::core::RoleGrant;
use crate::core::UserId;
use crate::interfaces::GatewayError;
use crate::interfaces::IdentityError;
use crate::interfaces::IdentityService;
use crate::interfaces::ObjectStoreGateway;
use crate::interfaces::ReadPrincipal;

// ============================================================================
// SECTION: Identity Service
// ============================================================================

/// Account registered with the static identity service.
#[derive(Debug, Clone)]
struct StaticAccount {
    /// User identity behind the token.
    user: UserId,
    /// Roles and expiry reported for the token.
    grant: RoleGrant,
}

/// Mutable identity state.
#[derive(Debug, Default)]
struct IdentityState {
    /// Accounts keyed by raw token.
    accounts: BTreeMap<String, StaticAccount>,
    /// Number of role lookups served.
    role_lookups: u64,
    /// Whether lookups fail as unreachable.
    unavailable: bool,
}

/// Identity service backed by a fixed token table.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityService {
    /// Identity state protected by a mutex.
    state: Arc<Mutex<IdentityState>>,
}

impl StaticIdentityService {
    /// Creates an empty identity service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token and returns the service for chaining.
    #[must_use]
    pub fn with_token(self, token: &str, user: &str, roles: &[&str]) -> Self {
        self.insert_token(token, user, roles, None);
        self
    }

    /// Registers or replaces a token.
    pub fn insert_token(&self, token: &str, user: &str, roles: &[&str], expires_at: Option<i64>) {
        let grant = RoleGrant::new(roles.iter().map(ToString::to_string), expires_at);
        self.lock().accounts.insert(
            token.to_string(),
            StaticAccount { user: UserId::new(user), grant },
        );
    }

    /// Removes a token.
    pub fn revoke(&self, token: &str) {
        self.lock().accounts.remove(token);
    }

    /// Toggles simulated unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Returns how many role lookups have been served.
    #[must_use]
    pub fn role_lookups(&self) -> u64 {
        self.lock().role_lookups
    }

    /// Resolves a token without touching counters or availability.
    fn lookup(&self, credential: &Credential) -> Option<UserId> {
        self.lock().accounts.get(credential.expose()).map(|account| account.user.clone())
    }

    /// Acquires the state lock, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, IdentityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IdentityService for StaticIdentityService {
    fn resolve_user(&self, credential: &Credential) -> Result<UserId, IdentityError> {
        let state = self.lock();
        if state.unavailable {
            return Err(IdentityError::Unavailable("identity service offline".to_string()));
        }
        state
            .accounts
            .get(credential.expose())
            .map(|account| account.user.clone())
            .ok_or_else(|| IdentityError::InvalidCredential("unknown token".to_string()))
    }

    fn resolve_roles(&self, credential: &Credential) -> Result<RoleGrant, IdentityError> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(IdentityError::Unavailable("identity service offline".to_string()));
        }
        state.role_lookups += 1;
        state
            .accounts
            .get(credential.expose())
            .map(|account| account.grant.clone())
            .ok_or_else(|| IdentityError::InvalidCredential("unknown token".to_string()))
    }
}

// ============================================================================
// SECTION: Object Store
// ============================================================================

/// Remote node held by the in-memory object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryNode {
    /// Node owner.
    pub owner: UserId,
    /// Users granted read access.
    pub readers: BTreeSet<UserId>,
    /// Whether the node is world-readable.
    pub public_read: bool,
}

impl MemoryNode {
    /// Returns true when `user` may read the node.
    fn readable_by(&self, user: Option<&UserId>) -> bool {
        self.public_read
            || user.is_some_and(|user| *user == self.owner || self.readers.contains(user))
    }
}

/// Read grant applied through the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    /// Target node.
    pub node: NodeId,
    /// Principal granted access.
    pub principal: ReadPrincipal,
    /// User behind the credential that performed the grant.
    pub granted_by: UserId,
}

/// Mutable object store state.
#[derive(Debug, Default)]
struct ObjectStoreState {
    /// Nodes keyed by node id.
    nodes: BTreeMap<NodeId, MemoryNode>,
    /// Grants applied so far.
    grants: Vec<GrantRecord>,
    /// Whether calls fail as unreachable.
    unavailable: bool,
}

/// Remote object store simulated in memory.
#[derive(Debug, Clone)]
pub struct InMemoryObjectStore {
    /// Identity table used to resolve credentials.
    identity: StaticIdentityService,
    /// Store state protected by a mutex.
    state: Arc<Mutex<ObjectStoreState>>,
}

impl InMemoryObjectStore {
    /// Creates an empty store resolving credentials through `identity`.
    #[must_use]
    pub fn new(identity: StaticIdentityService) -> Self {
        Self { identity, state: Arc::new(Mutex::new(ObjectStoreState::default())) }
    }

    /// Adds a private node owned by `owner`.
    pub fn add_node(&self, node: &str, owner: &str) {
        self.lock().nodes.insert(
            NodeId::new(node),
            MemoryNode { owner: UserId::new(owner), readers: BTreeSet::new(), public_read: false },
        );
    }

    /// Returns a snapshot of a node.
    #[must_use]
    pub fn node(&self, node: &str) -> Option<MemoryNode> {
        self.lock().nodes.get(&NodeId::new(node)).cloned()
    }

    /// Returns every grant applied so far.
    #[must_use]
    pub fn grants(&self) -> Vec<GrantRecord> {
        self.lock().grants.clone()
    }

    /// Toggles simulated unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Acquires the state lock, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, ObjectStoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fails when the store is marked unavailable.
    fn ensure_available(state: &ObjectStoreState) -> Result<(), GatewayError> {
        if state.unavailable {
            return Err(GatewayError::Unavailable("object store offline".to_string()));
        }
        Ok(())
    }
}

impl ObjectStoreGateway for InMemoryObjectStore {
    fn node_owner(&self, node: &NodeId, credential: &Credential) -> Result<UserId, GatewayError> {
        let user = self.identity.lookup(credential);
        let state = self.lock();
        Self::ensure_available(&state)?;
        let Some(entry) = state.nodes.get(node) else {
            return Err(GatewayError::Rejected { status: 404, message: "node not found".into() });
        };
        if !entry.readable_by(user.as_ref()) {
            return Err(GatewayError::Rejected { status: 401, message: "unauthorized".into() });
        }
        Ok(entry.owner.clone())
    }

    fn is_readable(&self, node: &NodeId, credential: &Credential) -> Result<bool, GatewayError> {
        let user = self.identity.lookup(credential);
        let state = self.lock();
        Self::ensure_available(&state)?;
        Ok(state.nodes.get(node).is_some_and(|entry| entry.readable_by(user.as_ref())))
    }

    fn grant_read(
        &self,
        node: &NodeId,
        principal: &ReadPrincipal,
        credential: &Credential,
    ) -> Result<(), GatewayError> {
        let Some(granted_by) = self.identity.lookup(credential) else {
            return Err(GatewayError::Rejected { status: 401, message: "unauthorized".into() });
        };
        let mut state = self.lock();
        Self::ensure_available(&state)?;
        let Some(entry) = state.nodes.get_mut(node) else {
            return Err(GatewayError::Rejected { status: 404, message: "node not found".into() });
        };
        match principal {
            ReadPrincipal::User(user) => {
                entry.readers.insert(user.clone());
            }
            ReadPrincipal::Public => entry.public_read = true,
        }
        state.grants.push(GrantRecord {
            node: node.clone(),
            principal: principal.clone(),
            granted_by,
        });
        drop(state);
        Ok(())
    }
}
