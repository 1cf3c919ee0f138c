// crates/handle-service-server/src/rpc.rs
// ============================================================================
// Module: RPC Router
// Description: Maps `AbstractHandle.*` methods onto engine operations.
// Purpose: Decode positional parameters and encode results for the wire.
// Dependencies: handle-service-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`RpcRouter`] is transport-free: it receives a method name, the positional
//! parameter array, and the presented credential, and returns the bare result
//! value. Framing, status codes, and error codes belong to the HTTP layer.
//!
//! Boolean answers are encoded as `1`/`0` integers, matching the existing
//! client libraries. Every method except `status` authenticates first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use handle_service_core::Credential;
use handle_service_core::FetchRequest;
use handle_service_core::HandleRef;
use handle_service_core::HandleService;
use handle_service_core::HandleServiceError;
use handle_service_core::HandleStore;
use handle_service_core::IdentityService;
use handle_service_core::NodeId;
use handle_service_core::ObjectStoreGateway;
use handle_service_core::UserId;
use handle_service_core::ValidationError;
use handle_service_core::runtime::parse_hid;
use handle_service_core::runtime::parse_hid_list;
use handle_service_core::runtime::parse_string_list;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Methods
// ============================================================================

/// Module prefix of every exposed method name.
pub const SERVICE_PREFIX: &str = "AbstractHandle.";

/// Exposed RPC methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    /// `persist_handle(handle) -> hid`
    PersistHandle,
    /// `fetch_handles_by({elements, field_name}) -> [handle]`
    FetchHandlesBy,
    /// `hids_to_handles(hids) -> [handle]`
    HidsToHandles,
    /// `ids_to_handles(ids) -> [handle]`
    IdsToHandles,
    /// `delete_handles(handles) -> count`
    DeleteHandles,
    /// `is_owner(hids) -> 0|1`
    IsOwner,
    /// `are_readable(hids) -> 0|1`
    AreReadable,
    /// `is_readable(hid) -> 0|1`
    IsReadable,
    /// `add_read_acl(hids, username?) -> 0|1`
    AddReadAcl,
    /// `set_public_read(hids) -> 0|1`
    SetPublicRead,
    /// `status() -> {state, message, version}`
    Status,
}

impl RpcMethod {
    /// Every exposed method.
    pub const ALL: [Self; 11] = [
        Self::PersistHandle,
        Self::FetchHandlesBy,
        Self::HidsToHandles,
        Self::IdsToHandles,
        Self::DeleteHandles,
        Self::IsOwner,
        Self::AreReadable,
        Self::IsReadable,
        Self::AddReadAcl,
        Self::SetPublicRead,
        Self::Status,
    ];

    /// Returns the method name without the module prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PersistHandle => "persist_handle",
            Self::FetchHandlesBy => "fetch_handles_by",
            Self::HidsToHandles => "hids_to_handles",
            Self::IdsToHandles => "ids_to_handles",
            Self::DeleteHandles => "delete_handles",
            Self::IsOwner => "is_owner",
            Self::AreReadable => "are_readable",
            Self::IsReadable => "is_readable",
            Self::AddReadAcl => "add_read_acl",
            Self::SetPublicRead => "set_public_read",
            Self::Status => "status",
        }
    }

    /// Parses a fully qualified method name (`AbstractHandle.<name>`).
    #[must_use]
    pub fn parse(qualified: &str) -> Option<Self> {
        let name = qualified.strip_prefix(SERVICE_PREFIX)?;
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// RPC dispatch errors.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The method name is not exposed.
    #[error("method not found: {0}")]
    MethodNotFound(String),
    /// Positional parameters are missing or have the wrong shape.
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// The engine refused or failed the operation.
    #[error(transparent)]
    Service(#[from] HandleServiceError),
    /// The result could not be encoded.
    #[error("result serialization failed")]
    Serialization,
}

impl From<ValidationError> for RpcError {
    fn from(error: ValidationError) -> Self {
        Self::Service(HandleServiceError::Validation(error))
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Routes RPC methods to a shared engine.
pub struct RpcRouter<S, G, I> {
    /// Shared lifecycle engine.
    service: Arc<HandleService<S, G, I>>,
}

impl<S, G, I> Clone for RpcRouter<S, G, I> {
    fn clone(&self) -> Self {
        Self { service: Arc::clone(&self.service) }
    }
}

impl<S, G, I> RpcRouter<S, G, I>
where
    S: HandleStore,
    G: ObjectStoreGateway,
    I: IdentityService,
{
    /// Creates a router owning `service`.
    #[must_use]
    pub fn new(service: HandleService<S, G, I>) -> Self {
        Self { service: Arc::new(service) }
    }

    /// Returns the engine.
    #[must_use]
    pub fn service(&self) -> &HandleService<S, G, I> {
        &self.service
    }

    /// Dispatches one call and returns its bare result value.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] for unknown methods, malformed parameters, and
    /// engine failures.
    pub fn dispatch(
        &self,
        method: &str,
        params: &[Value],
        credential: Option<Credential>,
    ) -> Result<Value, RpcError> {
        let method =
            RpcMethod::parse(method).ok_or_else(|| RpcError::MethodNotFound(method.to_string()))?;
        if method == RpcMethod::Status {
            return encode(&self.service.status());
        }
        let caller = self.service.authenticate(credential)?;
        let service = &self.service;
        match method {
            RpcMethod::PersistHandle => {
                let hid = service.persist_handle(&caller, param(params, 0, "handle")?)?;
                Ok(Value::String(hid.into_string()))
            }
            RpcMethod::FetchHandlesBy => {
                let request = FetchRequest::from_params(param(params, 0, "params")?)?;
                encode(&service.fetch_handles_by(&request)?)
            }
            RpcMethod::HidsToHandles => {
                let hids = parse_hid_list(param(params, 0, "hids")?, "hids")?;
                encode(&service.hids_to_handles(&hids)?)
            }
            RpcMethod::IdsToHandles => {
                let ids: Vec<NodeId> = parse_string_list(param(params, 0, "ids")?, "ids")?
                    .into_iter()
                    .map(NodeId::new)
                    .collect();
                encode(&service.ids_to_handles(&ids)?)
            }
            RpcMethod::DeleteHandles => {
                let Value::Array(items) = param(params, 0, "handles")? else {
                    return Err(RpcError::InvalidParams("handles must be a list".to_string()));
                };
                let records =
                    items.iter().map(HandleRef::from_value).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::from(service.delete_handles(&caller, &records)?))
            }
            RpcMethod::IsOwner => {
                let hids = parse_hid_list(param(params, 0, "hids")?, "hids")?;
                Ok(flag(service.is_owner(&caller, &hids)?))
            }
            RpcMethod::AreReadable => {
                let hids = parse_hid_list(param(params, 0, "hids")?, "hids")?;
                Ok(flag(service.are_readable(&caller, &hids)?))
            }
            RpcMethod::IsReadable => {
                let hid = parse_hid(param(params, 0, "hid")?, "hid")?;
                Ok(flag(service.is_readable(&caller, &hid)?))
            }
            RpcMethod::AddReadAcl => {
                let hids = parse_hid_list(param(params, 0, "hids")?, "hids")?;
                let username = optional_username(params.get(1))?;
                Ok(flag(service.add_read_acl(&caller, &hids, username)?))
            }
            RpcMethod::SetPublicRead => {
                let hids = parse_hid_list(param(params, 0, "hids")?, "hids")?;
                Ok(flag(service.set_public_read(&caller, &hids)?))
            }
            RpcMethod::Status => encode(&service.status()),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the positional parameter at `index`.
fn param<'a>(params: &'a [Value], index: usize, name: &str) -> Result<&'a Value, RpcError> {
    params
        .get(index)
        .filter(|value| !value.is_null())
        .ok_or_else(|| RpcError::InvalidParams(format!("missing parameter {name}")))
}

/// Parses the optional `username` argument; null or empty means public.
fn optional_username(value: Option<&Value>) -> Result<Option<UserId>, RpcError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) if name.trim().is_empty() => Ok(None),
        Some(Value::String(name)) => Ok(Some(UserId::new(name.trim()))),
        Some(_) => Err(RpcError::InvalidParams("username must be a string".to_string())),
    }
}

/// Encodes a boolean answer as `1` or `0`.
fn flag(answer: bool) -> Value {
    Value::from(u8::from(answer))
}

/// Serializes a result value.
fn encode(value: &impl Serialize) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|_| RpcError::Serialization)
}
