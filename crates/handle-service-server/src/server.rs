// crates/handle-service-server/src/server.rs
// ============================================================================
// Module: Handle Server
// Description: Backend wiring and the JSON-RPC 1.1 HTTP transport.
// Purpose: Serve `AbstractHandle.*` calls over HTTP with strict limits.
// Dependencies: axum, tokio, tracing, handle-service-*
// ============================================================================

//! ## Overview
//! [`HandleServer`] accepts `POST /` and `POST /rpc` with a KBase JSON-RPC 1.1
//! envelope, takes the caller credential from the `Authorization` header, and
//! routes the call through [`RpcRouter`]. Results are wrapped in a
//! one-element array. Engine calls are synchronous and run under
//! `block_in_place` on the multi-threaded runtime.
//!
//! Error codes:
//! - `-32600` malformed envelope, `-32601` unknown method
//! - `-32602` invalid parameters or unsupported backend
//! - `-32003` ownership or authorization refusal
//! - `-32500` upstream failure, `-32070` body over the size limit

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::routing::post;
use handle_service_config::HandleServiceConfig;
use handle_service_config::StoreType;
use handle_service_core::Credential;
use handle_service_core::HandleService;
use handle_service_core::HandleServiceError;
use handle_service_core::HandleStore;
use handle_service_core::IdentityService;
use handle_service_core::InMemoryHandleStore;
use handle_service_core::ObjectStoreGateway;
use handle_service_core::SharedHandleStore;
use handle_service_core::SystemClock;
use handle_service_providers::KBaseAuthClient;
use handle_service_providers::ShockGateway;
use handle_service_store_sqlite::SqliteHandleStore;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::audit::TracingAuditSink;
use crate::rpc::RpcError;
use crate::rpc::RpcRouter;

// ============================================================================
// SECTION: Wiring
// ============================================================================

/// Engine wired to the production backends.
pub type ProductionService = HandleService<SharedHandleStore, ShockGateway, KBaseAuthClient>;

/// Builds the configured handle store.
///
/// # Errors
///
/// Returns [`ServerError::Init`] when the store cannot be opened.
pub fn build_store(config: &HandleServiceConfig) -> Result<SharedHandleStore, ServerError> {
    let store = match config.store.store_type {
        StoreType::Memory => SharedHandleStore::from_store(InMemoryHandleStore::new()),
        StoreType::Sqlite => {
            let sqlite_config = config.store.sqlite_config().ok_or_else(|| {
                ServerError::Config("sqlite store requires store.path".to_string())
            })?;
            let store = SqliteHandleStore::new(&sqlite_config)
                .map_err(|err| ServerError::Init(err.to_string()))?;
            SharedHandleStore::from_store(store)
        }
    };
    Ok(store)
}

/// Builds the engine with the configured store, gateway, and identity client.
///
/// # Errors
///
/// Returns [`ServerError`] when validation or backend construction fails.
pub fn build_service(config: &HandleServiceConfig) -> Result<ProductionService, ServerError> {
    config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
    let store = build_store(config)?;
    let gateway = ShockGateway::new(&config.object_store.shock_config())
        .map_err(|err| ServerError::Init(err.to_string()))?;
    let identity = KBaseAuthClient::new(&config.auth.kbase_auth_config())
        .map_err(|err| ServerError::Init(err.to_string()))?;
    let lifecycle = config.lifecycle_config();
    if lifecycle.service_credential.is_none() {
        tracing::warn!(
            variable = config.object_store.service_token_env.as_str(),
            "service credential not set; read grants will use the caller's credential"
        );
    }
    Ok(HandleService::new(
        store,
        gateway,
        identity,
        Arc::new(SystemClock),
        Arc::new(TracingAuditSink),
        lifecycle,
    ))
}

// ============================================================================
// SECTION: Handle Server
// ============================================================================

/// JSON-RPC server over a handle engine.
pub struct HandleServer<S, G, I> {
    /// Listener address.
    bind: SocketAddr,
    /// Maximum accepted request body size.
    max_body_bytes: usize,
    /// Method router.
    router: RpcRouter<S, G, I>,
}

impl HandleServer<SharedHandleStore, ShockGateway, KBaseAuthClient> {
    /// Builds a server wired to the production backends.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when initialization fails.
    pub fn from_config(config: &HandleServiceConfig) -> Result<Self, ServerError> {
        let service = build_service(config)?;
        let bind =
            config.server.socket_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        Ok(Self::new(bind, config.server.max_body_bytes, RpcRouter::new(service)))
    }
}

impl<S, G, I> HandleServer<S, G, I>
where
    S: HandleStore + Send + Sync + 'static,
    G: ObjectStoreGateway + Send + Sync + 'static,
    I: IdentityService + Send + Sync + 'static,
{
    /// Creates a server over an existing router.
    #[must_use]
    pub const fn new(bind: SocketAddr, max_body_bytes: usize, router: RpcRouter<S, G, I>) -> Self {
        Self { bind, max_body_bytes, router }
    }

    /// Returns the axum application serving this router.
    #[must_use]
    pub fn app(&self) -> Router {
        let state = Arc::new(ServerState {
            router: self.router.clone(),
            max_body_bytes: self.max_body_bytes,
        });
        Router::new()
            .route("/", post(handle_http::<S, G, I>))
            .route("/rpc", post(handle_http::<S, G, I>))
            .with_state(state)
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let app = self.app();
        let listener = tokio::net::TcpListener::bind(self.bind)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        tracing::info!(bind = %self.bind, "handle service listening");
        axum::serve(listener, app)
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
    }
}

/// Shared state for HTTP handlers.
struct ServerState<S, G, I> {
    /// Method router.
    router: RpcRouter<S, G, I>,
    /// Maximum accepted request body size.
    max_body_bytes: usize,
}

/// Handles one HTTP JSON-RPC request.
async fn handle_http<S, G, I>(
    State(state): State<Arc<ServerState<S, G, I>>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> impl IntoResponse
where
    S: HandleStore + Send + Sync + 'static,
    G: ObjectStoreGateway + Send + Sync + 'static,
    I: IdentityService + Send + Sync + 'static,
{
    let credential = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(Credential::from_authorization_header);
    let response = parse_request(&state.router, state.max_body_bytes, credential, &bytes);
    (response.0, axum::Json(response.1))
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Incoming JSON-RPC 1.1 request.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// Protocol version; `1.1` when present.
    #[serde(default)]
    version: Option<String>,
    /// Request identifier.
    #[serde(default)]
    id: Value,
    /// Qualified method name.
    method: String,
    /// Positional parameters.
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC 1.1 response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// Protocol version.
    version: &'static str,
    /// Request identifier.
    id: Value,
    /// One-element result array on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error class name.
    name: &'static str,
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// Parses, dispatches, and frames one request body.
fn parse_request<S, G, I>(
    router: &RpcRouter<S, G, I>,
    max_body_bytes: usize,
    credential: Option<Credential>,
    bytes: &Bytes,
) -> (StatusCode, JsonRpcResponse)
where
    S: HandleStore,
    G: ObjectStoreGateway,
    I: IdentityService,
{
    if bytes.len() > max_body_bytes {
        return failure(StatusCode::PAYLOAD_TOO_LARGE, Value::Null, -32070, "request body too large");
    }
    let Ok(request) = serde_json::from_slice::<JsonRpcRequest>(bytes.as_ref()) else {
        return failure(StatusCode::BAD_REQUEST, Value::Null, -32600, "invalid json-rpc request");
    };
    if request.version.as_deref().is_some_and(|version| version != "1.1") {
        return failure(StatusCode::BAD_REQUEST, request.id, -32600, "unsupported json-rpc version");
    }
    let params = match request.params {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return failure(StatusCode::BAD_REQUEST, request.id, -32600, "params must be an array");
        }
    };
    match call_with_blocking(router, &request.method, &params, credential) {
        Ok(result) => (
            StatusCode::OK,
            JsonRpcResponse {
                version: "1.1",
                id: request.id,
                result: Some(Value::Array(vec![result])),
                error: None,
            },
        ),
        Err(err) => jsonrpc_error(request.method.as_str(), request.id, err),
    }
}

/// Runs a dispatch, shifting to a blocking context when available.
fn call_with_blocking<S, G, I>(
    router: &RpcRouter<S, G, I>,
    method: &str,
    params: &[Value],
    credential: Option<Credential>,
) -> Result<Value, RpcError>
where
    S: HandleStore,
    G: ObjectStoreGateway,
    I: IdentityService,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| router.dispatch(method, params, credential))
        }
        _ => router.dispatch(method, params, credential),
    }
}

/// Builds a JSON-RPC error response for a dispatch failure.
fn jsonrpc_error(method: &str, id: Value, error: RpcError) -> (StatusCode, JsonRpcResponse) {
    let (status, code) = match &error {
        RpcError::MethodNotFound(_) => (StatusCode::NOT_FOUND, -32601),
        RpcError::InvalidParams(_) => (StatusCode::BAD_REQUEST, -32602),
        RpcError::Service(
            HandleServiceError::Validation(_) | HandleServiceError::UnsupportedBackend(_),
        ) => (StatusCode::INTERNAL_SERVER_ERROR, -32602),
        RpcError::Service(HandleServiceError::Ownership(_) | HandleServiceError::Authorization(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, -32003)
        }
        RpcError::Service(HandleServiceError::Upstream(_)) | RpcError::Serialization => {
            (StatusCode::INTERNAL_SERVER_ERROR, -32500)
        }
    };
    if code == -32500 {
        tracing::error!(method, error = %error, "rpc call failed upstream");
    } else {
        tracing::debug!(method, error = %error, "rpc call refused");
    }
    failure(status, id, code, error.to_string())
}

/// Builds an error envelope.
fn failure(
    status: StatusCode,
    id: Value,
    code: i64,
    message: impl Into<String>,
) -> (StatusCode, JsonRpcResponse) {
    (
        status,
        JsonRpcResponse {
            version: "1.1",
            id,
            result: None,
            error: Some(JsonRpcError { name: "JSONRPCError", code, message: message.into() }),
        },
    )
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
