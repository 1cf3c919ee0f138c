// crates/handle-service-providers/src/shock.rs
// ============================================================================
// Module: Shock Gateway
// Description: Object store gateway backed by the Shock node API.
// Purpose: Resolve node owners, probe readability, and grant read ACLs.
// Dependencies: handle-service-core, reqwest, serde
// ============================================================================

//! ## Overview
//! [`ShockGateway`] implements the engine's object store port against a Shock
//! server. Every request carries the acting credential as an
//! `Authorization: OAuth <token>` header. Node ids are escaped as single path
//! segments, so an id can never address a different resource.
//!
//! Endpoints:
//! - owner: `GET {base}/node/{id}/acl/?verbosity=full`, reading
//!   `data.owner.username`
//! - readability: `GET {base}/node/{id}`, any success status is readable and
//!   any other status, 5xx included, is not
//! - grants: `PUT {base}/node/{id}/acl/read?users={user}` and
//!   `PUT {base}/node/{id}/acl/public_read`

// ============================================================================
// SECTION: Imports
// ============================================================================

use handle_service_core::Credential;
use handle_service_core::GatewayError;
use handle_service_core::NodeId;
use handle_service_core::ObjectStoreGateway;
use handle_service_core::ReadPrincipal;
use handle_service_core::UserId;
use reqwest::Method;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use crate::http::HttpClientConfig;
use crate::http::HttpError;
use crate::http::build_http_client;
use crate::http::endpoint;
use crate::http::error_summary;
use crate::http::parse_base_url;
use crate::http::read_response_limited;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Shock gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShockConfig {
    /// Shock API base URL.
    pub url: String,
    /// Transport limits.
    pub http: HttpClientConfig,
}

impl ShockConfig {
    /// Creates a configuration with default transport limits.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), http: HttpClientConfig::default() }
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// ACL response envelope (`verbosity=full`).
#[derive(Debug, Deserialize)]
struct AclEnvelope {
    /// ACL payload.
    data: Option<AclData>,
}

/// ACL payload.
#[derive(Debug, Deserialize)]
struct AclData {
    /// Owner entry.
    owner: Option<AclUser>,
}

/// User entry inside a full-verbosity ACL.
#[derive(Debug, Deserialize)]
struct AclUser {
    /// Account name.
    username: Option<String>,
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Object store gateway for a Shock server.
///
/// # Invariants
/// - Redirects are not followed.
/// - Response bodies are bounded by `max_response_bytes`.
pub struct ShockGateway {
    /// Validated API base URL.
    base: Url,
    /// Blocking client with configured limits.
    client: Client,
    /// Response body limit in bytes.
    max_response_bytes: usize,
}

impl ShockGateway {
    /// Creates a gateway for the configured Shock server.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] when the base URL is invalid or
    /// the client cannot be built.
    pub fn new(config: &ShockConfig) -> Result<Self, GatewayError> {
        let base = parse_base_url(&config.url, &config.http)?;
        let client = build_http_client(&config.http)?;
        Ok(Self { base, client, max_response_bytes: config.http.max_response_bytes })
    }

    /// Builds `{base}/node/{id}` followed by `tail` segments.
    fn node_url(&self, node: &NodeId, tail: &[&str]) -> Result<Url, GatewayError> {
        let mut segments = vec!["node", node.as_str()];
        segments.extend_from_slice(tail);
        Ok(endpoint(&self.base, &segments)?)
    }

    /// Sends an authenticated request.
    fn send(&self, method: Method, url: Url, credential: &Credential) -> Result<Response, GatewayError> {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, format!("OAuth {}", credential.expose()))
            .send()
            .map_err(|err| HttpError::Transport(err.to_string()).into())
    }

    /// Converts a non-success response into a rejection.
    fn rejection(&self, response: Response) -> GatewayError {
        let status = response.status();
        let message = read_response_limited(response, self.max_response_bytes)
            .map(|body| error_summary(&body))
            .ok()
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request refused").to_string());
        GatewayError::Rejected { status: status.as_u16(), message }
    }
}

impl ObjectStoreGateway for ShockGateway {
    fn node_owner(&self, node: &NodeId, credential: &Credential) -> Result<UserId, GatewayError> {
        let mut url = self.node_url(node, &["acl", ""])?;
        url.query_pairs_mut().append_pair("verbosity", "full");
        let response = self.send(Method::GET, url, credential)?;
        if !response.status().is_success() {
            return Err(self.rejection(response));
        }
        let body = read_response_limited(response, self.max_response_bytes)?;
        let envelope: AclEnvelope = serde_json::from_slice(&body)
            .map_err(|err| GatewayError::Malformed(format!("acl response: {err}")))?;
        envelope
            .data
            .and_then(|data| data.owner)
            .and_then(|owner| owner.username)
            .filter(|username| !username.is_empty())
            .map(UserId::new)
            .ok_or_else(|| GatewayError::Malformed(format!("acl for node {node} has no owner")))
    }

    fn is_readable(&self, node: &NodeId, credential: &Credential) -> Result<bool, GatewayError> {
        let url = self.node_url(node, &[])?;
        let response = self.send(Method::GET, url, credential)?;
        Ok(response.status().is_success())
    }

    fn grant_read(
        &self,
        node: &NodeId,
        principal: &ReadPrincipal,
        credential: &Credential,
    ) -> Result<(), GatewayError> {
        let url = match principal {
            ReadPrincipal::User(user) => {
                let mut url = self.node_url(node, &["acl", "read"])?;
                url.query_pairs_mut().append_pair("users", user.as_str());
                url
            }
            ReadPrincipal::Public => self.node_url(node, &["acl", "public_read"])?,
        };
        let response = self.send(Method::PUT, url, credential)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.rejection(response))
        }
    }
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

impl From<HttpError> for GatewayError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::TooLarge | HttpError::Read(_) => Self::Malformed(err.to_string()),
            HttpError::InvalidUrl(_) | HttpError::Client(_) | HttpError::Transport(_) => {
                Self::Unavailable(err.to_string())
            }
        }
    }
}
