// crates/handle-service-providers/src/kbase_auth.rs
// ============================================================================
// Module: KBase Auth Client
// Description: Identity service backed by the KBase auth2 API.
// Purpose: Resolve credentials to user ids and custom role grants.
// Dependencies: handle-service-core, reqwest, serde
// ============================================================================

//! ## Overview
//! [`KBaseAuthClient`] implements the identity port using two auth2
//! endpoints, both authenticated with the raw token in the `Authorization`
//! header:
//! - `GET {base}/api/V2/token` returns the token's `user` and `expires`
//!   (unix milliseconds).
//! - `GET {base}/api/V2/me` returns the account's `customroles`.
//!
//! A role grant combines the custom roles with the token expiry so cached
//! grants lapse together with the credential.

// ============================================================================
// SECTION: Imports
// ============================================================================

use handle_service_core::Credential;
use handle_service_core::IdentityError;
use handle_service_core::IdentityService;
use handle_service_core::RoleGrant;
use handle_service_core::UserId;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;

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

/// KBase auth2 client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KBaseAuthConfig {
    /// auth2 base URL (for example `https://kbase.us/services/auth`).
    pub url: String,
    /// Transport limits.
    pub http: HttpClientConfig,
}

impl KBaseAuthConfig {
    /// Creates a configuration with default transport limits.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), http: HttpClientConfig::default() }
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Response of `GET /api/V2/token`.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    /// Account name owning the token.
    user: String,
    /// Token expiry as unix milliseconds.
    #[serde(default)]
    expires: Option<i64>,
}

/// Response of `GET /api/V2/me`.
#[derive(Debug, Deserialize)]
struct AccountInfo {
    /// Custom roles assigned to the account.
    #[serde(default)]
    customroles: Vec<String>,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Identity service client for KBase auth2.
pub struct KBaseAuthClient {
    /// `{base}/api/V2/token`.
    token_url: Url,
    /// `{base}/api/V2/me`.
    me_url: Url,
    /// Blocking client with configured limits.
    client: Client,
    /// Response body limit in bytes.
    max_response_bytes: usize,
}

impl KBaseAuthClient {
    /// Creates a client for the configured auth2 server.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Unavailable`] when the base URL is invalid or
    /// the client cannot be built.
    pub fn new(config: &KBaseAuthConfig) -> Result<Self, IdentityError> {
        let base = parse_base_url(&config.url, &config.http)?;
        Ok(Self {
            token_url: endpoint(&base, &["api", "V2", "token"])?,
            me_url: endpoint(&base, &["api", "V2", "me"])?,
            client: build_http_client(&config.http)?,
            max_response_bytes: config.http.max_response_bytes,
        })
    }

    /// Fetches and decodes one auth2 resource.
    fn fetch<T: DeserializeOwned>(&self, url: &Url, credential: &Credential) -> Result<T, IdentityError> {
        if credential.is_blank() {
            return Err(IdentityError::InvalidCredential("credential is empty".to_string()));
        }
        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, credential.expose())
            .send()
            .map_err(|err| IdentityError::from(HttpError::Transport(err.to_string())))?;
        let status = response.status();
        let body = read_response_limited(response, self.max_response_bytes)?;
        if !status.is_success() {
            let message = error_summary(&body);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN => {
                    IdentityError::InvalidCredential(message)
                }
                _ => IdentityError::Unavailable(format!("auth service returned {status}: {message}")),
            });
        }
        serde_json::from_slice(&body)
            .map_err(|err| IdentityError::Malformed(format!("{}: {err}", url.path())))
    }

    /// Resolves the token metadata for `credential`.
    fn token_info(&self, credential: &Credential) -> Result<TokenInfo, IdentityError> {
        let info: TokenInfo = self.fetch(&self.token_url, credential)?;
        if info.user.trim().is_empty() {
            return Err(IdentityError::Malformed("token response has no user".to_string()));
        }
        Ok(info)
    }
}

impl IdentityService for KBaseAuthClient {
    fn resolve_user(&self, credential: &Credential) -> Result<UserId, IdentityError> {
        Ok(UserId::new(self.token_info(credential)?.user))
    }

    fn resolve_roles(&self, credential: &Credential) -> Result<RoleGrant, IdentityError> {
        let token = self.token_info(credential)?;
        let account: AccountInfo = self.fetch(&self.me_url, credential)?;
        Ok(RoleGrant::new(account.customroles, token.expires))
    }
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

impl From<HttpError> for IdentityError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::TooLarge | HttpError::Read(_) => Self::Malformed(err.to_string()),
            HttpError::InvalidUrl(_) | HttpError::Client(_) | HttpError::Transport(_) => {
                Self::Unavailable(err.to_string())
            }
        }
    }
}
