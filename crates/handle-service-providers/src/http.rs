// crates/handle-service-providers/src/http.rs
// ============================================================================
// Module: Bounded HTTP Client
// Description: Shared client construction, URL policy, and bounded reads.
// Purpose: Give every remote backend the same transport limits.
// Dependencies: reqwest, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Both remote backends talk to services whose base URLs come from operator
//! configuration and whose response bodies are untrusted. This module holds
//! the pieces they share: a blocking client with a hard timeout and no
//! redirect following, base URL validation, endpoint construction that escapes
//! every path segment, and a body reader that refuses oversized responses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of characters kept from a remote error message.
const MAX_ERROR_SUMMARY_CHARS: usize = 200;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Transport limits shared by the remote backends.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` base URLs.
/// - `max_response_bytes` is a hard upper bound on response bodies.
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            timeout_ms: 10_000,
            max_response_bytes: 1024 * 1024,
            user_agent: concat!("handle-service/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Transport-level failures shared by the remote backends.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HttpError {
    /// The configured base URL is unusable.
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
    /// The HTTP client could not be built.
    #[error("http client build failed: {0}")]
    Client(String),
    /// The request could not be completed.
    #[error("http request failed: {0}")]
    Transport(String),
    /// The response body exceeded the configured limit.
    #[error("http response exceeds size limit")]
    TooLarge,
    /// The response body could not be read completely.
    #[error("http response read failed: {0}")]
    Read(String),
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Builds a blocking client honoring the configured limits.
///
/// # Errors
///
/// Returns [`HttpError::Client`] when the client cannot be created.
pub fn build_http_client(config: &HttpClientConfig) -> Result<Client, HttpError> {
    Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .user_agent(config.user_agent.clone())
        .redirect(Policy::none())
        .build()
        .map_err(|err| HttpError::Client(err.to_string()))
}

/// Parses and validates a service base URL.
///
/// # Errors
///
/// Returns [`HttpError::InvalidUrl`] for unparsable URLs, disallowed schemes,
/// embedded credentials, or URLs that cannot carry path segments.
pub fn parse_base_url(raw: &str, config: &HttpClientConfig) -> Result<Url, HttpError> {
    let url = Url::parse(raw.trim()).map_err(|err| HttpError::InvalidUrl(err.to_string()))?;
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        "http" => return Err(HttpError::InvalidUrl("cleartext http is not allowed".to_string())),
        other => return Err(HttpError::InvalidUrl(format!("unsupported url scheme: {other}"))),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(HttpError::InvalidUrl("url credentials are not allowed".to_string()));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(HttpError::InvalidUrl("url host required".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(HttpError::InvalidUrl("base url must not carry a query".to_string()));
    }
    Ok(url)
}

/// Appends escaped path segments to `base`.
///
/// A trailing empty segment yields a trailing slash.
///
/// # Errors
///
/// Returns [`HttpError::InvalidUrl`] when `base` cannot carry path segments.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, HttpError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| HttpError::InvalidUrl("url cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Reads the response body while enforcing a byte limit.
///
/// # Errors
///
/// Returns [`HttpError::TooLarge`] when the body exceeds `max_bytes`, and
/// [`HttpError::Read`] when it is truncated or unreadable.
pub fn read_response_limited(response: Response, max_bytes: usize) -> Result<Vec<u8>, HttpError> {
    let expected_len = response.content_length();
    let max_bytes_u64 = u64::try_from(max_bytes).map_err(|_| HttpError::TooLarge)?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(HttpError::TooLarge);
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle.read_to_end(&mut buf).map_err(|err| HttpError::Read(err.to_string()))?;
    if buf.len() > max_bytes {
        return Err(HttpError::TooLarge);
    }
    if let Some(expected) = expected_len {
        let expected = usize::try_from(expected)
            .map_err(|_| HttpError::Read("invalid response length".to_string()))?;
        if buf.len() < expected {
            return Err(HttpError::Read("http response truncated".to_string()));
        }
    }
    Ok(buf)
}

/// Extracts a short error message from a remote error body.
///
/// Understands the Shock (`{"error": ["..."]}`) and auth2
/// (`{"error": {"message": "..."}}`) shapes and falls back to the raw text.
#[must_use]
pub fn error_summary(body: &[u8]) -> String {
    let from_json = serde_json::from_slice::<Value>(body).ok().and_then(|value| {
        match value.get("error")? {
            Value::String(message) => Some(message.clone()),
            Value::Array(items) => items.iter().find_map(Value::as_str).map(str::to_string),
            Value::Object(map) => map.get("message").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    });
    let text = from_json.unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
    text.chars().take(MAX_ERROR_SUMMARY_CHARS).collect()
}

#[cfg(test)]
mod tests;
