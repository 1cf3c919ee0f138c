// crates/handle-service-config/src/config.rs
// ============================================================================
// Module: Handle Service Configuration
// Description: Config model, loader, validation, and backend conversions.
// Purpose: Provide a strict, fail-closed view of `handle-service.toml`.
// Dependencies: handle-service-core, handle-service-providers,
//               handle-service-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! The configuration file has four sections:
//! - `[server]` listener address and request body limit
//! - `[store]` memory or `SQLite` handle store
//! - `[object_store]` Shock base URL and the service credential source
//! - `[auth]` auth2 base URL, admin roles, and role cache sizing
//!
//! Unknown keys are rejected. The file path comes from the caller, then
//! `HANDLE_SERVICE_CONFIG`, then `./handle-service.toml`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use handle_service_core::Credential;
use handle_service_core::LifecycleConfig;
use handle_service_providers::HttpClientConfig;
use handle_service_providers::KBaseAuthConfig;
use handle_service_providers::ShockConfig;
use handle_service_providers::http::parse_base_url;
use handle_service_store_sqlite::SqliteStoreConfig;
use handle_service_store_sqlite::SqliteStoreMode;
use handle_service_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use serde::Deserializer;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default config filename.
const DEFAULT_CONFIG_NAME: &str = "handle-service.toml";
/// Environment variable override for config path.
pub const CONFIG_ENV_VAR: &str = "HANDLE_SERVICE_CONFIG";
/// Maximum allowed config file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum total path length for config-related paths.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum request body limit an operator may configure.
const MAX_BODY_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Maximum outbound request timeout.
const MAX_TIMEOUT_MS: u64 = 120_000;
/// Maximum role cache capacity.
const MAX_CACHE_CAPACITY: usize = 1_000_000;
/// Maximum role cache time-to-live.
const MAX_CACHE_TTL_SECS: u64 = 86_400;

// ============================================================================
// SECTION: Root
// ============================================================================

/// Handle service configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandleServiceConfig {
    /// Listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Handle store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Remote object store configuration.
    pub object_store: ObjectStoreConfig,
    /// Identity service configuration.
    pub auth: AuthConfig,
}

impl HandleServiceConfig {
    /// Loads configuration from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved, "config")?;
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.store.validate()?;
        self.object_store.validate()?;
        self.auth.validate()
    }

    /// Builds the engine configuration.
    ///
    /// The service credential is read from the environment variable named by
    /// `object_store.service_token_env`.
    #[must_use]
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        self.lifecycle_config_with(|name| env::var(name).ok())
    }

    /// Builds the engine configuration using `lookup` for environment reads.
    #[must_use]
    pub fn lifecycle_config_with(&self, lookup: impl Fn(&str) -> Option<String>) -> LifecycleConfig {
        LifecycleConfig {
            admin_roles: self.auth.admin_roles.clone(),
            service_credential: self.object_store.service_credential_with(lookup),
            cache_capacity: self.auth.cache_capacity,
            cache_ttl_millis: self.auth.cache_ttl_millis(),
        }
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted request body size.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind(), max_body_bytes: default_max_body_bytes() }
    }
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind)))
    }

    /// Validates listener settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

/// Default request body limit.
const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Handle store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store (dev/test only).
    #[default]
    Memory,
    /// `SQLite`-backed store.
    Sqlite,
}

/// Handle store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// `SQLite` busy timeout in milliseconds.
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: Option<SqliteStoreMode>,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: Option<SqliteSyncMode>,
}

impl StoreConfig {
    /// Returns the `SQLite` store configuration, if the backend is `SQLite`.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        if self.store_type != StoreType::Sqlite {
            return None;
        }
        let mut config = SqliteStoreConfig::new(self.path.clone()?);
        if let Some(timeout) = self.busy_timeout_ms {
            config.busy_timeout_ms = timeout;
        }
        if let Some(mode) = self.journal_mode {
            config.journal_mode = mode;
        }
        if let Some(mode) = self.sync_mode {
            config.sync_mode = mode;
        }
        Some(config)
    }

    /// Validates store settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                let sqlite_only = self.path.is_some()
                    || self.busy_timeout_ms.is_some()
                    || self.journal_mode.is_some()
                    || self.sync_mode.is_some();
                if sqlite_only {
                    return Err(ConfigError::Invalid(
                        "memory store does not accept sqlite settings".to_string(),
                    ));
                }
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires store.path".to_string())
                })?;
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid("store.path must not be empty".to_string()));
                }
                validate_path(path, "store")?;
                if self.busy_timeout_ms == Some(0) {
                    return Err(ConfigError::Invalid(
                        "store.busy_timeout_ms must be greater than zero".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Object Store
// ============================================================================

/// Remote object store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectStoreConfig {
    /// Shock API base URL.
    pub url: String,
    /// Allow a cleartext `http://` URL.
    #[serde(default)]
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response body size.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Environment variable holding the service credential for ACL grants.
    #[serde(default = "default_service_token_env")]
    pub service_token_env: String,
}

impl ObjectStoreConfig {
    /// Returns the Shock gateway configuration.
    #[must_use]
    pub fn shock_config(&self) -> ShockConfig {
        ShockConfig {
            url: self.url.trim().to_string(),
            http: http_config(self.allow_http, self.timeout_ms, self.max_response_bytes),
        }
    }

    /// Reads the service credential through `lookup`.
    ///
    /// Unset and blank values yield `None`.
    #[must_use]
    pub fn service_credential_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<Credential> {
        lookup(self.service_token_env.trim())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(Credential::new)
    }

    /// Validates object store settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint("object_store", &self.url, self.allow_http)?;
        validate_transport("object_store", self.timeout_ms, self.max_response_bytes)?;
        let name = self.service_token_env.trim();
        if name.is_empty() || name.contains('=') || name.contains('\0') {
            return Err(ConfigError::Invalid(
                "object_store.service_token_env must be a variable name".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default environment variable for the service credential.
fn default_service_token_env() -> String {
    "KB_AUTH_TOKEN".to_string()
}

// ============================================================================
// SECTION: Auth
// ============================================================================

/// Identity service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// auth2 base URL.
    pub url: String,
    /// Allow a cleartext `http://` URL.
    #[serde(default)]
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response body size.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Roles allowed to grant read access (array or comma-separated string).
    #[serde(default, deserialize_with = "deserialize_roles")]
    pub admin_roles: BTreeSet<String>,
    /// Role cache capacity.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Role cache time-to-live in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl AuthConfig {
    /// Returns the auth2 client configuration.
    #[must_use]
    pub fn kbase_auth_config(&self) -> KBaseAuthConfig {
        KBaseAuthConfig {
            url: self.url.trim().to_string(),
            http: http_config(self.allow_http, self.timeout_ms, self.max_response_bytes),
        }
    }

    /// Returns the cache time-to-live in milliseconds.
    #[must_use]
    pub fn cache_ttl_millis(&self) -> i64 {
        i64::try_from(self.cache_ttl_secs.min(MAX_CACHE_TTL_SECS).saturating_mul(1_000))
            .unwrap_or(i64::MAX)
    }

    /// Validates identity settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint("auth", &self.url, self.allow_http)?;
        validate_transport("auth", self.timeout_ms, self.max_response_bytes)?;
        if self.admin_roles.is_empty() {
            return Err(ConfigError::Invalid("auth.admin_roles must name at least one role".to_string()));
        }
        if self.cache_capacity == 0 || self.cache_capacity > MAX_CACHE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "auth.cache_capacity must be between 1 and {MAX_CACHE_CAPACITY}"
            )));
        }
        if self.cache_ttl_secs == 0 || self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "auth.cache_ttl_secs must be between 1 and {MAX_CACHE_TTL_SECS}"
            )));
        }
        Ok(())
    }
}

/// Default role cache capacity.
const fn default_cache_capacity() -> usize {
    1_000
}

/// Default role cache time-to-live.
const fn default_cache_ttl_secs() -> u64 {
    300
}

/// Admin role list as written in the file.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRoles {
    /// TOML array of role names.
    List(Vec<String>),
    /// Comma-separated role names.
    Joined(String),
}

/// Accepts an array or comma-separated string, trimming and de-duplicating.
fn deserialize_roles<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = match RawRoles::deserialize(deserializer)? {
        RawRoles::List(names) => names,
        RawRoles::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };
    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

// ============================================================================
// SECTION: Shared Transport
// ============================================================================

/// Default outbound timeout.
const fn default_timeout_ms() -> u64 {
    10_000
}

/// Default response body limit.
const fn default_max_response_bytes() -> usize {
    1024 * 1024
}

/// Builds provider transport limits.
fn http_config(allow_http: bool, timeout_ms: u64, max_response_bytes: usize) -> HttpClientConfig {
    HttpClientConfig { allow_http, timeout_ms, max_response_bytes, ..HttpClientConfig::default() }
}

/// Validates a service base URL with the provider URL policy.
fn validate_endpoint(section: &str, url: &str, allow_http: bool) -> Result<(), ConfigError> {
    if url.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{section}.url is required")));
    }
    parse_base_url(url, &http_config(allow_http, default_timeout_ms(), default_max_response_bytes()))
        .map(|_| ())
        .map_err(|err| ConfigError::Invalid(format!("{section}.url: {err}")))
}

/// Validates outbound limits.
fn validate_transport(section: &str, timeout_ms: u64, max_response_bytes: usize) -> Result<(), ConfigError> {
    if timeout_ms == 0 || timeout_ms > MAX_TIMEOUT_MS {
        return Err(ConfigError::Invalid(format!(
            "{section}.timeout_ms must be between 1 and {MAX_TIMEOUT_MS}"
        )));
    }
    if max_response_bytes == 0 || max_response_bytes > MAX_BODY_BYTES_LIMIT {
        return Err(ConfigError::Invalid(format!(
            "{section}.max_response_bytes must be between 1 and {MAX_BODY_BYTES_LIMIT}"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Paths
// ============================================================================

/// Resolves the config path from explicit input or environment.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates path length and components.
fn validate_path(path: &Path, label: &str) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{label} path exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{label} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error.
    #[error("config io error: {0}")]
    Io(String),
    /// Parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration.
    #[error("config invalid: {0}")]
    Invalid(String),
}
