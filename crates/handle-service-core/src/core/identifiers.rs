// crates/handle-service-core/src/core/identifiers.rs
// ============================================================================
// Module: Handle Service Identifiers
// Description: Canonical opaque identifiers for handles, nodes, and callers.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, sha2, uuid
// ============================================================================

//! ## Overview
//! Identifiers are opaque and serialize as strings. [`HandleId`] carries the
//! one canonicalization rule of the service: numeric handle ids are stored in
//! their decimal string form so legacy integer keys and string keys resolve to
//! the same record. [`Credential`] never prints its secret.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use uuid::Uuid;

// ============================================================================
// SECTION: Handle Identifier
// ============================================================================

/// External-facing primary key of a handle record.
///
/// # Invariants
/// - Values built through [`HandleId::canonical`] are trimmed, and integer
///   values use their decimal form without sign padding or leading zeros.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(String);

impl HandleId {
    /// Creates a handle identifier without canonicalization.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random handle identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Builds the canonical form of a caller-supplied handle identifier.
    ///
    /// Integer-looking input is coerced to its decimal form; anything else is
    /// kept verbatim (after trimming).
    #[must_use]
    pub fn canonical(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(number) => Self(number.to_string()),
            Err(_) => Self(trimmed.to_string()),
        }
    }

    /// Builds the canonical form of a numeric handle identifier.
    #[must_use]
    pub fn from_number(number: i64) -> Self {
        Self(number.to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier and returns the owned string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for HandleId {
    fn from(value: &str) -> Self {
        Self::canonical(value)
    }
}

// ============================================================================
// SECTION: Node Identifier
// ============================================================================

/// Identifier of the referenced object inside the remote store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a new node identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: User Identifier
// ============================================================================

/// Identity of a caller or handle creator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new user identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Credential
// ============================================================================

/// Opaque caller credential (auth token).
///
/// # Invariants
/// - `Debug` output never contains the secret; use [`Credential::fingerprint`]
///   when a stable label is needed in logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Parses an `Authorization` header value, stripping an optional
    /// `Bearer` or `OAuth` scheme prefix.
    #[must_use]
    pub fn from_authorization_header(header: &str) -> Option<Self> {
        let trimmed = header.trim();
        let token = match trimmed.split_once(char::is_whitespace) {
            Some((scheme, rest)) if is_auth_scheme(scheme) => rest.trim(),
            None if is_auth_scheme(trimmed) => "",
            _ => trimmed,
        };
        if token.is_empty() { None } else { Some(Self(token.to_string())) }
    }

    /// Returns the raw token for transport headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true when the token is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Returns the lowercase hex SHA-256 fingerprint of the token.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex_encode(&digest)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Returns true for the scheme prefixes accepted ahead of a raw token.
fn is_auth_scheme(scheme: &str) -> bool {
    scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("oauth")
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[usize::from(byte >> 4)] as char);
        out.push(HEX[usize::from(byte & 0x0f)] as char);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
