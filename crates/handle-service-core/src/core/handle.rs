// crates/handle-service-core/src/core/handle.rs
// ============================================================================
// Module: Handle Model
// Description: Persistent handle record, field catalogue, and backend tags.
// Purpose: Define the canonical shape stored and returned by the service.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Handle`] is a small metadata record pointing at an object held by a
//! remote store. Records are created only through the normalizer, so every
//! stored handle carries the nine canonical fields and nothing else.
//!
//! [`HandleField`] is the closed catalogue of field names. It doubles as the
//! whitelist for field lookups, which keeps storage queries parameterized.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::HandleId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Handle Fields
// ============================================================================

/// Canonical handle field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleField {
    /// External primary key.
    Hid,
    /// Remote node identifier.
    Id,
    /// Original file name.
    FileName,
    /// Backend type tag.
    #[serde(rename = "type")]
    Type,
    /// Remote store base address.
    Url,
    /// Optional MD5 checksum.
    RemoteMd5,
    /// Optional SHA-1 checksum.
    RemoteSha1,
    /// Creator identity.
    CreatedBy,
    /// First-persistence timestamp.
    CreationDate,
}

impl HandleField {
    /// Every recognized field in canonical order.
    pub const ALL: [Self; 9] = [
        Self::Hid,
        Self::Id,
        Self::FileName,
        Self::Type,
        Self::Url,
        Self::RemoteMd5,
        Self::RemoteSha1,
        Self::CreatedBy,
        Self::CreationDate,
    ];

    /// Fields a payload must supply with a non-empty value.
    pub const REQUIRED: [Self; 4] = [Self::Id, Self::FileName, Self::Type, Self::Url];

    /// Returns the wire name of the field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hid => "hid",
            Self::Id => "id",
            Self::FileName => "file_name",
            Self::Type => "type",
            Self::Url => "url",
            Self::RemoteMd5 => "remote_md5",
            Self::RemoteSha1 => "remote_sha1",
            Self::CreatedBy => "created_by",
            Self::CreationDate => "creation_date",
        }
    }

    /// Resolves a wire name to a field, if recognized.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

impl fmt::Display for HandleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Backend Kinds
// ============================================================================

/// Remote-store backends the authorization operations know how to mediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Shock object store.
    Shock,
}

impl BackendKind {
    /// Returns the type tag stored on handles for this backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shock => "shock",
        }
    }

    /// Resolves a stored type tag to a supported backend.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "shock" => Some(Self::Shock),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Handle Record
// ============================================================================

/// Persistent handle record.
///
/// # Invariants
/// - `id`, `file_name`, `backend_type`, and `url` are non-empty.
/// - `remote_md5` and `remote_sha1` are either `None` or non-empty.
/// - `creation_date` uses the `YYYY-MM-DD HH:MM:SS` UTC format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handle {
    /// External primary key.
    pub hid: HandleId,
    /// Identifier of the referenced object inside the remote store.
    pub id: NodeId,
    /// Original file name.
    pub file_name: String,
    /// Backend type tag.
    #[serde(rename = "type")]
    pub backend_type: String,
    /// Remote store base address.
    pub url: String,
    /// Optional MD5 checksum.
    pub remote_md5: Option<String>,
    /// Optional SHA-1 checksum.
    pub remote_sha1: Option<String>,
    /// Identity recorded as the creator.
    pub created_by: UserId,
    /// Timestamp of first persistence.
    pub creation_date: String,
}

impl Handle {
    /// Returns the supported backend for this handle, if any.
    #[must_use]
    pub fn backend(&self) -> Option<BackendKind> {
        BackendKind::parse(&self.backend_type)
    }

    /// Returns the stored value of a field, or `None` when it is null.
    #[must_use]
    pub fn field_value(&self, field: HandleField) -> Option<&str> {
        match field {
            HandleField::Hid => Some(self.hid.as_str()),
            HandleField::Id => Some(self.id.as_str()),
            HandleField::FileName => Some(&self.file_name),
            HandleField::Type => Some(&self.backend_type),
            HandleField::Url => Some(&self.url),
            HandleField::RemoteMd5 => self.remote_md5.as_deref(),
            HandleField::RemoteSha1 => self.remote_sha1.as_deref(),
            HandleField::CreatedBy => Some(self.created_by.as_str()),
            HandleField::CreationDate => Some(&self.creation_date),
        }
    }
}
