// crates/handle-service-core/src/runtime/normalize.rs
// ============================================================================
// Module: Handle Normalizer
// Description: Turns raw client payloads into canonical handle records.
// Purpose: Enforce the single path by which handle records are created.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! Normalization runs in a fixed order:
//! 1. Keep only the recognized fields; everything else is dropped silently.
//! 2. Generate a handle id when none was supplied.
//! 3. Reject the payload when `id`, `file_name`, `type`, or `url` is missing.
//! 4. Collapse empty checksums to null.
//! 5. Default `created_by` to the acting user.
//! 6. Default `creation_date` to the injected clock reading.
//!
//! Null and the empty string both count as "not supplied". Integer handle ids
//! are accepted and stored in their decimal string form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

use crate::core::Handle;
use crate::core::HandleField;
use crate::core::HandleId;
use crate::core::NodeId;
use crate::core::UserId;
use crate::core::ValidationError;
use crate::core::format_creation_date;

// ============================================================================
// SECTION: Draft
// ============================================================================

/// Recognized fields extracted from a raw payload, before defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleDraft {
    /// Supplied handle id (canonicalized).
    pub hid: Option<HandleId>,
    /// Supplied remote node id.
    pub id: Option<String>,
    /// Supplied file name.
    pub file_name: Option<String>,
    /// Supplied backend type tag.
    pub backend_type: Option<String>,
    /// Supplied remote store address.
    pub url: Option<String>,
    /// Supplied MD5 checksum.
    pub remote_md5: Option<String>,
    /// Supplied SHA-1 checksum.
    pub remote_sha1: Option<String>,
    /// Supplied creator.
    pub created_by: Option<UserId>,
    /// Supplied creation timestamp.
    pub creation_date: Option<String>,
}

impl HandleDraft {
    /// Extracts the recognized fields from a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the payload is not an object or a
    /// recognized field has a non-string value.
    pub fn from_payload(payload: &Value) -> Result<Self, ValidationError> {
        let Value::Object(map) = payload else {
            return Err(ValidationError::invalid("handle", "expected a JSON object"));
        };
        Ok(Self {
            hid: hid_field(map)?,
            id: text_field(map, HandleField::Id)?,
            file_name: text_field(map, HandleField::FileName)?,
            backend_type: text_field(map, HandleField::Type)?,
            url: text_field(map, HandleField::Url)?,
            remote_md5: text_field(map, HandleField::RemoteMd5)?,
            remote_sha1: text_field(map, HandleField::RemoteSha1)?,
            created_by: text_field(map, HandleField::CreatedBy)?.map(UserId::new),
            creation_date: text_field(map, HandleField::CreationDate)?,
        })
    }
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Applies defaults and required-field checks to a draft.
///
/// # Errors
///
/// Returns [`ValidationError::MissingRequiredFields`] when a mandatory field
/// is absent.
pub fn normalize_handle(
    draft: HandleDraft,
    acting_user: &UserId,
    now_millis: i64,
) -> Result<Handle, ValidationError> {
    let hid = draft.hid.unwrap_or_else(HandleId::generate);
    let missing: Vec<&'static str> = [
        (HandleField::Id, draft.id.is_none()),
        (HandleField::FileName, draft.file_name.is_none()),
        (HandleField::Type, draft.backend_type.is_none()),
        (HandleField::Url, draft.url.is_none()),
    ]
    .into_iter()
    .filter_map(|(field, absent)| absent.then_some(field.as_str()))
    .collect();
    let (Some(id), Some(file_name), Some(backend_type), Some(url)) =
        (draft.id, draft.file_name, draft.backend_type, draft.url)
    else {
        return Err(ValidationError::MissingRequiredFields(missing));
    };
    Ok(Handle {
        hid,
        id: NodeId::new(id),
        file_name,
        backend_type,
        url,
        remote_md5: draft.remote_md5,
        remote_sha1: draft.remote_sha1,
        created_by: draft.created_by.unwrap_or_else(|| acting_user.clone()),
        creation_date: draft.creation_date.unwrap_or_else(|| format_creation_date(now_millis)),
    })
}

/// Extracts and normalizes a raw payload in one step.
///
/// # Errors
///
/// Returns [`ValidationError`] when extraction or normalization fails.
pub fn normalize_payload(
    payload: &Value,
    acting_user: &UserId,
    now_millis: i64,
) -> Result<Handle, ValidationError> {
    normalize_handle(HandleDraft::from_payload(payload)?, acting_user, now_millis)
}

// ============================================================================
// SECTION: Field Extraction
// ============================================================================

/// Reads a string field, treating null and `""` as absent.
fn text_field(map: &Map<String, Value>, field: HandleField) -> Result<Option<String>, ValidationError> {
    match map.get(field.as_str()) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.is_empty() => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(ValidationError::invalid(field.as_str(), "expected a string")),
    }
}

/// Reads the handle id, accepting integers as well as strings.
fn hid_field(map: &Map<String, Value>) -> Result<Option<HandleId>, ValidationError> {
    match map.get(HandleField::Hid.as_str()) {
        Some(Value::Number(number)) => number
            .as_i64()
            .map(|value| Some(HandleId::from_number(value)))
            .ok_or_else(|| ValidationError::invalid("hid", "numeric hid must be an integer")),
        _ => Ok(text_field(map, HandleField::Hid)?
            .map(|text| HandleId::canonical(&text))
            .filter(|hid| !hid.as_str().is_empty())),
    }
}
