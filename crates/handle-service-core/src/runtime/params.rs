// crates/handle-service-core/src/runtime/params.rs
// ============================================================================
// Module: Operation Parameters
// Description: Typed request shapes parsed from untrusted JSON parameters.
// Purpose: Validate operation inputs before the runtime touches any backend.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! Lookup operations accept identifiers as JSON strings or integers. Handle
//! ids go through [`HandleId::canonical`] so integer and string spellings
//! of the same id resolve identically.
//!
//! [`FetchRequest`] keeps track of keys it did not expect. The runtime
//! reports them as audit notices and continues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Value;

use crate::core::Handle;
use crate::core::HandleField;
use crate::core::HandleId;
use crate::core::UserId;
use crate::core::ValidationError;

// ============================================================================
// SECTION: Fetch Request
// ============================================================================

/// Parameter key carrying the lookup values.
const ELEMENTS_KEY: &str = "elements";
/// Parameter key carrying the field name.
const FIELD_NAME_KEY: &str = "field_name";

/// Parsed `fetchHandlesBy` parameters.
///
/// # Invariants
/// - When `field_name` names the handle id field, `elements` holds canonical
///   handle ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Values to match.
    pub elements: BTreeSet<String>,
    /// Field name as supplied by the caller.
    pub field_name: String,
    /// Keys present in the parameters but not expected.
    pub unexpected_keys: Vec<String>,
}

impl FetchRequest {
    /// Builds a request from typed values.
    #[must_use]
    pub fn new(elements: impl IntoIterator<Item = String>, field_name: impl Into<String>) -> Self {
        let field_name = field_name.into();
        let canonical_hids = HandleField::parse(&field_name) == Some(HandleField::Hid);
        let elements = elements
            .into_iter()
            .map(|value| {
                if canonical_hids { HandleId::canonical(&value).into_string() } else { value }
            })
            .collect();
        Self { elements, field_name, unexpected_keys: Vec::new() }
    }

    /// Parses a JSON parameter object.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when either key is missing or malformed.
    pub fn from_params(params: &Value) -> Result<Self, ValidationError> {
        let Value::Object(map) = params else {
            return Err(ValidationError::invalid("params", "expected a JSON object"));
        };
        let missing: Vec<&'static str> = [ELEMENTS_KEY, FIELD_NAME_KEY]
            .into_iter()
            .filter(|key| map.get(*key).is_none_or(Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingParameters(missing));
        }
        let field_name = match map.get(FIELD_NAME_KEY) {
            Some(Value::String(name)) => name.clone(),
            _ => return Err(ValidationError::invalid(FIELD_NAME_KEY, "expected a string")),
        };
        let elements = map
            .get(ELEMENTS_KEY)
            .map_or_else(|| Ok(Vec::new()), |value| parse_string_list(value, ELEMENTS_KEY))?;
        let mut request = Self::new(elements, field_name);
        request.unexpected_keys = map
            .keys()
            .filter(|key| key.as_str() != ELEMENTS_KEY && key.as_str() != FIELD_NAME_KEY)
            .cloned()
            .collect();
        Ok(request)
    }

    /// Returns the recognized field, or `None` for names outside the catalogue.
    #[must_use]
    pub fn field(&self) -> Option<HandleField> {
        HandleField::parse(&self.field_name)
    }
}

// ============================================================================
// SECTION: Handle References
// ============================================================================

/// Minimal view of a handle submitted for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleRef {
    /// Handle id to delete.
    pub hid: HandleId,
    /// Creator claimed by the submitted record.
    pub created_by: Option<UserId>,
}

impl HandleRef {
    /// Parses a submitted handle record, ignoring fields other than
    /// `hid` and `created_by`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the record is not an object or has no
    /// usable handle id.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let Value::Object(map) = value else {
            return Err(ValidationError::invalid("handle", "expected a JSON object"));
        };
        let hid = map
            .get(HandleField::Hid.as_str())
            .map(|value| parse_hid(value, HandleField::Hid.as_str()))
            .transpose()?
            .ok_or_else(|| ValidationError::MissingRequiredFields(vec![HandleField::Hid.as_str()]))?;
        let created_by = match map.get(HandleField::CreatedBy.as_str()) {
            None | Some(Value::Null) => None,
            Some(Value::String(user)) if user.is_empty() => None,
            Some(Value::String(user)) => Some(UserId::new(user.clone())),
            Some(_) => {
                return Err(ValidationError::invalid("created_by", "expected a string"));
            }
        };
        Ok(Self { hid, created_by })
    }
}

impl From<&Handle> for HandleRef {
    fn from(handle: &Handle) -> Self {
        Self { hid: handle.hid.clone(), created_by: Some(handle.created_by.clone()) }
    }
}

// ============================================================================
// SECTION: List Parsing
// ============================================================================

/// Parses a JSON array of handle ids (strings or integers).
///
/// # Errors
///
/// Returns [`ValidationError`] when `value` is not an array of ids.
pub fn parse_hid_list(value: &Value, name: &str) -> Result<Vec<HandleId>, ValidationError> {
    let Value::Array(items) = value else {
        return Err(ValidationError::invalid(name, "expected an array"));
    };
    items.iter().map(|item| parse_hid(item, name)).collect()
}

/// Parses a JSON array of identifiers (strings or integers) into strings.
///
/// # Errors
///
/// Returns [`ValidationError`] when `value` is not an array of scalars.
pub fn parse_string_list(value: &Value, name: &str) -> Result<Vec<String>, ValidationError> {
    let Value::Array(items) = value else {
        return Err(ValidationError::invalid(name, "expected an array"));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(text) => Ok(text.clone()),
            Value::Number(number) if number.is_i64() || number.is_u64() => Ok(number.to_string()),
            _ => Err(ValidationError::invalid(name, "expected strings or integers")),
        })
        .collect()
}

/// Parses one handle id from a string or integer value.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidValue`] for empty strings, non-integer
/// numbers, and other JSON types.
pub fn parse_hid(value: &Value, name: &str) -> Result<HandleId, ValidationError> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Ok(HandleId::canonical(text)),
        Value::Number(number) => number
            .as_i64()
            .map(HandleId::from_number)
            .ok_or_else(|| ValidationError::invalid(name, "numeric hid must be an integer")),
        _ => Err(ValidationError::invalid(name, "expected a non-empty string or integer")),
    }
}
