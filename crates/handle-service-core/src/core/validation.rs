// crates/handle-service-core/src/core/validation.rs
// ============================================================================
// Module: Handle Validation Errors
// Description: Structured failures for malformed payloads and parameters.
// Purpose: Report client-side input problems without touching storage.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Validation failures are raised before any store or gateway access. They
//! always describe caller input, never server state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Input validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Handle payload lacks one or more mandatory fields.
    #[error("missing one or more required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<&'static str>),
    /// Operation parameters lack one or more mandatory keys.
    #[error("required keys {} not in supplied parameters", .0.join(", "))]
    MissingParameters(Vec<&'static str>),
    /// A field or parameter had the wrong shape.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Field or parameter name.
        field: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl ValidationError {
    /// Builds an [`ValidationError::InvalidValue`].
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue { field: field.into(), reason: reason.into() }
    }
}
