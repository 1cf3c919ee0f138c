// crates/handle-service-cli/src/import.rs
// ============================================================================
// Module: Legacy Import
// Description: Bulk load of handle records from JSON lines.
// Purpose: Move records exported from an existing deployment into the store.
// Dependencies: handle-service-core, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! Each non-blank input line holds one handle object. A record is inserted
//! only when its `hid` is not already stored; existing records are counted as
//! skipped and never overwritten. Records are normalized with their own
//! `created_by` as the acting user, and a non-empty `creation_date` from the
//! source is kept. Records that fail to parse or validate are counted as
//! rejected and logged with their line number; store failures abort the run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::BufRead;

use handle_service_core::Handle;
use handle_service_core::HandleService;
use handle_service_core::HandleServiceError;
use handle_service_core::HandleStore;
use handle_service_core::IdentityService;
use handle_service_core::ObjectStoreGateway;
use handle_service_core::runtime::HandleDraft;
use handle_service_core::runtime::normalize_handle;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of one input record.
pub const MAX_RECORD_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Report
// ============================================================================

/// Outcome counts of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Records written to the store.
    pub inserted: u64,
    /// Records whose `hid` was already stored.
    pub skipped: u64,
    /// Records that failed to parse or validate.
    pub rejected: u64,
}

/// Import failures that stop the run.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The input could not be read.
    #[error("failed to read input at line {line}: {source}")]
    Io {
        /// One-based line number.
        line: u64,
        /// Underlying read error.
        source: std::io::Error,
    },
    /// The store refused a write.
    #[error("store write failed at line {line}: {source}")]
    Store {
        /// One-based line number.
        line: u64,
        /// Underlying engine error.
        source: HandleServiceError,
    },
}

// ============================================================================
// SECTION: Import
// ============================================================================

/// Imports JSON-lines handle records through `service`.
///
/// `now_millis` stamps records that carry no `creation_date`.
///
/// # Errors
///
/// Returns [`ImportError`] when the input cannot be read or the store fails.
pub fn import_records<S, G, I>(
    service: &HandleService<S, G, I>,
    reader: impl BufRead,
    now_millis: i64,
) -> Result<ImportReport, ImportError>
where
    S: HandleStore,
    G: ObjectStoreGateway,
    I: IdentityService,
{
    let mut report = ImportReport::default();
    for (index, line) in (1_u64..).zip(reader.lines()) {
        let line = line.map_err(|source| ImportError::Io { line: index, source })?;
        if line.trim().is_empty() {
            continue;
        }
        let handle = match parse_record(&line, now_millis) {
            Ok(handle) => handle,
            Err(reason) => {
                tracing::warn!(line = index, reason = reason.as_str(), "import record rejected");
                report.rejected += 1;
                continue;
            }
        };
        match service.insert_if_absent(&handle) {
            Ok(true) => report.inserted += 1,
            Ok(false) => report.skipped += 1,
            Err(HandleServiceError::Validation(err)) => {
                tracing::warn!(line = index, reason = %err, "import record rejected");
                report.rejected += 1;
            }
            Err(source) => return Err(ImportError::Store { line: index, source }),
        }
    }
    tracing::info!(
        inserted = report.inserted,
        skipped = report.skipped,
        rejected = report.rejected,
        "import finished"
    );
    Ok(report)
}

/// Parses and normalizes one record, returning the rejection reason on failure.
fn parse_record(line: &str, now_millis: i64) -> Result<Handle, String> {
    if line.len() > MAX_RECORD_BYTES {
        return Err(format!("record exceeds {MAX_RECORD_BYTES} bytes"));
    }
    let value: Value = serde_json::from_str(line).map_err(|err| format!("invalid json: {err}"))?;
    let draft = HandleDraft::from_payload(&value).map_err(|err| err.to_string())?;
    if draft.hid.is_none() {
        return Err("record has no hid".to_string());
    }
    let Some(creator) = draft.created_by.clone() else {
        return Err("record has no created_by".to_string());
    };
    normalize_handle(draft, &creator, now_millis).map_err(|err| err.to_string())
}
