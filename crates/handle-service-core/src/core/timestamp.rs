// crates/handle-service-core/src/core/timestamp.rs
// ============================================================================
// Module: Handle Service Time Model
// Description: Creation-date formatting for handle records.
// Purpose: Render host-supplied timestamps in the stored handle format.
// Dependencies: time
// ============================================================================

//! ## Overview
//! The core never reads wall-clock time directly. Hosts inject a
//! [`crate::interfaces::Clock`] and the runtime converts its unix-millisecond
//! readings into the `YYYY-MM-DD HH:MM:SS` UTC strings stored on handles.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Formatting
// ============================================================================

/// Stored creation-date layout (UTC, second precision).
const CREATION_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Fallback used when a timestamp falls outside the representable range.
const EPOCH_CREATION_DATE: &str = "1970-01-01 00:00:00";

/// Formats unix milliseconds as a handle creation date.
///
/// Timestamps outside the range supported by `time` collapse to the epoch.
#[must_use]
pub fn format_creation_date(unix_millis: i64) -> String {
    let nanos = i128::from(unix_millis) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|instant| instant.format(CREATION_DATE_FORMAT).ok())
        .unwrap_or_else(|| EPOCH_CREATION_DATE.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
