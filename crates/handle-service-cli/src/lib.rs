// crates/handle-service-cli/src/lib.rs
// ============================================================================
// Module: Handle Service CLI Library
// Description: Command helpers shared by the `handle-service` binary.
// Purpose: Keep command logic testable outside the process entry point.
// Dependencies: handle-service-core, tracing
// ============================================================================

//! ## Overview
//! Library half of the `handle-service` binary. The legacy import lives here
//! so it can be driven against in-memory backends in tests.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod import;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use import::ImportError;
pub use import::ImportReport;
pub use import::import_records;
