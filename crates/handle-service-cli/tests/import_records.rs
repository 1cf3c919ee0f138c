// crates/handle-service-cli/tests/import_records.rs
// ============================================================================
// Module: Legacy Import Tests
// Description: JSON-lines import against in-memory backends.
// Purpose: Ensure imports never overwrite records and keep source metadata.
// ============================================================================

//! ## Overview
//! Validates insert/skip/reject accounting, creator and creation date
//! preservation, and numeric `hid` canonicalization.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::io::Cursor;
use std::sync::Arc;

use handle_service_cli::ImportReport;
use handle_service_cli::import_records;
use handle_service_core::HandleId;
use handle_service_core::HandleService;
use handle_service_core::InMemoryHandleStore;
use handle_service_core::InMemoryObjectStore;
use handle_service_core::LifecycleConfig;
use handle_service_core::ManualClock;
use handle_service_core::NoopAuditSink;
use handle_service_core::StaticIdentityService;
use handle_service_core::UserId;

// ============================================================================
// SECTION: Helpers
// ============================================================================

type Service = HandleService<InMemoryHandleStore, InMemoryObjectStore, StaticIdentityService>;

const NOW: i64 = 1_700_000_000_000;

fn service() -> Service {
    let identity = StaticIdentityService::new();
    HandleService::new(
        InMemoryHandleStore::new(),
        InMemoryObjectStore::new(identity.clone()),
        identity,
        Arc::new(ManualClock::new(NOW)),
        Arc::new(NoopAuditSink),
        LifecycleConfig::default(),
    )
}

fn import(service: &Service, input: &str) -> ImportReport {
    import_records(service, Cursor::new(input.as_bytes().to_vec()), NOW).unwrap()
}

const RECORDS: &str = r#"
{"hid": "KBH_1", "id": "node-1", "file_name": "a.fastq", "type": "shock", "url": "https://shock.example.org", "created_by": "alice", "creation_date": "2019-04-01 10:00:00"}
{"hid": 42, "id": "node-2", "file_name": "b.fastq", "type": "shock", "url": "https://shock.example.org", "created_by": "bob"}

{"hid": "KBH_3", "id": "node-3", "file_name": "c.fastq", "type": "shock", "url": "https://shock.example.org"}
{"id": "node-4", "file_name": "d.fastq", "type": "shock", "url": "https://shock.example.org", "created_by": "carol"}
not json
{"hid": "KBH_5", "id": "node-5", "type": "shock", "url": "https://shock.example.org", "created_by": "dave"}
"#;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn counts_inserted_and_rejected_records() {
    let service = service();
    let report = import(&service, RECORDS);
    assert_eq!(report, ImportReport { inserted: 2, skipped: 0, rejected: 4 });
}

#[test]
fn keeps_source_creator_and_creation_date() {
    let service = service();
    import(&service, RECORDS);

    let first = service.hids_to_handles(&[HandleId::new("KBH_1")]).unwrap();
    assert_eq!(first[0].created_by, UserId::new("alice"));
    assert_eq!(first[0].creation_date, "2019-04-01 10:00:00");

    let numeric = service.hids_to_handles(&[HandleId::new("42")]).unwrap();
    assert_eq!(numeric[0].created_by, UserId::new("bob"));
    assert_eq!(numeric[0].creation_date, "2023-11-14 22:13:20");
}

#[test]
fn rerun_skips_existing_records_without_overwriting() {
    let service = service();
    import(&service, RECORDS);
    let changed = r#"{"hid": "KBH_1", "id": "node-9", "file_name": "z.fastq", "type": "shock", "url": "https://shock.example.org", "created_by": "mallory"}"#;

    let report = import(&service, changed);
    assert_eq!(report, ImportReport { inserted: 0, skipped: 1, rejected: 0 });
    let stored = service.hids_to_handles(&[HandleId::new("KBH_1")]).unwrap();
    assert_eq!(stored[0].file_name, "a.fastq");
    assert_eq!(stored[0].created_by, UserId::new("alice"));
}

#[test]
fn empty_input_imports_nothing() {
    let service = service();
    assert_eq!(import(&service, "\n  \n"), ImportReport::default());
}
