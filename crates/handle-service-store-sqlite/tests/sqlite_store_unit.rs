// crates/handle-service-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Handle Store Unit Tests
// Description: Targeted tests for the SQLite handle store.
// Purpose: Validate path safety, schema versioning, CRUD semantics, and
//          storage-key projection.
// ============================================================================

//! ## Overview
//! Unit-level tests for `SQLite` store invariants:
//! - Path safety checks (length/component/directory rejection)
//! - Schema version validation
//! - Insert conflicts, missing-record updates, and delete counts
//! - Storage keys surfacing only under the storage-key projection
//! - Durability across reopen and concurrent access

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use handle_service_core::Handle;
use handle_service_core::HandleField;
use handle_service_core::HandleId;
use handle_service_core::HandleStore;
use handle_service_core::NodeId;
use handle_service_core::Projection;
use handle_service_core::StoreError;
use handle_service_core::UserId;
use handle_service_store_sqlite::SqliteHandleStore;
use handle_service_store_sqlite::SqliteStoreConfig;
use handle_service_store_sqlite::SqliteStoreError;
use handle_service_store_sqlite::SqliteStoreMode;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn sample_handle(hid: &str, node: &str, owner: &str) -> Handle {
    Handle {
        hid: HandleId::new(hid),
        id: NodeId::new(node),
        file_name: "reads.fastq".to_string(),
        backend_type: "shock".to_string(),
        url: "https://shock.example.org".to_string(),
        remote_md5: Some("d41d8cd98f00b204e9800998ecf8427e".to_string()),
        remote_sha1: None,
        created_by: UserId::new(owner),
        creation_date: "2024-01-02 03:04:05".to_string(),
    }
}

fn open_store(dir: &TempDir) -> SqliteHandleStore {
    SqliteHandleStore::new(&SqliteStoreConfig::new(dir.path().join("handles.sqlite")))
        .expect("open store")
}

fn values(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(ToString::to_string).collect()
}

// ============================================================================
// SECTION: Path Safety
// ============================================================================

#[test]
fn rejects_directory_path() {
    let dir = TempDir::new().unwrap();
    let result = SqliteHandleStore::new(&SqliteStoreConfig::new(dir.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn rejects_overlong_component() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a".repeat(300));
    let result = SqliteHandleStore::new(&SqliteStoreConfig::new(path));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn rejects_overlong_total_path() {
    let long = "b".repeat(200);
    let segments: Vec<&str> = std::iter::repeat_n(long.as_str(), 25).collect();
    let path = Path::new("/tmp").join(segments.join("/"));
    let result = SqliteHandleStore::new(&SqliteStoreConfig::new(path));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

// ============================================================================
// SECTION: Schema
// ============================================================================

#[test]
fn rejects_unknown_schema_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("handles.sqlite");
    {
        let connection = Connection::open(&path).unwrap();
        connection
            .execute_batch("CREATE TABLE store_meta (version INTEGER NOT NULL);")
            .unwrap();
        connection.execute("INSERT INTO store_meta (version) VALUES (?1)", params![99]).unwrap();
    }
    let result = SqliteHandleStore::new(&SqliteStoreConfig::new(path));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

#[test]
fn delete_journal_mode_is_accepted() {
    let dir = TempDir::new().unwrap();
    let mut config = SqliteStoreConfig::new(dir.path().join("nested/handles.sqlite"));
    config.journal_mode = SqliteStoreMode::Delete;
    let store = SqliteHandleStore::new(&config).unwrap();
    assert_eq!(store.count().unwrap(), 0);
}

// ============================================================================
// SECTION: CRUD
// ============================================================================

#[test]
fn insert_then_find_by_each_lookup_field() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.insert(&sample_handle("h1", "n1", "alice")).unwrap();
    store.insert(&sample_handle("h2", "n2", "bob")).unwrap();

    let by_hid = store.find_by_field(HandleField::Hid, &values(&["h1"]), Projection::Public).unwrap();
    assert_eq!(by_hid.len(), 1);
    assert_eq!(by_hid[0].handle, sample_handle("h1", "n1", "alice"));
    assert_eq!(by_hid[0].storage_key, None);

    let by_node = store
        .find_by_field(HandleField::Id, &values(&["n1", "n2", "n9"]), Projection::Public)
        .unwrap();
    assert_eq!(by_node.len(), 2);

    let by_owner = store
        .find_by_field(HandleField::CreatedBy, &values(&["bob"]), Projection::Public)
        .unwrap();
    assert_eq!(by_owner[0].handle.hid, HandleId::new("h2"));

    let by_sha1 =
        store.find_by_field(HandleField::RemoteSha1, &values(&[""]), Projection::Public).unwrap();
    assert!(by_sha1.is_empty());
}

#[test]
fn storage_key_only_with_projection() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.insert(&sample_handle("h1", "n1", "alice")).unwrap();
    store.insert(&sample_handle("h2", "n2", "alice")).unwrap();
    let rows = store
        .find_by_field(HandleField::CreatedBy, &values(&["alice"]), Projection::WithStorageKey)
        .unwrap();
    assert_eq!(rows.len(), 2);
    let first = rows[0].storage_key.unwrap();
    let second = rows[1].storage_key.unwrap();
    assert!(first < second);
}

#[test]
fn duplicate_insert_is_a_conflict() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.insert(&sample_handle("h1", "n1", "alice")).unwrap();
    let err = store.insert(&sample_handle("h1", "n2", "bob")).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[test]
fn update_replaces_and_missing_update_fails() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.insert(&sample_handle("h1", "n1", "alice")).unwrap();
    let mut changed = sample_handle("h1", "n1", "alice");
    changed.file_name = "renamed".to_string();
    changed.remote_md5 = None;
    store.update(&changed).unwrap();
    let rows = store.find_by_field(HandleField::Hid, &values(&["h1"]), Projection::Public).unwrap();
    assert_eq!(rows[0].handle, changed);

    let err = store.update(&sample_handle("missing", "n1", "alice")).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn delete_reports_rows_removed() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.insert(&sample_handle("h1", "n1", "alice")).unwrap();
    store.insert(&sample_handle("h2", "n2", "alice")).unwrap();
    let hids: BTreeSet<HandleId> =
        ["h1", "h2", "h3"].into_iter().map(HandleId::new).collect();
    assert_eq!(store.delete_by_hids(&hids).unwrap(), 2);
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn lookups_beyond_one_chunk_are_complete() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut wanted = BTreeSet::new();
    for index in 0..1_200 {
        let hid = format!("h{index}");
        store.insert(&sample_handle(&hid, "n", "alice")).unwrap();
        wanted.insert(hid);
    }
    let rows = store.find_by_field(HandleField::Hid, &wanted, Projection::Public).unwrap();
    assert_eq!(rows.len(), 1_200);
}

// ============================================================================
// SECTION: Durability
// ============================================================================

#[test]
fn records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir);
        store.insert(&sample_handle("h1", "n1", "alice")).unwrap();
    }
    let store = open_store(&dir);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn corrupt_rows_are_reported() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.insert(&sample_handle("h1", "n1", "alice")).unwrap();
    {
        let connection = Connection::open(dir.path().join("handles.sqlite")).unwrap();
        connection.execute("UPDATE handles SET url = '' WHERE hid = 'h1'", params![]).unwrap();
    }
    let err =
        store.find_by_field(HandleField::Hid, &values(&["h1"]), Projection::Public).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

#[test]
fn concurrent_inserts_are_serialized() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(&dir));
    let mut workers = Vec::new();
    for worker in 0..4 {
        let store = Arc::clone(&store);
        workers.push(thread::spawn(move || {
            for index in 0..25 {
                let hid = format!("w{worker}-{index}");
                store.insert(&sample_handle(&hid, "n", "alice")).unwrap();
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(store.count().unwrap(), 100);
}
