// crates/handle-service-server/tests/rpc_dispatch.rs
// ============================================================================
// Module: RPC Dispatch Tests
// Description: Method routing, parameter decoding, and result encoding.
// Purpose: Validate the `AbstractHandle.*` surface against in-memory backends.
// ============================================================================

//! ## Overview
//! Drives [`RpcRouter::dispatch`] with positional JSON parameters the way the
//! HTTP layer does, covering authentication, flag encoding, and admin checks.

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
use std::sync::Arc;

use handle_service_core::Credential;
use handle_service_core::HandleService;
use handle_service_core::HandleServiceError;
use handle_service_core::InMemoryHandleStore;
use handle_service_core::InMemoryObjectStore;
use handle_service_core::LifecycleConfig;
use handle_service_core::ManualClock;
use handle_service_core::NoopAuditSink;
use handle_service_core::ReadPrincipal;
use handle_service_core::StaticIdentityService;
use handle_service_core::UserId;
use handle_service_server::RpcError;
use handle_service_server::RpcMethod;
use handle_service_server::RpcRouter;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

type Router = RpcRouter<InMemoryHandleStore, InMemoryObjectStore, StaticIdentityService>;

fn router() -> (Router, InMemoryObjectStore) {
    let identity = StaticIdentityService::new()
        .with_token("alice-token", "alice", &[])
        .with_token("bob-token", "bob", &[])
        .with_token("admin-token", "root", &["HANDLE_ADMIN"]);
    let objects = InMemoryObjectStore::new(identity.clone());
    let config = LifecycleConfig {
        admin_roles: BTreeSet::from(["HANDLE_ADMIN".to_string()]),
        ..LifecycleConfig::default()
    };
    let service = HandleService::new(
        InMemoryHandleStore::new(),
        objects.clone(),
        identity,
        Arc::new(ManualClock::new(1_700_000_000_000)),
        Arc::new(NoopAuditSink),
        config,
    );
    (RpcRouter::new(service), objects)
}

fn dispatch(router: &Router, method: &str, params: &[Value], token: &str) -> Result<Value, RpcError> {
    router.dispatch(&format!("AbstractHandle.{method}"), params, Some(Credential::new(token)))
}

fn persist(router: &Router, node: &str, token: &str) -> String {
    let body = json!({
        "id": node,
        "file_name": "reads.fastq",
        "type": "shock",
        "url": "https://shock.example.org",
    });
    match dispatch(router, "persist_handle", &[body], token).unwrap() {
        Value::String(hid) => hid,
        other => panic!("expected string hid, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Routing
// ============================================================================

#[test]
fn method_names_round_trip_with_prefix() {
    for method in RpcMethod::ALL {
        let qualified = format!("AbstractHandle.{}", method.as_str());
        assert_eq!(RpcMethod::parse(&qualified), Some(method));
    }
    assert_eq!(RpcMethod::parse("status"), None);
    assert_eq!(RpcMethod::parse("Other.status"), None);
}

#[test]
fn status_needs_no_credential() {
    let (router, _) = router();
    let status = router.dispatch("AbstractHandle.status", &[], None).unwrap();
    assert_eq!(status["state"], "OK");
    assert_eq!(status["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn other_methods_require_a_credential() {
    let (router, _) = router();
    let err = router.dispatch("AbstractHandle.hids_to_handles", &[json!([])], None).unwrap_err();
    assert!(matches!(err, RpcError::Service(HandleServiceError::Authorization(_))), "got {err:?}");
}

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

#[test]
fn persisted_handles_are_fetchable_by_every_lookup() {
    let (router, _) = router();
    let hid = persist(&router, "node-1", "alice-token");

    let by_hid = dispatch(&router, "hids_to_handles", &[json!([hid])], "bob-token").unwrap();
    assert_eq!(by_hid[0]["file_name"], "reads.fastq");
    assert_eq!(by_hid[0]["created_by"], "alice");

    let by_id = dispatch(&router, "ids_to_handles", &[json!(["node-1"])], "bob-token").unwrap();
    assert_eq!(by_id[0]["hid"], hid.as_str());

    let fetched = dispatch(
        &router,
        "fetch_handles_by",
        &[json!({"elements": ["node-1", "node-9"], "field_name": "id"})],
        "bob-token",
    )
    .unwrap();
    assert_eq!(fetched.as_array().map(Vec::len), Some(1));
}

#[test]
fn delete_returns_count_and_enforces_ownership() {
    let (router, _) = router();
    let first = persist(&router, "node-1", "alice-token");
    let second = persist(&router, "node-2", "alice-token");
    let records = dispatch(&router, "hids_to_handles", &[json!([first, second])], "alice-token")
        .unwrap();

    let err = dispatch(&router, "delete_handles", &[records.clone()], "bob-token").unwrap_err();
    assert!(matches!(err, RpcError::Service(HandleServiceError::Ownership(_))), "got {err:?}");

    let deleted = dispatch(&router, "delete_handles", &[records], "alice-token").unwrap();
    assert_eq!(deleted, json!(2));

    let err = dispatch(&router, "delete_handles", &[json!("KBH_1")], "alice-token").unwrap_err();
    assert!(matches!(err, RpcError::InvalidParams(_)));
}

// ============================================================================
// SECTION: Authorization
// ============================================================================

#[test]
fn ownership_and_readability_are_encoded_as_flags() {
    let (router, objects) = router();
    objects.add_node("node-1", "alice");
    let hid = persist(&router, "node-1", "alice-token");

    assert_eq!(dispatch(&router, "is_owner", &[json!([hid])], "alice-token").unwrap(), json!(1));
    assert_eq!(dispatch(&router, "is_readable", &[json!(hid)], "alice-token").unwrap(), json!(1));
    assert_eq!(dispatch(&router, "is_readable", &[json!(hid)], "bob-token").unwrap(), json!(0));
    assert_eq!(dispatch(&router, "are_readable", &[json!([hid])], "bob-token").unwrap(), json!(0));
    assert_eq!(dispatch(&router, "are_readable", &[json!([])], "bob-token").unwrap(), json!(1));
}

#[test]
fn read_grants_require_admin_and_accept_optional_username() {
    let (router, objects) = router();
    objects.add_node("node-1", "alice");
    let hid = persist(&router, "node-1", "alice-token");

    let err = dispatch(&router, "add_read_acl", &[json!([hid]), json!("bob")], "alice-token")
        .unwrap_err();
    assert!(matches!(err, RpcError::Service(HandleServiceError::Authorization(_))), "got {err:?}");

    let granted =
        dispatch(&router, "add_read_acl", &[json!([hid]), json!(" bob ")], "admin-token").unwrap();
    assert_eq!(granted, json!(1));
    let node = objects.node("node-1").unwrap();
    assert!(node.readers.contains(&UserId::new("bob")));
    assert!(!node.public_read);

    let public = dispatch(&router, "set_public_read", &[json!([hid])], "admin-token").unwrap();
    assert_eq!(public, json!(1));
    assert!(objects.grants().iter().any(|grant| grant.principal == ReadPrincipal::Public));

    let err = dispatch(&router, "add_read_acl", &[json!([hid]), json!(7)], "admin-token")
        .unwrap_err();
    assert!(matches!(err, RpcError::InvalidParams(_)));
}
