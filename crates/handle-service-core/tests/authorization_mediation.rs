// crates/handle-service-core/tests/authorization_mediation.rs
// ============================================================================
// Module: Authorization Mediation Tests
// Description: Ownership, readability, and read-grant flows.
// Purpose: Validate remote-store mediation, admin checks, and role caching.
// ============================================================================

//! ## Overview
//! Exercises the authorization operations against the in-memory object store:
//! - `is_owner` / `are_readable` / `is_readable` answers and vacuous truth
//! - Unsupported backend rejection before any remote call
//! - Admin-only grants, service-credential use, and cache reuse
//! - Upstream failures surfacing as upstream errors

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
use std::time::Duration;

use handle_service_core::AuditEventKind;
use handle_service_core::AuditOutcome;
use handle_service_core::Caller;
use handle_service_core::Credential;
use handle_service_core::HandleId;
use handle_service_core::HandleService;
use handle_service_core::HandleServiceError;
use handle_service_core::InMemoryHandleStore;
use handle_service_core::InMemoryObjectStore;
use handle_service_core::LifecycleConfig;
use handle_service_core::ManualClock;
use handle_service_core::ReadPrincipal;
use handle_service_core::RecordingAuditSink;
use handle_service_core::StaticIdentityService;
use handle_service_core::UserId;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

type Service = HandleService<InMemoryHandleStore, InMemoryObjectStore, StaticIdentityService>;

struct Harness {
    service: Service,
    identity: StaticIdentityService,
    objects: InMemoryObjectStore,
    clock: ManualClock,
    audit: RecordingAuditSink,
}

fn harness_with(service_credential: Option<&str>) -> Harness {
    let identity = StaticIdentityService::new()
        .with_token("alice-token", "alice", &[])
        .with_token("bob-token", "bob", &["DEV"])
        .with_token("admin-token", "root", &["HANDLE_ADMIN"])
        .with_token("service-token", "svc", &[]);
    let objects = InMemoryObjectStore::new(identity.clone());
    let clock = ManualClock::new(1_700_000_000_000);
    let audit = RecordingAuditSink::new();
    let config = LifecycleConfig {
        admin_roles: BTreeSet::from(["HANDLE_ADMIN".to_string()]),
        service_credential: service_credential.map(Credential::new),
        ..LifecycleConfig::default()
    };
    let service = HandleService::new(
        InMemoryHandleStore::new(),
        objects.clone(),
        identity.clone(),
        Arc::new(clock.clone()),
        Arc::new(audit.clone()),
        config,
    );
    Harness { service, identity, objects, clock, audit }
}

fn harness() -> Harness {
    harness_with(Some("service-token"))
}

fn caller(harness: &Harness, token: &str) -> Caller {
    harness.service.authenticate(Some(Credential::new(token))).expect("authenticate")
}

fn persist(harness: &Harness, who: &Caller, hid: &str, node: &str, backend: &str) -> HandleId {
    let body = json!({
        "hid": hid,
        "id": node,
        "file_name": "reads.fastq",
        "type": backend,
        "url": "https://shock.example.org",
    });
    harness.service.persist_handle(who, &body).expect("persist")
}

// ============================================================================
// SECTION: Ownership
// ============================================================================

#[test]
fn is_owner_true_only_when_caller_owns_every_node() {
    let harness = harness();
    let alice = caller(&harness, "alice-token");
    harness.objects.add_node("n1", "alice");
    harness.objects.add_node("n2", "alice");
    let h1 = persist(&harness, &alice, "h1", "n1", "shock");
    let h2 = persist(&harness, &alice, "h2", "n2", "shock");
    assert!(harness.service.is_owner(&alice, &[h1.clone(), h2]).unwrap());

    harness.objects.add_node("n3", "bob");
    harness.service.add_read_acl(&caller(&harness, "admin-token"), &[h1.clone()], None).unwrap();
    let h3 = persist(&harness, &alice, "h3", "n3", "shock");
    harness
        .service
        .set_public_read(&caller(&harness, "admin-token"), std::slice::from_ref(&h3))
        .unwrap();
    assert!(!harness.service.is_owner(&alice, &[h1, h3]).unwrap());
}

#[test]
fn empty_and_unknown_hid_sets_are_vacuously_true() {
    let harness = harness();
    let alice = caller(&harness, "alice-token");
    assert!(harness.service.is_owner(&alice, &[]).unwrap());
    assert!(harness.service.are_readable(&alice, &[HandleId::new("missing")]).unwrap());
    assert!(!harness.service.is_readable(&alice, &HandleId::new("missing")).unwrap());
}

#[test]
fn unsupported_backend_is_rejected_before_remote_calls() {
    let harness = harness();
    let alice = caller(&harness, "alice-token");
    harness.objects.add_node("n1", "alice");
    let good = persist(&harness, &alice, "h1", "n1", "shock");
    let bad = persist(&harness, &alice, "h2", "n2", "s3");
    harness.objects.set_unavailable(true);

    let err = harness.service.is_owner(&alice, &[good.clone(), bad.clone()]).unwrap_err();
    assert!(matches!(err, HandleServiceError::UnsupportedBackend(_)));
    let err = harness.service.are_readable(&alice, &[good, bad.clone()]).unwrap_err();
    assert!(matches!(err, HandleServiceError::UnsupportedBackend(_)));
    let admin = caller(&harness, "admin-token");
    let err = harness.service.add_read_acl(&admin, &[bad], None).unwrap_err();
    assert!(matches!(err, HandleServiceError::UnsupportedBackend(_)));
    assert!(harness.objects.grants().is_empty());
}

// ============================================================================
// SECTION: Readability
// ============================================================================

#[test]
fn are_readable_reflects_remote_visibility() {
    let harness = harness();
    let alice = caller(&harness, "alice-token");
    let bob = caller(&harness, "bob-token");
    harness.objects.add_node("n1", "alice");
    let h1 = persist(&harness, &alice, "h1", "n1", "shock");

    assert!(harness.service.are_readable(&alice, std::slice::from_ref(&h1)).unwrap());
    assert!(!harness.service.are_readable(&bob, std::slice::from_ref(&h1)).unwrap());
    assert!(!harness.service.is_readable(&bob, &h1).unwrap());

    let admin = caller(&harness, "admin-token");
    harness.service.add_read_acl(&admin, std::slice::from_ref(&h1), Some(UserId::new("bob"))).unwrap();
    assert!(harness.service.is_readable(&bob, &h1).unwrap());
}

#[test]
fn remote_outage_surfaces_as_upstream_error() {
    let harness = harness();
    let alice = caller(&harness, "alice-token");
    harness.objects.add_node("n1", "alice");
    let h1 = persist(&harness, &alice, "h1", "n1", "shock");
    harness.objects.set_unavailable(true);
    let err = harness.service.are_readable(&alice, &[h1]).unwrap_err();
    assert!(matches!(err, HandleServiceError::Upstream(_)));
}

// ============================================================================
// SECTION: Read Grants
// ============================================================================

#[test]
fn add_read_acl_requires_admin_role() {
    let harness = harness();
    let bob = caller(&harness, "bob-token");
    harness.objects.add_node("n1", "bob");
    let h1 = persist(&harness, &bob, "h1", "n1", "shock");
    let err = harness.service.add_read_acl(&bob, &[h1], Some(UserId::new("alice"))).unwrap_err();
    assert!(matches!(err, HandleServiceError::Authorization(_)));
    assert!(harness.objects.grants().is_empty());

    let checks = harness.audit.events_of(AuditEventKind::AdminCheck);
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].outcome, AuditOutcome::Deny);
    assert_eq!(checks[0].detail.as_deref(), Some("cache miss"));
}

#[test]
fn grants_use_the_service_credential() {
    let harness = harness();
    let alice = caller(&harness, "alice-token");
    harness.objects.add_node("n1", "alice");
    let h1 = persist(&harness, &alice, "h1", "n1", "shock");
    let admin = caller(&harness, "admin-token");
    assert!(harness.service.add_read_acl(&admin, &[h1], Some(UserId::new("bob"))).unwrap());

    let grants = harness.objects.grants();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].granted_by, UserId::new("svc"));
    assert_eq!(grants[0].principal, ReadPrincipal::User(UserId::new("bob")));
    assert!(harness.objects.node("n1").unwrap().readers.contains(&UserId::new("bob")));
}

#[test]
fn grants_fall_back_to_caller_credential() {
    let harness = harness_with(None);
    let alice = caller(&harness, "alice-token");
    harness.objects.add_node("n1", "alice");
    let h1 = persist(&harness, &alice, "h1", "n1", "shock");
    let admin = caller(&harness, "admin-token");
    assert!(harness.service.set_public_read(&admin, &[h1]).unwrap());
    let grants = harness.objects.grants();
    assert_eq!(grants[0].granted_by, UserId::new("root"));
    assert!(harness.objects.node("n1").unwrap().public_read);
}

// ============================================================================
// SECTION: Role Cache
// ============================================================================

#[test]
fn admin_roles_are_cached_until_ttl_expires() {
    let harness = harness();
    let admin = caller(&harness, "admin-token");
    assert!(harness.service.is_admin(&admin).unwrap());
    assert!(harness.service.is_admin(&admin).unwrap());
    assert_eq!(harness.identity.role_lookups(), 1);

    harness.clock.advance(Duration::from_secs(301));
    assert!(harness.service.is_admin(&admin).unwrap());
    assert_eq!(harness.identity.role_lookups(), 2);
}

#[test]
fn admin_checks_record_cache_hit_or_miss() {
    let harness = harness();
    let alice = caller(&harness, "alice-token");
    harness.objects.add_node("n1", "alice");
    let h1 = persist(&harness, &alice, "h1", "n1", "shock");
    let admin = caller(&harness, "admin-token");
    assert!(harness.service.set_public_read(&admin, &[h1.clone()]).unwrap());
    assert!(harness.service.add_read_acl(&admin, &[h1], Some(UserId::new("bob"))).unwrap());

    let checks = harness.audit.events_of(AuditEventKind::AdminCheck);
    assert_eq!(checks.len(), 2);
    assert!(checks.iter().all(|event| event.outcome == AuditOutcome::Allow));
    assert_eq!(checks[0].detail.as_deref(), Some("cache miss"));
    assert_eq!(checks[1].detail.as_deref(), Some("cache hit"));
    assert_eq!(harness.identity.role_lookups(), 1);
}

#[test]
fn credential_expiry_forces_fresh_role_lookup() {
    let harness = harness();
    harness.identity.insert_token("short-token", "temp", &["HANDLE_ADMIN"], Some(1_700_000_010_000));
    let temp = caller(&harness, "short-token");
    assert!(harness.service.is_admin(&temp).unwrap());
    harness.clock.advance(Duration::from_secs(10));
    harness.identity.insert_token("short-token", "temp", &[], None);
    assert!(!harness.service.is_admin(&temp).unwrap());
    assert_eq!(harness.identity.role_lookups(), 2);
}

#[test]
fn identity_outage_is_upstream_but_revocation_is_authorization() {
    let harness = harness();
    let admin = caller(&harness, "admin-token");
    harness.identity.set_unavailable(true);
    let err = harness.service.is_admin(&admin).unwrap_err();
    assert!(matches!(err, HandleServiceError::Upstream(_)));

    harness.identity.set_unavailable(false);
    harness.identity.revoke("alice-token");
    let err = harness.service.authenticate(Some(Credential::new("alice-token"))).unwrap_err();
    assert!(matches!(err, HandleServiceError::Authorization(_)));
}
