// crates/handle-service-providers/tests/kbase_auth_unit.rs
// ============================================================================
// Module: KBase Auth Client Unit Tests
// Description: Tests for the auth2 identity client.
// Purpose: Validate token resolution, role grants, and error mapping.
// ============================================================================

//! ## Overview
//! Runs the auth2 client against a local `tiny_http` server:
//! - User resolution from the token endpoint
//! - Role grants combining custom roles with token expiry
//! - Invalid tokens mapping to invalid-credential errors
//! - Server failures and oversized bodies mapping to upstream errors

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
use std::sync::mpsc;
use std::thread;

use handle_service_core::Credential;
use handle_service_core::IdentityError;
use handle_service_core::IdentityService;
use handle_service_core::UserId;
use handle_service_providers::HttpClientConfig;
use handle_service_providers::KBaseAuthClient;
use handle_service_providers::KBaseAuthConfig;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn fake_auth(
    replies: Vec<(u16, String)>,
) -> (String, mpsc::Receiver<(String, Option<String>)>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (sender, receiver) = mpsc::channel();
    let handle = thread::spawn(move || {
        for (status, body) in replies {
            let Ok(request) = server.recv() else { return };
            let authorization = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Authorization"))
                .map(|header| header.value.as_str().to_string());
            sender.send((request.url().to_string(), authorization)).unwrap();
            let _ = request.respond(Response::from_string(body).with_status_code(status));
        }
    });
    (format!("http://{addr}/services/auth"), receiver, handle)
}

fn client(url: &str, max_response_bytes: usize) -> KBaseAuthClient {
    let config = KBaseAuthConfig {
        url: url.to_string(),
        http: HttpClientConfig {
            allow_http: true,
            timeout_ms: 2_000,
            max_response_bytes,
            ..HttpClientConfig::default()
        },
    };
    KBaseAuthClient::new(&config).unwrap()
}

// ============================================================================
// SECTION: Users
// ============================================================================

#[test]
fn resolve_user_reads_token_endpoint() {
    let (url, seen, handle) = fake_auth(vec![(
        200,
        r#"{"type":"Login","user":"alice","expires":1700000300000,"created":1700000000000}"#.to_string(),
    )]);
    let user = client(&url, 4096).resolve_user(&Credential::new("tok-a")).unwrap();
    assert_eq!(user, UserId::new("alice"));
    let (path, authorization) = seen.recv().unwrap();
    assert_eq!(path, "/services/auth/api/V2/token");
    assert_eq!(authorization.as_deref(), Some("tok-a"));
    handle.join().unwrap();
}

#[test]
fn invalid_token_is_an_invalid_credential() {
    let (url, _seen, handle) = fake_auth(vec![(
        401,
        r#"{"error":{"httpcode":401,"appcode":10020,"message":"10020 Invalid token"}}"#.to_string(),
    )]);
    let err = client(&url, 4096).resolve_user(&Credential::new("stale")).unwrap_err();
    match err {
        IdentityError::InvalidCredential(message) => assert_eq!(message, "10020 Invalid token"),
        other => panic!("unexpected error: {other:?}"),
    }
    handle.join().unwrap();
}

#[test]
fn blank_credential_never_leaves_the_process() {
    let config = KBaseAuthConfig::new("https://auth.example.org");
    let client = KBaseAuthClient::new(&config).unwrap();
    let err = client.resolve_user(&Credential::new("   ")).unwrap_err();
    assert!(matches!(err, IdentityError::InvalidCredential(_)));
}

// ============================================================================
// SECTION: Roles
// ============================================================================

#[test]
fn resolve_roles_combines_custom_roles_with_token_expiry() {
    let (url, seen, handle) = fake_auth(vec![
        (200, r#"{"user":"root","expires":1700000300000}"#.to_string()),
        (200, r#"{"user":"root","customroles":["HANDLE_ADMIN","DEV"]}"#.to_string()),
    ]);
    let grant = client(&url, 4096).resolve_roles(&Credential::new("tok-root")).unwrap();
    let expected: BTreeSet<String> = ["DEV", "HANDLE_ADMIN"].into_iter().map(String::from).collect();
    assert_eq!(grant.roles, expected);
    assert_eq!(grant.expires_at, Some(1_700_000_300_000));

    assert_eq!(seen.recv().unwrap().0, "/services/auth/api/V2/token");
    assert_eq!(seen.recv().unwrap().0, "/services/auth/api/V2/me");
    handle.join().unwrap();
}

#[test]
fn missing_roles_and_expiry_default_to_empty() {
    let (url, _seen, handle) = fake_auth(vec![
        (200, r#"{"user":"bob","expires":null}"#.to_string()),
        (200, r#"{"user":"bob"}"#.to_string()),
    ]);
    let grant = client(&url, 4096).resolve_roles(&Credential::new("tok-bob")).unwrap();
    assert!(grant.roles.is_empty());
    assert_eq!(grant.expires_at, None);
    handle.join().unwrap();
}

// ============================================================================
// SECTION: Failures
// ============================================================================

#[test]
fn server_errors_are_unavailable() {
    let (url, _seen, handle) = fake_auth(vec![(503, "maintenance".to_string())]);
    let err = client(&url, 4096).resolve_user(&Credential::new("tok")).unwrap_err();
    assert!(matches!(err, IdentityError::Unavailable(_)));
    handle.join().unwrap();
}

#[test]
fn oversized_and_malformed_bodies_are_malformed() {
    let (url, _seen, handle) = fake_auth(vec![
        (200, format!(r#"{{"user":"{}"}}"#, "a".repeat(256))),
        (200, r#"{"expires":5}"#.to_string()),
    ]);
    let client = client(&url, 64);
    let err = client.resolve_user(&Credential::new("tok")).unwrap_err();
    assert!(matches!(err, IdentityError::Malformed(_)));
    let err = client.resolve_user(&Credential::new("tok")).unwrap_err();
    assert!(matches!(err, IdentityError::Malformed(_)));
    handle.join().unwrap();
}
