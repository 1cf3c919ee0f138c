// crates/handle-service-core/tests/normalize_properties.rs
// ============================================================================
// Module: Normalizer Property Tests
// Description: Property coverage for payload normalization.
// Purpose: Ensure normalized handles always satisfy the record invariants.
// ============================================================================

//! ## Overview
//! Generates arbitrary payloads mixing recognized and foreign keys and checks
//! that normalization either rejects them for a missing required field or
//! yields a record with every required field populated, no empty checksum,
//! a defaulted creator, and a creation date that is the supplied one when
//! present.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    reason = "Test-only assertions and helpers are permitted."
)]

use handle_service_core::runtime::HandleDraft;
use handle_service_core::HandleId;
use handle_service_core::UserId;
use handle_service_core::ValidationError;
use handle_service_core::runtime::normalize_handle;
use handle_service_core::runtime::normalize_payload;
use proptest::prelude::*;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Strategies
// ============================================================================

fn optional_text() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), Just(Some(String::new())), "[a-z0-9_]{1,12}".prop_map(Some)]
}

fn optional_date() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        "20[0-9]{2}-0[1-9]-1[0-9] 0[0-9]:00:00".prop_map(Some)
    ]
}

fn payload() -> impl Strategy<Value = Value> {
    (
        optional_text(),
        optional_text(),
        optional_text(),
        optional_text(),
        optional_text(),
        optional_text(),
        optional_date(),
        "[a-z]{1,8}",
    )
        .prop_map(|(id, file_name, backend, url, md5, creator, created_at, extra)| {
            let mut map = Map::new();
            for (key, value) in [
                ("id", id),
                ("file_name", file_name),
                ("type", backend),
                ("url", url),
                ("remote_md5", md5),
                ("created_by", creator),
                ("creation_date", created_at),
            ] {
                if let Some(value) = value {
                    map.insert(key.to_string(), Value::String(value));
                }
            }
            map.insert(format!("x_{extra}"), Value::Bool(true));
            Value::Object(map)
        })
}

fn present(payload: &Value, key: &str) -> bool {
    payload.get(key).and_then(Value::as_str).is_some_and(|text| !text.is_empty())
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn normalized_handles_satisfy_record_invariants(body in payload()) {
        let acting = UserId::new("actor");
        let result = normalize_payload(&body, &acting, 0);
        let complete = ["id", "file_name", "type", "url"].iter().all(|key| present(&body, key));
        match result {
            Ok(handle) => {
                prop_assert!(complete);
                prop_assert!(!handle.hid.as_str().is_empty());
                prop_assert!(!handle.id.as_str().is_empty());
                prop_assert!(!handle.file_name.is_empty());
                prop_assert!(!handle.backend_type.is_empty());
                prop_assert!(!handle.url.is_empty());
                prop_assert!(handle.remote_md5.as_deref() != Some(""));
                if !present(&body, "created_by") {
                    prop_assert_eq!(handle.created_by, acting);
                }
                if present(&body, "creation_date") {
                    let supplied = body["creation_date"].as_str();
                    prop_assert_eq!(Some(handle.creation_date.as_str()), supplied);
                } else {
                    prop_assert_eq!(handle.creation_date.as_str(), "1970-01-01 00:00:00");
                }
            }
            Err(ValidationError::MissingRequiredFields(missing)) => {
                prop_assert!(!complete);
                prop_assert!(!missing.is_empty());
            }
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    #[test]
    fn integer_hids_canonicalize_like_strings(number in any::<i64>()) {
        let from_number = HandleId::from_number(number);
        let from_string = HandleId::canonical(&number.to_string());
        prop_assert_eq!(from_number, from_string);
    }
}

// ============================================================================
// SECTION: Examples
// ============================================================================

#[test]
fn explicit_hid_is_kept_and_missing_hid_is_generated() {
    let acting = UserId::new("actor");
    let draft = HandleDraft {
        hid: Some(HandleId::new("KBH_9")),
        id: Some("n".into()),
        file_name: Some("f".into()),
        backend_type: Some("shock".into()),
        url: Some("u".into()),
        ..HandleDraft::default()
    };
    let kept = normalize_handle(draft.clone(), &acting, 0).unwrap();
    assert_eq!(kept.hid.as_str(), "KBH_9");

    let generated = normalize_handle(HandleDraft { hid: None, ..draft }, &acting, 0).unwrap();
    assert_eq!(generated.hid.as_str().len(), 36);
}

#[test]
fn non_string_fields_are_rejected() {
    let body = serde_json::json!({"id": 5, "file_name": "f", "type": "shock", "url": "u"});
    let err = normalize_payload(&body, &UserId::new("actor"), 0).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidValue { .. }));
}
