// crates/capsule-gate-core/tests/digest.rs
// ============================================================================
// Module: Capsule Digest Tests
// Description: Golden vectors, normalization, and digest check statuses.
// ============================================================================
//! ## Overview
//! Pins the capsule digest to known vectors and verifies which fields it
//! covers. Property tests check determinism and sensitivity.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use capsule_gate_core::CapsuleDocument;
use capsule_gate_core::DigestStatus;
use capsule_gate_core::capsule_digest;
use capsule_gate_core::check_digest;
use capsule_gate_core::digest_value;
use capsule_gate_core::parse_document;
use capsule_gate_core::semantic_core;
use capsule_gate_core::with_digest;
use proptest::prelude::*;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

const SCENARIO_DIGEST: &str = "c456cb425ca2e3b5ac5df22c010811239c68c34810fbc5d4219b688fd74be47a";

fn document(value: Value) -> CapsuleDocument {
    CapsuleDocument::from_value(value).expect("mapping")
}

fn scenario() -> Value {
    json!({
        "id": "X",
        "version": "1.0.0",
        "domain": "test",
        "title": "T",
        "statement": "A",
        "assumptions": ["a1"],
        "pedagogy": [{"kind": "Socratic", "text": "Why?", "extra": 1}, "junk"],
    })
}

#[test]
fn digest_matches_golden_vector() {
    assert_eq!(capsule_digest(&document(scenario())), SCENARIO_DIGEST);
}

#[test]
fn changed_statement_changes_digest() {
    let mut value = scenario();
    value["statement"] = json!("B");
    assert_eq!(
        capsule_digest(&document(value)),
        "9ac347018cd0682da3d29ec69cc875330719af4e7da18221254213ba52c3f796"
    );
}

#[test]
fn non_ascii_values_and_bad_list_fields_match_golden_vector() {
    let value = json!({
        "id": "cafe",
        "statement": "café ✓",
        "assumptions": "nope",
        "pedagogy": "nope",
    });
    assert_eq!(
        capsule_digest(&document(value)),
        "d4913b1742b1be47aa0a5a13b9af8e39653fbc012b710a9a798bc013b7d78cae"
    );
}

#[test]
fn absent_lists_encode_as_empty() {
    let value = json!({
        "id": "X",
        "version": "1.0.0",
        "domain": "test",
        "title": "T",
        "statement": "A",
    });
    assert_eq!(
        capsule_digest(&document(value)),
        "b5bd6e7f7917758677080e11890771ecc26bf4845832be2baf7780e791301d0b"
    );
}

#[test]
fn semantic_core_reduces_pedagogy_entries() {
    let core = semantic_core(&document(scenario()));
    assert_eq!(core["pedagogy"], json!([{"kind": "Socratic", "text": "Why?"}]));
    assert_eq!(core["assumptions"], json!(["a1"]));
}

#[test]
fn semantic_core_fills_missing_fields_with_null() {
    let core = semantic_core(&document(json!({"id": "only"})));
    assert_eq!(core["title"], Value::Null);
    assert_eq!(core["version"], Value::Null);
    assert_eq!(core["pedagogy"], json!([]));
}

#[test]
fn pedagogy_entry_without_text_encodes_null_text() {
    let core = semantic_core(&document(json!({"pedagogy": [{"kind": "Hint"}]})));
    assert_eq!(core["pedagogy"], json!([{"kind": "Hint", "text": null}]));
}

#[test]
fn provenance_and_witnesses_do_not_affect_digest() {
    let mut value = scenario();
    value["provenance"] = json!({"signing": {"digest": "x", "signature": "y"}, "author": "z"});
    value["witnesses"] = json!([{"name": "w", "language": "bash", "code": "true"}]);
    value["applies_to"] = json!(["anything"]);
    assert_eq!(capsule_digest(&document(value)), SCENARIO_DIGEST);
}

#[test]
fn yaml_and_json_sources_agree() {
    let yaml = "\
id: X
version: 1.0.0
domain: test
title: T
statement: A
assumptions:
  - a1
pedagogy:
  - kind: Socratic
    text: Why?
    extra: 1
  - junk
";
    let parsed = parse_document(yaml).unwrap();
    assert_eq!(capsule_digest(&parsed), SCENARIO_DIGEST);
}

#[test]
fn digest_value_rejects_non_mapping() {
    assert!(digest_value(&json!(["not", "a", "capsule"])).is_err());
    assert!(digest_value(&Value::Null).is_err());
}

#[test]
fn check_digest_reports_missing_ok_and_mismatch() {
    let doc = document(scenario());
    let missing = check_digest(&doc);
    assert_eq!(missing.status, DigestStatus::Missing);
    assert!(missing.needs_update());

    let stamped = with_digest(&doc, SCENARIO_DIGEST).unwrap();
    let ok = check_digest(&stamped);
    assert_eq!(ok.status, DigestStatus::Ok);
    assert_eq!(ok.stored.as_deref(), Some(SCENARIO_DIGEST));
    assert!(!ok.needs_update());

    let stale = with_digest(&doc, "deadbeef").unwrap();
    let mismatch = check_digest(&stale);
    assert_eq!(mismatch.status, DigestStatus::Mismatch);
    assert_eq!(mismatch.computed, SCENARIO_DIGEST);
}

#[test]
fn with_digest_keeps_existing_signing_fields() {
    let mut value = scenario();
    value["provenance"] = json!({"signing": {"key_id": "ops", "digest": "old"}});
    let updated = with_digest(&document(value), "new").unwrap();
    let signing = updated.signing();
    assert_eq!(signing.digest.as_deref(), Some("new"));
    assert_eq!(signing.key_id.as_deref(), Some("ops"));
}

#[test]
fn with_digest_rejects_scalar_provenance() {
    let mut value = scenario();
    value["provenance"] = json!("nope");
    assert!(with_digest(&document(value), "d").is_err());
}

fn field_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|v| Value::Number(v.into())),
        "\\PC{0,12}".prop_map(Value::String),
    ]
}

proptest! {
    #[test]
    fn digest_ignores_key_insertion_order(
        statement in "\\PC{0,24}",
        title in field_strategy(),
        assumptions in prop::collection::vec("\\PC{0,8}", 0 .. 4),
    ) {
        let entries = vec![
            ("id".to_string(), json!("p")),
            ("title".to_string(), title),
            ("statement".to_string(), Value::String(statement)),
            ("assumptions".to_string(), json!(assumptions)),
            ("notes".to_string(), json!("ignored")),
        ];
        let forward: Map<String, Value> = entries.iter().cloned().collect();
        let reverse: Map<String, Value> = entries.iter().rev().cloned().collect();
        prop_assert_eq!(
            capsule_digest(&document(Value::Object(forward))),
            capsule_digest(&document(Value::Object(reverse)))
        );
    }

    #[test]
    fn digest_tracks_statement_changes(a in "\\PC{0,24}", b in "\\PC{0,24}") {
        prop_assume!(a != b);
        let mut left = scenario();
        left["statement"] = Value::String(a);
        let mut right = scenario();
        right["statement"] = Value::String(b);
        prop_assert_ne!(capsule_digest(&document(left)), capsule_digest(&document(right)));
    }

    #[test]
    fn digest_ignores_non_core_fields(extra in field_strategy()) {
        let mut value = scenario();
        value["witnesses"] = extra.clone();
        value["provenance"] = json!({"note": extra});
        prop_assert_eq!(capsule_digest(&document(value)), SCENARIO_DIGEST);
    }
}
