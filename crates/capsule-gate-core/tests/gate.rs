// crates/capsule-gate-core/tests/gate.rs
// ============================================================================
// Module: Policy Gate Tests
// Description: Digest and signature gating over single capsules and batches.
// ============================================================================
//! ## Overview
//! Exercises both gate stages, the strict-approval switch, and batch error
//! accounting. Includes the draft capsule scenario whose statement is edited
//! after digesting.

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

use std::path::PathBuf;

use capsule_gate_core::CapsuleDocument;
use capsule_gate_core::DocumentError;
use capsule_gate_core::GateEntryResult;
use capsule_gate_core::GateFailure;
use capsule_gate_core::GateOptions;
use capsule_gate_core::GateStage;
use capsule_gate_core::LoadedDocument;
use capsule_gate_core::PolicyGate;
use capsule_gate_core::SigningUpdate;
use capsule_gate_core::capsule_digest;
use capsule_gate_core::check_capsule;
use capsule_gate_core::encode_signature;
use capsule_gate_core::encode_verifying_key;
use capsule_gate_core::sign_digest;
use capsule_gate_core::with_digest;
use ed25519_dalek::SigningKey;
use serde_json::Value;
use serde_json::json;

const STRICT: GateOptions = GateOptions {
    require_signature_on_approved: true,
};

fn capsule(statement: &str, status: &str) -> CapsuleDocument {
    CapsuleDocument::from_value(json!({
        "id": "X",
        "version": "1.0.0",
        "domain": "test",
        "title": "T",
        "statement": statement,
        "provenance": {"review": {"status": status}},
        "witnesses": [{"name": "ok", "language": "bash", "code": "echo ok"}],
    }))
    .unwrap()
}

fn digested(statement: &str, status: &str) -> CapsuleDocument {
    let doc = capsule(statement, status);
    let digest = capsule_digest(&doc);
    with_digest(&doc, &digest).unwrap()
}

fn signed(doc: &CapsuleDocument, key: &SigningKey) -> CapsuleDocument {
    let digest = capsule_digest(doc);
    doc.with_signing(&SigningUpdate {
        signature: Some(encode_signature(&sign_digest(&digest, key))),
        pubkey: Some(encode_verifying_key(&key.verifying_key())),
        method: Some("ed25519".to_string()),
        key_id: Some("demo".to_string()),
        ..SigningUpdate::default()
    })
    .unwrap()
}

#[test]
fn draft_scenario_passes_then_fails_after_statement_edit() {
    let doc = digested("A", "draft");
    let outcome = check_capsule(&doc, STRICT);
    assert!(outcome.ok);
    assert!(outcome.reasons.is_empty());

    let mut body = doc.into_value();
    body["statement"] = json!("B");
    let edited = CapsuleDocument::from_value(body).unwrap();
    let outcome = check_capsule(&edited, STRICT);
    assert!(!outcome.ok);
    assert_eq!(outcome.reasons.len(), 1);
    assert_eq!(outcome.reasons[0].to_string(), "digest mismatch");
}

#[test]
fn missing_digest_fails_at_digest_stage() {
    let outcome = check_capsule(&capsule("A", "draft"), GateOptions::default());
    assert!(!outcome.ok);
    assert!(matches!(
        outcome.reasons[0],
        GateFailure::DigestMismatch {
            stored: None,
            ..
        }
    ));
}

#[test]
fn one_byte_edit_to_signed_capsule_stops_before_signature_check() {
    let key = SigningKey::from_bytes(&[11u8; 32]);
    let doc = signed(&digested("A", "approved"), &key);
    assert!(check_capsule(&doc, STRICT).ok);

    let mut body = doc.into_value();
    body["statement"] = json!("a");
    let edited = CapsuleDocument::from_value(body).unwrap();
    let outcome = check_capsule(&edited, STRICT);
    assert_eq!(outcome.reasons.len(), 1);
    assert_eq!(outcome.reasons[0].stage(), GateStage::Digest);
}

#[test]
fn approved_without_signature_fails_in_strict_mode() {
    let doc = digested("A", "approved");
    let outcome = check_capsule(&doc, STRICT);
    assert!(!outcome.ok);
    assert_eq!(outcome.reasons, vec![GateFailure::MissingSignature]);
    assert_eq!(outcome.reasons[0].to_string(), "approved requires signature+pubkey");
}

#[test]
fn approved_without_signature_passes_when_not_strict() {
    let doc = digested("A", "approved");
    assert!(check_capsule(&doc, GateOptions::default()).ok);
}

#[test]
fn approved_with_valid_signature_passes() {
    let key = SigningKey::from_bytes(&[5u8; 32]);
    let doc = signed(&digested("A", "approved"), &key);
    assert!(check_capsule(&doc, STRICT).ok);
}

#[test]
fn signature_from_other_key_fails_closed() {
    let key = SigningKey::from_bytes(&[5u8; 32]);
    let other = SigningKey::from_bytes(&[6u8; 32]);
    let doc = signed(&digested("A", "approved"), &key);
    let forged = doc
        .with_signing(&SigningUpdate {
            pubkey: Some(encode_verifying_key(&other.verifying_key())),
            ..SigningUpdate::default()
        })
        .unwrap();
    let outcome = check_capsule(&forged, STRICT);
    assert!(!outcome.ok);
    assert_eq!(outcome.reasons[0].to_string(), "signature verification failed");
    assert_eq!(outcome.reasons[0].stage(), GateStage::Signature);
}

#[test]
fn garbage_signature_material_fails_closed() {
    let doc = digested("A", "approved")
        .with_signing(&SigningUpdate {
            signature: Some("!!not base64!!".to_string()),
            pubkey: Some("AAAA".to_string()),
            ..SigningUpdate::default()
        })
        .unwrap();
    let outcome = check_capsule(&doc, STRICT);
    assert!(matches!(
        outcome.reasons[0],
        GateFailure::SignatureInvalid {
            ..
        }
    ));
}

#[test]
fn review_status_defaults_to_draft() {
    let doc = CapsuleDocument::from_value(json!({"id": "d", "statement": "s"})).unwrap();
    let digest = capsule_digest(&doc);
    let doc = with_digest(&doc, &digest).unwrap();
    assert!(check_capsule(&doc, STRICT).ok);
}

#[test]
fn batch_counts_load_failures_and_failing_capsules() {
    let documents = vec![
        LoadedDocument {
            path: PathBuf::from("a.yaml"),
            document: Ok(digested("A", "draft")),
        },
        LoadedDocument {
            path: PathBuf::from("b.yaml"),
            document: Ok(capsule("B", "draft")),
        },
        LoadedDocument {
            path: PathBuf::from("c.yaml"),
            document: Err(DocumentError::Parse("bad yaml".to_string())),
        },
    ];
    let report = PolicyGate::new(STRICT).check_batch(&documents);
    assert_eq!(report.checked, 2);
    assert_eq!(report.errors, 2);
    assert!(!report.passed());
    assert_eq!(report.entries.len(), 3);
    assert!(!report.entries[0].is_error());
    assert!(report.entries[1].is_error());
    assert!(matches!(
        report.entries[2].result,
        GateEntryResult::LoadFailed {
            ..
        }
    ));
}

#[test]
fn batch_report_serializes_reasons() {
    let documents = vec![LoadedDocument {
        path: PathBuf::from("b.yaml"),
        document: Ok(capsule("B", "draft")),
    }];
    let report = PolicyGate::new(GateOptions::default()).check_batch(&documents);
    let json: Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["errors"], json!(1));
    assert_eq!(json["entries"][0]["result"], json!("checked"));
    assert_eq!(json["entries"][0]["outcome"]["reasons"][0]["kind"], json!("digest_mismatch"));
}
