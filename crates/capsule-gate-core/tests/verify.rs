// crates/capsule-gate-core/tests/verify.rs
// ============================================================================
// Module: Verification Report Tests
// Description: Per-capsule digest and signature outcomes.
// ============================================================================
//! ## Overview
//! Checks that signatures are verified whenever present and that load
//! failures count as bad entries.

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
use capsule_gate_core::LoadedDocument;
use capsule_gate_core::SigningUpdate;
use capsule_gate_core::VerificationOutcome;
use capsule_gate_core::capsule_digest;
use capsule_gate_core::encode_signature;
use capsule_gate_core::encode_verifying_key;
use capsule_gate_core::sign_digest;
use capsule_gate_core::verify_batch;
use capsule_gate_core::verify_capsule;
use capsule_gate_core::with_digest;
use ed25519_dalek::SigningKey;
use serde_json::json;

fn digested(statement: &str) -> CapsuleDocument {
    let doc = CapsuleDocument::from_value(json!({"id": "v", "statement": statement})).unwrap();
    let digest = capsule_digest(&doc);
    with_digest(&doc, &digest).unwrap()
}

fn signed_draft() -> CapsuleDocument {
    let doc = digested("S");
    let key = SigningKey::from_bytes(&[2u8; 32]);
    let digest = capsule_digest(&doc);
    doc.with_signing(&SigningUpdate {
        signature: Some(encode_signature(&sign_digest(&digest, &key))),
        pubkey: Some(encode_verifying_key(&key.verifying_key())),
        ..SigningUpdate::default()
    })
    .unwrap()
}

#[test]
fn unsigned_capsule_is_digest_only() {
    assert_eq!(verify_capsule(&digested("S")), VerificationOutcome::OkDigestOnly);
}

#[test]
fn signature_is_checked_even_for_drafts() {
    assert_eq!(verify_capsule(&signed_draft()), VerificationOutcome::OkSignature);
    let broken = signed_draft()
        .with_signing(&SigningUpdate {
            signature: Some(encode_signature(&sign_digest(
                "other",
                &SigningKey::from_bytes(&[2u8; 32]),
            ))),
            ..SigningUpdate::default()
        })
        .unwrap();
    assert_eq!(verify_capsule(&broken).label(), "bad_signature");
}

#[test]
fn stale_digest_is_reported_before_signature() {
    let mut body = signed_draft().into_value();
    body["statement"] = json!("T");
    let edited = CapsuleDocument::from_value(body).unwrap();
    assert_eq!(verify_capsule(&edited), VerificationOutcome::DigestMismatch);
}

#[test]
fn batch_counts_ok_and_bad() {
    let documents = vec![
        LoadedDocument {
            path: PathBuf::from("a.yaml"),
            document: Ok(signed_draft()),
        },
        LoadedDocument {
            path: PathBuf::from("b.yaml"),
            document: Ok(digested("S")),
        },
        LoadedDocument {
            path: PathBuf::from("c.yaml"),
            document: Err(DocumentError::Utf8),
        },
    ];
    let report = verify_batch(&documents);
    assert_eq!(report.ok, 2);
    assert_eq!(report.bad, 1);
    assert_eq!(report.entries[2].outcome.label(), "error");
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["entries"][0]["outcome"], json!("ok_signature"));
}
