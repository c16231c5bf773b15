// crates/capsule-gate-core/tests/attestation.rs
// ============================================================================
// Module: Attestation Tests
// Description: Signed witness result envelopes.
// ============================================================================
//! ## Overview
//! Signs witness result arrays and checks that tampering with results,
//! digest, or key is detected.

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

use capsule_gate_core::AttestationError;
use capsule_gate_core::KeyId;
use capsule_gate_core::SignedResults;
use capsule_gate_core::attest_results;
use capsule_gate_core::encode_verifying_key;
use capsule_gate_core::verify_attestation;
use ed25519_dalek::SigningKey;
use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;

type TestResult = Result<(), String>;

fn results() -> Value {
    json!([
        {"capsule": "llm.x", "status": "GREEN", "witness_results": [
            {
                "name": "ok",
                "status": "PASS",
                "returncode": 0,
                "stdout": "ok\n",
                "stderr": "",
                "note": "café"
            }
        ]}
    ])
}

fn key() -> SigningKey {
    SigningKey::from_bytes(&[21u8; 32])
}

fn sign() -> SignedResults {
    attest_results(results(), &key(), &KeyId::new("ci"), OffsetDateTime::UNIX_EPOCH).unwrap()
}

#[test]
fn signed_results_verify_with_matching_key() -> TestResult {
    let signed = sign();
    let pubkey = encode_verifying_key(&key().verifying_key());
    verify_attestation(&signed, &pubkey).map_err(|err| err.to_string())
}

#[test]
fn proof_records_algorithms_and_metadata() {
    let signed = sign();
    let value = serde_json::to_value(&signed).unwrap();
    let proof = &value["proof"];
    assert_eq!(proof["type"], json!("Ed25519"));
    assert_eq!(proof["keyId"], json!("ci"));
    assert_eq!(proof["created"], json!("1970-01-01T00:00:00Z"));
    assert_eq!(proof["canonical"]["algo"], json!("json-c14n-v1"));
    assert_eq!(proof["canonical"]["hash"], json!("sha256"));
    assert_eq!(proof["canonical"]["digest"].as_str().unwrap().len(), 64);
    assert!(proof["meta"]["engine"].as_str().unwrap().starts_with("capsule-gate/"));
    assert_eq!(value["results"], results());
}

#[test]
fn envelope_round_trips_through_json() -> TestResult {
    let text = serde_json::to_string_pretty(&sign()).map_err(|err| err.to_string())?;
    let parsed: SignedResults = serde_json::from_str(&text).map_err(|err| err.to_string())?;
    let pubkey = encode_verifying_key(&key().verifying_key());
    verify_attestation(&parsed, &pubkey).map_err(|err| err.to_string())
}

#[test]
fn tampered_results_fail_digest_check() {
    let mut signed = sign();
    signed.results[0]["status"] = json!("RED");
    let pubkey = encode_verifying_key(&key().verifying_key());
    assert_eq!(verify_attestation(&signed, &pubkey), Err(AttestationError::DigestMismatch));
}

#[test]
fn wrong_key_fails_signature_check() {
    let signed = sign();
    let other = SigningKey::from_bytes(&[22u8; 32]);
    let pubkey = encode_verifying_key(&other.verifying_key());
    assert!(matches!(verify_attestation(&signed, &pubkey), Err(AttestationError::Signature(_))));
}

#[test]
fn non_array_results_are_rejected() {
    let err = attest_results(json!({"a": 1}), &key(), &KeyId::default(), OffsetDateTime::UNIX_EPOCH)
        .unwrap_err();
    assert_eq!(err, AttestationError::NotArray("mapping"));
}

#[test]
fn unknown_proof_type_is_rejected() {
    let mut signed = sign();
    signed.proof.proof_type = "RSA".to_string();
    let pubkey = encode_verifying_key(&key().verifying_key());
    assert!(matches!(
        verify_attestation(&signed, &pubkey),
        Err(AttestationError::UnsupportedProof(_))
    ));
}
