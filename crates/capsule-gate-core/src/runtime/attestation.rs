// crates/capsule-gate-core/src/runtime/attestation.rs
// ============================================================================
// Module: Witness Result Attestation
// Description: Signed envelopes over witness run results.
// Purpose: Let CI publish verifiable proof of a runtime verdict.
// Dependencies: ed25519-dalek, serde, serde_json, time, crate::core::hashing
// ============================================================================

//! ## Overview
//! An attestation wraps the JSON array emitted by the witness runner in a
//! `{results, proof}` envelope. The proof carries the SHA-256 of the
//! canonical encoding (sorted keys, compact, non-ASCII verbatim) and an
//! Ed25519 signature over the canonical bytes themselves.
//!
//! Verification recomputes the canonical digest from `results`, compares it
//! to the recorded digest, then checks the signature with the caller's
//! public key. No key is embedded in the envelope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::capsule::json_type_name;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::KeyEncoding;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::hash_bytes;
use crate::core::identifiers::KeyId;
use crate::runtime::signing::SignatureError;
use crate::runtime::signing::encode_signature;
use crate::runtime::signing::verify_message;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Proof type label.
pub const ATTESTATION_PROOF_TYPE: &str = "Ed25519";
/// Canonicalization algorithm label.
pub const CANONICAL_ALGORITHM: &str = "json-c14n-v1";
/// Engine label recorded in proof metadata.
pub const ATTESTATION_ENGINE: &str = concat!("capsule-gate/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Attestation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttestationError {
    /// Results payload is not a JSON array.
    #[error("witness results must be a JSON array, found {0}")]
    NotArray(&'static str),
    /// Proof uses an unsupported type or canonicalization.
    #[error("unsupported proof: {0}")]
    UnsupportedProof(String),
    /// Recomputed digest differs from the recorded digest.
    #[error("canonical digest mismatch")]
    DigestMismatch,
    /// Signature did not verify.
    #[error("signature invalid: {0}")]
    Signature(#[from] SignatureError),
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Canonicalization record inside a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalDigest {
    /// Canonicalization algorithm.
    pub algo: String,
    /// Hash algorithm.
    pub hash: String,
    /// Lowercase hex digest of the canonical bytes.
    pub digest: String,
}

/// Signature proof over canonical results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationProof {
    /// Proof type.
    #[serde(rename = "type")]
    pub proof_type: String,
    /// RFC 3339 creation time (UTC).
    pub created: String,
    /// Signing key identifier.
    #[serde(rename = "keyId")]
    pub key_id: String,
    /// Canonicalization record.
    pub canonical: CanonicalDigest,
    /// Base64 Ed25519 signature over the canonical bytes.
    pub signature: String,
    /// Free-form metadata.
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// Signed witness results envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedResults {
    /// Witness results exactly as produced by the runner.
    pub results: Value,
    /// Proof over `results`.
    pub proof: AttestationProof,
}

// ============================================================================
// SECTION: Sign / Verify
// ============================================================================

/// Signs witness results.
///
/// # Errors
///
/// Returns [`AttestationError::NotArray`] when `results` is not an array.
pub fn attest_results(
    results: Value,
    key: &SigningKey,
    key_id: &KeyId,
    created: OffsetDateTime,
) -> Result<SignedResults, AttestationError> {
    if !results.is_array() {
        return Err(AttestationError::NotArray(json_type_name(&results)));
    }
    let canonical = canonical_json_bytes(&results, KeyEncoding::Verbatim);
    let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &canonical);
    let signature = key.sign(&canonical);
    let mut meta = Map::new();
    meta.insert("engine".to_string(), Value::String(ATTESTATION_ENGINE.to_string()));
    Ok(SignedResults {
        results,
        proof: AttestationProof {
            proof_type: ATTESTATION_PROOF_TYPE.to_string(),
            created: rfc3339_utc(created),
            key_id: key_id.as_str().to_string(),
            canonical: CanonicalDigest {
                algo: CANONICAL_ALGORITHM.to_string(),
                hash: digest.algorithm.as_str().to_string(),
                digest: digest.value,
            },
            signature: encode_signature(&signature),
            meta,
        },
    })
}

/// Verifies a signed results envelope against a base64 public key.
///
/// # Errors
///
/// Returns [`AttestationError`] describing the first failed check.
pub fn verify_attestation(signed: &SignedResults, pubkey: &str) -> Result<(), AttestationError> {
    let proof = &signed.proof;
    if proof.proof_type != ATTESTATION_PROOF_TYPE {
        return Err(AttestationError::UnsupportedProof(proof.proof_type.clone()));
    }
    if proof.canonical.algo != CANONICAL_ALGORITHM
        || proof.canonical.hash != DEFAULT_HASH_ALGORITHM.as_str()
    {
        return Err(AttestationError::UnsupportedProof(format!(
            "{}/{}",
            proof.canonical.algo, proof.canonical.hash
        )));
    }
    let canonical = canonical_json_bytes(&signed.results, KeyEncoding::Verbatim);
    let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &canonical);
    if digest.value != proof.canonical.digest {
        return Err(AttestationError::DigestMismatch);
    }
    verify_message(&canonical, &proof.signature, pubkey)?;
    Ok(())
}

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Formats the compact file-name timestamp `YYYYMMDDTHHMMSSZ`.
#[must_use]
pub fn attestation_timestamp(now: OffsetDateTime) -> String {
    let utc = now.to_offset(time::UtcOffset::UTC);
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        utc.year(),
        u8::from(utc.month()),
        utc.day(),
        utc.hour(),
        utc.minute(),
        utc.second()
    )
}

/// Formats an RFC 3339 UTC timestamp with second precision.
fn rfc3339_utc(now: OffsetDateTime) -> String {
    let utc = now.to_offset(time::UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        utc.year(),
        u8::from(utc.month()),
        utc.day(),
        utc.hour(),
        utc.minute(),
        utc.second()
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================
