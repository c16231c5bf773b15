// crates/capsule-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Capsule Gate Runtime
// Description: Digest, signing, gate, verification, aggregation, attestation.
// Purpose: Implement the deterministic decisions made over capsules.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Runtime modules compute verdicts from core types. None of them touch the
//! filesystem or spawn processes; callers load documents and persist results.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod aggregate;
pub mod attestation;
pub mod digest;
pub mod gate;
pub mod signing;
pub mod verify;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aggregate::aggregate;
pub use aggregate::capsule_status;
pub use attestation::ATTESTATION_ENGINE;
pub use attestation::ATTESTATION_PROOF_TYPE;
pub use attestation::AttestationError;
pub use attestation::AttestationProof;
pub use attestation::CANONICAL_ALGORITHM;
pub use attestation::CanonicalDigest;
pub use attestation::SignedResults;
pub use attestation::attest_results;
pub use attestation::attestation_timestamp;
pub use attestation::verify_attestation;
pub use digest::DigestCheck;
pub use digest::DigestStatus;
pub use digest::capsule_digest;
pub use digest::check_digest;
pub use digest::digest_value;
pub use digest::semantic_core;
pub use digest::with_digest;
pub use gate::GateEntry;
pub use gate::GateEntryResult;
pub use gate::GateFailure;
pub use gate::GateOptions;
pub use gate::GateOutcome;
pub use gate::GateReport;
pub use gate::GateStage;
pub use gate::PolicyGate;
pub use gate::check_capsule;
pub use signing::KeyError;
pub use signing::SIGNING_METHOD;
pub use signing::SignatureError;
pub use signing::decode_signing_key;
pub use signing::decode_verifying_key;
pub use signing::encode_signature;
pub use signing::encode_verifying_key;
pub use signing::sign_digest;
pub use signing::verify_digest;
pub use signing::verify_message;
pub use verify::CapsuleVerification;
pub use verify::VerificationOutcome;
pub use verify::VerificationReport;
pub use verify::verify_batch;
pub use verify::verify_capsule;
