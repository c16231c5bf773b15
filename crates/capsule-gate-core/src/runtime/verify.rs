// crates/capsule-gate-core/src/runtime/verify.rs
// ============================================================================
// Module: Verification Report
// Description: Digest and signature report over every capsule in a batch.
// Purpose: Audit signatures regardless of review status.
// Dependencies: serde, crate::runtime::{digest, signing}
// ============================================================================

//! ## Overview
//! Unlike the policy gate, the verification report checks a signature
//! whenever both `signature` and `pubkey` are present, whatever the review
//! status. A capsule with a valid digest and no signature is `ok_digest_only`.

use std::path::PathBuf;

use serde::Serialize;

use crate::core::capsule::CapsuleDocument;
use crate::core::document::LoadedDocument;
use crate::core::identifiers::CapsuleId;
use crate::runtime::digest::DigestStatus;
use crate::runtime::digest::check_digest;
use crate::runtime::signing::verify_message;

/// Verification outcome for one capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// Digest matches and the signature verifies.
    OkSignature,
    /// Digest matches and no signature is present.
    OkDigestOnly,
    /// Stored digest absent or stale.
    DigestMismatch,
    /// Signature present but invalid.
    BadSignature {
        /// Verification failure detail.
        reason: String,
    },
    /// Document could not be loaded.
    Error {
        /// Load error message.
        message: String,
    },
}

impl VerificationOutcome {
    /// Returns true for passing outcomes.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::OkSignature | Self::OkDigestOnly)
    }

    /// Returns the snake-case label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::OkSignature => "ok_signature",
            Self::OkDigestOnly => "ok_digest_only",
            Self::DigestMismatch => "digest_mismatch",
            Self::BadSignature {
                ..
            } => "bad_signature",
            Self::Error {
                ..
            } => "error",
        }
    }
}

/// Verification entry for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapsuleVerification {
    /// Source path.
    pub path: PathBuf,
    /// Capsule id when the document loaded.
    pub capsule: Option<CapsuleId>,
    /// Outcome.
    #[serde(flatten)]
    pub outcome: VerificationOutcome,
}

/// Verification results for a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Passing entries.
    pub ok: usize,
    /// Failing entries.
    pub bad: usize,
    /// Entries in input order.
    pub entries: Vec<CapsuleVerification>,
}

/// Verifies digest and, when present, signature of one capsule.
#[must_use]
pub fn verify_capsule(document: &CapsuleDocument) -> VerificationOutcome {
    let digest = check_digest(document);
    if digest.status != DigestStatus::Ok {
        return VerificationOutcome::DigestMismatch;
    }
    let signing = document.signing();
    match (signing.signature.as_deref(), signing.pubkey.as_deref()) {
        (Some(signature), Some(pubkey)) if !signature.is_empty() && !pubkey.is_empty() => {
            match verify_message(digest.computed.as_bytes(), signature, pubkey) {
                Ok(()) => VerificationOutcome::OkSignature,
                Err(err) => VerificationOutcome::BadSignature {
                    reason: err.to_string(),
                },
            }
        }
        _ => VerificationOutcome::OkDigestOnly,
    }
}

/// Verifies every loaded document.
#[must_use]
pub fn verify_batch(documents: &[LoadedDocument]) -> VerificationReport {
    let entries: Vec<CapsuleVerification> = documents
        .iter()
        .map(|loaded| match &loaded.document {
            Ok(document) => CapsuleVerification {
                path: loaded.path.clone(),
                capsule: Some(document.capsule_id()),
                outcome: verify_capsule(document),
            },
            Err(err) => CapsuleVerification {
                path: loaded.path.clone(),
                capsule: None,
                outcome: VerificationOutcome::Error {
                    message: err.to_string(),
                },
            },
        })
        .collect();
    let ok = entries.iter().filter(|entry| entry.outcome.is_ok()).count();
    VerificationReport {
        ok,
        bad: entries.len() - ok,
        entries,
    }
}
