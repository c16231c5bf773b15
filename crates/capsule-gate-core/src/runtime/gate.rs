// crates/capsule-gate-core/src/runtime/gate.rs
// ============================================================================
// Module: Policy Gate
// Description: Digest and signature gate over capsule batches.
// Purpose: Decide whether a capsule set may be accepted.
// Dependencies: serde, crate::runtime::{digest, signing}
// ============================================================================

//! ## Overview
//! The gate is a two-stage check per capsule:
//! 1. the stored digest must equal the recomputed digest; a missing or stale
//!    digest is terminal and the signature stage is never reached;
//! 2. when strict mode is on and the capsule's review status is `approved`,
//!    `signature` and `pubkey` must be present and verify over the digest.
//!
//! Batches isolate failures per document. A document that fails to load is
//! counted as an error but never aborts its siblings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::capsule::CapsuleDocument;
use crate::core::capsule::ReviewStatus;
use crate::core::document::LoadedDocument;
use crate::core::identifiers::CapsuleId;
use crate::runtime::digest::DigestStatus;
use crate::runtime::digest::check_digest;
use crate::runtime::signing::verify_message;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Gate behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateOptions {
    /// Require a valid signature on capsules whose review status is approved.
    pub require_signature_on_approved: bool,
}

// ============================================================================
// SECTION: Failures
// ============================================================================

/// Stage of the gate that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    /// Digest comparison.
    Digest,
    /// Signature verification.
    Signature,
}

/// Reason a capsule failed the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateFailure {
    /// Stored digest absent or stale.
    DigestMismatch {
        /// Stored digest, if any.
        stored: Option<String>,
        /// Recomputed digest.
        computed: String,
    },
    /// Approved capsule lacks signature or public key.
    MissingSignature,
    /// Signature did not verify.
    SignatureInvalid {
        /// Detailed verification failure.
        reason: String,
    },
}

impl GateFailure {
    /// Returns the stage that produced this failure.
    #[must_use]
    pub const fn stage(&self) -> GateStage {
        match self {
            Self::DigestMismatch {
                ..
            } => GateStage::Digest,
            Self::MissingSignature
            | Self::SignatureInvalid {
                ..
            } => GateStage::Signature,
        }
    }
}

impl fmt::Display for GateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DigestMismatch {
                ..
            } => f.write_str("digest mismatch"),
            Self::MissingSignature => f.write_str("approved requires signature+pubkey"),
            Self::SignatureInvalid {
                ..
            } => f.write_str("signature verification failed"),
        }
    }
}

// ============================================================================
// SECTION: Single Capsule
// ============================================================================

/// Gate decision for one capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateOutcome {
    /// True when the capsule passed.
    pub ok: bool,
    /// Failure reasons; empty when `ok`.
    pub reasons: Vec<GateFailure>,
}

impl GateOutcome {
    /// Passing outcome.
    const fn pass() -> Self {
        Self {
            ok: true,
            reasons: Vec::new(),
        }
    }

    /// Failing outcome with one reason.
    fn fail(reason: GateFailure) -> Self {
        Self {
            ok: false,
            reasons: vec![reason],
        }
    }
}

/// Runs the gate over a single capsule.
#[must_use]
pub fn check_capsule(document: &CapsuleDocument, options: GateOptions) -> GateOutcome {
    let digest = check_digest(document);
    if digest.status != DigestStatus::Ok {
        return GateOutcome::fail(GateFailure::DigestMismatch {
            stored: digest.stored,
            computed: digest.computed,
        });
    }
    if !options.require_signature_on_approved || document.review_status() != ReviewStatus::Approved
    {
        return GateOutcome::pass();
    }
    let signing = document.signing();
    let (Some(signature), Some(pubkey)) = (
        signing.signature.filter(|value| !value.is_empty()),
        signing.pubkey.filter(|value| !value.is_empty()),
    ) else {
        return GateOutcome::fail(GateFailure::MissingSignature);
    };
    match verify_message(digest.computed.as_bytes(), &signature, &pubkey) {
        Ok(()) => GateOutcome::pass(),
        Err(err) => GateOutcome::fail(GateFailure::SignatureInvalid {
            reason: err.to_string(),
        }),
    }
}

// ============================================================================
// SECTION: Batch
// ============================================================================

/// Per-document gate result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GateEntryResult {
    /// Document loaded and was checked.
    Checked {
        /// Gate decision.
        outcome: GateOutcome,
    },
    /// Document failed to load.
    LoadFailed {
        /// Load error message.
        error: String,
    },
}

/// Gate result for one document in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateEntry {
    /// Source path.
    pub path: PathBuf,
    /// Capsule id when the document loaded.
    pub capsule: Option<CapsuleId>,
    /// Entry result.
    #[serde(flatten)]
    pub result: GateEntryResult,
}

impl GateEntry {
    /// Returns true when this entry counts as an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        match &self.result {
            GateEntryResult::Checked {
                outcome,
            } => !outcome.ok,
            GateEntryResult::LoadFailed {
                ..
            } => true,
        }
    }
}

/// Gate results for a batch of documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateReport {
    /// Documents that loaded and were checked.
    pub checked: usize,
    /// Load failures plus failing capsules.
    pub errors: usize,
    /// Per-document entries in input order.
    pub entries: Vec<GateEntry>,
}

impl GateReport {
    /// Returns true when no entry failed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.errors == 0
    }
}

/// Policy gate configured with fixed options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyGate {
    /// Gate options.
    options: GateOptions,
}

impl PolicyGate {
    /// Creates a gate with the given options.
    #[must_use]
    pub const fn new(options: GateOptions) -> Self {
        Self {
            options,
        }
    }

    /// Returns the gate options.
    #[must_use]
    pub const fn options(&self) -> GateOptions {
        self.options
    }

    /// Checks a single capsule.
    #[must_use]
    pub fn check(&self, document: &CapsuleDocument) -> GateOutcome {
        check_capsule(document, self.options)
    }

    /// Checks every loaded document, isolating per-document failures.
    #[must_use]
    pub fn check_batch(&self, documents: &[LoadedDocument]) -> GateReport {
        let mut checked = 0;
        let mut entries = Vec::with_capacity(documents.len());
        for loaded in documents {
            let entry = match &loaded.document {
                Ok(document) => {
                    checked += 1;
                    GateEntry {
                        path: loaded.path.clone(),
                        capsule: Some(document.capsule_id()),
                        result: GateEntryResult::Checked {
                            outcome: self.check(document),
                        },
                    }
                }
                Err(err) => GateEntry {
                    path: loaded.path.clone(),
                    capsule: None,
                    result: GateEntryResult::LoadFailed {
                        error: err.to_string(),
                    },
                },
            };
            entries.push(entry);
        }
        let errors = entries.iter().filter(|entry| entry.is_error()).count();
        GateReport {
            checked,
            errors,
            entries,
        }
    }
}
