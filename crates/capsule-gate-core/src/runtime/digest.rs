// crates/capsule-gate-core/src/runtime/digest.rs
// ============================================================================
// Module: Capsule Digest
// Description: Semantic-core extraction and content-addressed capsule digests.
// Purpose: Fingerprint a capsule so reviews and signatures bind to its meaning.
// Dependencies: serde, serde_json, crate::core::hashing
// ============================================================================

//! ## Overview
//! The digest covers exactly the semantic core of a capsule:
//! `id`, `version`, `domain`, `title`, `statement`, `assumptions`, and
//! `pedagogy`. Everything else (provenance, witnesses, presentation fields)
//! is excluded so signing metadata can change without invalidating
//! signatures.
//!
//! Normalization before hashing:
//! - absent scalar fields encode as `null`;
//! - `assumptions` that is not a list becomes `[]`;
//! - `pedagogy` keeps only mapping elements, each reduced to `{kind, text}`;
//!   a non-list becomes `[]`.
//!
//! The digest is the lowercase hex SHA-256 of the canonical encoding with
//! ASCII-escaped keys (see [`KeyEncoding::AsciiEscaped`]).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::capsule::CapsuleDocument;
use crate::core::capsule::SigningUpdate;
use crate::core::capsule::StructureError;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::KeyEncoding;
use crate::core::hashing::hash_canonical_json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Scalar fields copied verbatim into the semantic core.
const CORE_SCALAR_FIELDS: [&str; 5] = ["id", "version", "domain", "title", "statement"];

// ============================================================================
// SECTION: Digest
// ============================================================================

/// Returns the normalized semantic core of a capsule.
#[must_use]
pub fn semantic_core(document: &CapsuleDocument) -> Value {
    let mut core = Map::new();
    for field in CORE_SCALAR_FIELDS {
        core.insert(field.to_string(), document.field(field).cloned().unwrap_or(Value::Null));
    }
    let assumptions = match document.field("assumptions") {
        Some(Value::Array(items)) => Value::Array(items.clone()),
        _ => Value::Array(Vec::new()),
    };
    core.insert("assumptions".to_string(), assumptions);
    let pedagogy = match document.field("pedagogy") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .map(|entry| {
                let mut reduced = Map::new();
                for key in ["kind", "text"] {
                    reduced.insert(key.to_string(), entry.get(key).cloned().unwrap_or(Value::Null));
                }
                Value::Object(reduced)
            })
            .collect(),
        _ => Vec::new(),
    };
    core.insert("pedagogy".to_string(), Value::Array(pedagogy));
    Value::Object(core)
}

/// Computes the capsule digest (lowercase hex SHA-256).
#[must_use]
pub fn capsule_digest(document: &CapsuleDocument) -> String {
    let core = semantic_core(document);
    hash_canonical_json(DEFAULT_HASH_ALGORITHM, &core, KeyEncoding::AsciiEscaped).value
}

/// Computes the digest of a raw parsed value.
///
/// # Errors
///
/// Returns [`StructureError`] when the value is not a mapping.
pub fn digest_value(value: &Value) -> Result<String, StructureError> {
    let document = CapsuleDocument::from_value(value.clone())?;
    Ok(capsule_digest(&document))
}

// ============================================================================
// SECTION: Digest Checks
// ============================================================================

/// Outcome of comparing a stored digest with the recomputed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestStatus {
    /// Stored digest matches.
    Ok,
    /// No digest stored.
    Missing,
    /// Stored digest differs.
    Mismatch,
    /// Digest was written back.
    Updated,
    /// Document could not be processed.
    Error,
}

impl DigestStatus {
    /// Returns the lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Missing => "missing",
            Self::Mismatch => "mismatch",
            Self::Updated => "updated",
            Self::Error => "error",
        }
    }
}

/// Stored versus recomputed digest for one capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestCheck {
    /// Comparison outcome (`ok`, `missing`, or `mismatch`).
    pub status: DigestStatus,
    /// Digest currently stored in `provenance.signing.digest`.
    pub stored: Option<String>,
    /// Digest recomputed from the semantic core.
    pub computed: String,
}

impl DigestCheck {
    /// Returns true when the stored digest must be rewritten.
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.status != DigestStatus::Ok
    }
}

/// Compares the stored digest of a capsule with its recomputed digest.
#[must_use]
pub fn check_digest(document: &CapsuleDocument) -> DigestCheck {
    let computed = capsule_digest(document);
    let stored = document.signing().digest;
    let status = match stored.as_deref() {
        None | Some("") => DigestStatus::Missing,
        Some(value) if value == computed => DigestStatus::Ok,
        Some(_) => DigestStatus::Mismatch,
    };
    DigestCheck {
        status,
        stored,
        computed,
    }
}

/// Returns a copy of the document with its digest set to `digest`.
///
/// # Errors
///
/// Returns [`StructureError`] when `provenance` or `provenance.signing` is
/// present but not a mapping.
pub fn with_digest(
    document: &CapsuleDocument,
    digest: &str,
) -> Result<CapsuleDocument, StructureError> {
    document.with_signing(&SigningUpdate {
        digest: Some(digest.to_string()),
        ..SigningUpdate::default()
    })
}
