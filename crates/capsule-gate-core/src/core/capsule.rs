// crates/capsule-gate-core/src/core/capsule.rs
// ============================================================================
// Module: Capsule Documents
// Description: Typed view over a parsed capsule document.
// Purpose: Read identity, review, signing, and witness fields without mutation.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`CapsuleDocument`] wraps the parsed mapping of one capsule file. The
//! mapping is kept as a [`serde_json::Map`] with insertion order preserved so
//! that write-back reproduces the author's key order.
//!
//! Accessors are lenient: a field of the wrong type reads as absent. The only
//! structural requirement is that the document itself is a mapping.
//!
//! Updates never mutate in place. [`CapsuleDocument::with_signing`] returns a
//! new document that the caller persists with
//! [`write_document_atomic`](crate::core::document::write_document_atomic).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::CapsuleId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Structural problems that prevent a document from being treated as a capsule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// The document is empty.
    #[error("document is empty")]
    Empty,
    /// The document root is not a mapping.
    #[error("document root must be a mapping, found {found}")]
    NotMapping {
        /// JSON type name found at the root.
        found: &'static str,
    },
    /// A nested field has the wrong shape for an update.
    #[error("field {field} must be a mapping")]
    FieldNotMapping {
        /// Dotted field path.
        field: &'static str,
    },
}

// ============================================================================
// SECTION: Review Status
// ============================================================================

/// Review status recorded in `provenance.review.status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Authored but not reviewed (default when absent).
    Draft,
    /// Under review.
    InReview,
    /// Approved by a reviewer.
    Approved,
    /// Retired.
    Deprecated,
    /// Any other label.
    Other(String),
}

impl ReviewStatus {
    /// Parses a review status label.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label {
            "draft" => Self::Draft,
            "in_review" => Self::InReview,
            "approved" => Self::Approved,
            "deprecated" => Self::Deprecated,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the label as written in capsule documents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Deprecated => "deprecated",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Signing Block
// ============================================================================

/// Snapshot of `provenance.signing`. Non-string fields read as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SigningBlock {
    /// Stored capsule digest.
    pub digest: Option<String>,
    /// Signature method label.
    pub method: Option<String>,
    /// Signing key identifier.
    pub key_id: Option<String>,
    /// Base64 Ed25519 public key.
    pub pubkey: Option<String>,
    /// Base64 Ed25519 signature over the digest.
    pub signature: Option<String>,
}

/// Fields to write into `provenance.signing`; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningUpdate {
    /// New digest value.
    pub digest: Option<String>,
    /// New signature method.
    pub method: Option<String>,
    /// New key identifier.
    pub key_id: Option<String>,
    /// New public key.
    pub pubkey: Option<String>,
    /// New signature.
    pub signature: Option<String>,
}

// ============================================================================
// SECTION: Capsule Document
// ============================================================================

/// Parsed capsule document.
#[derive(Debug, Clone, PartialEq)]
pub struct CapsuleDocument {
    /// Root mapping in source key order.
    body: Map<String, Value>,
}

impl CapsuleDocument {
    /// Wraps a parsed value, requiring a mapping at the root.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError`] when the value is null or not a mapping.
    pub fn from_value(value: Value) -> Result<Self, StructureError> {
        match value {
            Value::Object(body) => Ok(Self {
                body,
            }),
            Value::Null => Err(StructureError::Empty),
            other => Err(StructureError::NotMapping {
                found: json_type_name(&other),
            }),
        }
    }

    /// Returns the root mapping.
    #[must_use]
    pub const fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Consumes the document and returns its root value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }

    /// Returns a top-level field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Returns the capsule `id` when it is a string.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.body.get("id").and_then(Value::as_str)
    }

    /// Returns the capsule identifier, falling back to `unknown`.
    #[must_use]
    pub fn capsule_id(&self) -> CapsuleId {
        CapsuleId::new(self.id().unwrap_or(CapsuleId::UNKNOWN))
    }

    /// Returns the review status, defaulting to draft.
    #[must_use]
    pub fn review_status(&self) -> ReviewStatus {
        self.provenance()
            .and_then(|provenance| provenance.get("review"))
            .and_then(Value::as_object)
            .and_then(|review| review.get("status"))
            .and_then(Value::as_str)
            .map_or(ReviewStatus::Draft, ReviewStatus::parse)
    }

    /// Returns the signing block snapshot.
    #[must_use]
    pub fn signing(&self) -> SigningBlock {
        let Some(signing) = self
            .provenance()
            .and_then(|provenance| provenance.get("signing"))
            .and_then(Value::as_object)
        else {
            return SigningBlock::default();
        };
        let text = |key: &str| signing.get(key).and_then(Value::as_str).map(str::to_string);
        SigningBlock {
            digest: text("digest"),
            method: text("method"),
            key_id: text("key_id"),
            pubkey: text("pubkey"),
            signature: text("signature"),
        }
    }

    /// Returns the raw witness entries; absent or non-list reads as empty.
    #[must_use]
    pub fn witnesses(&self) -> &[Value] {
        self.body.get("witnesses").and_then(Value::as_array).map_or(&[], Vec::as_slice)
    }

    /// Returns a copy of this document with `provenance.signing` updated.
    ///
    /// Missing `provenance` and `signing` mappings are created at the end of
    /// their parent; existing keys keep their position.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::FieldNotMapping`] when `provenance` or
    /// `provenance.signing` exists but is not a mapping.
    pub fn with_signing(&self, update: &SigningUpdate) -> Result<Self, StructureError> {
        let mut body = self.body.clone();
        let provenance = mapping_entry(&mut body, "provenance", "provenance")?;
        let signing = mapping_entry(provenance, "signing", "provenance.signing")?;
        let fields = [
            ("digest", &update.digest),
            ("signature", &update.signature),
            ("method", &update.method),
            ("key_id", &update.key_id),
            ("pubkey", &update.pubkey),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                signing.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        Ok(Self {
            body,
        })
    }

    /// Returns the `provenance` mapping when present.
    fn provenance(&self) -> Option<&Map<String, Value>> {
        self.body.get("provenance").and_then(Value::as_object)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the mapping at `key`, inserting an empty one when absent or null.
fn mapping_entry<'a>(
    parent: &'a mut Map<String, Value>,
    key: &str,
    field: &'static str,
) -> Result<&'a mut Map<String, Value>, StructureError> {
    let entry = parent.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
    if entry.is_null() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut().ok_or(StructureError::FieldNotMapping {
        field,
    })
}

/// Returns a short JSON type label for error messages.
pub(crate) const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
