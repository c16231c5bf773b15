// crates/capsule-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Capsule Gate Identifiers
// Description: Opaque identifiers for capsules and witnesses.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Capsule and witness identifiers are opaque strings. Capsule ids are
//! unique, stable slugs; witness names are unique only within their capsule.
//! Validation belongs to the external capsule linter, not to these wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Capsule identifier (the document's `id` field).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapsuleId(String);

impl CapsuleId {
    /// Placeholder used when a capsule carries no usable `id`.
    pub const UNKNOWN: &'static str = "unknown";

    /// Creates a new capsule identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapsuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CapsuleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CapsuleId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Witness name, unique within one capsule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WitnessName(String);

impl WitnessName {
    /// Name used when a witness omits `name`.
    pub const UNNAMED: &'static str = "unnamed";

    /// Creates a new witness name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WitnessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for WitnessName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WitnessName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Signing key identifier recorded in `provenance.signing.key_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Key id written when the operator does not supply one.
    pub const DEFAULT: &'static str = "demo";

    /// Creates a new key identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for KeyId {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for KeyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
