// crates/capsule-gate-core/src/core/mod.rs
// ============================================================================
// Module: Capsule Gate Core Types
// Description: Capsule documents, witness specs, verdicts, and hashing.
// Purpose: Provide stable, serializable types shared by every Capsule Gate tool.
// Dependencies: serde, serde_json, serde_yaml
// ============================================================================

//! ## Overview
//! Core types describe what a capsule is (documents, identifiers, witness
//! specs) and what the tools say about it (verdicts). Canonical hashing lives
//! here because both the digest and the attestation paths build on it.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod bounded;
pub mod capsule;
pub mod document;
pub mod hashing;
pub mod identifiers;
pub mod verdict;
pub mod witness;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bounded::ReadLimitError;
pub use bounded::read_file_with_limit;
pub use bounded::read_with_limit;
pub use capsule::CapsuleDocument;
pub use capsule::ReviewStatus;
pub use capsule::SigningBlock;
pub use capsule::SigningUpdate;
pub use capsule::StructureError;
pub use document::DEFAULT_DOCUMENT_EXTENSIONS;
pub use document::DEFAULT_MAX_DOCUMENT_BYTES;
pub use document::DiscoveryError;
pub use document::DiscoveryOptions;
pub use document::DocumentError;
pub use document::LoadedDocument;
pub use document::discover_documents;
pub use document::load_document;
pub use document::load_documents;
pub use document::parse_document;
pub use document::write_document_atomic;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::KeyEncoding;
pub use identifiers::CapsuleId;
pub use identifiers::KeyId;
pub use identifiers::WitnessName;
pub use verdict::CapsuleReport;
pub use verdict::CapsuleStatus;
pub use verdict::ERROR_EXIT_CODE;
pub use verdict::TIMEOUT_EXIT_CODE;
pub use verdict::WitnessResult;
pub use verdict::WitnessStatus;
pub use witness::DEFAULT_WITNESS_TIMEOUT_MS;
pub use witness::DEFAULT_WITNESS_WORKDIR;
pub use witness::FsMode;
pub use witness::WitnessCode;
pub use witness::WitnessLanguage;
pub use witness::WitnessSpec;
pub use witness::WitnessSpecError;
pub use witness::witness_name;
