// crates/capsule-gate-core/src/runtime/signing.rs
// ============================================================================
// Module: Capsule Signatures
// Description: Ed25519 signing and fail-closed verification over digests.
// Purpose: Bind reviewer approval to a capsule's content digest.
// Dependencies: base64, ed25519-dalek, thiserror
// ============================================================================

//! ## Overview
//! Capsules are signed over the raw UTF-8 bytes of their digest string, not
//! over the document. Keys and signatures are stored as standard base64.
//!
//! Verification fails closed. Every decode, length, and cryptographic failure
//! maps to a [`SignatureError`], and [`verify_digest`] collapses all of them
//! to `false`. Strict verification rejects weak and non-canonical keys.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Signature method label written to `provenance.signing.method`.
pub const SIGNING_METHOD: &str = "ed25519";
/// Length of an Ed25519 seed or public key in bytes.
const KEY_LENGTH: usize = 32;
/// Length of an Ed25519 keypair (seed followed by public key) in bytes.
const KEYPAIR_LENGTH: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Key material decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Key is not valid base64.
    #[error("key is not valid base64")]
    Base64,
    /// Key has the wrong length.
    #[error("key must decode to {expected} bytes, found {found}")]
    Length {
        /// Expected length in bytes.
        expected: usize,
        /// Decoded length in bytes.
        found: usize,
    },
    /// Key bytes are not a valid Ed25519 key.
    #[error("invalid ed25519 key: {0}")]
    Invalid(String),
}

/// Signature verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Signature is not valid base64.
    #[error("signature is not valid base64")]
    Base64,
    /// Signature has the wrong length.
    #[error("signature must decode to 64 bytes, found {0}")]
    Length(usize),
    /// Public key could not be decoded.
    #[error("public key rejected: {0}")]
    PublicKey(KeyError),
    /// Cryptographic verification failed.
    #[error("signature does not match")]
    Mismatch,
}

// ============================================================================
// SECTION: Key Encoding
// ============================================================================

/// Decodes a base64 private key.
///
/// Accepts a 32-byte seed or a 64-byte keypair whose public half must match
/// the seed.
///
/// # Errors
///
/// Returns [`KeyError`] when decoding or validation fails.
pub fn decode_signing_key(text: &str) -> Result<SigningKey, KeyError> {
    let bytes = decode_base64(text).ok_or(KeyError::Base64)?;
    match bytes.len() {
        KEY_LENGTH => {
            let seed: [u8; KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| KeyError::Length {
                expected: KEY_LENGTH,
                found: bytes.len(),
            })?;
            Ok(SigningKey::from_bytes(&seed))
        }
        KEYPAIR_LENGTH => {
            let pair: [u8; KEYPAIR_LENGTH] =
                bytes.as_slice().try_into().map_err(|_| KeyError::Length {
                    expected: KEYPAIR_LENGTH,
                    found: bytes.len(),
                })?;
            SigningKey::from_keypair_bytes(&pair).map_err(|err| KeyError::Invalid(err.to_string()))
        }
        found => Err(KeyError::Length {
            expected: KEY_LENGTH,
            found,
        }),
    }
}

/// Decodes a base64 public key.
///
/// # Errors
///
/// Returns [`KeyError`] when decoding or validation fails.
pub fn decode_verifying_key(text: &str) -> Result<VerifyingKey, KeyError> {
    let bytes = decode_base64(text).ok_or(KeyError::Base64)?;
    let key: [u8; KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| KeyError::Length {
        expected: KEY_LENGTH,
        found: bytes.len(),
    })?;
    VerifyingKey::from_bytes(&key).map_err(|err| KeyError::Invalid(err.to_string()))
}

/// Encodes a public key as base64.
#[must_use]
pub fn encode_verifying_key(key: &VerifyingKey) -> String {
    BASE64.encode(key.as_bytes())
}

/// Encodes a signature as base64.
#[must_use]
pub fn encode_signature(signature: &Signature) -> String {
    BASE64.encode(signature.to_bytes())
}

// ============================================================================
// SECTION: Sign / Verify
// ============================================================================

/// Signs the UTF-8 bytes of a digest string.
#[must_use]
pub fn sign_digest(digest: &str, key: &SigningKey) -> Signature {
    key.sign(digest.as_bytes())
}

/// Verifies a base64 signature over a digest string. Fails closed.
#[must_use]
pub fn verify_digest(digest: &str, signature: &str, pubkey: &str) -> bool {
    verify_message(digest.as_bytes(), signature, pubkey).is_ok()
}

/// Verifies a base64 signature over arbitrary message bytes.
///
/// # Errors
///
/// Returns [`SignatureError`] describing the first failed check.
pub fn verify_message(message: &[u8], signature: &str, pubkey: &str) -> Result<(), SignatureError> {
    let key = decode_verifying_key(pubkey).map_err(SignatureError::PublicKey)?;
    let bytes = decode_base64(signature).ok_or(SignatureError::Base64)?;
    let signature =
        Signature::try_from(bytes.as_slice()).map_err(|_| SignatureError::Length(bytes.len()))?;
    key.verify_strict(message, &signature).map_err(|_| SignatureError::Mismatch)
}

/// Decodes trimmed standard base64.
fn decode_base64(text: &str) -> Option<Vec<u8>> {
    BASE64.decode(text.trim().as_bytes()).ok()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn keypair_bytes_decode_to_same_key() {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        let encoded = BASE64.encode(key.to_keypair_bytes());
        let decoded = decode_signing_key(&encoded).unwrap();
        assert_eq!(decoded.verifying_key(), key.verifying_key());
    }

    #[test]
    fn short_key_is_rejected() {
        let err = decode_signing_key(&BASE64.encode([1u8; 16])).unwrap_err();
        assert_eq!(
            err,
            KeyError::Length {
                expected: 32,
                found: 16
            }
        );
    }

    #[test]
    fn truncated_signature_reports_length() {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let pubkey = encode_verifying_key(&key.verifying_key());
        let err = verify_message(b"abc", &BASE64.encode([0u8; 10]), &pubkey).unwrap_err();
        assert_eq!(err, SignatureError::Length(10));
    }
}
