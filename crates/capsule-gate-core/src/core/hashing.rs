// crates/capsule-gate-core/src/core/hashing.rs
// ============================================================================
// Module: Capsule Gate Canonical Hashing
// Description: Canonical JSON encoding and content hashing utilities.
// Purpose: Provide deterministic hashes for capsule cores and witness results.
// Dependencies: serde, serde_json, sha2
// ============================================================================

//! ## Overview
//! Capsule Gate hashes a compact, key-sorted JSON rendering of a value.
//! Arrays keep element order; object keys are sorted by code point at every
//! nesting level; no insignificant whitespace is emitted. String values are
//! escaped only where JSON requires it, so non-ASCII text is emitted
//! verbatim.
//!
//! Floats use the shortest digits that round-trip, written positionally for
//! decimal exponents in `[-4, 16)` (`1e15` is `1000000000000000.0`) and in
//! exponent form otherwise (`1e20` is `1e+20`, `1e-5` is `1e-05`). Integers
//! are emitted as written.
//!
//! Object keys come in two flavours ([`KeyEncoding`]). Capsule digests escape
//! non-ASCII key characters as `\uXXXX`, which keeps fingerprints stable
//! against capsule corpora that were digested with that encoding. Witness
//! result attestations emit keys verbatim.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported hash algorithms for Capsule Gate artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 hashing.
    Sha256,
}

impl HashAlgorithm {
    /// Returns the stable label used in reports and attestation proofs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

/// Default hash algorithm for Capsule Gate.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Deterministic content hash representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Hash algorithm identifier.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a new digest from raw bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }
}

// ============================================================================
// SECTION: Canonical Encoding
// ============================================================================

/// Encoding applied to object keys in canonical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    /// Non-ASCII key characters are escaped as `\uXXXX` (UTF-16 units).
    AsciiEscaped,
    /// Keys are emitted with the same escaping as string values.
    Verbatim,
}

/// Returns the canonical JSON string for a value.
#[must_use]
pub fn canonical_json_string(value: &Value, keys: KeyEncoding) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value, keys);
    out
}

/// Returns the canonical JSON bytes (UTF-8) for a value.
#[must_use]
pub fn canonical_json_bytes(value: &Value, keys: KeyEncoding) -> Vec<u8> {
    canonical_json_string(value, keys).into_bytes()
}

/// Hashes the canonical encoding of a value.
#[must_use]
pub fn hash_canonical_json(
    algorithm: HashAlgorithm,
    value: &Value,
    keys: KeyEncoding,
) -> HashDigest {
    hash_bytes(algorithm, &canonical_json_bytes(value, keys))
}

/// Appends the canonical form of `value` to `out`.
fn write_canonical(out: &mut String, value: &Value, keys: KeyEncoding) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(out, item, keys);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|left, right| left.0.cmp(right.0));
            out.push('{');
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_json_string(out, key, keys == KeyEncoding::AsciiEscaped);
                out.push(':');
                write_canonical(out, item, keys);
            }
            out.push('}');
        }
        Value::String(text) => write_json_string(out, text, false),
        Value::Number(number) => write_number(out, number),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Null => out.push_str("null"),
    }
}

/// Appends a number; integers verbatim, floats in shortest round-trip form.
fn write_number(out: &mut String, number: &Number) {
    match number.as_f64() {
        Some(value) if number.is_f64() => write_float(out, value),
        _ => out.push_str(&number.to_string()),
    }
}

/// Appends a float: positional for decimal exponents in `[-4, 16)`,
/// otherwise `d.ddde+XX` with a signed exponent of at least two digits.
fn write_float(out: &mut String, value: f64) {
    let scientific = format!("{value:e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if let Some(magnitude) = mantissa.strip_prefix('-') {
        out.push('-');
        write_float_digits(out, magnitude, exponent);
    } else {
        write_float_digits(out, mantissa, exponent);
    }
}

/// Appends unsigned float digits (`d` or `d.ddd`) scaled by `10^exponent`.
fn write_float_digits(out: &mut String, mantissa: &str, exponent: i32) {
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    if !(-4 .. 16).contains(&exponent) {
        let (lead, rest) = digits.split_at(digits.len().min(1));
        out.push_str(lead);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        out.push('e');
        out.push(if exponent < 0 { '-' } else { '+' });
        let magnitude = exponent.unsigned_abs();
        if magnitude < 10 {
            out.push('0');
        }
        out.push_str(&magnitude.to_string());
        return;
    }
    let point = exponent + 1;
    if point <= 0 {
        out.push_str("0.");
        for _ in 0 .. point.unsigned_abs() {
            out.push('0');
        }
        out.push_str(&digits);
        return;
    }
    let point = usize::try_from(point).unwrap_or(0);
    if point >= digits.len() {
        out.push_str(&digits);
        for _ in digits.len() .. point {
            out.push('0');
        }
        out.push_str(".0");
    } else {
        let (whole, fraction) = digits.split_at(point);
        out.push_str(whole);
        out.push('.');
        out.push_str(fraction);
    }
}

/// Appends a quoted JSON string, escaping only what JSON requires.
fn write_json_string(out: &mut String, text: &str, ascii_only: bool) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            control if u32::from(control) < 0x20 => push_unicode_escape(out, u32::from(control)),
            wide if ascii_only && !wide.is_ascii() => {
                let mut units = [0u16; 2];
                for unit in wide.encode_utf16(&mut units) {
                    push_unicode_escape(out, u32::from(*unit));
                }
            }
            other => out.push(other),
        }
    }
    out.push('"');
}

/// Appends a `\uXXXX` escape using lowercase hex digits.
fn push_unicode_escape(out: &mut String, unit: u32) {
    out.push_str("\\u");
    for shift in [12u32, 8, 4, 0] {
        let nibble = (unit >> shift) & 0x0f;
        out.push(char::from_digit(nibble, 16).unwrap_or('0'));
    }
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Hashes raw bytes using the provided algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            let digest = hasher.finalize();
            HashDigest::new(HashAlgorithm::Sha256, &digest)
        }
    }
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Lowercase hex alphabet.
const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
        out.push(char::from(HEX_DIGITS[usize::from(byte & 0x0f)]));
    }
    out
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

    use serde_json::json;

    use super::*;

    #[test]
    fn canonical_sorts_keys_and_drops_whitespace() {
        let value = json!({"b": [1, 2], "a": {"d": null, "c": true}});
        assert_eq!(
            canonical_json_string(&value, KeyEncoding::Verbatim),
            r#"{"a":{"c":true,"d":null},"b":[1,2]}"#
        );
    }

    #[test]
    fn canonical_keeps_non_ascii_values_verbatim() {
        let value = json!({"title": "café ✓"});
        let encoded = canonical_json_string(&value, KeyEncoding::AsciiEscaped);
        assert_eq!(encoded, "{\"title\":\"café ✓\"}");
    }

    #[test]
    fn canonical_escapes_non_ascii_keys_when_requested() {
        let value = json!({"é": 1, "😀": 2});
        assert_eq!(
            canonical_json_string(&value, KeyEncoding::AsciiEscaped),
            r#"{"\u00e9":1,"\ud83d\ude00":2}"#
        );
        assert_eq!(canonical_json_string(&value, KeyEncoding::Verbatim), "{\"é\":1,\"😀\":2}");
    }

    #[test]
    fn canonical_escapes_control_characters() {
        let value = json!("line\nnext\u{1}\"quoted\"\\");
        assert_eq!(
            canonical_json_string(&value, KeyEncoding::Verbatim),
            r#""line\nnext\u0001\"quoted\"\\""#
        );
    }

    #[test]
    fn canonical_keeps_float_fraction() {
        let value = json!({"version": 1.0, "count": 3});
        assert_eq!(
            canonical_json_string(&value, KeyEncoding::Verbatim),
            r#"{"count":3,"version":1.0}"#
        );
    }

    #[test]
    fn canonical_floats_switch_to_exponent_form_outside_the_positional_range() {
        let value = json!([1e20, 1e16, 1e15, 1.5e300, 1e-5, 0.0001, 2.5e-7, -1e20, 123.456]);
        assert_eq!(
            canonical_json_string(&value, KeyEncoding::AsciiEscaped),
            "[1e+20,1e+16,1000000000000000.0,1.5e+300,1e-05,0.0001,2.5e-07,-1e+20,123.456]"
        );
    }

    #[test]
    fn canonical_floats_keep_zero_and_integers_distinct() {
        let value = json!([0.0, -0.0, 0, 12, -3, 0.5]);
        assert_eq!(
            canonical_json_string(&value, KeyEncoding::Verbatim),
            "[0.0,-0.0,0,12,-3,0.5]"
        );
    }

    #[test]
    fn sha256_of_empty_input_matches_known_vector() {
        let digest = hash_bytes(HashAlgorithm::Sha256, b"");
        assert_eq!(
            digest.value,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
