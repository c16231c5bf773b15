// crates/capsule-gate-core/src/core/witness.rs
// ============================================================================
// Module: Witness Specifications
// Description: Typed witness specs parsed from capsule `witnesses` entries.
// Purpose: Reject unsupported languages and malformed code sources up front.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A witness entry is parsed into a [`WitnessSpec`] before anything is
//! spawned. The language tag maps onto the closed [`WitnessLanguage`] enum,
//! which owns the default interpreter and source file extension for each
//! variant. Exactly one of `code` and `code_ref` must be given.
//!
//! Parse failures surface as [`WitnessSpecError`]; the execution engine turns
//! them into `ERROR` results without spawning a process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::WitnessName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default witness timeout in milliseconds.
pub const DEFAULT_WITNESS_TIMEOUT_MS: u64 = 5_000;
/// Default witness working directory.
pub const DEFAULT_WITNESS_WORKDIR: &str = ".";

// ============================================================================
// SECTION: Language
// ============================================================================

/// Supported witness languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WitnessLanguage {
    /// Python 3 source.
    Python,
    /// Node.js source.
    Node,
    /// Bash script.
    Bash,
    /// POSIX shell script.
    Shell,
}

impl WitnessLanguage {
    /// All supported languages in stable order.
    pub const ALL: [Self; 4] = [Self::Python, Self::Node, Self::Bash, Self::Shell];

    /// Parses a language tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "python" => Some(Self::Python),
            "node" => Some(Self::Node),
            "bash" => Some(Self::Bash),
            "shell" => Some(Self::Shell),
            _ => None,
        }
    }

    /// Returns the tag as written in capsule documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
            Self::Bash => "bash",
            Self::Shell => "shell",
        }
    }

    /// Returns the default interpreter binary.
    #[must_use]
    pub const fn interpreter(self) -> &'static str {
        match self {
            Self::Python => "python3",
            Self::Node => "node",
            Self::Bash => "bash",
            Self::Shell => "sh",
        }
    }

    /// Returns the source file extension, including the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Python => ".py",
            Self::Node => ".js",
            Self::Bash | Self::Shell => ".sh",
        }
    }
}

impl fmt::Display for WitnessLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Filesystem Mode
// ============================================================================

/// Declared filesystem access mode (informational, passed to the sandbox).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsMode {
    /// Read-only.
    #[default]
    Ro,
    /// Read-write.
    Rw,
}

// ============================================================================
// SECTION: Code Source
// ============================================================================

/// Where the witness source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WitnessCode {
    /// Inline source text.
    Inline(String),
    /// Path to a source file, relative to the capsule file's directory.
    Reference(String),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Witness configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WitnessSpecError {
    /// Witness entry is not a mapping.
    #[error("Witness entry must be a mapping")]
    NotMapping,
    /// Language tag is missing or unsupported.
    #[error("Unsupported or missing language: {}", .0.as_deref().unwrap_or("(none)"))]
    UnsupportedLanguage(Option<String>),
    /// Neither `code` nor `code_ref` is present.
    #[error("Missing witness code")]
    MissingCode,
    /// Both `code` and `code_ref` are present.
    #[error("Witness code and code_ref are mutually exclusive")]
    AmbiguousCode,
    /// A field has an invalid value.
    #[error("Invalid witness field {field}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

// ============================================================================
// SECTION: Witness Spec
// ============================================================================

/// Validated witness specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessSpec {
    /// Witness name.
    pub name: WitnessName,
    /// Witness language.
    pub language: WitnessLanguage,
    /// Source code location.
    pub code: WitnessCode,
    /// Interpreter override.
    pub entrypoint: Option<String>,
    /// Extra interpreter arguments after the source file.
    pub args: Vec<String>,
    /// Declared environment (stringified values).
    pub env: BTreeMap<String, String>,
    /// Working directory as written.
    pub workdir: String,
    /// Explicit timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Data piped to stdin (empty means no stdin).
    pub stdin: String,
    /// Declared network use.
    pub net: bool,
    /// Declared filesystem mode.
    pub fs_mode: FsMode,
}

impl WitnessSpec {
    /// Parses a raw `witnesses` entry.
    ///
    /// # Errors
    ///
    /// Returns [`WitnessSpecError`] when the entry is not a valid witness.
    pub fn from_value(value: &Value) -> Result<Self, WitnessSpecError> {
        let map = value.as_object().ok_or(WitnessSpecError::NotMapping)?;
        let language = parse_language(map)?;
        let code = parse_code(map)?;
        Ok(Self {
            name: witness_name(value),
            language,
            code,
            entrypoint: optional_string(map, "entrypoint")?.filter(|text| !text.is_empty()),
            args: parse_args(map)?,
            env: parse_env(map)?,
            workdir: optional_string(map, "workdir")?
                .unwrap_or_else(|| DEFAULT_WITNESS_WORKDIR.to_string()),
            timeout_ms: parse_timeout(map)?,
            stdin: optional_string(map, "stdin")?.unwrap_or_default(),
            net: parse_bool(map, "net")?,
            fs_mode: parse_fs_mode(map)?,
        })
    }

    /// Returns the interpreter to run.
    ///
    /// The witness `entrypoint` wins, then `configured` (the operator's
    /// override for this language), then the language default.
    #[must_use]
    pub fn interpreter<'a>(&'a self, configured: Option<&'a str>) -> &'a str {
        self.entrypoint.as_deref().or(configured).unwrap_or_else(|| self.language.interpreter())
    }
}

/// Returns the display name of a raw witness entry (`unnamed` when absent).
#[must_use]
pub fn witness_name(value: &Value) -> WitnessName {
    match value.get("name") {
        Some(Value::String(name)) => WitnessName::new(name.as_str()),
        Some(Value::Number(number)) => WitnessName::new(number.to_string()),
        _ => WitnessName::new(WitnessName::UNNAMED),
    }
}

// ============================================================================
// SECTION: Field Parsers
// ============================================================================

/// Parses the `language` tag.
fn parse_language(map: &Map<String, Value>) -> Result<WitnessLanguage, WitnessSpecError> {
    match map.get("language") {
        Some(Value::String(tag)) => WitnessLanguage::from_tag(tag)
            .ok_or_else(|| WitnessSpecError::UnsupportedLanguage(Some(tag.clone()))),
        Some(Value::Null) | None => Err(WitnessSpecError::UnsupportedLanguage(None)),
        Some(other) => Err(WitnessSpecError::UnsupportedLanguage(Some(other.to_string()))),
    }
}

/// Parses the mutually exclusive `code` / `code_ref` pair.
fn parse_code(map: &Map<String, Value>) -> Result<WitnessCode, WitnessSpecError> {
    let inline = optional_string(map, "code")?.filter(|text| !text.is_empty());
    let reference = optional_string(map, "code_ref")?.filter(|text| !text.trim().is_empty());
    match (inline, reference) {
        (Some(_), Some(_)) => Err(WitnessSpecError::AmbiguousCode),
        (Some(code), None) => Ok(WitnessCode::Inline(code)),
        (None, Some(path)) => Ok(WitnessCode::Reference(path)),
        (None, None) => Err(WitnessSpecError::MissingCode),
    }
}

/// Parses `args` as a list of stringified scalars.
fn parse_args(map: &Map<String, Value>) -> Result<Vec<String>, WitnessSpecError> {
    match map.get("args") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().map(stringify_scalar).collect()),
        Some(_) => Err(WitnessSpecError::InvalidField {
            field: "args",
            reason: "expected a list".to_string(),
        }),
    }
}

/// Parses `env` as a mapping of stringified values.
fn parse_env(map: &Map<String, Value>) -> Result<BTreeMap<String, String>, WitnessSpecError> {
    match map.get("env") {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(entries)) => {
            let mut env = BTreeMap::new();
            for (key, value) in entries {
                if key.is_empty() || key.contains('=') || key.contains('\0') {
                    return Err(WitnessSpecError::InvalidField {
                        field: "env",
                        reason: format!("invalid variable name '{key}'"),
                    });
                }
                env.insert(key.clone(), stringify_scalar(value));
            }
            Ok(env)
        }
        Some(_) => Err(WitnessSpecError::InvalidField {
            field: "env",
            reason: "expected a mapping".to_string(),
        }),
    }
}

/// Parses `timeout_ms` as a positive integer.
fn parse_timeout(map: &Map<String, Value>) -> Result<Option<u64>, WitnessSpecError> {
    match map.get("timeout_ms") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_u64() {
            Some(ms) if ms > 0 => Ok(Some(ms)),
            _ => Err(WitnessSpecError::InvalidField {
                field: "timeout_ms",
                reason: "expected a positive integer".to_string(),
            }),
        },
    }
}

/// Parses `fs_mode`.
fn parse_fs_mode(map: &Map<String, Value>) -> Result<FsMode, WitnessSpecError> {
    match optional_string(map, "fs_mode")?.as_deref() {
        None | Some("ro") => Ok(FsMode::Ro),
        Some("rw") => Ok(FsMode::Rw),
        Some(other) => Err(WitnessSpecError::InvalidField {
            field: "fs_mode",
            reason: format!("expected ro or rw, found {other}"),
        }),
    }
}

/// Parses an optional boolean flag (absent means false).
fn parse_bool(map: &Map<String, Value>, field: &'static str) -> Result<bool, WitnessSpecError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(_) => Err(WitnessSpecError::InvalidField {
            field,
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Reads an optional string field; null reads as absent.
fn optional_string(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, WitnessSpecError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(WitnessSpecError::InvalidField {
            field,
            reason: "expected a string".to_string(),
        }),
    }
}

/// Renders a scalar the way it is passed to a process.
///
/// Strings pass through, numbers and booleans use their JSON spelling, null
/// becomes empty, and nested structures use compact JSON.
fn stringify_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
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
    fn parses_full_witness() {
        let value = json!({
            "name": "lint",
            "language": "python",
            "code": "print('ok')",
            "args": ["--strict", 3],
            "env": {"LEVEL": 2, "MODE": "ci", "FLAG": true},
            "workdir": "tmp",
            "timeout_ms": 1500,
            "stdin": "input",
            "net": true,
            "fs_mode": "rw"
        });
        let spec = WitnessSpec::from_value(&value).unwrap();
        assert_eq!(spec.name.as_str(), "lint");
        assert_eq!(spec.language, WitnessLanguage::Python);
        assert_eq!(spec.code, WitnessCode::Inline("print('ok')".to_string()));
        assert_eq!(spec.args, vec!["--strict".to_string(), "3".to_string()]);
        assert_eq!(spec.env.get("LEVEL").map(String::as_str), Some("2"));
        assert_eq!(spec.env.get("FLAG").map(String::as_str), Some("true"));
        assert_eq!(spec.timeout_ms, Some(1500));
        assert!(spec.net);
        assert_eq!(spec.fs_mode, FsMode::Rw);
        assert_eq!(spec.interpreter(None), "python3");
    }

    #[test]
    fn defaults_apply_to_sparse_witness() {
        let raw = json!({"language": "shell", "code": "exit 0"});
        let spec = WitnessSpec::from_value(&raw).unwrap();
        assert_eq!(spec.name.as_str(), "unnamed");
        assert_eq!(spec.workdir, ".");
        assert_eq!(spec.timeout_ms, None);
        assert_eq!(spec.fs_mode, FsMode::Ro);
        assert!(spec.stdin.is_empty());
        assert_eq!(spec.interpreter(None), "sh");
        assert_eq!(spec.interpreter(Some("dash")), "dash");
    }

    #[test]
    fn rejects_unknown_language() {
        let err = WitnessSpec::from_value(&json!({"language": "ruby", "code": "x"})).unwrap_err();
        assert_eq!(err, WitnessSpecError::UnsupportedLanguage(Some("ruby".to_string())));
        assert_eq!(err.to_string(), "Unsupported or missing language: ruby");
    }

    #[test]
    fn rejects_missing_and_ambiguous_code() {
        let missing = WitnessSpec::from_value(&json!({"language": "bash"})).unwrap_err();
        assert_eq!(missing, WitnessSpecError::MissingCode);
        let both = WitnessSpec::from_value(&json!({
            "language": "bash", "code": "true", "code_ref": "w.sh"
        }))
        .unwrap_err();
        assert_eq!(both, WitnessSpecError::AmbiguousCode);
    }

    #[test]
    fn entrypoint_override_wins() {
        let spec = WitnessSpec::from_value(&json!({
            "language": "python", "code": "pass", "entrypoint": "python3.12"
        }))
        .unwrap();
        assert_eq!(spec.interpreter(None), "python3.12");
        assert_eq!(spec.interpreter(Some("pypy3")), "python3.12");
    }

    #[test]
    fn language_table_is_closed() {
        for language in WitnessLanguage::ALL {
            assert_eq!(WitnessLanguage::from_tag(language.as_str()), Some(language));
        }
        assert_eq!(WitnessLanguage::Node.extension(), ".js");
        assert_eq!(WitnessLanguage::Shell.extension(), ".sh");
    }
}
