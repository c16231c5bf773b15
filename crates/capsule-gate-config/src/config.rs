// crates/capsule-gate-config/src/config.rs
// ============================================================================
// Module: Capsule Gate Configuration
// Description: Configuration loading and validation for the capsule gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: capsule-gate-core, capsule-gate-witness, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path comes from the caller, then `CAPSULE_GATE_CONFIG`, then
//! `capsule-gate.toml` in the working directory. Only the implicit default
//! file may be absent; every section then takes its defaults.
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use capsule_gate_core::AuditSink;
use capsule_gate_core::DEFAULT_DOCUMENT_EXTENSIONS;
use capsule_gate_core::DEFAULT_MAX_DOCUMENT_BYTES;
use capsule_gate_core::DEFAULT_WITNESS_TIMEOUT_MS;
use capsule_gate_core::DiscoveryOptions;
use capsule_gate_core::FileAuditSink;
use capsule_gate_core::GateOptions;
use capsule_gate_core::NoopAuditSink;
use capsule_gate_core::StderrAuditSink;
use capsule_gate_core::WitnessLanguage;
use capsule_gate_witness::DEFAULT_MAX_TIMEOUT_MS;
use capsule_gate_witness::EngineSettings;
use capsule_gate_witness::EnvPolicy;
use capsule_gate_witness::ProcessSandbox;
use capsule_gate_witness::Sandbox;
use capsule_gate_witness::WrapperSandbox;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "capsule-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CAPSULE_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum allowed witness timeout in milliseconds (one hour).
pub const MAX_TIMEOUT_LIMIT_MS: u64 = 3_600_000;
/// Default number of witnesses run at once.
pub(crate) const DEFAULT_MAX_CONCURRENCY: usize = 1;
/// Maximum number of witnesses run at once.
pub const MAX_CONCURRENCY_LIMIT: usize = 64;
/// Maximum allowed document size in bytes.
pub const MAX_DOCUMENT_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Maximum number of passthrough environment keys.
pub(crate) const MAX_PASSTHROUGH_KEYS: usize = 128;
/// Maximum number of accepted document extensions.
pub(crate) const MAX_DISCOVERY_EXTENSIONS: usize = 16;
/// Maximum number of wrapper command tokens.
pub(crate) const MAX_WRAPPER_TOKENS: usize = 64;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Capsule gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapsuleGateConfig {
    /// Witness runner configuration.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Sandbox configuration.
    #[serde(default)]
    pub sandbox: SandboxConfig,
    /// Policy gate configuration.
    #[serde(default)]
    pub gate: GateConfig,
    /// Document discovery configuration.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Audit event configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// File the configuration was read from, if any (not serialized).
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl CapsuleGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path, env::var(CONFIG_ENV_VAR).ok())?;
        if !resolved.explicit && !resolved.path.exists() {
            let mut config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load_file(&resolved.path)
    }

    /// Loads configuration from an explicit file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is missing, oversized, not
    /// UTF-8, not valid TOML, or fails validation.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml(content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.runner.validate()?;
        self.sandbox.validate()?;
        self.discovery.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Witness runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunnerConfig {
    /// Timeout used when a witness declares none.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Upper bound for any witness timeout.
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
    /// Maximum witnesses run at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Environment policy for witness processes.
    #[serde(default)]
    pub env_policy: EnvPolicy,
    /// Host variables copied into allowlisted environments.
    #[serde(default)]
    pub passthrough: Vec<String>,
    /// Interpreter overrides keyed by language tag.
    #[serde(default)]
    pub interpreters: BTreeMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            env_policy: EnvPolicy::default(),
            passthrough: Vec::new(),
            interpreters: BTreeMap::new(),
        }
    }
}

impl RunnerConfig {
    /// Validates runner limits, environment keys, and interpreter overrides.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_timeout_ms == 0 || self.max_timeout_ms > MAX_TIMEOUT_LIMIT_MS {
            return Err(ConfigError::Invalid(format!(
                "runner.max_timeout_ms must be between 1 and {MAX_TIMEOUT_LIMIT_MS}"
            )));
        }
        if self.default_timeout_ms == 0 || self.default_timeout_ms > self.max_timeout_ms {
            return Err(ConfigError::Invalid(
                "runner.default_timeout_ms must be between 1 and runner.max_timeout_ms"
                    .to_string(),
            ));
        }
        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "runner.max_concurrency must be between 1 and {MAX_CONCURRENCY_LIMIT}"
            )));
        }
        if self.passthrough.len() > MAX_PASSTHROUGH_KEYS {
            return Err(ConfigError::Invalid("runner.passthrough has too many keys".to_string()));
        }
        for key in &self.passthrough {
            validate_env_key("runner.passthrough", key)?;
        }
        for (tag, interpreter) in &self.interpreters {
            if WitnessLanguage::from_tag(tag).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "runner.interpreters: unsupported language '{tag}'"
                )));
            }
            if interpreter.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "runner.interpreters.{tag} must be non-empty"
                )));
            }
        }
        Ok(())
    }

    /// Converts the section into witness engine settings.
    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            default_timeout_ms: self.default_timeout_ms,
            max_timeout_ms: self.max_timeout_ms,
            env_policy: self.env_policy,
            passthrough: self.passthrough.clone(),
            interpreters: self.interpreters.clone(),
        }
    }
}

// ============================================================================
// SECTION: Sandbox
// ============================================================================

/// Sandbox modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxMode {
    /// Run the interpreter directly.
    #[default]
    Process,
    /// Prefix every command with a wrapper command.
    Wrapper,
}

/// Sandbox configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SandboxConfig {
    /// Sandbox mode.
    #[serde(default)]
    pub mode: SandboxMode,
    /// Wrapper command line (wrapper mode only).
    #[serde(default)]
    pub command: Vec<String>,
    /// Refuse witnesses that declare network use (wrapper mode only).
    #[serde(default)]
    pub deny_net: bool,
}

impl SandboxConfig {
    /// Validates the wrapper command.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.mode {
            SandboxMode::Process => {
                if !self.command.is_empty() {
                    return Err(ConfigError::Invalid(
                        "sandbox.command requires sandbox.mode = \"wrapper\"".to_string(),
                    ));
                }
            }
            SandboxMode::Wrapper => {
                if self.command.first().is_none_or(|program| program.trim().is_empty()) {
                    return Err(ConfigError::Invalid(
                        "sandbox.command must be non-empty in wrapper mode".to_string(),
                    ));
                }
                if self.command.len() > MAX_WRAPPER_TOKENS {
                    return Err(ConfigError::Invalid(
                        "sandbox.command has too many arguments".to_string(),
                    ));
                }
                if self.command.iter().any(|token| token.contains('\0')) {
                    return Err(ConfigError::Invalid(
                        "sandbox.command must not contain NUL bytes".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Builds the configured sandbox.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the wrapper command is unusable.
    pub fn build(&self) -> Result<Arc<dyn Sandbox>, ConfigError> {
        match self.mode {
            SandboxMode::Process => Ok(Arc::new(ProcessSandbox)),
            SandboxMode::Wrapper => WrapperSandbox::new(&self.command, self.deny_net)
                .map(|sandbox| Arc::new(sandbox) as Arc<dyn Sandbox>)
                .map_err(|err| ConfigError::Invalid(err.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Policy gate configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct GateConfig {
    /// Require a valid signature on approved capsules.
    #[serde(default)]
    pub require_signature_on_approved: bool,
}

impl GateConfig {
    /// Converts the section into gate options.
    #[must_use]
    pub const fn options(&self) -> GateOptions {
        GateOptions {
            require_signature_on_approved: self.require_signature_on_approved,
        }
    }
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// Document discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscoveryConfig {
    /// Accepted file extensions without the leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Maximum size of one capsule document in bytes.
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            max_document_bytes: default_max_document_bytes(),
        }
    }
}

impl DiscoveryConfig {
    /// Validates extensions and the document size limit.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.extensions.is_empty() || self.extensions.len() > MAX_DISCOVERY_EXTENSIONS {
            return Err(ConfigError::Invalid(format!(
                "discovery.extensions must list between 1 and {MAX_DISCOVERY_EXTENSIONS} entries"
            )));
        }
        for extension in &self.extensions {
            let valid = !extension.is_empty()
                && extension.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
            if !valid {
                return Err(ConfigError::Invalid(format!(
                    "discovery.extensions: invalid extension '{extension}'"
                )));
            }
        }
        if self.max_document_bytes == 0 || self.max_document_bytes > MAX_DOCUMENT_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "discovery.max_document_bytes must be between 1 and {MAX_DOCUMENT_BYTES_LIMIT}"
            )));
        }
        Ok(())
    }

    /// Converts the section into discovery options.
    #[must_use]
    pub fn options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            extensions: self.extensions.clone(),
            max_document_bytes: self.max_document_bytes,
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Discard audit events.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
}

/// Audit event configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditConfig {
    /// Selected sink.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path (file sink only).
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates the sink selection and path.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path requires audit.sink = \"file\"".to_string()))
            }
            (_, None) => Ok(()),
        }
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn build(&self) -> Result<Arc<dyn AuditSink>, ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::File, Some(path)) => FileAuditSink::new(Path::new(path.trim()))
                .map(|sink| Arc::new(sink) as Arc<dyn AuditSink>)
                .map_err(|err| ConfigError::Io(format!("audit.path {path}: {err}"))),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// A resolved config path and whether the caller asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedPath {
    /// Config file path.
    path: PathBuf,
    /// True for CLI or environment paths, which must exist.
    explicit: bool,
}

/// Resolves the config path from the CLI value, the environment, or the default.
fn resolve_path(
    path: Option<&Path>,
    env_path: Option<String>,
) -> Result<ResolvedPath, ConfigError> {
    if let Some(path) = path {
        return Ok(ResolvedPath {
            path: path.to_path_buf(),
            explicit: true,
        });
    }
    if let Some(env_path) = env_path.filter(|value| !value.trim().is_empty()) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(ResolvedPath {
            path: PathBuf::from(env_path),
            explicit: true,
        });
    }
    Ok(ResolvedPath {
        path: PathBuf::from(DEFAULT_CONFIG_NAME),
        explicit: false,
    })
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates an environment variable name.
fn validate_env_key(field: &str, key: &str) -> Result<(), ConfigError> {
    let mut chars = key.chars();
    let leading = chars.next().is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
    if !leading || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(ConfigError::Invalid(format!("{field}: invalid variable name '{key}'")));
    }
    Ok(())
}

/// Default witness timeout.
const fn default_timeout_ms() -> u64 {
    DEFAULT_WITNESS_TIMEOUT_MS
}

/// Default witness timeout ceiling.
const fn default_max_timeout_ms() -> u64 {
    DEFAULT_MAX_TIMEOUT_MS
}

/// Default runner concurrency.
const fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

/// Default document extensions.
fn default_extensions() -> Vec<String> {
    DEFAULT_DOCUMENT_EXTENSIONS.iter().map(ToString::to_string).collect()
}

/// Default document size limit.
const fn default_max_document_bytes() -> usize {
    DEFAULT_MAX_DOCUMENT_BYTES
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
    fn cli_path_wins_over_environment() {
        let resolved =
            resolve_path(Some(Path::new("cli.toml")), Some("env.toml".to_string())).unwrap();
        assert_eq!(resolved.path, PathBuf::from("cli.toml"));
        assert!(resolved.explicit);
    }

    #[test]
    fn environment_path_is_explicit() {
        let resolved = resolve_path(None, Some("env.toml".to_string())).unwrap();
        assert_eq!(resolved.path, PathBuf::from("env.toml"));
        assert!(resolved.explicit);
    }

    #[test]
    fn default_path_is_implicit() {
        let resolved = resolve_path(None, None).unwrap();
        assert_eq!(resolved.path, PathBuf::from(DEFAULT_CONFIG_NAME));
        assert!(!resolved.explicit);
        let blank = resolve_path(None, Some("  ".to_string())).unwrap();
        assert!(!blank.explicit);
    }

    #[test]
    fn oversized_environment_path_is_rejected() {
        let long = "a".repeat(MAX_TOTAL_PATH_LENGTH + 1);
        assert!(resolve_path(None, Some(long)).is_err());
    }

    #[test]
    fn path_component_limit_is_enforced() {
        let component = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        let result = validate_path(Path::new(&component));
        assert!(result.unwrap_err().to_string().contains("component too long"));
        assert!(validate_path(Path::new("dir/capsule-gate.toml")).is_ok());
    }

    #[test]
    fn env_keys_must_be_identifiers() {
        assert!(validate_env_key("k", "HOME").is_ok());
        assert!(validate_env_key("k", "_PRIVATE_1").is_ok());
        assert!(validate_env_key("k", "").is_err());
        assert!(validate_env_key("k", "1ABC").is_err());
        assert!(validate_env_key("k", "A=B").is_err());
    }
}
