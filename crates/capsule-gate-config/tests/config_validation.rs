//! Validation tests for capsule-gate-config.
// crates/capsule-gate-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Defaults, limits, and section conversions.
// Purpose: Ensure capsule-gate.toml is parsed strictly and fails closed.
// =============================================================================

use std::fs;

use capsule_gate_config::AuditSinkKind;
use capsule_gate_config::CapsuleGateConfig;
use capsule_gate_config::ConfigError;
use capsule_gate_config::MAX_CONCURRENCY_LIMIT;
use capsule_gate_config::MAX_DOCUMENT_BYTES_LIMIT;
use capsule_gate_config::MAX_TIMEOUT_LIMIT_MS;
use capsule_gate_config::SandboxMode;
use capsule_gate_core::DEFAULT_MAX_DOCUMENT_BYTES;
use capsule_gate_core::DEFAULT_WITNESS_TIMEOUT_MS;
use capsule_gate_witness::DEFAULT_MAX_TIMEOUT_MS;
use capsule_gate_witness::EnvPolicy;

type TestResult = Result<(), String>;

/// Assert that parsing fails with an error containing a specific substring.
fn assert_invalid(toml: &str, needle: &str) -> TestResult {
    match CapsuleGateConfig::from_toml(toml) {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error '{message}' did not contain '{needle}'"))
            }
        }
        Ok(_) => Err(format!("expected invalid config for:\n{toml}")),
    }
}

fn parse(toml: &str) -> Result<CapsuleGateConfig, String> {
    CapsuleGateConfig::from_toml(toml).map_err(|err| err.to_string())
}

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let config = parse("")?;
    assert_eq!(config.runner.default_timeout_ms, DEFAULT_WITNESS_TIMEOUT_MS);
    assert_eq!(config.runner.max_timeout_ms, DEFAULT_MAX_TIMEOUT_MS);
    assert_eq!(config.runner.max_concurrency, 1);
    assert_eq!(config.runner.env_policy, EnvPolicy::Allowlist);
    assert!(config.runner.passthrough.is_empty());
    assert_eq!(config.sandbox.mode, SandboxMode::Process);
    assert!(!config.gate.require_signature_on_approved);
    assert_eq!(config.discovery.extensions, vec!["yaml".to_string(), "yml".to_string()]);
    assert_eq!(config.discovery.max_document_bytes, DEFAULT_MAX_DOCUMENT_BYTES);
    assert_eq!(config.audit.sink, AuditSinkKind::None);
    assert!(config.source.is_none());
    Ok(())
}

#[test]
fn full_config_round_trips_into_runtime_types() -> TestResult {
    let config = parse(
        r#"
[runner]
default_timeout_ms = 2000
max_timeout_ms = 10000
max_concurrency = 8
env_policy = "host-overlay"
passthrough = ["HOME", "LANG"]

[runner.interpreters]
python = "/opt/python/bin/python3"

[sandbox]
mode = "wrapper"
command = ["firejail", "--quiet"]
deny_net = true

[gate]
require_signature_on_approved = true

[discovery]
extensions = ["yaml"]
max_document_bytes = 2048

[audit]
sink = "stderr"
"#,
    )?;
    let settings = config.runner.engine_settings();
    assert_eq!(settings.default_timeout_ms, 2000);
    assert_eq!(settings.max_timeout_ms, 10000);
    assert_eq!(settings.env_policy, EnvPolicy::HostOverlay);
    assert_eq!(settings.passthrough, vec!["HOME".to_string(), "LANG".to_string()]);
    assert_eq!(
        settings.interpreters.get("python").map(String::as_str),
        Some("/opt/python/bin/python3")
    );
    assert!(config.gate.options().require_signature_on_approved);
    assert_eq!(config.discovery.options().max_document_bytes, 2048);
    let sandbox = config.sandbox.build().map_err(|err| err.to_string())?;
    assert_eq!(sandbox.name(), "wrapper");
    config.audit.build().map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn unknown_env_policy_is_a_parse_error() {
    let result = CapsuleGateConfig::from_toml("[runner]\nenv_policy = \"everything\"\n");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn timeout_limits_are_enforced() -> TestResult {
    assert_invalid("[runner]\nmax_timeout_ms = 0\n", "max_timeout_ms")?;
    assert_invalid(
        &format!("[runner]\nmax_timeout_ms = {}\n", MAX_TIMEOUT_LIMIT_MS + 1),
        "max_timeout_ms",
    )?;
    assert_invalid("[runner]\ndefault_timeout_ms = 0\n", "default_timeout_ms")?;
    assert_invalid(
        "[runner]\ndefault_timeout_ms = 5000\nmax_timeout_ms = 1000\n",
        "default_timeout_ms",
    )?;
    parse(&format!("[runner]\nmax_timeout_ms = {MAX_TIMEOUT_LIMIT_MS}\n"))?;
    Ok(())
}

#[test]
fn concurrency_limits_are_enforced() -> TestResult {
    assert_invalid("[runner]\nmax_concurrency = 0\n", "max_concurrency")?;
    assert_invalid(
        &format!("[runner]\nmax_concurrency = {}\n", MAX_CONCURRENCY_LIMIT + 1),
        "max_concurrency",
    )?;
    parse(&format!("[runner]\nmax_concurrency = {MAX_CONCURRENCY_LIMIT}\n"))?;
    Ok(())
}

#[test]
fn passthrough_keys_are_validated() -> TestResult {
    assert_invalid("[runner]\npassthrough = [\"A=B\"]\n", "invalid variable name")?;
    assert_invalid("[runner]\npassthrough = [\"\"]\n", "invalid variable name")?;
    Ok(())
}

#[test]
fn interpreter_overrides_need_known_languages() -> TestResult {
    assert_invalid("[runner.interpreters]\nruby = \"ruby\"\n", "unsupported language")?;
    assert_invalid("[runner.interpreters]\nnode = \" \"\n", "must be non-empty")?;
    Ok(())
}

#[test]
fn wrapper_sandbox_requires_command() -> TestResult {
    assert_invalid("[sandbox]\nmode = \"wrapper\"\n", "sandbox.command")?;
    assert_invalid("[sandbox]\nmode = \"wrapper\"\ncommand = [\"\"]\n", "sandbox.command")?;
    assert_invalid("[sandbox]\ncommand = [\"bwrap\"]\n", "wrapper")?;
    Ok(())
}

#[test]
fn discovery_limits_are_enforced() -> TestResult {
    assert_invalid("[discovery]\nextensions = []\n", "discovery.extensions")?;
    assert_invalid("[discovery]\nextensions = [\".yaml\"]\n", "invalid extension")?;
    assert_invalid("[discovery]\nmax_document_bytes = 0\n", "max_document_bytes")?;
    assert_invalid(
        &format!("[discovery]\nmax_document_bytes = {}\n", MAX_DOCUMENT_BYTES_LIMIT + 1),
        "max_document_bytes",
    )?;
    Ok(())
}

#[test]
fn audit_file_sink_requires_path() -> TestResult {
    assert_invalid("[audit]\nsink = \"file\"\n", "audit.path")?;
    assert_invalid("[audit]\nsink = \"file\"\npath = \"  \"\n", "audit.path")?;
    assert_invalid("[audit]\nsink = \"stderr\"\npath = \"a.log\"\n", "audit.path")?;
    Ok(())
}

#[test]
fn audit_file_sink_opens_the_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("audit.jsonl");
    let config = parse(&format!("[audit]\nsink = \"file\"\npath = \"{}\"\n", path.display()))?;
    config.audit.build().map_err(|err| err.to_string())?;
    assert!(path.exists());
    Ok(())
}

#[test]
fn load_records_source_and_rejects_missing_explicit_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("capsule-gate.toml");
    fs::write(&path, "[gate]\nrequire_signature_on_approved = true\n")
        .map_err(|err| err.to_string())?;
    let config = CapsuleGateConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    assert_eq!(config.source.as_deref(), Some(path.as_path()));
    assert!(config.gate.require_signature_on_approved);

    let missing = dir.path().join("missing.toml");
    let result = CapsuleGateConfig::load(Some(&missing));
    assert!(matches!(result, Err(ConfigError::Io(_))));
    Ok(())
}

#[test]
fn oversized_and_non_utf8_files_are_rejected() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let big = dir.path().join("big.toml");
    fs::write(&big, format!("# {}\n", "x".repeat(1024 * 1024))).map_err(|err| err.to_string())?;
    match CapsuleGateConfig::load_file(&big) {
        Err(ConfigError::Invalid(message)) if message.contains("size limit") => {}
        other => return Err(format!("unexpected result: {}", describe(&other))),
    }
    let binary = dir.path().join("binary.toml");
    fs::write(&binary, [0xff_u8, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    match CapsuleGateConfig::load_file(&binary) {
        Err(ConfigError::Invalid(message)) if message.contains("utf-8") => Ok(()),
        other => Err(format!("unexpected result: {}", describe(&other))),
    }
}

fn describe(result: &Result<CapsuleGateConfig, ConfigError>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err(err) => err.to_string(),
    }
}
