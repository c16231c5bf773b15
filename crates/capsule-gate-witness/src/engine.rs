// crates/capsule-gate-witness/src/engine.rs
// ============================================================================
// Module: Witness Execution Engine
// Description: Runs one witness and classifies its outcome.
// Purpose: Turn a witness declaration into a PASS/FAIL/TIMEOUT/SKIP/ERROR result.
// Dependencies: capsule-gate-core, serde_json, tempfile, tokio
// ============================================================================

//! ## Overview
//! [`WitnessEngine::run`] parses a raw witness entry, materializes its source
//! into a private temporary file, builds the child environment, passes the
//! command through the configured [`Sandbox`], and runs it under a deadline.
//!
//! Classification priority: `TIMEOUT`, then `ERROR` (the witness never ran to
//! completion), then `SKIP` (trimmed stdout is a JSON object whose `status`
//! is `"SKIP"`), then `PASS` for exit code 0, else `FAIL`.
//!
//! Security posture: witnesses are arbitrary, untrusted programs. The engine
//! limits time, environment, and process lifetime; it does not confine file
//! or network access unless the sandbox does.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use capsule_gate_core::AuditSink;
use capsule_gate_core::CapsuleId;
use capsule_gate_core::DEFAULT_WITNESS_TIMEOUT_MS;
use capsule_gate_core::NoopAuditSink;
use capsule_gate_core::WitnessAuditEvent;
use capsule_gate_core::WitnessAuditEventParams;
use capsule_gate_core::WitnessCode;
use capsule_gate_core::WitnessResult;
use capsule_gate_core::WitnessSpec;
use capsule_gate_core::WitnessStatus;
use capsule_gate_core::witness_name;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::environment::EnvPolicy;
use crate::environment::HostEnvironment;
use crate::environment::build_environment;
use crate::environment::resolve_program;
use crate::process::ProcessOutcome;
use crate::process::run_invocation;
use crate::sandbox::Invocation;
use crate::sandbox::ProcessSandbox;
use crate::sandbox::Sandbox;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default upper bound for any witness timeout (five minutes).
pub const DEFAULT_MAX_TIMEOUT_MS: u64 = 300_000;
/// Prefix of materialized witness source files.
const TEMP_PREFIX: &str = "witness-";

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Timeout used when a witness declares none.
    pub default_timeout_ms: u64,
    /// Upper bound applied to every witness timeout.
    pub max_timeout_ms: u64,
    /// Environment policy.
    pub env_policy: EnvPolicy,
    /// Host keys copied into allowlisted environments.
    pub passthrough: Vec<String>,
    /// Interpreter overrides keyed by language tag.
    pub interpreters: BTreeMap<String, String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_WITNESS_TIMEOUT_MS,
            max_timeout_ms: DEFAULT_MAX_TIMEOUT_MS,
            env_policy: EnvPolicy::default(),
            passthrough: Vec::new(),
            interpreters: BTreeMap::new(),
        }
    }
}

impl EngineSettings {
    /// Returns the effective timeout for a witness.
    #[must_use]
    pub fn effective_timeout_ms(&self, declared: Option<u64>) -> u64 {
        declared.unwrap_or(self.default_timeout_ms).clamp(1, self.max_timeout_ms.max(1))
    }
}

/// Where a witness is being run from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Owning capsule.
    pub capsule: CapsuleId,
    /// Directory of the capsule file; `code_ref` paths resolve here.
    pub capsule_dir: PathBuf,
    /// Runner working directory; relative `workdir` values resolve here.
    pub working_dir: PathBuf,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Executes witnesses.
///
/// Witnesses are untrusted code. See the module documentation for what the
/// engine does and does not contain.
#[derive(Clone)]
pub struct WitnessEngine {
    /// Engine configuration.
    settings: Arc<EngineSettings>,
    /// Command-line transformer.
    sandbox: Arc<dyn Sandbox>,
    /// Host environment snapshot.
    host: Arc<HostEnvironment>,
    /// Audit sink for run events.
    audit: Arc<dyn AuditSink>,
}

impl WitnessEngine {
    /// Creates an engine with the given settings, sandbox, and host snapshot.
    #[must_use]
    pub fn new(settings: EngineSettings, sandbox: Arc<dyn Sandbox>, host: HostEnvironment) -> Self {
        Self {
            settings: Arc::new(settings),
            sandbox,
            host: Arc::new(host),
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Creates an engine with default settings, no sandbox, and the current
    /// host environment.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(EngineSettings::default(), Arc::new(ProcessSandbox), HostEnvironment::capture())
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the engine settings.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs a raw witness entry. Never fails: problems become `ERROR` results.
    pub async fn run(&self, raw: &Value, context: &RunContext) -> WitnessResult {
        let started = Instant::now();
        let (result, language) = match WitnessSpec::from_value(raw) {
            Ok(spec) => (self.execute(&spec, context).await, Some(spec.language.as_str())),
            Err(err) => (WitnessResult::error(witness_name(raw), err.to_string()), None),
        };
        self.audit.record_witness(&WitnessAuditEvent::new(WitnessAuditEventParams {
            capsule: context.capsule.clone(),
            witness: result.name.clone(),
            language,
            status: result.status,
            exit_code: result.exit_code,
            duration_ms: started.elapsed().as_millis(),
            sandbox: self.sandbox.name(),
        }));
        result
    }

    /// Runs a validated witness spec.
    async fn execute(&self, spec: &WitnessSpec, context: &RunContext) -> WitnessResult {
        let prepared = match self.prepare(spec, context).await {
            Ok(prepared) => prepared,
            Err(message) => return WitnessResult::error(spec.name.clone(), message),
        };
        let timeout_ms = self.settings.effective_timeout_ms(spec.timeout_ms);
        let outcome = run_invocation(
            &prepared.invocation,
            spec.stdin.as_bytes(),
            Duration::from_millis(timeout_ms),
        )
        .await;
        drop(prepared.source);
        match outcome {
            Ok(ProcessOutcome::TimedOut) => WitnessResult::timeout(spec.name.clone(), timeout_ms),
            Ok(ProcessOutcome::Exited {
                exit_code,
                stdout,
                stderr,
            }) => classify(spec, exit_code, &stdout, &stderr),
            Err(err) => WitnessResult::error(spec.name.clone(), format!("Execution error: {err}")),
        }
    }

    /// Materializes source and builds the sandboxed invocation.
    async fn prepare(&self, spec: &WitnessSpec, context: &RunContext) -> Result<Prepared, String> {
        let source_text = match &spec.code {
            WitnessCode::Inline(code) => code.clone(),
            WitnessCode::Reference(path) => {
                let full = context.capsule_dir.join(path);
                tokio::fs::read_to_string(&full)
                    .await
                    .map_err(|err| format!("Failed to read code_ref {path}: {err}"))?
            }
        };
        let workdir = absolutize(&context.working_dir, &spec.workdir);
        if !workdir.is_dir() {
            return Err(format!("Working directory not found: {}", workdir.display()));
        }
        let configured = self.settings.interpreters.get(spec.language.as_str());
        let interpreter = spec.interpreter(configured.map(String::as_str));
        let search_path = self.host.get("PATH");
        let program = resolve_program(interpreter, search_path, &context.working_dir)
            .ok_or_else(|| format!("Entrypoint not found: {interpreter}"))?;

        let source = write_source(&source_text, spec.language.extension())
            .map_err(|err| format!("Execution error: {err}"))?;
        let mut args: Vec<OsString> = vec![source.path().as_os_str().to_os_string()];
        args.extend(spec.args.iter().map(OsString::from));
        let invocation = Invocation {
            program,
            args,
            env: build_environment(
                self.settings.env_policy,
                &self.settings.passthrough,
                &self.host,
                &spec.env,
            ),
            workdir,
            net: spec.net,
            fs_mode: spec.fs_mode,
        };
        let mut invocation = self.sandbox.prepare(invocation).map_err(|err| err.to_string())?;
        if !invocation.program.is_absolute() {
            let name = invocation.program.to_string_lossy().into_owned();
            invocation.program = resolve_program(&name, search_path, &context.working_dir)
                .ok_or_else(|| format!("Sandbox command not found: {name}"))?;
        }
        Ok(Prepared {
            invocation,
            source,
        })
    }
}

/// A ready-to-spawn invocation and the temp file it reads.
struct Prepared {
    /// Sandboxed invocation.
    invocation: Invocation,
    /// Source file; removed when dropped.
    source: NamedTempFile,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes witness source to a fresh `witness-*` temp file.
fn write_source(text: &str, extension: &str) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().prefix(TEMP_PREFIX).suffix(extension).tempfile()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Resolves `path` against `base` unless it is already absolute.
fn absolutize(base: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() { candidate.to_path_buf() } else { base.join(candidate) }
}

/// Classifies a completed process.
fn classify(spec: &WitnessSpec, exit_code: i32, stdout: &[u8], stderr: &[u8]) -> WitnessResult {
    let stdout = String::from_utf8_lossy(stdout).into_owned();
    let stderr = String::from_utf8_lossy(stderr).into_owned();
    let status = if reports_skip(&stdout) {
        WitnessStatus::Skip
    } else if exit_code == 0 {
        WitnessStatus::Pass
    } else {
        WitnessStatus::Fail
    };
    WitnessResult {
        name: spec.name.clone(),
        status,
        exit_code,
        stdout,
        stderr,
    }
}

/// Returns true when stdout is a JSON object with `"status": "SKIP"`.
fn reports_skip(stdout: &str) -> bool {
    serde_json::from_str::<Value>(stdout.trim())
        .ok()
        .and_then(|value| value.get("status").and_then(Value::as_str).map(|s| s == "SKIP"))
        .unwrap_or(false)
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
    fn skip_detection_requires_object_with_skip_status() {
        assert!(reports_skip("  {\"status\":\"SKIP\",\"reason\":\"n/a\"}\n"));
        assert!(!reports_skip("{\"status\":\"PASS\"}"));
        assert!(!reports_skip("[\"SKIP\"]"));
        assert!(!reports_skip("SKIP"));
        assert!(!reports_skip("{\"status\":\"SKIP\"} trailing"));
    }

    #[test]
    fn timeouts_are_capped() {
        let settings = EngineSettings {
            max_timeout_ms: 1_000,
            ..EngineSettings::default()
        };
        assert_eq!(settings.effective_timeout_ms(None), 1_000);
        assert_eq!(settings.effective_timeout_ms(Some(250)), 250);
        assert_eq!(settings.effective_timeout_ms(Some(60_000)), 1_000);
    }

    #[test]
    fn relative_workdir_resolves_against_base() {
        assert_eq!(absolutize(Path::new("/runner"), "sub"), PathBuf::from("/runner/sub"));
        assert_eq!(absolutize(Path::new("/runner"), "/abs"), PathBuf::from("/abs"));
    }
}
