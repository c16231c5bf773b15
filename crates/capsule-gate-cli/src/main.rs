// crates/capsule-gate-cli/src/main.rs
// ============================================================================
// Module: Capsule Gate CLI Entry Point
// Description: Command dispatcher for digest, policy, witness, and signing workflows.
// Purpose: Provide a safe, localized CLI over capsule corpora.
// Dependencies: clap, capsule-gate-config, capsule-gate-core, capsule-gate-witness, tokio.
// ============================================================================

//! ## Overview
//! The capsule-gate CLI maintains capsule fingerprints, enforces the
//! publication gate, executes witnesses, signs capsules, and attests witness
//! results. All user-facing strings are routed through the i18n catalog.
//! Security posture: inputs are untrusted and must be validated; witnesses are
//! arbitrary code and run only through the configured sandbox.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use capsule_gate_cli::i18n::Locale;
use capsule_gate_cli::i18n::set_locale;
use capsule_gate_cli::t;
use capsule_gate_config::CapsuleGateConfig;
use capsule_gate_core::AuditSink;
use capsule_gate_core::CapsuleDocument;
use capsule_gate_core::CapsuleId;
use capsule_gate_core::CapsuleReport;
use capsule_gate_core::CapsuleStatus;
use capsule_gate_core::DigestAuditEvent;
use capsule_gate_core::DigestStatus;
use capsule_gate_core::DiscoveryError;
use capsule_gate_core::DiscoveryOptions;
use capsule_gate_core::DocumentError;
use capsule_gate_core::GateAuditEvent;
use capsule_gate_core::GateAuditEventParams;
use capsule_gate_core::GateEntryResult;
use capsule_gate_core::GateFailure;
use capsule_gate_core::GateReport;
use capsule_gate_core::KeyId;
use capsule_gate_core::LoadedDocument;
use capsule_gate_core::PolicyGate;
use capsule_gate_core::ReadLimitError;
use capsule_gate_core::SIGNING_METHOD;
use capsule_gate_core::SignedResults;
use capsule_gate_core::SigningAuditEvent;
use capsule_gate_core::SigningUpdate;
use capsule_gate_core::VerificationOutcome;
use capsule_gate_core::VerificationReport;
use capsule_gate_core::WitnessStatus;
use capsule_gate_core::attest_results;
use capsule_gate_core::attestation_timestamp;
use capsule_gate_core::check_digest;
use capsule_gate_core::decode_signing_key;
use capsule_gate_core::decode_verifying_key;
use capsule_gate_core::encode_signature;
use capsule_gate_core::encode_verifying_key;
use capsule_gate_core::load_documents;
use capsule_gate_core::read_file_with_limit;
use capsule_gate_core::read_with_limit;
use capsule_gate_core::sign_digest;
use capsule_gate_core::verify_attestation;
use capsule_gate_core::verify_batch;
use capsule_gate_core::with_digest;
use capsule_gate_core::write_document_atomic;
use capsule_gate_witness::BatchOptions;
use capsule_gate_witness::BatchRunner;
use capsule_gate_witness::CapsuleFilter;
use capsule_gate_witness::EnvPolicy;
use capsule_gate_witness::HostEnvironment;
use capsule_gate_witness::WitnessEngine;
use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use ed25519_dalek::SigningKey;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Limits and Constants
// ============================================================================

/// Maximum size of a signing key file.
const MAX_SIGNING_KEY_BYTES: usize = 8 * 1024;
/// Maximum size of a witness results or signed results payload.
const MAX_RESULTS_BYTES: usize = 32 * 1024 * 1024;
/// Environment variable selecting the output language.
const LANG_ENV: &str = "CAPSULE_GATE_LANG";
/// Exit code for fatal batch-boundary errors.
const FATAL_EXIT_CODE: u8 = 2;
/// Exit code reported when a witness batch is interrupted.
const INTERRUPTED_EXIT_CODE: u8 = 130;
/// Default attestation output directory.
const DEFAULT_ATTEST_DIR: &str = "artifacts/out";
/// Number of digest characters shown in human output.
const DIGEST_PREVIEW_CHARS: usize = 16;
/// Width of the witness summary separator.
const SUMMARY_RULE_WIDTH: usize = 60;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "capsule-gate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Preferred output language (overrides `CAPSULE_GATE_LANG`).
    #[arg(long, value_enum, value_name = "LANG", global = true)]
    lang: Option<LangArg>,
    /// Config file path (defaults to capsule-gate.toml or `CAPSULE_GATE_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute, verify, or update capsule digests.
    Digest(DigestCommand),
    /// Enforce the publication gate over a capsule corpus.
    Policy(PolicyCommand),
    /// Execute capsule witnesses and aggregate verdicts.
    Witness(WitnessCommand),
    /// Sign capsules whose stored digest is current.
    Sign(SignCommand),
    /// Report digest and signature status for every capsule.
    Verify(VerifyCommand),
    /// Sign or verify witness result attestations.
    Attest {
        /// Selected attestation subcommand.
        #[command(subcommand)]
        command: AttestCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Supported CLI language selections.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum LangArg {
    /// English.
    En,
    /// Catalan.
    Ca,
}

impl From<LangArg> for Locale {
    fn from(value: LangArg) -> Self {
        match value {
            LangArg::En => Self::En,
            LangArg::Ca => Self::Ca,
        }
    }
}

/// Witness environment policy selections.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum EnvPolicyArg {
    /// Empty environment plus passthrough keys and witness env.
    Allowlist,
    /// Witness env overlaid by the full host environment.
    HostOverlay,
}

impl From<EnvPolicyArg> for EnvPolicy {
    fn from(value: EnvPolicyArg) -> Self {
        match value {
            EnvPolicyArg::Allowlist => Self::Allowlist,
            EnvPolicyArg::HostOverlay => Self::HostOverlay,
        }
    }
}

/// Arguments for the digest command.
#[derive(Args, Debug)]
struct DigestCommand {
    /// Capsule file or directory.
    #[arg(value_name = "PATH")]
    path: PathBuf,
    /// Report digest status without rewriting files.
    #[arg(long)]
    verify: bool,
    /// Emit JSON instead of the human summary.
    #[arg(long)]
    json: bool,
}

/// Arguments for the policy command.
#[derive(Args, Debug)]
struct PolicyCommand {
    /// Capsule file or directory.
    #[arg(value_name = "PATH")]
    path: PathBuf,
    /// Require valid signatures on approved capsules.
    #[arg(long = "require-signature-on-approved")]
    require_signature_on_approved: bool,
    /// Emit JSON instead of the human summary.
    #[arg(long)]
    json: bool,
}

/// Arguments for the witness command.
#[derive(Args, Debug)]
struct WitnessCommand {
    /// Capsule file or directory.
    #[arg(value_name = "PATH")]
    path: PathBuf,
    /// Select capsules by exact id.
    #[arg(long = "capsule", value_name = "ID")]
    capsules: Vec<String>,
    /// Select capsules by file glob.
    #[arg(long = "capsule-file", value_name = "GLOB")]
    capsule_files: Vec<String>,
    /// Restrict execution to named witnesses.
    #[arg(long = "witness", value_name = "NAME")]
    witnesses: Vec<String>,
    /// Emit the JSON report array.
    #[arg(long)]
    json: bool,
    /// Show witness output for every result.
    #[arg(long)]
    verbose: bool,
    /// Maximum concurrent witness runs.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..=64))]
    jobs: Option<u16>,
    /// Environment policy override.
    #[arg(long = "env-policy", value_enum, value_name = "POLICY")]
    env_policy: Option<EnvPolicyArg>,
}

/// Private key inputs shared by signing commands.
#[derive(Args, Debug)]
struct SigningKeyArgs {
    /// Base64 Ed25519 private key (32-byte seed or 64-byte keypair).
    #[arg(
        long,
        value_name = "B64",
        required_unless_present = "key_file",
        conflicts_with = "key_file"
    )]
    key: Option<String>,
    /// File containing the base64 private key.
    #[arg(long = "key-file", value_name = "PATH")]
    key_file: Option<PathBuf>,
    /// Key identifier recorded with signatures.
    #[arg(long = "key-id", value_name = "ID", default_value = KeyId::DEFAULT)]
    key_id: String,
}

/// Arguments for the sign command.
#[derive(Args, Debug)]
struct SignCommand {
    /// Capsule file or directory.
    #[arg(value_name = "PATH")]
    path: PathBuf,
    /// Private key inputs.
    #[command(flatten)]
    key: SigningKeyArgs,
    /// Base64 public key; derived from the private key when omitted.
    #[arg(long = "pub", value_name = "B64")]
    pubkey: Option<String>,
}

/// Arguments for the verify command.
#[derive(Args, Debug)]
struct VerifyCommand {
    /// Capsule file or directory.
    #[arg(value_name = "PATH")]
    path: PathBuf,
    /// Emit JSON instead of per-capsule lines.
    #[arg(long)]
    json: bool,
}

/// Attestation subcommands.
#[derive(Subcommand, Debug)]
enum AttestCommand {
    /// Sign a witness results array.
    Sign(AttestSignCommand),
    /// Verify a signed results envelope.
    Verify(AttestVerifyCommand),
}

/// Arguments for `attest sign`.
#[derive(Args, Debug)]
struct AttestSignCommand {
    /// Witness results JSON (reads stdin when omitted or `-`).
    #[arg(value_name = "RESULTS")]
    results: Option<PathBuf>,
    /// Private key inputs.
    #[command(flatten)]
    key: SigningKeyArgs,
    /// Directory receiving the attestation files.
    #[arg(long = "out-dir", value_name = "DIR", default_value = DEFAULT_ATTEST_DIR)]
    out_dir: PathBuf,
}

/// Arguments for `attest verify`.
#[derive(Args, Debug)]
struct AttestVerifyCommand {
    /// Signed results envelope.
    #[arg(value_name = "SIGNED")]
    signed: PathBuf,
    /// Base64 public key.
    #[arg(long = "pub", value_name = "B64")]
    pubkey: String,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the resolved configuration file.
    Validate,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for localized error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a localized message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let env_lang = std::env::var(LANG_ENV).ok();
    let locale = resolve_locale(cli.lang, env_lang.as_deref())?;
    set_locale(locale);
    if locale != Locale::En {
        write_stderr_line(&t!("i18n.disclaimer.machine_translated"))
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let config_path = cli.config.as_deref();
    match command {
        Commands::Digest(command) => command_digest(&command, config_path),
        Commands::Policy(command) => command_policy(&command, config_path),
        Commands::Witness(command) => command_witness(command, config_path).await,
        Commands::Sign(command) => command_sign(&command, config_path),
        Commands::Verify(command) => command_verify(&command, config_path),
        Commands::Attest {
            command,
        } => command_attest(command),
        Commands::Config {
            command,
        } => command_config(&command, config_path),
    }
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Shared Loading
// ============================================================================

/// Loads the resolved configuration.
fn load_config(path: Option<&Path>) -> CliResult<CapsuleGateConfig> {
    CapsuleGateConfig::load(path)
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))
}

/// Builds the configured audit sink.
fn open_audit(config: &CapsuleGateConfig) -> CliResult<Arc<dyn AuditSink>> {
    config.audit.build().map_err(|err| CliError::new(t!("audit.init_failed", error = err)))
}

/// Discovers and loads capsule documents under `path`.
fn load_capsules(path: &Path, options: &DiscoveryOptions) -> CliResult<Vec<LoadedDocument>> {
    load_documents(path, options).map_err(|err| match err {
        DiscoveryError::NotFound(_) => {
            CliError::new(t!("input.path_not_found", path = path.display()))
        }
        other @ DiscoveryError::Walk {
            ..
        } => CliError::new(t!("input.discovery_failed", path = path.display(), error = other)),
    })
}

// ============================================================================
// SECTION: Digest Command
// ============================================================================

/// Per-file digest outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct DigestEntry {
    /// Source path.
    file: String,
    /// Capsule id when the document loaded.
    id: Option<String>,
    /// Digest status.
    status: DigestStatus,
    /// Stored digest before any update.
    old_digest: Option<String>,
    /// Recomputed digest.
    new_digest: Option<String>,
    /// True when the file was rewritten.
    updated: bool,
    /// Load or write failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Digest counts across a corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
struct DigestSummary {
    /// Files examined.
    total: usize,
    /// Files whose digest matched.
    ok: usize,
    /// Files rewritten.
    updated: usize,
    /// Files without a stored digest.
    missing: usize,
    /// Files with a stale digest.
    mismatch: usize,
    /// Files that failed to load or write.
    errors: usize,
}

/// Full digest command output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct DigestOutput {
    /// Aggregate counts.
    summary: DigestSummary,
    /// Per-file outcomes in discovery order.
    results: Vec<DigestEntry>,
}

impl DigestOutput {
    /// Returns the process exit code for this output.
    const fn exit_code(&self, verify: bool) -> ExitCode {
        let failed = if verify {
            self.summary.mismatch > 0 || self.summary.errors > 0
        } else {
            self.summary.errors > 0
        };
        if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
    }
}

/// Executes the digest command.
fn command_digest(command: &DigestCommand, config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let audit = open_audit(&config)?;
    let documents = load_capsules(&command.path, &config.discovery.options())?;
    let output = digest_documents(&documents, command.verify, audit.as_ref());
    if command.json {
        write_json(&output)?;
    } else {
        write_stdout_text(&render_digest_text(&output, command.verify))?;
    }
    Ok(output.exit_code(command.verify))
}

/// Checks every document and, unless verifying, rewrites stale digests.
fn digest_documents(
    documents: &[LoadedDocument],
    verify: bool,
    audit: &dyn AuditSink,
) -> DigestOutput {
    let mut summary = DigestSummary::default();
    let mut results = Vec::with_capacity(documents.len());
    for loaded in documents {
        let file = loaded.path.display().to_string();
        let entry = match &loaded.document {
            Ok(document) => digest_entry(file, &loaded.path, document, verify),
            Err(err) => DigestEntry {
                file,
                id: None,
                status: DigestStatus::Error,
                old_digest: None,
                new_digest: None,
                updated: false,
                error: Some(err.to_string()),
            },
        };
        audit.record_digest(&DigestAuditEvent::new(
            entry.file.clone(),
            entry.id.clone().map(CapsuleId::new),
            entry.status,
            entry.new_digest.clone(),
        ));
        summary.total += 1;
        match entry.status {
            DigestStatus::Ok => summary.ok += 1,
            DigestStatus::Missing => summary.missing += 1,
            DigestStatus::Mismatch => summary.mismatch += 1,
            DigestStatus::Updated => summary.updated += 1,
            DigestStatus::Error => summary.errors += 1,
        }
        results.push(entry);
    }
    DigestOutput {
        summary,
        results,
    }
}

/// Computes the digest outcome for one loaded document.
fn digest_entry(
    file: String,
    path: &Path,
    document: &CapsuleDocument,
    verify: bool,
) -> DigestEntry {
    let check = check_digest(document);
    let mut entry = DigestEntry {
        file,
        id: document.id().map(str::to_string),
        status: check.status,
        old_digest: check.stored.clone(),
        new_digest: Some(check.computed.clone()),
        updated: false,
        error: None,
    };
    if verify || !check.needs_update() {
        return entry;
    }
    let written = with_digest(document, &check.computed)
        .map_err(DocumentError::from)
        .and_then(|updated| write_document_atomic(path, &updated));
    match written {
        Ok(()) => {
            entry.status = DigestStatus::Updated;
            entry.updated = true;
        }
        Err(err) => {
            entry.status = DigestStatus::Error;
            entry.error = Some(err.to_string());
        }
    }
    entry
}

/// Renders the human digest summary.
fn render_digest_text(output: &DigestOutput, verify: bool) -> String {
    let summary = &output.summary;
    let mode = if verify { t!("digest.mode.verify") } else { t!("digest.mode.update") };
    let mut lines = vec![String::new(), t!("digest.summary.header", mode = mode)];
    lines.push(t!("digest.summary.total", count = summary.total));
    lines.push(t!("digest.summary.ok", count = summary.ok));
    if !verify {
        lines.push(t!("digest.summary.updated", count = summary.updated));
    }
    if summary.missing > 0 {
        lines.push(t!("digest.summary.missing", count = summary.missing));
    }
    if summary.mismatch > 0 {
        lines.push(t!("digest.summary.mismatch", count = summary.mismatch));
    }
    if summary.errors > 0 {
        lines.push(t!("digest.summary.errors", count = summary.errors));
    }
    lines.push(String::new());
    for entry in &output.results {
        let symbol = match entry.status {
            DigestStatus::Ok => continue,
            DigestStatus::Updated => "✓",
            DigestStatus::Missing => "◯",
            DigestStatus::Mismatch => "✗",
            DigestStatus::Error => "⚠",
        };
        lines.push(t!(
            "digest.entry",
            symbol = symbol,
            path = entry.file,
            capsule = entry.id.as_deref().unwrap_or("?")
        ));
        let old = digest_preview(entry.old_digest.as_deref());
        let new = digest_preview(entry.new_digest.as_deref());
        match entry.status {
            DigestStatus::Error => {
                lines.push(t!("digest.entry.error", error = entry.error.as_deref().unwrap_or("")));
            }
            DigestStatus::Mismatch => {
                lines.push(t!("digest.entry.old", digest = old));
                lines.push(t!("digest.entry.new", digest = new));
            }
            DigestStatus::Missing => {
                lines.push(t!("digest.entry.new", digest = new));
            }
            DigestStatus::Ok | DigestStatus::Updated => {}
        }
        if entry.updated {
            lines.push(t!("digest.entry.updated"));
        }
    }
    join_lines(&lines)
}

/// Returns the leading characters of a digest for display.
fn digest_preview(digest: Option<&str>) -> &str {
    let digest = digest.unwrap_or("none");
    digest.get(.. DIGEST_PREVIEW_CHARS).unwrap_or(digest)
}

// ============================================================================
// SECTION: Policy Command
// ============================================================================

/// Executes the policy gate over a corpus.
fn command_policy(command: &PolicyCommand, config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let audit = open_audit(&config)?;
    let documents = load_capsules(&command.path, &config.discovery.options())?;
    let mut options = config.gate.options();
    options.require_signature_on_approved |= command.require_signature_on_approved;
    let report = PolicyGate::new(options).check_batch(&documents);
    for entry in &report.entries {
        let reasons: Vec<String> = match &entry.result {
            GateEntryResult::Checked {
                outcome,
            } => outcome.reasons.iter().map(ToString::to_string).collect(),
            GateEntryResult::LoadFailed {
                error,
            } => vec![error.clone()],
        };
        audit.record_gate(&GateAuditEvent::new(GateAuditEventParams {
            path: entry.path.display().to_string(),
            capsule: entry.capsule.clone(),
            ok: !entry.is_error(),
            reasons,
            strict: options.require_signature_on_approved,
        }));
    }
    if command.json {
        write_json(&report)?;
    } else {
        write_stdout_text(&render_policy_text(&report))?;
    }
    Ok(if report.passed() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Renders policy failures followed by the summary line.
fn render_policy_text(report: &GateReport) -> String {
    let mut lines = Vec::new();
    for entry in &report.entries {
        let path = entry.path.display();
        match &entry.result {
            GateEntryResult::LoadFailed {
                error,
            } => lines.push(t!("policy.load_failed", path = path, error = error)),
            GateEntryResult::Checked {
                outcome,
            } => {
                for failure in &outcome.reasons {
                    let line = match failure {
                        GateFailure::SignatureInvalid {
                            reason,
                        } => t!(
                            "policy.failure_detail",
                            reason = failure,
                            path = path,
                            detail = reason
                        ),
                        GateFailure::DigestMismatch {
                            ..
                        }
                        | GateFailure::MissingSignature => {
                            t!("policy.failure", reason = failure, path = path)
                        }
                    };
                    lines.push(line);
                }
            }
        }
    }
    lines.push(t!("policy.summary", checked = report.checked, errors = report.errors));
    join_lines(&lines)
}

// ============================================================================
// SECTION: Witness Command
// ============================================================================

/// Executes witnesses for the selected capsules.
async fn command_witness(
    command: WitnessCommand,
    config_path: Option<&Path>,
) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let audit = open_audit(&config)?;
    let documents = load_capsules(&command.path, &config.discovery.options())?;
    if documents.is_empty() {
        return Err(CliError::new(t!("witness.no_capsules", path = command.path.display())));
    }
    let filter = CapsuleFilter::new(command.capsules, &command.capsule_files, command.witnesses)
        .map_err(|err| CliError::new(t!("witness.filter_invalid", error = err)))?;
    let sandbox = config
        .sandbox
        .build()
        .map_err(|err| CliError::new(t!("witness.sandbox_failed", error = err)))?;
    let working_dir = std::env::current_dir()
        .map_err(|err| CliError::new(t!("witness.working_dir_failed", error = err)))?;

    let mut settings = config.runner.engine_settings();
    if let Some(policy) = command.env_policy {
        settings.env_policy = policy.into();
    }
    let max_concurrency = command.jobs.map_or(config.runner.max_concurrency, usize::from);
    let engine =
        WitnessEngine::new(settings, sandbox, HostEnvironment::capture()).with_audit(audit);
    let runner = BatchRunner::new(
        engine,
        BatchOptions {
            max_concurrency,
            working_dir,
        },
    );

    let report = tokio::select! {
        report = runner.run(&documents, &filter) => report,
        Ok(()) = tokio::signal::ctrl_c() => {
            write_stderr_line(&t!("witness.interrupted"))
                .map_err(|err| CliError::new(output_error("stderr", &err)))?;
            return Ok(ExitCode::from(INTERRUPTED_EXIT_CODE));
        }
    };

    for warning in &report.warnings {
        write_stderr_line(&t!(
            "witness.load_warning",
            path = warning.path.display(),
            error = warning.message
        ))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }
    if command.json {
        write_json(&report.reports)?;
    } else {
        write_stdout_text(&render_witness_text(&report.reports, command.verbose))?;
    }
    Ok(if report.has_failures() { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// Renders per-capsule witness lines and the run summary.
fn render_witness_text(reports: &[CapsuleReport], verbose: bool) -> String {
    let mut lines = Vec::new();
    let mut total = 0usize;
    let mut passed = 0usize;
    let mut failed = 0usize;
    for report in reports {
        match report.status {
            CapsuleStatus::Skip => continue,
            CapsuleStatus::Green => passed += 1,
            CapsuleStatus::Red => failed += 1,
        }
        total += 1;
        lines.push(String::new());
        lines.push(t!("witness.capsule", capsule = report.capsule));
        for result in &report.witness_results {
            let name = &result.name;
            let (line, show_stderr) = match result.status {
                WitnessStatus::Pass => (t!("witness.pass", name = name), false),
                WitnessStatus::Fail => (t!("witness.fail", name = name), true),
                WitnessStatus::Timeout => (t!("witness.timeout", name = name), true),
                WitnessStatus::Error => (t!("witness.error", name = name), true),
                WitnessStatus::Skip if verbose => (t!("witness.skip", name = name), false),
                WitnessStatus::Skip => continue,
            };
            lines.push(line);
            if verbose {
                push_detail_lines(&mut lines, &result.stdout);
            }
            if show_stderr || verbose {
                push_detail_lines(&mut lines, &result.stderr);
            }
        }
    }
    lines.push(String::new());
    lines.push("=".repeat(SUMMARY_RULE_WIDTH));
    lines.push(t!("witness.summary", total = total, passed = passed, failed = failed));
    join_lines(&lines)
}

/// Appends indented output lines.
fn push_detail_lines(lines: &mut Vec<String>, text: &str) {
    for line in text.trim().lines() {
        lines.push(t!("witness.detail", line = line));
    }
}

// ============================================================================
// SECTION: Sign Command
// ============================================================================

/// Key material resolved for signing.
struct CapsuleSigner {
    /// Private key.
    key: SigningKey,
    /// Key identifier.
    key_id: KeyId,
    /// Base64 public key written into capsules.
    pubkey: String,
}

/// Per-capsule signing outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SignOutcome {
    /// Capsule signed and rewritten.
    Signed,
    /// No stored digest.
    NoDigest,
    /// Stored digest is stale.
    StaleDigest,
    /// Document failed to load.
    LoadFailed(String),
    /// Document failed to update or write.
    WriteFailed(String),
}

/// Signing outcome paired with its source path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SignEntry {
    /// Source path.
    path: PathBuf,
    /// Outcome.
    outcome: SignOutcome,
}

/// Executes the sign command.
fn command_sign(command: &SignCommand, config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let key = load_signing_key(&command.key)?;
    let pubkey = resolve_public_key(&key, command.pubkey.as_deref())?;
    let signer = CapsuleSigner {
        key,
        key_id: KeyId::new(command.key.key_id.clone()),
        pubkey,
    };
    let audit = open_audit(&config)?;
    let documents = load_capsules(&command.path, &config.discovery.options())?;
    let entries = sign_documents(&documents, &signer, audit.as_ref());
    write_stdout_text(&render_sign_text(&entries))?;
    let failed = entries.iter().any(|entry| {
        matches!(
            entry.outcome,
            SignOutcome::StaleDigest | SignOutcome::LoadFailed(_) | SignOutcome::WriteFailed(_)
        )
    });
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// Signs every document whose stored digest is current.
fn sign_documents(
    documents: &[LoadedDocument],
    signer: &CapsuleSigner,
    audit: &dyn AuditSink,
) -> Vec<SignEntry> {
    documents
        .iter()
        .map(|loaded| {
            let outcome = match &loaded.document {
                Ok(document) => sign_document(&loaded.path, document, signer, audit),
                Err(err) => SignOutcome::LoadFailed(err.to_string()),
            };
            SignEntry {
                path: loaded.path.clone(),
                outcome,
            }
        })
        .collect()
}

/// Signs one document in place.
fn sign_document(
    path: &Path,
    document: &CapsuleDocument,
    signer: &CapsuleSigner,
    audit: &dyn AuditSink,
) -> SignOutcome {
    let Some(digest) = document.signing().digest.filter(|digest| !digest.is_empty()) else {
        return SignOutcome::NoDigest;
    };
    if check_digest(document).status != DigestStatus::Ok {
        return SignOutcome::StaleDigest;
    }
    let signature = encode_signature(&sign_digest(&digest, &signer.key));
    let update = SigningUpdate {
        digest: None,
        method: Some(SIGNING_METHOD.to_string()),
        key_id: Some(signer.key_id.as_str().to_string()),
        pubkey: Some(signer.pubkey.clone()),
        signature: Some(signature),
    };
    let written = document
        .with_signing(&update)
        .map_err(DocumentError::from)
        .and_then(|signed| write_document_atomic(path, &signed));
    match written {
        Ok(()) => {
            audit.record_signing(&SigningAuditEvent::new(
                path.display().to_string(),
                document.capsule_id(),
                signer.key_id.as_str().to_string(),
                digest,
            ));
            SignOutcome::Signed
        }
        Err(err) => SignOutcome::WriteFailed(err.to_string()),
    }
}

/// Renders per-capsule signing lines and the summary.
fn render_sign_text(entries: &[SignEntry]) -> String {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    let mut signed = 0usize;
    let mut skipped = 0usize;
    let mut errors = 0usize;
    for entry in entries {
        let path = entry.path.display();
        let line = match &entry.outcome {
            SignOutcome::Signed => {
                signed += 1;
                t!("sign.ok", path = path)
            }
            SignOutcome::NoDigest => {
                skipped += 1;
                t!("sign.skip_no_digest", path = path)
            }
            SignOutcome::StaleDigest => {
                errors += 1;
                t!("sign.stale_digest", path = path)
            }
            SignOutcome::LoadFailed(error) => {
                errors += 1;
                t!("sign.load_failed", path = path, error = error)
            }
            SignOutcome::WriteFailed(error) => {
                errors += 1;
                t!("sign.update_failed", path = path, error = error)
            }
        };
        lines.push(line);
    }
    lines.push(t!("sign.summary", signed = signed, skipped = skipped, errors = errors));
    join_lines(&lines)
}

/// Loads the private key from `--key` or `--key-file`.
fn load_signing_key(args: &SigningKeyArgs) -> CliResult<SigningKey> {
    let text = match (&args.key, &args.key_file) {
        (Some(key), _) => key.clone(),
        (None, Some(path)) => read_text_with_limit(path, MAX_SIGNING_KEY_BYTES, "input.kind.key")?,
        (None, None) => String::new(),
    };
    decode_signing_key(&text).map_err(|err| CliError::new(t!("sign.key_invalid", error = err)))
}

/// Returns the base64 public key, checking a supplied key against the private key.
fn resolve_public_key(key: &SigningKey, supplied: Option<&str>) -> CliResult<String> {
    let derived = key.verifying_key();
    if let Some(text) = supplied {
        let supplied = decode_verifying_key(text)
            .map_err(|err| CliError::new(t!("sign.pub_invalid", error = err)))?;
        if supplied != derived {
            return Err(CliError::new(t!("sign.pub_mismatch")));
        }
    }
    Ok(encode_verifying_key(&derived))
}

// ============================================================================
// SECTION: Verify Command
// ============================================================================

/// Executes the verify command.
fn command_verify(command: &VerifyCommand, config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let documents = load_capsules(&command.path, &config.discovery.options())?;
    let report = verify_batch(&documents);
    if command.json {
        write_json(&report)?;
    } else {
        write_stdout_text(&render_verify_text(&report))?;
    }
    Ok(if report.bad > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// Renders per-capsule verification lines and the summary.
fn render_verify_text(report: &VerificationReport) -> String {
    let mut lines = Vec::with_capacity(report.entries.len() + 1);
    for entry in &report.entries {
        let path = entry.path.display();
        let line = match &entry.outcome {
            VerificationOutcome::OkSignature => t!("verify.ok_signature", path = path),
            VerificationOutcome::OkDigestOnly => t!("verify.ok_digest_only", path = path),
            VerificationOutcome::DigestMismatch => t!("verify.digest_mismatch", path = path),
            VerificationOutcome::BadSignature {
                reason,
            } => t!("verify.bad_signature", path = path, reason = reason),
            VerificationOutcome::Error {
                message,
            } => t!("verify.error", path = path, error = message),
        };
        lines.push(line);
    }
    lines.push(t!("verify.summary", ok = report.ok, bad = report.bad));
    join_lines(&lines)
}

// ============================================================================
// SECTION: Attest Commands
// ============================================================================

/// Dispatches attestation subcommands.
fn command_attest(command: AttestCommand) -> CliResult<ExitCode> {
    match command {
        AttestCommand::Sign(command) => command_attest_sign(&command),
        AttestCommand::Verify(command) => command_attest_verify(&command),
    }
}

/// Signs a witness results array and writes the attestation files.
fn command_attest_sign(command: &AttestSignCommand) -> CliResult<ExitCode> {
    let key = load_signing_key(&command.key)?;
    let raw = match command.results.as_deref() {
        Some(path) if path != Path::new("-") => {
            read_bytes_checked(path, MAX_RESULTS_BYTES, "input.kind.results")?
        }
        _ => read_stdin_with_limit(MAX_RESULTS_BYTES)?,
    };
    let results = parse_results(&raw)?;
    let now = OffsetDateTime::now_utc();
    let signed = attest_results(results, &key, &KeyId::new(command.key.key_id.clone()), now)
        .map_err(|err| CliError::new(t!("attest.sign_failed", error = err)))?;
    let rendered = serde_json::to_string_pretty(&signed)
        .map_err(|err| CliError::new(t!("output.json_failed", error = err)))?;

    fs::create_dir_all(&command.out_dir).map_err(|err| {
        CliError::new(t!("attest.output_dir_failed", path = command.out_dir.display(), error = err))
    })?;
    let stamp = attestation_timestamp(now);
    let raw_path = command.out_dir.join(format!("witness_{stamp}.json"));
    let signed_path = command.out_dir.join(format!("witness_{stamp}.signed.json"));
    let sig_path = command.out_dir.join(format!("witness_{stamp}.sig"));
    write_file(&raw_path, &raw)?;
    write_file(&signed_path, format!("{rendered}\n").as_bytes())?;
    write_file(&sig_path, format!("{}\n", signed.proof.signature).as_bytes())?;

    let mut lines = vec![t!("attest.wrote")];
    for path in [&raw_path, &signed_path, &sig_path] {
        lines.push(t!("attest.wrote_entry", path = path.display()));
    }
    write_stderr_line(&lines.join("\n"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Parses the witness results payload.
fn parse_results(raw: &[u8]) -> CliResult<Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(CliError::new(t!("attest.input_empty")));
    }
    serde_json::from_slice(raw)
        .map_err(|err| CliError::new(t!("attest.input_invalid", error = err)))
}

/// Verifies a signed results envelope.
fn command_attest_verify(command: &AttestVerifyCommand) -> CliResult<ExitCode> {
    let raw = read_bytes_checked(&command.signed, MAX_RESULTS_BYTES, "input.kind.signed")?;
    let signed: SignedResults = serde_json::from_slice(&raw).map_err(|err| {
        CliError::new(t!("attest.signed_invalid", path = command.signed.display(), error = err))
    })?;
    match verify_attestation(&signed, &command.pubkey) {
        Ok(()) => {
            write_stdout_line(&t!("attest.verify.ok"))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            write_stderr_line(&t!("attest.verify.fail_detail", error = err))
                .map_err(|err| CliError::new(output_error("stderr", &err)))?;
            write_stdout_line(&t!("attest.verify.fail"))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Writes an attestation output file.
fn write_file(path: &Path, bytes: &[u8]) -> CliResult<()> {
    fs::write(path, bytes)
        .map_err(|err| CliError::new(t!("attest.write_failed", path = path.display(), error = err)))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand, config_path: Option<&Path>) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate => command_config_validate(config_path),
    }
}

/// Executes the config validation command.
fn command_config_validate(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let source = config.source.as_ref().map_or_else(
        || t!("config.validate.defaults"),
        |path| t!("config.validate.source", path = path.display()),
    );
    write_stdout_line(&format!("{}\n{source}", t!("config.validate.ok")))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Reads a bounded file, mapping failures to localized errors.
fn read_bytes_checked(path: &Path, max_bytes: usize, kind_key: &str) -> CliResult<Vec<u8>> {
    read_file_with_limit(path, max_bytes)
        .map_err(|err| read_limit_error(&path.display().to_string(), kind_key, err))
}

/// Reads a bounded UTF-8 file with surrounding whitespace removed.
fn read_text_with_limit(path: &Path, max_bytes: usize, kind_key: &str) -> CliResult<String> {
    let bytes = read_bytes_checked(path, max_bytes, kind_key)?;
    let text = String::from_utf8(bytes).map_err(|err| {
        CliError::new(t!(
            "input.read_failed",
            kind = kind_label(kind_key),
            path = path.display(),
            error = err
        ))
    })?;
    Ok(text.trim().to_string())
}

/// Reads bounded input from stdin.
fn read_stdin_with_limit(max_bytes: usize) -> CliResult<Vec<u8>> {
    read_with_limit(std::io::stdin().lock(), max_bytes)
        .map_err(|err| read_limit_error(&t!("input.stdin"), "input.kind.results", err))
}

/// Converts a bounded read failure into a localized error.
fn read_limit_error(path: &str, kind_key: &str, err: ReadLimitError) -> CliError {
    let kind = kind_label(kind_key);
    match err {
        ReadLimitError::Io(err) => {
            CliError::new(t!("input.read_failed", kind = kind, path = path, error = err))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(t!(
            "input.read_too_large",
            kind = kind,
            path = path,
            size = size,
            limit = limit
        )),
    }
}

/// Resolves an input kind key to its localized label.
fn kind_label(kind_key: &str) -> String {
    match kind_key {
        "input.kind.key" => t!("input.kind.key"),
        "input.kind.signed" => t!("input.kind.signed"),
        _ => t!("input.kind.results"),
    }
}

/// Resolves the CLI locale from flags or environment.
fn resolve_locale(lang: Option<LangArg>, env_lang: Option<&str>) -> CliResult<Locale> {
    if let Some(lang) = lang {
        return Ok(lang.into());
    }
    if let Some(value) = env_lang {
        return Locale::parse(value).ok_or_else(|| {
            CliError::new(t!("i18n.lang.invalid_env", env = LANG_ENV, value = value))
        });
    }
    Ok(Locale::En)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Joins rendered lines with a trailing newline.
fn join_lines(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes pre-rendered text to stdout.
fn write_stdout_text(text: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(text.as_bytes()).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a value to stdout as indented JSON.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(t!("output.json_failed", error = err)))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats a localized output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns the fatal exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::from(FATAL_EXIT_CODE)
}
