// crates/capsule-gate-core/src/audit.rs
// ============================================================================
// Module: Capsule Gate Audit Logging
// Description: Structured audit events for digest, gate, signing, and witness runs.
// Purpose: Emit JSON-line audit records without a logging framework dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every tool records what it decided through an [`AuditSink`]. Events are
//! flat JSON objects with an `event` name and a `timestamp_ms` field, written
//! one per line. The sink is chosen by the `[audit]` configuration section;
//! the default discards everything.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::identifiers::CapsuleId;
use crate::core::identifiers::WitnessName;
use crate::core::verdict::WitnessStatus;
use crate::runtime::digest::DigestStatus;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Witness run audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct WitnessAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Capsule identifier.
    pub capsule: CapsuleId,
    /// Witness name.
    pub witness: WitnessName,
    /// Language tag when the witness spec parsed.
    pub language: Option<&'static str>,
    /// Witness classification.
    pub status: WitnessStatus,
    /// Exit code or sentinel.
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u128,
    /// Sandbox that prepared the invocation.
    pub sandbox: &'static str,
}

/// Policy gate audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct GateAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Source path.
    pub path: String,
    /// Capsule identifier when the document loaded.
    pub capsule: Option<CapsuleId>,
    /// Whether the capsule passed.
    pub ok: bool,
    /// Failure reason labels.
    pub reasons: Vec<String>,
    /// Whether approved capsules required signatures.
    pub strict: bool,
}

/// Digest check or rewrite audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct DigestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Source path.
    pub path: String,
    /// Capsule identifier when the document loaded.
    pub capsule: Option<CapsuleId>,
    /// Digest outcome.
    pub status: DigestStatus,
    /// Recomputed digest when available.
    pub digest: Option<String>,
}

/// Capsule signing audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SigningAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Source path.
    pub path: String,
    /// Capsule identifier.
    pub capsule: CapsuleId,
    /// Signing key identifier.
    pub key_id: String,
    /// Digest that was signed.
    pub digest: String,
}

/// Inputs required to construct a witness audit event.
pub struct WitnessAuditEventParams {
    /// Capsule identifier.
    pub capsule: CapsuleId,
    /// Witness name.
    pub witness: WitnessName,
    /// Language tag when the witness spec parsed.
    pub language: Option<&'static str>,
    /// Witness classification.
    pub status: WitnessStatus,
    /// Exit code or sentinel.
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u128,
    /// Sandbox that prepared the invocation.
    pub sandbox: &'static str,
}

/// Inputs required to construct a gate audit event.
pub struct GateAuditEventParams {
    /// Source path.
    pub path: String,
    /// Capsule identifier when the document loaded.
    pub capsule: Option<CapsuleId>,
    /// Whether the capsule passed.
    pub ok: bool,
    /// Failure reason labels.
    pub reasons: Vec<String>,
    /// Whether approved capsules required signatures.
    pub strict: bool,
}

impl WitnessAuditEvent {
    /// Creates a new witness audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: WitnessAuditEventParams) -> Self {
        Self {
            event: "witness_run",
            timestamp_ms: now_ms(),
            capsule: params.capsule,
            witness: params.witness,
            language: params.language,
            status: params.status,
            exit_code: params.exit_code,
            duration_ms: params.duration_ms,
            sandbox: params.sandbox,
        }
    }
}

impl GateAuditEvent {
    /// Creates a new gate audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: GateAuditEventParams) -> Self {
        Self {
            event: "gate_check",
            timestamp_ms: now_ms(),
            path: params.path,
            capsule: params.capsule,
            ok: params.ok,
            reasons: params.reasons,
            strict: params.strict,
        }
    }
}

impl DigestAuditEvent {
    /// Creates a new digest audit event with a consistent timestamp.
    #[must_use]
    pub fn new(
        path: String,
        capsule: Option<CapsuleId>,
        status: DigestStatus,
        digest: Option<String>,
    ) -> Self {
        Self {
            event: "digest_update",
            timestamp_ms: now_ms(),
            path,
            capsule,
            status,
            digest,
        }
    }
}

impl SigningAuditEvent {
    /// Creates a new signing audit event with a consistent timestamp.
    #[must_use]
    pub fn new(path: String, capsule: CapsuleId, key_id: String, digest: String) -> Self {
        Self {
            event: "capsule_signed",
            timestamp_ms: now_ms(),
            path,
            capsule,
            key_id,
            digest,
        }
    }
}

/// Returns milliseconds since the Unix epoch, or zero before it.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for Capsule Gate events.
pub trait AuditSink: Send + Sync {
    /// Record a witness run event.
    fn record_witness(&self, event: &WitnessAuditEvent);

    /// Record a policy gate event.
    fn record_gate(&self, _event: &GateAuditEvent) {}

    /// Record a digest event.
    fn record_digest(&self, _event: &DigestAuditEvent) {}

    /// Record a signing event.
    fn record_signing(&self, _event: &SigningAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one event line to stderr.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record_witness(&self, event: &WitnessAuditEvent) {
        Self::emit(event);
    }

    fn record_gate(&self, event: &GateAuditEvent) {
        Self::emit(event);
    }

    fn record_digest(&self, event: &DigestAuditEvent) {
        Self::emit(event);
    }

    fn record_signing(&self, event: &SigningAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one event line and flushes.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_witness(&self, event: &WitnessAuditEvent) {
        self.emit(event);
    }

    fn record_gate(&self, event: &GateAuditEvent) {
        self.emit(event);
    }

    fn record_digest(&self, event: &DigestAuditEvent) {
        self.emit(event);
    }

    fn record_signing(&self, event: &SigningAuditEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_witness(&self, _event: &WitnessAuditEvent) {}
}
