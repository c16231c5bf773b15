// crates/capsule-gate-cli/src/i18n.rs
// ============================================================================
// Module: CLI Internationalization Helpers
// Description: Provides message catalog and translation utilities for the CLI.
// Purpose: Centralize user-facing strings for localization.
// Dependencies: Standard library collections and formatting utilities.
// ============================================================================

//! ## Overview
//! The capsule-gate CLI stores user-facing strings in a small translation
//! catalog to enforce consistent messaging across locales. All runtime output
//! should be routed through the [`t!`](crate::t) macro.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys fall back to English and then to the key itself.
//! - Placeholder substitutions preserve deterministic order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Supported CLI locales.
///
/// # Invariants
/// - Variants are stable for CLI parsing and catalog lookup.
/// - [`Locale::En`] is the default fallback locale.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Locale {
    /// English (default).
    En,
    /// Catalan.
    Ca,
}

impl Locale {
    /// Returns the canonical locale label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ca => "ca",
        }
    }

    /// Attempts to parse a locale value (case-insensitive, tolerant of region tags).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let normalized = value.to_ascii_lowercase();
        let lang = normalized.split(['-', '_']).next().unwrap_or("");
        match lang {
            "en" => Some(Self::En),
            "ca" => Some(Self::Ca),
            _ => None,
        }
    }
}

/// Ordered list of supported CLI locales.
pub const SUPPORTED_LOCALES: &[Locale] = &[Locale::En, Locale::Ca];

/// A formatted message argument captured by the [`macro@crate::t`] macro.
///
/// # Invariants
/// - `key` matches a placeholder name without braces (for example, `path`).
/// - `value` is preformatted and should be safe for display.
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates (e.g., `"path"`).
    pub key: &'static str,
    /// The formatted string value to substitute for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Locale Selection
// ============================================================================

/// Global locale selection for CLI output.
static CURRENT_LOCALE: OnceLock<Locale> = OnceLock::new();

/// Sets the CLI locale. Only the first call wins.
pub fn set_locale(locale: Locale) {
    let _ = CURRENT_LOCALE.set(locale);
}

/// Returns the current CLI locale (defaults to English).
#[must_use]
pub fn current_locale() -> Locale {
    CURRENT_LOCALE.get().copied().unwrap_or(Locale::En)
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static English catalog entries.
const CATALOG_EN: &[(&str, &str)] = &[
    ("main.version", "capsule-gate {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("output.json_failed", "Failed to render JSON output: {error}"),
    ("input.read_failed", "Failed to read {kind} at {path}: {error}"),
    (
        "input.read_too_large",
        "Refusing to read {kind} at {path} because it is {size} bytes (limit {limit}).",
    ),
    ("input.kind.key", "signing key"),
    ("input.kind.results", "witness results"),
    ("input.kind.signed", "signed results"),
    ("input.stdin", "<stdin>"),
    ("input.path_not_found", "ERROR: Path not found: {path}"),
    ("input.discovery_failed", "Failed to discover capsules under {path}: {error}"),
    ("config.load_failed", "Failed to load config: {error}"),
    ("config.validate.ok", "Config valid."),
    ("config.validate.source", "Source: {path}"),
    ("config.validate.defaults", "No config file found; using defaults."),
    ("audit.init_failed", "Failed to initialize audit sink: {error}"),
    ("digest.summary.header", "Digest {mode} Summary:"),
    ("digest.mode.verify", "Verification"),
    ("digest.mode.update", "Update"),
    ("digest.summary.total", "  Total:    {count}"),
    ("digest.summary.ok", "  OK:       {count}"),
    ("digest.summary.updated", "  Updated:  {count}"),
    ("digest.summary.missing", "  Missing:  {count}"),
    ("digest.summary.mismatch", "  Mismatch: {count}"),
    ("digest.summary.errors", "  Errors:   {count}"),
    ("digest.entry", "{symbol} {path}  ({capsule})"),
    ("digest.entry.error", "  ERROR: {error}"),
    ("digest.entry.old", "  OLD: {digest}..."),
    ("digest.entry.new", "  NEW: {digest}..."),
    ("digest.entry.updated", "  → Updated"),
    ("policy.load_failed", "[error] yaml parse failed: {path}: {error}"),
    ("policy.failure", "[error] {reason}: {path}"),
    ("policy.failure_detail", "[error] {reason}: {path}: {detail}"),
    ("policy.summary", "policy summary: checked={checked} errors={errors}"),
    ("witness.no_capsules", "No capsules found in: {path}"),
    ("witness.filter_invalid", "Invalid capsule filter: {error}"),
    ("witness.sandbox_failed", "Failed to configure sandbox: {error}"),
    ("witness.working_dir_failed", "Failed to resolve the working directory: {error}"),
    ("witness.load_warning", "WARNING: Skipping {path}: {error}"),
    ("witness.capsule", "{capsule}:"),
    ("witness.pass", "  ✓ {name} PASS"),
    ("witness.fail", "  ✗ {name} FAIL"),
    ("witness.timeout", "  ⏱ {name} TIMEOUT"),
    ("witness.error", "  ⚠ {name} ERROR"),
    ("witness.skip", "  ○ {name} SKIP"),
    ("witness.detail", "    {line}"),
    ("witness.summary", "Capsules: {total}  Passed: {passed}  Failed: {failed}"),
    ("witness.interrupted", "Interrupted; running witnesses were terminated."),
    ("sign.key_invalid", "Invalid signing key: {error}"),
    ("sign.pub_invalid", "Invalid public key: {error}"),
    ("sign.pub_mismatch", "The --pub key does not match the signing key."),
    ("sign.skip_no_digest", "[skip] no digest {path}"),
    ("sign.stale_digest", "[error] stale digest, run digest first: {path}"),
    ("sign.load_failed", "[error] {path}: {error}"),
    ("sign.update_failed", "[error] failed to update {path}: {error}"),
    ("sign.ok", "[ok] signed {path}"),
    ("sign.summary", "sign summary: signed={signed} skipped={skipped} errors={errors}"),
    ("verify.digest_mismatch", "[digest-mismatch] {path}"),
    ("verify.ok_signature", "[ok] sig {path}"),
    ("verify.bad_signature", "[bad-signature] {path} {reason}"),
    ("verify.ok_digest_only", "[ok] digest-only {path}"),
    ("verify.error", "[error] {path} {error}"),
    ("verify.summary", "summary ok={ok} bad={bad}"),
    ("attest.input_empty", "Invalid JSON: empty input"),
    ("attest.input_invalid", "Invalid JSON: {error}"),
    ("attest.sign_failed", "Failed to attest witness results: {error}"),
    ("attest.output_dir_failed", "Failed to create output directory {path}: {error}"),
    ("attest.write_failed", "Failed to write {path}: {error}"),
    ("attest.wrote", "Wrote:"),
    ("attest.wrote_entry", "  {path}"),
    ("attest.signed_invalid", "Failed to parse signed results at {path}: {error}"),
    ("attest.verify.ok", "OK"),
    ("attest.verify.fail", "FAIL"),
    ("attest.verify.fail_detail", "[verify] FAIL: {error}"),
    ("i18n.lang.invalid_env", "Invalid value for {env}: {value}. Expected 'en' or 'ca'."),
    (
        "i18n.disclaimer.machine_translated",
        "Note: non-English output is machine-translated and may be inaccurate.",
    ),
];

/// Static Catalan catalog entries.
const CATALOG_CA: &[(&str, &str)] = &[
    ("main.version", "capsule-gate {version}"),
    ("output.stream.stdout", "sortida estàndard"),
    ("output.stream.stderr", "sortida d'error"),
    ("output.stream.unknown", "sortida"),
    ("output.write_failed", "No s'ha pogut escriure a {stream}: {error}"),
    ("output.json_failed", "No s'ha pogut renderitzar la sortida JSON: {error}"),
    ("input.read_failed", "No s'ha pogut llegir {kind} a {path}: {error}"),
    (
        "input.read_too_large",
        "Es refusa llegir {kind} a {path} perquè té {size} bytes (límit {limit}).",
    ),
    ("input.kind.key", "la clau de signatura"),
    ("input.kind.results", "els resultats dels testimonis"),
    ("input.kind.signed", "els resultats signats"),
    ("input.stdin", "<entrada estàndard>"),
    ("input.path_not_found", "ERROR: Camí no trobat: {path}"),
    ("input.discovery_failed", "No s'han pogut descobrir càpsules a {path}: {error}"),
    ("config.load_failed", "No s'ha pogut carregar la configuració: {error}"),
    ("config.validate.ok", "Configuració vàlida."),
    ("config.validate.source", "Origen: {path}"),
    (
        "config.validate.defaults",
        "No s'ha trobat cap fitxer de configuració; s'usen els valors per defecte.",
    ),
    ("audit.init_failed", "No s'ha pogut inicialitzar el registre d'auditoria: {error}"),
    ("digest.summary.header", "Resum de {mode} del digest:"),
    ("digest.mode.verify", "verificació"),
    ("digest.mode.update", "actualització"),
    ("digest.summary.total", "  Total:        {count}"),
    ("digest.summary.ok", "  Correctes:    {count}"),
    ("digest.summary.updated", "  Actualitzats: {count}"),
    ("digest.summary.missing", "  Absents:      {count}"),
    ("digest.summary.mismatch", "  Discrepants:  {count}"),
    ("digest.summary.errors", "  Errors:       {count}"),
    ("digest.entry", "{symbol} {path}  ({capsule})"),
    ("digest.entry.error", "  ERROR: {error}"),
    ("digest.entry.old", "  ANTIC: {digest}..."),
    ("digest.entry.new", "  NOU: {digest}..."),
    ("digest.entry.updated", "  → Actualitzat"),
    ("policy.load_failed", "[error] l'anàlisi YAML ha fallat: {path}: {error}"),
    ("policy.failure", "[error] {reason}: {path}"),
    ("policy.failure_detail", "[error] {reason}: {path}: {detail}"),
    ("policy.summary", "resum de la política: comprovades={checked} errors={errors}"),
    ("witness.no_capsules", "No s'han trobat càpsules a: {path}"),
    ("witness.filter_invalid", "Filtre de càpsules no vàlid: {error}"),
    ("witness.sandbox_failed", "No s'ha pogut configurar l'aïllament: {error}"),
    ("witness.working_dir_failed", "No s'ha pogut resoldre el directori de treball: {error}"),
    ("witness.load_warning", "AVÍS: s'omet {path}: {error}"),
    ("witness.capsule", "{capsule}:"),
    ("witness.pass", "  ✓ {name} CORRECTE"),
    ("witness.fail", "  ✗ {name} FALLAT"),
    ("witness.timeout", "  ⏱ {name} TEMPS ESGOTAT"),
    ("witness.error", "  ⚠ {name} ERROR"),
    ("witness.skip", "  ○ {name} OMÈS"),
    ("witness.detail", "    {line}"),
    ("witness.summary", "Càpsules: {total}  Correctes: {passed}  Fallades: {failed}"),
    ("witness.interrupted", "Interromput; els testimonis en execució s'han aturat."),
    ("sign.key_invalid", "Clau de signatura no vàlida: {error}"),
    ("sign.pub_invalid", "Clau pública no vàlida: {error}"),
    ("sign.pub_mismatch", "La clau --pub no correspon a la clau de signatura."),
    ("sign.skip_no_digest", "[omès] sense digest {path}"),
    ("sign.stale_digest", "[error] digest obsolet, executeu digest primer: {path}"),
    ("sign.load_failed", "[error] {path}: {error}"),
    ("sign.update_failed", "[error] no s'ha pogut actualitzar {path}: {error}"),
    ("sign.ok", "[ok] signat {path}"),
    ("sign.summary", "resum de signatura: signades={signed} omeses={skipped} errors={errors}"),
    ("verify.digest_mismatch", "[digest-discrepant] {path}"),
    ("verify.ok_signature", "[ok] signatura {path}"),
    ("verify.bad_signature", "[signatura-incorrecta] {path} {reason}"),
    ("verify.ok_digest_only", "[ok] només digest {path}"),
    ("verify.error", "[error] {path} {error}"),
    ("verify.summary", "resum correctes={ok} incorrectes={bad}"),
    ("attest.input_empty", "JSON no vàlid: entrada buida"),
    ("attest.input_invalid", "JSON no vàlid: {error}"),
    ("attest.sign_failed", "No s'han pogut certificar els resultats: {error}"),
    ("attest.output_dir_failed", "No s'ha pogut crear el directori de sortida {path}: {error}"),
    ("attest.write_failed", "No s'ha pogut escriure {path}: {error}"),
    ("attest.wrote", "S'ha escrit:"),
    ("attest.wrote_entry", "  {path}"),
    ("attest.signed_invalid", "No s'han pogut analitzar els resultats signats a {path}: {error}"),
    ("attest.verify.ok", "CORRECTE"),
    ("attest.verify.fail", "FALLAT"),
    ("attest.verify.fail_detail", "[verificació] FALLAT: {error}"),
    ("i18n.lang.invalid_env", "Valor no vàlid per a {env}: {value}. S'esperava 'en' o 'ca'."),
    (
        "i18n.disclaimer.machine_translated",
        "Nota: la sortida no anglesa és una traducció automàtica i pot ser inexacta.",
    ),
];

/// Returns the raw catalog entries for the requested locale.
pub(crate) const fn catalog_entries_for(locale: Locale) -> &'static [(&'static str, &'static str)] {
    match locale {
        Locale::En => CATALOG_EN,
        Locale::Ca => CATALOG_CA,
    }
}

/// Returns the message catalog for the requested locale.
pub(crate) fn catalog_for(locale: Locale) -> &'static HashMap<&'static str, &'static str> {
    static CATALOG_EN_MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    static CATALOG_CA_MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    match locale {
        Locale::En => CATALOG_EN_MAP.get_or_init(|| build_catalog(locale)),
        Locale::Ca => CATALOG_CA_MAP.get_or_init(|| build_catalog(locale)),
    }
}

/// Builds the lookup map for a locale from its raw entries.
fn build_catalog(locale: Locale) -> HashMap<&'static str, &'static str> {
    catalog_entries_for(locale).iter().copied().collect()
}

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Translates `key` using the selected locale while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let locale = current_locale();
    let template = catalog_for(locale)
        .get(key)
        .copied()
        .or_else(|| catalog_for(Locale::En).get(key).copied())
        .unwrap_or(key);
    if args.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a localized message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
///
/// # Returns
///
/// A localized [`String`] with placeholders substituted.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}
