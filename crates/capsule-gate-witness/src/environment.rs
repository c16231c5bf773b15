// crates/capsule-gate-witness/src/environment.rs
// ============================================================================
// Module: Witness Environment
// Description: Child environment construction and interpreter lookup.
// Purpose: Keep host secrets out of witness processes unless explicitly allowed.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Witness environments are built from three inputs: the policy, a snapshot
//! of the host environment, and the witness's own `env` map.
//!
//! - [`EnvPolicy::Allowlist`] starts empty, copies configured passthrough
//!   keys from the host, then applies the witness map.
//! - [`EnvPolicy::HostOverlay`] starts from the witness map and overlays the
//!   whole host environment, so host values win on conflicts.
//!
//! The host snapshot is a value rather than a live view so tests and callers
//! can supply any environment without mutating process state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// How the child environment is derived from the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvPolicy {
    /// Empty environment plus passthrough keys plus witness env.
    #[default]
    Allowlist,
    /// Witness env overlaid by the full host environment.
    HostOverlay,
}

impl EnvPolicy {
    /// Returns the configuration label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allowlist => "allowlist",
            Self::HostOverlay => "host-overlay",
        }
    }
}

impl fmt::Display for EnvPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown environment policy label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown env policy: {0} (expected allowlist or host-overlay)")]
pub struct EnvPolicyParseError(String);

impl FromStr for EnvPolicy {
    type Err = EnvPolicyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "allowlist" => Ok(Self::Allowlist),
            "host-overlay" | "host_overlay" => Ok(Self::HostOverlay),
            other => Err(EnvPolicyParseError(other.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Host Snapshot
// ============================================================================

/// Snapshot of the host environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Variables with UTF-8 names and values.
    vars: BTreeMap<String, String>,
}

impl HostEnvironment {
    /// Captures the current process environment, skipping non-UTF-8 entries.
    #[must_use]
    pub fn capture() -> Self {
        let vars = env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self {
            vars,
        }
    }

    /// Builds a snapshot from explicit pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(key, value)| (key.into(), value.into())).collect(),
        }
    }

    /// Returns the value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Returns every variable.
    #[must_use]
    pub const fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Builds the child environment for one witness.
#[must_use]
pub fn build_environment(
    policy: EnvPolicy,
    passthrough: &[String],
    host: &HostEnvironment,
    witness_env: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    match policy {
        EnvPolicy::Allowlist => {
            let mut env: BTreeMap<String, String> = passthrough
                .iter()
                .filter_map(|key| host.get(key).map(|value| (key.clone(), value.to_string())))
                .collect();
            env.extend(witness_env.iter().map(|(key, value)| (key.clone(), value.clone())));
            env
        }
        EnvPolicy::HostOverlay => {
            let mut env = witness_env.clone();
            env.extend(host.vars().iter().map(|(key, value)| (key.clone(), value.clone())));
            env
        }
    }
}

// ============================================================================
// SECTION: Program Lookup
// ============================================================================

/// Resolves a program name against a `PATH` value.
///
/// Names containing a path separator are resolved against `base` and must
/// exist. Bare names are searched in `search_path` and must be executable.
#[must_use]
pub fn resolve_program(name: &str, search_path: Option<&str>, base: &Path) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let candidate = Path::new(name);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        let path =
            if candidate.is_absolute() { candidate.to_path_buf() } else { base.join(candidate) };
        return is_executable(&path).then_some(path);
    }
    let search_path = search_path?;
    env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|path| is_executable(path))
}

/// Returns true when `path` is a regular file with an execute bit.
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata().is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

/// Returns true when `path` is a regular file.
#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
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

    fn witness_env() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("MODE".to_string(), "witness".to_string()),
            ("SHARED".to_string(), "from-witness".to_string()),
        ])
    }

    fn host() -> HostEnvironment {
        HostEnvironment::from_pairs([
            ("SECRET", "hunter2"),
            ("SHARED", "from-host"),
            ("HOME", "/h"),
        ])
    }

    #[test]
    fn allowlist_hides_host_variables() {
        let env = build_environment(EnvPolicy::Allowlist, &[], &host(), &witness_env());
        assert_eq!(env, witness_env());
    }

    #[test]
    fn allowlist_copies_passthrough_then_witness_wins() {
        let passthrough = vec!["HOME".to_string(), "SHARED".to_string(), "MISSING".to_string()];
        let env = build_environment(EnvPolicy::Allowlist, &passthrough, &host(), &witness_env());
        assert_eq!(env.get("HOME").map(String::as_str), Some("/h"));
        assert_eq!(env.get("SHARED").map(String::as_str), Some("from-witness"));
        assert!(!env.contains_key("SECRET"));
        assert!(!env.contains_key("MISSING"));
    }

    #[test]
    fn host_overlay_lets_host_win() {
        let env = build_environment(EnvPolicy::HostOverlay, &[], &host(), &witness_env());
        assert_eq!(env.get("SHARED").map(String::as_str), Some("from-host"));
        assert_eq!(env.get("SECRET").map(String::as_str), Some("hunter2"));
        assert_eq!(env.get("MODE").map(String::as_str), Some("witness"));
    }

    #[test]
    fn policy_labels_parse() {
        assert_eq!("allowlist".parse::<EnvPolicy>().unwrap(), EnvPolicy::Allowlist);
        assert_eq!("host-overlay".parse::<EnvPolicy>().unwrap(), EnvPolicy::HostOverlay);
        assert!("inherit".parse::<EnvPolicy>().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn bare_names_resolve_through_search_path() {
        let resolved = resolve_program("sh", Some("/nonexistent:/bin:/usr/bin"), Path::new("/"));
        assert!(resolved.is_some_and(|path| path.ends_with("sh")));
        let missing = resolve_program("definitely-not-a-real-binary", Some("/bin"), Path::new("/"));
        assert!(missing.is_none());
        assert!(resolve_program("sh", None, Path::new("/")).is_none());
    }
}
