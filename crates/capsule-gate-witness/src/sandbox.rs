// crates/capsule-gate-witness/src/sandbox.rs
// ============================================================================
// Module: Sandbox Seam
// Description: Pluggable transformation of witness command lines.
// Purpose: Let operators wrap witness processes in external isolation tools.
// Dependencies: capsule-gate-core, thiserror
// ============================================================================

//! ## Overview
//! A [`Sandbox`] receives the fully resolved [`Invocation`] for a witness and
//! returns the invocation that is actually spawned. The engine never isolates
//! witnesses itself: [`ProcessSandbox`] runs them as plain child processes
//! and [`WrapperSandbox`] prefixes a configured command (for example a
//! container or namespace launcher) that receives the original command line
//! as arguments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

use capsule_gate_core::FsMode;
use thiserror::Error;

// ============================================================================
// SECTION: Invocation
// ============================================================================

/// Command line and process attributes for one witness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute.
    pub program: PathBuf,
    /// Program arguments.
    pub args: Vec<OsString>,
    /// Complete child environment.
    pub env: BTreeMap<String, String>,
    /// Absolute working directory.
    pub workdir: PathBuf,
    /// Declared network use.
    pub net: bool,
    /// Declared filesystem mode.
    pub fs_mode: FsMode,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Sandbox preparation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    /// The sandbox refused to run the invocation.
    #[error("sandbox rejected witness: {0}")]
    Rejected(String),
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Transforms witness invocations before they are spawned.
pub trait Sandbox: Send + Sync {
    /// Short label recorded in audit events.
    fn name(&self) -> &'static str;

    /// Returns the invocation to spawn.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError`] when the witness must not run.
    fn prepare(&self, invocation: Invocation) -> Result<Invocation, SandboxError>;
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

/// Runs witnesses as ordinary child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSandbox;

impl Sandbox for ProcessSandbox {
    fn name(&self) -> &'static str {
        "process"
    }

    fn prepare(&self, invocation: Invocation) -> Result<Invocation, SandboxError> {
        Ok(invocation)
    }
}

/// Prefixes every witness command line with a configured wrapper command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperSandbox {
    /// Wrapper program.
    program: String,
    /// Wrapper arguments placed before the witness command.
    args: Vec<String>,
    /// Refuse witnesses that declare network use.
    deny_net: bool,
}

impl WrapperSandbox {
    /// Creates a wrapper from a non-empty command line.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Rejected`] when `command` is empty.
    pub fn new(command: &[String], deny_net: bool) -> Result<Self, SandboxError> {
        let (program, args) = command
            .split_first()
            .filter(|(program, _)| !program.trim().is_empty())
            .ok_or_else(|| SandboxError::Rejected("wrapper command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            deny_net,
        })
    }
}

impl Sandbox for WrapperSandbox {
    fn name(&self) -> &'static str {
        "wrapper"
    }

    fn prepare(&self, invocation: Invocation) -> Result<Invocation, SandboxError> {
        if self.deny_net && invocation.net {
            return Err(SandboxError::Rejected("network access is not permitted".to_string()));
        }
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push(invocation.program.into_os_string());
        args.extend(invocation.args);
        Ok(Invocation {
            program: PathBuf::from(&self.program),
            args,
            env: invocation.env,
            workdir: invocation.workdir,
            net: invocation.net,
            fs_mode: invocation.fs_mode,
        })
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

    use super::*;

    fn invocation(net: bool) -> Invocation {
        Invocation {
            program: PathBuf::from("/bin/sh"),
            args: vec![OsString::from("/tmp/witness-1.sh"), OsString::from("--flag")],
            env: BTreeMap::new(),
            workdir: PathBuf::from("/tmp"),
            net,
            fs_mode: FsMode::Ro,
        }
    }

    #[test]
    fn wrapper_prefixes_command_line() {
        let command = vec!["firejail".to_string(), "--quiet".to_string()];
        let sandbox = WrapperSandbox::new(&command, false).unwrap();
        let prepared = sandbox.prepare(invocation(false)).unwrap();
        assert_eq!(prepared.program, PathBuf::from("firejail"));
        let args: Vec<String> =
            prepared.args.iter().map(|arg| arg.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["--quiet", "/bin/sh", "/tmp/witness-1.sh", "--flag"]);
    }

    #[test]
    fn wrapper_requires_command() {
        assert!(WrapperSandbox::new(&[], false).is_err());
        assert!(WrapperSandbox::new(&[" ".to_string()], false).is_err());
    }

    #[test]
    fn wrapper_can_refuse_network_witnesses() {
        let sandbox = WrapperSandbox::new(&["unshare".to_string()], true).unwrap();
        assert!(sandbox.prepare(invocation(true)).is_err());
        assert!(sandbox.prepare(invocation(false)).is_ok());
    }
}
