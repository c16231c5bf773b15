// crates/capsule-gate-witness/src/process.rs
// ============================================================================
// Module: Witness Process Control
// Description: Spawning, deadline enforcement, and process-group cleanup.
// Purpose: Run one witness command and guarantee no descendants outlive it.
// Dependencies: tokio, nix (unix)
// ============================================================================

//! ## Overview
//! Each witness runs as the leader of a fresh process group. A
//! [`ProcessGroupGuard`] owns that group and sends `SIGKILL` to it after the
//! leader exits, when the deadline fires, and when the run future is dropped.
//! Output pipes are drained by dedicated tasks so a chatty witness can never
//! block on a full pipe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;

use capsule_gate_core::ERROR_EXIT_CODE;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::sandbox::Invocation;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Raw result of running a witness process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process exited before the deadline.
    Exited {
        /// Exit code, or the negated signal number.
        exit_code: i32,
        /// Captured stdout.
        stdout: Vec<u8>,
        /// Captured stderr.
        stderr: Vec<u8>,
    },
    /// The deadline fired and the process group was killed.
    TimedOut,
}

// ============================================================================
// SECTION: Process Group Guard
// ============================================================================

/// Kills a witness process group when swept or dropped.
#[derive(Debug)]
pub struct ProcessGroupGuard {
    /// Process group id; `None` once swept.
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    /// Guards the group led by `pid`.
    #[must_use]
    pub const fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid,
        }
    }

    /// Kills every process left in the group. Later calls are no-ops.
    pub fn sweep(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.sweep();
    }
}

/// Sends `SIGKILL` to a process group, ignoring already-empty groups.
#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::sys::signal::Signal;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    if let Ok(raw) = i32::try_from(pgid) {
        let _ = killpg(Pid::from_raw(raw), Signal::SIGKILL);
    }
}

/// Process groups are a unix concept; the child itself is killed on drop.
#[cfg(not(unix))]
const fn kill_group(_pgid: u32) {}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Spawns `invocation`, feeds `stdin`, and waits up to `limit`.
///
/// # Errors
///
/// Returns an I/O error when the process cannot be spawned or awaited.
pub async fn run_invocation(
    invocation: &Invocation,
    stdin: &[u8],
    limit: Duration,
) -> io::Result<ProcessOutcome> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .env_clear()
        .envs(&invocation.env)
        .current_dir(&invocation.workdir)
        .stdin(if stdin.is_empty() { Stdio::null() } else { Stdio::piped() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn()?;
    let mut guard = ProcessGroupGuard::new(child.id());

    if let Some(mut pipe) = child.stdin.take() {
        let data = stdin.to_vec();
        tokio::spawn(async move {
            let _ = pipe.write_all(&data).await;
            let _ = pipe.shutdown().await;
        });
    }
    let stdout = child.stdout.take().map(|pipe| tokio::spawn(drain(pipe)));
    let stderr = child.stderr.take().map(|pipe| tokio::spawn(drain(pipe)));

    match timeout(limit, child.wait()).await {
        Ok(status) => {
            let status = status?;
            guard.sweep();
            Ok(ProcessOutcome::Exited {
                exit_code: exit_code(status),
                stdout: collect(stdout).await,
                stderr: collect(stderr).await,
            })
        }
        Err(_) => {
            guard.sweep();
            let _ = child.kill().await;
            abort(stdout);
            abort(stderr);
            Ok(ProcessOutcome::TimedOut)
        }
    }
}

/// Reads a pipe to the end, keeping whatever arrived before an error.
async fn drain<R: AsyncRead + Unpin>(mut pipe: R) -> Vec<u8> {
    let mut buffer = Vec::new();
    let _ = pipe.read_to_end(&mut buffer).await;
    buffer
}

/// Awaits a drain task.
async fn collect(task: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    match task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    }
}

/// Aborts a drain task.
fn abort(task: Option<JoinHandle<Vec<u8>>>) {
    if let Some(task) = task {
        task.abort();
    }
}

/// Maps an exit status to a code; signal deaths report the negated signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            return signal.saturating_neg();
        }
    }
    ERROR_EXIT_CODE
}
