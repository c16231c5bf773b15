// crates/capsule-gate-core/src/core/verdict.rs
// ============================================================================
// Module: Witness and Capsule Verdicts
// Description: Result types for witness runs and capsule aggregation.
// Purpose: Provide the serialized shape shared by the runner and reports.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`WitnessResult`] is the outcome of one witness run. Its JSON form keeps
//! the `returncode` key used by existing report consumers. [`CapsuleReport`]
//! is the per-capsule verdict built by
//! [`aggregate`](crate::runtime::aggregate::aggregate).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CapsuleId;
use crate::core::identifiers::WitnessName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exit code reported for timed-out witnesses.
pub const TIMEOUT_EXIT_CODE: i32 = 124;
/// Exit code reported for witnesses that could not be executed.
pub const ERROR_EXIT_CODE: i32 = -1;

// ============================================================================
// SECTION: Witness Status
// ============================================================================

/// Classification of a single witness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WitnessStatus {
    /// Exit code 0.
    Pass,
    /// Nonzero exit code.
    Fail,
    /// Deadline exceeded; the process group was killed.
    Timeout,
    /// Witness reported itself not applicable.
    Skip,
    /// Witness could not be executed.
    Error,
}

impl WitnessStatus {
    /// Returns true for statuses that turn a capsule red.
    #[must_use]
    pub const fn is_failing(self) -> bool {
        matches!(self, Self::Fail | Self::Timeout | Self::Error)
    }

    /// Returns the uppercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Timeout => "TIMEOUT",
            Self::Skip => "SKIP",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for WitnessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Witness Result
// ============================================================================

/// Outcome of one witness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessResult {
    /// Witness name.
    pub name: WitnessName,
    /// Classification.
    pub status: WitnessStatus,
    /// Process exit code or sentinel.
    #[serde(rename = "returncode")]
    pub exit_code: i32,
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8).
    pub stderr: String,
}

impl WitnessResult {
    /// Builds an `ERROR` result for a witness that never ran to completion.
    #[must_use]
    pub fn error(name: WitnessName, message: impl Into<String>) -> Self {
        Self {
            name,
            status: WitnessStatus::Error,
            exit_code: ERROR_EXIT_CODE,
            stdout: String::new(),
            stderr: message.into(),
        }
    }

    /// Builds a `TIMEOUT` result.
    #[must_use]
    pub fn timeout(name: WitnessName, timeout_ms: u64) -> Self {
        Self {
            name,
            status: WitnessStatus::Timeout,
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: String::new(),
            stderr: format!("Execution exceeded {timeout_ms}ms timeout"),
        }
    }
}

// ============================================================================
// SECTION: Capsule Verdict
// ============================================================================

/// Capsule-level runtime verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapsuleStatus {
    /// Every witness passed or skipped, with at least one pass.
    Green,
    /// At least one witness failed, errored, or timed out.
    Red,
    /// No witnesses ran, or every witness skipped.
    Skip,
}

impl CapsuleStatus {
    /// Returns the uppercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "GREEN",
            Self::Red => "RED",
            Self::Skip => "SKIP",
        }
    }
}

impl fmt::Display for CapsuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated witness outcomes for one capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleReport {
    /// Capsule identifier.
    pub capsule: CapsuleId,
    /// Aggregated verdict.
    pub status: CapsuleStatus,
    /// Per-witness results in declaration order.
    pub witness_results: Vec<WitnessResult>,
}
