// crates/capsule-gate-core/src/runtime/aggregate.rs
// ============================================================================
// Module: Capsule Aggregation
// Description: Reduces witness results to a capsule-level verdict.
// Purpose: Provide the GREEN/RED/SKIP runtime verdict for one capsule.
// Dependencies: crate::core::verdict
// ============================================================================

//! ## Overview
//! Aggregation is a pure fold over witness statuses. Any failing status wins,
//! then an all-skip (or empty) set is `SKIP`, and everything else is `GREEN`.
//! Input order is preserved in the report.

use crate::core::identifiers::CapsuleId;
use crate::core::verdict::CapsuleReport;
use crate::core::verdict::CapsuleStatus;
use crate::core::verdict::WitnessResult;
use crate::core::verdict::WitnessStatus;

/// Returns the capsule verdict for a set of witness results.
#[must_use]
pub fn capsule_status(results: &[WitnessResult]) -> CapsuleStatus {
    if results.iter().any(|result| result.status.is_failing()) {
        return CapsuleStatus::Red;
    }
    if results.iter().all(|result| result.status == WitnessStatus::Skip) {
        return CapsuleStatus::Skip;
    }
    CapsuleStatus::Green
}

/// Builds the capsule report for `capsule` from its witness results.
#[must_use]
pub fn aggregate(capsule: CapsuleId, witness_results: Vec<WitnessResult>) -> CapsuleReport {
    let status = capsule_status(&witness_results);
    CapsuleReport {
        capsule,
        status,
        witness_results,
    }
}
