// crates/capsule-gate-core/tests/aggregate.rs
// ============================================================================
// Module: Aggregation Tests
// Description: Capsule verdicts from witness outcome sets.
// ============================================================================
//! ## Overview
//! Covers the verdict table: empty, mixed, all-skip, and all-pass sets, and
//! checks that each failing status turns a capsule red.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use capsule_gate_core::CapsuleId;
use capsule_gate_core::CapsuleStatus;
use capsule_gate_core::WitnessName;
use capsule_gate_core::WitnessResult;
use capsule_gate_core::WitnessStatus;
use capsule_gate_core::aggregate;
use serde_json::json;

fn result(name: &str, status: WitnessStatus) -> WitnessResult {
    WitnessResult {
        name: WitnessName::new(name),
        status,
        exit_code: i32::from(status != WitnessStatus::Pass && status != WitnessStatus::Skip),
        stdout: String::new(),
        stderr: String::new(),
    }
}

fn verdict(statuses: &[WitnessStatus]) -> CapsuleStatus {
    let results = statuses
        .iter()
        .enumerate()
        .map(|(index, status)| result(&format!("w{index}"), *status))
        .collect();
    aggregate(CapsuleId::new("c"), results).status
}

#[test]
fn no_witnesses_is_skip() {
    assert_eq!(verdict(&[]), CapsuleStatus::Skip);
}

#[test]
fn pass_and_fail_is_red() {
    assert_eq!(verdict(&[WitnessStatus::Pass, WitnessStatus::Fail]), CapsuleStatus::Red);
}

#[test]
fn two_skips_is_skip() {
    assert_eq!(verdict(&[WitnessStatus::Skip, WitnessStatus::Skip]), CapsuleStatus::Skip);
}

#[test]
fn two_passes_is_green() {
    assert_eq!(verdict(&[WitnessStatus::Pass, WitnessStatus::Pass]), CapsuleStatus::Green);
}

#[test]
fn skip_with_pass_is_green() {
    assert_eq!(verdict(&[WitnessStatus::Skip, WitnessStatus::Pass]), CapsuleStatus::Green);
}

#[test]
fn every_failing_status_turns_red() {
    for failing in [WitnessStatus::Fail, WitnessStatus::Timeout, WitnessStatus::Error] {
        assert_eq!(verdict(&[WitnessStatus::Skip, failing]), CapsuleStatus::Red, "{failing}");
    }
}

#[test]
fn report_keeps_input_order_and_serializes_returncode() {
    let report = aggregate(
        CapsuleId::new("ordered"),
        vec![result("b", WitnessStatus::Pass), result("a", WitnessStatus::Timeout)],
    );
    let names: Vec<&str> = report.witness_results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["b", "a"]);
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["status"], json!("RED"));
    assert_eq!(value["witness_results"][1]["status"], json!("TIMEOUT"));
    assert_eq!(value["witness_results"][1]["returncode"], json!(1));
}
