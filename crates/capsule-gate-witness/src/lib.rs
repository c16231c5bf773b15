// crates/capsule-gate-witness/src/lib.rs
// ============================================================================
// Module: Capsule Gate Witness Library
// Description: Witness execution engine and batch runner.
// Purpose: Execute capsule witnesses as time-limited, isolated subprocesses.
// Dependencies: capsule-gate-core, tokio, tempfile, glob, nix
// ============================================================================

//! ## Overview
//! This crate runs the executable witnesses attached to capsules. Each run
//! materializes the witness source into a private temp file, spawns the
//! interpreter in its own process group with a controlled environment,
//! enforces a deadline, and classifies the outcome. The batch runner applies
//! capsule and witness filters and aggregates results per capsule.
//!
//! Security posture: witness code is untrusted. Only process lifetime,
//! environment, and time are controlled here; file and network isolation are
//! delegated to the [`Sandbox`] seam.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod batch;
pub mod engine;
pub mod environment;
pub mod process;
pub mod sandbox;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use batch::BatchOptions;
pub use batch::BatchReport;
pub use batch::BatchRunner;
pub use batch::CapsuleFilter;
pub use batch::FilterError;
pub use batch::LoadWarning;
pub use engine::DEFAULT_MAX_TIMEOUT_MS;
pub use engine::EngineSettings;
pub use engine::RunContext;
pub use engine::WitnessEngine;
pub use environment::EnvPolicy;
pub use environment::EnvPolicyParseError;
pub use environment::HostEnvironment;
pub use environment::build_environment;
pub use environment::resolve_program;
pub use process::ProcessGroupGuard;
pub use process::ProcessOutcome;
pub use sandbox::Invocation;
pub use sandbox::ProcessSandbox;
pub use sandbox::Sandbox;
pub use sandbox::SandboxError;
pub use sandbox::WrapperSandbox;
