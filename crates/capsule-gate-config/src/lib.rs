// crates/capsule-gate-config/src/lib.rs
// ============================================================================
// Module: Capsule Gate Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for capsule-gate.toml semantics.
// Dependencies: capsule-gate-core, capsule-gate-witness, serde, toml
// ============================================================================

//! ## Overview
//! `capsule-gate-config` defines the configuration model for the capsule
//! gate tools. Loading is strict and fail-closed; validated sections convert
//! into the runtime types the core and witness crates consume.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
