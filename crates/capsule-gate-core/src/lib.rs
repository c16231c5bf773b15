// crates/capsule-gate-core/src/lib.rs
// ============================================================================
// Module: Capsule Gate Core Library
// Description: Public API surface for the Capsule Gate core.
// Purpose: Expose capsule types, digest, signing, gate, and aggregation helpers.
// Dependencies: crate::{audit, core, runtime}
// ============================================================================

//! ## Overview
//! Capsule Gate core provides the deterministic half of capsule verification:
//! canonical digests over a capsule's semantic core, Ed25519 signing and
//! verification over those digests, the policy gate, and aggregation of
//! witness outcomes into a capsule verdict. Witness execution lives in the
//! `capsule-gate-witness` crate and only consumes types from here.
//!
//! Everything in this crate is synchronous and side-effect free except the
//! document loader and the atomic write-back helper.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;
pub use crate::runtime::*;

pub use audit::AuditSink;
pub use audit::DigestAuditEvent;
pub use audit::FileAuditSink;
pub use audit::GateAuditEvent;
pub use audit::GateAuditEventParams;
pub use audit::NoopAuditSink;
pub use audit::SigningAuditEvent;
pub use audit::StderrAuditSink;
pub use audit::WitnessAuditEvent;
pub use audit::WitnessAuditEventParams;
