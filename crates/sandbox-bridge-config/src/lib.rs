// crates/sandbox-bridge-config/src/lib.rs
// ============================================================================
// Module: Sandbox Bridge Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for sandbox-bridge.toml semantics.
// Dependencies: sandbox-bridge-core, serde, toml
// ============================================================================

//! ## Overview
//! `sandbox-bridge-config` defines the configuration model for the Sandbox
//! Bridge server: transport selection, session limits, audit output, and
//! execution engine directories. Validation is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
