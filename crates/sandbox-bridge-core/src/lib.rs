// crates/sandbox-bridge-core/src/lib.rs
// ============================================================================
// Module: Sandbox Bridge Core Library
// Description: Public API surface for the Sandbox Bridge core.
// Purpose: Expose tool identifiers, resource addressing, and engine interfaces.
// Dependencies: crate::{core, interfaces, tooling}
// ============================================================================

//! ## Overview
//! Sandbox Bridge core defines the vocabulary shared by the MCP bridge and the
//! execution engine adapters: canonical tool names, mount and resource
//! addressing with root containment, and the narrow [`ExecutionEngine`]
//! capability interface. It carries no transport or runtime dependencies.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod tooling;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::EngineError;
pub use interfaces::ExecutionEngine;
pub use interfaces::SharedEngine;
pub use tooling::ToolName;
