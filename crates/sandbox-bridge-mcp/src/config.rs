// crates/sandbox-bridge-mcp/src/config.rs
// ============================================================================
// Module: MCP Configuration (Re-export)
// Description: Re-export canonical Sandbox Bridge config types.
// Purpose: Keep MCP callers stable while centralizing config logic.
// Dependencies: sandbox-bridge-config
// ============================================================================

//! ## Overview
//! This module re-exports the canonical configuration model from
//! `sandbox-bridge-config` so MCP modules and callers share one source of
//! truth.

/// Re-export canonical config types and helpers.
pub use sandbox_bridge_config::*;
