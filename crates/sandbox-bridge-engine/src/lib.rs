// crates/sandbox-bridge-engine/src/lib.rs
// ============================================================================
// Module: Sandbox Bridge Engine Library
// Description: Host-process execution engine adapter.
// Purpose: Provide a runnable ExecutionEngine backed by a local interpreter.
// Dependencies: sandbox-bridge-core, cap-std, tokio
// ============================================================================

//! ## Overview
//! [`HostEngine`] implements the engine capability with a host interpreter
//! subprocess and capability-scoped directory handles for mounts. It is a
//! thin collaborator: process isolation is the deployment's responsibility.
//! Mount access goes through `cap-std` directory handles so resolved paths,
//! including symlinks, cannot leave the mount root.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod fs;
mod host;
mod packages;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use host::HostEngine;
pub use host::HostEngineConfig;
pub use packages::parse_package_specs;
