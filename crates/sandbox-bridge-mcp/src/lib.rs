// crates/sandbox-bridge-mcp/src/lib.rs
// ============================================================================
// Module: Sandbox Bridge MCP Library
// Description: MCP transports, session management, and tool dispatch.
// Purpose: Expose a sandboxed execution engine as MCP tools and resources.
// Dependencies: sandbox-bridge-core, sandbox-bridge-config, axum, tokio
// ============================================================================

//! ## Overview
//! `sandbox-bridge-mcp` serves five tools (`execute-code`, `install-packages`,
//! `get-mount-points`, `read-media`, `upload-file`) and the mounted-directory
//! resources of one shared [`ExecutionEngine`] over stdio, legacy SSE, or
//! streamable HTTP.
//!
//! Request flow: transport -> caller metadata -> session lookup ->
//! [`SessionServer`] -> [`ToolRouter`] (validate, then call the engine) ->
//! error envelope -> transport.
//!
//! Security posture: tool arguments, resource URIs, and session ids are
//! untrusted. Validation completes before any engine call, resource paths
//! cannot leave their mount root, and session ids are unguessable bearer
//! tokens.
//!
//! [`ExecutionEngine`]: sandbox_bridge_core::ExecutionEngine

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod config;
pub mod context;
pub mod envelope;
pub mod protocol;
pub mod registry;
pub mod resources;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod tools;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::McpAuditEvent;
pub use audit::McpAuditSink;
pub use audit::McpFileAuditSink;
pub use audit::McpNoopAuditSink;
pub use audit::McpStderrAuditSink;
pub use audit::SessionAuditEvent;
pub use config::BridgeConfig;
pub use envelope::CallToolResult;
pub use envelope::ToolContent;
pub use protocol::BridgeContext;
pub use protocol::SessionServer;
pub use resources::ResourceCatalog;
pub use resources::ResourceError;
pub use server::McpServer;
pub use server::McpServerError;
pub use session::CloseReason;
pub use session::SessionError;
pub use session::SessionId;
pub use session::SessionManager;
pub use telemetry::McpMetrics;
pub use telemetry::NoopMetrics;
pub use tools::ToolCallOutcome;
pub use tools::ToolError;
pub use tools::ToolRouter;
pub use validation::ToolLimits;
pub use validation::ValidatedArgs;
pub use validation::ValidationError;
pub use validation::validate_arguments;
