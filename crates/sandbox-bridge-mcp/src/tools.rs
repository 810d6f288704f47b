// crates/sandbox-bridge-mcp/src/tools.rs
// ============================================================================
// Module: MCP Tool Routing
// Description: Tool dispatch from validated arguments to the engine.
// Purpose: Route tools/call requests and convert outcomes to envelopes.
// Dependencies: sandbox-bridge-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`ToolRouter::call_tool`] is the single dispatch boundary. It resolves the
//! tool name, validates arguments, and only then calls the engine. Every
//! failure, from any stage, is caught here once and formatted through
//! [`format_tool_error`]; the call never returns a protocol error, so callers
//! can tell a bad call apart from a broken transport.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use sandbox_bridge_core::EngineError;
use sandbox_bridge_core::ExecutionOutput;
use sandbox_bridge_core::SharedEngine;
use sandbox_bridge_core::ToolName;
use serde_json::Value;
use thiserror::Error;

use crate::config::ErrorDetail;
use crate::envelope::CallToolResult;
use crate::envelope::ToolContent;
use crate::envelope::format_tool_error;
use crate::registry::ToolDefinition;
use crate::registry::ToolRegistry;
use crate::validation::ToolLimits;
use crate::validation::ValidatedArgs;
use crate::validation::ValidationError;
use crate::validation::validate_arguments;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Name is not in the registry.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    /// Arguments failed validation.
    #[error(transparent)]
    InvalidArguments(#[from] ValidationError),
    /// Engine call failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Result could not be rendered.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Returns a stable kind label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Engine(inner) => inner.kind(),
            Self::Internal(_) => "internal",
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Outcome of one tool call.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    /// Resolved tool when the name was recognized.
    pub tool: Option<ToolName>,
    /// Envelope returned to the caller.
    pub result: CallToolResult,
    /// Failure kind label for telemetry.
    pub error_kind: Option<&'static str>,
    /// Unredacted failure detail for audit.
    pub error_detail: Option<String>,
}

/// Routes tool calls to the shared engine.
#[derive(Clone)]
pub struct ToolRouter {
    /// Shared execution engine.
    engine: SharedEngine,
    /// Validation bounds.
    limits: ToolLimits,
    /// Caller-facing error policy.
    error_detail: ErrorDetail,
    /// Advertised tool descriptors.
    registry: ToolRegistry,
}

impl ToolRouter {
    /// Creates a router over the engine.
    #[must_use]
    pub fn new(engine: SharedEngine, limits: ToolLimits, error_detail: ErrorDetail) -> Self {
        let registry = ToolRegistry::new(&limits);
        Self {
            engine,
            limits,
            error_detail,
            registry,
        }
    }

    /// Returns the tool descriptors for `tools/list`.
    #[must_use]
    pub fn list_tools(&self) -> &[ToolDefinition] {
        self.registry.definitions()
    }

    /// Dispatches one tool call; failures become error envelopes.
    pub async fn call_tool(&self, name: &str, arguments: Option<&Value>) -> ToolCallOutcome {
        let tool = ToolName::parse(name);
        let outcome = match tool {
            Some(tool) => self.dispatch(tool, arguments).await,
            None => Err(ToolError::UnknownTool(name.to_string())),
        };
        match outcome {
            Ok(result) => ToolCallOutcome {
                tool,
                error_kind: result.is_error().then_some("nonzero_exit"),
                error_detail: None,
                result,
            },
            Err(err) => ToolCallOutcome {
                tool,
                result: format_tool_error(&err, self.error_detail),
                error_kind: Some(err.kind()),
                error_detail: Some(err.to_string()),
            },
        }
    }

    /// Validates arguments and invokes the engine.
    async fn dispatch(
        &self,
        tool: ToolName,
        arguments: Option<&Value>,
    ) -> Result<CallToolResult, ToolError> {
        let args = validate_arguments(tool, arguments, &self.limits)?;
        match args {
            ValidatedArgs::ExecuteCode {
                code,
                timeout_ms,
            } => {
                let output = self.engine.execute(&code, timeout_ms).await?;
                Ok(execution_result(&output))
            }
            ValidatedArgs::InstallPackages {
                package,
            } => {
                let report = self.engine.install_package(&package).await?;
                let mut text = format!("Installed packages: {}", report.packages.join(" "));
                if !report.output.trim().is_empty() {
                    text.push_str("\n\n");
                    text.push_str(report.output.trim_end());
                }
                Ok(CallToolResult::success(vec![ToolContent::text(text)]))
            }
            ValidatedArgs::GetMountPoints => {
                let mounts = self.engine.list_mount_points().await?;
                let text = serde_json::to_string_pretty(&mounts)
                    .map_err(|err| ToolError::Internal(err.to_string()))?;
                Ok(CallToolResult::success(vec![ToolContent::text(text)]))
            }
            ValidatedArgs::ReadMedia {
                mount,
                path,
            } => {
                let media = self.engine.read_media(&mount, &path).await?;
                Ok(CallToolResult::success(vec![ToolContent::media(&media)]))
            }
            ValidatedArgs::UploadFile {
                mount,
                path,
            } => {
                let receipt = self.engine.upload_file(&mount, &path).await?;
                Ok(CallToolResult::success(vec![ToolContent::text(receipt.url)]))
            }
        }
    }
}

/// Renders execution output; a non-zero exit is flagged as an error.
fn execution_result(output: &ExecutionOutput) -> CallToolResult {
    let mut text = output.stdout.clone();
    if !output.stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str("stderr:\n");
        text.push_str(&output.stderr);
    }
    if output.succeeded() {
        return CallToolResult::success(vec![ToolContent::text(text)]);
    }
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    match output.exit_code {
        Some(code) => {
            let _ = write!(text, "process exited with status {code}");
        }
        None => text.push_str("process terminated by signal"),
    }
    CallToolResult {
        content: vec![ToolContent::text(text)],
        is_error: Some(true),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
