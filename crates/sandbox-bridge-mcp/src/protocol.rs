// crates/sandbox-bridge-mcp/src/protocol.rs
// ============================================================================
// Module: MCP Protocol Handling
// Description: JSON-RPC framing and MCP method dispatch.
// Purpose: Turn one inbound payload into zero or more JSON-RPC responses.
// Dependencies: sandbox-bridge-core, serde, serde_json
// ============================================================================

//! ## Overview
//! [`BridgeContext`] is the single process-scoped context holding the tool
//! router, resource catalog, and observability sinks; every transport passes
//! it explicitly into [`SessionServer::handle_payload`]. A [`SessionServer`]
//! holds per-session protocol state (the negotiated version). Notifications
//! and client responses produce no output; batches produce an array of the
//! responses their requests generate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Instant;

use sandbox_bridge_core::SharedEngine;
use sandbox_bridge_core::ToolName;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::audit::McpAuditEvent;
use crate::audit::McpAuditEventParams;
use crate::audit::McpAuditSink;
use crate::config::ErrorDetail;
use crate::context::RequestContext;
use crate::resources::ResourceCatalog;
use crate::telemetry::McpMethod;
use crate::telemetry::McpMetricEvent;
use crate::telemetry::McpMetrics;
use crate::telemetry::McpOutcome;
use crate::tools::ToolRouter;
use crate::validation::ToolLimits;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol versions this server speaks, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];
/// Server name reported by `initialize`.
pub const SERVER_NAME: &str = "sandbox-bridge";

/// JSON-RPC parse error.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC invalid request.
pub const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC method not found.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC invalid params.
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC internal error.
pub const INTERNAL_ERROR: i64 = -32603;

// ============================================================================
// SECTION: JSON-RPC Types
// ============================================================================

/// Inbound JSON-RPC message.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// Protocol tag; must be `2.0`.
    jsonrpc: String,
    /// Request id; absent for notifications.
    #[serde(default)]
    id: Option<Value>,
    /// Method name; absent for client responses.
    #[serde(default)]
    method: Option<String>,
    /// Method params.
    #[serde(default)]
    params: Option<Value>,
    /// Present on client responses.
    #[serde(default)]
    result: Option<Value>,
    /// Present on client error responses.
    #[serde(default)]
    error: Option<Value>,
}

/// JSON-RPC response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol tag.
    pub jsonrpc: String,
    /// Request id; `null` when unknown.
    pub id: Value,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
}

impl JsonRpcError {
    /// Builds an error object.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl JsonRpcResponse {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Serializes the response, falling back to a fixed internal error.
    #[must_use]
    pub fn into_value(self) -> Value {
        serde_json::to_value(&self).unwrap_or_else(|_| {
            json!({
                "jsonrpc": "2.0",
                "id": Value::Null,
                "error": {"code": INTERNAL_ERROR, "message": "internal error"},
            })
        })
    }
}

/// Builds a standalone error payload (parse failures, oversize frames).
#[must_use]
pub fn error_payload(code: i64, message: &str) -> Value {
    JsonRpcResponse::failure(Value::Null, JsonRpcError::new(code, message)).into_value()
}

/// Params of `tools/call`.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Untyped tool arguments.
    #[serde(default)]
    arguments: Option<Value>,
}

/// Params of `resources/read`.
#[derive(Debug, Deserialize)]
struct ReadResourceParams {
    /// Resource URI.
    uri: String,
}

/// Params of `initialize`.
#[derive(Debug, Deserialize)]
struct InitializeParams {
    /// Version requested by the client.
    #[serde(rename = "protocolVersion", default)]
    protocol_version: Option<String>,
}

// ============================================================================
// SECTION: Bridge Context
// ============================================================================

/// Process-scoped dispatch context shared by every session.
pub struct BridgeContext {
    /// Tool dispatch.
    pub router: ToolRouter,
    /// Resource access.
    pub resources: ResourceCatalog,
    /// Audit sink.
    pub audit: Arc<dyn McpAuditSink>,
    /// Metrics sink.
    pub metrics: Arc<dyn McpMetrics>,
    /// Caller-facing error policy.
    pub error_detail: ErrorDetail,
}

impl BridgeContext {
    /// Builds the context around one shared engine.
    #[must_use]
    pub fn new(
        engine: SharedEngine,
        limits: ToolLimits,
        error_detail: ErrorDetail,
        audit: Arc<dyn McpAuditSink>,
        metrics: Arc<dyn McpMetrics>,
    ) -> Self {
        Self {
            router: ToolRouter::new(Arc::clone(&engine), limits, error_detail),
            resources: ResourceCatalog::new(engine),
            audit,
            metrics,
            error_detail,
        }
    }
}

// ============================================================================
// SECTION: Session Server
// ============================================================================

/// Result of dispatching one request.
struct Dispatched {
    /// Result or protocol error.
    result: Result<Value, JsonRpcError>,
    /// Tool invoked, for tools/call.
    tool: Option<ToolName>,
    /// Failure kind label.
    error_kind: Option<&'static str>,
    /// Unredacted failure detail.
    error_detail: Option<String>,
}

impl Dispatched {
    /// Wraps a plain result.
    fn plain(result: Result<Value, JsonRpcError>) -> Self {
        let error_kind = result.as_ref().err().map(|err| error_kind_for_code(err.code));
        let error_detail = result.as_ref().err().map(|err| err.message.clone());
        Self {
            result,
            tool: None,
            error_kind,
            error_detail,
        }
    }
}

/// Per-session protocol state.
#[derive(Debug, Default)]
pub struct SessionServer {
    /// Negotiated protocol version once initialized.
    negotiated: Mutex<Option<String>>,
}

impl SessionServer {
    /// Creates an uninitialized server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the negotiated protocol version.
    #[must_use]
    pub fn protocol_version(&self) -> Option<String> {
        self.negotiated.lock().ok().and_then(|guard| guard.as_ref().cloned())
    }

    /// Handles one inbound payload (single message or batch).
    pub async fn handle_payload(
        &self,
        bridge: &BridgeContext,
        request: &RequestContext,
        payload: Value,
    ) -> Option<Value> {
        match payload {
            Value::Array(messages) if messages.is_empty() => {
                Some(error_payload(INVALID_REQUEST, "Invalid Request: empty batch"))
            }
            Value::Array(messages) => {
                let mut responses = Vec::new();
                for message in messages {
                    if let Some(response) = self.handle_message(bridge, request, message).await {
                        responses.push(response);
                    }
                }
                (!responses.is_empty()).then_some(Value::Array(responses))
            }
            message => self.handle_message(bridge, request, message).await,
        }
    }

    /// Handles one JSON-RPC message.
    async fn handle_message(
        &self,
        bridge: &BridgeContext,
        request: &RequestContext,
        message: Value,
    ) -> Option<Value> {
        let started = Instant::now();
        let parsed = serde_json::from_value::<JsonRpcRequest>(message)
            .ok()
            .filter(|parsed| parsed.jsonrpc == "2.0");
        let Some(parsed) = parsed else {
            let dispatched =
                Dispatched::plain(Err(JsonRpcError::new(INVALID_REQUEST, "Invalid Request")));
            let id = Value::Null;
            return Some(finish(bridge, request, McpMethod::Invalid, id, &dispatched, started));
        };
        let Some(method) = parsed.method else {
            if parsed.id.is_some() && (parsed.result.is_some() || parsed.error.is_some()) {
                return None;
            }
            let dispatched = Dispatched::plain(Err(JsonRpcError::new(
                INVALID_REQUEST,
                "Invalid Request: missing method",
            )));
            let id = parsed.id.unwrap_or(Value::Null);
            return Some(finish(bridge, request, McpMethod::Invalid, id, &dispatched, started));
        };
        // Notifications carry no id and never produce output.
        let id = parsed.id?;
        let classified = McpMethod::classify(&method);
        let dispatched = self.dispatch(bridge, classified, &method, parsed.params).await;
        Some(finish(bridge, request, classified, id, &dispatched, started))
    }

    /// Dispatches a request by method.
    async fn dispatch(
        &self,
        bridge: &BridgeContext,
        classified: McpMethod,
        method: &str,
        params: Option<Value>,
    ) -> Dispatched {
        match classified {
            McpMethod::Initialize => Dispatched::plain(self.initialize(params)),
            McpMethod::Ping => Dispatched::plain(Ok(json!({}))),
            McpMethod::ToolsList => {
                Dispatched::plain(Ok(json!({"tools": bridge.router.list_tools()})))
            }
            McpMethod::ToolsCall => {
                let params = match parse_params::<ToolCallParams>(params) {
                    Ok(params) => params,
                    Err(err) => return Dispatched::plain(Err(err)),
                };
                let outcome =
                    bridge.router.call_tool(&params.name, params.arguments.as_ref()).await;
                let result = serde_json::to_value(&outcome.result)
                    .map_err(|err| JsonRpcError::new(INTERNAL_ERROR, err.to_string()));
                Dispatched {
                    result,
                    tool: outcome.tool,
                    error_kind: outcome.error_kind,
                    error_detail: outcome.error_detail,
                }
            }
            McpMethod::ResourcesList => match bridge.resources.list().await {
                Ok(list) => Dispatched::plain(to_result(&list)),
                Err(err) => Dispatched {
                    result: Err(JsonRpcError::new(
                        err.code(),
                        err.caller_message(bridge.error_detail),
                    )),
                    tool: None,
                    error_kind: Some(err.kind()),
                    error_detail: Some(err.to_string()),
                },
            },
            McpMethod::ResourcesRead => {
                let params = match parse_params::<ReadResourceParams>(params) {
                    Ok(params) => params,
                    Err(err) => return Dispatched::plain(Err(err)),
                };
                match bridge.resources.read(&params.uri).await {
                    Ok(read) => Dispatched::plain(to_result(&read)),
                    Err(err) => Dispatched {
                        result: Err(JsonRpcError::new(
                            err.code(),
                            err.caller_message(bridge.error_detail),
                        )),
                        tool: None,
                        error_kind: Some(err.kind()),
                        error_detail: Some(err.to_string()),
                    },
                }
            }
            McpMethod::Invalid | McpMethod::Other => Dispatched::plain(Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            ))),
        }
    }

    /// Handles `initialize`; a repeat call is rejected.
    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params = parse_params::<InitializeParams>(params.or_else(|| Some(json!({}))))?;
        let mut guard = self
            .negotiated
            .lock()
            .map_err(|_| JsonRpcError::new(INTERNAL_ERROR, "session state unavailable"))?;
        if guard.is_some() {
            return Err(JsonRpcError::new(
                INVALID_REQUEST,
                "Invalid Request: Server already initialized",
            ));
        }
        let version = negotiate_version(params.protocol_version.as_deref());
        *guard = Some(version.to_string());
        drop(guard);
        Ok(json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": {},
                "resources": {},
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        }))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the response value and records audit and metrics.
fn finish(
    bridge: &BridgeContext,
    request: &RequestContext,
    method: McpMethod,
    id: Value,
    dispatched: &Dispatched,
    started: Instant,
) -> Value {
    let tool_failed = dispatched
        .result
        .as_ref()
        .is_ok_and(|result| result.get("isError").and_then(Value::as_bool).unwrap_or(false));
    let outcome =
        if dispatched.result.is_err() || tool_failed { McpOutcome::Error } else { McpOutcome::Ok };
    let error_code = dispatched.result.as_ref().err().map(|err| err.code);
    let request_id = (!id.is_null()).then(|| render_id(&id));
    let response = match &dispatched.result {
        Ok(result) => JsonRpcResponse::success(id, result.clone()),
        Err(error) => JsonRpcResponse::failure(id, error.clone()),
    };
    let value = response.into_value();
    let response_bytes = serde_json::to_vec(&value).map_or(0, |bytes| bytes.len());
    let event = McpMetricEvent {
        transport: request.transport,
        method,
        tool: dispatched.tool,
        outcome,
        error_code,
        error_kind: dispatched.error_kind,
        request_bytes: request.request_bytes,
        response_bytes,
    };
    bridge.metrics.record_request(event.clone());
    bridge.metrics.record_latency(event, started.elapsed());
    bridge.audit.record(&McpAuditEvent::new(McpAuditEventParams {
        session_ref: request.session_ref.clone(),
        request_id,
        transport: request.transport,
        peer_ip: request.peer_ip.clone(),
        method,
        tool: dispatched.tool,
        outcome,
        error_code,
        error_kind: dispatched.error_kind,
        error_detail: dispatched.error_detail.clone(),
        request_bytes: request.request_bytes,
        response_bytes,
    }));
    value
}

/// Returns true when the payload is a lone `initialize` request.
#[must_use]
pub fn is_initialize_request(payload: &Value) -> bool {
    let message = match payload {
        Value::Array(messages) if messages.len() == 1 => &messages[0],
        Value::Array(_) => return false,
        message => message,
    };
    message.get("method").and_then(Value::as_str) == Some("initialize")
        && message.get("id").is_some_and(|id| !id.is_null())
}

/// Returns true when a response payload carries a JSON-RPC error.
#[must_use]
pub fn is_error_response(payload: &Value) -> bool {
    match payload {
        Value::Array(responses) => responses.iter().any(is_error_response),
        response => response.get("error").is_some_and(|error| !error.is_null()),
    }
}

/// Picks the protocol version to answer with.
fn negotiate_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|requested| {
            SUPPORTED_PROTOCOL_VERSIONS.iter().copied().find(|version| *version == requested)
        })
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}

/// Deserializes method params.
fn parse_params<T: for<'de> Deserialize<'de>>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::new(INVALID_PARAMS, "Invalid params"))?;
    serde_json::from_value(params)
        .map_err(|err| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {err}")))
}

/// Serializes a result payload.
fn to_result<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|err| JsonRpcError::new(INTERNAL_ERROR, err.to_string()))
}

/// Renders a request id for audit.
fn render_id(id: &Value) -> String {
    match id {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Maps a protocol error code to a kind label.
const fn error_kind_for_code(code: i64) -> &'static str {
    match code {
        PARSE_ERROR => "parse_error",
        INVALID_REQUEST => "invalid_request",
        METHOD_NOT_FOUND => "method_not_found",
        INVALID_PARAMS => "invalid_params",
        _ => "internal",
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
