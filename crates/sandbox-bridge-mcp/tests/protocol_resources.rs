//! JSON-RPC protocol and resource integration tests for sandbox-bridge-mcp.
// crates/sandbox-bridge-mcp/tests/protocol_resources.rs
// ============================================================================
// Module: Protocol and Resource Tests
// Description: End-to-end JSON-RPC handling through the session server.
// Purpose: Validate initialize negotiation, batches, resource reads, and the
//          error codes surfaced for each resource failure class.
// Dependencies: sandbox-bridge-mcp, serde_json, tokio
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions are permitted."
)]

mod common;

use std::sync::Arc;

use common::FakeEngine;
use common::RecordingAudit;
use common::TestResult;
use common::bridge;
use sandbox_bridge_mcp::BridgeContext;
use sandbox_bridge_mcp::SessionServer;
use sandbox_bridge_mcp::config::ErrorDetail;
use sandbox_bridge_mcp::context::RequestContext;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// One session server over a fake engine.
struct Harness {
    /// Shared dispatch context.
    bridge: Arc<BridgeContext>,
    /// Recorded audit events.
    audit: Arc<RecordingAudit>,
    /// Session under test.
    server: SessionServer,
}

impl Harness {
    fn new(detail: ErrorDetail) -> Self {
        let audit = Arc::new(RecordingAudit::default());
        Self {
            bridge: bridge(FakeEngine::shared(), detail, Arc::clone(&audit)),
            audit,
            server: SessionServer::new(),
        }
    }

    async fn send(&self, payload: Value) -> Option<Value> {
        self.server.handle_payload(&self.bridge, &RequestContext::stdio(), payload).await
    }

    async fn call(&self, method: &str, params: Value) -> Value {
        self.send(json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}))
            .await
            .expect("request yields a response")
    }
}

// ============================================================================
// SECTION: Initialize
// ============================================================================

#[tokio::test]
async fn initialize_echoes_supported_version() -> TestResult {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response = harness.call("initialize", json!({"protocolVersion": "2025-03-26"})).await;
    let result = response.get("result").ok_or("initialize returned no result")?;
    assert_eq!(result["protocolVersion"], json!("2025-03-26"));
    assert_eq!(result["serverInfo"]["name"], json!("sandbox-bridge"));
    assert!(result["capabilities"]["tools"].is_object());
    assert!(result["capabilities"]["resources"].is_object());
    assert_eq!(harness.server.protocol_version().as_deref(), Some("2025-03-26"));
    Ok(())
}

#[tokio::test]
async fn initialize_falls_back_to_latest_version() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response = harness.call("initialize", json!({"protocolVersion": "1999-01-01"})).await;
    assert_eq!(response["result"]["protocolVersion"], json!("2025-06-18"));
}

#[tokio::test]
async fn ping_and_unknown_methods() {
    let harness = Harness::new(ErrorDetail::Redacted);
    assert_eq!(harness.call("ping", Value::Null).await["result"], json!({}));
    let missing = harness.call("prompts/list", json!({})).await;
    assert_eq!(missing["error"]["code"], json!(-32601));
    assert_eq!(missing["error"]["message"], json!("Method not found: prompts/list"));
}

#[tokio::test]
async fn tools_list_advertises_schemas() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response = harness.call("tools/list", json!({})).await;
    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 5);
    let execute = tools.iter().find(|tool| tool["name"] == json!("execute-code")).unwrap();
    assert_eq!(execute["inputSchema"]["required"], json!(["code"]));
}

#[tokio::test]
async fn tools_call_wraps_envelope_in_result() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response =
        harness.call("tools/call", json!({"name": "execute-code", "arguments": {}})).await;
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], json!(true));
    assert_eq!(response["result"]["content"][0]["type"], json!("text"));
}

// ============================================================================
// SECTION: Batches and Notifications
// ============================================================================

#[tokio::test]
async fn batch_collects_only_request_responses() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response = harness
        .send(json!([
            {"jsonrpc": "2.0", "id": 1, "method": "ping"},
            {"jsonrpc": "2.0", "method": "notifications/initialized"},
            {"jsonrpc": "2.0", "id": 2, "method": "ping"}
        ]))
        .await
        .unwrap();
    let ids: Vec<_> = response.as_array().unwrap().iter().map(|item| item["id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(2)]);
}

#[tokio::test]
async fn notification_only_batch_has_no_response() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response =
        harness.send(json!([{"jsonrpc": "2.0", "method": "notifications/initialized"}])).await;
    assert!(response.is_none());
}

#[tokio::test]
async fn empty_batch_is_invalid_request() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response = harness.send(json!([])).await.unwrap();
    assert_eq!(response["error"]["code"], json!(-32600));
}

#[tokio::test]
async fn wrong_jsonrpc_version_is_invalid_request() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response = harness.send(json!({"jsonrpc": "1.0", "id": 4, "method": "ping"})).await;
    assert_eq!(response.unwrap()["error"]["code"], json!(-32600));
}

// ============================================================================
// SECTION: Resources
// ============================================================================

#[tokio::test]
async fn resources_list_returns_engine_descriptors() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response = harness.call("resources/list", json!({})).await;
    let uris: Vec<_> = response["result"]["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|resource| resource["uri"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(uris, vec!["resource://data/notes.txt", "resource://data/sub/file.png"]);
}

#[tokio::test]
async fn resources_read_returns_base64_blob() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response =
        harness.call("resources/read", json!({"uri": "resource://data/notes.txt"})).await;
    assert_eq!(
        response["result"]["contents"],
        json!([{
            "uri": "resource://data/notes.txt",
            "blob": "aGVsbG8=",
            "mimeType": "text/plain"
        }])
    );
}

#[tokio::test]
async fn unregistered_mount_is_invalid_uri() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response = harness.call("resources/read", json!({"uri": "resource://other/a.txt"})).await;
    assert_eq!(response["error"]["code"], json!(-32602));
    assert_eq!(response["error"]["message"], json!("Invalid URI: resource://other/a.txt"));
}

#[tokio::test]
async fn traversal_uri_is_rejected_before_engine() {
    let harness = Harness::new(ErrorDetail::Redacted);
    for uri in ["resource://data/../secret", "resource://data/a/../../etc/passwd", "file:///x"] {
        let response = harness.call("resources/read", json!({"uri": uri})).await;
        assert_eq!(response["error"]["code"], json!(-32602), "uri {uri}");
    }
}

#[tokio::test]
async fn missing_file_is_resource_not_found() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response =
        harness.call("resources/read", json!({"uri": "resource://data/missing.txt"})).await;
    assert_eq!(response["error"]["code"], json!(-32002));
    assert_eq!(response["error"]["message"], json!("file not found: missing.txt"));
}

#[tokio::test]
async fn io_failure_is_redacted_by_default() {
    let redacted = Harness::new(ErrorDetail::Redacted);
    let response =
        redacted.call("resources/read", json!({"uri": "resource://data/broken.bin"})).await;
    assert_eq!(response["error"]["code"], json!(-32603));
    assert_eq!(response["error"]["message"], json!("execution engine failure"));

    let verbose = Harness::new(ErrorDetail::Verbose);
    let response =
        verbose.call("resources/read", json!({"uri": "resource://data/broken.bin"})).await;
    assert_eq!(response["error"]["message"], json!("io error: /srv/data/broken.bin: EIO"));
}

#[tokio::test]
async fn missing_uri_param_is_invalid_params() {
    let harness = Harness::new(ErrorDetail::Redacted);
    let response = harness.call("resources/read", json!({})).await;
    assert_eq!(response["error"]["code"], json!(-32602));
}

// ============================================================================
// SECTION: Audit
// ============================================================================

#[tokio::test]
async fn audit_keeps_full_detail_while_caller_sees_redaction() {
    let harness = Harness::new(ErrorDetail::Redacted);
    harness.call("resources/read", json!({"uri": "resource://data/broken.bin"})).await;
    harness.call("tools/call", json!({"name": "get-mount-points"})).await;

    let events = harness.audit.requests.lock().unwrap().clone();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["method"], json!("resources_read"));
    assert_eq!(events[0]["outcome"], json!("error"));
    assert_eq!(events[0]["error_code"], json!(-32603));
    assert_eq!(events[0]["error_detail"], json!("io error: /srv/data/broken.bin: EIO"));
    assert_eq!(events[1]["method"], json!("tools_call"));
    assert_eq!(events[1]["tool"], json!("get-mount-points"));
    assert_eq!(events[1]["outcome"], json!("ok"));
}
