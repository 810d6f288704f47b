// crates/sandbox-bridge-mcp/src/context.rs
// ============================================================================
// Module: MCP Request Context
// Description: Per-request caller metadata for MCP transports.
// Purpose: Carry transport, caller IP, and headers into dispatch and audit.
// Dependencies: axum, serde, serde_json
// ============================================================================

//! ## Overview
//! HTTP transports attach caller metadata (`{ip, headers}`) to every inbound
//! JSON-RPC message as `params._meta`, replacing anything the client sent
//! under that key. The caller IP resolves as: first `x-forwarded-for` entry,
//! then `x-real-ip`, then the socket peer address, then `"unknown"`.
//! Forwarding headers are taken as given; deployments that expose the bridge
//! directly should not rely on them for access control.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::http::HeaderMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::config::ServerTransport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Key under which caller metadata is attached to request params.
pub const META_KEY: &str = "_meta";
/// IP reported when no source is available.
pub const UNKNOWN_IP: &str = "unknown";

// ============================================================================
// SECTION: Caller Metadata
// ============================================================================

/// Caller metadata attached to forwarded requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerMetadata {
    /// Resolved caller IP.
    pub ip: String,
    /// Request headers with lower-cased names.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl CallerMetadata {
    /// Builds caller metadata from HTTP request parts.
    #[must_use]
    pub fn from_http(peer: Option<SocketAddr>, headers: &HeaderMap) -> Self {
        Self {
            ip: resolve_client_ip(headers, peer),
            headers: header_map(headers),
        }
    }
}

/// Resolves the caller IP from forwarding headers and the socket peer.
#[must_use]
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }
    peer.map_or_else(|| UNKNOWN_IP.to_string(), |addr| addr.ip().to_string())
}

/// Flattens a header map; repeated headers are joined with `", "`.
fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}

/// Attaches caller metadata to every request or notification in a payload.
///
/// Messages without a `method` (client responses) and messages whose
/// `params` is not an object are left untouched.
pub fn enrich_payload(payload: &mut Value, caller: &CallerMetadata) {
    match payload {
        Value::Array(messages) => {
            for message in messages {
                enrich_message(message, caller);
            }
        }
        message => enrich_message(message, caller),
    }
}

/// Attaches caller metadata to a single message.
fn enrich_message(message: &mut Value, caller: &CallerMetadata) {
    let Value::Object(object) = message else {
        return;
    };
    if !object.contains_key("method") {
        return;
    }
    let Ok(meta) = serde_json::to_value(caller) else {
        return;
    };
    let params = object.entry("params").or_insert(Value::Null);
    if params.is_null() {
        *params = Value::Object(Map::new());
    }
    // Non-object params are left for the protocol layer to reject.
    if let Value::Object(params) = params {
        params.insert(META_KEY.to_string(), meta);
    }
}

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Request context for audit and dispatch.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Transport used by the caller.
    pub transport: ServerTransport,
    /// Caller IP when known.
    pub peer_ip: Option<String>,
    /// Session reference (id prefix) for session-bound requests.
    pub session_ref: Option<String>,
    /// Request body size in bytes.
    pub request_bytes: usize,
}

impl RequestContext {
    /// Builds a stdio request context.
    #[must_use]
    pub const fn stdio() -> Self {
        Self {
            transport: ServerTransport::Stdio,
            peer_ip: None,
            session_ref: None,
            request_bytes: 0,
        }
    }

    /// Builds an HTTP request context.
    #[must_use]
    pub fn http(transport: ServerTransport, caller: &CallerMetadata) -> Self {
        Self {
            transport,
            peer_ip: Some(caller.ip.clone()),
            session_ref: None,
            request_bytes: 0,
        }
    }

    /// Returns a copy with the session reference set.
    #[must_use]
    pub fn with_session_ref(mut self, session_ref: impl Into<String>) -> Self {
        self.session_ref = Some(session_ref.into());
        self
    }

    /// Returns a copy with the request body size set.
    #[must_use]
    pub const fn with_request_bytes(mut self, request_bytes: usize) -> Self {
        self.request_bytes = request_bytes;
        self
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
