// crates/sandbox-bridge-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: stdio, legacy SSE, and streamable HTTP transports.
// Purpose: Bind transports to session state and the shared bridge context.
// Dependencies: axum, sandbox-bridge-config, tokio, tokio-stream, tower-http
// ============================================================================

//! ## Overview
//! The MCP server exposes one of three transports.
//!
//! - stdio: newline-delimited JSON-RPC over stdin/stdout, one implicit session.
//! - sse: `GET /sse` opens a session stream whose first event names the
//!   `POST /messages?sessionId=` endpoint; responses arrive as `message`
//!   events.
//! - streamable: `POST|GET|DELETE /mcp` with the `mcp-session-id` header.
//!
//! Session failures use HTTP status codes (404 unknown session, 400 missing
//! session, 503 at capacity); tool failures ride inside successful JSON-RPC
//! responses as error envelopes.
//!
//! Security posture: all request bodies and headers are untrusted and bounded
//! by `server.max_body_bytes`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::response::sse::Sse;
use axum::routing::get;
use axum::routing::post;
use sandbox_bridge_core::SharedEngine;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;

use crate::audit::McpAuditSink;
use crate::audit::McpFileAuditSink;
use crate::audit::McpNoopAuditSink;
use crate::audit::McpStderrAuditSink;
use crate::config::BridgeConfig;
use crate::config::ServerAuditConfig;
use crate::config::ServerConfig;
use crate::config::ServerTransport;
use crate::context::CallerMetadata;
use crate::context::RequestContext;
use crate::context::enrich_payload;
use crate::protocol::BridgeContext;
use crate::protocol::INVALID_REQUEST;
use crate::protocol::PARSE_ERROR;
use crate::protocol::SessionServer;
use crate::protocol::error_payload;
use crate::protocol::is_error_response;
use crate::protocol::is_initialize_request;
use crate::session::CloseReason;
use crate::session::DisconnectGuard;
use crate::session::Session;
use crate::session::SessionError;
use crate::session::SessionManager;
use crate::telemetry::McpMetrics;
use crate::telemetry::NoopMetrics;
use crate::validation::ToolLimits;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Session affinity header.
pub const SESSION_HEADER: &str = "mcp-session-id";
/// Streamable HTTP endpoint.
pub const MCP_PATH: &str = "/mcp";
/// Legacy SSE stream endpoint.
pub const SSE_PATH: &str = "/sse";
/// Legacy SSE message endpoint.
pub const MESSAGES_PATH: &str = "/messages";

/// Body for unknown or missing streamable session ids.
const UNKNOWN_SESSION_MESSAGE: &str = "Invalid or missing session ID";
/// Body for non-initialize requests without a session.
const MISSING_SESSION_MESSAGE: &str = "Bad Request: No valid session ID provided";
/// Body for dispatch failures after the request was accepted.
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server failures.
#[derive(Debug, Error)]
pub enum McpServerError {
    /// Configuration is unusable.
    #[error("config error: {0}")]
    Config(String),
    /// Server setup failed.
    #[error("initialization error: {0}")]
    Init(String),
    /// Transport I/O failed.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// MCP server bound to one transport.
pub struct McpServer {
    /// Server settings.
    config: ServerConfig,
    /// Shared dispatch context.
    bridge: Arc<BridgeContext>,
}

impl McpServer {
    /// Builds a server with the configured audit sink and no-op metrics.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Init`] when the audit log cannot be opened.
    pub fn from_config(
        config: &BridgeConfig,
        engine: SharedEngine,
    ) -> Result<Self, McpServerError> {
        let audit = build_audit_sink(&config.server.audit)?;
        Ok(Self::with_observability(config, engine, audit, Arc::new(NoopMetrics)))
    }

    /// Builds a server with explicit observability sinks.
    #[must_use]
    pub fn with_observability(
        config: &BridgeConfig,
        engine: SharedEngine,
        audit: Arc<dyn McpAuditSink>,
        metrics: Arc<dyn McpMetrics>,
    ) -> Self {
        let limits = ToolLimits {
            default_timeout_ms: config.engine.default_timeout_ms,
            max_timeout_ms: config.engine.max_timeout_ms,
        };
        let bridge = Arc::new(BridgeContext::new(
            engine,
            limits,
            config.server.error_detail,
            audit,
            metrics,
        ));
        Self {
            config: config.server.clone(),
            bridge,
        }
    }

    /// Returns the shared dispatch context.
    #[must_use]
    pub const fn bridge(&self) -> &Arc<BridgeContext> {
        &self.bridge
    }

    /// Serves the configured transport until EOF or shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when binding or transport I/O fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        match self.config.transport {
            ServerTransport::Stdio => {
                let mut reader = BufReader::new(tokio::io::stdin());
                let mut writer = tokio::io::stdout();
                run_stdio(&self.bridge, &mut reader, &mut writer, self.config.max_body_bytes).await
            }
            transport @ (ServerTransport::Sse | ServerTransport::Streamable) => {
                serve_http(&self.config, Arc::clone(&self.bridge), transport).await
            }
        }
    }
}

/// Builds the audit sink from configuration.
fn build_audit_sink(config: &ServerAuditConfig) -> Result<Arc<dyn McpAuditSink>, McpServerError> {
    if !config.enabled {
        return Ok(Arc::new(McpNoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = McpFileAuditSink::new(Path::new(path))
                .map_err(|err| McpServerError::Init(format!("audit log {path}: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(McpStderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Stdio Transport
// ============================================================================

/// One newline-delimited frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// Complete line without its terminator.
    Line(Vec<u8>),
    /// Line longer than the limit; its bytes were discarded.
    Oversize,
    /// End of input.
    Eof,
}

/// Reads one line, discarding (not buffering) lines over `max_bytes`.
pub(crate) async fn read_line_bounded<R>(reader: &mut R, max_bytes: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let mut oversize = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if oversize {
                Frame::Oversize
            } else if line.is_empty() {
                Frame::Eof
            } else {
                Frame::Line(line)
            });
        }
        let newline = available.iter().position(|byte| *byte == b'\n');
        let chunk = newline.map_or(available, |index| &available[.. index]);
        if !oversize {
            if line.len() + chunk.len() > max_bytes {
                oversize = true;
                line = Vec::new();
            } else {
                line.extend_from_slice(chunk);
            }
        }
        let consumed = newline.map_or(available.len(), |index| index + 1);
        reader.consume(consumed);
        if newline.is_some() {
            if oversize {
                return Ok(Frame::Oversize);
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(Frame::Line(line));
        }
    }
}

/// Runs the stdio loop until EOF; requests are handled one at a time.
pub(crate) async fn run_stdio<R, W>(
    bridge: &BridgeContext,
    reader: &mut R,
    writer: &mut W,
    max_bytes: usize,
) -> Result<(), McpServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let server = SessionServer::new();
    loop {
        let frame = read_line_bounded(reader, max_bytes)
            .await
            .map_err(|err| McpServerError::Transport(err.to_string()))?;
        let response = match frame {
            Frame::Eof => return Ok(()),
            Frame::Oversize => Some(error_payload(
                INVALID_REQUEST,
                "Invalid Request: message exceeds size limit",
            )),
            Frame::Line(line) if line.iter().all(u8::is_ascii_whitespace) => None,
            Frame::Line(line) => {
                let context = RequestContext::stdio().with_request_bytes(line.len());
                match serde_json::from_slice::<Value>(&line) {
                    Ok(payload) => server.handle_payload(bridge, &context, payload).await,
                    Err(_) => Some(error_payload(PARSE_ERROR, "Parse error")),
                }
            }
        };
        if let Some(response) = response {
            write_line(writer, &response).await?;
        }
    }
}

/// Writes one JSON line and flushes.
async fn write_line<W>(writer: &mut W, message: &Value) -> Result<(), McpServerError>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes =
        serde_json::to_vec(message).map_err(|err| McpServerError::Transport(err.to_string()))?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await.map_err(|err| McpServerError::Transport(err.to_string()))?;
    writer.flush().await.map_err(|err| McpServerError::Transport(err.to_string()))
}

// ============================================================================
// SECTION: HTTP Transports
// ============================================================================

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub(crate) struct HttpState {
    /// Session lifecycle.
    sessions: Arc<SessionManager>,
    /// Maximum request body size.
    max_body_bytes: usize,
}

impl HttpState {
    /// Creates handler state.
    pub(crate) const fn new(sessions: Arc<SessionManager>, max_body_bytes: usize) -> Self {
        Self {
            sessions,
            max_body_bytes,
        }
    }
}

/// Query string of `POST /messages`.
#[derive(Debug, Deserialize)]
pub(crate) struct MessagesQuery {
    /// Session id issued by the `endpoint` event.
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
}

/// Binds the listener and serves until ctrl-c.
async fn serve_http(
    config: &ServerConfig,
    bridge: Arc<BridgeContext>,
    transport: ServerTransport,
) -> Result<(), McpServerError> {
    let addr = config.bind_addr().map_err(|err| McpServerError::Config(err.to_string()))?;
    let sessions = Arc::new(SessionManager::new(
        bridge,
        config.sessions.max_sessions,
        Duration::from_millis(config.sessions.idle_timeout_ms),
    ));
    let sweeper =
        sessions.spawn_sweeper(Duration::from_millis(config.sessions.sweep_interval_ms));
    let state = HttpState::new(Arc::clone(&sessions), config.max_body_bytes);
    let app = build_router(state, transport);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| McpServerError::Transport(format!("bind {addr}: {err}")))?;
    let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| McpServerError::Transport(err.to_string()));
    sweeper.abort();
    sessions.close_all(CloseReason::Shutdown);
    served
}

/// Resolves on ctrl-c.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Builds the axum router for an HTTP transport.
pub(crate) fn build_router(state: HttpState, transport: ServerTransport) -> Router {
    let routes = match transport {
        ServerTransport::Streamable => Router::new().route(
            MCP_PATH,
            post(handle_mcp_post).get(handle_mcp_get).delete(handle_mcp_delete),
        ),
        ServerTransport::Sse => Router::new()
            .route(SSE_PATH, get(handle_sse_get))
            .route(MESSAGES_PATH, post(handle_sse_post)),
        ServerTransport::Stdio => Router::new(),
    };
    let body_limit = state.max_body_bytes;
    routes
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer())
        .with_state(state)
}

/// CORS policy: any origin, MCP methods, session header exposed.
fn cors_layer() -> CorsLayer {
    let session_header = HeaderName::from_static(SESSION_HEADER);
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            session_header.clone(),
            HeaderName::from_static("last-event-id"),
        ])
        .expose_headers([session_header])
}

/// Handles `POST /mcp`.
pub(crate) async fn handle_mcp_post(
    State(state): State<HttpState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > state.max_body_bytes {
        return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
    }
    let existing = if headers.contains_key(SESSION_HEADER) {
        match state.sessions.lookup(session_header(&headers)) {
            Some(session) => Some(session),
            None => return text_response(StatusCode::NOT_FOUND, UNKNOWN_SESSION_MESSAGE),
        }
    } else {
        None
    };
    let Ok(mut payload) = serde_json::from_slice::<Value>(&body) else {
        return json_response(StatusCode::BAD_REQUEST, error_payload(PARSE_ERROR, "Parse error"));
    };
    let caller = CallerMetadata::from_http(Some(peer), &headers);
    enrich_payload(&mut payload, &caller);
    let context =
        RequestContext::http(ServerTransport::Streamable, &caller).with_request_bytes(body.len());

    if let Some(session) = existing {
        if is_initialize_request(&payload) {
            return json_response(
                StatusCode::BAD_REQUEST,
                error_payload(INVALID_REQUEST, "Invalid Request: Server already initialized"),
            );
        }
        return match dispatch(&state.sessions, session, context, payload).await {
            Ok(Some(response)) => json_response(StatusCode::OK, response),
            Ok(None) => StatusCode::ACCEPTED.into_response(),
            Err(response) => response,
        };
    }

    if !is_initialize_request(&payload) {
        return text_response(StatusCode::BAD_REQUEST, MISSING_SESSION_MESSAGE);
    }
    let session = match state.sessions.open(ServerTransport::Streamable) {
        Ok(session) => session,
        Err(err) => return session_open_failure(&err),
    };
    let id = session.id().clone();
    match dispatch(&state.sessions, Arc::clone(&session), context, payload).await {
        Ok(Some(response)) if !is_error_response(&response) => {
            let mut http = json_response(StatusCode::OK, response);
            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                http.headers_mut().insert(SESSION_HEADER, value);
            }
            http
        }
        Ok(response) => {
            state.sessions.close_session(&id, CloseReason::InitializeFailed);
            let body = response.unwrap_or_else(|| {
                error_payload(INVALID_REQUEST, "Invalid Request: initialize failed")
            });
            json_response(StatusCode::BAD_REQUEST, body)
        }
        Err(response) => {
            state.sessions.close_session(&id, CloseReason::InitializeFailed);
            response
        }
    }
}

/// Handles `GET /mcp` by attaching the session's server-to-client stream.
pub(crate) async fn handle_mcp_get(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Response {
    let Some(session) = state.sessions.lookup(session_header(&headers)) else {
        return text_response(StatusCode::NOT_FOUND, UNKNOWN_SESSION_MESSAGE);
    };
    let Some(receiver) = session.take_stream() else {
        return text_response(
            StatusCode::CONFLICT,
            "Conflict: Only one SSE stream is allowed per session",
        );
    };
    let guard = DisconnectGuard::new(Arc::clone(&state.sessions), session.id().clone());
    let stream = ReceiverStream::new(receiver).map(move |message| {
        let _ = &guard;
        Ok::<Event, Infallible>(Event::default().event("message").data(message.to_string()))
    });
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// Handles `DELETE /mcp`.
pub(crate) async fn handle_mcp_delete(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Response {
    let Some(session) = state.sessions.lookup(session_header(&headers)) else {
        return text_response(StatusCode::NOT_FOUND, UNKNOWN_SESSION_MESSAGE);
    };
    if state.sessions.close_session(session.id(), CloseReason::ClientRequested) {
        StatusCode::OK.into_response()
    } else {
        text_response(StatusCode::NOT_FOUND, UNKNOWN_SESSION_MESSAGE)
    }
}

/// Handles `GET /sse` by opening a session and announcing its endpoint.
pub(crate) async fn handle_sse_get(State(state): State<HttpState>) -> Response {
    let session = match state.sessions.open(ServerTransport::Sse) {
        Ok(session) => session,
        Err(err) => return session_open_failure(&err),
    };
    let Some(receiver) = session.take_stream() else {
        state.sessions.close_session(session.id(), CloseReason::InitializeFailed);
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE);
    };
    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{MESSAGES_PATH}?sessionId={}", session.id()));
    let guard = DisconnectGuard::new(Arc::clone(&state.sessions), session.id().clone());
    let messages = ReceiverStream::new(receiver).map(move |message| {
        let _ = &guard;
        Ok::<Event, Infallible>(Event::default().event("message").data(message.to_string()))
    });
    let stream = tokio_stream::once(Ok::<Event, Infallible>(endpoint)).chain(messages);
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// Handles `POST /messages`; responses are delivered on the session stream.
pub(crate) async fn handle_sse_post(
    State(state): State<HttpState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<MessagesQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > state.max_body_bytes {
        return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
    }
    let Some(session) = state.sessions.lookup(query.session_id.as_deref()) else {
        return text_response(StatusCode::NOT_FOUND, "Session not found");
    };
    let Ok(mut payload) = serde_json::from_slice::<Value>(&body) else {
        return json_response(StatusCode::BAD_REQUEST, error_payload(PARSE_ERROR, "Parse error"));
    };
    let caller = CallerMetadata::from_http(Some(peer), &headers);
    enrich_payload(&mut payload, &caller);
    let context = RequestContext::http(ServerTransport::Sse, &caller)
        .with_request_bytes(body.len())
        .with_session_ref(session.id().audit_ref());
    let sessions = Arc::clone(&state.sessions);
    tokio::spawn(async move {
        let response = session.server().handle_payload(sessions.bridge(), &context, payload).await;
        if let Some(response) = response {
            let _ = session.send(response).await;
        }
    });
    text_response(StatusCode::ACCEPTED, "Accepted")
}

/// Handles unmatched routes.
pub(crate) async fn handle_not_found(method: Method, uri: Uri) -> Response {
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    let body = json!({
        "error": "Not Found",
        "message": format!("Route {method} {} not found", uri.path()),
        "timestamp": timestamp,
    });
    json_response(StatusCode::NOT_FOUND, body)
}

/// Runs one payload on a session in its own task.
///
/// A panicking dispatch surfaces as a 500 rather than a dropped connection.
async fn dispatch(
    sessions: &Arc<SessionManager>,
    session: Arc<Session>,
    context: RequestContext,
    payload: Value,
) -> Result<Option<Value>, Response> {
    let context = context.with_session_ref(session.id().audit_ref());
    let sessions = Arc::clone(sessions);
    tokio::spawn(async move {
        session.server().handle_payload(sessions.bridge(), &context, payload).await
    })
    .await
    .map_err(|_| text_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE))
}

/// Reads the session header as text.
fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|value| value.to_str().ok())
}

/// Maps a failed session open to its HTTP response.
fn session_open_failure(err: &SessionError) -> Response {
    match err {
        SessionError::CapacityExceeded {
            ..
        } => text_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable: session limit reached",
        ),
        SessionError::UnknownSession | SessionError::DuplicateId | SessionError::Unavailable => {
            text_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
        }
    }
}

/// Builds a plain-text response.
fn text_response(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

/// Builds a JSON response.
fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}
