// crates/sandbox-bridge-mcp/src/session.rs
// ============================================================================
// Module: MCP Session Management
// Description: Session ids, the session registry, and lifecycle policy.
// Purpose: Bind HTTP exchanges to per-client protocol state.
// Dependencies: base64, rand, tokio
// ============================================================================

//! ## Overview
//! Sessions move through `no-session -> initializing -> active -> closed`.
//! [`SessionRegistry`] is the only owner of the id table; every operation on
//! it holds one synchronous lock, so a capacity check and its insert cannot
//! interleave with another request. [`SessionManager::close_session`] is the
//! single removal path used by explicit DELETE, stream disconnect, idle
//! eviction, and failed initialization; repeating it is a no-op.
//!
//! Security posture: session ids are bearer credentials. They carry 256 bits
//! from the OS RNG and only an 8-character prefix is ever logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audit::SessionAction;
use crate::audit::SessionAuditEvent;
use crate::config::ServerTransport;
use crate::protocol::BridgeContext;
use crate::protocol::SessionServer;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Random bytes per session id.
const SESSION_ID_BYTES: usize = 32;
/// Encoded length of a session id.
pub const SESSION_ID_LENGTH: usize = 43;
/// Characters of the id used in logs.
const AUDIT_REF_LENGTH: usize = 8;
/// Outbound stream buffer per session.
const OUTBOUND_BUFFER: usize = 64;

// ============================================================================
// SECTION: Session Id
// ============================================================================

/// Opaque, unguessable session identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Mints a fresh id from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0_u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Parses a client-supplied id; malformed ids are rejected outright.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = raw.len() == SESSION_ID_LENGTH
            && raw.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_');
        well_formed.then(|| Self(raw.to_string()))
    }

    /// Returns the full id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the loggable id prefix.
    #[must_use]
    pub fn audit_ref(&self) -> String {
        self.0.chars().take(AUDIT_REF_LENGTH).collect()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}..)", self.audit_ref())
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// One live client session.
pub struct Session {
    /// Session id.
    id: SessionId,
    /// Transport that created the session.
    transport: ServerTransport,
    /// Per-session protocol state.
    server: SessionServer,
    /// Sender for server-to-client stream messages.
    outbound: Mutex<Option<mpsc::Sender<Value>>>,
    /// Receiver handed to the first stream that attaches.
    pending_stream: Mutex<Option<mpsc::Receiver<Value>>>,
    /// Last time the session was looked up.
    last_seen: Mutex<Instant>,
    /// False once closed.
    live: AtomicBool,
    /// True while a stream is attached.
    streaming: AtomicBool,
}

impl Session {
    /// Creates a session with an unattached outbound stream.
    fn new(id: SessionId, transport: ServerTransport) -> Self {
        let (sender, receiver) = mpsc::channel(OUTBOUND_BUFFER);
        Self {
            id,
            transport,
            server: SessionServer::new(),
            outbound: Mutex::new(Some(sender)),
            pending_stream: Mutex::new(Some(receiver)),
            last_seen: Mutex::new(Instant::now()),
            live: AtomicBool::new(true),
            streaming: AtomicBool::new(false),
        }
    }

    /// Returns the session id.
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the owning transport.
    #[must_use]
    pub const fn transport(&self) -> ServerTransport {
        self.transport
    }

    /// Returns the protocol server.
    #[must_use]
    pub const fn server(&self) -> &SessionServer {
        &self.server
    }

    /// Returns true until the session is closed.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Returns true while a stream is attached.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Takes the outbound receiver; `None` when a stream already attached.
    #[must_use]
    pub fn take_stream(&self) -> Option<mpsc::Receiver<Value>> {
        let receiver = self.pending_stream.lock().ok()?.take()?;
        self.streaming.store(true, Ordering::Release);
        Some(receiver)
    }

    /// Queues a message on the outbound stream.
    ///
    /// Returns false when the session is closed or the stream is gone.
    pub async fn send(&self, message: Value) -> bool {
        let sender = self.outbound.lock().ok().and_then(|guard| guard.as_ref().cloned());
        match sender {
            Some(sender) => sender.send(message).await.is_ok(),
            None => false,
        }
    }

    /// Records activity.
    fn touch(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Instant::now();
        }
    }

    /// Returns how long the session has been idle.
    fn idle_for(&self, now: Instant) -> Duration {
        self.last_seen
            .lock()
            .map_or(Duration::ZERO, |last_seen| now.saturating_duration_since(*last_seen))
    }

    /// Marks the session closed and ends its outbound stream.
    fn close(&self) {
        self.live.store(false, Ordering::Release);
        self.streaming.store(false, Ordering::Release);
        if let Ok(mut outbound) = self.outbound.lock() {
            outbound.take();
        }
        if let Ok(mut pending) = self.pending_stream.lock() {
            pending.take();
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Session registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Id is not registered.
    #[error("unknown session")]
    UnknownSession,
    /// Session cap reached.
    #[error("session capacity exceeded ({max} sessions)")]
    CapacityExceeded {
        /// Configured cap.
        max: usize,
    },
    /// Id already registered.
    #[error("duplicate session id")]
    DuplicateId,
    /// Session table lock was poisoned by a panicking holder.
    #[error("session table unavailable")]
    Unavailable,
}

/// Id-keyed session table.
pub struct SessionRegistry {
    /// Live sessions.
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    /// Maximum concurrent sessions.
    max_sessions: usize,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Registers a session; returns the new session count.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CapacityExceeded`] at the cap and
    /// [`SessionError::DuplicateId`] when the id is taken.
    /// Returns [`SessionError::Unavailable`] when the table lock is poisoned.
    pub fn insert(&self, session: Arc<Session>) -> Result<usize, SessionError> {
        let mut sessions = self.sessions.lock().map_err(|_| SessionError::Unavailable)?;
        if sessions.contains_key(session.id()) {
            return Err(SessionError::DuplicateId);
        }
        if sessions.len() >= self.max_sessions {
            return Err(SessionError::CapacityExceeded {
                max: self.max_sessions,
            });
        }
        sessions.insert(session.id().clone(), session);
        Ok(sessions.len())
    }

    /// Looks up a live session and records activity.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        let session = self.sessions.lock().ok()?.get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Removes a session; returns it with the remaining count.
    pub fn remove(&self, id: &SessionId) -> Option<(Arc<Session>, usize)> {
        let mut sessions = self.sessions.lock().ok()?;
        let session = sessions.remove(id)?;
        Some((session, sessions.len()))
    }

    /// Returns the number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().map_or(0, |sessions| sessions.len())
    }

    /// Returns true when no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every registered id.
    #[must_use]
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions
            .lock()
            .map_or_else(|_| Vec::new(), |sessions| sessions.keys().cloned().collect())
    }

    /// Returns ids idle longer than `ttl` that have no attached stream.
    #[must_use]
    pub fn idle_ids(&self, now: Instant, ttl: Duration) -> Vec<SessionId> {
        self.sessions.lock().map_or_else(
            |_| Vec::new(),
            |sessions| {
                sessions
                    .values()
                    .filter(|session| !session.is_streaming() && session.idle_for(now) >= ttl)
                    .map(|session| session.id().clone())
                    .collect()
            },
        )
    }
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Reason a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent DELETE.
    ClientRequested,
    /// Stream connection dropped.
    Disconnected,
    /// Idle timeout elapsed.
    IdleTimeout,
    /// The initialize exchange failed.
    InitializeFailed,
    /// Server is shutting down.
    Shutdown,
}

impl CloseReason {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientRequested => "client_requested",
            Self::Disconnected => "disconnected",
            Self::IdleTimeout => "idle_timeout",
            Self::InitializeFailed => "initialize_failed",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Session lifecycle policy over the registry.
pub struct SessionManager {
    /// Session table.
    registry: SessionRegistry,
    /// Shared dispatch context.
    bridge: Arc<BridgeContext>,
    /// Idle timeout.
    idle_timeout: Duration,
}

impl SessionManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(bridge: Arc<BridgeContext>, max_sessions: usize, idle_timeout: Duration) -> Self {
        Self {
            registry: SessionRegistry::new(max_sessions),
            bridge,
            idle_timeout,
        }
    }

    /// Returns the shared dispatch context.
    #[must_use]
    pub fn bridge(&self) -> &BridgeContext {
        &self.bridge
    }

    /// Returns the number of open sessions.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CapacityExceeded`] at the session cap.
    pub fn open(&self, transport: ServerTransport) -> Result<Arc<Session>, SessionError> {
        let session = Arc::new(Session::new(SessionId::generate(), transport));
        let active = self.registry.insert(Arc::clone(&session))?;
        self.bridge.audit.record_session(&SessionAuditEvent::new(
            session.id().audit_ref(),
            transport,
            SessionAction::Opened,
            None,
            active,
        ));
        Ok(session)
    }

    /// Resolves a raw session header to a live session.
    #[must_use]
    pub fn lookup(&self, raw: Option<&str>) -> Option<Arc<Session>> {
        let id = SessionId::parse(raw?)?;
        self.registry.get(&id).filter(|session| session.is_live())
    }

    /// Closes a session; returns false when it was already gone.
    pub fn close_session(&self, id: &SessionId, reason: CloseReason) -> bool {
        let Some((session, active)) = self.registry.remove(id) else {
            return false;
        };
        session.close();
        self.bridge.audit.record_session(&SessionAuditEvent::new(
            id.audit_ref(),
            session.transport(),
            SessionAction::Closed,
            Some(reason.as_str()),
            active,
        ));
        true
    }

    /// Closes sessions idle past the timeout; returns how many closed.
    pub fn evict_idle(&self) -> usize {
        self.registry
            .idle_ids(Instant::now(), self.idle_timeout)
            .iter()
            .filter(|id| self.close_session(id, CloseReason::IdleTimeout))
            .count()
    }

    /// Closes every open session.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        self.registry.ids().iter().filter(|id| self.close_session(id, reason)).count()
    }

    /// Starts the idle sweeper; it stops once the manager is dropped.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.evict_idle();
            }
        })
    }
}

/// Closes a session when the owning stream is dropped.
pub struct DisconnectGuard {
    /// Session manager.
    manager: Arc<SessionManager>,
    /// Session bound to the stream.
    id: SessionId,
}

impl DisconnectGuard {
    /// Binds a guard to a session.
    #[must_use]
    pub const fn new(manager: Arc<SessionManager>, id: SessionId) -> Self {
        Self {
            manager,
            id,
        }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.manager.close_session(&self.id, CloseReason::Disconnected);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
