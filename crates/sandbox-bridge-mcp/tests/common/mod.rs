// crates/sandbox-bridge-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures for MCP integration tests.
// Purpose: Provide a call-counting engine and bridge builders.
// Dependencies: sandbox-bridge-core, sandbox-bridge-mcp
// ============================================================================

//! ## Overview
//! [`FakeEngine`] records every capability call so tests can assert that
//! invalid input never reaches the engine. Its single mount is `data`,
//! holding `sub/file.png` and `notes.txt`.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sandbox_bridge_core::EngineError;
use sandbox_bridge_core::ExecutionEngine;
use sandbox_bridge_core::ExecutionOutput;
use sandbox_bridge_core::MediaContent;
use sandbox_bridge_core::MediaKind;
use sandbox_bridge_core::MountName;
use sandbox_bridge_core::MountPointInfo;
use sandbox_bridge_core::PackageInstallReport;
use sandbox_bridge_core::RelativePath;
use sandbox_bridge_core::ResourceBytes;
use sandbox_bridge_core::ResourceDescriptor;
use sandbox_bridge_core::UploadReceipt;
use sandbox_bridge_mcp::BridgeContext;
use sandbox_bridge_mcp::McpAuditEvent;
use sandbox_bridge_mcp::McpAuditSink;
use sandbox_bridge_mcp::NoopMetrics;
use sandbox_bridge_mcp::SessionAuditEvent;
use sandbox_bridge_mcp::SessionManager;
use sandbox_bridge_mcp::ToolLimits;
use sandbox_bridge_mcp::config::ErrorDetail;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result type for integration tests.
pub type TestResult = Result<(), String>;

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `execute(code, timeout_ms)`.
    Execute(String, u64),
    /// `install_package(spec)`.
    Install(String),
    /// `list_mount_points()`.
    ListMounts,
    /// `list_resources()`.
    ListResources,
    /// `read_resource(mount, path)`.
    ReadResource(String, String),
    /// `read_media(mount, path)`.
    ReadMedia(String, String),
    /// `upload_file(mount, path)`.
    Upload(String, String),
}

/// Engine that records calls and serves a fixed `data` mount.
#[derive(Default)]
pub struct FakeEngine {
    /// Calls in arrival order.
    calls: Mutex<Vec<EngineCall>>,
    /// Error returned by `execute` when set.
    execute_error: Mutex<Option<EngineError>>,
    /// Exit code returned by `execute`.
    exit_code: Mutex<Option<i32>>,
}

impl FakeEngine {
    /// Creates a shared fake engine.
    pub fn shared() -> Arc<Self> {
        let engine = Self::default();
        *engine.exit_code.lock().unwrap() = Some(0);
        Arc::new(engine)
    }

    /// Returns recorded calls.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Makes `execute` fail with `error`.
    pub fn fail_execute(&self, error: EngineError) {
        *self.execute_error.lock().unwrap() = Some(error);
    }

    /// Makes `execute` report `code` as the exit status.
    pub fn set_exit_code(&self, code: i32) {
        *self.exit_code.lock().unwrap() = Some(code);
    }

    /// Appends a call.
    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Accepts only the `data` mount.
    fn check_mount(mount: &MountName) -> Result<(), EngineError> {
        if mount.as_str() == "data" {
            Ok(())
        } else {
            Err(EngineError::UnknownMount(mount.as_str().to_string()))
        }
    }
}

#[async_trait]
impl ExecutionEngine for FakeEngine {
    async fn initialize(&self, _cache_dir: &Path) -> Result<(), EngineError> {
        Ok(())
    }

    async fn mount_directory(&self, _name: &MountName, _path: &Path) -> Result<(), EngineError> {
        Ok(())
    }

    async fn execute(&self, code: &str, timeout_ms: u64) -> Result<ExecutionOutput, EngineError> {
        self.record(EngineCall::Execute(code.to_string(), timeout_ms));
        if let Some(error) = self.execute_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(ExecutionOutput {
            stdout: "hello\n".to_string(),
            stderr: String::new(),
            exit_code: *self.exit_code.lock().unwrap(),
        })
    }

    async fn install_package(&self, spec: &str) -> Result<PackageInstallReport, EngineError> {
        self.record(EngineCall::Install(spec.to_string()));
        Ok(PackageInstallReport {
            packages: spec.split_whitespace().map(str::to_string).collect(),
            output: "Successfully installed".to_string(),
        })
    }

    async fn list_mount_points(&self) -> Result<Vec<MountPointInfo>, EngineError> {
        self.record(EngineCall::ListMounts);
        Ok(vec![MountPointInfo {
            name: "data".to_string(),
            path: "/srv/data".to_string(),
        }])
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, EngineError> {
        self.record(EngineCall::ListResources);
        Ok(vec![
            ResourceDescriptor {
                uri: "resource://data/notes.txt".to_string(),
                name: "notes.txt".to_string(),
                mime_type: "text/plain".to_string(),
            },
            ResourceDescriptor {
                uri: "resource://data/sub/file.png".to_string(),
                name: "file.png".to_string(),
                mime_type: "image/png".to_string(),
            },
        ])
    }

    async fn read_resource(
        &self,
        mount: &MountName,
        path: &RelativePath,
    ) -> Result<ResourceBytes, EngineError> {
        self.record(EngineCall::ReadResource(
            mount.as_str().to_string(),
            path.as_str().to_string(),
        ));
        Self::check_mount(mount)?;
        match path.as_str() {
            "notes.txt" => Ok(ResourceBytes {
                data: b"hello".to_vec(),
                mime_type: "text/plain".to_string(),
            }),
            "broken.bin" => Err(EngineError::Io("/srv/data/broken.bin: EIO".to_string())),
            other => Err(EngineError::NotFound(other.to_string())),
        }
    }

    async fn read_media(
        &self,
        mount: &MountName,
        path: &RelativePath,
    ) -> Result<MediaContent, EngineError> {
        self.record(EngineCall::ReadMedia(mount.as_str().to_string(), path.as_str().to_string()));
        Self::check_mount(mount)?;
        if path.as_str() == "sub/file.png" {
            Ok(MediaContent {
                kind: MediaKind::Image,
                data: vec![0x89, b'P', b'N', b'G'],
                mime_type: "image/png".to_string(),
            })
        } else {
            Err(EngineError::NotFound(path.as_str().to_string()))
        }
    }

    async fn upload_file(
        &self,
        mount: &MountName,
        path: &RelativePath,
    ) -> Result<UploadReceipt, EngineError> {
        self.record(EngineCall::Upload(mount.as_str().to_string(), path.as_str().to_string()));
        Self::check_mount(mount)?;
        Ok(UploadReceipt {
            url: format!("https://files.example.test/{}", path.as_str()),
        })
    }

    fn has_mount(&self, name: &MountName) -> bool {
        name.as_str() == "data"
    }
}

/// Audit sink that keeps serialized events.
#[derive(Default)]
pub struct RecordingAudit {
    /// Request events as JSON.
    pub requests: Mutex<Vec<serde_json::Value>>,
    /// Session events as JSON.
    pub sessions: Mutex<Vec<serde_json::Value>>,
}

impl McpAuditSink for RecordingAudit {
    /// Appends a call.
    fn record(&self, event: &McpAuditEvent) {
        self.requests.lock().unwrap().push(serde_json::to_value(event).unwrap());
    }

    fn record_session(&self, event: &SessionAuditEvent) {
        self.sessions.lock().unwrap().push(serde_json::to_value(event).unwrap());
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds a bridge context over `engine`.
pub fn bridge(
    engine: Arc<FakeEngine>,
    detail: ErrorDetail,
    audit: Arc<RecordingAudit>,
) -> Arc<BridgeContext> {
    Arc::new(BridgeContext::new(
        engine,
        ToolLimits::default(),
        detail,
        audit,
        Arc::new(NoopMetrics),
    ))
}

/// Builds a session manager over a fresh fake engine.
pub fn session_manager(
    max_sessions: usize,
    idle_timeout: Duration,
) -> (Arc<SessionManager>, Arc<RecordingAudit>) {
    let audit = Arc::new(RecordingAudit::default());
    let context = bridge(FakeEngine::shared(), ErrorDetail::Redacted, Arc::clone(&audit));
    (Arc::new(SessionManager::new(context, max_sessions, idle_timeout)), audit)
}
