// crates/sandbox-bridge-core/src/interfaces/mod.rs
// ============================================================================
// Module: Sandbox Bridge Interfaces
// Description: Backend-agnostic execution engine capability interface.
// Purpose: Define the contract the MCP bridge uses to reach an engine.
// Dependencies: async-trait, thiserror, crate::core
// ============================================================================

//! ## Overview
//! The bridge never touches the sandbox directly. Every tool and resource
//! operation goes through [`ExecutionEngine`], a narrow async capability that
//! an embedded interpreter, a subprocess runner, or a test fake can satisfy.
//! Implementations must confine filesystem access to registered mount roots
//! and fail closed on unknown mounts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::execution::ExecutionOutput;
use crate::core::execution::MediaContent;
use crate::core::execution::MountPointInfo;
use crate::core::execution::PackageInstallReport;
use crate::core::execution::UploadReceipt;
use crate::core::identifiers::MountName;
use crate::core::resources::RelativePath;
use crate::core::resources::ResourceAddress;
use crate::core::resources::ResourceBytes;
use crate::core::resources::ResourceDescriptor;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Execution engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Engine was used before initialization.
    #[error("execution engine is not initialized")]
    NotInitialized,
    /// Mount name is not registered.
    #[error("unknown mount point: {0}")]
    UnknownMount(String),
    /// Path is invalid or leaves the mount root.
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// File does not exist.
    #[error("file not found: {0}")]
    NotFound(String),
    /// File is not an image or audio file.
    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),
    /// Execution exceeded its deadline.
    #[error("execution timed out after {timeout_ms} ms")]
    Timeout {
        /// Deadline that was exceeded.
        timeout_ms: u64,
    },
    /// Package spec was rejected.
    #[error("invalid package specification: {0}")]
    InvalidPackage(String),
    /// Package installer reported failure.
    #[error("package installation failed: {0}")]
    InstallFailed(String),
    /// Capability is not available in this engine.
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    /// Host I/O failure.
    #[error("io error: {0}")]
    Io(String),
    /// Engine backend failure.
    #[error("engine backend error: {0}")]
    Backend(String),
}

impl EngineError {
    /// Returns true when the message is safe to show to remote callers.
    ///
    /// I/O and backend failures may carry host paths or internal state.
    #[must_use]
    pub const fn is_caller_safe(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Backend(_))
    }

    /// Returns a stable label for audit and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::UnknownMount(_) => "unknown_mount",
            Self::InvalidPath(_) => "invalid_path",
            Self::NotFound(_) => "not_found",
            Self::UnsupportedMedia(_) => "unsupported_media",
            Self::Timeout {
                ..
            } => "timeout",
            Self::InvalidPackage(_) => "invalid_package",
            Self::InstallFailed(_) => "install_failed",
            Self::Unavailable(_) => "unavailable",
            Self::Io(_) => "io",
            Self::Backend(_) => "backend",
        }
    }
}

// ============================================================================
// SECTION: Execution Engine
// ============================================================================

/// Shared handle to an execution engine.
pub type SharedEngine = Arc<dyn ExecutionEngine>;

/// Sandboxed execution engine capability.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Prepares the engine using `cache_dir` for downloaded artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the engine cannot start.
    async fn initialize(&self, cache_dir: &Path) -> Result<(), EngineError>;

    /// Registers a host directory under a mount name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the directory cannot be opened.
    async fn mount_directory(&self, name: &MountName, host_path: &Path)
    -> Result<(), EngineError>;

    /// Executes code with a deadline in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Timeout`] when the deadline passes, or another
    /// [`EngineError`] when execution cannot start.
    async fn execute(&self, code: &str, timeout_ms: u64) -> Result<ExecutionOutput, EngineError>;

    /// Installs one or more whitespace-separated package specs.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when a spec is rejected or installation fails.
    async fn install_package(&self, spec: &str) -> Result<PackageInstallReport, EngineError>;

    /// Lists registered mounts.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the engine is not ready.
    async fn list_mount_points(&self) -> Result<Vec<MountPointInfo>, EngineError>;

    /// Lists files under every mount as resources.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when a mount cannot be walked.
    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, EngineError>;

    /// Reads a file inside a mount.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the mount is unknown or the file is missing.
    async fn read_resource(
        &self,
        mount: &MountName,
        path: &RelativePath,
    ) -> Result<ResourceBytes, EngineError>;

    /// Reads an image or audio file inside a mount.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnsupportedMedia`] for non-media files.
    async fn read_media(
        &self,
        mount: &MountName,
        path: &RelativePath,
    ) -> Result<MediaContent, EngineError>;

    /// Uploads a mounted file and returns its download location.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the file or upload backend is unavailable.
    async fn upload_file(
        &self,
        mount: &MountName,
        path: &RelativePath,
    ) -> Result<UploadReceipt, EngineError>;

    /// Returns true when `name` is a registered mount.
    fn has_mount(&self, name: &MountName) -> bool;

    /// Parses a resource URI and checks its mount is registered.
    fn resolve_uri(&self, uri: &str) -> Option<ResourceAddress> {
        let address = ResourceAddress::parse(uri).ok()?;
        self.has_mount(&address.mount).then_some(address)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
