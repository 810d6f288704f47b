// crates/sandbox-bridge-core/src/core/execution.rs
// ============================================================================
// Module: Execution Results
// Description: Result payloads returned by execution engines.
// Purpose: Carry engine outcomes to the dispatcher without transport coupling.
// Dependencies: serde, crate::core::media
// ============================================================================

//! ## Overview
//! Plain records an engine hands back: process output, install reports,
//! mount listings, media payloads, and upload receipts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::media::MediaKind;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Captured output of a code execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit status; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ExecutionOutput {
    /// Returns true when the execution completed with exit status zero.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Outcome of a package installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInstallReport {
    /// Package specs that were installed.
    pub packages: Vec<String>,
    /// Installer output.
    pub output: String,
}

/// Mounted directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPointInfo {
    /// Mount name.
    pub name: String,
    /// Host path of the mount root.
    pub path: String,
}

/// Media file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaContent {
    /// Media class.
    pub kind: MediaKind,
    /// Raw file bytes.
    pub data: Vec<u8>,
    /// MIME type.
    pub mime_type: String,
}

/// Receipt returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Download URL for the uploaded object.
    pub url: String,
}
