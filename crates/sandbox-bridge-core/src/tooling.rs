// crates/sandbox-bridge-core/src/tooling.rs
// ============================================================================
// Module: Tooling Identifiers
// Description: Canonical MCP tool identifiers for Sandbox Bridge.
// Purpose: Shared tool naming across the registry, dispatcher, and telemetry.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Canonical tool identifiers used by the Sandbox Bridge MCP surface.
//! These names are part of the external contract surface.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Canonical tool names for Sandbox Bridge MCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolName {
    /// Execute submitted code inside the engine.
    ExecuteCode,
    /// Install packages into the engine environment.
    InstallPackages,
    /// List mounted directories.
    GetMountPoints,
    /// Read an image or audio file from a mount point.
    ReadMedia,
    /// Upload a mounted file and return a download URL.
    UploadFile,
}

impl ToolName {
    /// Returns the canonical string name for the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExecuteCode => "execute-code",
            Self::InstallPackages => "install-packages",
            Self::GetMountPoints => "get-mount-points",
            Self::ReadMedia => "read-media",
            Self::UploadFile => "upload-file",
        }
    }

    /// Returns all tool names in canonical order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ExecuteCode,
            Self::InstallPackages,
            Self::GetMountPoints,
            Self::ReadMedia,
            Self::UploadFile,
        ]
    }

    /// Parses a tool name from its string representation.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "execute-code" => Some(Self::ExecuteCode),
            "install-packages" => Some(Self::InstallPackages),
            "get-mount-points" => Some(Self::GetMountPoints),
            "read-media" => Some(Self::ReadMedia),
            "upload-file" => Some(Self::UploadFile),
            _ => None,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
