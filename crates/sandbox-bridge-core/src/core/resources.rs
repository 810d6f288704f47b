// crates/sandbox-bridge-core/src/core/resources.rs
// ============================================================================
// Module: Resource Addressing
// Description: Resource URIs, mount-relative paths, and resource descriptors.
// Purpose: Decompose `resource://<mount>/<path>` without escaping mount roots.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Resources are addressed as `resource://<mountName>/<relativePath>`. The
//! relative path is normalized lexically: empty and `.` segments are dropped,
//! `..` pops a prior segment and fails when it would climb above the mount
//! root. Absolute paths, backslashes, and NUL bytes are rejected outright.
//! A [`RelativePath`] can therefore be joined under a mount root without any
//! further checks on its shape; the engine still confines the actual
//! filesystem access to the mount directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::IdentifierError;
use crate::core::identifiers::MountName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// URI scheme prefix for mounted resources.
pub const RESOURCE_URI_PREFIX: &str = "resource://";

/// Maximum normalized relative path length in bytes.
pub const MAX_RELATIVE_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Resource address parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// URI does not use the resource scheme.
    #[error("uri must start with {RESOURCE_URI_PREFIX}")]
    WrongScheme,
    /// URI has no mount name.
    #[error("mount name is empty")]
    EmptyMount,
    /// Mount name failed validation.
    #[error("mount name {0}")]
    InvalidMount(IdentifierError),
    /// Path is empty after normalization.
    #[error("path is empty")]
    EmptyPath,
    /// Path is absolute.
    #[error("path must be relative")]
    Absolute,
    /// Path contains a forbidden character.
    #[error("path contains a forbidden character")]
    ForbiddenCharacter,
    /// Path climbs above the mount root.
    #[error("path escapes the mount root")]
    EscapesRoot,
    /// Path exceeds the length limit.
    #[error("path exceeds {MAX_RELATIVE_PATH_LENGTH} bytes")]
    TooLong,
}

// ============================================================================
// SECTION: Relative Path
// ============================================================================

/// Normalized, non-empty path relative to a mount root.
///
/// Segments are joined with `/` and never contain `.` or `..`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativePath(String);

impl RelativePath {
    /// Returns the normalized path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the path segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Returns the final segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Normalizes a caller-supplied path relative to a mount root.
///
/// # Errors
///
/// Returns [`AddressError`] when the path is absolute, contains a backslash or
/// NUL byte, climbs above the root, is empty, or is too long.
pub fn normalize_relative_path(raw: &str) -> Result<RelativePath, AddressError> {
    if raw.starts_with('/') {
        return Err(AddressError::Absolute);
    }
    normalize_segments(raw)
}

/// Lexically normalizes `/`-separated segments.
fn normalize_segments(raw: &str) -> Result<RelativePath, AddressError> {
    if raw.contains(['\\', '\0']) {
        return Err(AddressError::ForbiddenCharacter);
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(AddressError::EscapesRoot);
                }
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(AddressError::EmptyPath);
    }
    let joined = segments.join("/");
    if joined.len() > MAX_RELATIVE_PATH_LENGTH {
        return Err(AddressError::TooLong);
    }
    Ok(RelativePath(joined))
}

// ============================================================================
// SECTION: Resource Address
// ============================================================================

/// Decomposed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAddress {
    /// Mount name (first URI segment).
    pub mount: MountName,
    /// Normalized path inside the mount.
    pub path: RelativePath,
}

impl ResourceAddress {
    /// Parses a `resource://<mount>/<path>` URI.
    ///
    /// Paths are taken verbatim; percent-encoding is not decoded.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] when the scheme, mount name, or path is invalid.
    pub fn parse(uri: &str) -> Result<Self, AddressError> {
        let rest = uri.strip_prefix(RESOURCE_URI_PREFIX).ok_or(AddressError::WrongScheme)?;
        let (mount, path) = rest.split_once('/').unwrap_or((rest, ""));
        if mount.is_empty() {
            return Err(AddressError::EmptyMount);
        }
        let mount = MountName::new(mount).map_err(AddressError::InvalidMount)?;
        let path = normalize_segments(path)?;
        Ok(Self {
            mount,
            path,
        })
    }

    /// Renders the canonical URI for this address.
    #[must_use]
    pub fn to_uri(&self) -> String {
        format!("{RESOURCE_URI_PREFIX}{}/{}", self.mount, self.path)
    }
}

// ============================================================================
// SECTION: Resource Payloads
// ============================================================================

/// Listing entry for a mounted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Canonical resource URI.
    pub uri: String,
    /// Display name (mount-relative path).
    pub name: String,
    /// MIME type guessed from the file extension.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl ResourceDescriptor {
    /// Builds a descriptor for an address.
    #[must_use]
    pub fn for_address(address: &ResourceAddress, mime_type: impl Into<String>) -> Self {
        Self {
            uri: address.to_uri(),
            name: address.path.as_str().to_string(),
            mime_type: mime_type.into(),
        }
    }
}

/// Raw bytes of a mounted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBytes {
    /// File contents.
    pub data: Vec<u8>,
    /// MIME type guessed from the file extension.
    pub mime_type: String,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
