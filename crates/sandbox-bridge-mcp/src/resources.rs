// crates/sandbox-bridge-mcp/src/resources.rs
// ============================================================================
// Module: Resource Catalog
// Description: resources/list and resources/read over mounted directories.
// Purpose: Own URI parsing and containment before delegating byte reads.
// Dependencies: base64, sandbox-bridge-core, serde, thiserror
// ============================================================================

//! ## Overview
//! Resource URIs have the form `resource://<mount>/<relative path>`. The
//! catalog resolves a URI through the engine (which rejects unregistered
//! mounts and paths escaping the mount root) before any read happens. A URI
//! that does not resolve yields an "Invalid URI" protocol error; read
//! failures map to protocol errors with the configured detail policy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sandbox_bridge_core::EngineError;
use sandbox_bridge_core::ResourceDescriptor;
use sandbox_bridge_core::SharedEngine;
use serde::Serialize;
use thiserror::Error;

use crate::config::ErrorDetail;
use crate::envelope::REDACTED_ENGINE_MESSAGE;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result payload of `resources/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ListResourcesResult {
    /// Every file under every mount.
    pub resources: Vec<ResourceDescriptor>,
}

/// One blob entry in a `resources/read` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceContents {
    /// Requested URI.
    pub uri: String,
    /// Base64-encoded bytes.
    pub blob: String,
    /// Resource MIME type.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Result payload of `resources/read`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadResourceResult {
    /// Single-element content list.
    pub contents: Vec<ResourceContents>,
}

/// Resource operation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// URI is malformed, escapes its mount, or names an unknown mount.
    #[error("Invalid URI: {0}")]
    InvalidUri(String),
    /// Engine failure while listing or reading.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ResourceError {
    /// Returns the JSON-RPC error code for the failure.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::InvalidUri(_) => -32602,
            Self::Engine(EngineError::NotFound(_)) => -32002,
            Self::Engine(_) => -32603,
        }
    }

    /// Returns a stable kind label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUri(_) => "invalid_uri",
            Self::Engine(inner) => inner.kind(),
        }
    }

    /// Returns the caller-visible message under a detail policy.
    #[must_use]
    pub fn caller_message(&self, detail: ErrorDetail) -> String {
        match self {
            Self::Engine(inner) if detail == ErrorDetail::Redacted && !inner.is_caller_safe() => {
                REDACTED_ENGINE_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Resource operations backed by the shared engine.
#[derive(Clone)]
pub struct ResourceCatalog {
    /// Shared execution engine.
    engine: SharedEngine,
}

impl ResourceCatalog {
    /// Creates a catalog over the engine.
    #[must_use]
    pub const fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
        }
    }

    /// Lists every resource under every mount.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Engine`] when enumeration fails.
    pub async fn list(&self) -> Result<ListResourcesResult, ResourceError> {
        let resources = self.engine.list_resources().await?;
        Ok(ListResourcesResult {
            resources,
        })
    }

    /// Reads a resource by URI.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidUri`] when the URI does not resolve,
    /// and [`ResourceError::Engine`] when the read fails.
    pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, ResourceError> {
        let address =
            self.engine.resolve_uri(uri).ok_or_else(|| ResourceError::InvalidUri(uri.to_string()))?;
        let bytes = self.engine.read_resource(&address.mount, &address.path).await?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: uri.to_string(),
                blob: STANDARD.encode(&bytes.data),
                mime_type: bytes.mime_type,
            }],
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use sandbox_bridge_core::EngineError;

    use super::ResourceError;
    use crate::config::ErrorDetail;

    #[test]
    fn error_codes_follow_category() {
        assert_eq!(ResourceError::InvalidUri("x".to_string()).code(), -32602);
        assert_eq!(ResourceError::Engine(EngineError::NotFound("x".to_string())).code(), -32002);
        assert_eq!(ResourceError::Engine(EngineError::Io("x".to_string())).code(), -32603);
    }

    #[test]
    fn invalid_uri_message_names_the_uri() {
        let err = ResourceError::InvalidUri("resource://nope/a.txt".to_string());
        assert_eq!(err.caller_message(ErrorDetail::Redacted), "Invalid URI: resource://nope/a.txt");
    }

    #[test]
    fn io_detail_is_redacted_by_default() {
        let err = ResourceError::Engine(EngineError::Io("/var/data: EIO".to_string()));
        assert_eq!(err.caller_message(ErrorDetail::Redacted), "execution engine failure");
        assert_eq!(err.caller_message(ErrorDetail::Verbose), "io error: /var/data: EIO");
    }
}
