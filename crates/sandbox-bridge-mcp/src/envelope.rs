// crates/sandbox-bridge-mcp/src/envelope.rs
// ============================================================================
// Module: Tool Result Envelope
// Description: Wire shape of tool results and the single failure formatter.
// Purpose: Converge every tool-level failure onto one caller-visible shape.
// Dependencies: base64, serde, sandbox-bridge-core
// ============================================================================

//! ## Overview
//! A tool call always produces a [`CallToolResult`]. Successes carry content
//! blocks; failures carry exactly one text block and `isError: true`.
//! [`format_tool_error`] is the only place a [`ToolError`] becomes wire
//! content, and it applies the configured [`ErrorDetail`] policy: under the
//! redacted policy, engine failures that may carry host detail are replaced by
//! a fixed message. Unredacted detail still reaches the audit sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sandbox_bridge_core::MediaContent;
use sandbox_bridge_core::MediaKind;
use serde::Deserialize;
use serde::Serialize;

use crate::config::ErrorDetail;
use crate::tools::ToolError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Caller-facing message for redacted engine failures.
pub const REDACTED_ENGINE_MESSAGE: &str = "execution engine failure";
/// Caller-facing message for redacted internal failures.
pub const REDACTED_INTERNAL_MESSAGE: &str = "internal error";

// ============================================================================
// SECTION: Types
// ============================================================================

/// One content block of a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Plain text.
    Text {
        /// Text body.
        text: String,
    },
    /// Base64 image.
    Image {
        /// Base64-encoded bytes.
        data: String,
        /// Image MIME type.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Base64 audio.
    Audio {
        /// Base64-encoded bytes.
        data: String,
        /// Audio MIME type.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ToolContent {
    /// Builds a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
        }
    }

    /// Builds an image or audio block from media bytes.
    #[must_use]
    pub fn media(media: &MediaContent) -> Self {
        let data = STANDARD.encode(&media.data);
        let mime_type = media.mime_type.clone();
        match media.kind {
            MediaKind::Image => Self::Image {
                data,
                mime_type,
            },
            MediaKind::Audio => Self::Audio {
                data,
                mime_type,
            },
        }
    }
}

/// Result payload of `tools/call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Content blocks.
    pub content: Vec<ToolContent>,
    /// Set to `true` on failure.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none", default)]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Builds a successful result.
    #[must_use]
    pub const fn success(content: Vec<ToolContent>) -> Self {
        Self {
            content,
            is_error: None,
        }
    }

    /// Builds a failed result carrying one text block.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(message)],
            is_error: Some(true),
        }
    }

    /// Returns true when the result is flagged as an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

// ============================================================================
// SECTION: Formatting
// ============================================================================

/// Converts a tool failure into the error envelope.
#[must_use]
pub fn format_tool_error(error: &ToolError, detail: ErrorDetail) -> CallToolResult {
    CallToolResult::failure(caller_message(error, detail))
}

/// Returns the caller-visible message for a tool failure.
#[must_use]
pub fn caller_message(error: &ToolError, detail: ErrorDetail) -> String {
    if detail == ErrorDetail::Verbose {
        return error.to_string();
    }
    match error {
        ToolError::Engine(inner) if !inner.is_caller_safe() => REDACTED_ENGINE_MESSAGE.to_string(),
        ToolError::Internal(_) => REDACTED_INTERNAL_MESSAGE.to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions on known-good input.")]

    use sandbox_bridge_core::EngineError;
    use sandbox_bridge_core::MediaContent;
    use sandbox_bridge_core::MediaKind;
    use serde_json::json;

    use super::CallToolResult;
    use super::ToolContent;
    use super::format_tool_error;
    use crate::config::ErrorDetail;
    use crate::tools::ToolError;

    #[test]
    fn failure_shape_is_single_text_block() {
        let result =
            format_tool_error(&ToolError::UnknownTool("nope".to_string()), ErrorDetail::Redacted);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"isError": true, "content": [{"type": "text", "text": "Unknown tool: nope"}]})
        );
    }

    #[test]
    fn redaction_hides_backend_detail_only() {
        let backend = ToolError::Engine(EngineError::Backend("/srv/secret failed".to_string()));
        let redacted = format_tool_error(&backend, ErrorDetail::Redacted);
        assert_eq!(redacted.content, vec![ToolContent::text("execution engine failure")]);
        let verbose = format_tool_error(&backend, ErrorDetail::Verbose);
        assert_eq!(
            verbose.content,
            vec![ToolContent::text("engine backend error: /srv/secret failed")]
        );

        let not_found = ToolError::Engine(EngineError::NotFound("a.png".to_string()));
        let shown = format_tool_error(&not_found, ErrorDetail::Redacted);
        assert_eq!(shown.content, vec![ToolContent::text("file not found: a.png")]);
    }

    #[test]
    fn internal_and_engine_failures_share_shape() {
        let a = format_tool_error(&ToolError::Internal("boom".to_string()), ErrorDetail::Redacted);
        let b = format_tool_error(
            &ToolError::Engine(EngineError::Io("disk".to_string())),
            ErrorDetail::Redacted,
        );
        assert_eq!(a.is_error, b.is_error);
        assert_eq!(a.content.len(), b.content.len());
    }

    #[test]
    fn success_omits_is_error_and_media_is_base64() {
        let media = MediaContent {
            kind: MediaKind::Audio,
            data: vec![1, 2, 3],
            mime_type: "audio/wav".to_string(),
        };
        let result = CallToolResult::success(vec![ToolContent::media(&media)]);
        assert!(!result.is_error());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"content": [{"type": "audio", "data": "AQID", "mimeType": "audio/wav"}]})
        );
    }
}
