// crates/sandbox-bridge-core/src/core/media.rs
// ============================================================================
// Module: Media Types
// Description: Extension-based MIME detection for mounted files.
// Purpose: Classify files as image or audio for media tool responses.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! MIME detection is purely lexical on the file extension. Unknown extensions
//! map to `application/octet-stream`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fallback MIME type for unrecognized extensions.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Known extensions and their MIME types.
const MIME_TABLE: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("flac", "audio/flac"),
    ("m4a", "audio/mp4"),
    ("aac", "audio/aac"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("json", "application/json"),
    ("py", "text/x-python"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
];

// ============================================================================
// SECTION: Types
// ============================================================================

/// Media classes returned by the media tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// `image/*` content.
    Image,
    /// `audio/*` content.
    Audio,
}

impl MediaKind {
    /// Returns the MCP content type label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

// ============================================================================
// SECTION: Detection
// ============================================================================

/// Returns the MIME type for a path based on its extension.
#[must_use]
pub fn mime_type_for_path(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let Some((_, extension)) = file_name.rsplit_once('.') else {
        return DEFAULT_MIME_TYPE;
    };
    let extension = extension.to_ascii_lowercase();
    MIME_TABLE
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map_or(DEFAULT_MIME_TYPE, |(_, mime)| *mime)
}

/// Classifies a MIME type as image or audio media.
#[must_use]
pub fn media_kind(mime_type: &str) -> Option<MediaKind> {
    if mime_type.starts_with("image/") {
        Some(MediaKind::Image)
    } else if mime_type.starts_with("audio/") {
        Some(MediaKind::Audio)
    } else {
        None
    }
}
