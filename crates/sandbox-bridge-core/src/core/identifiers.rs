// crates/sandbox-bridge-core/src/core/identifiers.rs
// ============================================================================
// Module: Sandbox Bridge Identifiers
// Description: Validated identifiers for mount points.
// Purpose: Provide strongly typed, serializable names with stable string forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Mount names are the first segment of every resource URI and the key of the
//! engine mount table. Unlike opaque identifiers, mount names are validated on
//! construction: `[A-Za-z0-9_-]{1,64}`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum mount name length in bytes.
pub const MAX_MOUNT_NAME_LENGTH: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Identifier was empty.
    #[error("must not be empty")]
    Empty,
    /// Identifier exceeded the length limit.
    #[error("must be at most {max} characters")]
    TooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// Identifier contained a disallowed character.
    #[error("contains invalid character {0:?}")]
    InvalidCharacter(char),
}

// ============================================================================
// SECTION: Mount Name
// ============================================================================

/// Unique name of a mounted directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MountName(String);

impl MountName {
    /// Creates a validated mount name.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the name is empty, too long, or
    /// contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, IdentifierError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if name.len() > MAX_MOUNT_NAME_LENGTH {
            return Err(IdentifierError::TooLong {
                max: MAX_MOUNT_NAME_LENGTH,
            });
        }
        if let Some(ch) = name.chars().find(|ch| !is_mount_char(*ch)) {
            return Err(IdentifierError::InvalidCharacter(ch));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns true when the character is permitted in a mount name.
const fn is_mount_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

impl fmt::Display for MountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for MountName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for MountName {
    type Error = IdentifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MountName> for String {
    fn from(value: MountName) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
