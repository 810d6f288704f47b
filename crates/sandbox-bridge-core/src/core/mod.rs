// crates/sandbox-bridge-core/src/core/mod.rs
// ============================================================================
// Module: Sandbox Bridge Core Types
// Description: Shared data model for mounts, resources, media, and execution.
// Purpose: Group the serializable types exchanged with execution engines.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Core types describe what flows across the engine capability boundary.
//! Addressing types enforce mount-root containment at construction time so
//! downstream code never handles an unchecked path.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod execution;
pub mod identifiers;
pub mod media;
pub mod resources;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use execution::ExecutionOutput;
pub use execution::MediaContent;
pub use execution::MountPointInfo;
pub use execution::PackageInstallReport;
pub use execution::UploadReceipt;
pub use identifiers::IdentifierError;
pub use identifiers::MAX_MOUNT_NAME_LENGTH;
pub use identifiers::MountName;
pub use media::DEFAULT_MIME_TYPE;
pub use media::MediaKind;
pub use media::media_kind;
pub use media::mime_type_for_path;
pub use resources::AddressError;
pub use resources::MAX_RELATIVE_PATH_LENGTH;
pub use resources::RESOURCE_URI_PREFIX;
pub use resources::RelativePath;
pub use resources::ResourceAddress;
pub use resources::ResourceBytes;
pub use resources::ResourceDescriptor;
pub use resources::normalize_relative_path;
