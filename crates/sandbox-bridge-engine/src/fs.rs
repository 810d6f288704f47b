// crates/sandbox-bridge-engine/src/fs.rs
// ============================================================================
// Module: Confined Filesystem Access
// Description: Blocking mount-root reads and listings via cap-std handles.
// Purpose: Keep every file access inside its mount directory.
// Dependencies: cap-std, sandbox-bridge-core
// ============================================================================

//! ## Overview
//! All functions here are blocking and run inside `spawn_blocking`. Paths are
//! resolved relative to a `cap_std::fs::Dir`; attempts to leave the directory
//! (including through symlinks) surface as errors and map to
//! [`EngineError::InvalidPath`]. Listings skip symlinks and non-UTF-8 names.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::ErrorKind;
use std::io::Read;
use std::path::Path;

use cap_std::ambient_authority;
use cap_std::fs::Dir;
use sandbox_bridge_core::EngineError;
use sandbox_bridge_core::RelativePath;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Bounds applied to recursive mount listings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ListingLimits {
    /// Maximum directory depth below the mount root.
    pub max_depth: usize,
    /// Maximum number of files returned per mount.
    pub max_entries: usize,
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Creates (if needed) and opens a host directory as a capability handle.
pub(crate) fn open_mount_dir(host_path: &Path) -> Result<Dir, EngineError> {
    std::fs::create_dir_all(host_path).map_err(|err| EngineError::Io(err.to_string()))?;
    Dir::open_ambient_dir(host_path, ambient_authority())
        .map_err(|err| EngineError::Io(format!("{}: {err}", host_path.display())))
}

/// Reads a regular file under `root`, failing when it exceeds `max_bytes`.
pub(crate) fn read_confined(
    root: &Dir,
    path: &RelativePath,
    max_bytes: usize,
) -> Result<Vec<u8>, EngineError> {
    let file = root.open(path.as_str()).map_err(|err| map_open_error(&err, path))?;
    let metadata = file.metadata().map_err(|err| EngineError::Io(err.to_string()))?;
    if !metadata.is_file() {
        return Err(EngineError::InvalidPath(format!("{path}: not a regular file")));
    }
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if metadata.len() > limit {
        return Err(EngineError::InvalidPath(format!("{path}: exceeds {max_bytes} bytes")));
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|err| EngineError::Io(err.to_string()))?;
    if bytes.len() > max_bytes {
        return Err(EngineError::InvalidPath(format!("{path}: exceeds {max_bytes} bytes")));
    }
    Ok(bytes)
}

/// Returns true when `path` names a regular file under `root`.
pub(crate) fn file_exists(root: &Dir, path: &RelativePath) -> Result<bool, EngineError> {
    match root.metadata(path.as_str()) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(map_open_error(&err, path)),
    }
}

/// Recursively lists regular files under `root` as `/`-joined relative paths.
pub(crate) fn list_files(root: &Dir, limits: ListingLimits) -> Result<Vec<String>, EngineError> {
    let mut files = Vec::new();
    collect_files(root, "", 0, limits, &mut files)?;
    files.sort();
    Ok(files)
}

/// Walks one directory level.
fn collect_files(
    current: &Dir,
    prefix: &str,
    depth: usize,
    limits: ListingLimits,
    files: &mut Vec<String>,
) -> Result<(), EngineError> {
    let entries = current.entries().map_err(|err| EngineError::Io(err.to_string()))?;
    for entry in entries {
        if files.len() >= limits.max_entries {
            return Ok(());
        }
        let entry = entry.map_err(|err| EngineError::Io(err.to_string()))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.contains('\\') {
            continue;
        }
        let relative = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
        let file_type = entry.file_type().map_err(|err| EngineError::Io(err.to_string()))?;
        if file_type.is_symlink() {
            continue;
        }
        if file_type.is_dir() {
            if depth + 1 < limits.max_depth {
                let directory =
                    entry.open_dir().map_err(|err| EngineError::Io(err.to_string()))?;
                collect_files(&directory, &relative, depth + 1, limits, files)?;
            }
        } else if file_type.is_file() {
            files.push(relative);
        }
    }
    Ok(())
}

/// Maps low-level open errors into engine errors.
fn map_open_error(err: &std::io::Error, path: &RelativePath) -> EngineError {
    match err.kind() {
        ErrorKind::NotFound => EngineError::NotFound(path.to_string()),
        ErrorKind::PermissionDenied | ErrorKind::InvalidInput | ErrorKind::NotADirectory => {
            EngineError::InvalidPath(path.to_string())
        }
        _ => EngineError::Io(err.to_string()),
    }
}
