// crates/sandbox-bridge-engine/src/host.rs
// ============================================================================
// Module: Host Engine
// Description: ExecutionEngine backed by a host interpreter subprocess.
// Purpose: Run code and package installs and serve mounted files.
// Dependencies: async-trait, cap-std, sandbox-bridge-core, tokio
// ============================================================================

//! ## Overview
//! Each `execute` call spawns `<interpreter> -c <code>` with `PYTHONPATH`
//! pointing at the engine's package directory inside the cache. The child is
//! killed when its deadline passes. Each output pipe keeps at most
//! `max_output_bytes` (plus one byte to detect overflow) and the rest is
//! drained and discarded so the child never blocks on a full pipe.
//! Packages are installed with
//! `<interpreter> -m pip install --target <cache>/site-packages`.
//! Mounts are held as `cap-std` directory handles in a lock-protected table;
//! the lock is never held across an await point.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use cap_std::fs::Dir;
use sandbox_bridge_core::EngineError;
use sandbox_bridge_core::ExecutionEngine;
use sandbox_bridge_core::ExecutionOutput;
use sandbox_bridge_core::MediaContent;
use sandbox_bridge_core::MountName;
use sandbox_bridge_core::MountPointInfo;
use sandbox_bridge_core::PackageInstallReport;
use sandbox_bridge_core::RelativePath;
use sandbox_bridge_core::ResourceAddress;
use sandbox_bridge_core::ResourceBytes;
use sandbox_bridge_core::ResourceDescriptor;
use sandbox_bridge_core::UploadReceipt;
use sandbox_bridge_core::media_kind;
use sandbox_bridge_core::mime_type_for_path;
use sandbox_bridge_core::normalize_relative_path;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::fs::ListingLimits;
use crate::fs::file_exists;
use crate::fs::list_files;
use crate::fs::open_mount_dir;
use crate::fs::read_confined;
use crate::packages::parse_package_specs;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Directory under the cache that holds installed packages.
const SITE_PACKAGES_DIR: &str = "site-packages";
/// Marker appended to truncated process output.
const TRUNCATION_MARKER: &str = "\n[output truncated]";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Host engine tuning.
#[derive(Debug, Clone)]
pub struct HostEngineConfig {
    /// Interpreter executable.
    pub interpreter: String,
    /// Maximum bytes read from a mounted file.
    pub max_file_bytes: usize,
    /// Maximum bytes kept from each of stdout and stderr.
    pub max_output_bytes: usize,
    /// Deadline for package installs.
    pub install_timeout_ms: u64,
    /// Maximum directory depth walked by resource listings.
    pub max_listing_depth: usize,
    /// Maximum files listed per mount.
    pub max_listing_entries: usize,
}

impl Default for HostEngineConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            max_file_bytes: 32 * 1024 * 1024,
            max_output_bytes: 1024 * 1024,
            install_timeout_ms: 300_000,
            max_listing_depth: 16,
            max_listing_entries: 10_000,
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Registered mount.
struct MountedDir {
    /// Host path the mount was opened from.
    host_path: PathBuf,
    /// Capability handle scoped to the mount root.
    dir: Arc<Dir>,
}

/// Mutable engine state.
#[derive(Default)]
struct EngineState {
    /// Cache directory set by `initialize`.
    cache_dir: Option<PathBuf>,
    /// Mount table.
    mounts: BTreeMap<MountName, MountedDir>,
}

/// Host-process execution engine.
pub struct HostEngine {
    /// Engine tuning.
    config: HostEngineConfig,
    /// Cache directory and mount table.
    state: RwLock<EngineState>,
}

impl HostEngine {
    /// Creates an uninitialized engine.
    #[must_use]
    pub fn new(config: HostEngineConfig) -> Self {
        Self {
            config,
            state: RwLock::new(EngineState::default()),
        }
    }

    /// Returns the cache directory, failing before initialization.
    fn cache_dir(&self) -> Result<PathBuf, EngineError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state.cache_dir.clone().ok_or(EngineError::NotInitialized)
    }

    /// Returns the directory handle for a mount.
    fn mount_dir(&self, mount: &MountName) -> Result<Arc<Dir>, EngineError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .mounts
            .get(mount)
            .map(|mounted| Arc::clone(&mounted.dir))
            .ok_or_else(|| EngineError::UnknownMount(mount.to_string()))
    }

    /// Builds an interpreter command with the package path applied.
    fn interpreter_command(&self, cache_dir: &Path) -> Command {
        let mut command = Command::new(&self.config.interpreter);
        command
            .env("PYTHONPATH", cache_dir.join(SITE_PACKAGES_DIR))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Runs a command to completion under a deadline.
    async fn run_with_deadline(
        &self,
        mut command: Command,
        timeout_ms: u64,
    ) -> Result<ExecutionOutput, EngineError> {
        let mut child = command.spawn().map_err(|err| {
            EngineError::Backend(format!(
                "failed to start interpreter {}: {err}",
                self.config.interpreter
            ))
        })?;
        let limit = self.config.max_output_bytes;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let collect = async {
            let (stdout, stderr, status) =
                tokio::join!(read_capped(stdout, limit), read_capped(stderr, limit), child.wait());
            Ok::<_, std::io::Error>((stdout?, stderr?, status?))
        };
        // Dropping `child` on timeout kills it (`kill_on_drop`).
        let (stdout, stderr, status) =
            tokio::time::timeout(Duration::from_millis(timeout_ms), collect)
                .await
                .map_err(|_| EngineError::Timeout {
                    timeout_ms,
                })?
                .map_err(|err| EngineError::Io(err.to_string()))?;
        Ok(ExecutionOutput {
            stdout: truncate_output(&stdout, limit),
            stderr: truncate_output(&stderr, limit),
            exit_code: status.code(),
        })
    }

    /// Reads a mounted file off the async runtime.
    async fn read_bytes(
        &self,
        mount: &MountName,
        path: &RelativePath,
    ) -> Result<Vec<u8>, EngineError> {
        let dir = self.mount_dir(mount)?;
        let path = path.clone();
        let max_bytes = self.config.max_file_bytes;
        tokio::task::spawn_blocking(move || read_confined(&dir, &path, max_bytes))
            .await
            .map_err(|err| EngineError::Backend(err.to_string()))?
    }
}

#[async_trait]
impl ExecutionEngine for HostEngine {
    async fn initialize(&self, cache_dir: &Path) -> Result<(), EngineError> {
        tokio::fs::create_dir_all(cache_dir.join(SITE_PACKAGES_DIR))
            .await
            .map_err(|err| EngineError::Io(format!("{}: {err}", cache_dir.display())))?;
        let resolved = tokio::fs::canonicalize(cache_dir)
            .await
            .map_err(|err| EngineError::Io(err.to_string()))?;
        self.state.write().map_err(|_| poisoned())?.cache_dir = Some(resolved);
        Ok(())
    }

    async fn mount_directory(
        &self,
        name: &MountName,
        host_path: &Path,
    ) -> Result<(), EngineError> {
        self.cache_dir()?;
        let owned = host_path.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || open_mount_dir(&owned))
            .await
            .map_err(|err| EngineError::Backend(err.to_string()))??;
        let host_path = tokio::fs::canonicalize(host_path)
            .await
            .map_err(|err| EngineError::Io(err.to_string()))?;
        self.state.write().map_err(|_| poisoned())?.mounts.insert(
            name.clone(),
            MountedDir {
                host_path,
                dir: Arc::new(dir),
            },
        );
        Ok(())
    }

    async fn execute(&self, code: &str, timeout_ms: u64) -> Result<ExecutionOutput, EngineError> {
        let cache_dir = self.cache_dir()?;
        let mut command = self.interpreter_command(&cache_dir);
        command.arg("-c").arg(code);
        self.run_with_deadline(command, timeout_ms).await
    }

    async fn install_package(&self, spec: &str) -> Result<PackageInstallReport, EngineError> {
        let packages = parse_package_specs(spec)?;
        let cache_dir = self.cache_dir()?;
        let mut command = self.interpreter_command(&cache_dir);
        command
            .args(["-m", "pip", "install", "--no-input", "--disable-pip-version-check"])
            .arg("--target")
            .arg(cache_dir.join(SITE_PACKAGES_DIR))
            .arg("--")
            .args(&packages);
        let output = self.run_with_deadline(command, self.config.install_timeout_ms).await?;
        if !output.succeeded() {
            let detail = output.stderr.trim();
            return Err(EngineError::InstallFailed(if detail.is_empty() {
                format!("installer exited with status {:?}", output.exit_code)
            } else {
                detail.to_string()
            }));
        }
        Ok(PackageInstallReport {
            packages,
            output: output.stdout,
        })
    }

    async fn list_mount_points(&self) -> Result<Vec<MountPointInfo>, EngineError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .mounts
            .iter()
            .map(|(name, mounted)| MountPointInfo {
                name: name.to_string(),
                path: mounted.host_path.display().to_string(),
            })
            .collect())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, EngineError> {
        let mounts: Vec<(MountName, Arc<Dir>)> = {
            let state = self.state.read().map_err(|_| poisoned())?;
            state
                .mounts
                .iter()
                .map(|(name, mounted)| (name.clone(), Arc::clone(&mounted.dir)))
                .collect()
        };
        let limits = ListingLimits {
            max_depth: self.config.max_listing_depth,
            max_entries: self.config.max_listing_entries,
        };
        let mut descriptors = Vec::new();
        for (mount, dir) in mounts {
            let files = tokio::task::spawn_blocking(move || list_files(&dir, limits))
                .await
                .map_err(|err| EngineError::Backend(err.to_string()))??;
            for file in files {
                let Ok(path) = normalize_relative_path(&file) else {
                    continue;
                };
                let address = ResourceAddress {
                    mount: mount.clone(),
                    path,
                };
                descriptors.push(ResourceDescriptor::for_address(
                    &address,
                    mime_type_for_path(&file),
                ));
            }
        }
        Ok(descriptors)
    }

    async fn read_resource(
        &self,
        mount: &MountName,
        path: &RelativePath,
    ) -> Result<ResourceBytes, EngineError> {
        let data = self.read_bytes(mount, path).await?;
        Ok(ResourceBytes {
            data,
            mime_type: mime_type_for_path(path.as_str()).to_string(),
        })
    }

    async fn read_media(
        &self,
        mount: &MountName,
        path: &RelativePath,
    ) -> Result<MediaContent, EngineError> {
        let mime_type = mime_type_for_path(path.as_str());
        let kind =
            media_kind(mime_type).ok_or_else(|| EngineError::UnsupportedMedia(path.to_string()))?;
        let data = self.read_bytes(mount, path).await?;
        Ok(MediaContent {
            kind,
            data,
            mime_type: mime_type.to_string(),
        })
    }

    async fn upload_file(
        &self,
        mount: &MountName,
        path: &RelativePath,
    ) -> Result<UploadReceipt, EngineError> {
        let dir = self.mount_dir(mount)?;
        let checked = path.clone();
        let exists = tokio::task::spawn_blocking(move || file_exists(&dir, &checked))
            .await
            .map_err(|err| EngineError::Backend(err.to_string()))??;
        if !exists {
            return Err(EngineError::NotFound(path.to_string()));
        }
        Err(EngineError::Unavailable("object storage upload is not configured".to_string()))
    }

    fn has_mount(&self, name: &MountName) -> bool {
        self.state.read().is_ok_and(|state| state.mounts.contains_key(name))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Error for a poisoned state lock.
fn poisoned() -> EngineError {
    EngineError::Backend("engine state lock poisoned".to_string())
}

/// Reads at most `limit + 1` bytes from a pipe, then drains the remainder.
async fn read_capped<R>(pipe: Option<R>, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(Vec::new());
    };
    let keep = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut kept = Vec::new();
    (&mut pipe).take(keep).read_to_end(&mut kept).await?;
    tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await?;
    Ok(kept)
}

/// Decodes process output lossily and caps its length on a char boundary.
fn truncate_output(bytes: &[u8], max_bytes: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= max_bytes {
        return text.into_owned();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = text[.. end].to_string();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
