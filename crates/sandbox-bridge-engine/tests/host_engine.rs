//! Host engine integration tests for sandbox-bridge-engine.
// crates/sandbox-bridge-engine/tests/host_engine.rs
// =============================================================================
// Module: Host Engine Tests
// Description: Exercise execution, mounts, and confined reads.
// Purpose: Ensure the host engine honors deadlines and mount-root containment.
// =============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions on known-good fixtures."
)]

use std::fs;
use std::path::Path;

use sandbox_bridge_core::EngineError;
use sandbox_bridge_core::ExecutionEngine;
use sandbox_bridge_core::MediaKind;
use sandbox_bridge_core::MountName;
use sandbox_bridge_core::normalize_relative_path;
use sandbox_bridge_engine::HostEngine;
use sandbox_bridge_engine::HostEngineConfig;
use tempfile::TempDir;

/// Builds an initialized engine using `sh` as the interpreter.
async fn shell_engine(cache: &Path) -> HostEngine {
    let engine = HostEngine::new(HostEngineConfig {
        interpreter: "sh".to_string(),
        ..HostEngineConfig::default()
    });
    engine.initialize(cache).await.unwrap();
    engine
}

/// Creates a data directory with a nested image and a text file.
fn seeded_data_dir() -> TempDir {
    let data = tempfile::tempdir().unwrap();
    fs::create_dir_all(data.path().join("sub")).unwrap();
    fs::write(data.path().join("sub/pixel.png"), [0x89, b'P', b'N', b'G']).unwrap();
    fs::write(data.path().join("notes.txt"), b"hello").unwrap();
    data
}

fn mount(name: &str) -> MountName {
    MountName::new(name).unwrap()
}

#[tokio::test]
async fn execute_before_initialize_fails() {
    let engine = HostEngine::new(HostEngineConfig::default());
    let err = engine.execute("print(1)", 1_000).await.unwrap_err();
    assert_eq!(err, EngineError::NotInitialized);
}

#[tokio::test]
async fn execute_captures_streams_and_exit_code() {
    let cache = tempfile::tempdir().unwrap();
    let engine = shell_engine(cache.path()).await;
    let output = engine.execute("echo out; echo err >&2; exit 3", 5_000).await.unwrap();
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
    assert_eq!(output.exit_code, Some(3));
    assert!(!output.succeeded());
}

#[tokio::test]
async fn execute_caps_output_past_limit() {
    let cache = tempfile::tempdir().unwrap();
    let engine = HostEngine::new(HostEngineConfig {
        interpreter: "sh".to_string(),
        max_output_bytes: 1_024,
        ..HostEngineConfig::default()
    });
    engine.initialize(cache.path()).await.unwrap();
    let output = engine
        .execute("yes xxxxxxxxxxxxxxx | head -c 4000000; echo done >&2", 10_000)
        .await
        .unwrap();
    assert_eq!(output.exit_code, Some(0));
    assert!(output.stdout.starts_with("xxxxxxxxxxxxxxx\n"));
    assert!(output.stdout.ends_with("[output truncated]"));
    assert!(output.stdout.len() < 1_024 + 64);
    assert_eq!(output.stderr, "done\n");
}

#[tokio::test]
async fn execute_times_out() {
    let cache = tempfile::tempdir().unwrap();
    let engine = shell_engine(cache.path()).await;
    let err = engine.execute("sleep 5", 100).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Timeout {
            timeout_ms: 100
        }
    );
}

#[tokio::test]
async fn missing_interpreter_is_backend_error() {
    let cache = tempfile::tempdir().unwrap();
    let engine = HostEngine::new(HostEngineConfig {
        interpreter: "sandbox-bridge-no-such-interpreter".to_string(),
        ..HostEngineConfig::default()
    });
    engine.initialize(cache.path()).await.unwrap();
    let err = engine.execute("1", 1_000).await.unwrap_err();
    assert!(matches!(err, EngineError::Backend(_)));
    assert!(!err.is_caller_safe());
}

#[tokio::test]
async fn install_rejects_option_injection_before_spawning() {
    let cache = tempfile::tempdir().unwrap();
    let engine = shell_engine(cache.path()).await;
    let err = engine.install_package("--index-url=http://evil numpy").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidPackage(_)));
}

#[tokio::test]
async fn mounts_list_and_read_files() {
    let cache = tempfile::tempdir().unwrap();
    let data = seeded_data_dir();
    let engine = shell_engine(cache.path()).await;
    engine.mount_directory(&mount("data"), data.path()).await.unwrap();
    assert!(engine.has_mount(&mount("data")));
    assert!(!engine.has_mount(&mount("other")));

    let mounts = engine.list_mount_points().await.unwrap();
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].name, "data");

    let resources = engine.list_resources().await.unwrap();
    let uris: Vec<&str> = resources.iter().map(|r| r.uri.as_str()).collect();
    assert_eq!(uris, vec!["resource://data/notes.txt", "resource://data/sub/pixel.png"]);
    assert_eq!(resources[1].mime_type, "image/png");

    let bytes = engine
        .read_resource(&mount("data"), &normalize_relative_path("notes.txt").unwrap())
        .await
        .unwrap();
    assert_eq!(bytes.data, b"hello");
    assert_eq!(bytes.mime_type, "text/plain");
}

#[tokio::test]
async fn resolve_uri_requires_registered_mount() {
    let cache = tempfile::tempdir().unwrap();
    let data = seeded_data_dir();
    let engine = shell_engine(cache.path()).await;
    engine.mount_directory(&mount("data"), data.path()).await.unwrap();
    let address = engine.resolve_uri("resource://data/sub/pixel.png").unwrap();
    assert_eq!(address.path.as_str(), "sub/pixel.png");
    assert!(engine.resolve_uri("resource://other/sub/pixel.png").is_none());
    assert!(engine.resolve_uri("resource://data/../escape").is_none());
}

#[tokio::test]
async fn read_media_classifies_and_rejects_non_media() {
    let cache = tempfile::tempdir().unwrap();
    let data = seeded_data_dir();
    let engine = shell_engine(cache.path()).await;
    engine.mount_directory(&mount("data"), data.path()).await.unwrap();

    let media = engine
        .read_media(&mount("data"), &normalize_relative_path("sub/pixel.png").unwrap())
        .await
        .unwrap();
    assert_eq!(media.kind, MediaKind::Image);
    assert_eq!(media.mime_type, "image/png");

    let err = engine
        .read_media(&mount("data"), &normalize_relative_path("notes.txt").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedMedia(_)));
}

#[tokio::test]
async fn reads_report_unknown_mount_and_missing_file() {
    let cache = tempfile::tempdir().unwrap();
    let data = seeded_data_dir();
    let engine = shell_engine(cache.path()).await;
    engine.mount_directory(&mount("data"), data.path()).await.unwrap();

    let path = normalize_relative_path("absent.txt").unwrap();
    let err = engine.read_resource(&mount("nope"), &path).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownMount(_)));
    let err = engine.read_resource(&mount("data"), &path).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_escaping_mount_is_not_readable() {
    let cache = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    fs::write(outside.path().join("secret.txt"), b"secret").unwrap();
    let data = seeded_data_dir();
    std::os::unix::fs::symlink(outside.path().join("secret.txt"), data.path().join("link.txt"))
        .unwrap();
    let engine = shell_engine(cache.path()).await;
    engine.mount_directory(&mount("data"), data.path()).await.unwrap();

    let result = engine
        .read_resource(&mount("data"), &normalize_relative_path("link.txt").unwrap())
        .await;
    assert!(result.is_err());
    let listed = engine.list_resources().await.unwrap();
    assert!(listed.iter().all(|r| !r.uri.ends_with("link.txt")));
}

#[tokio::test]
async fn upload_is_unavailable_for_existing_file() {
    let cache = tempfile::tempdir().unwrap();
    let data = seeded_data_dir();
    let engine = shell_engine(cache.path()).await;
    engine.mount_directory(&mount("data"), data.path()).await.unwrap();

    let err = engine
        .upload_file(&mount("data"), &normalize_relative_path("notes.txt").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));
    let err = engine
        .upload_file(&mount("data"), &normalize_relative_path("absent.txt").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
