//! Config defaults and core validation tests for sandbox-bridge-config.
// crates/sandbox-bridge-config/tests/config_defaults.rs
// =============================================================================
// Module: Config Defaults and Core Validation Tests
// Description: Validate default behavior and core config invariants.
// Purpose: Ensure minimal config is valid and critical invariants are enforced.
// =============================================================================

use sandbox_bridge_config::ErrorDetail;
use sandbox_bridge_config::MountConfig;
use sandbox_bridge_config::ServerTransport;
use sandbox_bridge_core::MountName;

mod common;

use common::TestResult;
use common::assert_invalid;

#[test]
fn default_config_validates() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn defaults_match_documented_values() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    if config.server.transport != ServerTransport::Stdio {
        return Err("transport should default to stdio".to_string());
    }
    if config.server.port != 3020 {
        return Err(format!("port default was {}", config.server.port));
    }
    if config.server.error_detail != ErrorDetail::Redacted {
        return Err("error detail should default to redacted".to_string());
    }
    if config.server.sessions.max_sessions != 1024 {
        return Err("max_sessions should default to 1024".to_string());
    }
    if config.server.sessions.idle_timeout_ms != 1_800_000 {
        return Err("idle timeout should default to 30 minutes".to_string());
    }
    if config.engine.default_timeout_ms != 5_000 || config.engine.max_timeout_ms.is_some() {
        return Err("execution timeouts have wrong defaults".to_string());
    }
    if config.engine.cache_dir != "./cache" || config.engine.data_dir != "./data" {
        return Err("engine directories have wrong defaults".to_string());
    }
    Ok(())
}

#[test]
fn streamable_default_binds_loopback() -> TestResult {
    let config = common::streamable_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    let addr = config.server.bind_addr().map_err(|err| err.to_string())?;
    if addr.to_string() != "127.0.0.1:3020" {
        return Err(format!("unexpected bind address {addr}"));
    }
    Ok(())
}

#[test]
fn http_transport_rejects_hostname() -> TestResult {
    let mut config = common::streamable_config().map_err(|err| err.to_string())?;
    config.server.host = "localhost".to_string();
    assert_invalid(config.validate(), "server.host must be an ip address")
}

#[test]
fn http_transport_rejects_port_zero() -> TestResult {
    let mut config = common::streamable_config().map_err(|err| err.to_string())?;
    config.server.port = 0;
    assert_invalid(config.validate(), "server.port must be non-zero")
}

#[test]
fn max_body_bytes_must_be_positive() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.max_body_bytes = 0;
    assert_invalid(config.validate(), "max_body_bytes must be greater than zero")
}

#[test]
fn sessions_require_positive_cap() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.sessions.max_sessions = 0;
    assert_invalid(config.validate(), "sessions.max_sessions")
}

#[test]
fn sweep_interval_cannot_exceed_idle_timeout() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.sessions.idle_timeout_ms = 2_000;
    config.server.sessions.sweep_interval_ms = 5_000;
    assert_invalid(config.validate(), "sessions.sweep_interval_ms")
}

#[test]
fn default_timeout_cannot_exceed_max() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.engine.default_timeout_ms = 10_000;
    config.engine.max_timeout_ms = Some(5_000);
    assert_invalid(config.validate(), "engine.default_timeout_ms")
}

#[test]
fn timeout_ceiling_is_opt_in() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.engine.default_timeout_ms = 600_000;
    config.validate().map_err(|err| err.to_string())?;
    config.engine.max_timeout_ms = Some(0);
    assert_invalid(config.validate(), "engine.max_timeout_ms")
}

#[test]
fn mounts_reject_reserved_and_duplicate_names() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    let data = MountName::new("data").map_err(|err| err.to_string())?;
    config.engine.mounts = vec![MountConfig {
        name: data,
        path: "/srv".to_string(),
    }];
    assert_invalid(config.validate(), "reserved")?;

    let extra = MountName::new("extra").map_err(|err| err.to_string())?;
    config.engine.mounts = vec![
        MountConfig {
            name: extra.clone(),
            path: "/srv/a".to_string(),
        },
        MountConfig {
            name: extra,
            path: "/srv/b".to_string(),
        },
    ];
    assert_invalid(config.validate(), "duplicate name extra")
}

#[test]
fn invalid_mount_name_fails_to_parse() -> TestResult {
    let parsed = common::config_from_toml(
        r#"
        [[engine.mounts]]
        name = "../escape"
        path = "/srv"
        "#,
    );
    if parsed.is_ok() {
        return Err("mount name with traversal characters should not parse".to_string());
    }
    Ok(())
}
