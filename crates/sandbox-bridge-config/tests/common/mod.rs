// crates/sandbox-bridge-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for sandbox-bridge-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use sandbox_bridge_config::BridgeConfig;
use sandbox_bridge_config::ConfigError;
use sandbox_bridge_config::ServerTransport;

/// Result type used by config integration tests.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into a `BridgeConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<BridgeConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<BridgeConfig, toml::de::Error> {
    config_from_toml("")
}

/// Returns a minimal config using the streamable HTTP transport.
pub fn streamable_config() -> Result<BridgeConfig, toml::de::Error> {
    let mut config = minimal_config()?;
    config.server.transport = ServerTransport::Streamable;
    Ok(config)
}

/// Asserts that validation failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
