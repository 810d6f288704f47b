// crates/sandbox-bridge-config/src/config.rs
// ============================================================================
// Module: Sandbox Bridge Configuration
// Description: Configuration loading and validation for Sandbox Bridge.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: sandbox-bridge-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The file is resolved from an explicit path, then `SANDBOX_BRIDGE_CONFIG`,
//! then `sandbox-bridge.toml` in the working directory. Only the implicit
//! default file may be absent; in that case built-in defaults apply.
//! Environment overrides for engine directories and the HTTP port are applied
//! after parsing and before validation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use sandbox_bridge_core::MountName;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "sandbox-bridge.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SANDBOX_BRIDGE_CONFIG";
/// Environment variable overriding the engine cache directory.
pub const CACHE_DIR_ENV_VAR: &str = "SANDBOX_BRIDGE_CACHE_DIR";
/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV_VAR: &str = "SANDBOX_BRIDGE_DATA_DIR";
/// Environment variable overriding the HTTP port.
pub const PORT_ENV_VAR: &str = "SANDBOX_BRIDGE_PORT";
/// Mount name reserved for the data directory.
pub const DATA_MOUNT_NAME: &str = "data";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum accepted request body limit.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Maximum number of concurrent sessions that may be configured.
pub(crate) const MAX_SESSIONS_LIMIT: usize = 65_536;
/// Minimum idle timeout in milliseconds.
pub(crate) const MIN_IDLE_TIMEOUT_MS: u64 = 1_000;
/// Minimum sweep interval in milliseconds.
pub(crate) const MIN_SWEEP_INTERVAL_MS: u64 = 100;
/// Upper bound for the configurable maximum execution timeout.
pub(crate) const MAX_EXECUTION_TIMEOUT_MS: u64 = 3_600_000;
/// Maximum number of extra mounts.
pub(crate) const MAX_MOUNTS: usize = 64;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Sandbox Bridge configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Execution engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl BridgeConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path)?;
        validate_path(&resolved)?;
        let mut config = match fs::read(&resolved) {
            Ok(bytes) => Self::from_bytes(&bytes)?,
            Err(err) if !explicit && err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                return Err(ConfigError::Io(format!("{}: {err}", resolved.display())));
            }
        };
        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration bytes without applying overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the content is oversized, not UTF-8, or
    /// not valid TOML.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies environment overrides using the provided lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override value is malformed.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(cache_dir) = lookup(CACHE_DIR_ENV_VAR) {
            self.engine.cache_dir = cache_dir;
        }
        if let Some(data_dir) = lookup(DATA_DIR_ENV_VAR) {
            self.engine.data_dir = data_dir;
        }
        if let Some(port) = lookup(PORT_ENV_VAR) {
            self.server.port = port.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{PORT_ENV_VAR} must be a port number"))
            })?;
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Server configuration for MCP transports.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Transport type for MCP.
    #[serde(default)]
    pub transport: ServerTransport,
    /// Bind host for HTTP transports.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port for HTTP transports.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body (or stdio line) size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Error detail exposed in tool error envelopes.
    #[serde(default)]
    pub error_detail: ErrorDetail,
    /// Session table limits.
    #[serde(default)]
    pub sessions: SessionConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: ServerTransport::default(),
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            error_detail: ErrorDetail::default(),
            sessions: SessionConfig::default(),
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the socket address HTTP transports bind to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the host is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("server.host must be an ip address".to_string()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Validates server transport configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid("max_body_bytes exceeds limit".to_string()));
        }
        if self.transport != ServerTransport::Stdio {
            self.bind_addr()?;
            if self.port == 0 {
                return Err(ConfigError::Invalid(
                    "server.port must be non-zero for http transports".to_string(),
                ));
            }
        }
        self.sessions.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

/// Session table limits for HTTP transports.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Maximum concurrent sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Idle time after which a session without a live stream is evicted.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Interval between idle sweeps.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_timeout_ms: default_idle_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl SessionConfig {
    /// Validates session limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 || self.max_sessions > MAX_SESSIONS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "sessions.max_sessions must be between 1 and {MAX_SESSIONS_LIMIT}"
            )));
        }
        if self.idle_timeout_ms < MIN_IDLE_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "sessions.idle_timeout_ms must be at least {MIN_IDLE_TIMEOUT_MS}"
            )));
        }
        if self.sweep_interval_ms < MIN_SWEEP_INTERVAL_MS
            || self.sweep_interval_ms > self.idle_timeout_ms
        {
            return Err(ConfigError::Invalid(format!(
                "sessions.sweep_interval_ms must be between {MIN_SWEEP_INTERVAL_MS} and \
                 idle_timeout_ms"
            )));
        }
        Ok(())
    }
}

/// Audit logging configuration for MCP server requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines). Stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

/// Supported MCP transport types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Use stdin/stdout transport.
    #[default]
    Stdio,
    /// Use the legacy SSE transport (`/sse` + `/messages`).
    Sse,
    /// Use the streamable HTTP transport (`/mcp`).
    Streamable,
}

impl ServerTransport {
    /// Returns a stable label for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Sse => "sse",
            Self::Streamable => "streamable",
        }
    }
}

/// Error detail policy for tool error envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDetail {
    /// Hide internal failure detail from callers.
    #[default]
    Redacted,
    /// Show full failure detail to callers.
    Verbose,
}

/// Execution engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Directory for engine caches and installed packages.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Directory mounted as `data`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Interpreter executable used by the host engine.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Execution timeout applied when a call omits one.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Optional ceiling on requested execution timeouts; unset accepts any.
    #[serde(default)]
    pub max_timeout_ms: Option<u64>,
    /// Maximum size of a file read through resources or media tools.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    /// Additional mounts.
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            data_dir: default_data_dir(),
            interpreter: default_interpreter(),
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: None,
            max_file_bytes: default_max_file_bytes(),
            mounts: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Validates engine configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("engine.cache_dir", &self.cache_dir)?;
        validate_path_string("engine.data_dir", &self.data_dir)?;
        if self.interpreter.trim().is_empty() {
            return Err(ConfigError::Invalid("engine.interpreter must be non-empty".to_string()));
        }
        if self.max_timeout_ms.is_some_and(|max| max == 0 || max > MAX_EXECUTION_TIMEOUT_MS) {
            return Err(ConfigError::Invalid(format!(
                "engine.max_timeout_ms must be between 1 and {MAX_EXECUTION_TIMEOUT_MS}"
            )));
        }
        let default_ceiling = self.max_timeout_ms.unwrap_or(MAX_EXECUTION_TIMEOUT_MS);
        if self.default_timeout_ms == 0 || self.default_timeout_ms > default_ceiling {
            return Err(ConfigError::Invalid(format!(
                "engine.default_timeout_ms must be between 1 and {default_ceiling}"
            )));
        }
        if self.max_file_bytes == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_file_bytes must be greater than zero".to_string(),
            ));
        }
        if self.mounts.len() > MAX_MOUNTS {
            return Err(ConfigError::Invalid(format!(
                "engine.mounts exceeds {MAX_MOUNTS} entries"
            )));
        }
        let mut seen = BTreeSet::new();
        for mount in &self.mounts {
            mount.validate()?;
            if !seen.insert(mount.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "engine.mounts has duplicate name {}",
                    mount.name
                )));
            }
        }
        Ok(())
    }
}

/// Additional mounted directory.
#[derive(Debug, Clone, Deserialize)]
pub struct MountConfig {
    /// Mount name used in resource URIs.
    pub name: MountName,
    /// Host directory path.
    pub path: String,
}

impl MountConfig {
    /// Validates a mount entry.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.as_str() == DATA_MOUNT_NAME {
            return Err(ConfigError::Invalid(format!(
                "engine.mounts name {DATA_MOUNT_NAME} is reserved for engine.data_dir"
            )));
        }
        validate_path_string("engine.mounts.path", &self.path)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path; the flag is true when the path was explicit.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Default bind host.
fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Default HTTP port.
const fn default_port() -> u16 {
    3020
}

/// Default maximum request body size.
pub(crate) const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default maximum session count.
const fn default_max_sessions() -> usize {
    1024
}

/// Default idle timeout (30 minutes).
const fn default_idle_timeout_ms() -> u64 {
    30 * 60 * 1000
}

/// Default sweep interval (60 seconds).
const fn default_sweep_interval_ms() -> u64 {
    60_000
}

/// Audit logging is on by default.
const fn default_audit_enabled() -> bool {
    true
}

/// Default engine cache directory.
fn default_cache_dir() -> String {
    "./cache".to_string()
}

/// Default data directory.
fn default_data_dir() -> String {
    "./data".to_string()
}

/// Default interpreter executable.
fn default_interpreter() -> String {
    "python3".to_string()
}

/// Default execution timeout.
const fn default_timeout_ms() -> u64 {
    5_000
}

/// Default maximum file read size.
const fn default_max_file_bytes() -> usize {
    32 * 1024 * 1024
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions on known-good input."
    )]

    use std::collections::HashMap;

    use super::BridgeConfig;
    use super::CACHE_DIR_ENV_VAR;
    use super::DATA_DIR_ENV_VAR;
    use super::PORT_ENV_VAR;
    use super::validate_path_string;

    fn lookup(entries: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            entries.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_replace_directories_and_port() {
        let mut config = BridgeConfig::default();
        config
            .apply_env_overrides(lookup(&[
                (CACHE_DIR_ENV_VAR, "/var/cache/bridge"),
                (DATA_DIR_ENV_VAR, "/srv/data"),
                (PORT_ENV_VAR, "4040"),
            ]))
            .unwrap();
        assert_eq!(config.engine.cache_dir, "/var/cache/bridge");
        assert_eq!(config.engine.data_dir, "/srv/data");
        assert_eq!(config.server.port, 4040);
    }

    #[test]
    fn absent_env_overrides_keep_defaults() {
        let mut config = BridgeConfig::default();
        config.apply_env_overrides(lookup(&[])).unwrap();
        assert_eq!(config.engine.cache_dir, "./cache");
        assert_eq!(config.engine.data_dir, "./data");
        assert_eq!(config.server.port, 3020);
    }

    #[test]
    fn malformed_port_override_is_rejected() {
        let mut config = BridgeConfig::default();
        let err = config.apply_env_overrides(lookup(&[(PORT_ENV_VAR, "http")])).unwrap_err();
        assert!(err.to_string().contains(PORT_ENV_VAR));
    }

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        let err = validate_path_string("engine.cache_dir", "   ").unwrap_err();
        assert!(err.to_string().contains("engine.cache_dir must be non-empty"));
    }

    #[test]
    fn validate_path_string_rejects_component_too_long() {
        let long = "a".repeat(256);
        assert!(validate_path_string("audit.path", &long).is_err());
        assert!(validate_path_string("audit.path", "logs/audit.jsonl").is_ok());
    }
}
