// crates/sandbox-bridge-cli/src/main.rs
// ============================================================================
// Module: Sandbox Bridge CLI Entry Point
// Description: Command dispatcher for the Sandbox Bridge MCP server.
// Purpose: Load configuration, start the execution engine, and serve MCP.
// Dependencies: clap, sandbox-bridge-config, sandbox-bridge-engine,
//               sandbox-bridge-mcp, thiserror, tokio.
// ============================================================================

//! ## Overview
//! `sandbox-bridge serve` resolves configuration (file, environment, then
//! flags), initializes the host execution engine with its cache directory,
//! mounts the data directory as `data` plus any configured mounts, and then
//! serves MCP over stdio, legacy SSE, or streamable HTTP.
//!
//! Security posture: stdout belongs to the stdio transport, so every
//! diagnostic goes to stderr.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use sandbox_bridge_config::BridgeConfig;
use sandbox_bridge_config::DATA_MOUNT_NAME;
use sandbox_bridge_config::EngineConfig;
use sandbox_bridge_config::ErrorDetail;
use sandbox_bridge_config::ServerTransport;
use sandbox_bridge_core::ExecutionEngine;
use sandbox_bridge_core::MountName;
use sandbox_bridge_core::SharedEngine;
use sandbox_bridge_engine::HostEngine;
use sandbox_bridge_engine::HostEngineConfig;
use sandbox_bridge_mcp::McpServer;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "sandbox-bridge", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Sandbox Bridge MCP server.
    Serve(ServeCommand),
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to sandbox-bridge.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Serve newline-delimited JSON-RPC on stdin/stdout.
    #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["sse", "streamable"])]
    stdio: bool,
    /// Serve the legacy SSE transport (`/sse` + `/messages`).
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "streamable")]
    sse: bool,
    /// Serve the streamable HTTP transport (`/mcp`).
    #[arg(long, action = ArgAction::SetTrue)]
    streamable: bool,
    /// Bind host for HTTP transports.
    #[arg(long, value_name = "HOST")]
    host: Option<String>,
    /// Bind port for HTTP transports.
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,
    /// Engine cache directory.
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<String>,
    /// Directory mounted as `data`.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<String>,
    /// Error detail shown to remote callers.
    #[arg(long, value_enum, value_name = "MODE")]
    error_detail: Option<ErrorDetailArg>,
}

/// Error detail policy flag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ErrorDetailArg {
    /// Hide internal failure detail.
    Redacted,
    /// Show full failure detail.
    Verbose,
}

impl From<ErrorDetailArg> for ErrorDetail {
    fn from(value: ErrorDetailArg) -> Self {
        match value {
            ErrorDetailArg::Redacted => Self::Redacted,
            ErrorDetailArg::Verbose => Self::Verbose,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let mut config = BridgeConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    apply_serve_overrides(&mut config, &command);
    config.validate().map_err(|err| CliError::new(format!("failed to load config: {err}")))?;

    let engine = start_engine(&config.engine).await?;
    let banner = startup_banner(&config)?;
    let server = McpServer::from_config(&config, engine)
        .map_err(|err| CliError::new(format!("failed to initialize server: {err}")))?;
    write_stderr_line(&banner).map_err(|err| CliError::new(output_error(&err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Applies command-line flags on top of file and environment settings.
fn apply_serve_overrides(config: &mut BridgeConfig, command: &ServeCommand) {
    if command.stdio {
        config.server.transport = ServerTransport::Stdio;
    } else if command.streamable {
        config.server.transport = ServerTransport::Streamable;
    } else if command.sse {
        config.server.transport = ServerTransport::Sse;
    }
    if let Some(host) = &command.host {
        config.server.host.clone_from(host);
    }
    if let Some(port) = command.port {
        config.server.port = port;
    }
    if let Some(cache_dir) = &command.cache_dir {
        config.engine.cache_dir.clone_from(cache_dir);
    }
    if let Some(data_dir) = &command.data_dir {
        config.engine.data_dir.clone_from(data_dir);
    }
    if let Some(detail) = command.error_detail {
        config.server.error_detail = detail.into();
    }
}

/// Builds, initializes, and mounts the host execution engine.
async fn start_engine(config: &EngineConfig) -> CliResult<SharedEngine> {
    let engine = HostEngine::new(HostEngineConfig {
        interpreter: config.interpreter.clone(),
        max_file_bytes: config.max_file_bytes,
        ..HostEngineConfig::default()
    });
    engine.initialize(Path::new(&config.cache_dir)).await.map_err(|err| {
        CliError::new(format!("failed to initialize execution engine: {err}"))
    })?;
    let data = MountName::new(DATA_MOUNT_NAME).map_err(|err| CliError::new(err.to_string()))?;
    mount(&engine, &data, &config.data_dir).await?;
    for extra in &config.mounts {
        mount(&engine, &extra.name, &extra.path).await?;
    }
    let engine: SharedEngine = Arc::new(engine);
    Ok(engine)
}

/// Mounts one host directory.
async fn mount(engine: &HostEngine, name: &MountName, path: &str) -> CliResult<()> {
    engine
        .mount_directory(name, Path::new(path))
        .await
        .map_err(|err| CliError::new(format!("failed to mount {name} from {path}: {err}")))
}

/// Describes where the server is listening.
fn startup_banner(config: &BridgeConfig) -> CliResult<String> {
    let transport = config.server.transport;
    if transport == ServerTransport::Stdio {
        return Ok("sandbox-bridge MCP server running on stdio".to_string());
    }
    let addr = config.server.bind_addr().map_err(|err| CliError::new(err.to_string()))?;
    Ok(format!("sandbox-bridge MCP server ({}) listening on http://{addr}", transport.as_str()))
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(error: &std::io::Error) -> String {
    format!("failed to write to stderr: {error}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
