// crates/nods-server/src/main.rs
// ============================================================================
// Module: nods CLI Entry Point
// Description: Command dispatcher for serving, checking and querying nods.
// Purpose: Provide the `nods` binary over the server library.
// Dependencies: clap, nods-config, nods-core, nods-server, serde_json, tokio
// ============================================================================

//! ## Overview
//! `nods serve` runs the HTTP surface, `nods check` loads the catalogue and
//! reports per-source readiness, `nods query` answers one item path from the
//! command line, and `nods example-config` prints a canonical `nods.toml`.
//! Router construction and queries run on the blocking pool because remote
//! providers use a blocking HTTP client.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use nods_config::NodsConfig;
use nods_config::config_toml_example;
use nods_core::DataInputs;
use nods_core::DataOutput;
use nods_core::DataUri;
use nods_core::QueryContext;
use nods_server::AppState;
use nods_server::NodsService;
use nods_server::http::status_for;
use nods_server::init_logging;
use nods_server::serve;
use tokio::net::TcpListener;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "nods", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve(ConfigArgs),
    /// Load the catalogue and report per-source readiness.
    Check(ConfigArgs),
    /// Answer one item query and print its output as JSON.
    Query(QueryCommand),
    /// Print a canonical example configuration.
    ExampleConfig,
}

/// Shared config file selection.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Optional config file path (defaults to nods.toml or `NODS_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for the `query` command.
#[derive(Args, Debug)]
struct QueryCommand {
    /// Item path (`category/source/item`).
    #[arg(value_name = "PATH")]
    path: String,
    /// Query input as `key=value`; repeatable.
    #[arg(short = 'i', long = "input", value_name = "KEY=VALUE", value_parser = parse_input)]
    inputs: Vec<(String, String)>,
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Parses one `key=value` input.
fn parse_input(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw}")),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing failures.
#[derive(Debug)]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
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
        Commands::Serve(args) => command_serve(args).await,
        Commands::Check(args) => command_check(args).await,
        Commands::Query(command) => command_query(command).await,
        Commands::ExampleConfig => {
            write_stdout_line(config_toml_example().trim_end()).map_err(CliError::new)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs the HTTP server until ctrl-c.
async fn command_serve(args: ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let addr = config.server.bind_addr().map_err(CliError::new)?;
    let build = config.clone();
    let service = tokio::task::spawn_blocking(move || NodsService::from_config(&build))
        .await
        .map_err(|err| CliError::new(format!("init join failed: {err}")))?;
    service.listen();
    let state = Arc::new(AppState::new(
        Arc::clone(service.router()),
        config.server.request_timeout(),
        config.server.max_body_bytes,
    ));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| CliError::new(format!("bind {addr} failed: {err}")))?;
    let served = serve(listener, state).await;
    // The router owns a blocking HTTP client that must not drop on a runtime thread.
    let _ = tokio::task::spawn_blocking(move || drop(service)).await;
    served.map_err(CliError::new)?;
    Ok(ExitCode::SUCCESS)
}

/// Loads the catalogue strictly and prints one line per source.
async fn command_check(args: ConfigArgs) -> CliResult<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    config.watch.enabled = false;
    let lines = tokio::task::spawn_blocking(move || -> CliResult<Vec<String>> {
        let service = NodsService::try_from_config(&config).map_err(CliError::new)?;
        let router = service.router();
        let counts = router.schema().item_counts();
        let live = router.source_names();
        let lines = router
            .schema()
            .list_sources()
            .into_iter()
            .map(|info| {
                let state = match (info.enabled, live.contains(&info.name)) {
                    (false, _) => "disabled",
                    (true, true) => "ready",
                    (true, false) => "skipped",
                };
                let items = counts.get(&info.name).copied().unwrap_or_default();
                format!("{}\t{}\t{state}\t{items} items", info.name, info.database.as_str())
            })
            .collect();
        Ok(lines)
    })
    .await
    .map_err(|err| CliError::new(format!("check join failed: {err}")))??;
    for line in &lines {
        write_stdout_line(line).map_err(CliError::new)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Answers one item query.
async fn command_query(command: QueryCommand) -> CliResult<ExitCode> {
    let mut config = load_config(command.config.config.as_deref())?;
    config.watch.enabled = false;
    let uri = DataUri::parse(&command.path);
    let inputs = command
        .inputs
        .into_iter()
        .fold(DataInputs::new(), |inputs, (key, value)| inputs.with(key, value));
    let (success, output) = tokio::task::spawn_blocking(move || {
        let service = NodsService::from_config(&config);
        let ctx = QueryContext::with_timeout(config.server.request_timeout());
        let answer = service.router().data_value(&ctx, &uri, &inputs);
        let success = status_for(answer.error.as_ref()).is_success();
        (success, DataOutput::new(&uri, &inputs, answer))
    })
    .await
    .map_err(|err| CliError::new(format!("query join failed: {err}")))?;
    let text = serde_json::to_string_pretty(&output).map_err(CliError::new)?;
    write_stdout_line(&text).map_err(CliError::new)?;
    Ok(if success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads configuration and installs logging.
fn load_config(path: Option<&Path>) -> CliResult<NodsConfig> {
    let config = NodsConfig::load(path).map_err(CliError::new)?;
    init_logging(&config.log.filter).map_err(CliError::new)?;
    Ok(config)
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
