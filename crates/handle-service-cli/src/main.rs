// crates/handle-service-cli/src/main.rs
// ============================================================================
// Module: Handle Service CLI Entry Point
// Description: Command dispatcher for the handle service binary.
// Purpose: Run the JSON-RPC server, check configuration, and import records.
// Dependencies: clap, handle-service-*, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! `handle-service serve` runs the JSON-RPC server, `handle-service config
//! check` validates a configuration file, and `handle-service import` loads
//! legacy JSON-lines records into the configured store. Logs go to stderr
//! through `tracing-subscriber`, filtered by `RUST_LOG` (default `info`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use handle_service_cli::ImportReport;
use handle_service_cli::import_records;
use handle_service_config::HandleServiceConfig;
use handle_service_core::Clock;
use handle_service_core::SystemClock;
use handle_service_server::HandleServer;
use handle_service_server::build_service;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "handle-service", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the JSON-RPC server.
    Serve(ConfigArgs),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Import legacy handle records from a JSON-lines file.
    Import(ImportCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Check(ConfigArgs),
}

/// Shared `--config` argument.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Optional config file path (defaults to handle-service.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for the `import` command.
#[derive(Args, Debug)]
struct ImportCommand {
    /// JSON-lines file with one handle record per line.
    #[arg(long, value_name = "FILE")]
    input: PathBuf,
    /// Configuration selecting the target store.
    #[command(flatten)]
    config: ConfigArgs,
}

/// CLI error wrapper for user-facing failures.
#[derive(Debug)]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
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
    let cli = Cli::parse();
    init_tracing();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => emit_error(&err.message),
    }
}

/// Executes the selected command.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Serve(args) => command_serve(args).await,
        Commands::Config { command: ConfigCommand::Check(args) } => command_config_check(&args),
        Commands::Import(command) => command_import(command).await,
    }
}

/// Installs the stderr log subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Loads configuration from the argument, environment, or default path.
fn load_config(args: &ConfigArgs) -> CliResult<HandleServiceConfig> {
    HandleServiceConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(args: ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(&args)?;
    let server = tokio::task::spawn_blocking(move || HandleServer::from_config(&config))
        .await
        .map_err(|err| CliError::new(format!("server init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `config check` command.
fn command_config_check(args: &ConfigArgs) -> CliResult<ExitCode> {
    let _config = load_config(args)?;
    write_stdout_line("config ok")?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `import` command.
async fn command_import(command: ImportCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let input = command.input;
    let report = tokio::task::spawn_blocking(move || run_import(&config, &input))
        .await
        .map_err(|err| CliError::new(format!("import join failed: {err}")))??;
    write_stdout_line(&format!(
        "inserted={} skipped={} rejected={}",
        report.inserted, report.skipped, report.rejected
    ))?;
    if report.rejected > 0 {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

/// Builds the configured service and streams the input file through it.
fn run_import(config: &HandleServiceConfig, input: &Path) -> CliResult<ImportReport> {
    let service =
        build_service(config).map_err(|err| CliError::new(format!("import init failed: {err}")))?;
    let file = File::open(input)
        .map_err(|err| CliError::new(format!("failed to open {}: {err}", input.display())))?;
    import_records(&service, BufReader::new(file), SystemClock.now_millis())
        .map_err(|err| CliError::new(format!("import failed: {err}")))
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "{message}");
    ExitCode::FAILURE
}
