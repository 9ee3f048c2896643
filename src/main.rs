//! doc-flow - Supervise stdio JSON-RPC servers and document commits through them.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use doc_flow::config::{ConfigError, ConfigLoader, DocFlowConfig};
use doc_flow::display;
use doc_flow::processor::{ProcessorError, UpdateProcessor, DEFAULT_PENDING_FILE};
use doc_flow::server::{ServerSupervisor, SupervisorError};

#[derive(Parser)]
#[command(
    name = "doc-flow",
    about = "Supervise MCP servers and process architecture updates",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a server and keep it in the foreground until Ctrl-C.
    Start {
        /// Server name from the configuration.
        name: String,
    },
    /// Stop one server, or all of them.
    Stop {
        /// Server name; omit to stop everything.
        name: Option<String>,
    },
    /// List configured servers.
    List,
    /// Process a pending-updates document through the preferred server.
    Process {
        /// Document to process.
        #[arg(default_value = DEFAULT_PENDING_FILE)]
        file: PathBuf,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<DocFlowConfig, ConfigError> {
    let loader = match path {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    loader.load()
}

async fn start_foreground(supervisor: &ServerSupervisor, name: &str) -> Result<(), CliError> {
    let server = supervisor.start(name).await?;
    display::print_server_started(server.name(), server.pid());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(server = %name, "Interrupted");
        }
        () = supervisor.wait_for_exit(name) => {
            tracing::warn!(server = %name, "Server exited");
        }
    }
    Ok(())
}

async fn process(supervisor: &ServerSupervisor, config: &DocFlowConfig, file: PathBuf) -> Result<(), CliError> {
    let processor = UpdateProcessor::new(supervisor, config.mcp_processing.clone());
    let outcome = processor.process(&file).await?;
    display::print_processing_summary(&outcome);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config)?;
    let supervisor = ServerSupervisor::new(&config);

    let result = match cli.command {
        Commands::Start { name } => start_foreground(&supervisor, &name).await,
        Commands::Stop { name } => {
            let stopped = match name {
                Some(name) => {
                    if supervisor.stop(&name) {
                        vec![name]
                    } else {
                        Vec::new()
                    }
                }
                None => supervisor.stop_all(),
            };
            display::print_servers_stopped(&stopped);
            Ok(())
        }
        Commands::List => {
            display::print_server_list(&supervisor.list());
            Ok(())
        }
        Commands::Process { file } => process(&supervisor, &config, file).await,
    };

    supervisor.shutdown().await;
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        display::print_error(&e.to_string());
        std::process::exit(1);
    }
}
