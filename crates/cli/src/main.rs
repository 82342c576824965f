//! Atrium CLI
//!
//! Entry point for the access-controlled document assistant: ingest
//! documents, ask grounded questions, and manage permissions.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, DocumentsCommand, ExportCommand, IngestCommand};
use atrium_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Atrium CLI - permissioned document retrieval and generation
#[derive(Parser, Debug)]
#[command(name = "atrium")]
#[command(about = "Access-controlled document assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "ATRIUM_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "ATRIUM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Completion provider (groq, mock)
    #[arg(short, long, global = true, env = "ATRIUM_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "ATRIUM_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest documents from files or URLs
    Ingest(IngestCommand),

    /// Ask a question against the document base
    Ask(AskCommand),

    /// Document management (list, delete, permissions, stats)
    Documents(DocumentsCommand),

    /// Export a conversation as JSON
    Export(ExportCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.completion_provider);
    tracing::debug!("Model: {}", config.completion_model);

    config.ensure_atrium_dir()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Documents(_) => "documents",
        Commands::Export(_) => "export",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Documents(cmd) => cmd.execute(&config).await,
        Commands::Export(cmd) => cmd.execute(&config).await,
    };

    if let Err(e) = &result {
        tracing::error!("Command failed: {}", e);
    }

    result
}
