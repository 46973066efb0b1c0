//! Toolscope - scoped tool registry for per-directory build environments
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use toolscope::cli::{Cli, Commands};
use toolscope::config::ConfigManager;
use toolscope::error::{ToolscopeError, ToolscopeResult};
use toolscope::scope::normalize_path;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ToolscopeResult<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().map_err(|e| ToolscopeError::io("getting current directory", e))?;
    let top: PathBuf = match &cli.top {
        Some(dir) => normalize_path(&cwd.join(dir)),
        None => cwd,
    };

    // Load configuration
    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(&top),
    };
    let mut config = config_manager.load()?;
    if cli.debug {
        config.debug = true;
    }

    // Initialize logging: 0 = warn, 1 = info, 2+ or debug channel = debug
    let filter = match cli.verbose {
        _ if config.debug => EnvFilter::new("toolscope=debug"),
        0 => EnvFilter::new("toolscope=warn"),
        1 => EnvFilter::new("toolscope=info"),
        _ => EnvFilter::new("toolscope=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    debug!("Top directory: {}", top.display());
    debug!("Configuration: {:?}", config);

    // Dispatch to command
    match cli.command {
        Commands::Generate(args) => toolscope::cli::commands::generate(args, &config, &top).await,
        Commands::Probe(args) => toolscope::cli::commands::probe(args, &config, &top).await,
        Commands::Tools(args) => toolscope::cli::commands::tools(args, &config, &top).await,
        Commands::Cache(args) => toolscope::cli::commands::cache(args, &config, &top).await,
    }
}
