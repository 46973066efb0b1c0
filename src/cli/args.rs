//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Toolscope - scoped tool registry for per-directory build environments
///
/// Generates one build environment per directory, applying inherited
/// tools once, linking libraries through global targets and caching
/// package probe results.
#[derive(Parser, Debug)]
#[command(name = "toolscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path (defaults to <top>/toolscope.toml)
    #[arg(short, long, global = true, env = "TOOLSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Top directory of the source tree (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    pub top: Option<PathBuf>,

    /// Enable debug messages from the registries and caches
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate every directory with a build.toml
    Generate(GenerateArgs),

    /// Run a probe command through the probe cache
    Probe(ProbeArgs),

    /// List discovered tool files and builtin tools
    Tools(ToolsArgs),

    /// Manage the persistent tool cache
    Cache(CacheArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the generate command
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the probe command
#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Directory the command must be found in (repeatable)
    #[arg(short, long = "search-path")]
    pub search_path: Vec<PathBuf>,

    /// Directory of the environment running the probe, relative to the top
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Command and arguments
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Arguments for the tools command
#[derive(Parser, Debug)]
pub struct ToolsArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cached entries
    Show {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the cache file path
    Path,

    /// Remove the cache file
    Clear,
}
