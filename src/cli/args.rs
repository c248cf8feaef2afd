//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// scriptrun - run scripts through a content-addressed cache
///
/// Materializes scripts given as literal text or URLs into a persistent
/// cache and runs them, capturing output without pipe deadlocks.
#[derive(Parser, Debug)]
#[command(name = "scriptrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = crate::config::CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Cache directory (overrides config)
    #[arg(long, global = true, env = crate::config::CACHE_DIR_ENV)]
    pub cache_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command and capture its output
    Exec(ExecArgs),

    /// Materialize a script into the cache and print its path
    Resolve(ResolveArgs),

    /// Materialize a script and run it with its configured interpreter
    Run(RunArgs),

    /// Inspect or maintain the script cache
    Cache(CacheArgs),
}

/// Process options shared by exec and run
#[derive(clap::Args, Debug)]
pub struct ProcessArgs {
    /// Additional environment variables (KEY=VALUE)
    #[arg(short, long, value_parser = parse_env_var)]
    pub env: Vec<(String, String)>,

    /// Kill the command after this many seconds (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Working directory for the command
    #[arg(long)]
    pub cwd: Option<PathBuf>,
}

/// Arguments for the exec command
#[derive(Parser, Debug)]
pub struct ExecArgs {
    #[command(flatten)]
    pub process: ProcessArgs,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: ExecFormat,

    /// Command and arguments to run
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Script text, or an http(s):// or file:// URL
    pub origin: String,

    /// Extension for literal scripts (default: from config)
    #[arg(long)]
    pub ext: Option<String>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub process: ProcessArgs,

    /// Extension for literal scripts (default: from config)
    #[arg(long)]
    pub ext: Option<String>,

    /// Script text, or an http(s):// or file:// URL
    pub origin: String,

    /// Arguments passed to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Output format for exec
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecFormat {
    /// Stream the command's output as it arrives
    Text,
    /// Print the captured result as JSON once the command exits
    Json,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
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
    /// Show the cache directory
    Path,

    /// List cached scripts
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Re-hash cached literal scripts and report mismatches
    Verify,

    /// Remove every cached script
    Clear,
}

/// Parse environment variable in KEY=VALUE format
fn parse_env_var(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE format: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
