//! scriptrun - cached script execution
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use scriptrun::cli::{Cli, Commands};
use scriptrun::config::ConfigManager;
use scriptrun::error::ScriptrunResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => exit_code(code),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

/// Map a child exit code onto ours; signals and out-of-range codes become 1
fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map(ExitCode::from).unwrap_or(ExitCode::FAILURE)
}

async fn run() -> ScriptrunResult<i32> {
    let cli = Cli::parse();

    // Load configuration; --cache-dir wins over the file
    let config_manager = ConfigManager::resolve(cli.config).cache_dir_override(cli.cache_dir);
    let config = config_manager.load().await?;

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("scriptrun=warn"),
        1 => EnvFilter::new("scriptrun=info"),
        _ => EnvFilter::new("scriptrun=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }
    debug!("Using config {}", config_manager.path().display());

    // Dispatch to command
    match cli.command {
        Commands::Exec(args) => scriptrun::cli::commands::exec(args, &config).await,
        Commands::Run(args) => scriptrun::cli::commands::run(args, &config).await,
        Commands::Resolve(args) => scriptrun::cli::commands::resolve(args, &config)
            .await
            .map(|()| 0),
        Commands::Cache(args) => scriptrun::cli::commands::cache(args, &config)
            .await
            .map(|()| 0),
    }
}
