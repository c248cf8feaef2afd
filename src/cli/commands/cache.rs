//! Cache command - inspect and maintain the script cache

use crate::cache::{format_bytes, CacheEntry, ContentCache};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{ScriptrunError, ScriptrunResult};
use crate::script::URL_PREFIX;
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> ScriptrunResult<()> {
    let cache = ContentCache::open(config.cache_dir())?;

    match args.action {
        CacheAction::Path => {
            println!("{}", cache.dir().display());
            Ok(())
        }
        CacheAction::List { format } => list_entries(&cache, format),
        CacheAction::Verify => verify_entries(&cache),
        CacheAction::Clear => {
            let removed = cache.clear()?;
            println!(
                "{} Removed {} cached script(s)",
                style("✓").green(),
                removed
            );
            Ok(())
        }
    }
}

fn list_entries(cache: &ContentCache, format: OutputFormat) -> ScriptrunResult<()> {
    let entries = cache.entries()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.path.display());
            }
        }
        OutputFormat::Table if entries.is_empty() => println!("No cached scripts."),
        OutputFormat::Table => print_table(&entries),
    }
    Ok(())
}

fn print_table(entries: &[CacheEntry]) {
    println!(
        "{:<12} {:<18} {:<6} {:>10} {:<17}",
        style("PREFIX").bold(),
        style("DIGEST").bold(),
        style("EXT").bold(),
        style("SIZE").bold(),
        style("MODIFIED").bold()
    );
    println!("{}", "-".repeat(67));

    let mut total = 0;
    for entry in entries {
        total += entry.size;
        let modified = entry
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<18} {:<6} {:>10} {:<17}",
            entry.prefix,
            entry.digest,
            entry.extension,
            format_bytes(entry.size),
            modified
        );
    }

    println!();
    println!("Total: {} script(s), {}", entries.len(), format_bytes(total));
}

fn verify_entries(cache: &ContentCache) -> ScriptrunResult<()> {
    let corrupt = cache.verify(&[URL_PREFIX])?;
    if corrupt.is_empty() {
        println!("{} All cached scripts match their digests", style("✓").green());
        return Ok(());
    }

    for entry in &corrupt {
        println!("{} {}", style("✗").red(), entry.path.display());
    }
    Err(ScriptrunError::User(format!(
        "{} cached script(s) do not match their digest",
        corrupt.len()
    )))
}
