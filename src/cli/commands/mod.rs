//! CLI command implementations

pub mod cache;
pub mod exec;
pub mod resolve;
pub mod run;

pub use cache::execute as cache;
pub use exec::execute as exec;
pub use resolve::execute as resolve;
pub use run::execute as run;

use crate::cache::ContentCache;
use crate::cli::args::ProcessArgs;
use crate::config::Config;
use crate::error::ScriptrunResult;
use crate::process::{CancelToken, FnConsumer, ProcessResult, ProcessRunner};
use crate::script::ScriptSource;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Runner with config defaults, overridden by command-line flags.
///
/// Ctrl-C cancels the run; the child sits in its own process group and
/// would not see the terminal's interrupt otherwise.
fn process_runner(config: &Config, args: &ProcessArgs) -> ProcessRunner {
    let token = CancelToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling child");
            on_interrupt.cancel();
        }
    });

    let mut runner = ProcessRunner::new()
        .envs(config.process.env.clone())
        .envs(args.env.iter().cloned())
        .cancel_token(token);

    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .or_else(|| config.process.timeout());
    if let Some(timeout) = timeout {
        runner = runner.timeout(timeout);
    }
    runner
}

fn script_source(config: &Config) -> ScriptrunResult<ScriptSource> {
    let cache = ContentCache::open(config.cache_dir())?;
    Ok(ScriptSource::with_http(cache).literal_extension(config.cache.literal_extension.clone()))
}

/// Run `argv`, echoing its output line by line as it arrives
async fn stream_command(
    runner: &ProcessRunner,
    argv: &[String],
    cwd: Option<&Path>,
) -> ScriptrunResult<i32> {
    let finished = runner
        .run_with(
            argv,
            cwd,
            &BTreeMap::new(),
            FnConsumer(|line: String| println!("{}", line)),
            FnConsumer(|line: String| eprintln!("{}", line)),
        )
        .await?;

    if let Some(interrupt) = finished.interrupted {
        // Output was already echoed, so the partial result carries none.
        let partial = ProcessResult::new(argv.to_vec(), finished.exit_code, String::new(), String::new());
        return Err(runner.interruption_error(argv, interrupt, partial));
    }
    Ok(finished.exit_code)
}
