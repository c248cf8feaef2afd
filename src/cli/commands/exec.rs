//! Exec command - run a command and capture its output

use super::{process_runner, stream_command};
use crate::cli::args::{ExecArgs, ExecFormat};
use crate::config::Config;
use crate::error::ScriptrunResult;
use crate::process::{ProcessResult, TeeConsumer};
use std::collections::BTreeMap;

/// Execute the exec command, returning the child's exit code
pub async fn execute(args: ExecArgs, config: &Config) -> ScriptrunResult<i32> {
    let runner = process_runner(config, &args.process);
    let cwd = args.process.cwd.as_deref();

    match args.format {
        ExecFormat::Text => stream_command(&runner, &args.command, cwd).await,
        ExecFormat::Json => {
            let finished = runner
                .run_with(
                    &args.command,
                    cwd,
                    &BTreeMap::new(),
                    TeeConsumer::new("stdout"),
                    TeeConsumer::new("stderr"),
                )
                .await?;

            let result = ProcessResult::new(
                args.command.clone(),
                finished.exit_code,
                finished.stdout.into_collector().text(),
                finished.stderr.into_collector().text(),
            );
            if let Some(interrupt) = finished.interrupted {
                let err = runner.interruption_error(&args.command, interrupt, result);
                if let Some(partial) = err.partial_result() {
                    println!("{}", serde_json::to_string_pretty(partial)?);
                }
                return Err(err);
            }

            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(result.exit_code())
        }
    }
}
