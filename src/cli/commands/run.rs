//! Run command - materialize a script and execute it

use super::{process_runner, script_source, stream_command};
use crate::cli::args::RunArgs;
use crate::config::Config;
use crate::error::{ScriptrunError, ScriptrunResult};
use crate::script::ScriptOrigin;
use tracing::debug;

/// Execute the run command, returning the script's exit code
pub async fn execute(args: RunArgs, config: &Config) -> ScriptrunResult<i32> {
    let source = script_source(config)?;

    let path = match ScriptOrigin::parse(&args.origin) {
        ScriptOrigin::Literal(text) => source.resolve_literal(&text, args.ext.as_deref()).await?,
        origin @ ScriptOrigin::Url(_) => source.resolve(&origin).await?,
    };

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let interpreter = config
        .interpreter(ext)
        .ok_or_else(|| ScriptrunError::NoInterpreter(ext.to_string()))?;

    let mut argv = interpreter.to_vec();
    argv.push(path.to_string_lossy().into_owned());
    argv.extend(args.args);
    debug!("Running script: {:?}", argv);

    let runner = process_runner(config, &args.process);
    stream_command(&runner, &argv, args.process.cwd.as_deref()).await
}
