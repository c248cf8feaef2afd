//! Resolve command - materialize a script and print its cached path

use super::script_source;
use crate::cli::args::ResolveArgs;
use crate::config::Config;
use crate::error::ScriptrunResult;
use crate::script::ScriptOrigin;

/// Execute the resolve command
pub async fn execute(args: ResolveArgs, config: &Config) -> ScriptrunResult<()> {
    let source = script_source(config)?;

    let path = match ScriptOrigin::parse(&args.origin) {
        ScriptOrigin::Literal(text) => source.resolve_literal(&text, args.ext.as_deref()).await?,
        origin @ ScriptOrigin::Url(_) => source.resolve(&origin).await?,
    };

    println!("{}", path.display());
    Ok(())
}
