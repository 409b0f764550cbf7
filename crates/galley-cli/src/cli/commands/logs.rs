//! `galley logs` - show the action log.

use anyhow::{Context as _, Result};

use super::Context;
use crate::cli::args::LogsArgs;
use crate::logging;

pub fn execute(ctx: &Context, args: &LogsArgs) -> Result<()> {
    let path = &ctx.env.log_path;
    if args.path {
        println!("{}", path.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    for line in logging::tail(&content, args.lines) {
        println!("{line}");
    }
    Ok(())
}
