//! `galley controller` - join as a controller.

use anyhow::{Context as _, Result};
use colored::Colorize;
use galley::provision::WorkflowOptions;

use super::Context;
use crate::cli::args::{ControllerArgs, ControllerCommands};
use crate::output;

pub async fn execute(ctx: Context, args: ControllerArgs) -> Result<()> {
    match args.command {
        ControllerCommands::Join { token, expiry } => join(&ctx, &token, expiry).await,
    }
}

async fn join(ctx: &Context, token: &str, expiry: String) -> Result<()> {
    if ctx.platform_url.is_empty() {
        output::note("No platform configured: the node will not be reported to Galley.");
    }

    let installer = ctx.installer(WorkflowOptions {
        invite_expiry: expiry,
        ..ctx.options()
    })?;
    let outcome = installer
        .controller_join(token)
        .await
        .context("controller join failed")?;

    if outcome.dry_run {
        println!(
            "{} would join cluster {} as {}",
            "Dry run:".yellow().bold(),
            outcome.cluster_id.cyan(),
            outcome.role.to_string().cyan()
        );
        return Ok(());
    }

    output::success(&format!(
        "Joined cluster {} as {}",
        outcome.cluster_id.cyan(),
        outcome.role.to_string().cyan()
    ));
    if !ctx.platform_url.is_empty() {
        output::success("Node reported ready to the platform");
        println!("  {} {}", "Console:".bold(), ctx.client_url);
    }

    if let Some(invite) = outcome.invite {
        output::print_handoff(&invite, &ctx.config.download_base);
    }
    Ok(())
}
