//! `galley worker` - join as a worker, mint worker join tokens.

use anyhow::{Context as _, Result};
use colored::Colorize;
use galley::provision::WorkflowOptions;

use super::Context;
use crate::cli::args::{WorkerArgs, WorkerCommands};
use crate::output;

pub async fn execute(ctx: Context, args: WorkerArgs) -> Result<()> {
    match args.command {
        WorkerCommands::Join { token } => join(&ctx, &token).await,
        WorkerCommands::Invite { expiry } => invite(&ctx, expiry).await,
    }
}

async fn join(ctx: &Context, token: &str) -> Result<()> {
    let outcome = ctx
        .installer(ctx.options())?
        .worker_join(token)
        .await
        .context("worker join failed")?;

    if outcome.dry_run {
        println!(
            "{} would join cluster {} as a worker",
            "Dry run:".yellow().bold(),
            outcome.cluster_id.cyan()
        );
        return Ok(());
    }

    output::success(&format!(
        "Joined cluster {} as a worker",
        outcome.cluster_id.cyan()
    ));
    Ok(())
}

async fn invite(ctx: &Context, expiry: String) -> Result<()> {
    let installer = ctx.installer(WorkflowOptions {
        invite_expiry: expiry,
        ..ctx.options()
    })?;

    match installer
        .worker_invite()
        .await
        .context("cannot create a worker join token")?
    {
        Some(invite) => output::print_handoff(&invite, &ctx.config.download_base),
        None => println!(
            "{} would mint a worker join token",
            "Dry run:".yellow().bold()
        ),
    }
    Ok(())
}
