//! `galley node` - host preparation and the maintenance link.

use anyhow::{Context as _, Result};
use colored::Colorize;
use galley::provision::WorkflowOptions;
use galley::MaintenanceLink;
use tracing::info;

use super::Context;
use crate::cli::args::{NodeArgs, NodeCommands};
use crate::output;

pub async fn execute(ctx: Context, args: NodeArgs) -> Result<()> {
    match args.command {
        NodeCommands::Prepare { skip_os_update } => prepare(&ctx, skip_os_update).await,
        NodeCommands::Agent {
            platform_ws_url,
            node,
        } => agent(&ctx, platform_ws_url, node).await,
    }
}

async fn prepare(ctx: &Context, skip_os_update: bool) -> Result<()> {
    let installer = ctx.installer(WorkflowOptions {
        skip_os_update,
        ..ctx.options()
    })?;
    let outcome = installer
        .prepare_node()
        .await
        .context("node preparation failed")?;

    if !outcome.resumed.is_empty() {
        println!("{}", "Resuming, already done:".bold());
        for step in &outcome.resumed {
            println!("  {} {}", "✓".green(), step.summary());
        }
    }

    if outcome.dry_run {
        println!("{}", "Dry run, would run:".yellow().bold());
        for step in &outcome.pending {
            println!("  - {}", step.summary());
        }
        return Ok(());
    }

    for step in &outcome.ran {
        let suffix = if outcome.declined.contains(step) {
            " (skipped)".dimmed().to_string()
        } else {
            String::new()
        };
        output::success(&format!("{}{suffix}", step.summary()));
    }
    if let Some(version) = &outcome.runtime_version {
        println!("  {} {}", "k0s:".bold(), version);
    }

    if outcome.reboot_recommended && !outcome.reboot_requested {
        output::note("A reboot is recommended to finish the OS update.");
    }
    println!();
    println!(
        "Next: {} or {}",
        "sudo galley controller join <token>".cyan(),
        "sudo galley worker join <token>".cyan()
    );
    Ok(())
}

async fn agent(ctx: &Context, url: String, node: Option<String>) -> Result<()> {
    let node = node
        .or_else(|| ctx.config.vessel_engine_id.clone())
        .context("no node id: pass --node or join a cluster first")?;

    let link = MaintenanceLink::new(url, node)?;
    info!("maintenance link starting");

    // Runs until the process is terminated
    let never = link
        .run(|message| info!(message, "platform notification"))
        .await?;
    match never {}
}
