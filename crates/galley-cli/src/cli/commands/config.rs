//! `galley config` - agent configuration management.

use anyhow::{Context as _, Result};
use colored::Colorize;
use galley::provision::{AgentConfig, OPERATOR_KEYS};

use super::Context;
use crate::cli::args::{ConfigArgs, ConfigCommands};

pub fn execute(ctx: &Context, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Set { key, value } => set_config(ctx, &key, &value),
        ConfigCommands::Get { key } => get_config(ctx, &key),
        ConfigCommands::List => list_config(ctx),
        ConfigCommands::Path => {
            println!("{}", ctx.env.config_path.display());
            Ok(())
        }
    }
}

fn set_config(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let path = &ctx.env.config_path;
    let mut config = AgentConfig::load(path)?;
    config.set(key, value)?;

    if ctx.dry_run {
        println!("{} would set {} to {:?}", "Dry run:".yellow().bold(), key.bold(), value.trim());
        return Ok(());
    }
    config
        .save(path)
        .with_context(|| format!("cannot write {}", path.display()))?;

    println!("{} {} set to {}.", "Success:".green().bold(), key, value.trim().cyan());
    Ok(())
}

fn get_config(ctx: &Context, key: &str) -> Result<()> {
    match ctx.config.get(key) {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None if OPERATOR_KEYS.contains(&key) || key == "vessel_engine_id" || key == "node_type" => {
            anyhow::bail!("{key} is not set")
        }
        None => anyhow::bail!(
            "Unknown config key: {key}\n\n\
             Available keys: {}, vessel_engine_id, node_type",
            OPERATOR_KEYS.join(", ")
        ),
    }
}

fn list_config(ctx: &Context) -> Result<()> {
    println!("{}", "Current Configuration:".bold());
    println!();
    for (key, value) in ctx.config.entries() {
        let shown = if value.is_empty() {
            "(empty)".dimmed().to_string()
        } else {
            value
        };
        println!("  {} {}", format!("{key}:").bold(), shown);
    }
    Ok(())
}
