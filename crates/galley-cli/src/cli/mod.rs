//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::{Context as _, Result};
use args::{Cli, Commands};
use clap::Parser;
use galley::provision::{AgentConfig, Environment};

use crate::logging;
use crate::prompt::TerminalPrompt;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Resolve file locations once; everything below receives them explicitly
    let mut env = Environment::system();
    if let Some(dir) = cli.state_dir {
        env.state_dir = dir;
    }
    if let Some(path) = cli.config {
        env.config_path = path;
    }
    if let Some(path) = cli.log_file {
        env.log_path = path;
    }

    logging::init(&env.log_path, cli.verbose);

    let config = AgentConfig::load(&env.config_path)
        .with_context(|| format!("cannot load {}", env.config_path.display()))?;

    // Flag, then config file, then default
    let platform_url = cli
        .platform_url
        .unwrap_or_else(|| config.platform_url.clone());
    let client_url = cli.client_url.unwrap_or_else(|| config.client_url.clone());

    let ctx = commands::Context {
        env,
        config,
        platform_url,
        client_url,
        dry_run: cli.dry_run,
        verbose: cli.verbose,
    };

    // Unattended runs never update themselves
    let prompt = TerminalPrompt::new();
    if !cli.skip_update_check
        && !ctx.dry_run
        && cli.command.checks_for_updates()
        && prompt.is_interactive()
        && commands::update::offer_update(&ctx, &prompt).await
    {
        return Ok(());
    }

    match cli.command {
        Commands::Controller(args) => commands::controller::execute(ctx, args).await,
        Commands::Worker(args) => commands::worker::execute(ctx, args).await,
        Commands::Node(args) => commands::node::execute(ctx, args).await,
        Commands::Update(args) => commands::update::execute(&ctx, args).await,
        Commands::Config(args) => commands::config::execute(&ctx, args),
        Commands::Logs(args) => commands::logs::execute(&ctx, &args),
    }
}
