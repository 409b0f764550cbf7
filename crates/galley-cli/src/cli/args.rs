//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Galley node agent
///
/// Prepares a Linux host, joins it to a Galley-managed k0s cluster and
/// reports it ready to the platform. Most commands need root.
#[derive(Parser, Debug)]
#[command(name = "galley")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Platform API host; an empty value disables all platform calls
    #[arg(long, env = "GALLEY_PLATFORM_URL", global = true)]
    pub platform_url: Option<String>,

    /// Web console URL shown in hand-off instructions
    #[arg(long, env = "GALLEY_CLIENT_URL", global = true)]
    pub client_url: Option<String>,

    /// Show what would be done without changing the host
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Directory for provisioning progress files
    #[arg(long, env = "GALLEY_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Agent config file
    #[arg(long, env = "GALLEY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Action log file
    #[arg(long, env = "GALLEY_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Do not look for a newer galley before running the command
    #[arg(long, env = "GALLEY_SKIP_UPDATE_CHECK", global = true)]
    pub skip_update_check: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Join this host to a cluster as a controller
    Controller(ControllerArgs),

    /// Join workers and mint worker join tokens
    Worker(WorkerArgs),

    /// Prepare this host and run the maintenance link
    Node(NodeArgs),

    /// Replace this binary with a published release
    Update(UpdateArgs),

    /// Manage the agent configuration
    Config(ConfigArgs),

    /// Show the action log
    Logs(LogsArgs),
}

// ============================================================================
// Controller command
// ============================================================================

#[derive(Args, Debug)]
pub struct ControllerArgs {
    #[command(subcommand)]
    pub command: ControllerCommands,
}

#[derive(Subcommand, Debug)]
pub enum ControllerCommands {
    /// Join as a controller with a token from the Galley console
    Join {
        /// Auth token issued by the platform
        token: String,

        /// Lifetime of the worker join token printed afterwards
        #[arg(long, default_value = galley::provision::DEFAULT_INVITE_EXPIRY)]
        expiry: String,
    },
}

// ============================================================================
// Worker command
// ============================================================================

#[derive(Args, Debug)]
pub struct WorkerArgs {
    #[command(subcommand)]
    pub command: WorkerCommands,
}

#[derive(Subcommand, Debug)]
pub enum WorkerCommands {
    /// Join as a worker with a token from `galley worker invite`
    Join {
        /// Worker join token
        token: String,
    },

    /// Mint a worker join token on this controller
    Invite {
        /// How long the token stays valid (e.g. 30m, 1h, 24h)
        #[arg(long, default_value = galley::provision::DEFAULT_INVITE_EXPIRY)]
        expiry: String,
    },
}

// ============================================================================
// Node command
// ============================================================================

#[derive(Args, Debug)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub command: NodeCommands,
}

#[derive(Subcommand, Debug)]
pub enum NodeCommands {
    /// Update, harden and install k0s on this host; resumes after interruptions
    Prepare {
        /// Record the OS update step as done without updating
        #[arg(long)]
        skip_os_update: bool,
    },

    /// Keep a maintenance link to the platform open
    Agent {
        /// Websocket URL of the platform's maintenance endpoint
        #[arg(long, env = "GALLEY_PLATFORM_WS_URL")]
        platform_ws_url: String,

        /// Node id announced to the platform (defaults to the joined cluster id)
        #[arg(long)]
        node: Option<String>,
    },
}

// ============================================================================
// Update command
// ============================================================================

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Release to install
    #[arg(id = "release_version", value_name = "VERSION", default_value = "latest")]
    pub version: String,

    /// Where releases are published (defaults to download_base from the config)
    #[arg(long, env = "GALLEY_DOWNLOAD_BASE")]
    pub download_base: Option<String>,
}

impl Commands {
    /// Whether to look for a newer release before running this command
    #[must_use]
    pub const fn checks_for_updates(&self) -> bool {
        matches!(self, Self::Controller(_) | Self::Worker(_) | Self::Node(_))
    }
}

// ============================================================================
// Config command
// ============================================================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Set a configuration value (download_base, platform_url, client_url)
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },

    /// Print a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Print all configuration values
    List,

    /// Show the configuration file path
    Path,
}

// ============================================================================
// Logs command
// ============================================================================

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of trailing lines to show
    #[arg(short = 'n', long, default_value = "50")]
    pub lines: usize,

    /// Print the log file path instead
    #[arg(long)]
    pub path: bool,
}
