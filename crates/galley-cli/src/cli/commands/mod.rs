//! Command implementations.

pub mod config;
pub mod controller;
pub mod logs;
pub mod node;
pub mod update;
pub mod worker;

use galley::provision::{AgentConfig, Collaborators, Environment, Installer, WorkflowOptions};
use galley::PlatformClient;
use std::sync::Arc;

use crate::prompt::TerminalPrompt;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// File locations
    pub env: Environment,

    /// Agent configuration as loaded at startup
    pub config: AgentConfig,

    /// Resolved platform API host, empty when disabled
    pub platform_url: String,

    /// Resolved web console URL
    pub client_url: String,

    /// Show the plan without changing the host
    pub dry_run: bool,

    /// Verbose output
    pub verbose: bool,
}

impl Context {
    /// Workflow switches for this invocation.
    #[must_use]
    pub fn options(&self) -> WorkflowOptions {
        WorkflowOptions {
            dry_run: self.dry_run,
            ..WorkflowOptions::default()
        }
    }

    /// Build the installer for the real host.
    pub fn installer(&self, options: WorkflowOptions) -> anyhow::Result<Installer> {
        let platform = PlatformClient::new(self.platform_url.as_str())?;
        let collaborators = Collaborators::system(Arc::new(TerminalPrompt::new()));
        Ok(Installer::new(self.env.clone(), platform, collaborators).with_options(options))
    }
}
