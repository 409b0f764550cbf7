//! Capabilities the workflows drive.
//!
//! The workflows never touch the host directly: prompts, the cluster runtime
//! and host maintenance all go through these traits so the workflows can run
//! against scripted implementations.

mod directive;

pub use directive::{DirectiveFile, Separator};

use async_trait::async_trait;
use galley_core::{ClusterRole, HostFacts, JoinSecret};
use std::path::Path;

use crate::error::ProvisionError;

/// Asks the operator yes/no questions
pub trait OperatorPrompt: Send + Sync {
    /// Ask `question`; an empty answer means `default_yes`
    fn confirm(&self, question: &str, default_yes: bool) -> bool;
}

/// Answers every question with its default
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptDefaults;

impl OperatorPrompt for AcceptDefaults {
    fn confirm(&self, _question: &str, default_yes: bool) -> bool {
        default_yes
    }
}

/// Edits line-oriented `key value` configuration files such as
/// `sshd_config` or `login.defs`
pub trait HostConfigEditor: Send + Sync {
    /// Value of the first active `key` directive, if any
    fn read_directive(&self, path: &Path, key: &str) -> Result<Option<String>, ProvisionError>;

    /// Make `key` have `value`. Returns true if the file changed and the
    /// owning service needs a restart.
    fn set_directive(&self, path: &Path, key: &str, value: &str) -> Result<bool, ProvisionError>;

    /// Add `key` with `value` unless an active `key` directive exists, whose
    /// value is then left alone. Returns true if the file changed.
    fn ensure_present(&self, path: &Path, key: &str, value: &str)
        -> Result<bool, ProvisionError>;
}

/// The cluster runtime (k0s) as seen by the workflows
#[async_trait]
pub trait ClusterRuntime: Send + Sync {
    /// Install the runtime binary unless present
    async fn ensure_installed(&self) -> Result<(), ProvisionError>;

    /// Create the default runtime config unless present. Returns true if
    /// it was created.
    async fn ensure_config(&self) -> Result<bool, ProvisionError>;

    /// Let the operator review the runtime config
    async fn edit_config(&self) -> Result<(), ProvisionError>;

    /// Install the runtime service for `role`. Workers need the join secret
    /// minted by a controller; controller roles ignore it.
    async fn install_service(
        &self,
        role: ClusterRole,
        secret: Option<&JoinSecret>,
    ) -> Result<(), ProvisionError>;

    /// Enable and start the service installed for `role`
    async fn start_service(&self, role: ClusterRole) -> Result<(), ProvisionError>;

    /// Returns true if a controller or worker service is running
    async fn any_service_active(&self) -> bool;

    /// Mint a worker join secret valid for `expiry` (e.g. `1h`)
    async fn create_join_token(&self, expiry: &str) -> Result<JoinSecret, ProvisionError>;

    /// Installed runtime version, if it can be determined
    async fn version(&self) -> Option<String>;
}

/// Host-level maintenance run during `node prepare`
#[async_trait]
pub trait HostMaintenance: Send + Sync {
    /// Update packages and enable automatic security updates
    async fn update_os(&self, prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError>;

    /// Harden the SSH daemon
    async fn harden_ssh(&self, prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError>;

    /// Apply the remaining server hardening
    async fn harden_server(&self, prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError>;

    /// Measure the host for the ready report
    async fn host_facts(&self) -> Result<HostFacts, ProvisionError>;

    /// Ask the host to reboot
    async fn reboot(&self) -> Result<(), ProvisionError>;
}
