//! Cluster role installer: the `node prepare`, `controller join`,
//! `worker join` and `worker invite` workflows.

use galley_client::PlatformClient;
use galley_core::token::{decode_worker_token, encode_worker_token};
use galley_core::{AuthToken, ClusterRole, JoinSecret};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::engine::{Step, StepEngine, StepOutcome, StepPlan, StepReport};
use crate::env::Environment;
use crate::error::ProvisionError;
use crate::host::{ClusterRuntime, HostMaintenance, OperatorPrompt};
use crate::session::{JoinTarget, SessionStore};
use crate::system::{K0sRuntime, SystemHost};

/// Default lifetime of minted worker join tokens
pub const DEFAULT_INVITE_EXPIRY: &str = "1h";

/// Per-invocation switches, passed in explicitly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Log the plan and return before any mutation
    pub dry_run: bool,
    /// Record the OS update step as declined without asking
    pub skip_os_update: bool,
    /// Lifetime of minted worker join tokens, in runtime duration syntax
    pub invite_expiry: String,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            skip_os_update: false,
            invite_expiry: DEFAULT_INVITE_EXPIRY.to_string(),
        }
    }
}

/// Everything the workflows drive on the host
#[derive(Clone)]
pub struct Collaborators {
    pub prompt: Arc<dyn OperatorPrompt>,
    pub runtime: Arc<dyn ClusterRuntime>,
    pub host: Arc<dyn HostMaintenance>,
}

impl Collaborators {
    /// k0s and the local Linux host, asking questions through `prompt`
    #[must_use]
    pub fn system(prompt: Arc<dyn OperatorPrompt>) -> Self {
        Self {
            prompt,
            runtime: Arc::new(K0sRuntime::default()),
            host: Arc::new(SystemHost::default()),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Result of `node prepare`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareOutcome {
    /// Steps an earlier run had already completed
    pub resumed: Vec<Step>,
    /// Steps run in this invocation
    pub ran: Vec<Step>,
    /// Steps the operator declined (still complete)
    pub declined: Vec<Step>,
    /// Steps still to run, for a dry run
    pub pending: Vec<Step>,
    /// Installed k0s version
    pub runtime_version: Option<String>,
    /// The OS update recommended a reboot
    pub reboot_recommended: bool,
    /// The operator accepted the reboot
    pub reboot_requested: bool,
    pub dry_run: bool,
}

/// A minted worker join token
#[derive(Clone, PartialEq, Eq)]
pub struct WorkerInvite {
    /// Token to pass to `galley worker join`
    pub token: String,
    /// Lifetime enforced by the runtime
    pub expiry: String,
}

impl std::fmt::Debug for WorkerInvite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerInvite")
            .field("token", &"***")
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Result of a controller or worker join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub role: ClusterRole,
    pub cluster_id: String,
    /// Worker token minted after a controller join
    pub invite: Option<WorkerInvite>,
    pub dry_run: bool,
}

/// Binds the step engine, the platform client and the token codec to the
/// agent's workflows
#[derive(Debug)]
pub struct Installer {
    env: Environment,
    options: WorkflowOptions,
    platform: PlatformClient,
    collaborators: Collaborators,
}

impl Installer {
    #[must_use]
    pub fn new(env: Environment, platform: PlatformClient, collaborators: Collaborators) -> Self {
        Self {
            env,
            options: WorkflowOptions::default(),
            platform,
            collaborators,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.env
    }

    #[must_use]
    pub const fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Run the provisioning sequence, resuming after the last completed step
    pub async fn prepare_node(&self) -> Result<PrepareOutcome, ProvisionError> {
        let store = SessionStore::new(self.env.prepare_progress_path());
        let mut engine = StepEngine::resume(store, StepPlan::Prepare)?;

        let mut outcome = PrepareOutcome {
            resumed: engine.session().completed().collect(),
            dry_run: self.options.dry_run,
            ..PrepareOutcome::default()
        };
        if !outcome.resumed.is_empty() {
            info!(completed = ?outcome.resumed, "resuming node preparation");
        }

        if self.options.dry_run {
            outcome.pending = Step::SEQUENCE
                .into_iter()
                .filter(|step| !engine.is_complete(*step))
                .collect();
            info!(pending = ?outcome.pending, "dry run, not preparing the node");
            return Ok(outcome);
        }

        for step in Step::SEQUENCE {
            let report = match step {
                Step::OsUpdate => engine.run_step(step, self.update_os()).await?,
                Step::SshHardening => engine.run_step(step, self.harden_ssh()).await?,
                Step::RuntimeInstall => engine.run_step(step, self.install_runtime()).await?,
                Step::RuntimeConfigure => engine.run_step(step, self.configure_runtime()).await?,
                Step::ServerHardening => engine.run_step(step, self.harden_server()).await?,
            };
            if let StepReport::Completed(result) = report {
                outcome.ran.push(step);
                if result.declined {
                    outcome.declined.push(step);
                }
            }
        }

        outcome.runtime_version = self.collaborators.runtime.version().await;
        outcome.reboot_recommended = engine.needs_reboot();
        outcome.reboot_requested = outcome.reboot_recommended
            && self
                .collaborators
                .prompt
                .confirm("A reboot is recommended after the OS update. Reboot now?", true);

        engine.finish()?;

        if outcome.reboot_requested {
            info!("rebooting host");
            self.collaborators.host.reboot().await?;
        }
        Ok(outcome)
    }

    /// Join this host as a controller with a platform-issued auth token.
    ///
    /// The role comes from the platform's node record; with no platform
    /// configured the node joins as a plain controller.
    pub async fn controller_join(&self, token: &str) -> Result<JoinOutcome, ProvisionError> {
        let token = AuthToken::parse(token)?;

        let (role, node_id) = if self.platform.is_configured() {
            let record = self.platform.node().fetch(token.bearer()).await?;
            let role = record.role()?;
            if !role.installs_control_plane() {
                return Err(ProvisionError::RoleMismatch { found: role });
            }
            (role, record.id)
        } else {
            warn!("no platform configured, joining as a controller");
            (ClusterRole::Controller, token.subject().to_string())
        };
        let identity = token.identity(role);
        info!(cluster = %identity.cluster_id, role = %role, "controller join");

        if self.options.dry_run {
            info!("dry run, not joining the cluster");
            return Ok(JoinOutcome {
                role,
                cluster_id: identity.cluster_id,
                invite: None,
                dry_run: true,
            });
        }

        self.record_join(&identity.cluster_id, role)?;

        let mut engine = self.join_engine(JoinTarget::new(role, &identity.cluster_id, None))?;
        engine
            .run_step(Step::RuntimeInstall, self.install_runtime())
            .await?;
        engine
            .run_step(Step::RuntimeConfigure, self.configure_role(role, None))
            .await?;
        self.collaborators.runtime.start_service(role).await?;

        let facts = self.collaborators.host.host_facts().await?;
        self.platform
            .node()
            .report_ready(&node_id, token.bearer(), &facts)
            .await?;
        engine.finish()?;

        let invite = self
            .mint_invite(&identity.cluster_id)
            .await
            .map_err(|e| ProvisionError::InviteFailed {
                cluster_id: identity.cluster_id.clone(),
                source: Box::new(e),
            })?;
        Ok(JoinOutcome {
            role,
            cluster_id: identity.cluster_id,
            invite: Some(invite),
            dry_run: false,
        })
    }

    /// Join this host as a worker with a token from `worker invite`
    pub async fn worker_join(&self, token: &str) -> Result<JoinOutcome, ProvisionError> {
        let identity = decode_worker_token(token)?;
        info!(cluster = %identity.cluster_id, "worker join");

        if self.options.dry_run {
            info!("dry run, not joining the cluster");
            return Ok(JoinOutcome {
                role: ClusterRole::Worker,
                cluster_id: identity.cluster_id,
                invite: None,
                dry_run: true,
            });
        }

        self.record_join(&identity.cluster_id, ClusterRole::Worker)?;

        let mut engine = self.join_engine(JoinTarget::new(
            ClusterRole::Worker,
            &identity.cluster_id,
            Some(&identity.secret),
        ))?;
        engine
            .run_step(Step::RuntimeInstall, self.install_runtime())
            .await?;
        engine
            .run_step(
                Step::RuntimeConfigure,
                self.configure_role(ClusterRole::Worker, Some(&identity.secret)),
            )
            .await?;
        self.collaborators
            .runtime
            .start_service(ClusterRole::Worker)
            .await?;
        engine.finish()?;

        Ok(JoinOutcome {
            role: ClusterRole::Worker,
            cluster_id: identity.cluster_id,
            invite: None,
            dry_run: false,
        })
    }

    /// Mint a fresh worker join token for the cluster this node controls.
    ///
    /// Returns `None` on a dry run.
    pub async fn worker_invite(&self) -> Result<Option<WorkerInvite>, ProvisionError> {
        let config = AgentConfig::load(&self.env.config_path)?;
        let cluster_id = config
            .vessel_engine_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProvisionError::precondition(
                    "this node has not joined a cluster",
                    "run `galley controller join <token>` first",
                )
            })?;
        if config.node_type == Some(ClusterRole::Worker) {
            return Err(ProvisionError::precondition(
                "worker nodes cannot invite other workers",
                "run `galley worker invite` on a controller",
            ));
        }
        if !self.collaborators.runtime.any_service_active().await {
            return Err(ProvisionError::precondition(
                "no k0s service is running on this node",
                "start it with `sudo systemctl start k0scontroller`",
            ));
        }

        if self.options.dry_run {
            info!(cluster = %cluster_id, "dry run, not minting a worker token");
            return Ok(None);
        }
        self.mint_invite(&cluster_id).await.map(Some)
    }

    /// Join progress, reused only for the same role, cluster and secret
    fn join_engine(&self, target: JoinTarget) -> Result<StepEngine, ProvisionError> {
        let store = SessionStore::new(self.env.join_progress_path());
        Ok(StepEngine::resume_for(store, StepPlan::Join, target)?)
    }

    fn record_join(&self, cluster_id: &str, role: ClusterRole) -> Result<(), ProvisionError> {
        let mut config = AgentConfig::load(&self.env.config_path)?;
        config.record_join(cluster_id, role);
        config.save(&self.env.config_path)?;
        debug!(path = %self.env.config_path.display(), "recorded cluster membership");
        Ok(())
    }

    async fn mint_invite(&self, cluster_id: &str) -> Result<WorkerInvite, ProvisionError> {
        let expiry = self.options.invite_expiry.clone();
        let secret = self
            .collaborators
            .runtime
            .create_join_token(&expiry)
            .await?;
        let token = encode_worker_token(cluster_id, secret.expose())?;
        info!(cluster = %cluster_id, expiry = %expiry, "minted worker join token");
        Ok(WorkerInvite { token, expiry })
    }

    async fn update_os(&self) -> Result<StepOutcome, ProvisionError> {
        if self.options.skip_os_update {
            info!("skipping OS update");
            return Ok(StepOutcome::declined());
        }
        let prompt = self.collaborators.prompt.as_ref();
        if !prompt.confirm("Update the operating system now?", true) {
            info!("OS update declined");
            return Ok(StepOutcome::declined());
        }
        self.collaborators.host.update_os(prompt).await?;
        Ok(StepOutcome::needs_reboot())
    }

    async fn harden_ssh(&self) -> Result<StepOutcome, ProvisionError> {
        let prompt = self.collaborators.prompt.as_ref();
        self.collaborators.host.harden_ssh(prompt).await?;
        Ok(StepOutcome::applied())
    }

    async fn install_runtime(&self) -> Result<StepOutcome, ProvisionError> {
        self.collaborators.runtime.ensure_installed().await?;
        Ok(StepOutcome::applied())
    }

    async fn configure_runtime(&self) -> Result<StepOutcome, ProvisionError> {
        let runtime = &self.collaborators.runtime;
        if runtime.ensure_config().await? {
            info!("created default k0s configuration");
        }
        if self
            .collaborators
            .prompt
            .confirm("Edit the k0s configuration now?", false)
        {
            runtime.edit_config().await?;
        }
        Ok(StepOutcome::applied())
    }

    async fn configure_role(
        &self,
        role: ClusterRole,
        secret: Option<&JoinSecret>,
    ) -> Result<StepOutcome, ProvisionError> {
        let runtime = &self.collaborators.runtime;
        if role.installs_control_plane() {
            runtime.ensure_config().await?;
        }
        runtime.install_service(role, secret).await?;
        Ok(StepOutcome::applied())
    }

    async fn harden_server(&self) -> Result<StepOutcome, ProvisionError> {
        let prompt = self.collaborators.prompt.as_ref();
        self.collaborators.host.harden_server(prompt).await?;
        Ok(StepOutcome::applied())
    }
}
