use async_trait::async_trait;
use galley_core::{ClusterRole, JoinSecret};
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::command::Runner;
use crate::error::ProvisionError;
use crate::host::ClusterRuntime;

const INSTALL_SCRIPT: &str = "curl -sSLf https://get.k0s.sh | sh";
const DEFAULT_CONFIG_PATH: &str = "/etc/k0s/k0s.yaml";
const DEFAULT_TOKEN_PATH: &str = "/etc/k0s/worker-token";
const UNIT_DIR: &str = "/etc/systemd/system";

/// k0s driven through its CLI and systemd
#[derive(Debug, Clone)]
pub struct K0sRuntime {
    runner: Runner,
    config_path: PathBuf,
    token_path: PathBuf,
}

impl Default for K0sRuntime {
    fn default() -> Self {
        Self {
            runner: Runner,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
        }
    }
}

impl K0sRuntime {
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Where a worker's join secret is kept. The installed `k0sworker` unit
    /// points at this file and reads it on every start.
    #[must_use]
    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Write the worker secret for `role`, returning the path to hand to
    /// `k0s install`. Controller roles need no file.
    fn stage_token(
        &self,
        role: ClusterRole,
        secret: Option<&JoinSecret>,
    ) -> Result<Option<&Path>, ProvisionError> {
        match (role, secret) {
            (ClusterRole::Worker, Some(secret)) => {
                write_token_file(&self.token_path, secret)?;
                Ok(Some(&self.token_path))
            }
            (ClusterRole::Worker, None) => Err(ProvisionError::precondition(
                "a worker needs a join secret",
                "use the token printed by `galley worker invite`",
            )),
            _ => Ok(None),
        }
    }
}

/// Write `secret` to `path`, readable by root only. An existing file is
/// replaced so a fresh invite takes over from a stale one.
fn write_token_file(path: &Path, secret: &JoinSecret) -> Result<(), ProvisionError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|e| ProvisionError::io(format!("cannot create {}", dir.display()), e))?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| ProvisionError::io(format!("cannot create {}", path.display()), e))?;
    file.write_all(secret.expose().as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| ProvisionError::io(format!("cannot write {}", path.display()), e))?;
    debug!(path = %path.display(), "worker token written");
    Ok(())
}

/// systemd unit k0s installs for `role`
#[must_use]
pub const fn service_unit(role: ClusterRole) -> &'static str {
    if role.installs_control_plane() {
        "k0scontroller"
    } else {
        "k0sworker"
    }
}

/// Arguments to `k0s` installing the service for `role`
#[must_use]
pub fn install_args(role: ClusterRole, config: &Path, token_file: Option<&Path>) -> Vec<String> {
    let mut args = vec!["install".to_string()];
    match role {
        ClusterRole::Controller | ClusterRole::ControllerWorker => {
            args.extend(["controller".to_string(), "-c".to_string()]);
            args.push(config.display().to_string());
            if role.runs_workloads() {
                args.extend(["--enable-worker".to_string(), "--no-taints".to_string()]);
            }
        }
        ClusterRole::Worker => {
            args.push("worker".to_string());
            if let Some(file) = token_file {
                args.push("--token-file".to_string());
                args.push(file.display().to_string());
            }
        }
    }
    args
}

/// Whether an installed unit file already runs the service `role` needs.
/// Only a controller's `--enable-worker` flag can differ between roles
/// sharing a unit.
fn unit_matches_role(unit: &str, role: ClusterRole) -> bool {
    if !role.installs_control_plane() {
        return true;
    }
    let enables_worker = unit
        .lines()
        .filter(|line| line.trim_start().starts_with("ExecStart="))
        .any(|line| line.contains("--enable-worker"));
    enables_worker == role.runs_workloads()
}

#[async_trait]
impl ClusterRuntime for K0sRuntime {
    async fn ensure_installed(&self) -> Result<(), ProvisionError> {
        if self.runner.has("k0s") {
            debug!("k0s already installed");
            return Ok(());
        }
        if !cfg!(target_os = "linux") {
            return Err(ProvisionError::precondition(
                "k0s can only be installed on Linux",
                "run the agent on a Linux host",
            ));
        }

        info!("installing k0s");
        self.runner.shell(INSTALL_SCRIPT).await?;

        if !self.runner.has("k0s") {
            return Err(ProvisionError::precondition(
                "k0s is not on PATH after installation",
                "make sure /usr/local/bin is on PATH",
            ));
        }
        Ok(())
    }

    async fn ensure_config(&self) -> Result<bool, ProvisionError> {
        if self.config_path.exists() {
            debug!(path = %self.config_path.display(), "k0s config present");
            return Ok(false);
        }
        if let Some(dir) = self.config_path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| ProvisionError::io(format!("cannot create {}", dir.display()), e))?;
        }

        let config = self.runner.output("k0s", &["config", "create"]).await?;
        if config.trim().is_empty() {
            return Err(ProvisionError::Command {
                command: "k0s config create".to_string(),
                reason: "produced no output".to_string(),
            });
        }
        std::fs::write(&self.config_path, config).map_err(|e| {
            ProvisionError::io(format!("cannot write {}", self.config_path.display()), e)
        })?;
        info!(path = %self.config_path.display(), "wrote default k0s config");
        Ok(true)
    }

    async fn edit_config(&self) -> Result<(), ProvisionError> {
        let editor = self.runner.editor().ok_or_else(|| {
            ProvisionError::precondition(
                "no text editor found",
                format!("set EDITOR or edit {} by hand", self.config_path.display()),
            )
        })?;

        let path = self.config_path.display().to_string();
        self.runner.run(&editor, &[&path]).await
    }

    async fn install_service(
        &self,
        role: ClusterRole,
        secret: Option<&JoinSecret>,
    ) -> Result<(), ProvisionError> {
        let token_file = self.stage_token(role, secret)?;

        let unit = service_unit(role);
        let unit_file = Path::new(UNIT_DIR).join(format!("{unit}.service"));
        let installed = std::fs::read_to_string(&unit_file).ok();
        if let Some(existing) = &installed {
            if unit_matches_role(existing, role) {
                info!(unit, "k0s service already installed");
                return Ok(());
            }
            info!(unit, role = %role, "k0s service installed for another role, reinstalling");
        }

        let mut args = install_args(role, &self.config_path, token_file);
        if installed.is_some() {
            args.push("--force".to_string());
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run("k0s", &args).await
    }

    async fn start_service(&self, role: ClusterRole) -> Result<(), ProvisionError> {
        let unit = service_unit(role);
        self.runner.run("systemctl", &["enable", unit]).await?;
        self.runner.run("systemctl", &["start", unit]).await?;
        info!(unit, "k0s service started");
        Ok(())
    }

    async fn any_service_active(&self) -> bool {
        for unit in ["k0scontroller", "k0sworker"] {
            if self
                .runner
                .succeeds("systemctl", &["is-active", "--quiet", unit])
                .await
            {
                return true;
            }
        }
        false
    }

    async fn create_join_token(&self, expiry: &str) -> Result<JoinSecret, ProvisionError> {
        let expiry_arg = format!("--expiry={expiry}");
        let output = self
            .runner
            .output("k0s", &["token", "create", "--role", "worker", &expiry_arg])
            .await?;
        let token = output.trim();
        if token.is_empty() {
            return Err(ProvisionError::Command {
                command: "k0s token create".to_string(),
                reason: "produced no token".to_string(),
            });
        }
        Ok(JoinSecret::new(token))
    }

    async fn version(&self) -> Option<String> {
        let output = self.runner.output("k0s", &["version"]).await.ok()?;
        let version = output.trim();
        (!version.is_empty()).then(|| version.to_string())
    }
}
