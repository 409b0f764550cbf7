use async_trait::async_trait;
use galley_core::{parse_os_release, HostFacts};
use std::collections::BTreeSet;
use std::fs::{DirBuilder, OpenOptions};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::command::Runner;
use super::facts;
use super::packages::PackageManager;
use crate::env::real_user_home;
use crate::error::ProvisionError;
use crate::host::{DirectiveFile, HostConfigEditor, HostMaintenance, OperatorPrompt, Separator};

/// Password aging policy written to `login.defs`
const PASSWORD_POLICY: [(&str, &str); 4] = [
    ("PASS_MAX_DAYS", "90"),
    ("PASS_MIN_DAYS", "1"),
    ("PASS_MIN_LEN", "14"),
    ("PASS_WARN_AGE", "7"),
];

/// Password hash used when `login.defs` names none
const DEFAULT_ENCRYPT_METHOD: &str = "SHA512";

/// PAM stacks carrying the password rules, Debian first
const PAM_STACKS: [&str; 3] = [
    "pam.d/common-password",
    "pam.d/system-auth",
    "pam.d/password-auth",
];

const PAM_QUALITY_ARGS: &str = "retry=3 minlen=14 dcredit=-1 ucredit=-1 ocredit=-1 lcredit=-1";

const CRACKLIB_MODULE: &str = "/lib/security/pam_cracklib.so";

const FTP_SERVICES: [&str; 3] = ["vsftpd", "proftpd", "pure-ftpd"];

/// Listening ports a cluster node is expected to have open
const EXPECTED_PORTS: [(u16, &str); 7] = [
    (22, "SSH"),
    (53, "DNS"),
    (68, "DHCP client"),
    (6443, "Kubernetes API"),
    (8132, "konnectivity"),
    (9443, "k0s API"),
    (10250, "kubelet"),
];

const APT_PERIODIC: &str = r#"APT::Periodic::Update-Package-Lists "1";
APT::Periodic::Unattended-Upgrade "1";
APT::Periodic::AutocleanInterval "7";
"#;

const APT_UNATTENDED: &str = r#"Unattended-Upgrade::Allowed-Origins {
        "${distro_id}:${distro_codename}-security";
        "${distro_id}ESMApps:${distro_codename}-apps-security";
        "${distro_id}ESM:${distro_codename}-infra-security";
};
Unattended-Upgrade::Remove-Unused-Dependencies "true";
Unattended-Upgrade::Automatic-Reboot "false";
"#;

const DNF_AUTOMATIC: &str = "[commands]
upgrade_type = security
random_sleep = 0
download_updates = yes
apply_updates = yes

[emitters]
emit_via = stdio
";

const YUM_CRON: &str = "[commands]
update_cmd = security
update_messages = yes
download_updates = yes
apply_updates = yes
random_sleep = 0

[emitters]
emit_via = stdio
";

/// The local Linux host
#[derive(Debug, Clone)]
pub struct SystemHost {
    runner: Runner,
    etc: PathBuf,
    /// Checks a rewritten sshd_config with `-t`
    sshd: &'static str,
}

impl Default for SystemHost {
    fn default() -> Self {
        Self {
            runner: Runner,
            etc: PathBuf::from("/etc"),
            sshd: "sshd",
        }
    }
}

impl SystemHost {
    fn sshd_config(&self) -> PathBuf {
        self.etc.join("ssh/sshd_config")
    }

    /// Current sshd_config, kept so a rejected edit can be undone
    fn sshd_snapshot(&self) -> Result<String, ProvisionError> {
        let path = self.sshd_config();
        std::fs::read_to_string(&path)
            .map_err(|e| ProvisionError::io(format!("cannot read {}", path.display()), e))
    }

    fn os_release(&self) -> PathBuf {
        self.etc.join("os-release")
    }

    async fn enable_automatic_updates(&self, manager: PackageManager) -> Result<(), ProvisionError> {
        let (files, service): (Vec<(&str, &str)>, &str) = match manager {
            PackageManager::Apt => (
                vec![
                    ("apt/apt.conf.d/20auto-upgrades", APT_PERIODIC),
                    ("apt/apt.conf.d/50unattended-upgrades", APT_UNATTENDED),
                ],
                "unattended-upgrades",
            ),
            PackageManager::Dnf => (vec![("dnf/automatic.conf", DNF_AUTOMATIC)], "dnf-automatic.timer"),
            PackageManager::Yum => (vec![("yum/yum-cron.conf", YUM_CRON)], "yum-cron"),
            _ => {
                debug!(manager = ?manager, "no automatic update support");
                return Ok(());
            }
        };

        for (relative, content) in files {
            let path = self.etc.join(relative);
            write_file(&path, content)?;
        }
        self.runner.run("systemctl", &["enable", service]).await?;
        self.runner.run("systemctl", &["start", service]).await?;
        info!(service, "automatic security updates enabled");
        Ok(())
    }

    async fn offer_release_upgrade(&self, prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError> {
        if !self.runner.has("do-release-upgrade") {
            return Ok(());
        }

        let policy_file = self.etc.join("update-manager/release-upgrades");
        let policy = DirectiveFile::new(Separator::Equals);
        match policy.read_directive(&policy_file, "Prompt") {
            Ok(Some(current)) if current != "lts" => {
                if !prompt.confirm("Only upgrade to LTS releases?", true) {
                    info!(policy = %current, "keeping release upgrade policy");
                    return Ok(());
                }
                policy.set_directive(&policy_file, "Prompt", "lts")?;
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "no release upgrade policy"),
        }

        let Ok(output) = self
            .runner
            .output("do-release-upgrade", &["--check-dist-upgrade-only"])
            .await
        else {
            debug!("no new release available");
            return Ok(());
        };
        let Some(release) = new_release(&output) else {
            debug!("no new release available");
            return Ok(());
        };

        let current = std::fs::read_to_string(self.os_release())
            .map(|content| parse_os_release(&content))
            .unwrap_or_default()
            .remove("VERSION_ID")
            .unwrap_or_default();
        if !current.is_empty() && release.starts_with(&current) {
            return Ok(());
        }

        if prompt.confirm(&format!("Upgrade the distribution to {release}?"), true) {
            self.runner
                .run(
                    "do-release-upgrade",
                    &["-f", "DistUpgradeViewNonInteractive", "-y"],
                )
                .await?;
        }
        Ok(())
    }

    /// Offer to install the OpenSSH server. Returns true if installed.
    async fn install_ssh_server(&self, prompt: &dyn OperatorPrompt) -> Result<bool, ProvisionError> {
        if !prompt.confirm("OpenSSH server is not installed. Install it now?", true) {
            return Ok(false);
        }
        let manager = PackageManager::require(&self.runner)?;
        let (package, service) = manager.ssh_server();
        manager.install(&self.runner, &[package]).await?;
        self.runner.run("systemctl", &["enable", service]).await?;
        self.runner.run("systemctl", &["start", service]).await?;
        Ok(true)
    }

    /// Returns true if a user other than root can use sudo
    async fn has_sudo_user(&self) -> bool {
        let user = std::env::var("USER").unwrap_or_default();
        if user.is_empty() || user == "root" {
            for group in ["sudo", "wheel"] {
                if let Ok(line) = self.runner.output("getent", &["group", group]).await {
                    if !parse_group_members(&line).is_empty() {
                        return true;
                    }
                }
            }
            return false;
        }

        let in_group = self
            .runner
            .output("groups", &[user.as_str()])
            .await
            .is_ok_and(|groups| {
                groups
                    .split_whitespace()
                    .any(|g| g == "sudo" || g == "wheel")
            });
        in_group && self.runner.succeeds("sudo", &["-n", "true"]).await
    }

    /// Confirm a change that could lock the operator out
    async fn sudo_guard(&self, prompt: &dyn OperatorPrompt, action: &str) -> bool {
        if self.has_sudo_user().await {
            return true;
        }
        warn!("no user other than root has sudo rights");
        prompt.confirm(
            &format!("No sudo user found. {action} may lock you out. Continue anyway?"),
            false,
        )
    }

    /// Validate the edited sshd_config and reload the daemon. A config the
    /// daemon rejects is replaced by `original` before the error is returned.
    async fn apply_sshd_change(&self, original: &str) -> Result<(), ProvisionError> {
        if let Err(e) = self.runner.run(self.sshd, &["-t"]).await {
            let path = self.sshd_config();
            write_file(&path, original)?;
            warn!(path = %path.display(), "sshd rejected the new configuration, previous one restored");
            return Err(e);
        }
        for service in ["sshd", "ssh"] {
            if self.runner.succeeds("systemctl", &["reload", service]).await
                || self.runner.succeeds("systemctl", &["restart", service]).await
            {
                info!(service, "ssh daemon reloaded");
                return Ok(());
            }
        }
        warn!("could not reload the ssh daemon, restart it manually");
        Ok(())
    }

    /// Offer to open the operator's authorized_keys in an editor. Returns
    /// true if the file holds a key afterwards.
    async fn offer_authorized_keys_edit(
        &self,
        prompt: &dyn OperatorPrompt,
    ) -> Result<bool, ProvisionError> {
        let Some(home) = real_user_home() else {
            return Ok(false);
        };
        if !prompt.confirm(
            "No authorized SSH keys found. Open ~/.ssh/authorized_keys to add one now?",
            false,
        ) {
            return Ok(false);
        }
        let editor = self.runner.editor().ok_or_else(|| {
            ProvisionError::precondition(
                "no text editor found",
                "set EDITOR or add your key to ~/.ssh/authorized_keys by hand",
            )
        })?;

        let keys = prepare_authorized_keys(&home)?;
        let path = keys.display().to_string();
        self.runner.run(&editor, &[&path]).await?;
        Ok(has_authorized_keys(&keys))
    }

    /// Prompt to disable password logins. Returns true if sshd_config changed.
    fn offer_password_auth_disable(
        &self,
        prompt: &dyn OperatorPrompt,
        default_yes: bool,
    ) -> Result<bool, ProvisionError> {
        let path = self.sshd_config();
        let sshd = DirectiveFile::sshd();
        let current = sshd.read_directive(&path, "PasswordAuthentication")?;
        if !password_auth_enabled(current.as_deref()) {
            return Ok(false);
        }
        if !prompt.confirm("Disable SSH password authentication?", default_yes) {
            return Ok(false);
        }
        sshd.set_directive(&path, "PasswordAuthentication", "no")
    }

    fn apply_password_policy(&self) -> Result<(), ProvisionError> {
        let path = self.etc.join("login.defs");
        let defs = DirectiveFile::login_defs();
        for (key, value) in PASSWORD_POLICY {
            defs.set_directive(&path, key, value)?;
        }
        defs.ensure_present(&path, "ENCRYPT_METHOD", DEFAULT_ENCRYPT_METHOD)?;
        info!("password aging policy applied");
        Ok(())
    }

    fn configure_password_quality(&self) -> Result<(), ProvisionError> {
        let Some(path) = PAM_STACKS
            .iter()
            .map(|stack| self.etc.join(stack))
            .find(|path| path.exists())
        else {
            warn!("no PAM password stack found, skipping password quality rules");
            return Ok(());
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| ProvisionError::io(format!("cannot read {}", path.display()), e))?;
        let module = if Path::new(CRACKLIB_MODULE).exists() {
            "pam_cracklib.so"
        } else {
            "pam_pwquality.so"
        };
        match require_password_quality(&content, module) {
            Some(updated) => {
                write_file(&path, &updated)?;
                info!(path = %path.display(), "password quality rules applied");
            }
            None => debug!(path = %path.display(), "password quality rules already present"),
        }
        Ok(())
    }

    async fn install_security_tools(&self) -> Result<(), ProvisionError> {
        let Some(manager) = PackageManager::detect(&self.runner) else {
            warn!("no supported package manager, skipping fail2ban");
            return Ok(());
        };
        manager.install(&self.runner, &["fail2ban", "htop"]).await
    }

    async fn lock_root(&self, prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError> {
        match self.runner.output("passwd", &["-S", "root"]).await {
            Ok(status) if root_locked(&status) => {
                debug!("root password already locked");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "cannot read root password status");
                return Ok(());
            }
        }
        if !prompt.confirm("Lock the root password?", true) {
            return Ok(());
        }
        if !self.sudo_guard(prompt, "Locking root").await {
            return Ok(());
        }
        self.runner.run("passwd", &["-l", "root"]).await
    }

    async fn ensure_multi_user_target(&self) -> Result<(), ProvisionError> {
        let current = self.runner.output("systemctl", &["get-default"]).await?;
        if current.trim() == "multi-user.target" {
            return Ok(());
        }
        self.runner
            .run("systemctl", &["set-default", "multi-user.target"])
            .await
    }

    async fn offer_ftp_disable(&self, prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError> {
        for service in FTP_SERVICES {
            if !self
                .runner
                .succeeds("systemctl", &["is-active", "--quiet", service])
                .await
            {
                continue;
            }
            warn!(service, "FTP server running");
            if !prompt.confirm(
                &format!("{service} is running and FTP is unencrypted. Stop and disable it?"),
                false,
            ) {
                continue;
            }
            self.runner.run("systemctl", &["stop", service]).await?;
            self.runner.run("systemctl", &["disable", service]).await?;
        }
        Ok(())
    }

    /// Report listening ports a cluster node has no use for
    async fn scan_open_ports(&self) {
        let output = match self.runner.output("ss", &["-tuln"]).await {
            Ok(output) => output,
            Err(_) => match self.runner.output("netstat", &["-tuln"]).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(error = %e, "cannot list open ports, neither ss nor netstat works");
                    return;
                }
            },
        };

        let open = listening_ports(&output);
        for (port, service) in EXPECTED_PORTS.iter().filter(|(port, _)| open.contains(port)) {
            debug!(port, service, "expected open port");
        }
        let unexpected = unexpected_ports(&open);
        if unexpected.is_empty() {
            info!(open = open.len(), "no unexpected open ports");
            return;
        }
        for port in &unexpected {
            warn!(port, "unexpected open port");
        }
        warn!(
            count = unexpected.len(),
            "review the ports above and restrict them with a firewall (ufw or iptables) if unneeded"
        );
    }
}

#[async_trait]
impl HostMaintenance for SystemHost {
    async fn update_os(&self, prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError> {
        let manager = PackageManager::require(&self.runner)?;
        info!(manager = ?manager, "updating packages");
        manager.update(&self.runner).await?;

        if manager == PackageManager::Apt {
            self.offer_release_upgrade(prompt).await?;
        }
        self.enable_automatic_updates(manager).await
    }

    async fn harden_ssh(&self, prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError> {
        let path = self.sshd_config();
        if !path.exists() && !(self.install_ssh_server(prompt).await? && path.exists()) {
            warn!(path = %path.display(), "no sshd configuration, skipping SSH hardening");
            return Ok(());
        }

        let original = self.sshd_snapshot()?;
        let sshd = DirectiveFile::sshd();
        let mut changed = false;

        let root_login = sshd.read_directive(&path, "PermitRootLogin")?;
        if root_login_enabled(root_login.as_deref())
            && self.sudo_guard(prompt, "Disabling root login").await
            && prompt.confirm("Disable root login over SSH?", true)
        {
            changed |= sshd.set_directive(&path, "PermitRootLogin", "no")?;
        }

        let password = sshd.read_directive(&path, "PasswordAuthentication")?;
        if password_auth_enabled(password.as_deref()) {
            let mut has_keys = real_user_home()
                .is_some_and(|home| has_authorized_keys(&home.join(".ssh/authorized_keys")));
            if !has_keys {
                warn!("SSH password login is enabled and no authorized keys were found; add a key before disabling passwords");
                has_keys = self.offer_authorized_keys_edit(prompt).await?;
            }
            changed |= self.offer_password_auth_disable(prompt, has_keys)?;
        }

        if changed {
            self.apply_sshd_change(&original).await?;
        }
        Ok(())
    }

    async fn harden_server(&self, prompt: &dyn OperatorPrompt) -> Result<(), ProvisionError> {
        self.apply_password_policy()?;
        self.configure_password_quality()?;
        self.install_security_tools().await?;
        self.lock_root(prompt).await?;
        self.ensure_multi_user_target().await?;

        if self.sshd_config().exists() {
            let original = self.sshd_snapshot()?;
            if self.offer_password_auth_disable(prompt, true)? {
                self.apply_sshd_change(&original).await?;
            }
        }

        self.offer_ftp_disable(prompt).await?;
        self.scan_open_ports().await;
        Ok(())
    }

    async fn host_facts(&self) -> Result<HostFacts, ProvisionError> {
        Ok(facts::measure(&self.os_release()))
    }

    async fn reboot(&self) -> Result<(), ProvisionError> {
        self.runner.run("reboot", &[]).await
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), ProvisionError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|e| ProvisionError::io(format!("cannot create {}", dir.display()), e))?;
    }
    std::fs::write(path, content)
        .map_err(|e| ProvisionError::io(format!("cannot write {}", path.display()), e))
}

/// Create `~/.ssh/authorized_keys` (and its directory) with the modes sshd
/// insists on, keeping any existing keys
fn prepare_authorized_keys(home: &Path) -> Result<PathBuf, ProvisionError> {
    let dir = home.join(".ssh");
    DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(&dir)
        .map_err(|e| ProvisionError::io(format!("cannot create {}", dir.display()), e))?;

    let keys = dir.join("authorized_keys");
    OpenOptions::new()
        .append(true)
        .create(true)
        .mode(0o600)
        .open(&keys)
        .map_err(|e| ProvisionError::io(format!("cannot create {}", keys.display()), e))?;
    Ok(keys)
}

/// True if `path` lists at least one key
fn has_authorized_keys(path: &Path) -> bool {
    std::fs::read_to_string(path).is_ok_and(|content| {
        content.lines().any(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
    })
}

/// Rewrite a PAM password stack so new passwords need 14 characters from
/// all four character classes; `None` if the rules are already in place.
///
/// An existing `pam_pwquality`/`pam_cracklib` line is replaced. Otherwise
/// `module` is added ahead of the first `password` rule.
fn require_password_quality(content: &str, module: &str) -> Option<String> {
    let rule = |module: &str| format!("password    requisite     {module} {PAM_QUALITY_ARGS}");
    let active = |line: &str| !line.trim_start().starts_with('#');
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    let existing = lines.iter().position(|line| {
        active(line) && (line.contains("pam_pwquality.so") || line.contains("pam_cracklib.so"))
    });
    match existing {
        Some(index) if lines[index].contains("minlen=14") => return None,
        Some(index) => {
            let current = if lines[index].contains("pam_pwquality.so") {
                "pam_pwquality.so"
            } else {
                "pam_cracklib.so"
            };
            lines[index] = rule(current);
        }
        None => {
            let first = lines
                .iter()
                .position(|line| active(line) && line.trim_start().starts_with("password"))?;
            lines.insert(first, rule(module));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Some(out)
}

/// Local ports in `ss -tuln` or `netstat -tuln` output
fn listening_ports(output: &str) -> BTreeSet<u16> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if !fields.first()?.starts_with("tcp") && !fields.first()?.starts_with("udp") {
                return None;
            }
            // ss puts the socket state second, netstat a queue size
            let local = if matches!(fields.get(1), Some(&("LISTEN" | "UNCONN"))) {
                fields.get(4)?
            } else {
                fields.get(3)?
            };
            let (_, port) = local.rsplit_once(':')?;
            port.parse().ok()
        })
        .collect()
}

fn unexpected_ports(open: &BTreeSet<u16>) -> Vec<u16> {
    open.iter()
        .copied()
        .filter(|port| !EXPECTED_PORTS.iter().any(|(expected, _)| expected == port))
        .collect()
}

/// `PermitRootLogin` allows root unless set to `no` or `forced-commands-only`
fn root_login_enabled(value: Option<&str>) -> bool {
    matches!(
        value,
        None | Some("yes" | "prohibit-password" | "without-password")
    )
}

/// `PasswordAuthentication` defaults to yes
fn password_auth_enabled(value: Option<&str>) -> bool {
    matches!(value, None | Some("yes"))
}

/// Members of a `getent group` line other than root
fn parse_group_members(line: &str) -> Vec<&str> {
    line.trim()
        .split(':')
        .nth(3)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|member| !member.is_empty() && *member != "root")
        .collect()
}

/// `passwd -S` reports `L` (or `LK`) in its second field for a locked account
fn root_locked(status: &str) -> bool {
    matches!(status.split_whitespace().nth(1), Some("L" | "LK"))
}

/// Release name from `do-release-upgrade --check-dist-upgrade-only`
fn new_release(output: &str) -> Option<&str> {
    let (_, rest) = output.split_once("New release '")?;
    let (release, _) = rest.split_once('\'')?;
    Some(release).filter(|r| !r.is_empty())
}
