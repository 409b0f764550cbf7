use super::command::Runner;
use crate::error::ProvisionError;

/// Supported package managers, in detection order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Zypper,
    Pacman,
    Apk,
}

impl PackageManager {
    pub const ALL: [Self; 6] = [
        Self::Apt,
        Self::Dnf,
        Self::Yum,
        Self::Zypper,
        Self::Pacman,
        Self::Apk,
    ];

    /// First package manager found on `PATH`
    #[must_use]
    pub fn detect(runner: &Runner) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|manager| runner.has(manager.binary()))
    }

    /// Like [`detect`](Self::detect), failing when none is found
    pub fn require(runner: &Runner) -> Result<Self, ProvisionError> {
        Self::detect(runner).ok_or_else(|| {
            ProvisionError::precondition(
                "unsupported package manager",
                "supported package managers: apt, dnf, yum, zypper, pacman, apk",
            )
        })
    }

    #[must_use]
    pub const fn binary(&self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Yum => "yum",
            Self::Zypper => "zypper",
            Self::Pacman => "pacman",
            Self::Apk => "apk",
        }
    }

    /// Commands bringing the system fully up to date, in order
    #[must_use]
    pub fn update_commands(&self) -> Vec<Vec<&'static str>> {
        match self {
            Self::Apt => vec![
                vec!["apt-get", "update"],
                vec!["apt-get", "install", "-y", "unattended-upgrades"],
                vec!["apt-get", "upgrade", "-y"],
                vec!["apt-get", "dist-upgrade", "-y"],
                vec!["apt-get", "autoremove", "-y"],
                vec!["apt-get", "autoclean"],
            ],
            Self::Dnf => vec![
                vec!["dnf", "install", "-y", "dnf-automatic"],
                vec!["dnf", "upgrade", "-y", "--refresh", "--security"],
            ],
            Self::Yum => vec![
                vec!["yum", "install", "-y", "yum-cron"],
                vec!["yum", "update", "-y", "--security"],
            ],
            Self::Zypper => vec![
                vec!["zypper", "refresh"],
                vec!["zypper", "update", "-y", "--auto-agree-with-licenses"],
                vec!["zypper", "patch", "-y", "--category", "security"],
            ],
            Self::Pacman => vec![vec!["pacman", "-Syu", "--noconfirm"]],
            Self::Apk => vec![vec!["apk", "update"], vec!["apk", "upgrade", "--available"]],
        }
    }

    /// Command prefix installing packages non-interactively
    #[must_use]
    pub const fn install_prefix(&self) -> &'static [&'static str] {
        match self {
            Self::Apt => &["apt-get", "install", "-y"],
            Self::Dnf => &["dnf", "install", "-y"],
            Self::Yum => &["yum", "install", "-y"],
            Self::Zypper => &["zypper", "install", "-y"],
            Self::Pacman => &["pacman", "-S", "--noconfirm"],
            Self::Apk => &["apk", "add"],
        }
    }

    /// OpenSSH server package and its service unit
    #[must_use]
    pub const fn ssh_server(&self) -> (&'static str, &'static str) {
        match self {
            Self::Apt => ("openssh-server", "ssh"),
            Self::Dnf | Self::Yum => ("openssh-server", "sshd"),
            Self::Zypper | Self::Pacman | Self::Apk => ("openssh", "sshd"),
        }
    }

    /// Install `packages`
    pub async fn install(&self, runner: &Runner, packages: &[&str]) -> Result<(), ProvisionError> {
        let (program, prefix) = split(self.install_prefix());
        let args: Vec<&str> = prefix.iter().chain(packages).copied().collect();
        runner.run(program, &args).await
    }

    /// Run every update command, stopping at the first failure
    pub async fn update(&self, runner: &Runner) -> Result<(), ProvisionError> {
        for command in self.update_commands() {
            let (program, args) = split(&command);
            runner.run(program, args).await?;
        }
        Ok(())
    }
}

fn split<'a>(command: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    match command.split_first() {
        Some((program, args)) => (*program, args),
        None => ("true", &[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apt_update_sequence() {
        let commands = PackageManager::Apt.update_commands();
        assert_eq!(commands.first().unwrap(), &vec!["apt-get", "update"]);
        assert_eq!(commands.last().unwrap(), &vec!["apt-get", "autoclean"]);
        assert_eq!(commands.len(), 6);
    }

    #[test]
    fn test_commands_use_own_binary() {
        for manager in PackageManager::ALL {
            for command in manager.update_commands() {
                assert_eq!(command[0], manager.binary());
            }
            assert_eq!(manager.install_prefix()[0], manager.binary());
        }
    }

    #[test]
    fn test_ssh_server_packages() {
        assert_eq!(PackageManager::Apt.ssh_server(), ("openssh-server", "ssh"));
        assert_eq!(PackageManager::Yum.ssh_server(), ("openssh-server", "sshd"));
        assert_eq!(PackageManager::Apk.ssh_server(), ("openssh", "sshd"));
    }
}
