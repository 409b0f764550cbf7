use std::path::{Path, PathBuf};

/// Where the agent keeps its state, config and action log.
///
/// Built once at startup and handed to every component that touches disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Directory holding progress files
    pub state_dir: PathBuf,
    /// YAML agent config file
    pub config_path: PathBuf,
    /// Append-only action log
    pub log_path: PathBuf,
}

impl Environment {
    /// System state directory
    pub const DEFAULT_STATE_DIR: &'static str = "/var/lib/galley";

    /// System action log
    pub const DEFAULT_LOG_PATH: &'static str = "/var/log/galley/galley.log";

    /// Locations on a real host: system state and log, config in the
    /// invoking user's home even under sudo.
    #[must_use]
    pub fn system() -> Self {
        let home = real_user_home().unwrap_or_else(|| PathBuf::from("/root"));
        Self {
            state_dir: PathBuf::from(Self::DEFAULT_STATE_DIR),
            config_path: home.join(".galley").join("config"),
            log_path: PathBuf::from(Self::DEFAULT_LOG_PATH),
        }
    }

    /// Everything under one directory
    #[must_use]
    pub fn rooted(root: &Path) -> Self {
        Self {
            state_dir: root.join("state"),
            config_path: root.join("config"),
            log_path: root.join("galley.log"),
        }
    }

    /// Progress of `node prepare`
    #[must_use]
    pub fn prepare_progress_path(&self) -> PathBuf {
        self.state_dir.join("prepare-progress.json")
    }

    /// Progress of an in-flight controller or worker join
    #[must_use]
    pub fn join_progress_path(&self) -> PathBuf {
        self.state_dir.join("join-progress.json")
    }
}

/// Home directory of the user who invoked the agent, looking through sudo
#[must_use]
pub fn real_user_home() -> Option<PathBuf> {
    resolve_home(
        std::env::var("SUDO_USER").ok(),
        std::env::var("SUDO_HOME").ok(),
    )
    .or_else(|| directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()))
}

fn resolve_home(sudo_user: Option<String>, sudo_home: Option<String>) -> Option<PathBuf> {
    let user = sudo_user.filter(|u| !u.is_empty())?;
    if let Some(home) = sudo_home.filter(|h| !h.is_empty()) {
        return Some(PathBuf::from(home));
    }
    if user == "root" {
        return Some(PathBuf::from("/root"));
    }
    Some(Path::new("/home").join(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_home_under_sudo() {
        assert_eq!(
            resolve_home(Some("ada".into()), None),
            Some(PathBuf::from("/home/ada"))
        );
        assert_eq!(
            resolve_home(Some("ada".into()), Some("/srv/ada".into())),
            Some(PathBuf::from("/srv/ada"))
        );
        assert_eq!(
            resolve_home(Some("root".into()), None),
            Some(PathBuf::from("/root"))
        );
        assert_eq!(resolve_home(None, Some("/srv/ada".into())), None);
        assert_eq!(resolve_home(Some(String::new()), None), None);
    }

    #[test]
    fn test_rooted_layout() {
        let env = Environment::rooted(Path::new("/tmp/galley-test"));
        assert_eq!(
            env.prepare_progress_path(),
            PathBuf::from("/tmp/galley-test/state/prepare-progress.json")
        );
        assert_eq!(
            env.join_progress_path(),
            PathBuf::from("/tmp/galley-test/state/join-progress.json")
        );
    }
}
