//! Agent configuration file.

use galley_core::{ClusterRole, PersistError};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ProvisionError;
use crate::session::write_atomic;

/// Keys an operator may set with `galley config set`
pub const OPERATOR_KEYS: [&str; 3] = ["download_base", "platform_url", "client_url"];

/// Persistent agent configuration (YAML).
///
/// `vessel_engine_id` and `node_type` are written by the join workflows
/// once a join has succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Where the agent and its install script are downloaded from
    #[serde(default = "default_download_base")]
    pub download_base: String,

    /// Platform API host. Empty means no platform (air-gapped).
    #[serde(default = "default_platform_url")]
    pub platform_url: String,

    /// Web console URL shown in hand-off instructions
    #[serde(default = "default_client_url")]
    pub client_url: String,

    /// Cluster this node joined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel_engine_id: Option<String>,

    /// Role this node joined with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<ClusterRole>,
}

fn default_download_base() -> String {
    "https://get.galley.run".to_string()
}

fn default_platform_url() -> String {
    "api.galley.run".to_string()
}

fn default_client_url() -> String {
    "https://cloud.galley.run".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            download_base: default_download_base(),
            platform_url: default_platform_url(),
            client_url: default_client_url(),
            vessel_engine_id: None,
            node_type: None,
        }
    }
}

impl AgentConfig {
    /// Load configuration from file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, PersistError> {
        match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(Self::default()),
            Ok(content) => {
                serde_yaml::from_str(&content).map_err(|e| PersistError::corrupt(path, e))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(PersistError::io(path, e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let content = serde_yaml::to_string(self).map_err(|e| PersistError::corrupt(path, e))?;
        write_atomic(path, content.as_bytes())
    }

    /// Look up a key by its file name
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "download_base" => Some(self.download_base.clone()),
            "platform_url" => Some(self.platform_url.clone()),
            "client_url" => Some(self.client_url.clone()),
            "vessel_engine_id" => self.vessel_engine_id.clone(),
            "node_type" => self.node_type.map(|role| role.to_string()),
            _ => None,
        }
    }

    /// Set an operator key
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ProvisionError> {
        let slot = match key {
            "download_base" => &mut self.download_base,
            "platform_url" => &mut self.platform_url,
            "client_url" => &mut self.client_url,
            _ => {
                return Err(ProvisionError::UnknownConfigKey {
                    key: key.to_string(),
                })
            }
        };
        *slot = value.trim().to_string();
        Ok(())
    }

    /// All set keys with their values, in file order
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        ["download_base", "platform_url", "client_url", "vessel_engine_id", "node_type"]
            .into_iter()
            .filter_map(|key| self.get(key).map(|value| (key, value)))
            .collect()
    }

    /// Remember the cluster and role of a successful join
    pub fn record_join(&mut self, cluster_id: &str, role: ClusterRole) {
        self.vessel_engine_id = Some(cluster_id.to_string());
        self.node_type = Some(role);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AgentConfig::load(&dir.path().join("config")).unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.platform_url, "api.galley.run");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "platform_url: \"\"\n").unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.platform_url, "");
        assert_eq!(config.client_url, "https://cloud.galley.run");
    }

    #[test]
    fn test_save_and_reload_join() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".galley/config");

        let mut config = AgentConfig::default();
        config.record_join("9c1d-engine", ClusterRole::ControllerWorker);
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("vessel_engine_id: 9c1d-engine"));
        assert!(content.contains("node_type: controller+worker"));

        let loaded = AgentConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.get("node_type").as_deref(), Some("controller+worker"));
    }

    #[test]
    fn test_set_only_operator_keys() {
        let mut config = AgentConfig::default();
        config.set("platform_url", " http://localhost:8080 ").unwrap();
        assert_eq!(config.platform_url, "http://localhost:8080");

        assert!(matches!(
            config.set("vessel_engine_id", "x"),
            Err(ProvisionError::UnknownConfigKey { .. })
        ));
        assert!(config.set("api_key", "x").is_err());
    }

    #[test]
    fn test_entries_skip_unset_keys() {
        let config = AgentConfig::default();
        let keys: Vec<_> = config.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, OPERATOR_KEYS.to_vec());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "node_type: [not, a, role]\n").unwrap();
        assert!(matches!(
            AgentConfig::load(&path),
            Err(PersistError::Corrupt { .. })
        ));
    }
}
