use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Host facts measured on the local machine at report time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFacts {
    /// Logical CPU count
    pub cores: usize,
    /// Total memory in bytes
    pub total_memory: u64,
    /// Size of the root filesystem in bytes
    pub total_storage: u64,
    /// Used bytes on the root filesystem
    pub used_storage: u64,
    /// Operating system family, e.g. `linux`
    pub os: String,
    /// CPU architecture, e.g. `x86_64`
    pub arch: String,
    /// Distribution name from os-release
    pub distro: String,
    /// Distribution version from os-release
    pub version: String,
}

/// Operating system block of the ready report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsMetadata {
    pub os: String,
    pub arch: String,
    pub distro: String,
    pub version: String,
    /// Used root filesystem bytes
    pub storage_used: u64,
}

/// PATCH body marking a node ready on the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyReport {
    /// Always `ready`
    pub provisioning_status: String,
    /// Core count
    pub cpu: String,
    /// Memory in bytes
    pub memory: String,
    /// Storage in bytes
    pub storage: String,
    pub os_metadata: OsMetadata,
}

impl ReadyReport {
    /// Status value the platform expects for a provisioned node
    pub const READY: &'static str = "ready";
}

impl From<&HostFacts> for ReadyReport {
    fn from(facts: &HostFacts) -> Self {
        Self {
            provisioning_status: Self::READY.to_string(),
            cpu: facts.cores.to_string(),
            memory: facts.total_memory.to_string(),
            storage: facts.total_storage.to_string(),
            os_metadata: OsMetadata {
                os: facts.os.clone(),
                arch: facts.arch.clone(),
                distro: facts.distro.clone(),
                version: facts.version.clone(),
                storage_used: facts.used_storage,
            },
        }
    }
}

/// Parse the `KEY=value` lines of an os-release file.
///
/// Surrounding double quotes are stripped from values; lines without `=`
/// are ignored.
#[must_use]
pub fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().trim_matches('"').to_string()))
        .collect()
}
