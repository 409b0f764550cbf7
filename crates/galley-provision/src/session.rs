//! Persisted provisioning progress.

use galley_core::{ClusterRole, JoinSecret, PersistError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::engine::Step;

/// Which steps of the fixed sequence are done on this host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningSession {
    /// Completed steps, keyed by step name
    #[serde(default)]
    pub completed_steps: BTreeMap<Step, bool>,

    /// Set by the OS update step, cleared once a reboot was offered
    #[serde(default)]
    pub needs_reboot: bool,

    /// What a join session was started for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<JoinTarget>,
}

/// The role, cluster and secret a join runs with. Progress recorded for
/// one target is never reused for another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTarget {
    pub role: ClusterRole,
    pub cluster_id: String,
    /// Hex SHA-256 of the worker join secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_sha256: Option<String>,
}

impl JoinTarget {
    #[must_use]
    pub fn new(role: ClusterRole, cluster_id: impl Into<String>, secret: Option<&JoinSecret>) -> Self {
        Self {
            role,
            cluster_id: cluster_id.into(),
            secret_sha256: secret.map(|secret| format!("{:x}", Sha256::digest(secret.expose()))),
        }
    }
}

impl ProvisioningSession {
    /// Returns true if `step` has been durably recorded as complete
    #[must_use]
    pub fn is_complete(&self, step: Step) -> bool {
        self.completed_steps.get(&step).copied().unwrap_or(false)
    }

    /// Completed steps in sequence order
    pub fn completed(&self) -> impl Iterator<Item = Step> + '_ {
        Step::SEQUENCE
            .into_iter()
            .filter(|step| self.is_complete(*step))
    }

    /// Returns true if no step has completed yet
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.completed().next().is_none()
    }
}

/// JSON file backing a [`ProvisioningSession`]
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the session; a missing file is a fresh session
    pub fn load(&self) -> Result<ProvisioningSession, PersistError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| PersistError::corrupt(&self.path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(ProvisioningSession::default())
            }
            Err(e) => Err(PersistError::io(&self.path, e)),
        }
    }

    /// Durably replace the stored session
    pub fn save(&self, session: &ProvisioningSession) -> Result<(), PersistError> {
        let json = serde_json::to_vec_pretty(session)
            .map_err(|e| PersistError::corrupt(&self.path, e))?;
        write_atomic(&self.path, &json)?;
        debug!(path = %self.path.display(), "saved provisioning progress");
        Ok(())
    }

    /// Remove the stored session, if any
    pub fn clear(&self) -> Result<(), PersistError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistError::io(&self.path, e)),
        }
    }
}

/// Write `bytes` to `path` through a synced temp file and a rename, so
/// readers see either the old or the new content.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
    }

    let tmp = path.with_extension("tmp");
    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    write().map_err(|e| PersistError::io(&tmp, e))?;

    std::fs::rename(&tmp, path).map_err(|e| PersistError::io(path, e))
}
