use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The cluster function a node takes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterRole {
    /// Control plane only
    #[serde(rename = "controller")]
    Controller,
    /// Control plane that also schedules workloads
    #[serde(rename = "controller+worker")]
    ControllerWorker,
    /// Workload node
    #[serde(rename = "worker")]
    Worker,
}

impl ClusterRole {
    /// Wire form of the role, as used in node records and the config file
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Controller => "controller",
            Self::ControllerWorker => "controller+worker",
            Self::Worker => "worker",
        }
    }

    /// Only controller roles may install the control-plane component
    #[must_use]
    pub const fn installs_control_plane(&self) -> bool {
        matches!(self, Self::Controller | Self::ControllerWorker)
    }

    /// Returns true if the node runs workloads
    #[must_use]
    pub const fn runs_workloads(&self) -> bool {
        matches!(self, Self::ControllerWorker | Self::Worker)
    }
}

impl std::fmt::Display for ClusterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known cluster role
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported node type {0:?} (expected controller, controller+worker or worker)")]
pub struct UnknownRole(pub String);

impl FromStr for ClusterRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "controller" => Ok(Self::Controller),
            "controller+worker" => Ok(Self::ControllerWorker),
            "worker" => Ok(Self::Worker),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}
