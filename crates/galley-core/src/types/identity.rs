use super::ClusterRole;

/// Secret material admitting a node into a cluster.
///
/// Wraps the raw string so it never ends up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct JoinSecret(String);

impl JoinSecret {
    /// Wrap a raw secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrow the raw secret, for handing it to the runtime
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for JoinSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JoinSecret(***)")
    }
}

/// Identity recovered from a join token.
///
/// Derived fresh from each token. Only `cluster_id` and `role` are ever
/// persisted: they are written to the agent config as soon as a join
/// starts, before the runtime is installed, so a failed join leaves them
/// behind. A worker's secret only reaches disk as the runtime's token file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    /// Platform id of the cluster (vessel engine) the node joins
    pub cluster_id: String,
    /// Role the node takes on
    pub role: ClusterRole,
    /// Secret presented to the platform or the runtime
    pub secret: JoinSecret,
}
