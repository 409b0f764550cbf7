//! Vessel engine node endpoints.

use crate::PlatformClient;
use galley_core::{AttestError, Envelope, HostFacts, NodeRecord, ReadyReport};
use tracing::{debug, info};

const NODE_PATH: &str = "/vessels/engine/node";

/// Vessel engine node endpoints
pub struct NodeApi<'a> {
    client: &'a PlatformClient,
}

impl<'a> NodeApi<'a> {
    pub(crate) const fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    /// Fetch the record the platform holds for the node the bearer token admits
    pub async fn fetch(&self, bearer: &str) -> Result<NodeRecord, AttestError> {
        let envelope: Envelope<NodeRecord> = self.client.get(NODE_PATH, bearer).await?;
        debug!(node = %envelope.data.id, node_type = %envelope.data.attributes.node_type, "fetched node record");
        Ok(envelope.data)
    }

    /// Mark the node ready, reporting the measured host facts.
    ///
    /// Succeeds without a request when no platform is configured.
    pub async fn report_ready(
        &self,
        node_id: &str,
        bearer: &str,
        facts: &HostFacts,
    ) -> Result<(), AttestError> {
        if !self.client.is_configured() {
            debug!(node = %node_id, "no platform configured, skipping ready report");
            return Ok(());
        }

        let path = format!("{NODE_PATH}/{node_id}");
        self.client
            .patch(&path, bearer, &ReadyReport::from(facts))
            .await?;
        info!(node = %node_id, "reported node ready");
        Ok(())
    }
}
