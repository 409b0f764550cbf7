use serde::{Deserialize, Serialize};

use super::{ClusterRole, UnknownRole};

/// JSON:API style resource wrapper used by the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource<T> {
    /// Resource id
    pub id: String,

    /// Resource type name
    #[serde(rename = "type")]
    pub kind: String,

    /// Resource attributes
    pub attributes: T,
}

/// Top-level `{ "data": ... }` envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Wrapped resource
    pub data: T,
}

/// Attributes of a vessel engine node as recorded by the platform
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAttributes {
    /// Region the node is placed in
    #[serde(default)]
    pub vessel_engine_region_id: String,

    /// Declared cluster role, e.g. `controller+worker`
    pub node_type: String,

    /// Cluster (vessel engine) the node belongs to
    #[serde(default)]
    pub vessel_engine_id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Address the platform knows the node by
    #[serde(default)]
    pub ip_address: String,

    /// Core count, as last reported
    #[serde(default)]
    pub cpu: String,

    /// Memory in bytes, as last reported
    #[serde(default)]
    pub memory: String,

    /// Storage in bytes, as last reported
    #[serde(default)]
    pub storage: String,

    /// Whether the node is still being provisioned
    #[serde(default)]
    pub provisioning: bool,
}

/// Platform-side node resource
pub type NodeRecord = Resource<NodeAttributes>;

impl NodeRecord {
    /// Declared cluster role
    pub fn role(&self) -> Result<ClusterRole, UnknownRole> {
        self.attributes.node_type.parse()
    }
}
