//! ManagedCluster CRD
//!
//! Represents a spoke cluster registered with the hub. The hub administrator
//! admits or denies the spoke through `spec.hubAcceptsClient`; the hub
//! controller reports its decision through the `HubAccepted` condition.

use crate::condition::{Condition, find_condition, is_condition_true};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type owned by the hub controller.
pub const HUB_ACCEPTED_CONDITION: &str = "HubAccepted";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.open-cluster-management.io",
    version = "v1",
    kind = "ManagedCluster",
    shortname = "mcl",
    status = "ManagedClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterSpec {
    /// Set by the hub cluster admin to admit the spoke cluster
    #[serde(default)]
    pub hub_accepts_client: bool,

    /// API server endpoints the spoke exposes to the hub
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_cluster_client_configs: Vec<ClientConfig>,

    /// Lease duration the spoke agent renews its lease with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_duration_seconds: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Spoke API server URL
    pub url: String,

    /// PEM bundle used to verify the spoke API server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterStatus {
    /// Latest observations, keyed by condition type
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Versions reported by the spoke agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ManagedClusterVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterVersion {
    /// Kubernetes version of the spoke
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<String>,
}

impl ManagedCluster {
    /// Whether deletion has been requested (`metadata.deletionTimestamp` set).
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Conditions currently recorded on the cluster.
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// The `HubAccepted` condition, if the hub has ever evaluated the cluster.
    pub fn hub_accepted_condition(&self) -> Option<&Condition> {
        find_condition(self.conditions(), HUB_ACCEPTED_CONDITION)
    }

    /// Whether the hub currently reports the cluster as accepted.
    pub fn is_hub_accepted(&self) -> bool {
        is_condition_true(self.hub_accepted_condition())
    }
}
