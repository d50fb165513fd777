//! Test utilities for unit testing the reconciler
//!
//! Builders for ManagedCluster objects in the states the controller cares about.

use crate::finalizer::MANAGED_CLUSTER_FINALIZER;
use crate::status::{DesiredCondition, set_condition};
use chrono::Utc;
use crds::{ManagedCluster, ManagedClusterSpec};

/// Fresh cluster: no finalizers, no status
pub fn managed_cluster(name: &str, hub_accepts_client: bool) -> ManagedCluster {
    ManagedCluster::new(
        name,
        ManagedClusterSpec {
            hub_accepts_client,
            ..Default::default()
        },
    )
}

/// Replace the finalizer list
pub fn with_finalizers(mut cluster: ManagedCluster, finalizers: &[&str]) -> ManagedCluster {
    cluster.metadata.finalizers = Some(finalizers.iter().map(|f| f.to_string()).collect());
    cluster
}

/// Cluster carrying the guard finalizer
pub fn guarded(name: &str, hub_accepts_client: bool) -> ManagedCluster {
    with_finalizers(managed_cluster(name, hub_accepts_client), &[MANAGED_CLUSTER_FINALIZER])
}

/// Mark deletion as requested
pub fn deleting(mut cluster: ManagedCluster) -> ManagedCluster {
    cluster.metadata.deletion_timestamp = serde_json::from_value(serde_json::json!("2024-05-01T12:00:00Z")).ok();
    cluster
}

/// Record a condition on the cluster
pub fn with_condition(mut cluster: ManagedCluster, desired: &DesiredCondition) -> ManagedCluster {
    let status = cluster.status.get_or_insert_with(Default::default);
    set_condition(&mut status.conditions, desired, Utc::now());
    cluster
}
