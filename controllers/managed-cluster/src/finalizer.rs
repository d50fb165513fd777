//! Finalizer handling for ManagedCluster resources.
//!
//! The guard finalizer keeps a deleting cluster in the store until its hub
//! resources have been cleaned up. Both operations write only when the
//! finalizer list actually changes and surface stale reads as conflicts.

use crds::ManagedCluster;
use hub_client::{HubClientTrait, HubError};
use kube::ResourceExt;
use tracing::info;

/// Finalizer guarding hub-side cleanup
pub const MANAGED_CLUSTER_FINALIZER: &str = "cluster.open-cluster-management.io/api-resource-cleanup";

pub fn has_finalizer(cluster: &ManagedCluster) -> bool {
    cluster.finalizers().iter().any(|f| f == MANAGED_CLUSTER_FINALIZER)
}

/// Append the guard finalizer. Returns whether a write happened.
pub async fn add_finalizer(hub: &dyn HubClientTrait, cluster: &ManagedCluster) -> Result<bool, HubError> {
    if has_finalizer(cluster) {
        return Ok(false);
    }

    info!("Adding finalizer to ManagedCluster {}", cluster.name_any());
    let mut updated = cluster.clone();
    updated
        .metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(MANAGED_CLUSTER_FINALIZER.to_string());
    hub.update_managed_cluster(&updated).await?;
    Ok(true)
}

/// Drop the guard finalizer, keeping any others. Returns whether a write happened.
pub async fn remove_finalizer(hub: &dyn HubClientTrait, cluster: &ManagedCluster) -> Result<bool, HubError> {
    if !has_finalizer(cluster) {
        return Ok(false);
    }

    info!("Removing finalizer from ManagedCluster {}", cluster.name_any());
    let mut updated = cluster.clone();
    if let Some(finalizers) = updated.metadata.finalizers.as_mut() {
        finalizers.retain(|f| f != MANAGED_CLUSTER_FINALIZER);
    }
    hub.update_managed_cluster(&updated).await?;
    Ok(true)
}
