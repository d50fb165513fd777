//! Hub API client backed by `kube::Api`

use crate::error::HubError;
use crate::hub_trait::{DependentKind, HubClientTrait};
use crds::ManagedCluster;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Hub API client
///
/// All objects the controller touches are cluster-scoped, so every `Api` is
/// created with `Api::all`.
#[derive(Clone)]
pub struct HubClient {
    managed_clusters: Api<ManagedCluster>,
    namespaces: Api<Namespace>,
    cluster_roles: Api<ClusterRole>,
    cluster_role_bindings: Api<ClusterRoleBinding>,
}

impl HubClient {
    /// Create a new hub client from a Kubernetes client
    pub fn new(client: Client) -> Self {
        Self {
            managed_clusters: Api::all(client.clone()),
            namespaces: Api::all(client.clone()),
            cluster_roles: Api::all(client.clone()),
            cluster_role_bindings: Api::all(client),
        }
    }
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient").finish_non_exhaustive()
    }
}

/// Build the JSON patch that writes a ManagedCluster's finalizer list.
///
/// When the cluster carries a resourceVersion a `test` op guards the write,
/// so a patch built from a stale copy is rejected by the API server.
pub fn finalizer_patch(cluster: &ManagedCluster) -> Result<json_patch::Patch, HubError> {
    let mut ops = Vec::with_capacity(2);
    if let Some(rv) = &cluster.metadata.resource_version {
        ops.push(serde_json::json!({
            "op": "test",
            "path": "/metadata/resourceVersion",
            "value": rv,
        }));
    }
    ops.push(serde_json::json!({
        "op": "add",
        "path": "/metadata/finalizers",
        "value": cluster.finalizers(),
    }));
    Ok(serde_json::from_value(serde_json::Value::Array(ops))?)
}

/// A failed `test` op comes back as 422; for the resourceVersion guard that means a conflict
fn map_finalizer_error(err: kube::Error, name: &str) -> HubError {
    match err {
        kube::Error::Api(ref resp) if resp.code == 422 => {
            HubError::Conflict(format!("ManagedCluster {} changed since it was read", name))
        }
        other => HubError::from_kube(other, &format!("ManagedCluster {}", name)),
    }
}

async fn delete_from<K>(api: &Api<K>, kind: DependentKind, name: &str) -> Result<(), HubError>
where
    K: Clone + DeserializeOwned + std::fmt::Debug,
{
    api.delete(name, &DeleteParams::default())
        .await
        .map(|_| {
            debug!("Deleted {} {}", kind, name);
        })
        .map_err(|e| HubError::from_kube(e, &format!("{} {}", kind, name)))
}

#[async_trait::async_trait]
impl HubClientTrait for HubClient {
    async fn get_managed_cluster(&self, name: &str) -> Result<ManagedCluster, HubError> {
        self.managed_clusters
            .get(name)
            .await
            .map_err(|e| HubError::from_kube(e, &format!("ManagedCluster {}", name)))
    }

    async fn update_managed_cluster(&self, cluster: &ManagedCluster) -> Result<ManagedCluster, HubError> {
        let name = cluster.name_any();
        let patch = finalizer_patch(cluster)?;
        self.managed_clusters
            .patch(&name, &PatchParams::default(), &Patch::Json::<()>(patch))
            .await
            .map_err(|e| map_finalizer_error(e, &name))
    }

    async fn update_managed_cluster_status(&self, cluster: &ManagedCluster) -> Result<ManagedCluster, HubError> {
        let name = cluster.name_any();
        // resourceVersion in a merge patch acts as a precondition
        let status_patch = serde_json::json!({
            "metadata": {
                "resourceVersion": cluster.metadata.resource_version,
            },
            "status": cluster.status,
        });
        self.managed_clusters
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&status_patch))
            .await
            .map_err(|e| HubError::from_kube(e, &format!("ManagedCluster {} status", name)))
    }

    async fn delete_dependent(&self, kind: DependentKind, name: &str) -> Result<(), HubError> {
        match kind {
            DependentKind::Namespace => delete_from(&self.namespaces, kind, name).await,
            DependentKind::ClusterRole => delete_from(&self.cluster_roles, kind, name).await,
            DependentKind::ClusterRoleBinding => delete_from(&self.cluster_role_bindings, kind, name).await,
        }
    }
}
