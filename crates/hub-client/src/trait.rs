//! HubClient trait for mocking
//!
//! This trait abstracts the hub API calls the managed cluster controller makes
//! so that reconciliation can be unit tested against an in-memory store.
//! The concrete `HubClient` implements it over `kube::Api`.

use crate::error::HubError;
use crds::ManagedCluster;

/// Dependent object kinds the controller deletes when it releases a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependentKind {
    Namespace,
    ClusterRole,
    ClusterRoleBinding,
}

impl DependentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependentKind::Namespace => "Namespace",
            DependentKind::ClusterRole => "ClusterRole",
            DependentKind::ClusterRoleBinding => "ClusterRoleBinding",
        }
    }
}

impl std::fmt::Display for DependentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for hub API operations
///
/// Updates are optimistic: the `resourceVersion` of the passed object must
/// match the stored one, otherwise `HubError::Conflict` is returned.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait HubClientTrait: Send + Sync {
    /// Fetch a ManagedCluster by name. Returns `HubError::NotFound` if absent.
    async fn get_managed_cluster(&self, name: &str) -> Result<ManagedCluster, HubError>;

    /// Persist the finalizer list of a ManagedCluster; other fields are left untouched.
    async fn update_managed_cluster(&self, cluster: &ManagedCluster) -> Result<ManagedCluster, HubError>;

    /// Persist the status sub-resource of a ManagedCluster.
    async fn update_managed_cluster_status(&self, cluster: &ManagedCluster) -> Result<ManagedCluster, HubError>;

    /// Delete a cluster-scoped dependent object. Returns `HubError::NotFound` if absent.
    async fn delete_dependent(&self, kind: DependentKind, name: &str) -> Result<(), HubError>;
}
