//! Removal of the hub resources created for a managed cluster.
//!
//! Deletes the cluster's namespace, ClusterRole and ClusterRoleBinding.
//! Objects that are already gone count as removed. Roles and RoleBindings
//! inside the namespace go away with it and are not deleted here.

use crate::events::Notification;
use hub_client::{DependentKind, HubClientTrait, HubError, cluster_role_name};
use tracing::{debug, info};

/// The cluster-level dependents of `cluster_name`, in deletion order.
pub fn dependents(cluster_name: &str) -> [(DependentKind, String); 3] {
    let role = cluster_role_name(cluster_name);
    [
        (DependentKind::Namespace, cluster_name.to_string()),
        (DependentKind::ClusterRole, role.clone()),
        (DependentKind::ClusterRoleBinding, role),
    ]
}

/// Delete every dependent of `cluster_name`, stopping at the first real failure.
///
/// A notification is appended for each object this call actually removed,
/// including those removed before a later failure.
pub async fn remove_cluster_resources(
    hub: &dyn HubClientTrait,
    cluster_name: &str,
    notifications: &mut Vec<Notification>,
) -> Result<(), HubError> {
    for (kind, name) in dependents(cluster_name) {
        match hub.delete_dependent(kind, &name).await {
            Ok(()) => {
                info!("Deleted {} {} for ManagedCluster {}", kind, name, cluster_name);
                notifications.push(match kind {
                    DependentKind::Namespace => Notification::namespace_deleted(&name),
                    DependentKind::ClusterRole => Notification::cluster_role_deleted(cluster_name),
                    DependentKind::ClusterRoleBinding => Notification::cluster_role_binding_deleted(cluster_name),
                });
            }
            Err(e) if e.is_not_found() => {
                debug!("{} {} already absent", kind, name);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::reasons;
    use hub_client::MockHubClient;

    #[tokio::test]
    async fn test_removes_all_dependents() {
        let hub = MockHubClient::new();
        hub.add_namespace("east-1");
        hub.add_cluster_role(&cluster_role_name("east-1"));
        hub.add_cluster_role_binding(&cluster_role_name("east-1"));

        let mut notifications = Vec::new();
        remove_cluster_resources(&hub, "east-1", &mut notifications).await.unwrap();

        assert!(!hub.has_namespace("east-1"));
        assert!(!hub.has_cluster_role(&cluster_role_name("east-1")));
        assert!(!hub.has_cluster_role_binding(&cluster_role_name("east-1")));
        let seen: Vec<_> = notifications.iter().map(|n| n.reason).collect();
        assert_eq!(
            seen,
            vec![
                reasons::NAMESPACE_DELETED,
                reasons::CLUSTER_ROLE_DELETED,
                reasons::CLUSTER_ROLE_BINDING_DELETED
            ]
        );
    }

    #[tokio::test]
    async fn test_absent_objects_are_success() {
        let hub = MockHubClient::new();

        let mut notifications = Vec::new();
        remove_cluster_resources(&hub, "east-1", &mut notifications).await.unwrap();

        assert!(notifications.is_empty());
        assert!(hub.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_failure_aborts_after_partial_progress() {
        let hub = MockHubClient::new();
        hub.add_namespace("east-1");
        hub.add_cluster_role(&cluster_role_name("east-1"));
        hub.add_cluster_role_binding(&cluster_role_name("east-1"));
        hub.fail_delete(DependentKind::ClusterRole, "rbac storage unavailable");

        let mut notifications = Vec::new();
        let err = remove_cluster_resources(&hub, "east-1", &mut notifications)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("rbac storage unavailable"));
        assert!(!hub.has_namespace("east-1"));
        // the binding was never attempted
        assert!(hub.has_cluster_role_binding(&cluster_role_name("east-1")));
        assert_eq!(notifications, vec![Notification::namespace_deleted("east-1")]);
    }

    #[test]
    fn test_dependent_names() {
        let [(_, ns), (_, role), (_, binding)] = dependents("east-1");
        assert_eq!(ns, "east-1");
        assert_eq!(role, "system:open-cluster-management:managedcluster:east-1");
        assert_eq!(binding, role);
    }
}
