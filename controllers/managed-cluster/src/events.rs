//! Kubernetes Event recording for ManagedCluster transitions.
//!
//! The reconciler never talks to the event sink. It returns a list of
//! [`Notification`] intents alongside its outcome, and the watcher publishes
//! them once the reconciliation has finished.
//!
//! Events are **fire-and-forget**: failures are logged as warnings and never
//! propagate errors.

use async_trait::async_trait;
use hub_client::cluster_role_name;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Client;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

/// Well-known event reason strings.
///
/// These appear in `kubectl get events` under the REASON column.
pub mod reasons {
    /// Hub admin accepted the cluster and the HubAccepted condition was written
    pub const ACCEPTED: &str = "ManagedClusterAccepted";
    /// Hub admin revoked acceptance
    pub const DENIED: &str = "ManagedClusterDenied";
    /// Per-cluster namespace removed
    pub const NAMESPACE_DELETED: &str = "ManagedClusterNamespaceDeleted";
    /// Per-cluster ClusterRole removed
    pub const CLUSTER_ROLE_DELETED: &str = "ManagedClusterClusterRoleDeleted";
    /// Per-cluster ClusterRoleBinding removed
    pub const CLUSTER_ROLE_BINDING_DELETED: &str = "ManagedClusterClusterRoleBindingDeleted";
}

/// An observable transition worth reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub reason: &'static str,
    pub message: String,
}

impl Notification {
    pub fn accepted(cluster_name: &str) -> Self {
        Self {
            reason: reasons::ACCEPTED,
            message: format!("managed cluster {} is accepted by hub cluster admin", cluster_name),
        }
    }

    pub fn denied(cluster_name: &str) -> Self {
        Self {
            reason: reasons::DENIED,
            message: format!("managed cluster {} is denied by hub cluster admin", cluster_name),
        }
    }

    pub fn namespace_deleted(namespace: &str) -> Self {
        Self {
            reason: reasons::NAMESPACE_DELETED,
            message: format!("namespace {} is deleted", namespace),
        }
    }

    pub fn cluster_role_deleted(cluster_name: &str) -> Self {
        Self {
            reason: reasons::CLUSTER_ROLE_DELETED,
            message: format!("clusterrole {} is deleted", cluster_role_name(cluster_name)),
        }
    }

    pub fn cluster_role_binding_deleted(cluster_name: &str) -> Self {
        Self {
            reason: reasons::CLUSTER_ROLE_BINDING_DELETED,
            message: format!("clusterrolebinding {} is deleted", cluster_role_name(cluster_name)),
        }
    }

    /// What the controller did, for the event's `action` field
    pub fn action(&self) -> &'static str {
        match self.reason {
            reasons::ACCEPTED => "Accept",
            reasons::DENIED => "Deny",
            _ => "Cleanup",
        }
    }
}

/// Trait for publishing Kubernetes Events.
///
/// Implementations are expected to be fire-and-forget: `publish()` logs a
/// warning on failure but never returns an error.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `notification` as an Event on the referenced resource.
    async fn publish(&self, resource_ref: &ObjectReference, notification: &Notification);
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher reporting as `controller_name`.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, resource_ref: &ObjectReference, notification: &Notification) {
        let event = Event {
            type_: EventType::Normal,
            reason: notification.reason.to_string(),
            note: Some(notification.message.clone()),
            action: notification.action().to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason = notification.reason,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Records published notifications by object name.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingEventPublisher {
    published: std::sync::Mutex<Vec<(String, Notification)>>,
}

#[cfg(test)]
impl RecordingEventPublisher {
    pub fn published(&self) -> Vec<(String, Notification)> {
        self.published.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, resource_ref: &ObjectReference, notification: &Notification) {
        let name = resource_ref.name.clone().unwrap_or_default();
        self.published.lock().unwrap().push((name, notification.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_objects() {
        assert_eq!(
            Notification::cluster_role_deleted("east-1").message,
            "clusterrole system:open-cluster-management:managedcluster:east-1 is deleted"
        );
        assert_eq!(Notification::namespace_deleted("east-1").message, "namespace east-1 is deleted");
        assert!(Notification::denied("east-1").message.contains("east-1"));
    }

    #[test]
    fn test_actions() {
        assert_eq!(Notification::accepted("a").action(), "Accept");
        assert_eq!(Notification::denied("a").action(), "Deny");
        assert_eq!(Notification::cluster_role_binding_deleted("a").action(), "Cleanup");
    }

    #[tokio::test]
    async fn test_recording_publisher_keeps_order() {
        let publisher = RecordingEventPublisher::default();
        let object = ObjectReference {
            name: Some("east-1".to_string()),
            ..Default::default()
        };
        publisher.publish(&object, &Notification::denied("east-1")).await;
        publisher.publish(&object, &Notification::namespace_deleted("east-1")).await;

        let seen: Vec<_> = publisher.published().into_iter().map(|(_, n)| n.reason).collect();
        assert_eq!(seen, vec![reasons::DENIED, reasons::NAMESPACE_DELETED]);
    }
}
