//! Reconciliation of ManagedCluster resources.
//!
//! Every reconciliation re-reads the cluster and performs at most one of:
//! attach the guard finalizer, clean up a deleting cluster and release it,
//! revoke a previously accepted cluster, or provision an accepted one.
//! Anything that changes the object ends the pass; the resulting watch event
//! drives the next step.


use crate::cleanup::remove_cluster_resources;
use crate::error::{AggregateError, ControllerError};
use crate::events::Notification;
use crate::finalizer::{add_finalizer, has_finalizer, remove_finalizer};
use crate::status::{DesiredCondition, update_condition};
use crds::ManagedCluster;
use hub_client::{HubClientTrait, ManifestId, ManifestProvisioner, TemplateContext};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a reconciliation pass should do with the cluster it read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Not deleting and not yet guarded
    AttachFinalizer,
    /// Deletion requested: clean up, then drop the guard
    Release,
    /// Acceptance revoked after having been granted
    Deny,
    /// Not accepted and never was: nothing to do
    Ignore,
    /// Accepted: provision and record the condition
    Accept,
}

/// Pick the branch for `cluster`. Order matters: the finalizer comes first.
pub fn decide(cluster: &ManagedCluster) -> Decision {
    if cluster.is_deleting() {
        return Decision::Release;
    }
    if !has_finalizer(cluster) {
        return Decision::AttachFinalizer;
    }
    match (cluster.spec.hub_accepts_client, cluster.is_hub_accepted()) {
        (true, _) => Decision::Accept,
        (false, true) => Decision::Deny,
        (false, false) => Decision::Ignore,
    }
}

/// Result of a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The cluster no longer exists
    Absent,
    FinalizerAttached,
    /// Dependents removed and the guard finalizer dropped
    Released,
    /// Not accepted and nothing provisioned
    NotAccepted,
    Denied,
    /// Manifests applied; `condition_updated` is false when the condition was already current
    Accepted { condition_updated: bool },
}

impl Outcome {
    /// Label for the outcome metric
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Absent => "absent",
            Outcome::FinalizerAttached => "finalizer_attached",
            Outcome::Released => "released",
            Outcome::NotAccepted => "not_accepted",
            Outcome::Denied => "denied",
            Outcome::Accepted { .. } => "accepted",
        }
    }
}

/// Outcome of one pass plus the notifications it produced.
///
/// Notifications are returned even when the pass failed part way, so
/// deletions that did happen are still reported.
#[derive(Debug)]
pub struct Reconciliation {
    pub outcome: Result<Outcome, ControllerError>,
    pub notifications: Vec<Notification>,
}

/// Reconciles ManagedCluster resources against the hub.
pub struct Reconciler {
    hub: Arc<dyn HubClientTrait>,
    provisioner: Arc<dyn ManifestProvisioner>,
}

impl Reconciler {
    pub fn new(hub: Arc<dyn HubClientTrait>, provisioner: Arc<dyn ManifestProvisioner>) -> Self {
        Self { hub, provisioner }
    }

    /// Run one pass for the cluster called `name`.
    pub async fn reconcile(&self, name: &str) -> Reconciliation {
        let mut notifications = Vec::new();
        let outcome = self.reconcile_inner(name, &mut notifications).await;
        Reconciliation { outcome, notifications }
    }

    async fn reconcile_inner(
        &self,
        name: &str,
        notifications: &mut Vec<Notification>,
    ) -> Result<Outcome, ControllerError> {
        debug!("Reconciling ManagedCluster {}", name);
        let cluster = match self.hub.get_managed_cluster(name).await {
            Ok(cluster) => cluster,
            Err(e) if e.is_not_found() => {
                debug!("ManagedCluster {} not found, nothing to do", name);
                return Ok(Outcome::Absent);
            }
            Err(e) => return Err(e.into()),
        };

        match decide(&cluster) {
            Decision::AttachFinalizer => {
                add_finalizer(self.hub.as_ref(), &cluster).await?;
                Ok(Outcome::FinalizerAttached)
            }
            Decision::Release => {
                remove_cluster_resources(self.hub.as_ref(), name, notifications).await?;
                remove_finalizer(self.hub.as_ref(), &cluster).await?;
                info!("ManagedCluster {} cleaned up and released", name);
                Ok(Outcome::Released)
            }
            Decision::Ignore => {
                debug!("ManagedCluster {} is not accepted by the hub", name);
                Ok(Outcome::NotAccepted)
            }
            Decision::Deny => {
                info!("ManagedCluster {} is denied by hub cluster admin", name);
                notifications.push(Notification::denied(name));
                remove_cluster_resources(self.hub.as_ref(), name, notifications).await?;
                update_condition(self.hub.as_ref(), name, &DesiredCondition::hub_denied()).await?;
                Ok(Outcome::Denied)
            }
            Decision::Accept => self.accept(name, notifications).await,
        }
    }

    async fn accept(&self, name: &str, notifications: &mut Vec<Notification>) -> Result<Outcome, ControllerError> {
        let results = self
            .provisioner
            .apply(&ManifestId::ALL, &TemplateContext::new(name))
            .await;

        let mut errors: AggregateError = results
            .iter()
            .filter_map(|result| {
                result
                    .error
                    .as_ref()
                    .map(|e| format!("{:?} ({}): {}", result.manifest.file_name(), result.kind, e))
            })
            .collect();
        if !errors.is_empty() {
            warn!(
                "{} of {} manifests failed for ManagedCluster {}",
                errors.messages().len(),
                results.len(),
                name
            );
        }

        let provision_errors = (!errors.is_empty()).then(|| errors.to_string());
        let condition = DesiredCondition::hub_accepted(provision_errors);
        let condition_updated = match update_condition(self.hub.as_ref(), name, &condition).await {
            Ok(updated) => updated,
            // a lone status failure keeps its kind so conflicts retry promptly
            Err(e) if errors.is_empty() => return Err(e.into()),
            Err(e) => {
                errors.push(e.to_string());
                false
            }
        };

        if condition_updated {
            info!("ManagedCluster {} is accepted by hub cluster admin", name);
            notifications.push(Notification::accepted(name));
        }

        if errors.is_empty() {
            Ok(Outcome::Accepted { condition_updated })
        } else {
            Err(ControllerError::Provision(errors))
        }
    }
}
