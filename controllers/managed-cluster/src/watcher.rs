//! Kubernetes resource watcher.
//!
//! Drives the reconciler from a `kube_runtime::Controller` over all
//! ManagedCluster objects. The runtime serializes work per object name,
//! so two passes for the same cluster never overlap.

use crate::backoff::BackoffTracker;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::EventPublisher;
use crate::metrics::Metrics;
use crate::reconciler::{Outcome, Reconciler, Reconciliation};
use crds::ManagedCluster;
use futures::StreamExt;
use kube::{Api, Resource, ResourceExt};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::{Controller, watcher};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Shared state handed to every reconciliation.
pub struct Context {
    reconciler: Reconciler,
    events: Arc<dyn EventPublisher>,
    metrics: Arc<Metrics>,
    backoff: BackoffTracker,
    config: ControllerConfig,
}

impl Context {
    pub fn new(
        reconciler: Reconciler,
        events: Arc<dyn EventPublisher>,
        metrics: Arc<Metrics>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            reconciler,
            events,
            metrics,
            backoff: BackoffTracker::new(config.backoff_min, config.backoff_max),
            config,
        }
    }
}

async fn reconcile(cluster: Arc<ManagedCluster>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let name = cluster.name_any();
    let started = Instant::now();

    let Reconciliation { outcome, notifications } =
        match tokio::time::timeout(ctx.config.reconcile_timeout, ctx.reconciler.reconcile(&name)).await {
            Ok(reconciliation) => reconciliation,
            Err(_) => Reconciliation {
                outcome: Err(ControllerError::Timeout(ctx.config.reconcile_timeout)),
                notifications: Vec::new(),
            },
        };
    ctx.metrics.observe_duration(started.elapsed());

    let object_ref = cluster.object_ref(&());
    for notification in &notifications {
        ctx.events.publish(&object_ref, notification).await;
    }

    match outcome {
        Ok(outcome) => {
            ctx.metrics.record_outcome(outcome.label());
            ctx.backoff.reset(&name);
            debug!("ManagedCluster {} reconciled: {}", name, outcome.label());
            match outcome {
                Outcome::Absent => Ok(Action::await_change()),
                _ => Ok(Action::requeue(ctx.config.resync_interval)),
            }
        }
        Err(e) => {
            ctx.metrics.record_error(e.kind());
            Err(e)
        }
    }
}

fn error_policy(cluster: Arc<ManagedCluster>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let name = cluster.name_any();
    if error.is_conflict() {
        debug!("ManagedCluster {} changed during reconciliation, retrying: {}", name, error);
        return Action::requeue(ctx.config.conflict_requeue);
    }

    let delay = ctx.backoff.next(&name);
    warn!("Reconciliation of ManagedCluster {} failed, retrying in {:?}: {}", name, delay, error);
    Action::requeue(delay)
}

/// Watch ManagedCluster resources and reconcile them until the stream ends.
pub async fn watch_managed_clusters(api: Api<ManagedCluster>, ctx: Arc<Context>) -> Result<(), ControllerError> {
    info!("Starting ManagedCluster watcher");

    // Debounce batches bursts of watch events (our own status writes included)
    let runtime_config = RuntimeConfig::default()
        .debounce(ctx.config.debounce)
        .concurrency(ctx.config.concurrency);

    Controller::new(api, watcher::Config::default())
        .with_config(runtime_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((object, _)) => debug!("Reconciled {}", object.name),
                Err(e) => error!("ManagedCluster controller error: {}", e),
            }
        })
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RecordingEventPublisher, reasons};
    use crate::test_utils::*;
    use hub_client::{HubError, MockHubClient};
    use std::time::Duration;

    fn context(hub: &MockHubClient, events: Arc<RecordingEventPublisher>) -> Arc<Context> {
        let config = ControllerConfig {
            backoff_min: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
            ..Default::default()
        };
        Arc::new(Context::new(
            Reconciler::new(Arc::new(hub.clone()), Arc::new(hub.clone())),
            events,
            Arc::new(Metrics::new().unwrap()),
            config,
        ))
    }

    #[tokio::test]
    async fn test_success_requeues_for_resync_and_publishes() {
        let hub = MockHubClient::new();
        hub.add_managed_cluster(guarded("east-1", true));
        let events = Arc::new(RecordingEventPublisher::default());
        let ctx = context(&hub, events.clone());

        let cluster = Arc::new(hub.managed_cluster("east-1").unwrap());
        let action = reconcile(cluster, ctx.clone()).await.unwrap();

        assert_eq!(action, Action::requeue(ctx.config.resync_interval));
        let published = events.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "east-1");
        assert_eq!(published[0].1.reason, reasons::ACCEPTED);
        assert!(ctx.metrics.render().unwrap().contains("outcome=\"accepted\""));
    }

    #[tokio::test]
    async fn test_vanished_cluster_waits_for_change() {
        let hub = MockHubClient::new();
        let ctx = context(&hub, Arc::new(RecordingEventPublisher::default()));

        let action = reconcile(Arc::new(managed_cluster("east-1", true)), ctx).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn test_error_policy_backs_off_per_name() {
        let hub = MockHubClient::new();
        let ctx = context(&hub, Arc::new(RecordingEventPublisher::default()));
        let cluster = Arc::new(managed_cluster("east-1", true));
        let failure = ControllerError::Hub(HubError::Api("etcd unavailable".into()));

        assert_eq!(error_policy(cluster.clone(), &failure, ctx.clone()), Action::requeue(Duration::from_secs(5)));
        assert_eq!(error_policy(cluster.clone(), &failure, ctx.clone()), Action::requeue(Duration::from_secs(5)));
        assert_eq!(error_policy(cluster.clone(), &failure, ctx.clone()), Action::requeue(Duration::from_secs(10)));

        let conflict = ControllerError::Hub(HubError::Conflict("east-1".into()));
        assert_eq!(error_policy(cluster, &conflict, ctx.clone()), Action::requeue(ctx.config.conflict_requeue));
    }

    #[tokio::test]
    async fn test_success_resets_backoff() {
        let hub = MockHubClient::new();
        hub.add_managed_cluster(guarded("east-1", false));
        let ctx = context(&hub, Arc::new(RecordingEventPublisher::default()));
        let cluster = Arc::new(hub.managed_cluster("east-1").unwrap());
        let failure = ControllerError::Hub(HubError::Api("etcd unavailable".into()));

        error_policy(cluster.clone(), &failure, ctx.clone());
        error_policy(cluster.clone(), &failure, ctx.clone());
        reconcile(cluster.clone(), ctx.clone()).await.unwrap();

        assert_eq!(error_policy(cluster, &failure, ctx), Action::requeue(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_failures_are_counted_by_kind() {
        let hub = MockHubClient::new();
        hub.add_managed_cluster(managed_cluster("east-1", false));
        hub.conflict_next_write();
        let ctx = context(&hub, Arc::new(RecordingEventPublisher::default()));

        let cluster = Arc::new(hub.managed_cluster("east-1").unwrap());
        let err = reconcile(cluster, ctx.clone()).await.unwrap_err();

        assert!(err.is_conflict());
        assert!(ctx.metrics.render().unwrap().contains("kind=\"conflict\""));
    }
}
