//! Main controller implementation.
//!
//! Builds the hub clients, the reconciler and the event publisher, then runs
//! the ManagedCluster watcher next to the metrics server.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::KubeEventPublisher;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::watcher::{Context, watch_managed_clusters};
use crds::ManagedCluster;
use hub_client::{EmbeddedRenderer, HubClient, KubeProvisioner};
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for ManagedCluster lifecycle management.
pub struct Controller {
    watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Managed Cluster Controller");

        let kube_client = Client::try_default().await?;

        let hub = Arc::new(HubClient::new(kube_client.clone()));
        let renderer = Arc::new(EmbeddedRenderer::new()?);
        let provisioner = Arc::new(KubeProvisioner::new(
            kube_client.clone(),
            renderer,
            config.controller_name.clone(),
        ));
        let events = Arc::new(KubeEventPublisher::new(kube_client.clone(), &config.controller_name));
        let metrics = Arc::new(Metrics::new()?);

        let reconciler = Reconciler::new(hub, provisioner);
        let api: Api<ManagedCluster> = Api::all(kube_client);
        let ctx = Arc::new(Context::new(reconciler, events, metrics.clone(), config.clone()));

        let metrics_server = tokio::spawn(metrics::serve(config.metrics_bind_address, metrics));
        let watcher = tokio::spawn(watch_managed_clusters(api, ctx));

        Ok(Self { watcher, metrics_server })
    }

    /// Runs until the watcher stops or the metrics server fails.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Managed Cluster Controller running");

        tokio::select! {
            result = &mut self.watcher => {
                result.map_err(|e| ControllerError::Watch(format!("ManagedCluster watcher panicked: {}", e)))??;
                info!("ManagedCluster watcher stopped");
                self.metrics_server.abort();
            }
            result = &mut self.metrics_server => {
                let result = result
                    .map_err(|e| ControllerError::Watch(format!("Metrics server panicked: {}", e)))
                    .and_then(|r| r);
                if let Err(e) = &result {
                    error!("Metrics server stopped: {}", e);
                }
                self.watcher.abort();
                result?;
            }
        }

        Ok(())
    }
}
