//! Managed Cluster Controller
//!
//! Hub-side lifecycle controller for `ManagedCluster` resources:
//! - guards every cluster with a cleanup finalizer
//! - provisions the per-cluster namespace and RBAC once the hub admin accepts it
//! - tears those objects down again when the admin revokes acceptance or the
//!   cluster is deleted, reporting the decision through the `HubAccepted` condition

mod backoff;
mod cleanup;
mod config;
mod controller;
mod error;
mod events;
mod finalizer;
mod metrics;
mod reconciler;
mod status;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls-tls needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting Managed Cluster Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Controller name: {}", config.controller_name);
    info!("  Concurrency: {}", config.concurrency);
    info!("  Reconcile timeout: {:?}", config.reconcile_timeout);
    info!("  Resync interval: {:?}", config.resync_interval);
    info!("  Metrics address: {}", config.metrics_bind_address);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
