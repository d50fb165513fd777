//! Hub API Client
//!
//! Typed access to the hub API server for the managed cluster controller:
//! ManagedCluster reads and optimistic updates, deletion of per-cluster
//! dependents, and rendering/applying the per-cluster manifest set.
//!
//! # Example
//!
//! ```no_run
//! use hub_client::{HubClient, HubClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let hub = HubClient::new(client);
//!
//! let cluster = hub.get_managed_cluster("east-1").await?;
//! println!("accepted: {}", cluster.spec.hub_accepts_client);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod manifests;
pub mod provisioner;
#[path = "trait.rs"]
pub mod hub_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::HubClient;
pub use error::HubError;
pub use hub_trait::{DependentKind, HubClientTrait};
pub use manifests::{
    CLUSTER_ROLE_PREFIX, EmbeddedRenderer, ManifestId, ManifestRenderer, RenderedManifest, TemplateContext,
    cluster_role_name, parse_manifest,
};
pub use provisioner::{ApplyResult, KubeProvisioner, ManifestProvisioner};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockHubClient;
