//! Manifest provisioner
//!
//! Renders the per-cluster manifests and applies them with server-side
//! apply, so applying an unchanged manifest twice is a no-op on the server.
//! Each manifest is applied independently and reports its own result.

use crate::error::HubError;
use crate::manifests::{ManifestId, ManifestRenderer, RenderedManifest, TemplateContext, parse_manifest};
use kube::Client;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of applying one manifest
#[derive(Debug)]
pub struct ApplyResult {
    pub manifest: ManifestId,
    pub kind: &'static str,
    pub error: Option<HubError>,
}

impl ApplyResult {
    pub fn new(manifest: ManifestId, outcome: Result<(), HubError>) -> Self {
        Self {
            manifest,
            kind: manifest.kind(),
            error: outcome.err(),
        }
    }
}

/// Trait for applying the per-cluster manifest set
#[async_trait::async_trait]
pub trait ManifestProvisioner: Send + Sync {
    /// Apply `manifests` in order. Never short-circuits: every manifest gets a result.
    async fn apply(&self, manifests: &[ManifestId], ctx: &TemplateContext) -> Vec<ApplyResult>;
}

/// Split an apiVersion into (group, version); the core group is "".
pub fn parse_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Provisioner applying manifests to the hub with server-side apply
pub struct KubeProvisioner {
    client: Client,
    renderer: Arc<dyn ManifestRenderer>,
    field_manager: String,
}

impl std::fmt::Debug for KubeProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeProvisioner")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeProvisioner {
    pub fn new(client: Client, renderer: Arc<dyn ManifestRenderer>, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            renderer,
            field_manager: field_manager.into(),
        }
    }

    fn api_for(&self, manifest: &RenderedManifest) -> Api<DynamicObject> {
        let (group, version) = parse_api_version(&manifest.api_version);
        let gvk = GroupVersionKind::gvk(group, version, &manifest.kind);
        let api_resource = ApiResource::from_gvk(&gvk);
        match &manifest.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &api_resource),
            None => Api::all_with(self.client.clone(), &api_resource),
        }
    }

    async fn apply_one(&self, id: ManifestId, ctx: &TemplateContext) -> Result<(), HubError> {
        let bytes = self.renderer.render(id, ctx)?;
        let manifest = parse_manifest(&bytes)?;
        let api = self.api_for(&manifest);
        let params = PatchParams::apply(&self.field_manager).force();

        api.patch(&manifest.name, &params, &Patch::Apply(&manifest.value))
            .await
            .map_err(|e| HubError::from_kube(e, &format!("{} {}", manifest.kind, manifest.name)))?;

        debug!("Applied {} {} from {}", manifest.kind, manifest.name, id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ManifestProvisioner for KubeProvisioner {
    async fn apply(&self, manifests: &[ManifestId], ctx: &TemplateContext) -> Vec<ApplyResult> {
        let mut results = Vec::with_capacity(manifests.len());
        for &id in manifests {
            let outcome = self.apply_one(id, ctx).await;
            if let Err(e) = &outcome {
                warn!("Failed to apply {} for cluster {}: {}", id, ctx.cluster_name, e);
            }
            results.push(ApplyResult::new(id, outcome));
        }
        results
    }
}
