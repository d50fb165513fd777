//! Mock hub for unit testing
//!
//! `MockHubClient` implements both `HubClientTrait` and `ManifestProvisioner`
//! over one in-memory store, so objects created by provisioning are the same
//! objects the cleanup routine deletes. It models the API server behaviour the
//! controller relies on:
//! - `resourceVersion` preconditions on updates (stale writes conflict)
//! - finalizers and status written through separate verbs
//! - objects with a deletion timestamp are erased once their finalizers are gone
//! - deleting a namespace removes the objects inside it
//! - namespaced objects cannot be applied into a missing namespace
//!
//! Failures can be injected per dependent kind, per manifest and per write.

use crate::error::HubError;
use crate::hub_trait::{DependentKind, HubClientTrait};
use crate::manifests::{EmbeddedRenderer, ManifestId, ManifestRenderer, TemplateContext, parse_manifest};
use crate::provisioner::{ApplyResult, ManifestProvisioner};
use crds::ManagedCluster;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    managed_clusters: HashMap<String, ManagedCluster>,
    next_resource_version: u64,
    namespaces: BTreeSet<String>,
    cluster_roles: BTreeSet<String>,
    cluster_role_bindings: BTreeSet<String>,
    // (namespace, kind, name)
    namespaced_objects: BTreeSet<(String, String, String)>,
    cluster_writes: usize,
    objects_created: usize,
    deleted: Vec<(DependentKind, String)>,
    delete_failures: HashMap<DependentKind, String>,
    apply_failures: HashMap<ManifestId, String>,
    status_failure: Option<String>,
    conflict_next_write: bool,
}

impl MockState {
    fn bump_resource_version(&mut self) -> String {
        self.next_resource_version += 1;
        self.next_resource_version.to_string()
    }

    fn check_write(&mut self, cluster: &ManagedCluster) -> Result<String, HubError> {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        if self.conflict_next_write {
            self.conflict_next_write = false;
            return Err(HubError::Conflict(format!("ManagedCluster {}: injected conflict", name)));
        }
        let stored = self
            .managed_clusters
            .get(&name)
            .ok_or_else(|| HubError::NotFound(format!("ManagedCluster {}", name)))?;
        if stored.metadata.resource_version != cluster.metadata.resource_version {
            return Err(HubError::Conflict(format!(
                "ManagedCluster {}: the object has been modified",
                name
            )));
        }
        Ok(name)
    }
}

/// Mock hub for testing
#[derive(Clone)]
pub struct MockHubClient {
    state: Arc<Mutex<MockState>>,
    renderer: Arc<EmbeddedRenderer>,
}

impl std::fmt::Debug for MockHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHubClient").finish_non_exhaustive()
    }
}

impl Default for MockHubClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHubClient {
    /// Create an empty mock hub
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            renderer: Arc::new(EmbeddedRenderer::new().expect("embedded manifests compile")),
        }
    }

    /// Add a ManagedCluster to the store (for test setup)
    pub fn add_managed_cluster(&self, mut cluster: ManagedCluster) {
        let mut state = self.state.lock().unwrap();
        cluster.metadata.resource_version = Some(state.bump_resource_version());
        let name = cluster.metadata.name.clone().unwrap_or_default();
        state.managed_clusters.insert(name, cluster);
    }

    /// Current stored ManagedCluster, if it still exists
    pub fn managed_cluster(&self, name: &str) -> Option<ManagedCluster> {
        self.state.lock().unwrap().managed_clusters.get(name).cloned()
    }

    /// Mutate a stored ManagedCluster as an external actor would (bumps resourceVersion)
    pub fn modify_managed_cluster(&self, name: &str, f: impl FnOnce(&mut ManagedCluster)) {
        let mut state = self.state.lock().unwrap();
        let rv = state.bump_resource_version();
        if let Some(cluster) = state.managed_clusters.get_mut(name) {
            f(cluster);
            cluster.metadata.resource_version = Some(rv);
        }
    }

    /// Flip `spec.hubAcceptsClient` as the hub admin would
    pub fn set_hub_accepts_client(&self, name: &str, accepts: bool) {
        self.modify_managed_cluster(name, |c| c.spec.hub_accepts_client = accepts);
    }

    /// Request deletion: sets the deletion timestamp, or erases the object
    /// right away when it carries no finalizers.
    pub fn request_deletion(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let rv = state.bump_resource_version();
        let Some(cluster) = state.managed_clusters.get_mut(name) else {
            return;
        };
        if cluster.metadata.finalizers.as_ref().is_none_or(|f| f.is_empty()) {
            state.managed_clusters.remove(name);
            return;
        }
        let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        cluster.metadata.deletion_timestamp = serde_json::from_value(serde_json::json!(now)).ok();
        cluster.metadata.resource_version = Some(rv);
    }

    pub fn add_namespace(&self, name: &str) {
        self.state.lock().unwrap().namespaces.insert(name.to_string());
    }

    pub fn add_cluster_role(&self, name: &str) {
        self.state.lock().unwrap().cluster_roles.insert(name.to_string());
    }

    pub fn add_cluster_role_binding(&self, name: &str) {
        self.state.lock().unwrap().cluster_role_bindings.insert(name.to_string());
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.state.lock().unwrap().namespaces.contains(name)
    }

    pub fn has_cluster_role(&self, name: &str) -> bool {
        self.state.lock().unwrap().cluster_roles.contains(name)
    }

    pub fn has_cluster_role_binding(&self, name: &str) -> bool {
        self.state.lock().unwrap().cluster_role_bindings.contains(name)
    }

    /// Whether a namespaced object (Role, RoleBinding) exists
    pub fn has_namespaced_object(&self, namespace: &str, kind: &str, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .namespaced_objects
            .contains(&(namespace.to_string(), kind.to_string(), name.to_string()))
    }

    /// Number of objects inside `namespace`
    pub fn namespaced_object_count(&self, namespace: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .namespaced_objects
            .iter()
            .filter(|(ns, _, _)| ns == namespace)
            .count()
    }

    /// Successful ManagedCluster writes (metadata and status)
    pub fn cluster_writes(&self) -> usize {
        self.state.lock().unwrap().cluster_writes
    }

    /// Objects newly created by provisioning (re-applying an existing object does not count)
    pub fn objects_created(&self) -> usize {
        self.state.lock().unwrap().objects_created
    }

    /// Dependents actually removed by `delete_dependent`, in call order
    pub fn deleted(&self) -> Vec<(DependentKind, String)> {
        self.state.lock().unwrap().deleted.clone()
    }

    /// Make every delete of `kind` fail with an API error
    pub fn fail_delete(&self, kind: DependentKind, message: &str) {
        self.state.lock().unwrap().delete_failures.insert(kind, message.to_string());
    }

    /// Make applying `manifest` fail with an API error
    pub fn fail_apply(&self, manifest: ManifestId, message: &str) {
        self.state.lock().unwrap().apply_failures.insert(manifest, message.to_string());
    }

    /// Make status writes fail with an API error
    pub fn fail_status_update(&self, message: &str) {
        self.state.lock().unwrap().status_failure = Some(message.to_string());
    }

    /// Make the next ManagedCluster write fail with a conflict
    pub fn conflict_next_write(&self) {
        self.state.lock().unwrap().conflict_next_write = true;
    }

    /// Clear all injected failures
    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.delete_failures.clear();
        state.apply_failures.clear();
        state.status_failure = None;
        state.conflict_next_write = false;
    }

    fn apply_one(&self, id: ManifestId, ctx: &TemplateContext) -> Result<(), HubError> {
        if let Some(message) = self.state.lock().unwrap().apply_failures.get(&id) {
            return Err(HubError::Api(message.clone()));
        }
        let manifest = parse_manifest(&self.renderer.render(id, ctx)?)?;

        let mut state = self.state.lock().unwrap();
        let created = match (manifest.kind.as_str(), manifest.namespace) {
            ("Namespace", _) => state.namespaces.insert(manifest.name),
            ("ClusterRole", _) => state.cluster_roles.insert(manifest.name),
            ("ClusterRoleBinding", _) => state.cluster_role_bindings.insert(manifest.name),
            (kind, Some(ns)) => {
                if !state.namespaces.contains(&ns) {
                    return Err(HubError::NotFound(format!("namespaces \"{}\" not found", ns)));
                }
                state.namespaced_objects.insert((ns, kind.to_string(), manifest.name))
            }
            (kind, None) => {
                return Err(HubError::Manifest(format!("unexpected cluster-scoped {}", kind)));
            }
        };
        if created {
            state.objects_created += 1;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl HubClientTrait for MockHubClient {
    async fn get_managed_cluster(&self, name: &str) -> Result<ManagedCluster, HubError> {
        self.managed_cluster(name)
            .ok_or_else(|| HubError::NotFound(format!("ManagedCluster {}", name)))
    }

    async fn update_managed_cluster(&self, cluster: &ManagedCluster) -> Result<ManagedCluster, HubError> {
        let mut state = self.state.lock().unwrap();
        let name = state.check_write(cluster)?;
        let rv = state.bump_resource_version();
        state.cluster_writes += 1;

        let stored = state
            .managed_clusters
            .get_mut(&name)
            .ok_or_else(|| HubError::NotFound(format!("ManagedCluster {}", name)))?;
        // only the finalizer list is patched, matching HubClient
        stored.metadata.finalizers = cluster.metadata.finalizers.clone();
        stored.metadata.resource_version = Some(rv);
        let updated = stored.clone();

        let finalized = updated.is_deleting()
            && updated.metadata.finalizers.as_ref().is_none_or(|f| f.is_empty());
        if finalized {
            state.managed_clusters.remove(&name);
        }
        Ok(updated)
    }

    async fn update_managed_cluster_status(&self, cluster: &ManagedCluster) -> Result<ManagedCluster, HubError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.status_failure {
            return Err(HubError::Api(message.clone()));
        }
        let name = state.check_write(cluster)?;
        let rv = state.bump_resource_version();
        state.cluster_writes += 1;

        let stored = state
            .managed_clusters
            .get_mut(&name)
            .ok_or_else(|| HubError::NotFound(format!("ManagedCluster {}", name)))?;
        stored.status = cluster.status.clone();
        stored.metadata.resource_version = Some(rv);
        Ok(stored.clone())
    }

    async fn delete_dependent(&self, kind: DependentKind, name: &str) -> Result<(), HubError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.delete_failures.get(&kind) {
            return Err(HubError::Api(message.clone()));
        }
        let removed = match kind {
            DependentKind::Namespace => {
                let removed = state.namespaces.remove(name);
                // namespace deletion garbage-collects its contents
                state.namespaced_objects.retain(|(ns, _, _)| ns != name);
                removed
            }
            DependentKind::ClusterRole => state.cluster_roles.remove(name),
            DependentKind::ClusterRoleBinding => state.cluster_role_bindings.remove(name),
        };
        if !removed {
            return Err(HubError::NotFound(format!("{} {}", kind, name)));
        }
        state.deleted.push((kind, name.to_string()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl ManifestProvisioner for MockHubClient {
    async fn apply(&self, manifests: &[ManifestId], ctx: &TemplateContext) -> Vec<ApplyResult> {
        manifests
            .iter()
            .map(|&id| ApplyResult::new(id, self.apply_one(id, ctx)))
            .collect()
    }
}
