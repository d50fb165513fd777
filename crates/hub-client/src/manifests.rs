//! Access-control and namespace manifests provisioned for accepted clusters
//!
//! The manifest set is closed: each `ManifestId` names one embedded
//! template. Rendering goes through the `ManifestRenderer` capability so the
//! template source can be swapped without touching the provisioner.

use crate::error::HubError;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;

/// Name prefix of the per-cluster ClusterRole and ClusterRoleBinding.
pub const CLUSTER_ROLE_PREFIX: &str = "system:open-cluster-management:managedcluster";

/// Name of the ClusterRole / ClusterRoleBinding owned by `cluster_name`.
pub fn cluster_role_name(cluster_name: &str) -> String {
    format!("{}:{}", CLUSTER_ROLE_PREFIX, cluster_name)
}

/// Manifests applied for every accepted cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManifestId {
    ClusterRole,
    ClusterRoleBinding,
    Namespace,
    RegistrationRole,
    RegistrationRoleBinding,
    WorkRole,
    WorkRoleBinding,
}

impl ManifestId {
    /// Every manifest, in apply order. The namespace precedes the objects
    /// that live in it.
    pub const ALL: [ManifestId; 7] = [
        ManifestId::ClusterRole,
        ManifestId::ClusterRoleBinding,
        ManifestId::Namespace,
        ManifestId::RegistrationRole,
        ManifestId::RegistrationRoleBinding,
        ManifestId::WorkRole,
        ManifestId::WorkRoleBinding,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ManifestId::ClusterRole => "managedcluster-clusterrole.yaml",
            ManifestId::ClusterRoleBinding => "managedcluster-clusterrolebinding.yaml",
            ManifestId::Namespace => "managedcluster-namespace.yaml",
            ManifestId::RegistrationRole => "managedcluster-registration-role.yaml",
            ManifestId::RegistrationRoleBinding => "managedcluster-registration-rolebinding.yaml",
            ManifestId::WorkRole => "managedcluster-work-role.yaml",
            ManifestId::WorkRoleBinding => "managedcluster-work-rolebinding.yaml",
        }
    }

    /// Kind of the object the manifest renders to
    pub fn kind(&self) -> &'static str {
        match self {
            ManifestId::ClusterRole => "ClusterRole",
            ManifestId::ClusterRoleBinding => "ClusterRoleBinding",
            ManifestId::Namespace => "Namespace",
            ManifestId::RegistrationRole | ManifestId::WorkRole => "Role",
            ManifestId::RegistrationRoleBinding | ManifestId::WorkRoleBinding => "RoleBinding",
        }
    }

    fn template_source(&self) -> &'static str {
        match self {
            ManifestId::ClusterRole => include_str!("../manifests/managedcluster-clusterrole.yaml"),
            ManifestId::ClusterRoleBinding => include_str!("../manifests/managedcluster-clusterrolebinding.yaml"),
            ManifestId::Namespace => include_str!("../manifests/managedcluster-namespace.yaml"),
            ManifestId::RegistrationRole => include_str!("../manifests/managedcluster-registration-role.yaml"),
            ManifestId::RegistrationRoleBinding => include_str!("../manifests/managedcluster-registration-rolebinding.yaml"),
            ManifestId::WorkRole => include_str!("../manifests/managedcluster-work-role.yaml"),
            ManifestId::WorkRoleBinding => include_str!("../manifests/managedcluster-work-rolebinding.yaml"),
        }
    }
}

impl std::fmt::Display for ManifestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Values available to manifest templates
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TemplateContext {
    pub cluster_name: String,
}

impl TemplateContext {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
        }
    }
}

/// Renders a manifest to YAML bytes.
pub trait ManifestRenderer: Send + Sync {
    fn render(&self, id: ManifestId, ctx: &TemplateContext) -> Result<Vec<u8>, HubError>;
}

/// Renderer over the templates compiled into the binary
pub struct EmbeddedRenderer {
    env: Environment<'static>,
}

impl std::fmt::Debug for EmbeddedRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedRenderer").finish_non_exhaustive()
    }
}

impl EmbeddedRenderer {
    /// Compile every embedded template.
    pub fn new() -> Result<Self, HubError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        // minijinja would JSON-escape values in *.yaml templates by default
        env.set_auto_escape_callback(|_| AutoEscape::None);
        for id in ManifestId::ALL {
            env.add_template(id.file_name(), id.template_source())?;
        }
        Ok(Self { env })
    }
}

impl ManifestRenderer for EmbeddedRenderer {
    fn render(&self, id: ManifestId, ctx: &TemplateContext) -> Result<Vec<u8>, HubError> {
        let rendered = self.env.get_template(id.file_name())?.render(ctx)?;
        Ok(rendered.into_bytes())
    }
}

/// Identity of a rendered manifest plus its JSON body
#[derive(Debug, Clone)]
pub struct RenderedManifest {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub value: serde_json::Value,
}

/// Parse rendered YAML and extract the fields needed to apply it.
pub fn parse_manifest(bytes: &[u8]) -> Result<RenderedManifest, HubError> {
    let value: serde_json::Value = serde_yaml::from_slice(bytes)?;

    let field = |pointer: &str| {
        value
            .pointer(pointer)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    let api_version = field("/apiVersion")
        .ok_or_else(|| HubError::Manifest("manifest missing apiVersion".to_string()))?;
    let kind = field("/kind")
        .ok_or_else(|| HubError::Manifest("manifest missing kind".to_string()))?;
    let name = field("/metadata/name")
        .ok_or_else(|| HubError::Manifest(format!("{} manifest missing metadata.name", kind)))?;
    let namespace = field("/metadata/namespace");

    Ok(RenderedManifest {
        api_version,
        kind,
        name,
        namespace,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(id: ManifestId) -> RenderedManifest {
        let renderer = EmbeddedRenderer::new().unwrap();
        let bytes = renderer.render(id, &TemplateContext::new("east-1")).unwrap();
        parse_manifest(&bytes).unwrap()
    }

    #[test]
    fn test_every_manifest_renders_its_kind() {
        for id in ManifestId::ALL {
            let manifest = render(id);
            assert_eq!(manifest.kind, id.kind(), "{} rendered wrong kind", id);
        }
    }

    #[test]
    fn test_cluster_role_names_match_cleanup_names() {
        assert_eq!(render(ManifestId::ClusterRole).name, cluster_role_name("east-1"));
        assert_eq!(render(ManifestId::ClusterRoleBinding).name, cluster_role_name("east-1"));
        assert_eq!(
            cluster_role_name("east-1"),
            "system:open-cluster-management:managedcluster:east-1"
        );
    }

    #[test]
    fn test_namespace_is_named_after_cluster() {
        let manifest = render(ManifestId::Namespace);
        assert_eq!(manifest.name, "east-1");
        assert_eq!(manifest.namespace, None);
        assert_eq!(manifest.api_version, "v1");
    }

    #[test]
    fn test_namespaced_roles_live_in_cluster_namespace() {
        for id in [
            ManifestId::RegistrationRole,
            ManifestId::RegistrationRoleBinding,
            ManifestId::WorkRole,
            ManifestId::WorkRoleBinding,
        ] {
            assert_eq!(render(id).namespace.as_deref(), Some("east-1"), "{}", id);
        }
    }

    #[test]
    fn test_numeric_cluster_name_stays_a_string() {
        let renderer = EmbeddedRenderer::new().unwrap();
        let bytes = renderer
            .render(ManifestId::Namespace, &TemplateContext::new("1234"))
            .unwrap();
        assert_eq!(parse_manifest(&bytes).unwrap().name, "1234");
    }

    #[test]
    fn test_binding_subject_is_cluster_group() {
        let manifest = render(ManifestId::ClusterRoleBinding);
        assert_eq!(
            manifest.value.pointer("/subjects/0/name").and_then(|v| v.as_str()),
            Some("system:open-cluster-management:east-1")
        );
    }

    #[test]
    fn test_parse_manifest_requires_name() {
        let err = parse_manifest(b"apiVersion: v1\nkind: Namespace\nmetadata: {}\n").unwrap_err();
        assert!(matches!(err, HubError::Manifest(_)));
    }
}
