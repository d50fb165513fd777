//! Hub client errors

use thiserror::Error;

/// Errors that can occur when talking to the hub API server
#[derive(Debug, Error)]
pub enum HubError {
    /// Object does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object changed since it was read (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// API server rejected the request
    #[error("Hub API error: {0}")]
    Api(String),

    /// Transport or client-side Kubernetes error
    #[error("Kubernetes error: {0}")]
    Kube(#[source] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rendered manifest is not valid YAML
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Manifest template failed to render
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Rendered manifest is missing required fields
    #[error("Invalid manifest: {0}")]
    Manifest(String),
}

impl HubError {
    /// Classify a `kube::Error` for the object described by `what`.
    ///
    /// 404 becomes `NotFound` and 409 becomes `Conflict` so callers can branch
    /// on them; any other API status becomes `Api`.
    pub fn from_kube(err: kube::Error, what: &str) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 404 => HubError::NotFound(what.to_string()),
            kube::Error::Api(resp) if resp.code == 409 => {
                HubError::Conflict(format!("{}: {}", what, resp.message))
            }
            kube::Error::Api(resp) => {
                HubError::Api(format!("{} ({}): {}", what, resp.code, resp.message))
            }
            other => HubError::Kube(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HubError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, HubError::Conflict(_))
    }
}
