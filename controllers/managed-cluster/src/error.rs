//! Controller-specific error types.
//!
//! Hub client failures are wrapped as-is so the retry policy can still tell
//! conflicts apart from everything else. Provisioning failures are collected
//! into one [`AggregateError`] that keeps every individual message.

use hub_client::HubError;
use kube::Error as KubeError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the Managed Cluster Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client error outside the hub client (startup, watch)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Hub API error
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),

    /// One or more manifests failed to apply, possibly with a status write failure
    #[error("Provisioning failed: {0}")]
    Provision(#[from] AggregateError),

    /// Reconciliation did not finish in time
    #[error("Reconciliation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Metrics server I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControllerError {
    /// Stale read: the whole reconciliation should be retried promptly.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Hub(e) if e.is_conflict())
    }

    /// Short label used for the error metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hub(HubError::Conflict(_)) => "conflict",
            Self::Hub(HubError::NotFound(_)) => "not_found",
            Self::Hub(_) | Self::Kube(_) => "store",
            Self::Provision(_) => "provision",
            Self::Timeout(_) => "timeout",
            Self::InvalidConfig(_) => "config",
            Self::Watch(_) => "watch",
            Self::Metrics(_) | Self::Io(_) => "internal",
        }
    }
}

/// Several failures reported together, one message per line.
///
/// Identical messages are collapsed; order of first appearance is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateError {
    messages: Vec<String>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.messages.contains(&message) {
            self.messages.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl FromIterator<String> for AggregateError {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut aggregate = Self::new();
        for message in iter {
            aggregate.push(message);
        }
        aggregate
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages.join("\n"))
    }
}

impl std::error::Error for AggregateError {}
