//! Controller configuration.
//!
//! Read once at startup from environment variables. Every setting has a
//! default; a value that is present but malformed is a startup error.

use crate::error::ControllerError;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings for the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Event reporting component and server-side apply field manager
    pub controller_name: String,
    /// Maximum reconciliations in flight (different cluster names only)
    pub concurrency: u16,
    /// Quiet period before a burst of watch events triggers reconciliation
    pub debounce: Duration,
    /// Upper bound on a single reconciliation
    pub reconcile_timeout: Duration,
    /// Requeue interval after a successful reconciliation
    pub resync_interval: Duration,
    /// First retry delay after a failure
    pub backoff_min: Duration,
    /// Retry delay cap
    pub backoff_max: Duration,
    /// Retry delay after an optimistic concurrency conflict
    pub conflict_requeue: Duration,
    /// Listen address for `/metrics` and `/healthz`
    pub metrics_bind_address: SocketAddr,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            controller_name: "managed-cluster-controller".to_string(),
            concurrency: 4,
            debounce: Duration::from_secs(1),
            reconcile_timeout: Duration::from_secs(30),
            resync_interval: Duration::from_secs(600),
            backoff_min: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
            conflict_requeue: Duration::from_secs(1),
            metrics_bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let defaults = Self::default();

        let controller_name = lookup("CONTROLLER_NAME")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.controller_name);

        let config = Self {
            controller_name,
            concurrency: parse(&lookup, "RECONCILE_CONCURRENCY", defaults.concurrency)?,
            debounce: seconds(&lookup, "RECONCILE_DEBOUNCE_SECONDS", defaults.debounce)?,
            reconcile_timeout: seconds(&lookup, "RECONCILE_TIMEOUT_SECONDS", defaults.reconcile_timeout)?,
            resync_interval: seconds(&lookup, "RESYNC_INTERVAL_SECONDS", defaults.resync_interval)?,
            backoff_min: seconds(&lookup, "BACKOFF_MIN_SECONDS", defaults.backoff_min)?,
            backoff_max: seconds(&lookup, "BACKOFF_MAX_SECONDS", defaults.backoff_max)?,
            conflict_requeue: seconds(&lookup, "CONFLICT_REQUEUE_SECONDS", defaults.conflict_requeue)?,
            metrics_bind_address: parse(&lookup, "METRICS_BIND_ADDRESS", defaults.metrics_bind_address)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ControllerError> {
        if self.concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        if self.reconcile_timeout.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_TIMEOUT_SECONDS must be at least 1".to_string(),
            ));
        }
        if self.backoff_min.is_zero() || self.backoff_min > self.backoff_max {
            return Err(ControllerError::InvalidConfig(format!(
                "backoff bounds must satisfy 0 < BACKOFF_MIN_SECONDS ({}) <= BACKOFF_MAX_SECONDS ({})",
                self.backoff_min.as_secs(),
                self.backoff_max.as_secs()
            )));
        }
        Ok(())
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))),
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ControllerError> {
    parse(lookup, key, default.as_secs()).map(Duration::from_secs)
}
