//! Prometheus metrics and the probe endpoint.
//!
//! Serves `/metrics` in the Prometheus text format and `/healthz` for
//! liveness checks.

use crate::error::ControllerError;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Reconciliation metrics
pub struct Metrics {
    registry: Registry,
    reconciles: IntCounterVec,
    errors: IntCounterVec,
    duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconciles = IntCounterVec::new(
            Opts::new("managed_cluster_reconcile_total", "Successful reconciliations by outcome"),
            &["outcome"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("managed_cluster_reconcile_errors_total", "Failed reconciliations by error kind"),
            &["kind"],
        )?;
        let duration = Histogram::with_opts(
            HistogramOpts::new(
                "managed_cluster_reconcile_duration_seconds",
                "Time spent in one reconciliation",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        registry.register(Box::new(reconciles.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            reconciles,
            errors,
            duration,
        })
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.reconciles.with_label_values(&[outcome]).inc();
    }

    pub fn record_error(&self, kind: &str) {
        self.errors.with_label_values(&[kind]).inc();
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.duration.observe(elapsed.as_secs_f64());
    }

    /// Current metrics in the Prometheus text format
    pub fn render(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Router for the metrics and probe endpoints
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serve the metrics router until the listener fails.
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_outcome("accepted");
        metrics.record_outcome("accepted");
        metrics.record_error("conflict");
        metrics.observe_duration(Duration::from_millis(120));

        let output = metrics.render().unwrap();
        assert!(output.contains("managed_cluster_reconcile_total{outcome=\"accepted\"} 2"));
        assert!(output.contains("managed_cluster_reconcile_errors_total{kind=\"conflict\"} 1"));
        assert!(output.contains("managed_cluster_reconcile_duration_seconds_count 1"));
    }

    #[tokio::test]
    async fn test_healthz() {
        assert_eq!(healthz().await, "ok");
    }

    #[tokio::test]
    async fn test_metrics_handler_ok() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let response = metrics_handler(State(metrics)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
