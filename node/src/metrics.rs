//! # Prometheus Metrics
//!
//! Exposes operational metrics for the custody node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of savings goals created.
    pub goals_created_total: IntCounter,
    /// Total number of deposits committed.
    pub deposits_total: IntCounter,
    /// Total number of withdrawals committed.
    pub withdrawals_total: IntCounter,
    /// Total number of goals settled by the automation sweep.
    pub goals_swept_total: IntCounter,
    /// Number of goals not yet in the terminal state.
    pub open_goals: IntGauge,
    /// Live value of all vault positions, summed across assets.
    pub custody_value: IntGauge,
    /// Histogram of custody operation latency in seconds.
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("vuna".into()), None)
            .expect("failed to create prometheus registry");

        let goals_created_total =
            IntCounter::new("goals_created_total", "Total number of savings goals created")
                .expect("metric creation");
        registry
            .register(Box::new(goals_created_total.clone()))
            .expect("metric registration");

        let deposits_total =
            IntCounter::new("deposits_total", "Total number of deposits committed")
                .expect("metric creation");
        registry
            .register(Box::new(deposits_total.clone()))
            .expect("metric registration");

        let withdrawals_total =
            IntCounter::new("withdrawals_total", "Total number of withdrawals committed")
                .expect("metric creation");
        registry
            .register(Box::new(withdrawals_total.clone()))
            .expect("metric registration");

        let goals_swept_total = IntCounter::new(
            "goals_swept_total",
            "Total number of goals settled by the automation sweep",
        )
        .expect("metric creation");
        registry
            .register(Box::new(goals_swept_total.clone()))
            .expect("metric registration");

        let open_goals = IntGauge::new("open_goals", "Number of goals not yet withdrawn")
            .expect("metric creation");
        registry
            .register(Box::new(open_goals.clone()))
            .expect("metric registration");

        let custody_value = IntGauge::new(
            "custody_value",
            "Live value of all vault positions across assets, in smallest units",
        )
        .expect("metric creation");
        registry
            .register(Box::new(custody_value.clone()))
            .expect("metric registration");

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "End-to-end custody operation latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            goals_created_total,
            deposits_total,
            withdrawals_total,
            goals_swept_total,
            open_goals,
            custody_value,
            operation_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
