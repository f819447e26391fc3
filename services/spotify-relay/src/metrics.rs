//! Prometheus metrics exposition
//!
//! - `relay_requests_total` (counter): labels `route`, `status`
//! - `relay_request_duration_seconds` (histogram): label `route`
//! - `relay_authorizations_total` (counter): label `outcome`
//! - `relay_guard_outcomes_total` (counter): label `outcome`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::Context;
use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Upstream round trips dominate request time; buckets span a fast cached
/// probe up to a slow token exchange.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Counters backing the `/health` endpoint
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

fn builder() -> anyhow::Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("relay_request_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )
        .context("failed to set histogram buckets")
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Record a completed inbound request.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    metrics::counter!("relay_requests_total", "route" => route.to_string(), "status" => status.to_string())
        .increment(1);
    metrics::histogram!("relay_request_duration_seconds", "route" => route.to_string())
        .record(duration_secs);
}

/// Record how an authorization callback ended.
pub fn record_authorization(outcome: &'static str) {
    metrics::counter!("relay_authorizations_total", "outcome" => outcome).increment(1);
}

/// Record the credential guard's verdict for a protected request.
pub fn record_guard_outcome(outcome: &'static str) {
    metrics::counter!("relay_guard_outcomes_total", "outcome" => outcome).increment(1);
}

/// Middleware counting every inbound request by matched route and status.
pub async fn track_requests(
    State(metrics): State<ServiceMetrics>,
    matched: Option<MatchedPath>,
    request: Request,
    next: Next,
) -> Response {
    let route = matched
        .map(|m| m.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();
    metrics.requests_total.fetch_add(1, Ordering::Relaxed);

    let response = next.run(request).await;
    record_request(
        &route,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}
