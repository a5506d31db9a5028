//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 when ready to serve traffic)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Labels for per-webhook metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct WebhookLabels {
    pub webhook: String,
}

impl EncodeLabelSet for WebhookLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("webhook", self.webhook.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook server and the CA bundle synchronizer
pub struct Metrics {
    /// Admission requests processed, per webhook
    pub webhook_requests_total: Family<WebhookLabels, Counter>,
    /// Admission requests denied, per webhook
    pub webhook_denials_total: Family<WebhookLabels, Counter>,
    /// CA bundle synchronization runs
    pub cabundle_sync_runs_total: Counter,
    /// Per-registration faults across synchronization runs
    pub cabundle_sync_faults_total: Counter,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let webhook_requests_total = Family::<WebhookLabels, Counter>::default();
        registry.register(
            "webhook_requests",
            "Total number of admission requests processed",
            webhook_requests_total.clone(),
        );

        let webhook_denials_total = Family::<WebhookLabels, Counter>::default();
        registry.register(
            "webhook_denials",
            "Total number of admission requests denied",
            webhook_denials_total.clone(),
        );

        let cabundle_sync_runs_total = Counter::default();
        registry.register(
            "cabundle_sync_runs",
            "Total number of CA bundle synchronization runs",
            cabundle_sync_runs_total.clone(),
        );

        let cabundle_sync_faults_total = Counter::default();
        registry.register(
            "cabundle_sync_faults",
            "Total number of per-registration CA bundle faults",
            cabundle_sync_faults_total.clone(),
        );

        Self {
            webhook_requests_total,
            webhook_denials_total,
            cabundle_sync_runs_total,
            cabundle_sync_faults_total,
            registry,
        }
    }

    /// Record an admission request for a webhook
    pub fn record_request(&self, webhook: &str) {
        let labels = WebhookLabels {
            webhook: webhook.to_string(),
        };
        self.webhook_requests_total.get_or_create(&labels).inc();
    }

    /// Record a denied admission request for a webhook
    pub fn record_denial(&self, webhook: &str) {
        let labels = WebhookLabels {
            webhook: webhook.to_string(),
        };
        self.webhook_denials_total.get_or_create(&labels).inc();
    }

    /// Record a completed synchronization run and its fault count
    pub fn record_sync_run(&self, faults: u64) {
        self.cabundle_sync_runs_total.inc();
        self.cabundle_sync_faults_total.inc_by(faults);
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the process is ready to serve traffic
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the process as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the process is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server
///
/// Binds to 0.0.0.0:8080 and serves health/metrics endpoints.
pub async fn run_health_server(state: Arc<HealthState>) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], 8080));
    info!(port = 8080, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
