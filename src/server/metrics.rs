use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

use crate::catalog_store::{CatalogStore, CatalogType, ChangeKind};

/// Metric name prefix for all sync server metrics
const PREFIX: &str = "kisan";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Catalog Metrics
    pub static ref CATALOG_MUTATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_catalog_mutations_total"), "Committed catalog mutations"),
        &["type", "kind"]
    ).expect("Failed to create catalog_mutations_total metric");

    pub static ref CATALOG_ENTRIES: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_catalog_entries"), "Live entries per catalog"),
        &["type"]
    ).expect("Failed to create catalog_entries metric");

    // WebSocket Metrics
    pub static ref WS_CONNECTIONS: Gauge = Gauge::new(
        format!("{PREFIX}_ws_connections"),
        "Number of open WebSocket connections"
    ).expect("Failed to create ws_connections metric");

    pub static ref WS_ROOMS: Gauge = Gauge::new(
        format!("{PREFIX}_ws_rooms"),
        "Number of rooms with at least one member"
    ).expect("Failed to create ws_rooms metric");

    // Broadcast Metrics
    pub static ref DELTAS_DELIVERED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_deltas_delivered_total"),
        "Deltas enqueued to a connection"
    ).expect("Failed to create deltas_delivered_total metric");

    pub static ref DELTAS_DROPPED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_deltas_dropped_total"), "Deltas not delivered, by reason"),
        &["reason"]
    ).expect("Failed to create deltas_dropped_total metric");

    pub static ref SNAPSHOTS_SENT_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_snapshots_sent_total"),
        "Room snapshots sent in reply to joins"
    ).expect("Failed to create snapshots_sent_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_MUTATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_ENTRIES.clone()));
    let _ = REGISTRY.register(Box::new(WS_CONNECTIONS.clone()));
    let _ = REGISTRY.register(Box::new(WS_ROOMS.clone()));
    let _ = REGISTRY.register(Box::new(DELTAS_DELIVERED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DELTAS_DROPPED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SNAPSHOTS_SENT_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Set the entry gauges from the current store contents
pub fn init_catalog_metrics(store: &dyn CatalogStore) {
    for catalog_type in CatalogType::ALL {
        CATALOG_ENTRIES
            .with_label_values(&[catalog_type.as_str()])
            .set(store.count(catalog_type) as f64);
    }
    tracing::info!("Catalog metrics initialized");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record a committed catalog change and keep the entry gauge in step
pub fn record_catalog_change(catalog_type: &str, kind: ChangeKind) {
    CATALOG_MUTATIONS_TOTAL
        .with_label_values(&[catalog_type, kind.as_str()])
        .inc();

    let entries = CATALOG_ENTRIES.with_label_values(&[catalog_type]);
    match kind {
        ChangeKind::Added => entries.inc(),
        ChangeKind::Removed => entries.dec(),
        ChangeKind::Updated => {}
    }
}

/// Record a delta that was not delivered
pub fn record_delta_dropped(reason: &str) {
    DELTAS_DROPPED_TOTAL.with_label_values(&[reason]).inc();
}

/// Collapse ids out of a request path so label cardinality stays bounded
pub fn categorize_endpoint(path: &str) -> String {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let known_type = |t: &str| t.parse::<CatalogType>().is_ok();
    match segments.as_slice() {
        [""] => "/".to_string(),
        ["v1", "ws"] => "/v1/ws".to_string(),
        ["v1", "catalog", catalog_type] if known_type(*catalog_type) => {
            format!("/v1/catalog/{catalog_type}")
        }
        ["v1", "catalog", catalog_type, id] if known_type(*catalog_type) && !id.is_empty() => {
            format!("/v1/catalog/{catalog_type}/:id")
        }
        _ => "other".to_string(),
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Router served on the metrics port
pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}
