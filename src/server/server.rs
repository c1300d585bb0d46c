use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use axum::{extract::State, middleware, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::catalog_routes::catalog_routes;
use super::metrics::make_metrics_app;
use super::websocket::{handler::server_version, ws_handler};
use super::{log_requests, state::*, ServerConfig};
use crate::catalog_store::CatalogType;

#[derive(Serialize, Deserialize, Debug)]
pub struct ServerStats {
    pub uptime: String,
    pub version: String,
    pub hash: String,
    /// Live entries per catalog type
    pub catalog: BTreeMap<String, usize>,
    pub connections: usize,
    pub rooms: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let catalog = CatalogType::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), state.catalog_store.count(*t)))
        .collect();
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: server_version(),
        hash: state.hash.clone(),
        catalog,
        connections: state.ws_connection_manager.total_connections().await,
        rooms: state.room_registry.room_count(),
    };
    Json(stats)
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        catalog_store: GuardedCatalogStore,
        room_registry: GuardedRoomRegistry,
        ws_connection_manager: GuardedConnectionManager,
        reconnect: GuardedReconnectSync,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            catalog_store,
            room_registry,
            ws_connection_manager,
            reconnect,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    let catalog_routes: Router = catalog_routes().with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .route("/v1/ws", get(ws_handler))
        .with_state(state.clone());

    home_router
        .nest("/v1/catalog", catalog_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

/// Serve the HTTP/WebSocket app and the metrics endpoint until `shutdown`
/// is cancelled or either server stops.
pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    let app_shutdown = shutdown.clone();
    let metrics_shutdown = shutdown.clone();
    tokio::select! {
        result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { app_shutdown.cancelled().await }) => {
            info!("HTTP server stopped");
            result?;
        }
        result = axum::serve(metrics_listener, make_metrics_app())
            .with_graceful_shutdown(async move { metrics_shutdown.cancelled().await }) => {
            info!("Metrics server stopped");
            result?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{ReconnectSync, RoomRegistry};
    use crate::catalog_store::InMemoryCatalogStore;
    use crate::server::websocket::ConnectionManager;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`

    fn make_test_app() -> Router {
        let store: GuardedCatalogStore = Arc::new(InMemoryCatalogStore::new());
        let registry = Arc::new(RoomRegistry::new());
        let connections = Arc::new(ConnectionManager::default());
        let reconnect = Arc::new(ReconnectSync::new(
            store.clone(),
            registry.clone(),
            connections.clone(),
        ));
        let config = ServerConfig {
            requests_logging_level: crate::server::RequestsLoggingLevel::None,
            ..Default::default()
        };
        make_app(ServerState::new(config, store, registry, connections, reconnect))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn formats_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 01:01:01");
    }

    #[tokio::test]
    async fn home_reports_stats() {
        let app = make_test_app();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stats = body_json(response).await;
        assert_eq!(stats["catalog"]["price"], 0);
        assert_eq!(stats["connections"], 0);
        assert_eq!(stats["rooms"], 0);
    }

    #[tokio::test]
    async fn create_then_get_entry() {
        let app = make_test_app();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/v1/catalog/expert",
                serde_json::json!({
                    "id": "dr-rao",
                    "attributes": {"name": "Dr. Rao", "category": "soil", "specialization": "Soil health"}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["id"], "dr-rao");
        assert_eq!(created["version"], 1);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/catalog/expert/dr-rao")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let entry = body_json(response).await;
        assert_eq!(entry["attributes"]["name"], "Dr. Rao");
    }

    #[tokio::test]
    async fn create_without_id_generates_one() {
        let app = make_test_app();

        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/catalog/resource",
                serde_json::json!({
                    "attributes": {"title": "Drip irrigation basics", "category": "water", "type": "video"}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert!(!created["id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_entry_is_rejected_with_400() {
        let app = make_test_app();

        let response = app
            .oneshot(json_request(
                "PUT",
                "/v1/catalog/price/wheat",
                serde_json::json!({"attributes": {"crop": "Wheat"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("category"));
    }

    #[tokio::test]
    async fn unknown_catalog_type_is_rejected_with_400() {
        let app = make_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/catalog/weather")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_entry_returns_404() {
        let app = make_test_app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/catalog/scheme/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/v1/catalog/scheme/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
