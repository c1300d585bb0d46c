//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own catalog, rooms and
//! dispatcher task.

use super::constants::*;
use super::fixtures::create_test_seed;
use kisan_sync_server::broadcast::{BroadcastDispatcher, ReconnectSync, RoomRegistry};
use kisan_sync_server::catalog_store::{load_seed, CatalogStore, InMemoryCatalogStore};
use kisan_sync_server::server::websocket::ConnectionManager;
use kisan_sync_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with an isolated, seeded catalog
///
/// When dropped, the server and its dispatcher shut down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Catalog store for direct mutations in tests
    pub store: Arc<dyn CatalogStore>,

    // Private fields - keep resources alive until drop
    _temp_seed_dir: TempDir,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Creates a temporary seed file with test data
    /// 2. Builds the store, rooms, connections and dispatcher
    /// 3. Loads the seed
    /// 4. Binds to a random port (127.0.0.1:0)
    /// 5. Spawns the server and the dispatcher in background tasks
    /// 6. Waits for the server to be ready
    ///
    /// # Panics
    ///
    /// Panics if seeding, binding or startup fails.
    pub async fn spawn() -> Self {
        Self::spawn_with_connection_buffer(64).await
    }

    /// Like [`TestServer::spawn`] with a custom per-connection buffer.
    pub async fn spawn_with_connection_buffer(connection_buffer: usize) -> Self {
        let (temp_seed_dir, seed_path) = create_test_seed().expect("Failed to create test seed");

        let room_registry = Arc::new(RoomRegistry::new());
        let connection_manager = Arc::new(ConnectionManager::new(connection_buffer));
        let dispatcher = Arc::new(BroadcastDispatcher::new(
            room_registry.clone(),
            connection_manager.clone(),
            256,
        ));
        let store: Arc<dyn CatalogStore> =
            Arc::new(InMemoryCatalogStore::new().with_listener(dispatcher.clone()));

        let report = load_seed(store.as_ref(), &seed_path).expect("Failed to load seed");
        assert_eq!(report.skipped, 1, "Seed should contain one invalid entry");

        let reconnect = Arc::new(ReconnectSync::new(
            store.clone(),
            room_registry.clone(),
            connection_manager.clone(),
        ));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        };
        let app = make_app(ServerState::new(
            config,
            store.clone(),
            room_registry,
            connection_manager,
            reconnect,
        ));

        let shutdown = CancellationToken::new();

        tokio::spawn({
            let shutdown = shutdown.clone();
            async move { dispatcher.run(shutdown).await }
        });

        // Spawn server in background task with graceful shutdown
        tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { shutdown.cancelled().await })
                    .await
                    .expect("Server failed");
            }
        });

        // Wait for server to be ready
        let server = Self {
            base_url,
            port,
            store,
            _temp_seed_dir: temp_seed_dir,
            shutdown,
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Stops both the HTTP server and the dispatcher
        self.shutdown.cancel();
    }
}
