use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kisan_sync_server::broadcast::{
    BroadcastDispatcher, ReconnectSync, RoomRegistry, DEFAULT_ROOM_QUEUE_CAPACITY,
};
use kisan_sync_server::catalog_store::{load_seed, CatalogStore, InMemoryCatalogStore};
use kisan_sync_server::config;
use kisan_sync_server::server::websocket::connection::DEFAULT_CONNECTION_BUFFER;
use kisan_sync_server::server::websocket::ConnectionManager;
use kisan_sync_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig, ServerState};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// JSON file with catalog entries to load at startup.
    #[clap(long, value_parser = parse_path)]
    pub seed_file: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Pending deltas kept per room before the oldest is dropped.
    #[clap(long, default_value_t = DEFAULT_ROOM_QUEUE_CAPACITY)]
    pub room_queue_capacity: usize,

    /// Outgoing messages buffered per WebSocket connection.
    #[clap(long, default_value_t = DEFAULT_CONNECTION_BUFFER)]
    pub connection_buffer: usize,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            seed_file: args.seed_file.clone(),
            room_queue_capacity: args.room_queue_capacity,
            connection_buffer: args.connection_buffer,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(config::FileConfig::load)
        .transpose()?;
    let app_config = config::AppConfig::resolve(&(&cli_args).into(), file_config)?;
    info!("Resolved configuration: {:?}", app_config);

    // Initialize metrics system
    info!("Initializing metrics...");
    metrics::init_metrics();

    let room_registry = Arc::new(RoomRegistry::new());
    let connection_manager = Arc::new(ConnectionManager::new(
        app_config.dispatch.connection_buffer,
    ));
    let dispatcher = Arc::new(BroadcastDispatcher::new(
        room_registry.clone(),
        connection_manager.clone(),
        app_config.dispatch.room_queue_capacity,
    ));
    let catalog_store: Arc<dyn CatalogStore> =
        Arc::new(InMemoryCatalogStore::new().with_listener(dispatcher.clone()));

    if let Some(seed_file) = &app_config.seed_file {
        info!("Loading catalog seed from {:?}...", seed_file);
        load_seed(catalog_store.as_ref(), seed_file)?;
    }
    metrics::init_catalog_metrics(catalog_store.as_ref());

    let reconnect = Arc::new(ReconnectSync::new(
        catalog_store.clone(),
        room_registry.clone(),
        connection_manager.clone(),
    ));

    let shutdown_token = CancellationToken::new();
    let dispatcher_handle = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let shutdown = shutdown_token.child_token();
        async move { dispatcher.run(shutdown).await }
    });

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
    };
    let state = ServerState::new(
        server_config,
        catalog_store,
        room_registry,
        connection_manager,
        reconnect,
    );

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    let result = tokio::select! {
        result = run_server(state, shutdown_token.clone()) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            Ok(())
        }
    };

    shutdown_token.cancel();
    // Give the dispatcher a moment to shut down gracefully
    let _ = tokio::time::timeout(Duration::from_secs(1), dispatcher_handle).await;
    result
}
