use axum::extract::FromRef;

use crate::broadcast::{ReconnectSync, RoomRegistry};
use crate::catalog_store::CatalogStore;
use std::sync::Arc;
use std::time::Instant;

use super::websocket::ConnectionManager;
use super::ServerConfig;

pub type GuardedCatalogStore = Arc<dyn CatalogStore>;
pub type GuardedRoomRegistry = Arc<RoomRegistry>;
pub type GuardedConnectionManager = Arc<ConnectionManager>;
pub type GuardedReconnectSync = Arc<ReconnectSync>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub catalog_store: GuardedCatalogStore,
    pub room_registry: GuardedRoomRegistry,
    pub ws_connection_manager: GuardedConnectionManager,
    pub reconnect: GuardedReconnectSync,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedCatalogStore {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_store.clone()
    }
}

impl FromRef<ServerState> for GuardedRoomRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.room_registry.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedConnectionManager {
    fn from_ref(input: &ServerState) -> Self {
        input.ws_connection_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedReconnectSync {
    fn from_ref(input: &ServerState) -> Self {
        input.reconnect.clone()
    }
}
