//! Join, leave and disconnect handling.
//!
//! Every join is answered with a full snapshot of the room, so a client that
//! reconnects simply rejoins its rooms and catches up.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::rooms::RoomRegistry;
use crate::catalog_store::{CatalogEntry, CatalogStore, RoomKey};
use crate::filter::{self, Criteria};
use crate::server::metrics;
use crate::server::websocket::connection::SendError;
use crate::server::websocket::{ConnectionId, ConnectionManager};

#[derive(Debug, Error, PartialEq)]
pub enum JoinError {
    #[error("Invalid room: {0}")]
    InvalidRoom(String),

    #[error("Connection {0} is not registered")]
    NotConnected(ConnectionId),

    #[error("Snapshot could not be delivered to {0}")]
    Delivery(ConnectionId),
}

pub struct ReconnectSync {
    store: Arc<dyn CatalogStore>,
    registry: Arc<RoomRegistry>,
    connections: Arc<ConnectionManager>,
}

impl ReconnectSync {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        registry: Arc<RoomRegistry>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            store,
            registry,
            connections,
        }
    }

    /// Current contents of a room, in catalog order.
    pub fn snapshot(&self, room: &RoomKey) -> Vec<Arc<CatalogEntry>> {
        let catalog = self.store.list_snapshot(room.catalog_type);
        filter::apply(&catalog, &Criteria::for_room(room))
    }

    /// Add the connection to the room and send it the room snapshot.
    ///
    /// Membership is recorded before the snapshot is taken, and the
    /// connection accepts the room's deltas only once the snapshot is queued,
    /// so a change committed in between reaches the client inside the
    /// snapshot or as a later delta, never both. Returns the number of
    /// entries in the snapshot.
    pub async fn join(&self, connection: ConnectionId, room: &RoomKey) -> Result<usize, JoinError> {
        if room.partition.trim().is_empty() {
            return Err(JoinError::InvalidRoom(format!(
                "partition of {} room must not be empty",
                room.catalog_type
            )));
        }
        if !self.connections.is_connected(connection).await {
            return Err(JoinError::NotConnected(connection));
        }

        self.registry.join(connection, room);
        match self
            .connections
            .send_snapshot(connection, room, || self.snapshot(room))
            .await
        {
            Ok(count) => {
                metrics::SNAPSHOTS_SENT_TOTAL.inc();
                debug!("Sent {} entries of room {} to {}", count, room, connection);
                Ok(count)
            }
            Err(err) => {
                self.registry.leave(connection, room);
                Err(match err {
                    SendError::NotConnected => JoinError::NotConnected(connection),
                    SendError::Disconnected | SendError::Full => JoinError::Delivery(connection),
                })
            }
        }
    }

    /// Remove the connection from the room. Idempotent.
    pub async fn leave(&self, connection: ConnectionId, room: &RoomKey) -> bool {
        self.connections.forget_room(connection, room).await;
        self.registry.leave(connection, room)
    }

    /// Drop every membership of a closed connection and unregister it.
    pub async fn disconnect(&self, connection: ConnectionId) {
        let rooms = self.registry.disconnect(connection);
        self.connections.unregister(connection).await;
        info!("{} disconnected, left {} room(s)", connection, rooms.len());
    }
}
